pub mod forecast;
pub mod product;
pub mod sales;
pub mod season;
