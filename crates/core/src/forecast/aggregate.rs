//! Per-product aggregation of filtered sales history.

use std::collections::{BTreeMap, HashMap};

use crate::domain::product::ProductCode;
use crate::domain::sales::{decimal_to_f64, ProductKey, SalesRecord};

/// Seasonal history of one product, keyed by season year.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductSeries {
    pub key: ProductKey,
    pub theme: Option<String>,
    pub units_by_year: BTreeMap<i32, f64>,
    /// Always equal to the sum of `units_by_year`.
    pub total_units: f64,
    prices_by_year: BTreeMap<i32, PriceAccumulator>,
    cost: PriceAccumulator,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct PriceAccumulator {
    weighted_sum: f64,
    weight: f64,
    plain_sum: f64,
    count: usize,
}

impl PriceAccumulator {
    fn push(&mut self, price: f64, units: f64) {
        if price <= 0.0 {
            return;
        }
        self.plain_sum += price;
        self.count += 1;
        if units > 0.0 {
            self.weighted_sum += price * units;
            self.weight += units;
        }
    }

    /// Unit-weighted average over sold units, falling back to the plain
    /// average when every row was a return.
    fn average(&self) -> Option<f64> {
        if self.weight > 0.0 {
            Some(self.weighted_sum / self.weight)
        } else if self.count > 0 {
            Some(self.plain_sum / self.count as f64)
        } else {
            None
        }
    }

    fn merge(&mut self, other: &Self) {
        self.weighted_sum += other.weighted_sum;
        self.weight += other.weight;
        self.plain_sum += other.plain_sum;
        self.count += other.count;
    }
}

impl ProductSeries {
    fn new(key: ProductKey) -> Self {
        Self {
            key,
            theme: None,
            units_by_year: BTreeMap::new(),
            total_units: 0.0,
            prices_by_year: BTreeMap::new(),
            cost: PriceAccumulator::default(),
        }
    }

    pub fn product_code(&self) -> &ProductCode {
        &self.key.product_code
    }

    pub fn family_code(&self) -> &str {
        &self.key.family_code
    }

    pub fn years(&self) -> usize {
        self.units_by_year.len()
    }

    /// Units per year in chronological order.
    pub fn values(&self) -> Vec<f64> {
        self.units_by_year.values().copied().collect()
    }

    /// Mean units per season with sales.
    pub fn yearly_average(&self) -> f64 {
        if self.units_by_year.is_empty() {
            return 0.0;
        }
        self.total_units / self.units_by_year.len() as f64
    }

    /// Average selling price per year, for years that carried a price.
    pub fn price_by_year(&self) -> BTreeMap<i32, f64> {
        self.prices_by_year
            .iter()
            .filter_map(|(year, acc)| acc.average().map(|price| (*year, price)))
            .collect()
    }

    pub fn average_price(&self) -> f64 {
        let mut overall = PriceAccumulator::default();
        for acc in self.prices_by_year.values() {
            overall.merge(acc);
        }
        overall.average().unwrap_or(0.0)
    }

    pub fn average_cost(&self) -> f64 {
        self.cost.average().unwrap_or(0.0)
    }

    fn push(&mut self, year: i32, record: &SalesRecord) {
        *self.units_by_year.entry(year).or_insert(0.0) += record.net_units;
        self.total_units += record.net_units;

        self.prices_by_year
            .entry(year)
            .or_default()
            .push(decimal_to_f64(record.unit_price), record.net_units);
        self.cost.push(decimal_to_f64(record.unit_cost), record.net_units);

        if self.theme.is_none() {
            self.theme = record.theme.clone();
        }
    }
}

/// Groups `records` by product and family, skipping the placeholder family
/// and rows without a parsed season. Output is ordered by key.
pub fn aggregate_by_product(records: &[SalesRecord], excluded_family: &str) -> Vec<ProductSeries> {
    let mut by_key: HashMap<ProductKey, ProductSeries> = HashMap::new();

    for record in records {
        if record.family_code == excluded_family || record.product_code.0.is_empty() {
            continue;
        }
        let Some(season) = record.season else {
            continue;
        };

        by_key
            .entry(record.key())
            .or_insert_with_key(|key| ProductSeries::new(key.clone()))
            .push(season.year, record);
    }

    let mut series: Vec<ProductSeries> = by_key.into_values().collect();
    series.sort_by(|a, b| a.key.cmp(&b.key));
    series
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::aggregate_by_product;
    use crate::config::DEFAULT_EXCLUDED_FAMILY;
    use crate::domain::sales::SalesRecord;

    fn row(code: &str, family: &str, label: &str, units: f64, price: i64) -> SalesRecord {
        SalesRecord::new(code, family, label, units, Decimal::from(price))
    }

    #[test]
    fn sums_units_per_year_net_of_returns() {
        let records = vec![
            row("A", "TOPS", "PV22", 10.0, 20),
            row("A", "TOPS", "PV22", -2.0, 20),
            row("A", "TOPS", "PV23", 15.0, 22),
        ];
        let series = aggregate_by_product(&records, DEFAULT_EXCLUDED_FAMILY);

        assert_eq!(series.len(), 1);
        let product = &series[0];
        assert_eq!(product.units_by_year.get(&2022), Some(&8.0));
        assert_eq!(product.units_by_year.get(&2023), Some(&15.0));
        assert_eq!(product.total_units, product.units_by_year.values().sum::<f64>());
        assert_eq!(product.years(), 2);
    }

    #[test]
    fn excluded_family_and_unparsed_seasons_are_skipped() {
        let records = vec![
            row("A", DEFAULT_EXCLUDED_FAMILY, "PV22", 10.0, 5),
            row("B", "TOPS", "unknown", 4.0, 5),
            row("C", "TOPS", "PV22", 4.0, 5),
        ];
        let series = aggregate_by_product(&records, DEFAULT_EXCLUDED_FAMILY);

        let codes: Vec<_> = series.iter().map(|s| s.product_code().0.as_str()).collect();
        assert_eq!(codes, vec!["C"]);
    }

    #[test]
    fn same_code_in_different_families_stays_separate() {
        let records = vec![row("A", "TOPS", "PV22", 1.0, 5), row("A", "DRESS", "PV22", 2.0, 5)];
        let series = aggregate_by_product(&records, DEFAULT_EXCLUDED_FAMILY);

        assert_eq!(series.len(), 2);
        assert_eq!(series[0].family_code(), "DRESS");
        assert_eq!(series[1].family_code(), "TOPS");
    }

    #[test]
    fn price_average_is_weighted_by_units_sold() {
        let records = vec![row("A", "TOPS", "PV22", 1.0, 10), row("A", "TOPS", "PV22", 3.0, 20)];
        let series = aggregate_by_product(&records, DEFAULT_EXCLUDED_FAMILY);

        assert!((series[0].average_price() - 17.5).abs() < 1e-9);
        assert_eq!(series[0].price_by_year().len(), 1);
    }
}
