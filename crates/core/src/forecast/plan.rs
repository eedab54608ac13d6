//! Purchase plan: forecast demand valued and summarised per family.

use std::collections::{BTreeMap, BTreeSet};

use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::domain::forecast::{ForecastBatchResult, ForecastRecord};
use crate::domain::product::{ProductCatalog, ProductCode};
use crate::domain::sales::decimal_to_f64;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PlanSection {
    pub family_code: String,
    pub units: u64,
    pub retail_value: Decimal,
    pub cost_value: Decimal,
    /// Distinct products forecast in the family.
    pub options: usize,
    /// Units per option.
    pub depth: f64,
    pub avg_cost: Decimal,
    pub avg_retail: Decimal,
    /// Retail over cost, as a percentage of cost.
    pub markup_percent: f64,
    pub units_per_store: f64,
    pub retail_share_percent: f64,
    pub cost_share_percent: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PurchasePlan {
    pub target_season_label: String,
    pub store_count: u32,
    /// Highest retail value first.
    pub sections: Vec<PlanSection>,
    pub total_units: u64,
    pub total_retail_value: Decimal,
    pub total_cost_value: Decimal,
}

#[derive(Default)]
struct SectionTotals {
    units: u64,
    retail: Decimal,
    cost: Decimal,
    products: BTreeSet<ProductCode>,
}

pub fn build_purchase_plan(
    batch: &ForecastBatchResult,
    catalog: &ProductCatalog,
    store_count: u32,
) -> PurchasePlan {
    let mut families: BTreeMap<&str, SectionTotals> = BTreeMap::new();
    for forecast in &batch.forecasts {
        let (price, cost) = unit_values(forecast, catalog);
        let units = Decimal::from(forecast.predicted_demand);

        let totals = families.entry(forecast.family_code.as_str()).or_default();
        totals.units += forecast.predicted_demand;
        totals.retail += units * price;
        totals.cost += units * cost;
        totals.products.insert(forecast.product_code.clone());
    }

    let total_retail: Decimal = families.values().map(|t| t.retail).sum();
    let total_cost: Decimal = families.values().map(|t| t.cost).sum();

    let mut sections: Vec<PlanSection> = families
        .into_iter()
        .map(|(family, totals)| section(family, totals, store_count, total_retail, total_cost))
        .collect();
    sections.sort_by(|a, b| {
        b.retail_value.cmp(&a.retail_value).then_with(|| a.family_code.cmp(&b.family_code))
    });

    PurchasePlan {
        target_season_label: batch.target_season_label.clone(),
        store_count,
        total_units: sections.iter().map(|s| s.units).sum(),
        sections,
        total_retail_value: total_retail.round_dp(2),
        total_cost_value: total_cost.round_dp(2),
    }
}

fn section(
    family: &str,
    totals: SectionTotals,
    store_count: u32,
    total_retail: Decimal,
    total_cost: Decimal,
) -> PlanSection {
    let options = totals.products.len();
    let units = totals.units;
    let per_unit = |value: Decimal| {
        if units == 0 {
            Decimal::ZERO
        } else {
            (value / Decimal::from(units)).round_dp(2)
        }
    };

    PlanSection {
        family_code: family.to_owned(),
        units,
        retail_value: totals.retail.round_dp(2),
        cost_value: totals.cost.round_dp(2),
        options,
        depth: ratio(units as f64, options as f64),
        avg_cost: per_unit(totals.cost),
        avg_retail: per_unit(totals.retail),
        markup_percent: ratio(decimal_to_f64(totals.retail - totals.cost), decimal_to_f64(totals.cost))
            * 100.0,
        units_per_store: ratio(units as f64, f64::from(store_count)),
        retail_share_percent: ratio(decimal_to_f64(totals.retail), decimal_to_f64(total_retail))
            * 100.0,
        cost_share_percent: ratio(decimal_to_f64(totals.cost), decimal_to_f64(total_cost)) * 100.0,
    }
}

/// Catalog prices win over the averages observed in sales.
fn unit_values(forecast: &ForecastRecord, catalog: &ProductCatalog) -> (Decimal, Decimal) {
    let info = catalog.find(&forecast.product_code);
    let observed = |value: f64| Decimal::from_f64(value).unwrap_or_default().round_dp(2);

    let price = info
        .and_then(|i| i.unit_price)
        .unwrap_or_else(|| observed(forecast.features.avg_price));
    let cost = info
        .and_then(|i| i.unit_cost)
        .unwrap_or_else(|| observed(forecast.features.avg_cost));
    (price, cost)
}

fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator > 0.0 {
        numerator / denominator
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use rust_decimal::Decimal;

    use super::build_purchase_plan;
    use crate::domain::forecast::{
        AccuracyMetrics, AggregateAccuracy, ForecastBatchResult, ForecastFeatures, ForecastMethod,
        ForecastRecord,
    };
    use crate::domain::product::{ProductCatalog, ProductCode, ProductInfo};
    use crate::domain::season::SeasonType;

    fn forecast(code: &str, family: &str, units: u64, price: f64, cost: f64) -> ForecastRecord {
        ForecastRecord {
            product_code: ProductCode(code.to_owned()),
            family_code: family.to_owned(),
            theme: None,
            predicted_demand: units,
            confidence: 80.0,
            method_used: ForecastMethod::Ensemble,
            historical_average: units as f64,
            years_of_history: 3,
            features: ForecastFeatures { avg_price: price, avg_cost: cost, ..Default::default() },
            validation: AccuracyMetrics::default(),
        }
    }

    fn batch(forecasts: Vec<ForecastRecord>) -> ForecastBatchResult {
        ForecastBatchResult {
            target_season_label: "PV26".to_owned(),
            target_year: 2026,
            season_type: SeasonType::A,
            forecasts,
            aggregate_accuracy: AggregateAccuracy::default(),
            historical_record_count: 0,
            candidate_count: 0,
            method_usage: BTreeMap::new(),
            cancelled: false,
        }
    }

    #[test]
    fn sections_value_units_and_sort_by_retail() {
        let plan = build_purchase_plan(
            &batch(vec![
                forecast("A", "TOPS", 10, 20.0, 8.0),
                forecast("B", "TOPS", 30, 10.0, 5.0),
                forecast("C", "DRESS", 40, 50.0, 20.0),
            ]),
            &ProductCatalog::default(),
            10,
        );

        assert_eq!(plan.sections.len(), 2);
        let dress = &plan.sections[0];
        assert_eq!(dress.family_code, "DRESS");
        assert_eq!(dress.retail_value, Decimal::from(2000));
        assert_eq!(dress.units_per_store, 4.0);

        let tops = &plan.sections[1];
        assert_eq!(tops.units, 40);
        assert_eq!(tops.options, 2);
        assert_eq!(tops.retail_value, Decimal::from(500));
        assert_eq!(tops.cost_value, Decimal::from(230));
        assert_eq!(tops.avg_retail, Decimal::new(1250, 2));
        assert!((tops.depth - 20.0).abs() < 1e-12);
        assert!((tops.markup_percent - 270.0 / 230.0 * 100.0).abs() < 1e-9);
        assert!((tops.retail_share_percent - 20.0).abs() < 1e-9);
        assert_eq!(plan.total_units, 80);
    }

    #[test]
    fn catalog_prices_override_observed_averages() {
        let catalog = ProductCatalog::new(vec![ProductInfo {
            code: ProductCode("A".to_owned()),
            family_code: "TOPS".to_owned(),
            theme: None,
            unit_price: Some(Decimal::new(1999, 2)),
            unit_cost: Some(Decimal::new(750, 2)),
        }]);
        let plan = build_purchase_plan(&batch(vec![forecast("A", "TOPS", 2, 1.0, 1.0)]), &catalog, 0);

        assert_eq!(plan.sections[0].retail_value, Decimal::new(3998, 2));
        assert_eq!(plan.sections[0].cost_value, Decimal::new(1500, 2));
        assert_eq!(plan.sections[0].units_per_store, 0.0);
    }
}
