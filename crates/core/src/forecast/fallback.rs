//! Family and theme averages for products with barely any history.

use std::collections::HashMap;

use crate::domain::forecast::{AccuracyMetrics, ForecastMethod};
use crate::domain::product::ProductCatalog;
use crate::forecast::aggregate::ProductSeries;
use crate::forecast::ensemble::{round_units, ModelPrediction};

/// Products below this many units are not modelled directly.
pub const MIN_MODELLED_UNITS: f64 = 2.0;

pub const FALLBACK_CONFIDENCE: f64 = 40.0;
const FALLBACK_MAPE_CAP: f64 = 80.0;
const FALLBACK_MAPE_WITHOUT_BASELINE: f64 = 60.0;

/// A product qualifies for a hierarchy fallback when its total history is
/// in `[1, 2)` units.
pub fn is_fallback_eligible(total_units: f64) -> bool {
    (1.0..MIN_MODELLED_UNITS).contains(&total_units)
}

/// Theme from the sales rows, else from the catalog.
pub fn resolve_theme(series: &ProductSeries, catalog: &ProductCatalog) -> Option<String> {
    series
        .theme
        .clone()
        .filter(|theme| !theme.trim().is_empty())
        .or_else(|| catalog.theme_of(series.product_code()).map(str::to_owned))
        .filter(|theme| !theme.trim().is_empty())
}

/// Mean yearly sales per family and per theme, over products that have
/// enough history to be modelled themselves.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct HierarchyAverages {
    by_family: HashMap<String, f64>,
    by_theme: HashMap<String, f64>,
}

impl HierarchyAverages {
    pub fn build(series: &[ProductSeries], catalog: &ProductCatalog) -> Self {
        let mut families: HashMap<String, (f64, usize)> = HashMap::new();
        let mut themes: HashMap<String, (f64, usize)> = HashMap::new();

        for product in series.iter().filter(|p| p.total_units >= MIN_MODELLED_UNITS) {
            let average = product.yearly_average();
            if !product.family_code().trim().is_empty() {
                let slot = families.entry(product.family_code().to_owned()).or_default();
                slot.0 += average;
                slot.1 += 1;
            }
            if let Some(theme) = resolve_theme(product, catalog) {
                let slot = themes.entry(theme).or_default();
                slot.0 += average;
                slot.1 += 1;
            }
        }

        Self { by_family: finish(families), by_theme: finish(themes) }
    }

    pub fn family(&self, family_code: &str) -> Option<f64> {
        self.by_family.get(family_code).copied()
    }

    pub fn theme(&self, theme: &str) -> Option<f64> {
        self.by_theme.get(theme).copied()
    }
}

fn finish(sums: HashMap<String, (f64, usize)>) -> HashMap<String, f64> {
    sums.into_iter()
        .filter(|(_, (_, count))| *count > 0)
        .map(|(key, (sum, count))| (key, sum / count as f64))
        .collect()
}

/// Family average first, theme average second. `None` when neither level
/// has a qualifying average.
pub fn hierarchical_fallback(
    series: &ProductSeries,
    theme: Option<&str>,
    averages: &HierarchyAverages,
) -> Option<ModelPrediction> {
    let (average, method) = averages
        .family(series.family_code())
        .map(|avg| (avg, ForecastMethod::FamilyAverage))
        .or_else(|| {
            theme.and_then(|t| averages.theme(t)).map(|avg| (avg, ForecastMethod::ThemeAverage))
        })?;

    let own = series.yearly_average();
    let diff = (average - own).abs();
    let mape = if own.abs() <= f64::EPSILON {
        FALLBACK_MAPE_WITHOUT_BASELINE
    } else {
        (diff / own.abs() * 100.0).min(FALLBACK_MAPE_CAP)
    };

    Some(ModelPrediction {
        predicted_units: round_units(average),
        confidence: FALLBACK_CONFIDENCE,
        validation: AccuracyMetrics { mape, mae: diff, rmse: diff },
        method,
    })
}
