//! Season detection and history filtering over sales records.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::domain::sales::SalesRecord;
use crate::domain::season::{SeasonSpec, SeasonType};

/// Which season a batch should forecast, relative to the latest one found.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TargetSeason {
    /// The season immediately after the latest observed one.
    #[default]
    Next,
    /// The first type-A season after the latest observed one.
    NextA,
    /// The first type-B season after the latest observed one.
    NextB,
}

impl std::str::FromStr for TargetSeason {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "next" | "auto" => Ok(Self::Next),
            "next-a" | "next_a" | "next-pv" | "next_pv" => Ok(Self::NextA),
            "next-b" | "next_b" | "next-oi" | "next_oi" => Ok(Self::NextB),
            other => Err(format!("unsupported target season `{other}` (expected next|next-a|next-b)")),
        }
    }
}

/// Latest season present in `records`. Type B outranks type A in the same
/// year. Records whose label did not parse are ignored.
pub fn detect_latest_season(records: &[SalesRecord]) -> Option<SeasonSpec> {
    let labels: HashSet<&SeasonSpec> = records.iter().filter_map(|r| r.season.as_ref()).collect();
    labels.into_iter().max().copied()
}

/// The season to forecast given the latest one observed.
pub fn resolve_target(latest: SeasonSpec, target: TargetSeason) -> SeasonSpec {
    match (target, latest.season_type) {
        (TargetSeason::Next, SeasonType::A) | (TargetSeason::NextB, SeasonType::A) => {
            SeasonSpec::new(SeasonType::B, latest.year)
        }
        (TargetSeason::Next, SeasonType::B) | (TargetSeason::NextA, _) => {
            SeasonSpec::new(SeasonType::A, latest.year + 1)
        }
        (TargetSeason::NextB, SeasonType::B) => SeasonSpec::new(SeasonType::B, latest.year + 1),
    }
}

/// Records of `season_type` strictly older than `exclude_year`, so the
/// season being forecast never trains on itself.
pub fn filter_by_season_type(
    records: &[SalesRecord],
    season_type: SeasonType,
    exclude_year: i32,
) -> Vec<SalesRecord> {
    records
        .iter()
        .filter(|record| {
            record
                .season
                .is_some_and(|season| season.season_type == season_type && season.year < exclude_year)
        })
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::{detect_latest_season, filter_by_season_type, resolve_target, TargetSeason};
    use crate::domain::sales::SalesRecord;
    use crate::domain::season::{SeasonSpec, SeasonType};

    fn record(label: &str) -> SalesRecord {
        SalesRecord::new("SKU", "FAM", label, 1.0, Decimal::ONE)
    }

    #[test]
    fn latest_season_prefers_higher_year_then_type_b() {
        let records = vec![record("PV23"), record("OI24"), record("PV24"), record("SIN DEFINIR")];
        assert_eq!(detect_latest_season(&records), Some(SeasonSpec::new(SeasonType::B, 2024)));
    }

    #[test]
    fn latest_season_is_none_without_parsable_labels() {
        assert_eq!(detect_latest_season(&[record("???"), record("")]), None);
    }

    #[test]
    fn next_target_alternates_halves() {
        let spring = SeasonSpec::new(SeasonType::A, 2024);
        let autumn = SeasonSpec::new(SeasonType::B, 2024);

        assert_eq!(resolve_target(spring, TargetSeason::Next), SeasonSpec::new(SeasonType::B, 2024));
        assert_eq!(resolve_target(autumn, TargetSeason::Next), SeasonSpec::new(SeasonType::A, 2025));
        assert_eq!(resolve_target(autumn, TargetSeason::NextB), SeasonSpec::new(SeasonType::B, 2025));
        assert_eq!(resolve_target(spring, TargetSeason::NextA), SeasonSpec::new(SeasonType::A, 2025));
        assert_eq!(resolve_target(spring, TargetSeason::NextB), SeasonSpec::new(SeasonType::B, 2024));
    }

    #[test]
    fn filter_keeps_matching_type_before_excluded_year() {
        let records = vec![record("PV22"), record("OI22"), record("PV23"), record("PV24"), record("x")];
        let kept = filter_by_season_type(&records, SeasonType::A, 2024);

        let labels: Vec<_> = kept.iter().map(|r| r.season_label.as_str()).collect();
        assert_eq!(labels, vec!["PV22", "PV23"]);
    }

    #[test]
    fn target_choice_parses_cli_spellings() {
        assert_eq!("auto".parse::<TargetSeason>().ok(), Some(TargetSeason::Next));
        assert_eq!("next_PV".parse::<TargetSeason>().ok(), Some(TargetSeason::NextA));
        assert_eq!("next-b".parse::<TargetSeason>().ok(), Some(TargetSeason::NextB));
        let error = "later".parse::<TargetSeason>().err().unwrap_or_default();
        assert!(error.contains("unsupported target season `later`"), "{error}");
    }
}
