use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

/// Seasonal half of a retail year.
///
/// `A` is the spring/summer collection (`PV`), `B` the autumn/winter one
/// (`OI`). Within the same year `B` is the more recent season.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SeasonType {
    A,
    B,
}

impl SeasonType {
    pub fn code(self) -> &'static str {
        match self {
            Self::A => "PV",
            Self::B => "OI",
        }
    }

    fn from_pair(pair: &str) -> Option<Self> {
        match pair {
            "PV" => Some(Self::A),
            "OI" => Some(Self::B),
            _ => None,
        }
    }

    fn from_letter(letter: char) -> Option<Self> {
        match letter {
            'P' | 'A' => Some(Self::A),
            'O' | 'B' => Some(Self::B),
            _ => None,
        }
    }
}

impl fmt::Display for SeasonType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl std::str::FromStr for SeasonType {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_uppercase();
        let parsed = match normalized.len() {
            1 => normalized.chars().next().and_then(Self::from_letter),
            2 => Self::from_pair(&normalized),
            _ => None,
        };
        parsed.ok_or_else(|| DomainError::InvalidSeasonLabel(value.to_string()))
    }
}

/// A concrete season: its half and calendar year.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SeasonSpec {
    pub season_type: SeasonType,
    pub year: i32,
}

impl SeasonSpec {
    pub fn new(season_type: SeasonType, year: i32) -> Self {
        Self { season_type, year }
    }

    /// Short label such as `PV26` or `OI25`.
    pub fn label(&self) -> String {
        format!("{}{:02}", self.season_type.code(), self.year.rem_euclid(100))
    }

    /// Parses a season label.
    ///
    /// Accepted forms, case-insensitive:
    /// - 4-character codes: `PV25`, `OI24`, `25PV`, `24OI`
    /// - type letter plus 4-digit year: `P2025`, `O2024`, `A2025`, `B2024`
    /// - a `PV`/`OI` code embedded in a theme tag, e.g. `T_PV25 05 MARFIL_P`
    pub fn parse(label: &str) -> Option<Self> {
        let normalized = label.trim().to_ascii_uppercase();
        if normalized.is_empty() {
            return None;
        }

        parse_four_char(&normalized)
            .or_else(|| parse_year_prefixed(&normalized))
            .or_else(|| parse_embedded(&normalized))
    }
}

impl Ord for SeasonSpec {
    fn cmp(&self, other: &Self) -> Ordering {
        self.year.cmp(&other.year).then(self.season_type.cmp(&other.season_type))
    }
}

impl PartialOrd for SeasonSpec {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for SeasonSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

fn two_digit_year(digits: &str) -> Option<i32> {
    if digits.len() != 2 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse::<i32>().ok().map(|short| 2000 + short)
}

fn parse_four_char(label: &str) -> Option<SeasonSpec> {
    if label.len() != 4 || !label.is_ascii() {
        return None;
    }
    let (head, tail) = label.split_at(2);

    if let (Some(season_type), Some(year)) = (SeasonType::from_pair(head), two_digit_year(tail)) {
        return Some(SeasonSpec::new(season_type, year));
    }
    if let (Some(year), Some(season_type)) = (two_digit_year(head), SeasonType::from_pair(tail)) {
        return Some(SeasonSpec::new(season_type, year));
    }
    None
}

fn parse_year_prefixed(label: &str) -> Option<SeasonSpec> {
    if label.len() != 5 || !label.is_ascii() {
        return None;
    }
    let mut chars = label.chars();
    let season_type = chars.next().and_then(SeasonType::from_letter)?;
    let digits = chars.as_str();
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let year = digits.parse::<i32>().ok()?;
    Some(SeasonSpec::new(season_type, year))
}

fn parse_embedded(label: &str) -> Option<SeasonSpec> {
    let bytes = label.as_bytes();
    if bytes.len() < 4 {
        return None;
    }

    for start in 0..=bytes.len() - 4 {
        let window = &bytes[start..start + 4];
        let pair = match std::str::from_utf8(&window[..2]) {
            Ok(pair) => pair,
            Err(_) => continue,
        };
        let Some(season_type) = SeasonType::from_pair(pair) else {
            continue;
        };
        if !window[2].is_ascii_digit() || !window[3].is_ascii_digit() {
            continue;
        }
        // `PV2025` would otherwise read as PV20.
        if bytes.get(start + 4).is_some_and(|b| b.is_ascii_digit()) {
            continue;
        }
        let year = 2000 + i32::from(window[2] - b'0') * 10 + i32::from(window[3] - b'0');
        return Some(SeasonSpec::new(season_type, year));
    }

    None
}
