//! Ordered resolution ranks.
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How far resolution has progressed for a query.
///
/// The derive order is the rank order: `Unknown` is the coarsest and `Parcel`
/// the finest.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum MatchLevel {
    #[default]
    Unknown,
    Prefecture,
    City,
    Ward,
    TownLocal,
    Machiaza,
    ResidentialBlock,
    ResidentialDetail,
    Parcel,
}

/// Granularity of the best coordinates found so far. Shares the rank scale
/// of `MatchLevel` but is tracked separately on a query.
pub type CoordinateLevel = MatchLevel;

impl MatchLevel {
    pub const ALL: [MatchLevel; 9] = [
        MatchLevel::Unknown,
        MatchLevel::Prefecture,
        MatchLevel::City,
        MatchLevel::Ward,
        MatchLevel::TownLocal,
        MatchLevel::Machiaza,
        MatchLevel::ResidentialBlock,
        MatchLevel::ResidentialDetail,
        MatchLevel::Parcel,
    ];

    /// Numeric rank, 0 for `Unknown`.
    pub fn rank(self) -> u8 {
        self as u8
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MatchLevel::Unknown => "unknown",
            MatchLevel::Prefecture => "prefecture",
            MatchLevel::City => "city",
            MatchLevel::Ward => "ward",
            MatchLevel::TownLocal => "town_local",
            MatchLevel::Machiaza => "machiaza",
            MatchLevel::ResidentialBlock => "residential_block",
            MatchLevel::ResidentialDetail => "residential_detail",
            MatchLevel::Parcel => "parcel",
        }
    }

    /// Town-level ranks, where block and parcel lookups start.
    pub fn is_town(self) -> bool {
        matches!(self, MatchLevel::TownLocal | MatchLevel::Machiaza)
    }
}

impl fmt::Display for MatchLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MatchLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MatchLevel::ALL
            .iter()
            .copied()
            .find(|level| level.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown match level: {}", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_order() {
        for pair in MatchLevel::ALL.windows(2) {
            assert!(pair[0] < pair[1]);
            assert_eq!(pair[0].rank() + 1, pair[1].rank());
        }
        assert_eq!(MatchLevel::default(), MatchLevel::Unknown);
    }

    #[test]
    fn test_parse_and_display() {
        for level in MatchLevel::ALL {
            assert_eq!(level.to_string().parse::<MatchLevel>().unwrap(), level);
        }
        assert!("street".parse::<MatchLevel>().is_err());
    }
}
