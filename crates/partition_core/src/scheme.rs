use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{PartitionError, PartitionResult};

pub const RANGE_TABLE_PREFIX: &str = "range_part";
pub const RROBIN_TABLE_PREFIX: &str = "rrobin_part";

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartitionScheme {
    Range,
    RoundRobin,
}

impl PartitionScheme {
    pub const ALL: [PartitionScheme; 2] = [PartitionScheme::Range, PartitionScheme::RoundRobin];

    pub fn as_str(self) -> &'static str {
        match self {
            PartitionScheme::Range => "range",
            PartitionScheme::RoundRobin => "round_robin",
        }
    }

    pub fn table_prefix(self) -> &'static str {
        match self {
            PartitionScheme::Range => RANGE_TABLE_PREFIX,
            PartitionScheme::RoundRobin => RROBIN_TABLE_PREFIX,
        }
    }

    /// `<prefix><index>`, decimal, no padding.
    pub fn table_name(self, index: usize) -> String {
        format!("{}{index}", self.table_prefix())
    }

    /// Inverse of [`PartitionScheme::table_name`]. Rejects leading zeros.
    pub fn parse_index(self, table: &str) -> Option<usize> {
        let digits = table.strip_prefix(self.table_prefix())?;
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        if digits.len() > 1 && digits.starts_with('0') {
            return None;
        }
        digits.parse().ok()
    }
}

impl fmt::Display for PartitionScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PartitionScheme {
    type Err = PartitionError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "range" => Ok(PartitionScheme::Range),
            "round_robin" | "round-robin" | "rrobin" => Ok(PartitionScheme::RoundRobin),
            other => Err(PartitionError::invalid(format!(
                "unknown partition scheme '{other}'"
            ))),
        }
    }
}

/// A validated partition count (N >= 1).
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct PartitionCount(usize);

impl PartitionCount {
    pub fn new(count: i64) -> PartitionResult<Self> {
        if count < 1 {
            return Err(PartitionError::invalid_count(count));
        }
        usize::try_from(count)
            .map(Self)
            .map_err(|_| PartitionError::invalid_count(count))
    }

    pub fn get(self) -> usize {
        self.0
    }
}

impl TryFrom<i64> for PartitionCount {
    type Error = PartitionError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<PartitionCount> for i64 {
    fn from(value: PartitionCount) -> Self {
        value.0 as i64
    }
}

/// Table names are spliced into DDL, so only plain identifiers pass.
pub fn validate_table_name(name: &str) -> PartitionResult<&str> {
    let mut chars = name.chars();
    let valid_head = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    if valid_head && chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        Ok(name)
    } else {
        Err(PartitionError::invalid(format!(
            "invalid table name '{name}'"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_partitions_with_scheme_prefix() {
        assert_eq!(PartitionScheme::Range.table_name(0), "range_part0");
        assert_eq!(PartitionScheme::RoundRobin.table_name(12), "rrobin_part12");
    }

    #[test]
    fn parses_indices_without_leading_zeros() {
        let scheme = PartitionScheme::Range;
        assert_eq!(scheme.parse_index("range_part7"), Some(7));
        assert_eq!(scheme.parse_index("range_part10"), Some(10));
        assert_eq!(scheme.parse_index("range_part0"), Some(0));
        assert_eq!(scheme.parse_index("range_part07"), None);
        assert_eq!(scheme.parse_index("range_part"), None);
        assert_eq!(scheme.parse_index("range_partx"), None);
        assert_eq!(scheme.parse_index("rrobin_part1"), None);
    }

    #[test]
    fn partition_count_rejects_non_positive() {
        assert!(matches!(
            PartitionCount::new(0),
            Err(PartitionError::InvalidPartitionCount { count: 0 })
        ));
        assert!(PartitionCount::new(-3).is_err());
        assert_eq!(PartitionCount::new(4).map(PartitionCount::get).ok(), Some(4));
    }

    #[test]
    fn partition_count_deserializes_through_validation() {
        let count: PartitionCount = serde_json::from_str("3").expect("count");
        assert_eq!(count.get(), 3);
        assert!(serde_json::from_str::<PartitionCount>("0").is_err());
        assert_eq!(serde_json::to_string(&count).expect("encode"), "3");
    }

    #[test]
    fn scheme_roundtrips_through_str() {
        for scheme in PartitionScheme::ALL {
            assert_eq!(scheme.as_str().parse::<PartitionScheme>().ok(), Some(scheme));
        }
        assert!("hash".parse::<PartitionScheme>().is_err());
    }

    #[test]
    fn table_names_must_be_identifiers() {
        assert!(validate_table_name("ratings").is_ok());
        assert!(validate_table_name("_ratings_2").is_ok());
        assert!(validate_table_name("").is_err());
        assert!(validate_table_name("2ratings").is_err());
        assert!(validate_table_name("ratings; drop table x").is_err());
    }
}
