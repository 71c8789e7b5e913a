//! Identifier newtypes

use crate::{GuideCoreError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Numeric show identifier as issued by the metadata provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShowId(pub u64);

impl fmt::Display for ShowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for ShowId {
    fn from(id: u64) -> Self {
        ShowId(id)
    }
}

/// ISO 3166-1 alpha-2 region code, always stored upper-case
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RegionCode(String);

impl RegionCode {
    /// Parse a region code, accepting surrounding whitespace and lower-case input
    pub fn parse(raw: &str) -> Result<Self> {
        let code = raw.trim().to_ascii_uppercase();
        if code.len() == 2 && code.chars().all(|c| c.is_ascii_alphabetic()) {
            Ok(RegionCode(code))
        } else {
            Err(GuideCoreError::InvalidRegion(raw.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RegionCode {
    fn default() -> Self {
        RegionCode("US".to_string())
    }
}

impl fmt::Display for RegionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for RegionCode {
    type Err = GuideCoreError;

    fn from_str(s: &str) -> Result<Self> {
        RegionCode::parse(s)
    }
}

impl TryFrom<String> for RegionCode {
    type Error = GuideCoreError;

    fn try_from(value: String) -> Result<Self> {
        RegionCode::parse(&value)
    }
}

impl From<RegionCode> for String {
    fn from(code: RegionCode) -> Self {
        code.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_region_normalization() {
        assert_eq!(RegionCode::parse(" gb ").unwrap().as_str(), "GB");
        assert!(RegionCode::parse("USA").is_err());
        assert!(RegionCode::parse("1A").is_err());
    }

    #[test]
    fn test_region_serde() {
        let code: RegionCode = serde_json::from_str("\"de\"").unwrap();
        assert_eq!(code.as_str(), "DE");
        assert_eq!(serde_json::to_string(&code).unwrap(), "\"DE\"");
        assert!(serde_json::from_str::<RegionCode>("\"\"").is_err());
    }
}
