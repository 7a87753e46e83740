//! Weight reading types.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Weight units reported by scale protocols.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Unit {
    /// Kilograms. The default when a record carries no unit token.
    #[default]
    Kg,
    /// Grams.
    G,
    /// Pounds.
    Lb,
    /// Ounces.
    Oz,
}

impl Unit {
    /// Parses a unit token, case-insensitively.
    #[must_use]
    pub fn from_token(token: &str) -> Option<Self> {
        match token.to_ascii_lowercase().as_str() {
            "kg" => Some(Self::Kg),
            "g" => Some(Self::G),
            "lb" => Some(Self::Lb),
            "oz" => Some(Self::Oz),
            _ => None,
        }
    }

    /// Returns the lowercase token for this unit.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Kg => "kg",
            Self::G => "g",
            Self::Lb => "lb",
            Self::Oz => "oz",
        }
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One structured measurement extracted from a scale record.
///
/// Immutable once constructed. `value` defaults to `0.0` and `unit` to
/// [`Unit::Kg`] when the record yields no matching token; `raw` always
/// carries the original line verbatim.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reading {
    /// Numeric weight exactly as written on the line.
    pub value: f64,
    /// Unit token found on the line.
    pub unit: Unit,
    /// Whether the displayed weight has settled.
    pub stable: bool,
    /// The original record text.
    #[serde(rename = "raw_data")]
    pub raw: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_from_token_case_insensitive() {
        assert_eq!(Unit::from_token("KG"), Some(Unit::Kg));
        assert_eq!(Unit::from_token("Lb"), Some(Unit::Lb));
        assert_eq!(Unit::from_token("oz"), Some(Unit::Oz));
        assert_eq!(Unit::from_token("stone"), None);
    }

    #[test]
    fn test_unit_default_is_kg() {
        assert_eq!(Unit::default(), Unit::Kg);
    }

    #[test]
    fn test_reading_wire_shape() {
        let reading = Reading {
            value: 0.178,
            unit: Unit::Kg,
            stable: true,
            raw: "ST,GS,+  0.178 kg".to_owned(),
        };
        let json = serde_json::to_string(&reading).unwrap();
        assert!(json.contains("\"value\":0.178"));
        assert!(json.contains("\"unit\":\"kg\""));
        assert!(json.contains("\"stable\":true"));
        assert!(json.contains("\"raw_data\":\"ST,GS,+  0.178 kg\""));
    }
}
