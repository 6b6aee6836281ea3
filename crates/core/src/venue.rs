use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Unique identifier for a trading venue, always lowercase.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct VenueId(String);

impl VenueId {
    pub fn new(id: impl Into<String>) -> Self {
        VenueId(id.into().to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VenueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for VenueId {
    fn from(s: &str) -> Self {
        VenueId::new(s)
    }
}

impl From<String> for VenueId {
    fn from(s: String) -> Self {
        VenueId::new(s)
    }
}

impl From<VenueId> for String {
    fn from(id: VenueId) -> String {
        id.0
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid composite code `{0}`: expected SYMBOL.venue")]
pub struct ParseCodeError(pub String);

/// A symbol qualified with its venue, e.g. `ETHMYR.luno`.
///
/// This is the routing key of the whole system: the router's
/// symbol-to-strategy index and every tick are keyed by it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CompositeCode {
    pub symbol: String,
    pub venue: VenueId,
}

impl CompositeCode {
    pub fn new(symbol: impl Into<String>, venue: impl Into<VenueId>) -> Self {
        CompositeCode {
            symbol: symbol.into().to_uppercase(),
            venue: venue.into(),
        }
    }
}

impl fmt::Display for CompositeCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.symbol, self.venue)
    }
}

impl FromStr for CompositeCode {
    type Err = ParseCodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('.') {
            Some((symbol, venue)) if !symbol.is_empty() && !venue.is_empty() => {
                Ok(CompositeCode::new(symbol, venue))
            }
            _ => Err(ParseCodeError(s.to_string())),
        }
    }
}

impl TryFrom<String> for CompositeCode {
    type Error = ParseCodeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<CompositeCode> for String {
    fn from(code: CompositeCode) -> String {
        code.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_venue_id_lowercased() {
        let id = VenueId::new("Luno");
        assert_eq!(id.as_str(), "luno");
        assert_eq!(id, VenueId::new("luno"));
    }

    #[test]
    fn test_composite_code_display() {
        let code = CompositeCode::new("ethmyr", "Luno");
        assert_eq!(code.symbol, "ETHMYR");
        assert_eq!(code.to_string(), "ETHMYR.luno");
    }

    #[test]
    fn test_composite_code_parse() {
        let code: CompositeCode = "ETHMYR.luno".parse().unwrap();
        assert_eq!(code, CompositeCode::new("ETHMYR", "luno"));

        assert!("ETHMYR".parse::<CompositeCode>().is_err());
        assert!(".luno".parse::<CompositeCode>().is_err());
    }

    #[test]
    fn test_composite_code_serde_roundtrip() {
        let code = CompositeCode::new("XBTZAR", "luno");
        let json = serde_json::to_string(&code).unwrap();
        assert_eq!(json, "\"XBTZAR.luno\"");
        let back: CompositeCode = serde_json::from_str(&json).unwrap();
        assert_eq!(back, code);
    }
}
