//! Train number and train type filtering.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Error returned when parsing an invalid train number.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid train number: {reason}")]
pub struct InvalidTrainNumber {
    reason: &'static str,
}

/// Maximum length of a public train number.
const MAX_LEN: usize = 8;

/// A public train number such as `G1`, `D3105`, `K1234` or `1461`.
///
/// # Examples
///
/// ```
/// use ticket_server::domain::{TrainKind, TrainNumber};
///
/// let g = TrainNumber::parse("G1").unwrap();
/// assert_eq!(g.kind(), TrainKind::HighSpeed);
///
/// let k = TrainNumber::parse("K1234").unwrap();
/// assert_eq!(k.kind(), TrainKind::Conventional);
///
/// assert!(TrainNumber::parse("").is_err());
/// assert!(TrainNumber::parse("g1").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TrainNumber(String);

impl TrainNumber {
    /// Parse a train number.
    ///
    /// Must be 1-8 ASCII uppercase letters or digits, starting with either.
    pub fn parse(s: &str) -> Result<Self, InvalidTrainNumber> {
        if s.is_empty() {
            return Err(InvalidTrainNumber {
                reason: "must not be empty",
            });
        }
        if s.len() > MAX_LEN {
            return Err(InvalidTrainNumber {
                reason: "must be at most 8 characters",
            });
        }
        if !s
            .bytes()
            .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit())
        {
            return Err(InvalidTrainNumber {
                reason: "must be uppercase ASCII letters or digits",
            });
        }
        Ok(Self(s.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Classify the train by its leading letter.
    pub fn kind(&self) -> TrainKind {
        match self.0.as_bytes().first() {
            Some(b'G') | Some(b'C') => TrainKind::HighSpeed,
            Some(b'D') => TrainKind::Emu,
            _ => TrainKind::Conventional,
        }
    }
}

impl fmt::Display for TrainNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for TrainNumber {
    type Error = InvalidTrainNumber;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<TrainNumber> for String {
    fn from(value: TrainNumber) -> Self {
        value.0
    }
}

/// Broad train category, derived from the train number prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrainKind {
    /// `G` (high-speed) and `C` (intercity) trains.
    HighSpeed,
    /// `D` trains.
    Emu,
    /// Everything else: Z, T, K, Y, S and all-digit numbers.
    Conventional,
}

/// Which trains a query should keep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrainFilter {
    #[default]
    All,
    #[serde(alias = "gc")]
    HighSpeed,
    #[serde(alias = "d")]
    Emu,
    #[serde(alias = "other")]
    Conventional,
}

impl TrainFilter {
    /// Whether a train passes this filter.
    pub fn matches(&self, train: &TrainNumber) -> bool {
        match self {
            TrainFilter::All => true,
            TrainFilter::HighSpeed => train.kind() == TrainKind::HighSpeed,
            TrainFilter::Emu => train.kind() == TrainKind::Emu,
            TrainFilter::Conventional => train.kind() == TrainKind::Conventional,
        }
    }

    /// Short slug used in query strings.
    pub fn slug(&self) -> &'static str {
        match self {
            TrainFilter::All => "all",
            TrainFilter::HighSpeed => "gc",
            TrainFilter::Emu => "d",
            TrainFilter::Conventional => "other",
        }
    }

    /// Human-readable label.
    pub fn label(&self) -> &'static str {
        match self {
            TrainFilter::All => "全部",
            TrainFilter::HighSpeed => "高铁",
            TrainFilter::Emu => "动车",
            TrainFilter::Conventional => "普通列车",
        }
    }

    pub const ALL: [TrainFilter; 4] = [
        TrainFilter::All,
        TrainFilter::HighSpeed,
        TrainFilter::Emu,
        TrainFilter::Conventional,
    ];
}

/// Error returned when a train filter name is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown train type: {0}")]
pub struct UnknownTrainFilter(pub String);

impl FromStr for TrainFilter {
    type Err = UnknownTrainFilter;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        TrainFilter::ALL
            .into_iter()
            .find(|f| f.slug().eq_ignore_ascii_case(trimmed) || f.label() == trimmed)
            .or(match trimmed.to_ascii_lowercase().as_str() {
                "" => Some(TrainFilter::All),
                "high_speed" | "g" => Some(TrainFilter::HighSpeed),
                "emu" => Some(TrainFilter::Emu),
                "conventional" => Some(TrainFilter::Conventional),
                _ => None,
            })
            .ok_or_else(|| UnknownTrainFilter(trimmed.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn train(s: &str) -> TrainNumber {
        TrainNumber::parse(s).unwrap()
    }

    #[test]
    fn kinds_by_prefix() {
        assert_eq!(train("G1").kind(), TrainKind::HighSpeed);
        assert_eq!(train("C2001").kind(), TrainKind::HighSpeed);
        assert_eq!(train("D3105").kind(), TrainKind::Emu);
        assert_eq!(train("Z5").kind(), TrainKind::Conventional);
        assert_eq!(train("T179").kind(), TrainKind::Conventional);
        assert_eq!(train("K1234").kind(), TrainKind::Conventional);
        assert_eq!(train("1461").kind(), TrainKind::Conventional);
    }

    #[test]
    fn rejects_bad_numbers() {
        assert!(TrainNumber::parse("").is_err());
        assert!(TrainNumber::parse("g1").is_err());
        assert!(TrainNumber::parse("G 1").is_err());
        assert!(TrainNumber::parse("G123456789").is_err());
    }

    #[test]
    fn filter_matches() {
        let g = train("G1");
        let d = train("D5");
        let k = train("K9");

        assert!(TrainFilter::All.matches(&g));
        assert!(TrainFilter::All.matches(&k));

        assert!(TrainFilter::HighSpeed.matches(&g));
        assert!(!TrainFilter::HighSpeed.matches(&d));

        assert!(TrainFilter::Emu.matches(&d));
        assert!(!TrainFilter::Emu.matches(&k));

        assert!(TrainFilter::Conventional.matches(&k));
        assert!(!TrainFilter::Conventional.matches(&g));
        assert!(!TrainFilter::Conventional.matches(&d));
    }

    #[test]
    fn filter_from_str() {
        assert_eq!("all".parse::<TrainFilter>().unwrap(), TrainFilter::All);
        assert_eq!("GC".parse::<TrainFilter>().unwrap(), TrainFilter::HighSpeed);
        assert_eq!("高铁".parse::<TrainFilter>().unwrap(), TrainFilter::HighSpeed);
        assert_eq!("动车".parse::<TrainFilter>().unwrap(), TrainFilter::Emu);
        assert_eq!(
            "普通列车".parse::<TrainFilter>().unwrap(),
            TrainFilter::Conventional
        );
        assert_eq!("".parse::<TrainFilter>().unwrap(), TrainFilter::All);
        assert!("bullet".parse::<TrainFilter>().is_err());
    }

    #[test]
    fn serde_roundtrip_validates() {
        let json = serde_json::to_string(&train("G1")).unwrap();
        assert_eq!(json, "\"G1\"");
        assert!(serde_json::from_str::<TrainNumber>("\"g1\"").is_err());
    }
}
