//! Seat classes and remaining-ticket availability.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A bookable seat class on a left-ticket record.
///
/// The declaration order is the canonical display order (most expensive
/// first), which is also the column order for exports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SeatClass {
    Business,
    FirstClass,
    SecondClass,
    SoftSleeper,
    HardSleeper,
    HardSeat,
    NoSeat,
}

impl SeatClass {
    /// All seat classes, in canonical order.
    pub const ALL: [SeatClass; 7] = [
        SeatClass::Business,
        SeatClass::FirstClass,
        SeatClass::SecondClass,
        SeatClass::SoftSleeper,
        SeatClass::HardSleeper,
        SeatClass::HardSeat,
        SeatClass::NoSeat,
    ];

    /// Offset of this class's remaining count within a `|`-separated record.
    pub fn field_index(&self) -> usize {
        match self {
            SeatClass::Business => 32,
            SeatClass::FirstClass => 31,
            SeatClass::SecondClass => 30,
            SeatClass::SoftSleeper => 23,
            SeatClass::HardSleeper => 28,
            SeatClass::HardSeat => 29,
            SeatClass::NoSeat => 26,
        }
    }

    /// Label as printed on the booking site.
    pub fn label(&self) -> &'static str {
        match self {
            SeatClass::Business => "商务座",
            SeatClass::FirstClass => "一等座",
            SeatClass::SecondClass => "二等座",
            SeatClass::SoftSleeper => "软卧",
            SeatClass::HardSleeper => "硬卧",
            SeatClass::HardSeat => "硬座",
            SeatClass::NoSeat => "无座",
        }
    }

    /// Slug used in query strings and JSON.
    pub fn slug(&self) -> &'static str {
        match self {
            SeatClass::Business => "business",
            SeatClass::FirstClass => "first-class",
            SeatClass::SecondClass => "second-class",
            SeatClass::SoftSleeper => "soft-sleeper",
            SeatClass::HardSleeper => "hard-sleeper",
            SeatClass::HardSeat => "hard-seat",
            SeatClass::NoSeat => "no-seat",
        }
    }
}

impl fmt::Display for SeatClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Error returned when a seat class name is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown seat class: {0}")]
pub struct UnknownSeatClass(pub String);

impl FromStr for SeatClass {
    type Err = UnknownSeatClass;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let lower = trimmed.to_ascii_lowercase();
        let alias = match lower.as_str() {
            "first" => Some(SeatClass::FirstClass),
            "second" => Some(SeatClass::SecondClass),
            "standing" | "站票" => Some(SeatClass::NoSeat),
            _ => None,
        };
        alias
            .or_else(|| {
                SeatClass::ALL
                    .into_iter()
                    .find(|c| c.slug() == lower || c.label() == trimmed)
            })
            .ok_or_else(|| UnknownSeatClass(trimmed.to_string()))
    }
}

/// Parse a comma-separated seat class list such as `second,hard-sleeper`.
///
/// Blank entries are ignored, so an empty string yields an empty list.
pub fn parse_seat_list(s: &str) -> Result<Vec<SeatClass>, UnknownSeatClass> {
    let mut classes = Vec::new();
    for part in s.split(',').filter(|p| !p.trim().is_empty()) {
        let class: SeatClass = part.parse()?;
        if !classes.contains(&class) {
            classes.push(class);
        }
    }
    Ok(classes)
}

/// Remaining tickets for one seat class.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Availability {
    /// `有`: plenty left, exact count not published.
    Plenty,
    /// A published remaining count.
    Count(u32),
    /// `无`, blank or zero: sold out.
    None,
    /// `--`: the train has no such class.
    NotOffered,
    /// `*`: not on sale yet.
    NotOnSale,
    /// Anything else the site prints (e.g. `候补`).
    Other(String),
}

impl Availability {
    /// Interpret a raw record field. Never fails.
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        match raw {
            "" | "无" => Availability::None,
            "--" => Availability::NotOffered,
            "有" => Availability::Plenty,
            "*" => Availability::NotOnSale,
            _ if raw.bytes().all(|b| b.is_ascii_digit()) => match raw.parse::<u32>() {
                Ok(0) => Availability::None,
                Ok(n) => Availability::Count(n),
                Err(_) => Availability::Plenty,
            },
            _ => Availability::Other(raw.to_string()),
        }
    }

    /// Whether at least one ticket can be bought.
    pub fn is_available(&self) -> bool {
        match self {
            Availability::Plenty => true,
            Availability::Count(n) => *n > 0,
            _ => false,
        }
    }
}

impl fmt::Display for Availability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Availability::Plenty => f.write_str("有"),
            Availability::Count(n) => write!(f, "{n}"),
            Availability::None => f.write_str("无"),
            Availability::NotOffered => f.write_str("--"),
            Availability::NotOnSale => f.write_str("*"),
            Availability::Other(s) => f.write_str(s),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_indices_are_distinct() {
        let mut indices: Vec<usize> = SeatClass::ALL.iter().map(|c| c.field_index()).collect();
        indices.sort_unstable();
        indices.dedup();
        assert_eq!(indices.len(), SeatClass::ALL.len());
        assert_eq!(indices.last(), Some(&32));
    }

    #[test]
    fn seat_class_from_str() {
        assert_eq!("second".parse::<SeatClass>().unwrap(), SeatClass::SecondClass);
        assert_eq!(
            "hard-sleeper".parse::<SeatClass>().unwrap(),
            SeatClass::HardSleeper
        );
        assert_eq!("二等座".parse::<SeatClass>().unwrap(), SeatClass::SecondClass);
        assert_eq!("站票".parse::<SeatClass>().unwrap(), SeatClass::NoSeat);
        assert_eq!("Business".parse::<SeatClass>().unwrap(), SeatClass::Business);
        assert!("economy".parse::<SeatClass>().is_err());
    }

    #[test]
    fn seat_list_dedups_and_skips_blanks() {
        let list = parse_seat_list("second, ,hard-seat,second").unwrap();
        assert_eq!(list, vec![SeatClass::SecondClass, SeatClass::HardSeat]);
        assert!(parse_seat_list("").unwrap().is_empty());
        assert!(parse_seat_list("second,bogus").is_err());
    }

    #[test]
    fn availability_parse() {
        assert_eq!(Availability::parse(""), Availability::None);
        assert_eq!(Availability::parse("无"), Availability::None);
        assert_eq!(Availability::parse("0"), Availability::None);
        assert_eq!(Availability::parse("有"), Availability::Plenty);
        assert_eq!(Availability::parse("12"), Availability::Count(12));
        assert_eq!(Availability::parse(" 3 "), Availability::Count(3));
        assert_eq!(Availability::parse("*"), Availability::NotOnSale);
        assert_eq!(
            Availability::parse("候补"),
            Availability::Other("候补".to_string())
        );
    }

    #[test]
    fn availability_is_available() {
        assert!(Availability::Plenty.is_available());
        assert!(Availability::Count(1).is_available());
        assert!(!Availability::Count(0).is_available());
        assert!(!Availability::None.is_available());
        assert!(!Availability::NotOnSale.is_available());
        assert!(!Availability::Other("候补".into()).is_available());
    }

    #[test]
    fn availability_display() {
        assert_eq!(Availability::Plenty.to_string(), "有");
        assert_eq!(Availability::Count(7).to_string(), "7");
        assert_eq!(Availability::None.to_string(), "无");
        assert_eq!(Availability::NotOnSale.to_string(), "*");
    }

    #[test]
    fn missing_class_is_not_sold_out() {
        let missing = Availability::parse("--");
        assert_eq!(missing, Availability::NotOffered);
        assert_ne!(missing, Availability::parse("无"));
        assert!(!missing.is_available());
        assert_eq!(missing.to_string(), "--");
        assert_eq!(
            serde_json::to_value(&missing).unwrap(),
            serde_json::json!({ "kind": "not_offered" })
        );
    }
}
