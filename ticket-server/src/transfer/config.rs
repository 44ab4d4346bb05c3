//! Transfer search configuration.

use crate::domain::{RideDuration, StationCode};

/// Hubs tried when no list is configured: Nanning, Guilin, Guilin North,
/// Liuzhou, Hangzhou, Shanghai and Beijing.
pub const DEFAULT_HUBS: [&str; 7] = ["NNZ", "GLZ", "GBZ", "LZQ", "HZH", "SHH", "BJP"];

/// Parameters for one-change itinerary search.
#[derive(Debug, Clone)]
pub struct TransferConfig {
    /// Stations tried as the change point.
    pub hubs: Vec<StationCode>,

    /// Shortest acceptable layover (minutes).
    pub min_layover_mins: u32,

    /// Longest acceptable layover (minutes).
    pub max_layover_mins: u32,

    /// Shortest layover when the second train leaves from a different
    /// station in the hub city (minutes).
    pub min_cross_station_layover_mins: u32,

    /// Maximum number of plans returned.
    pub max_results: usize,
}

impl TransferConfig {
    pub fn with_hubs(mut self, hubs: Vec<StationCode>) -> Self {
        self.hubs = hubs;
        self
    }

    pub fn with_layover(mut self, min_mins: u32, max_mins: u32) -> Self {
        self.min_layover_mins = min_mins;
        self.max_layover_mins = max_mins;
        self
    }

    pub fn with_max_results(mut self, n: usize) -> Self {
        self.max_results = n;
        self
    }

    pub fn min_layover(&self) -> RideDuration {
        RideDuration::from_minutes(self.min_layover_mins)
    }

    pub fn max_layover(&self) -> RideDuration {
        RideDuration::from_minutes(self.max_layover_mins)
    }

    /// Whether a layover of `mins` is acceptable.
    pub fn accepts_layover(&self, mins: u32, cross_station: bool) -> bool {
        let min = if cross_station {
            self.min_layover_mins.max(self.min_cross_station_layover_mins)
        } else {
            self.min_layover_mins
        };
        mins >= min && mins <= self.max_layover_mins
    }
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            hubs: DEFAULT_HUBS
                .iter()
                .filter_map(|c| StationCode::parse(c).ok())
                .collect(),
            min_layover_mins: 20,
            max_layover_mins: 720, // 12 hours
            min_cross_station_layover_mins: 60,
            max_results: 50,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = TransferConfig::default();
        assert_eq!(config.hubs.len(), 7);
        assert_eq!(config.hubs[0].as_str(), "NNZ");
        assert_eq!(config.min_layover().minutes(), 20);
        assert_eq!(config.max_layover().minutes(), 720);
        assert_eq!(config.min_cross_station_layover_mins, 60);
        assert_eq!(config.max_results, 50);
    }

    #[test]
    fn layover_bounds_are_inclusive() {
        let config = TransferConfig::default();
        assert!(!config.accepts_layover(19, false));
        assert!(config.accepts_layover(20, false));
        assert!(config.accepts_layover(720, false));
        assert!(!config.accepts_layover(721, false));
    }

    #[test]
    fn cross_station_needs_longer_layover() {
        let config = TransferConfig::default();
        assert!(!config.accepts_layover(45, true));
        assert!(config.accepts_layover(60, true));
    }

    #[test]
    fn builder_setters() {
        let config = TransferConfig::default()
            .with_hubs(vec![StationCode::parse("SHH").unwrap()])
            .with_layover(10, 60)
            .with_max_results(3);
        assert_eq!(config.hubs.len(), 1);
        assert!(config.accepts_layover(10, false));
        assert!(!config.accepts_layover(61, false));
        assert_eq!(config.max_results, 3);
    }
}
