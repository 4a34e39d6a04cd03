//! Configuration types for the timetable system.
//!
//! Everything is read from a single TOML file; every field has a default so
//! an empty file (or no file) yields a 5 × 7 week with 40 minute lessons.

use chrono::{Duration, NaiveTime};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::models::TimeSlot;

/// Errors raised while loading or validating configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Top-level configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TimetableConfig {
    pub grid: GridConfig,
    pub clock: ClockConfig,
    pub engine: EngineConfig,
    pub store: StoreConfig,
}

impl TimetableConfig {
    /// Load configuration from a TOML file and validate it.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from TOML text and validate it.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: TimetableConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check grid bounds and that the clock covers every period.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.grid.validate()?;
        self.clock.build(self.grid.periods_per_day)?;
        Ok(())
    }

    /// The period clock for the configured grid.
    pub fn period_clock(&self) -> Result<PeriodClock, ConfigError> {
        self.clock.build(self.grid.periods_per_day)
    }
}

/// Shape of the weekly grid.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    /// School days per week, starting Monday (1-7).
    pub days: u8,
    pub periods_per_day: u8,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            days: 5,
            periods_per_day: 7,
        }
    }
}

impl GridConfig {
    pub fn new(days: u8, periods_per_day: u8) -> Self {
        Self {
            days,
            periods_per_day,
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=7).contains(&self.days) {
            return Err(ConfigError::Invalid(format!(
                "grid.days must be between 1 and 7, got {}",
                self.days
            )));
        }
        if self.periods_per_day == 0 {
            return Err(ConfigError::Invalid(
                "grid.periods_per_day must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// All slots of the week in iteration order (day-major, then period).
    pub fn slots(&self) -> Vec<TimeSlot> {
        (0..self.days)
            .flat_map(|day| (0..self.periods_per_day).map(move |period| TimeSlot::new(day, period)))
            .collect()
    }

    pub fn slot_count(&self) -> usize {
        self.days as usize * self.periods_per_day as usize
    }

    pub fn contains(&self, slot: TimeSlot) -> bool {
        slot.day < self.days && slot.period < self.periods_per_day
    }
}

/// Start and end clock time of one period.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodTimes {
    #[serde(with = "hhmm")]
    pub start: NaiveTime,
    #[serde(with = "hhmm")]
    pub end: NaiveTime,
}

/// Period-to-clock-time configuration.
///
/// When `periods` is empty the table is generated from `first_start`,
/// `lesson_minutes` and `break_minutes`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ClockConfig {
    #[serde(with = "hhmm")]
    pub first_start: NaiveTime,
    pub lesson_minutes: u32,
    pub break_minutes: u32,
    pub periods: Vec<PeriodTimes>,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            first_start: NaiveTime::from_hms_opt(8, 0, 0).unwrap_or_default(),
            lesson_minutes: 40,
            break_minutes: 5,
            periods: Vec::new(),
        }
    }
}

impl ClockConfig {
    /// Build the period clock for `periods_per_day` periods.
    pub fn build(&self, periods_per_day: u8) -> Result<PeriodClock, ConfigError> {
        let needed = periods_per_day as usize;
        let periods = if self.periods.is_empty() {
            self.generate(needed)?
        } else {
            if self.periods.len() < needed {
                return Err(ConfigError::Invalid(format!(
                    "clock.periods lists {} periods but the grid has {}",
                    self.periods.len(),
                    needed
                )));
            }
            self.periods[..needed].to_vec()
        };

        for (i, p) in periods.iter().enumerate() {
            if p.start >= p.end {
                return Err(ConfigError::Invalid(format!(
                    "period {} ends ({}) before it starts ({})",
                    i + 1,
                    p.end,
                    p.start
                )));
            }
        }
        for (i, pair) in periods.windows(2).enumerate() {
            if pair[1].start < pair[0].end {
                return Err(ConfigError::Invalid(format!(
                    "period {} overlaps period {}",
                    i + 2,
                    i + 1
                )));
            }
        }

        Ok(PeriodClock { periods })
    }

    fn generate(&self, count: usize) -> Result<Vec<PeriodTimes>, ConfigError> {
        if self.lesson_minutes == 0 {
            return Err(ConfigError::Invalid(
                "clock.lesson_minutes must be positive".to_string(),
            ));
        }
        let lesson = Duration::minutes(self.lesson_minutes as i64);
        let step = Duration::minutes((self.lesson_minutes + self.break_minutes) as i64);

        let mut periods = Vec::with_capacity(count);
        let mut start = self.first_start;
        for i in 0..count {
            let (end, wrapped) = start.overflowing_add_signed(lesson);
            if wrapped != 0 {
                return Err(ConfigError::Invalid(format!(
                    "period {} runs past midnight",
                    i + 1
                )));
            }
            periods.push(PeriodTimes { start, end });
            let (next, wrapped) = start.overflowing_add_signed(step);
            if wrapped != 0 && i + 1 < count {
                return Err(ConfigError::Invalid(format!(
                    "period {} starts past midnight",
                    i + 2
                )));
            }
            start = next;
        }
        Ok(periods)
    }
}

/// Resolved period-to-clock-time table shared by every consumer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PeriodClock {
    periods: Vec<PeriodTimes>,
}

impl PeriodClock {
    /// Clock times of a 0-based period index.
    pub fn times(&self, period: u8) -> Option<PeriodTimes> {
        self.periods.get(period as usize).copied()
    }
}

/// Search limits and verbosity for the assignment engine.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Explicit undo budget; overrides `budget_factor` when set.
    pub backtrack_budget: Option<usize>,
    /// Budget per grid cell (slot × class) when no explicit budget is set.
    pub budget_factor: usize,
    /// Longest ejection chain; defaults to the slot count.
    pub max_chain_depth: Option<usize>,
    /// Verbosity level: 0=silent, 1=changes, 2=checks, 3=debug.
    pub verbosity: u8,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            backtrack_budget: None,
            budget_factor: 50,
            max_chain_depth: None,
            verbosity: 0,
        }
    }
}

impl EngineConfig {
    /// Undo budget for a grid of `slot_count` slots and `class_count` classes.
    pub fn budget_for(&self, slot_count: usize, class_count: usize) -> usize {
        self.backtrack_budget.unwrap_or_else(|| {
            self.budget_factor
                .saturating_mul(slot_count)
                .saturating_mul(class_count.max(1))
        })
    }

    /// Maximum ejection chain depth for a grid of `slot_count` slots.
    pub fn chain_depth_for(&self, slot_count: usize) -> usize {
        self.max_chain_depth.unwrap_or(slot_count).max(1)
    }
}

/// Where the file-backed store keeps its data.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub dir: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("timetables"),
        }
    }
}

/// `HH:MM` clock times (seconds accepted on input).
mod hhmm {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&time.format("%H:%M").to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
        let s = String::deserialize(deserializer)?;
        NaiveTime::parse_from_str(&s, "%H:%M")
            .or_else(|_| NaiveTime::parse_from_str(&s, "%H:%M:%S"))
            .map_err(|e| serde::de::Error::custom(format!("invalid clock time {s:?}: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = TimetableConfig::from_toml_str("").unwrap();
        assert_eq!(config.grid.slot_count(), 35);
        assert_eq!(config.engine.budget_factor, 50);

        let clock = config.period_clock().unwrap();
        assert!(clock.times(6).is_some());
        assert!(clock.times(7).is_none());
        assert_eq!(
            clock.times(0),
            Some(PeriodTimes {
                start: t(8, 0),
                end: t(8, 40)
            })
        );
        assert_eq!(
            clock.times(1),
            Some(PeriodTimes {
                start: t(8, 45),
                end: t(9, 25)
            })
        );
        assert_eq!(clock.times(7), None);
    }

    #[test]
    fn test_explicit_periods() {
        let config = TimetableConfig::from_toml_str(
            r#"
            [grid]
            days = 2
            periods_per_day = 2

            [[clock.periods]]
            start = "09:00"
            end = "09:50"

            [[clock.periods]]
            start = "10:00"
            end = "10:50"
            "#,
        )
        .unwrap();

        let clock = config.period_clock().unwrap();
        assert_eq!(clock.times(1).unwrap().start, t(10, 0));
        assert_eq!(config.grid.slots().len(), 4);
    }

    #[test]
    fn test_rejects_short_clock_table() {
        let err = TimetableConfig::from_toml_str(
            r#"
            [grid]
            periods_per_day = 3

            [[clock.periods]]
            start = "09:00"
            end = "09:50"
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_rejects_overlapping_periods() {
        let err = TimetableConfig::from_toml_str(
            r#"
            [grid]
            periods_per_day = 2

            [[clock.periods]]
            start = "09:00"
            end = "09:50"

            [[clock.periods]]
            start = "09:30"
            end = "10:20"
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("overlaps"));
    }

    #[test]
    fn test_rejects_bad_grid() {
        let err = TimetableConfig::from_toml_str("[grid]\ndays = 8\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_generated_clock_past_midnight() {
        let clock = ClockConfig {
            first_start: t(21, 0),
            lesson_minutes: 60,
            break_minutes: 0,
            periods: vec![],
        };
        assert!(clock.build(2).is_ok());
        assert!(clock.build(3).is_err());
    }

    #[test]
    fn test_budget_and_depth() {
        let engine = EngineConfig::default();
        assert_eq!(engine.budget_for(35, 4), 50 * 35 * 4);
        assert_eq!(engine.chain_depth_for(35), 35);

        let engine = EngineConfig {
            backtrack_budget: Some(10),
            max_chain_depth: Some(0),
            ..EngineConfig::default()
        };
        assert_eq!(engine.budget_for(35, 4), 10);
        assert_eq!(engine.chain_depth_for(35), 1);
    }

    #[test]
    fn test_grid_slots_order() {
        let grid = GridConfig::new(2, 2);
        assert_eq!(
            grid.slots(),
            vec![
                TimeSlot::new(0, 0),
                TimeSlot::new(0, 1),
                TimeSlot::new(1, 0),
                TimeSlot::new(1, 1),
            ]
        );
        assert!(grid.contains(TimeSlot::new(1, 1)));
        assert!(!grid.contains(TimeSlot::new(2, 0)));
    }
}
