// Cadence parsing and next-fire calculation
//
// The registrar supports two cadences: daily at a fixed time, or weekly on a
// fixed weekday at a fixed time. Next-fire times are evaluated in the task's
// configured timezone and reported in UTC.

use crate::errors::ScheduleError;
use chrono::{DateTime, Utc, Weekday};
use chrono_tz::Tz;
use cron::Schedule as CronSchedule;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Wall-clock time of day in HH:MM form
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TimeOfDay {
    pub hour: u8,
    pub minute: u8,
}

impl TimeOfDay {
    pub fn new(hour: u8, minute: u8) -> Result<Self, ScheduleError> {
        if hour > 23 || minute > 59 {
            return Err(ScheduleError::InvalidTimeOfDay {
                value: format!("{hour:02}:{minute:02}"),
                reason: "hour must be 0-23 and minute 0-59".to_string(),
            });
        }
        Ok(Self { hour, minute })
    }
}

impl FromStr for TimeOfDay {
    type Err = ScheduleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| ScheduleError::InvalidTimeOfDay {
            value: s.to_string(),
            reason: reason.to_string(),
        };
        let (h, m) = s
            .split_once(':')
            .ok_or_else(|| invalid("expected HH:MM"))?;
        let hour: u8 = h.parse().map_err(|_| invalid("hour is not a number"))?;
        let minute: u8 = m.parse().map_err(|_| invalid("minute is not a number"))?;
        Self::new(hour, minute)
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

impl TryFrom<String> for TimeOfDay {
    type Error = ScheduleError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TimeOfDay> for String {
    fn from(value: TimeOfDay) -> Self {
        value.to_string()
    }
}

/// Cadence defines when the registered task fires
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Cadence {
    Daily {
        at: TimeOfDay,
    },
    Weekly {
        #[serde(
            serialize_with = "serialize_weekday",
            deserialize_with = "deserialize_weekday"
        )]
        weekday: Weekday,
        at: TimeOfDay,
    },
}

impl Cadence {
    /// Render the cadence as a six-field cron expression (with seconds)
    pub fn to_cron_expression(&self) -> String {
        match self {
            Cadence::Daily { at } => format!("0 {} {} * * *", at.minute, at.hour),
            Cadence::Weekly { weekday, at } => format!(
                "0 {} {} * * {}",
                at.minute,
                at.hour,
                weekday_token(*weekday)
            ),
        }
    }

    pub fn time_of_day(&self) -> TimeOfDay {
        match self {
            Cadence::Daily { at } | Cadence::Weekly { at, .. } => *at,
        }
    }

    /// Calculate the next fire time strictly after `after`, evaluated in `timezone`
    pub fn next_fire_after(
        &self,
        timezone: Tz,
        after: DateTime<Utc>,
    ) -> Result<DateTime<Utc>, ScheduleError> {
        let expression = self.to_cron_expression();
        let schedule = parse_cron_expression(&expression)?;

        let after_in_tz = after.with_timezone(&timezone);
        let next_in_tz =
            schedule
                .after(&after_in_tz)
                .next()
                .ok_or_else(|| ScheduleError::NoNextFire {
                    cadence: self.label().to_string(),
                })?;

        Ok(next_in_tz.with_timezone(&Utc))
    }

    pub fn label(&self) -> &'static str {
        match self {
            Cadence::Daily { .. } => "daily",
            Cadence::Weekly { .. } => "weekly",
        }
    }
}

impl fmt::Display for Cadence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cadence::Daily { at } => write!(f, "daily at {at}"),
            Cadence::Weekly { weekday, at } => {
                write!(f, "weekly on {} at {at}", weekday_token(*weekday))
            }
        }
    }
}

/// Parse and validate a cron expression
pub fn parse_cron_expression(expression: &str) -> Result<CronSchedule, ScheduleError> {
    CronSchedule::from_str(expression).map_err(|e| ScheduleError::InvalidCronExpression {
        expression: expression.to_string(),
        reason: e.to_string(),
    })
}

/// Parse a timezone name like "America/New_York"
pub fn parse_timezone(name: &str) -> Result<Tz, ScheduleError> {
    name.parse::<Tz>()
        .map_err(|_| ScheduleError::InvalidTimezone(name.to_string()))
}

/// Parse a weekday name ("mon", "monday", case-insensitive)
pub fn parse_weekday(name: &str) -> Result<Weekday, ScheduleError> {
    name.parse::<Weekday>()
        .map_err(|_| ScheduleError::InvalidWeekday(name.to_string()))
}

/// Three-letter uppercase token accepted by both cron expressions and schtasks /D
pub fn weekday_token(weekday: Weekday) -> &'static str {
    match weekday {
        Weekday::Mon => "MON",
        Weekday::Tue => "TUE",
        Weekday::Wed => "WED",
        Weekday::Thu => "THU",
        Weekday::Fri => "FRI",
        Weekday::Sat => "SAT",
        Weekday::Sun => "SUN",
    }
}

fn serialize_weekday<S: Serializer>(weekday: &Weekday, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(weekday_token(*weekday))
}

fn deserialize_weekday<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Weekday, D::Error> {
    let name = String::deserialize(deserializer)?;
    parse_weekday(&name).map_err(serde::de::Error::custom)
}
