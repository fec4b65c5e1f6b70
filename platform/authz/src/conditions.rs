//! Condition language attached to conditional permission grants.
//!
//! Stored as JSON next to the grant and evaluated by the store at access
//! time:
//!
//! ```json
//! {"time_window": {"start": "08:00", "end": "17:30"},
//!  "days": ["mon", "tue", "wed", "thu", "fri"],
//!  "locations": ["warehouse-a"]}
//! ```
//!
//! Every predicate that is present must hold. An absent predicate places no
//! restriction.

use chrono::{DateTime, Datelike, FixedOffset, NaiveTime, Timelike, Weekday};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Conditions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_window: Option<TimeWindow>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub days: Option<Vec<Weekday>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locations: Option<Vec<String>>,
}

/// Half-open `[start, end)` interval in the caller's local time. A window
/// whose end is earlier than its start wraps past midnight; equal bounds
/// cover the whole day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    #[serde(with = "clock")]
    pub start: NaiveTime,
    #[serde(with = "clock")]
    pub end: NaiveTime,
}

impl TimeWindow {
    pub fn contains(&self, time: NaiveTime) -> bool {
        if self.start == self.end {
            true
        } else if self.start < self.end {
            self.start <= time && time < self.end
        } else {
            time >= self.start || time < self.end
        }
    }
}

/// Facts about a single access attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessContext {
    /// Local time of the attempt; the offset decides day and time of day.
    pub at: DateTime<FixedOffset>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

impl AccessContext {
    pub fn new(at: DateTime<FixedOffset>) -> Self {
        Self { at, location: None }
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }
}

impl Conditions {
    pub fn evaluate(&self, ctx: &AccessContext) -> bool {
        if let Some(window) = &self.time_window {
            let time = ctx.at.time();
            let time = NaiveTime::from_hms_opt(time.hour(), time.minute(), time.second())
                .unwrap_or(time);
            if !window.contains(time) {
                return false;
            }
        }
        if let Some(days) = &self.days {
            if !days.contains(&ctx.at.weekday()) {
                return false;
            }
        }
        if let Some(locations) = &self.locations {
            let Some(location) = ctx.location.as_deref() else {
                return false;
            };
            let location = location.trim();
            if !locations
                .iter()
                .any(|allowed| allowed.trim().eq_ignore_ascii_case(location))
            {
                return false;
            }
        }
        true
    }
}

mod clock {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn serialize<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&time.format("%H:%M").to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        let raw = raw.trim();
        NaiveTime::parse_from_str(raw, "%H:%M:%S")
            .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M"))
            .map_err(|err| D::Error::custom(format!("invalid time {raw:?}: {err}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn at(rfc3339: &str) -> AccessContext {
        AccessContext::new(DateTime::parse_from_rfc3339(rfc3339).unwrap())
    }

    fn parse(value: serde_json::Value) -> Conditions {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn empty_conditions_always_hold() {
        assert!(Conditions::default().evaluate(&at("2026-03-01T03:00:00Z")));
        assert!(parse(json!({})).evaluate(&at("2026-03-01T03:00:00Z")));
    }

    #[test]
    fn business_hours_window() {
        let cond = parse(json!({"time_window": {"start": "08:00", "end": "17:00"}}));
        assert!(cond.evaluate(&at("2026-03-02T08:00:00+03:00")));
        assert!(cond.evaluate(&at("2026-03-02T16:59:59+03:00")));
        assert!(!cond.evaluate(&at("2026-03-02T17:00:00+03:00")));
        assert!(!cond.evaluate(&at("2026-03-02T07:59:00+03:00")));
    }

    #[test]
    fn window_uses_local_offset() {
        let cond = parse(json!({"time_window": {"start": "08:00", "end": "17:00"}}));
        // 06:00 UTC is 09:00 in UTC+3.
        assert!(!cond.evaluate(&at("2026-03-02T06:00:00+00:00")));
        assert!(cond.evaluate(&at("2026-03-02T09:00:00+03:00")));
    }

    #[test]
    fn overnight_window_wraps() {
        let cond = parse(json!({"time_window": {"start": "22:00", "end": "06:00"}}));
        assert!(cond.evaluate(&at("2026-03-02T23:30:00Z")));
        assert!(cond.evaluate(&at("2026-03-03T05:59:00Z")));
        assert!(!cond.evaluate(&at("2026-03-03T12:00:00Z")));
    }

    #[test]
    fn weekday_restriction() {
        let cond = parse(json!({"days": ["mon", "tue", "wed", "thu", "fri"]}));
        // 2026-03-02 is a Monday, 2026-03-07 a Saturday.
        assert!(cond.evaluate(&at("2026-03-02T10:00:00Z")));
        assert!(!cond.evaluate(&at("2026-03-07T10:00:00Z")));
    }

    #[test]
    fn location_restriction() {
        let cond = parse(json!({"locations": ["Warehouse-A", "cold-room"]}));
        let base = at("2026-03-02T10:00:00Z");
        assert!(cond.evaluate(&base.clone().with_location("warehouse-a")));
        assert!(!cond.evaluate(&base.clone().with_location("dock")));
        assert!(!cond.evaluate(&base));
    }

    #[test]
    fn empty_location_list_denies() {
        let cond = parse(json!({"locations": []}));
        assert!(!cond.evaluate(&at("2026-03-02T10:00:00Z").with_location("anywhere")));
    }

    #[test]
    fn all_predicates_must_hold() {
        let cond = parse(json!({
            "time_window": {"start": "08:00", "end": "17:00"},
            "days": ["mon"],
            "locations": ["clinic"]
        }));
        assert!(cond.evaluate(&at("2026-03-02T09:00:00Z").with_location("clinic")));
        assert!(!cond.evaluate(&at("2026-03-03T09:00:00Z").with_location("clinic")));
        assert!(!cond.evaluate(&at("2026-03-02T19:00:00Z").with_location("clinic")));
    }

    #[test]
    fn malformed_times_are_rejected() {
        let result: Result<Conditions, _> =
            serde_json::from_value(json!({"time_window": {"start": "25:00", "end": "06:00"}}));
        assert!(result.is_err());
    }
}
