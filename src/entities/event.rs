// 📅 Event & EventType entities

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, RosterError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventType {
    pub id: String,
    pub name: String,
    pub default_start_hour: u32,
    pub default_end_hour: u32,

    /// Attendance ratio that must be strictly exceeded
    pub minimum_required_ratio: f64,
}

impl EventType {
    pub fn new(name: &str, minimum_required_ratio: f64) -> Self {
        EventType {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.to_string(),
            default_start_hour: 19,
            default_end_hour: 22,
            minimum_required_ratio,
        }
    }

    pub fn with_default_hours(mut self, start_hour: u32, end_hour: u32) -> Self {
        self.default_start_hour = start_hour;
        self.default_end_hour = end_hour;
        self
    }

    /// Wraps past midnight when the end hour is earlier than the start hour
    pub fn default_duration_minutes(&self) -> i64 {
        let start = i64::from(self.default_start_hour);
        let end = i64::from(self.default_end_hour);
        let hours = if end >= start { end - start } else { end + 24 - start };
        hours * 60
    }

    pub fn is_named(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    pub name: String,
    pub event_type_id: String,
    pub start_dt: DateTime<Utc>,
    pub end_dt: DateTime<Utc>,
    pub duration_minutes: i64,
}

impl Event {
    pub fn new(
        name: &str,
        event_type_id: &str,
        start_dt: DateTime<Utc>,
        end_dt: DateTime<Utc>,
    ) -> Result<Self> {
        if end_dt < start_dt {
            return Err(RosterError::invariant(format!(
                "event '{}' ends before it starts",
                name
            )));
        }

        Ok(Event {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.to_string(),
            event_type_id: event_type_id.to_string(),
            start_dt,
            end_dt,
            duration_minutes: (end_dt - start_dt).num_minutes(),
        })
    }

    /// Event scheduled from its type's default hours on the given start
    pub fn from_type_defaults(
        name: &str,
        event_type: &EventType,
        start_dt: DateTime<Utc>,
    ) -> Result<Self> {
        let end_dt = start_dt + Duration::minutes(event_type.default_duration_minutes());
        Event::new(name, &event_type.id, start_dt, end_dt)
    }

    /// Span between start and end, not `duration_minutes`
    pub fn duration_seconds(&self) -> i64 {
        (self.end_dt - self.start_dt).num_seconds()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_event_duration() {
        let start = Utc.with_ymd_and_hms(2024, 1, 5, 19, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 1, 5, 20, 0, 0).unwrap();
        let event = Event::new("Coop", "type", start, end).unwrap();
        assert_eq!(event.duration_seconds(), 3600);
        assert_eq!(event.duration_minutes, 60);
    }

    #[test]
    fn test_event_end_before_start_rejected() {
        let start = Utc.with_ymd_and_hms(2024, 1, 5, 20, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 1, 5, 19, 0, 0).unwrap();
        assert!(Event::new("Broken", "type", start, end).is_err());
    }

    #[test]
    fn test_default_duration_wraps_midnight() {
        let late = EventType::new("Late Op", 0.5).with_default_hours(22, 1);
        assert_eq!(late.default_duration_minutes(), 180);

        let training = EventType::new("Training", 0.5).with_default_hours(18, 20);
        assert_eq!(training.default_duration_minutes(), 120);
        assert!(training.is_named("TRAINING"));
    }

    #[test]
    fn test_event_from_type_defaults() {
        let late = EventType::new("Late Op", 0.5).with_default_hours(22, 1);
        let start = Utc.with_ymd_and_hms(2024, 1, 5, 22, 0, 0).unwrap();
        let event = Event::from_type_defaults("Late Op #1", &late, start).unwrap();
        assert_eq!(event.end_dt, Utc.with_ymd_and_hms(2024, 1, 6, 1, 0, 0).unwrap());
        assert_eq!(event.duration_minutes, 180);
    }
}
