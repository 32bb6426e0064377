// 🎟️ Attendance Entity
//
// One row per (event, member). `attended_seconds` is measured presence.

use serde::{Deserialize, Serialize};

use super::{Event, EventType};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attendance {
    pub id: String,
    pub event_id: String,
    pub member_id: String,
    pub attended_seconds: i64,
}

impl Attendance {
    pub fn new(event_id: &str, member_id: &str, attended_seconds: i64) -> Self {
        Attendance {
            id: uuid::Uuid::new_v4().to_string(),
            event_id: event_id.to_string(),
            member_id: member_id.to_string(),
            attended_seconds,
        }
    }
}

/// Attendance joined with its event and event type, the shape every
/// adequacy calculation works on
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttendanceDetail {
    pub attendance: Attendance,
    pub event: Event,
    pub event_type: EventType,
}
