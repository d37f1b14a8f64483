//! Event and RSVP models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Community event that members can reserve a seat for
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Event {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub location: Option<String>,
    /// When the event takes place
    pub starts_at: DateTime<Utc>,
    /// Maximum number of reservations; `None` or 0 means unlimited
    pub capacity: Option<i32>,
    pub cover_image: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Event {
    /// Positive capacity, if one is set
    pub fn seat_limit(&self) -> Option<i64> {
        self.capacity.filter(|c| *c > 0).map(i64::from)
    }

    /// Whether the event date lies before `now`
    pub fn has_ended_at(&self, now: DateTime<Utc>) -> bool {
        self.starts_at < now
    }

    /// Seats still free given `reserved` existing RSVPs; `None` when unlimited
    pub fn spots_left(&self, reserved: i64) -> Option<i64> {
        self.seat_limit().map(|limit| (limit - reserved).max(0))
    }
}

/// Event together with its reservation tally
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct EventWithRsvps {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub event: Event,
    pub rsvp_count: i64,
    /// Free seats, `None` when the event is unlimited
    #[sqlx(skip)]
    pub spots_left: Option<i64>,
}

impl EventWithRsvps {
    pub fn new(event: Event, rsvp_count: i64) -> Self {
        let spots_left = event.spots_left(rsvp_count);
        Self {
            event,
            rsvp_count,
            spots_left,
        }
    }

    /// Fill in `spots_left` after loading from the database
    pub fn with_spots(self) -> Self {
        Self::new(self.event, self.rsvp_count)
    }
}

/// Reservation of one user for one event, unique per pair
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Rsvp {
    pub id: i64,
    pub event_id: i64,
    pub user_id: i64,
    pub created_at: DateTime<Utc>,
}

/// Attendee row for the organizer's RSVP list
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Attendee {
    pub user_id: i64,
    pub name: String,
    pub email: String,
    pub reserved_at: DateTime<Utc>,
}

/// Input for creating an event
#[derive(Debug, Clone, Deserialize)]
pub struct CreateEventInput {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub location: Option<String>,
    pub starts_at: DateTime<Utc>,
    #[serde(default)]
    pub capacity: Option<i32>,
    #[serde(default)]
    pub cover_image: Option<String>,
}

/// Input for updating an event; absent fields are left unchanged
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateEventInput {
    pub title: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub starts_at: Option<DateTime<Utc>>,
    pub capacity: Option<i32>,
    pub cover_image: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn event(capacity: Option<i32>) -> Event {
        let now = Utc::now();
        Event {
            id: 1,
            title: "Meetup".into(),
            description: String::new(),
            location: None,
            starts_at: now + Duration::days(1),
            capacity,
            cover_image: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_zero_or_missing_capacity_is_unlimited() {
        assert_eq!(event(None).seat_limit(), None);
        assert_eq!(event(Some(0)).seat_limit(), None);
        assert_eq!(event(Some(-3)).seat_limit(), None);
        assert_eq!(event(Some(5)).seat_limit(), Some(5));
    }

    #[test]
    fn test_spots_left() {
        assert_eq!(event(Some(5)).spots_left(2), Some(3));
        assert_eq!(event(Some(5)).spots_left(9), Some(0));
        assert_eq!(event(None).spots_left(100), None);
    }

    #[test]
    fn test_event_with_rsvps_serializes_flat() {
        let view = EventWithRsvps::new(event(Some(3)), 1);
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["title"], "Meetup");
        assert_eq!(json["rsvp_count"], 1);
        assert_eq!(json["spots_left"], 2);
    }

    #[test]
    fn test_has_ended() {
        let e = event(None);
        assert!(!e.has_ended_at(Utc::now()));
        assert!(e.has_ended_at(e.starts_at + Duration::seconds(1)));
    }
}
