//! Event repository
//!
//! Database operations for events and their RSVPs. Uniqueness of an RSVP
//! per (user, event) is enforced by the `rsvps` table, not here.

use crate::db::{with_pool, DynDatabasePool, InsertedId};
use crate::models::{Attendee, Event, EventWithRsvps, Rsvp};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

#[async_trait]
pub trait EventRepository: Send + Sync {
    async fn create(&self, event: &Event) -> Result<Event>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Event>>;

    async fn update(&self, event: &Event) -> Result<Event>;

    async fn delete(&self, id: i64) -> Result<bool>;

    /// List events with their RSVP counts.
    ///
    /// With `starting_after` set only events at or after that instant are
    /// returned, soonest first; otherwise all events, latest first.
    async fn list(&self, starting_after: Option<DateTime<Utc>>) -> Result<Vec<EventWithRsvps>>;

    /// Number of RSVPs for an event
    async fn count_rsvps(&self, event_id: i64) -> Result<i64>;

    /// Insert an RSVP. Fails with a unique violation if the pair exists.
    async fn create_rsvp(&self, event_id: i64, user_id: i64) -> Result<Rsvp>;

    /// Remove an RSVP; returns false when the pair did not exist
    async fn delete_rsvp(&self, event_id: i64, user_id: i64) -> Result<bool>;

    async fn list_attendees(&self, event_id: i64) -> Result<Vec<Attendee>>;

    /// Events the user holds a reservation for, soonest first
    async fn list_for_user(&self, user_id: i64) -> Result<Vec<EventWithRsvps>>;
}

pub struct SqlxEventRepository {
    pool: DynDatabasePool,
}

impl SqlxEventRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn EventRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl EventRepository for SqlxEventRepository {
    async fn create(&self, event: &Event) -> Result<Event> {
        let now = Utc::now();

        let id = with_pool!(self.pool, |pool| {
            sqlx::query(
                r#"
                INSERT INTO events (title, description, location, starts_at, capacity, cover_image, created_at, updated_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&event.title)
            .bind(&event.description)
            .bind(&event.location)
            .bind(event.starts_at)
            .bind(event.capacity)
            .bind(&event.cover_image)
            .bind(now)
            .bind(now)
            .execute(pool)
            .await
            .context("Failed to create event")?
            .inserted_id()
        });

        Ok(Event {
            id,
            created_at: now,
            updated_at: now,
            ..event.clone()
        })
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Event>> {
        let event = with_pool!(self.pool, |pool| {
            sqlx::query_as::<_, Event>(
                r#"
                SELECT id, title, description, location, starts_at, capacity, cover_image, created_at, updated_at
                FROM events
                WHERE id = ?
                "#,
            )
            .bind(id)
            .fetch_optional(pool)
            .await
            .context("Failed to get event by ID")?
        });
        Ok(event)
    }

    async fn update(&self, event: &Event) -> Result<Event> {
        with_pool!(self.pool, |pool| {
            sqlx::query(
                r#"
                UPDATE events
                SET title = ?, description = ?, location = ?, starts_at = ?, capacity = ?, cover_image = ?,
                    updated_at = ?
                WHERE id = ?
                "#,
            )
            .bind(&event.title)
            .bind(&event.description)
            .bind(&event.location)
            .bind(event.starts_at)
            .bind(event.capacity)
            .bind(&event.cover_image)
            .bind(Utc::now())
            .bind(event.id)
            .execute(pool)
            .await
            .context("Failed to update event")?;
        });

        self.get_by_id(event.id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Event not found after update"))
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let affected = with_pool!(self.pool, |pool| {
            sqlx::query("DELETE FROM events WHERE id = ?")
                .bind(id)
                .execute(pool)
                .await
                .context("Failed to delete event")?
                .rows_affected()
        });
        Ok(affected > 0)
    }

    async fn list(&self, starting_after: Option<DateTime<Utc>>) -> Result<Vec<EventWithRsvps>> {
        let events = with_pool!(self.pool, |pool| {
            match starting_after {
                Some(after) => sqlx::query_as::<_, EventWithRsvps>(
                    r#"
                    SELECT e.id, e.title, e.description, e.location, e.starts_at, e.capacity, e.cover_image,
                           e.created_at, e.updated_at,
                           (SELECT COUNT(*) FROM rsvps r WHERE r.event_id = e.id) AS rsvp_count
                    FROM events e
                    WHERE e.starts_at >= ?
                    ORDER BY e.starts_at ASC, e.id ASC
                    "#,
                )
                .bind(after)
                .fetch_all(pool)
                .await
                .context("Failed to list upcoming events")?,
                None => sqlx::query_as::<_, EventWithRsvps>(
                    r#"
                    SELECT e.id, e.title, e.description, e.location, e.starts_at, e.capacity, e.cover_image,
                           e.created_at, e.updated_at,
                           (SELECT COUNT(*) FROM rsvps r WHERE r.event_id = e.id) AS rsvp_count
                    FROM events e
                    ORDER BY e.starts_at DESC, e.id DESC
                    "#,
                )
                .fetch_all(pool)
                .await
                .context("Failed to list events")?,
            }
        });
        Ok(events.into_iter().map(EventWithRsvps::with_spots).collect())
    }

    async fn count_rsvps(&self, event_id: i64) -> Result<i64> {
        let count = with_pool!(self.pool, |pool| {
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM rsvps WHERE event_id = ?")
                .bind(event_id)
                .fetch_one(pool)
                .await
                .context("Failed to count RSVPs")?
        });
        Ok(count)
    }

    async fn create_rsvp(&self, event_id: i64, user_id: i64) -> Result<Rsvp> {
        let now = Utc::now();

        let id = with_pool!(self.pool, |pool| {
            sqlx::query("INSERT INTO rsvps (event_id, user_id, created_at) VALUES (?, ?, ?)")
                .bind(event_id)
                .bind(user_id)
                .bind(now)
                .execute(pool)
                .await
                .context("Failed to create RSVP")?
                .inserted_id()
        });

        Ok(Rsvp {
            id,
            event_id,
            user_id,
            created_at: now,
        })
    }

    async fn delete_rsvp(&self, event_id: i64, user_id: i64) -> Result<bool> {
        let affected = with_pool!(self.pool, |pool| {
            sqlx::query("DELETE FROM rsvps WHERE event_id = ? AND user_id = ?")
                .bind(event_id)
                .bind(user_id)
                .execute(pool)
                .await
                .context("Failed to delete RSVP")?
                .rows_affected()
        });
        Ok(affected > 0)
    }

    async fn list_attendees(&self, event_id: i64) -> Result<Vec<Attendee>> {
        let attendees = with_pool!(self.pool, |pool| {
            sqlx::query_as::<_, Attendee>(
                r#"
                SELECT u.id AS user_id, u.name, u.email, r.created_at AS reserved_at
                FROM rsvps r
                INNER JOIN users u ON u.id = r.user_id
                WHERE r.event_id = ?
                ORDER BY r.created_at ASC, r.id ASC
                "#,
            )
            .bind(event_id)
            .fetch_all(pool)
            .await
            .context("Failed to list attendees")?
        });
        Ok(attendees)
    }

    async fn list_for_user(&self, user_id: i64) -> Result<Vec<EventWithRsvps>> {
        let events = with_pool!(self.pool, |pool| {
            sqlx::query_as::<_, EventWithRsvps>(
                r#"
                SELECT e.id, e.title, e.description, e.location, e.starts_at, e.capacity, e.cover_image,
                       e.created_at, e.updated_at,
                       (SELECT COUNT(*) FROM rsvps c WHERE c.event_id = e.id) AS rsvp_count
                FROM events e
                INNER JOIN rsvps r ON r.event_id = e.id
                WHERE r.user_id = ?
                ORDER BY e.starts_at ASC, e.id ASC
                "#,
            )
            .bind(user_id)
            .fetch_all(pool)
            .await
            .context("Failed to list user RSVPs")?
        });
        Ok(events.into_iter().map(EventWithRsvps::with_spots).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{SqlxUserRepository, UserRepository};
    use crate::db::{create_test_pool, is_unique_violation, migrations};
    use crate::models::{Role, User};
    use chrono::Duration;

    async fn setup() -> (SqlxEventRepository, SqlxUserRepository) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        (
            SqlxEventRepository::new(pool.clone()),
            SqlxUserRepository::new(pool),
        )
    }

    fn event(title: &str, starts_at: DateTime<Utc>, capacity: Option<i32>) -> Event {
        let now = Utc::now();
        Event {
            id: 0,
            title: title.to_string(),
            description: String::new(),
            location: Some("Hall A".to_string()),
            starts_at,
            capacity,
            cover_image: None,
            created_at: now,
            updated_at: now,
        }
    }

    async fn user(users: &SqlxUserRepository, email: &str) -> User {
        users
            .create(&User::new(email.to_string(), "hash".into(), "Guest".into(), Role::Member))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_create_get_update_event() {
        let (events, _) = setup().await;
        let starts = Utc::now() + Duration::days(3);
        let created = events.create(&event("Meetup", starts, Some(10))).await.unwrap();

        let mut found = events.get_by_id(created.id).await.unwrap().expect("Event not found");
        assert_eq!(found.capacity, Some(10));
        assert_eq!(found.starts_at.timestamp(), starts.timestamp());

        found.capacity = None;
        let updated = events.update(&found).await.unwrap();
        assert_eq!(updated.capacity, None);
    }

    #[tokio::test]
    async fn test_rsvp_lifecycle() {
        let (events, users) = setup().await;
        let e = events
            .create(&event("Meetup", Utc::now() + Duration::days(1), Some(2)))
            .await
            .unwrap();
        let guest = user(&users, "g@example.com").await;

        events.create_rsvp(e.id, guest.id).await.expect("First RSVP should succeed");
        assert_eq!(events.count_rsvps(e.id).await.unwrap(), 1);

        let err = events.create_rsvp(e.id, guest.id).await.expect_err("Duplicate RSVP must fail");
        assert!(is_unique_violation(&err));

        let attendees = events.list_attendees(e.id).await.unwrap();
        assert_eq!(attendees.len(), 1);
        assert_eq!(attendees[0].email, "g@example.com");

        let mine = events.list_for_user(guest.id).await.unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].spots_left, Some(1));

        assert!(events.delete_rsvp(e.id, guest.id).await.unwrap());
        assert!(!events.delete_rsvp(e.id, guest.id).await.unwrap());
        assert_eq!(events.count_rsvps(e.id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_list_upcoming_filter() {
        let (events, _) = setup().await;
        let now = Utc::now();
        events.create(&event("past", now - Duration::days(2), None)).await.unwrap();
        events.create(&event("later", now + Duration::days(5), None)).await.unwrap();
        events.create(&event("soon", now + Duration::days(1), None)).await.unwrap();

        let upcoming = events.list(Some(now)).await.unwrap();
        let titles: Vec<&str> = upcoming.iter().map(|e| e.event.title.as_str()).collect();
        assert_eq!(titles, vec!["soon", "later"]);

        let all = events.list(None).await.unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].event.title, "later");
        assert!(all.iter().all(|e| e.rsvp_count == 0 && e.spots_left.is_none()));
    }

    #[tokio::test]
    async fn test_delete_event() {
        let (events, _) = setup().await;
        let e = events
            .create(&event("Meetup", Utc::now(), None))
            .await
            .unwrap();
        assert!(events.delete(e.id).await.unwrap());
        assert!(events.get_by_id(e.id).await.unwrap().is_none());
    }
}
