//! Event service
//!
//! Events and the RSVP eligibility rules. A reservation is accepted only
//! for an existing event that has not started yet and, when the event has
//! a positive capacity, still has a free seat. Duplicate reservations are
//! rejected by the store's unique index on (user, event).
//!
//! The capacity check reads the count and then inserts; two concurrent
//! reservations for the last seat can both succeed.

use crate::cache::{events_key, CacheLayer, MemoryCache, EVENTS_PREFIX};
use crate::db::is_unique_violation;
use crate::db::repositories::EventRepository;
use crate::models::{Attendee, CreateEventInput, Event, EventWithRsvps, Rsvp, UpdateEventInput};
use anyhow::Context;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;

const LISTING_TTL: Duration = Duration::from_secs(30);

#[derive(Debug, thiserror::Error)]
pub enum EventServiceError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Event not found")]
    NotFound,

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Why a reservation or a release was refused
#[derive(Debug, thiserror::Error)]
pub enum RsvpError {
    #[error("Event not found")]
    NotFound,

    #[error("This event has already ended")]
    EventEnded,

    #[error("This event is full")]
    Full,

    #[error("You have already reserved a seat for this event")]
    AlreadyReserved,

    #[error("You have no reservation for this event")]
    NotReserved,

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

pub struct EventService {
    repo: Arc<dyn EventRepository>,
    cache: Arc<MemoryCache>,
}

impl EventService {
    pub fn new(repo: Arc<dyn EventRepository>, cache: Arc<MemoryCache>) -> Self {
        Self { repo, cache }
    }

    pub async fn create(&self, input: CreateEventInput) -> Result<Event, EventServiceError> {
        let title = validate_title(&input.title)?;
        validate_capacity(input.capacity)?;

        let now = Utc::now();
        let event = Event {
            id: 0,
            title,
            description: input.description,
            location: input.location.filter(|l| !l.trim().is_empty()),
            starts_at: input.starts_at,
            capacity: input.capacity,
            cover_image: input.cover_image.filter(|c| !c.trim().is_empty()),
            created_at: now,
            updated_at: now,
        };

        let created = self.repo.create(&event).await?;
        self.invalidate().await;
        tracing::info!(event_id = created.id, "Event created");
        Ok(created)
    }

    pub async fn update(&self, id: i64, input: UpdateEventInput) -> Result<Event, EventServiceError> {
        let mut event = self.require(id).await?;

        if let Some(title) = input.title {
            event.title = validate_title(&title)?;
        }
        if let Some(description) = input.description {
            event.description = description;
        }
        if let Some(location) = input.location {
            event.location = Some(location).filter(|l| !l.trim().is_empty());
        }
        if let Some(starts_at) = input.starts_at {
            event.starts_at = starts_at;
        }
        if input.capacity.is_some() {
            validate_capacity(input.capacity)?;
            event.capacity = input.capacity;
        }
        if let Some(cover) = input.cover_image {
            event.cover_image = Some(cover).filter(|c| !c.trim().is_empty());
        }

        let updated = self.repo.update(&event).await?;
        self.invalidate().await;
        Ok(updated)
    }

    pub async fn delete(&self, id: i64) -> Result<(), EventServiceError> {
        if !self.repo.delete(id).await.context("Failed to delete event")? {
            return Err(EventServiceError::NotFound);
        }
        self.invalidate().await;
        tracing::info!(event_id = id, "Event deleted");
        Ok(())
    }

    /// Event with its reservation count and remaining seats
    pub async fn get(&self, id: i64) -> Result<EventWithRsvps, EventServiceError> {
        let event = self.require(id).await?;
        let count = self.repo.count_rsvps(id).await?;
        Ok(EventWithRsvps::new(event, count))
    }

    /// Upcoming events soonest first, or every event latest first
    pub async fn list(&self, upcoming: bool) -> Result<Vec<EventWithRsvps>, EventServiceError> {
        let key = events_key(upcoming);
        if let Ok(Some(events)) = self.cache.get::<Vec<EventWithRsvps>>(&key).await {
            return Ok(events);
        }

        let starting_after = upcoming.then(Utc::now);
        let events: Vec<EventWithRsvps> = self
            .repo
            .list(starting_after)
            .await?
            .into_iter()
            .map(EventWithRsvps::with_spots)
            .collect();

        if let Err(e) = self.cache.set(&key, &events, LISTING_TTL).await {
            tracing::warn!("Failed to cache events listing: {}", e);
        }
        Ok(events)
    }

    pub async fn attendees(&self, id: i64) -> Result<Vec<Attendee>, EventServiceError> {
        self.require(id).await?;
        Ok(self.repo.list_attendees(id).await?)
    }

    /// Events the user has reserved
    pub async fn reservations_of(&self, user_id: i64) -> Result<Vec<EventWithRsvps>, EventServiceError> {
        Ok(self
            .repo
            .list_for_user(user_id)
            .await?
            .into_iter()
            .map(EventWithRsvps::with_spots)
            .collect())
    }

    /// Reserve a seat for `user_id`
    pub async fn try_reserve(&self, event_id: i64, user_id: i64) -> Result<Rsvp, RsvpError> {
        self.try_reserve_at(event_id, user_id, Utc::now()).await
    }

    /// Reserve a seat, judging "ended" against `now`
    pub async fn try_reserve_at(
        &self,
        event_id: i64,
        user_id: i64,
        now: DateTime<Utc>,
    ) -> Result<Rsvp, RsvpError> {
        let event = self
            .repo
            .get_by_id(event_id)
            .await
            .context("Failed to get event")?
            .ok_or(RsvpError::NotFound)?;

        if event.has_ended_at(now) {
            return Err(RsvpError::EventEnded);
        }

        if let Some(limit) = event.seat_limit() {
            let reserved = self.repo.count_rsvps(event_id).await?;
            if reserved >= limit {
                return Err(RsvpError::Full);
            }
        }

        match self.repo.create_rsvp(event_id, user_id).await {
            Ok(rsvp) => {
                self.invalidate().await;
                tracing::debug!(event_id, user_id, "RSVP recorded");
                Ok(rsvp)
            }
            Err(e) if is_unique_violation(&e) => Err(RsvpError::AlreadyReserved),
            Err(e) => Err(RsvpError::Internal(e)),
        }
    }

    /// Cancel a reservation; a missing reservation is an error
    pub async fn release(&self, event_id: i64, user_id: i64) -> Result<(), RsvpError> {
        if self.repo.get_by_id(event_id).await?.is_none() {
            return Err(RsvpError::NotFound);
        }
        if !self.repo.delete_rsvp(event_id, user_id).await? {
            return Err(RsvpError::NotReserved);
        }
        self.invalidate().await;
        Ok(())
    }

    async fn require(&self, id: i64) -> Result<Event, EventServiceError> {
        self.repo
            .get_by_id(id)
            .await
            .context("Failed to get event")?
            .ok_or(EventServiceError::NotFound)
    }

    async fn invalidate(&self) {
        if let Err(e) = self.cache.delete_pattern(&format!("{}*", EVENTS_PREFIX)).await {
            tracing::warn!("Failed to invalidate events cache: {}", e);
        }
    }
}

fn validate_title(title: &str) -> Result<String, EventServiceError> {
    let title = title.trim();
    if title.is_empty() {
        return Err(EventServiceError::ValidationError("title is required".to_string()));
    }
    Ok(title.to_string())
}

fn validate_capacity(capacity: Option<i32>) -> Result<(), EventServiceError> {
    match capacity {
        Some(c) if c < 0 => Err(EventServiceError::ValidationError(
            "capacity must not be negative".to_string(),
        )),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{SqlxEventRepository, SqlxUserRepository, UserRepository};
    use crate::db::{create_test_pool, migrations, DynDatabasePool};
    use crate::models::{Role, User};
    use chrono::Duration as ChronoDuration;

    async fn setup_test_service() -> (DynDatabasePool, EventService) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        let service = EventService::new(SqlxEventRepository::boxed(pool.clone()), Arc::new(MemoryCache::new()));
        (pool, service)
    }

    async fn user(pool: &DynDatabasePool, email: &str) -> i64 {
        SqlxUserRepository::new(pool.clone())
            .create(&User::new(email.to_string(), "hash".to_string(), email.to_string(), Role::Member))
            .await
            .unwrap()
            .id
    }

    fn event(starts_in_hours: i64, capacity: Option<i32>) -> CreateEventInput {
        CreateEventInput {
            title: "Meetup".to_string(),
            description: String::new(),
            location: Some("Hall A".to_string()),
            starts_at: Utc::now() + ChronoDuration::hours(starts_in_hours),
            capacity,
            cover_image: None,
        }
    }

    #[tokio::test]
    async fn test_reserve_until_full() {
        let (pool, service) = setup_test_service().await;
        let ev = service.create(event(24, Some(2))).await.unwrap();
        let (a, b, c) = (user(&pool, "a@x.io").await, user(&pool, "b@x.io").await, user(&pool, "c@x.io").await);

        service.try_reserve(ev.id, a).await.unwrap();
        service.try_reserve(ev.id, b).await.unwrap();

        let result = service.try_reserve(ev.id, c).await;
        assert!(matches!(result, Err(RsvpError::Full)));

        let details = service.get(ev.id).await.unwrap();
        assert_eq!(details.rsvp_count, 2);
        assert_eq!(details.spots_left, Some(0));
    }

    #[tokio::test]
    async fn test_past_event_is_ended_even_with_seats() {
        let (pool, service) = setup_test_service().await;
        let ev = service.create(event(-1, Some(100))).await.unwrap();
        let a = user(&pool, "a@x.io").await;

        let result = service.try_reserve(ev.id, a).await;
        assert!(matches!(result, Err(RsvpError::EventEnded)));
    }

    #[tokio::test]
    async fn test_ended_is_checked_before_full() {
        let (pool, service) = setup_test_service().await;
        let ev = service.create(event(1, Some(1))).await.unwrap();
        let (a, b) = (user(&pool, "a@x.io").await, user(&pool, "b@x.io").await);
        service.try_reserve(ev.id, a).await.unwrap();

        let later = Utc::now() + ChronoDuration::hours(2);
        let result = service.try_reserve_at(ev.id, b, later).await;
        assert!(matches!(result, Err(RsvpError::EventEnded)));
    }

    #[tokio::test]
    async fn test_zero_or_missing_capacity_is_unlimited() {
        let (pool, service) = setup_test_service().await;
        let open = service.create(event(24, Some(0))).await.unwrap();
        let unset = service.create(event(24, None)).await.unwrap();

        for i in 0..5 {
            let u = user(&pool, &format!("u{}@x.io", i)).await;
            service.try_reserve(open.id, u).await.unwrap();
            service.try_reserve(unset.id, u).await.unwrap();
        }
        assert_eq!(service.get(open.id).await.unwrap().spots_left, None);
    }

    #[tokio::test]
    async fn test_duplicate_reservation() {
        let (pool, service) = setup_test_service().await;
        let ev = service.create(event(24, None)).await.unwrap();
        let a = user(&pool, "a@x.io").await;

        service.try_reserve(ev.id, a).await.unwrap();
        let result = service.try_reserve(ev.id, a).await;
        assert!(matches!(result, Err(RsvpError::AlreadyReserved)));
        assert_eq!(service.get(ev.id).await.unwrap().rsvp_count, 1);
    }

    #[tokio::test]
    async fn test_missing_event() {
        let (pool, service) = setup_test_service().await;
        let a = user(&pool, "a@x.io").await;
        assert!(matches!(service.try_reserve(404, a).await, Err(RsvpError::NotFound)));
        assert!(matches!(service.release(404, a).await, Err(RsvpError::NotFound)));
    }

    #[tokio::test]
    async fn test_release() {
        let (pool, service) = setup_test_service().await;
        let ev = service.create(event(24, Some(1))).await.unwrap();
        let (a, b) = (user(&pool, "a@x.io").await, user(&pool, "b@x.io").await);

        assert!(matches!(service.release(ev.id, a).await, Err(RsvpError::NotReserved)));

        service.try_reserve(ev.id, a).await.unwrap();
        service.release(ev.id, a).await.unwrap();
        service.try_reserve(ev.id, b).await.unwrap();

        let attendees = service.attendees(ev.id).await.unwrap();
        assert_eq!(attendees.len(), 1);
        assert_eq!(attendees[0].user_id, b);
    }

    #[tokio::test]
    async fn test_listing_reflects_reservations() {
        let (pool, service) = setup_test_service().await;
        let ev = service.create(event(24, Some(3))).await.unwrap();
        service.create(event(-24, None)).await.unwrap();

        let upcoming = service.list(true).await.unwrap();
        assert_eq!(upcoming.len(), 1);
        assert_eq!(upcoming[0].spots_left, Some(3));

        let a = user(&pool, "a@x.io").await;
        service.try_reserve(ev.id, a).await.unwrap();

        let upcoming = service.list(true).await.unwrap();
        assert_eq!(upcoming[0].rsvp_count, 1);
        assert_eq!(upcoming[0].spots_left, Some(2));
        assert_eq!(service.list(false).await.unwrap().len(), 2);

        let mine = service.reservations_of(a).await.unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].event.id, ev.id);
    }

    #[tokio::test]
    async fn test_create_validation() {
        let (_pool, service) = setup_test_service().await;

        let mut blank = event(24, None);
        blank.title = " ".to_string();
        assert!(matches!(service.create(blank).await, Err(EventServiceError::ValidationError(_))));

        assert!(matches!(
            service.create(event(24, Some(-1))).await,
            Err(EventServiceError::ValidationError(_))
        ));
    }
}
