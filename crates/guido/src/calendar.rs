//! The calendar the assistant manages on the user's behalf.
mod google;
mod models;

pub use google::{GoogleCalendar, GOOGLE_API_HOST};
pub use models::{CalendarEvent, EventDateTime, DEFAULT_TIME_ZONE};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CalendarError {
    #[error("Calendar authorization failed: {0}")]
    Authorization(String),

    #[error("Calendar event not found: {0}")]
    NotFound(String),

    #[error("Calendar request failed ({status}): {message}")]
    Request { status: u16, message: String },

    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

pub type CalendarResult<T> = Result<T, CalendarError>;

/// Create, update and list dated events
#[async_trait]
pub trait CalendarBackend: Send + Sync {
    /// Store a new event, returning it with the identifier the backend assigned
    async fn create(&self, event: &CalendarEvent) -> CalendarResult<CalendarEvent>;

    /// Replace the event with the given identifier
    async fn update(&self, id: &str, event: &CalendarEvent) -> CalendarResult<CalendarEvent>;

    /// Events overlapping the window, in chronological order, recurring events
    /// expanded into their individual occurrences
    async fn list(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> CalendarResult<Vec<CalendarEvent>>;
}
