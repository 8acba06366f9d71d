use serde::{Deserialize, Serialize};

pub const DEFAULT_TIME_ZONE: &str = "UTC";

/// A point in time as the calendar api represents it. All-day events carry a
/// `date` instead of a `date_time`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventDateTime {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_zone: Option<String>,
}

impl EventDateTime {
    /// An RFC3339 timestamp in the default time zone
    pub fn at<S: Into<String>>(date_time: S) -> Self {
        Self {
            date_time: Some(date_time.into()),
            date: None,
            time_zone: Some(DEFAULT_TIME_ZONE.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarEvent {
    /// Assigned by the calendar, absent until the event is created
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub html_link: Option<String>,
    #[serde(default)]
    pub summary: String,
    pub start: EventDateTime,
    pub end: EventDateTime,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

impl CalendarEvent {
    pub fn new<S: Into<String>>(summary: S, start: EventDateTime, end: EventDateTime) -> Self {
        Self {
            id: None,
            status: None,
            html_link: None,
            summary: summary.into(),
            start,
            end,
            description: String::new(),
            location: None,
        }
    }

    pub fn with_description<S: Into<String>>(mut self, description: S) -> Self {
        self.description = description.into();
        self
    }

    /// Blank locations are treated as no location
    pub fn with_location(mut self, location: Option<String>) -> Self {
        self.location = location.filter(|l| !l.trim().is_empty());
        self
    }
}
