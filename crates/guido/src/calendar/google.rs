use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

use super::{CalendarBackend, CalendarError, CalendarEvent, CalendarResult};
use crate::credentials::TokenSource;

pub const GOOGLE_API_HOST: &str = "https://www.googleapis.com";

#[derive(Debug, Deserialize)]
struct EventList {
    #[serde(default)]
    items: Vec<CalendarEvent>,
}

/// Google Calendar v3 over its REST api
pub struct GoogleCalendar {
    client: Client,
    host: String,
    calendar_id: String,
    auth: Arc<dyn TokenSource>,
}

impl GoogleCalendar {
    pub fn new<S: Into<String>>(calendar_id: S, auth: Arc<dyn TokenSource>) -> CalendarResult<Self> {
        Self::with_host(GOOGLE_API_HOST, calendar_id, auth)
    }

    pub fn with_host<H: Into<String>, S: Into<String>>(
        host: H,
        calendar_id: S,
        auth: Arc<dyn TokenSource>,
    ) -> CalendarResult<Self> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;
        Ok(Self {
            client,
            host: host.into(),
            calendar_id: calendar_id.into(),
            auth,
        })
    }

    fn events_url(&self) -> String {
        format!(
            "{}/calendar/v3/calendars/{}/events",
            self.host.trim_end_matches('/'),
            urlencoding::encode(&self.calendar_id)
        )
    }

    async fn send(&self, request: RequestBuilder) -> CalendarResult<Response> {
        let token = self
            .auth
            .access_token()
            .await
            .map_err(|e| CalendarError::Authorization(e.to_string()))?;
        let response = request.bearer_auth(token).send().await?;

        match response.status() {
            status if status.is_success() => Ok(response),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(CalendarError::Authorization(
                response.text().await.unwrap_or_default(),
            )),
            StatusCode::NOT_FOUND => Err(CalendarError::NotFound(
                response.text().await.unwrap_or_default(),
            )),
            status => Err(CalendarError::Request {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            }),
        }
    }
}

#[async_trait]
impl CalendarBackend for GoogleCalendar {
    async fn create(&self, event: &CalendarEvent) -> CalendarResult<CalendarEvent> {
        let request = self.client.post(self.events_url()).json(event);
        Ok(self.send(request).await?.json().await?)
    }

    async fn update(&self, id: &str, event: &CalendarEvent) -> CalendarResult<CalendarEvent> {
        let mut body = event.clone();
        body.id = Some(id.to_string());
        let url = format!("{}/{}", self.events_url(), urlencoding::encode(id));
        let request = self.client.put(url).json(&body);
        Ok(self.send(request).await?.json().await?)
    }

    async fn list(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> CalendarResult<Vec<CalendarEvent>> {
        let request = self.client.get(self.events_url()).query(&[
            ("timeMin", start.to_rfc3339_opts(SecondsFormat::Secs, true)),
            ("timeMax", end.to_rfc3339_opts(SecondsFormat::Secs, true)),
            ("singleEvents", "true".to_string()),
            ("orderBy", "startTime".to_string()),
        ]);
        let list: EventList = self.send(request).await?.json().await?;
        Ok(list.items)
    }
}
