use crate::domain::models::CreatedEvent;
use crate::infrastructure::error::InfraError;
use crate::infrastructure::event_mapper::GoogleCalendarEvent;
use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;
use url::Url;

pub const CALENDAR_API_BASE: &str = "https://www.googleapis.com/calendar/v3/";

#[async_trait]
pub trait CalendarClient: Send + Sync {
    async fn insert_event(
        &self,
        access_token: &str,
        calendar_id: &str,
        event: &GoogleCalendarEvent,
    ) -> Result<CreatedEvent, InfraError>;
}

#[derive(Debug, Clone)]
pub struct ReqwestGoogleCalendarClient {
    client: Client,
    api_base: String,
}

impl Default for ReqwestGoogleCalendarClient {
    fn default() -> Self {
        Self::new()
    }
}

impl ReqwestGoogleCalendarClient {
    pub fn new() -> Self {
        Self::with_api_base(CALENDAR_API_BASE)
    }

    pub fn with_api_base(api_base: impl Into<String>) -> Self {
        let mut api_base = api_base.into();
        if !api_base.ends_with('/') {
            api_base.push('/');
        }
        Self {
            client: Client::new(),
            api_base,
        }
    }

    fn ensure_non_empty(value: &str, field: &str) -> Result<(), InfraError> {
        if value.trim().is_empty() {
            return Err(InfraError::Calendar(format!("{field} must not be empty")));
        }
        Ok(())
    }

    fn calendar_http_error(status: reqwest::StatusCode, body: &str) -> InfraError {
        let message = if body.trim().is_empty() {
            format!("google calendar api error: http {}", status.as_u16())
        } else {
            format!("google calendar api error: http {}; body={body}", status.as_u16())
        };
        InfraError::Calendar(message)
    }

    fn events_endpoint(&self, calendar_id: &str) -> Result<Url, InfraError> {
        let mut url = Url::parse(&self.api_base)
            .map_err(|error| InfraError::Calendar(format!("invalid calendar api base url: {error}")))?;
        {
            let mut segments = url.path_segments_mut().map_err(|_| {
                InfraError::Calendar("calendar api base URL cannot be a base".to_string())
            })?;
            segments.pop_if_empty();
            segments.push("calendars");
            segments.push(calendar_id);
            segments.push("events");
        }
        Ok(url)
    }
}

#[async_trait]
impl CalendarClient for ReqwestGoogleCalendarClient {
    async fn insert_event(
        &self,
        access_token: &str,
        calendar_id: &str,
        event: &GoogleCalendarEvent,
    ) -> Result<CreatedEvent, InfraError> {
        Self::ensure_non_empty(access_token, "access token")?;
        Self::ensure_non_empty(calendar_id, "calendar id")?;

        let endpoint = self.events_endpoint(calendar_id)?;
        let response = self
            .client
            .post(endpoint)
            .bearer_auth(access_token)
            .json(event)
            .send()
            .await
            .map_err(|error| InfraError::Calendar(format!("network error while creating event: {error}")))?;

        let status = response.status();
        debug!(calendar_id, status = status.as_u16(), "calendar_insert_response");
        let body = response
            .text()
            .await
            .map_err(|error| InfraError::Calendar(format!("failed reading event create response: {error}")))?;

        if !status.is_success() {
            return Err(Self::calendar_http_error(status, &body));
        }

        let parsed: GoogleCalendarEvent = serde_json::from_str(&body).map_err(|error| {
            InfraError::Calendar(format!("invalid event create payload: {error}; body={body}"))
        })?;
        let id = parsed
            .id
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .ok_or_else(|| InfraError::Calendar("event create response did not include id".to_string()))?;
        let html_link = parsed
            .html_link
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .ok_or_else(|| {
                InfraError::Calendar("event create response did not include htmlLink".to_string())
            })?;

        Ok(CreatedEvent { id, html_link })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::event_mapper::CalendarEventDateTime;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn sample_event() -> GoogleCalendarEvent {
        GoogleCalendarEvent {
            id: None,
            summary: Some("Meeting from AI Agent".to_string()),
            status: None,
            html_link: None,
            start: CalendarEventDateTime {
                date_time: "2026-02-17T10:00:00-05:00".to_string(),
                time_zone: Some("America/New_York".to_string()),
            },
            end: CalendarEventDateTime {
                date_time: "2026-02-17T11:00:00-05:00".to_string(),
                time_zone: Some("America/New_York".to_string()),
            },
        }
    }

    #[tokio::test]
    async fn insert_posts_to_primary_calendar_with_bearer_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/calendar/v3/calendars/primary/events"))
            .and(header("authorization", "Bearer access-1"))
            .and(body_partial_json(serde_json::json!({
                "summary": "Meeting from AI Agent",
                "start": {"timeZone": "America/New_York"}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "evt-1",
                "htmlLink": "https://www.google.com/calendar/event?eid=ZXZ0LTE",
                "start": {"dateTime": "2026-02-17T10:00:00-05:00"},
                "end": {"dateTime": "2026-02-17T11:00:00-05:00"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client =
            ReqwestGoogleCalendarClient::with_api_base(format!("{}/calendar/v3", server.uri()));
        let created = client
            .insert_event("access-1", "primary", &sample_event())
            .await
            .expect("insert");

        assert_eq!(created.id, "evt-1");
        assert!(created.html_link.starts_with("https://www.google.com/calendar/event?eid="));
    }

    #[tokio::test]
    async fn calendar_id_is_path_encoded() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/calendars/en.usa%23holiday@group.v.calendar.google.com/events"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "evt-2",
                "htmlLink": "https://www.google.com/calendar/event?eid=ZXZ0LTI",
                "start": {"dateTime": "2026-02-17T10:00:00Z"},
                "end": {"dateTime": "2026-02-17T11:00:00Z"}
            })))
            .mount(&server)
            .await;

        let client = ReqwestGoogleCalendarClient::with_api_base(server.uri());
        let created = client
            .insert_event(
                "access-1",
                "en.usa#holiday@group.v.calendar.google.com",
                &sample_event(),
            )
            .await
            .expect("insert");
        assert_eq!(created.id, "evt-2");
    }

    #[tokio::test]
    async fn rejected_insert_is_a_calendar_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(403).set_body_string(
                r#"{"error":{"code":403,"message":"Request had insufficient authentication scopes."}}"#,
            ))
            .mount(&server)
            .await;

        let client = ReqwestGoogleCalendarClient::with_api_base(server.uri());
        match client.insert_event("access-1", "primary", &sample_event()).await {
            Err(InfraError::Calendar(message)) => {
                assert!(message.contains("http 403"));
                assert!(message.contains("insufficient authentication scopes"));
            }
            other => panic!("expected calendar error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn blank_access_token_is_rejected_before_any_request() {
        let client = ReqwestGoogleCalendarClient::with_api_base("http://127.0.0.1:9/");
        assert!(matches!(
            client.insert_event(" ", "primary", &sample_event()).await,
            Err(InfraError::Calendar(_))
        ));
    }
}
