use crate::application::authorizer::AuthenticatedClient;
use crate::domain::models::{CreatedEvent, EventRequest, PRIMARY_CALENDAR_ID};
use crate::infrastructure::error::InfraError;
use crate::infrastructure::event_mapper::encode_event_request;
use tracing::info;

/// Inserts single events. There is no idempotency key: every call creates a
/// new event.
#[derive(Debug, Clone)]
pub struct EventCreator {
    calendar_id: String,
}

impl Default for EventCreator {
    fn default() -> Self {
        Self::new(PRIMARY_CALENDAR_ID)
    }
}

impl EventCreator {
    pub fn new(calendar_id: impl Into<String>) -> Self {
        Self {
            calendar_id: calendar_id.into(),
        }
    }

    pub async fn create(
        &self,
        client: &AuthenticatedClient,
        request: &EventRequest,
    ) -> Result<CreatedEvent, InfraError> {
        request.validate().map_err(InfraError::Calendar)?;

        let event = encode_event_request(request);
        let created = client
            .calendar()
            .insert_event(client.access_token(), &self.calendar_id, &event)
            .await?;

        info!(
            calendar_id = %self.calendar_id,
            event_id = %created.id,
            start = %request.start.to_rfc3339(),
            "calendar_event_created"
        );
        Ok(created)
    }
}
