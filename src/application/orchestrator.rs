use crate::application::authorizer::{Authorizer, CALENDAR_SCOPE, CALENDAR_SERVICE, CALENDAR_VERSION};
use crate::application::chat::ChatService;
use crate::application::event_creator::EventCreator;
use crate::application::trigger::TriggerDetector;
use crate::domain::models::{ChatMessage, CreatedEvent, EventRequest, Transcript, next_day_window};
use crate::infrastructure::chat_client::ChatBackend;
use crate::infrastructure::credential_store::CredentialStore;
use crate::infrastructure::error::InfraError;
use crate::infrastructure::oauth_client::OAuthHttpClient;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info};

/// Failure of the scheduling side effect, tagged by the stage that failed.
#[derive(Debug, Error)]
pub enum SchedulingError {
    #[error("calendar authorization failed: {0}")]
    Auth(InfraError),
    #[error("calendar event creation failed: {0}")]
    Event(InfraError),
}

#[async_trait]
pub trait EventScheduler: Send + Sync {
    async fn schedule(&self, request: &EventRequest) -> Result<CreatedEvent, SchedulingError>;
}

/// Authorizer followed by a single insert, with the fixed calendar scope.
pub struct CalendarScheduler<S, C>
where
    S: CredentialStore,
    C: OAuthHttpClient,
{
    authorizer: Authorizer<S, C>,
    creator: EventCreator,
    client_secret_file: PathBuf,
}

impl<S, C> CalendarScheduler<S, C>
where
    S: CredentialStore,
    C: OAuthHttpClient,
{
    pub fn new(
        authorizer: Authorizer<S, C>,
        creator: EventCreator,
        client_secret_file: impl Into<PathBuf>,
    ) -> Self {
        Self {
            authorizer,
            creator,
            client_secret_file: client_secret_file.into(),
        }
    }

    /// Drops the cached calendar token so the next scheduling attempt asks for
    /// consent again.
    pub fn forget_credentials(&self) -> Result<(), InfraError> {
        self.authorizer
            .clear_stored_token(CALENDAR_SERVICE, CALENDAR_VERSION)
    }
}

#[async_trait]
impl<S, C> EventScheduler for CalendarScheduler<S, C>
where
    S: CredentialStore,
    C: OAuthHttpClient,
{
    async fn schedule(&self, request: &EventRequest) -> Result<CreatedEvent, SchedulingError> {
        let client = self
            .authorizer
            .acquire(
                &self.client_secret_file,
                CALENDAR_SERVICE,
                CALENDAR_VERSION,
                &[CALENDAR_SCOPE.to_string()],
            )
            .await
            .map_err(SchedulingError::Auth)?;
        self.creator
            .create(&client, request)
            .await
            .map_err(SchedulingError::Event)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Banner {
    Success(String),
    Error(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnReport {
    /// Transcript entries added during this turn, in order.
    pub appended: Vec<ChatMessage>,
    pub banner: Option<Banner>,
}

#[derive(Debug, Clone)]
pub struct SchedulingPolicy {
    pub summary: String,
    pub timezone: Tz,
}

type NowProvider = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

pub struct Orchestrator<B, S>
where
    B: ChatBackend,
    S: EventScheduler,
{
    chat: ChatService<B>,
    detector: TriggerDetector,
    scheduler: Arc<S>,
    policy: SchedulingPolicy,
    transcript: Transcript,
    now_provider: NowProvider,
}

impl<B, S> Orchestrator<B, S>
where
    B: ChatBackend,
    S: EventScheduler,
{
    pub fn new(
        chat: ChatService<B>,
        detector: TriggerDetector,
        scheduler: Arc<S>,
        policy: SchedulingPolicy,
    ) -> Self {
        Self {
            chat,
            detector,
            scheduler,
            policy,
            transcript: Transcript::new(),
            now_provider: Arc::new(Utc::now),
        }
    }

    pub fn with_now_provider(mut self, now_provider: NowProvider) -> Self {
        self.now_provider = now_provider;
        self
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    /// Runs one full turn: model call, trigger check and, on a match, one
    /// scheduling attempt. Blank input is ignored.
    pub async fn handle_turn(&mut self, user_text: &str) -> TurnReport {
        let first_new = self.transcript.len();
        let user_text = user_text.trim();
        if user_text.is_empty() {
            return TurnReport {
                appended: Vec::new(),
                banner: None,
            };
        }

        self.transcript.push(ChatMessage::user(user_text));
        let reply = self.chat.send(&self.transcript).await;
        self.transcript.push(ChatMessage::assistant(reply.clone()));

        let banner = if self.detector.matches(&reply) {
            Some(self.schedule().await)
        } else {
            None
        };

        TurnReport {
            appended: self.transcript.messages()[first_new..].to_vec(),
            banner,
        }
    }

    async fn schedule(&mut self) -> Banner {
        let outcome = match self.fixed_window_request() {
            Ok(request) => {
                info!(
                    start = %request.start.to_rfc3339(),
                    end = %request.end.to_rfc3339(),
                    "scheduling_triggered"
                );
                self.scheduler.schedule(&request).await
            }
            Err(error) => Err(SchedulingError::Event(error)),
        };

        match outcome {
            Ok(created) => {
                self.transcript.push(ChatMessage::assistant(format!(
                    "Event successfully created: {}",
                    created.html_link
                )));
                Banner::Success(format!("✅ Event created: {}", created.html_link))
            }
            Err(SchedulingError::Auth(cause)) => {
                error!(%cause, "scheduling_authorization_failed");
                let message = format!("⚠️ Calendar authorization failed: {cause}");
                self.transcript.push(ChatMessage::assistant(message.clone()));
                Banner::Error(message)
            }
            Err(SchedulingError::Event(cause)) => {
                error!(%cause, "scheduling_event_failed");
                let message = format!("⚠️ Failed to create calendar event: {cause}");
                self.transcript.push(ChatMessage::assistant(message.clone()));
                Banner::Error(message)
            }
        }
    }

    fn fixed_window_request(&self) -> Result<EventRequest, InfraError> {
        let (start, end) = next_day_window((self.now_provider)(), self.policy.timezone)
            .map_err(InfraError::Calendar)?;
        Ok(EventRequest {
            summary: self.policy.summary.clone(),
            start,
            end,
            timezone: self.policy.timezone,
        })
    }
}
