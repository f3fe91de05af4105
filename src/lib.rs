pub mod application;
pub mod domain;
pub mod infrastructure;

use application::authorizer::Authorizer;
use application::chat::ChatService;
use application::event_creator::EventCreator;
use application::orchestrator::{
    Banner, CalendarScheduler, EventScheduler, Orchestrator, SchedulingPolicy,
};
use application::trigger::TriggerDetector;
use domain::models::{ChatMessage, Role};
use infrastructure::chat_client::{ChatBackend, OllamaChatClient};
use infrastructure::config::AppConfig;
use infrastructure::consent_listener::LoopbackConsentFlow;
use infrastructure::credential_store::FileCredentialStore;
use infrastructure::error::InfraError;
use infrastructure::google_calendar_client::ReqwestGoogleCalendarClient;
use infrastructure::oauth_client::ReqwestOAuthClient;
use std::io::Write;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{info, warn};

const PROMPT: &str = "> ";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Quit,
    History,
    Logout,
    Say(String),
}

pub fn parse_command(line: &str) -> Command {
    match line.trim() {
        "/quit" | "/exit" => Command::Quit,
        "/history" => Command::History,
        "/logout" => Command::Logout,
        text => Command::Say(text.to_string()),
    }
}

pub fn render_message(message: &ChatMessage) -> String {
    let speaker = match message.role {
        Role::User => "You",
        Role::Assistant => "Assistant",
    };
    format!("{speaker}: {}", message.content)
}

pub fn render_banner(banner: &Banner) -> String {
    match banner {
        Banner::Success(text) | Banner::Error(text) => format!("[{text}]"),
    }
}

/// Wires the production clients from `config` and runs the chat loop on
/// stdin/stdout until the user quits or input ends.
pub async fn run(config: AppConfig) -> Result<(), InfraError> {
    let backend = Arc::new(OllamaChatClient::new(
        &config.ollama_url,
        &config.model,
        config.model_timeout,
    )?);
    let authorizer = Authorizer::new(
        Arc::new(FileCredentialStore::new(&config.token_dir)),
        Arc::new(ReqwestOAuthClient::new()),
        Arc::new(LoopbackConsentFlow::new(config.consent_timeout)),
        Arc::new(ReqwestGoogleCalendarClient::new()),
    );
    let scheduler = Arc::new(CalendarScheduler::new(
        authorizer,
        EventCreator::new(&config.calendar_id),
        &config.client_secret_file,
    ));
    info!(
        model = %backend.model(),
        ollama_url = %config.ollama_url,
        timezone = %config.timezone.name(),
        "session_started"
    );
    let mut orchestrator = Orchestrator::new(
        ChatService::new(backend),
        TriggerDetector::new(&config.trigger_phrases),
        Arc::clone(&scheduler),
        SchedulingPolicy {
            summary: config.event_summary.clone(),
            timezone: config.timezone,
        },
    );

    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let mut stdout = std::io::stdout();
    chat_loop(
        &mut orchestrator,
        || scheduler.forget_credentials(),
        stdin,
        &mut stdout,
    )
    .await
}

/// Reads one line per turn. `logout` discards cached calendar credentials.
pub async fn chat_loop<B, S, L, R, W>(
    orchestrator: &mut Orchestrator<B, S>,
    logout: L,
    input: R,
    output: &mut W,
) -> Result<(), InfraError>
where
    B: ChatBackend,
    S: EventScheduler,
    L: Fn() -> Result<(), InfraError>,
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let mut lines = input.lines();
    loop {
        write!(output, "{PROMPT}")?;
        output.flush()?;

        let Some(line) = lines.next_line().await? else {
            writeln!(output)?;
            break;
        };

        match parse_command(&line) {
            Command::Quit => break,
            Command::History => {
                for message in orchestrator.transcript().messages() {
                    writeln!(output, "{}", render_message(message))?;
                }
            }
            Command::Logout => match logout() {
                Ok(()) => writeln!(output, "[Calendar credentials removed]")?,
                Err(error) => {
                    warn!(%error, "logout_failed");
                    writeln!(output, "[⚠️ Could not remove calendar credentials: {error}]")?;
                }
            },
            Command::Say(text) => {
                let report = orchestrator.handle_turn(&text).await;
                // The user's own line is already on screen.
                for message in report.appended.iter().filter(|m| m.role == Role::Assistant) {
                    writeln!(output, "{}", render_message(message))?;
                }
                if let Some(banner) = &report.banner {
                    writeln!(output, "{}", render_banner(banner))?;
                }
            }
        }
    }
    info!(turns = orchestrator.transcript().len(), "session_ended");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::chat::tests::ScriptedBackend;
    use crate::application::orchestrator::SchedulingError;
    use crate::domain::models::{CreatedEvent, EventRequest};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Default)]
    struct LinkScheduler {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl EventScheduler for LinkScheduler {
        async fn schedule(&self, _request: &EventRequest) -> Result<CreatedEvent, SchedulingError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(CreatedEvent {
                id: "evt-1".to_string(),
                html_link: "https://calendar.example/evt-1".to_string(),
            })
        }
    }

    fn orchestrator(
        replies: &[&str],
        scheduler: Arc<LinkScheduler>,
    ) -> Orchestrator<ScriptedBackend, LinkScheduler> {
        Orchestrator::new(
            ChatService::new(Arc::new(ScriptedBackend::replying(replies))),
            TriggerDetector::default(),
            scheduler,
            SchedulingPolicy {
                summary: "Meeting from AI Agent".to_string(),
                timezone: chrono_tz::America::New_York,
            },
        )
    }

    #[test]
    fn commands_are_recognized_and_everything_else_is_chat() {
        assert_eq!(parse_command("/quit"), Command::Quit);
        assert_eq!(parse_command(" /exit "), Command::Quit);
        assert_eq!(parse_command("/history"), Command::History);
        assert_eq!(parse_command("/logout"), Command::Logout);
        assert_eq!(
            parse_command("/weather today"),
            Command::Say("/weather today".to_string())
        );
    }

    #[tokio::test]
    async fn loop_renders_replies_and_banner_then_quits() {
        let scheduler = Arc::new(LinkScheduler::default());
        let mut orchestrator = orchestrator(&["Sure, I'll schedule it."], Arc::clone(&scheduler));
        let mut output = Vec::new();

        chat_loop(
            &mut orchestrator,
            || Ok(()),
            &b"book a sync\n/quit\nignored\n"[..],
            &mut output,
        )
        .await
        .expect("loop");

        let output = String::from_utf8(output).expect("utf8");
        assert!(output.contains("Assistant: Sure, I'll schedule it."));
        assert!(output.contains("Assistant: Event successfully created: https://calendar.example/evt-1"));
        assert!(output.contains("[✅ Event created: https://calendar.example/evt-1]"));
        assert_eq!(scheduler.calls.load(Ordering::SeqCst), 1);
        assert_eq!(orchestrator.transcript().len(), 3);
    }

    #[tokio::test]
    async fn history_and_logout_do_not_touch_the_model() {
        let scheduler = Arc::new(LinkScheduler::default());
        let mut orchestrator = orchestrator(&["Hello!"], Arc::clone(&scheduler));
        let logouts = AtomicUsize::new(0);
        let mut output = Vec::new();

        chat_loop(
            &mut orchestrator,
            || {
                logouts.fetch_add(1, Ordering::SeqCst);
                Ok(())
            },
            &b"hi\n/history\n/logout\n"[..],
            &mut output,
        )
        .await
        .expect("loop ends at eof");

        let output = String::from_utf8(output).expect("utf8");
        assert!(output.contains("You: hi"));
        assert!(output.contains("[Calendar credentials removed]"));
        assert_eq!(logouts.load(Ordering::SeqCst), 1);
        assert_eq!(orchestrator.transcript().len(), 2);
        assert_eq!(scheduler.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn failed_logout_is_reported_inline() {
        let scheduler = Arc::new(LinkScheduler::default());
        let mut orchestrator = orchestrator(&[], scheduler);
        let mut output = Vec::new();

        chat_loop(
            &mut orchestrator,
            || Err(InfraError::Credential("permission denied".to_string())),
            &b"/logout\n/quit\n"[..],
            &mut output,
        )
        .await
        .expect("loop");

        let output = String::from_utf8(output).expect("utf8");
        assert!(output.contains("Could not remove calendar credentials"));
        assert!(output.contains("permission denied"));
    }
}
