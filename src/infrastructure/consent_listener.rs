//! Interactive OAuth consent over a loopback redirect.
//!
//! The listener runs as its own task and reports the browser callback through
//! a oneshot channel. The caller always waits on it under a timeout.

use crate::infrastructure::error::InfraError;
use async_trait::async_trait;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};
use url::Url;

const LOOPBACK_ADDRESS: &str = "127.0.0.1:0";
const CONNECTION_READ_TIMEOUT: Duration = Duration::from_secs(10);

const SUCCESS_PAGE: &str = "HTTP/1.1 200 OK\r\n\
    Content-Type: text/html; charset=utf-8\r\n\
    Connection: close\r\n\
    \r\n\
    <html><body>\
    <h1>Authorization complete</h1>\
    <p>You can close this window and return to the chat.</p>\
    </body></html>";

const FAILURE_PAGE: &str = "HTTP/1.1 400 Bad Request\r\n\
    Content-Type: text/html; charset=utf-8\r\n\
    Connection: close\r\n\
    \r\n\
    <html><body>\
    <h1>Authorization failed</h1>\
    <p>Return to the chat for details.</p>\
    </body></html>";

const NOT_FOUND: &str = "HTTP/1.1 404 Not Found\r\nConnection: close\r\n\r\n";

#[derive(Debug, Clone)]
pub struct ConsentRequest {
    pub authorization_endpoint: String,
    pub client_id: String,
    pub scopes: Vec<String>,
    pub state: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationGrant {
    pub code: String,
    pub redirect_uri: String,
}

#[async_trait]
pub trait ConsentFlow: Send + Sync {
    async fn run(&self, request: &ConsentRequest) -> Result<AuthorizationGrant, InfraError>;
}

pub fn build_authorization_url(
    request: &ConsentRequest,
    redirect_uri: &str,
) -> Result<String, InfraError> {
    if request.state.trim().is_empty() {
        return Err(InfraError::OAuth("state must not be empty".to_string()));
    }
    if request.scopes.is_empty() {
        return Err(InfraError::OAuth("at least one scope is required".to_string()));
    }

    let mut url = Url::parse(&request.authorization_endpoint)
        .map_err(|error| InfraError::OAuth(format!("invalid authorization endpoint: {error}")))?;
    let scope = request.scopes.join(" ");

    url.query_pairs_mut()
        .append_pair("response_type", "code")
        .append_pair("client_id", &request.client_id)
        .append_pair("redirect_uri", redirect_uri)
        .append_pair("scope", &scope)
        .append_pair("access_type", "offline")
        .append_pair("prompt", "consent")
        .append_pair("state", &request.state);

    Ok(url.to_string())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackOutcome {
    Code { code: String, state: Option<String> },
    Denied { reason: String, state: Option<String> },
}

impl CallbackOutcome {
    fn state(&self) -> Option<&str> {
        match self {
            Self::Code { state, .. } | Self::Denied { state, .. } => state.as_deref(),
        }
    }
}

/// Extracts the OAuth result from an HTTP request line such as
/// `GET /?code=...&state=... HTTP/1.1`. Returns `None` for unrelated requests
/// (favicon and the like).
pub fn parse_callback(request_line: &str) -> Option<CallbackOutcome> {
    let target = request_line.split_whitespace().nth(1)?;
    let url = Url::parse(&format!("http://localhost{target}")).ok()?;

    let mut code = None;
    let mut state = None;
    let mut error = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" => code = Some(value.into_owned()),
            "state" => state = Some(value.into_owned()),
            "error" => error = Some(value.into_owned()),
            _ => {}
        }
    }

    if let Some(reason) = error {
        return Some(CallbackOutcome::Denied { reason, state });
    }
    code.filter(|value| !value.is_empty())
        .map(|code| CallbackOutcome::Code { code, state })
}

/// Accepts connections until one carries an OAuth callback and returns the
/// outcome. Each connection is served on its own task under a read timeout.
pub async fn await_callback(listener: TcpListener) -> Result<CallbackOutcome, InfraError> {
    let (sender, mut receiver) = mpsc::channel(1);
    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, _) = accepted.map_err(|error| {
                    InfraError::OAuth(format!("failed accepting oauth callback: {error}"))
                })?;
                let sender = sender.clone();
                tokio::spawn(async move {
                    if let Some(outcome) = serve_connection(stream).await {
                        let _ = sender.send(outcome).await;
                    }
                });
            }
            Some(outcome) = receiver.recv() => return Ok(outcome),
        }
    }
}

async fn serve_connection(stream: TcpStream) -> Option<CallbackOutcome> {
    let mut reader = BufReader::new(stream);
    let mut request_line = String::new();
    match tokio::time::timeout(CONNECTION_READ_TIMEOUT, reader.read_line(&mut request_line)).await {
        Ok(Ok(_)) => {}
        Ok(Err(error)) => {
            warn!(%error, "oauth_callback_read_failed");
            return None;
        }
        Err(_) => {
            debug!("oauth_callback_connection_idle");
            return None;
        }
    }

    let outcome = parse_callback(&request_line);
    let page = match &outcome {
        Some(CallbackOutcome::Code { .. }) => SUCCESS_PAGE,
        Some(CallbackOutcome::Denied { .. }) => FAILURE_PAGE,
        None => NOT_FOUND,
    };

    let mut stream = reader.into_inner();
    if let Err(error) = stream.write_all(page.as_bytes()).await {
        warn!(%error, "oauth_callback_write_failed");
    }
    let _ = stream.shutdown().await;
    outcome
}

#[derive(Debug, Clone)]
pub struct LoopbackConsentFlow {
    timeout: Duration,
    open_browser: bool,
}

impl LoopbackConsentFlow {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            open_browser: true,
        }
    }

    pub fn without_browser(mut self) -> Self {
        self.open_browser = false;
        self
    }

    /// Runs consent against an already bound listener; the redirect URI
    /// points at its port.
    pub async fn run_on(
        &self,
        listener: TcpListener,
        request: &ConsentRequest,
    ) -> Result<AuthorizationGrant, InfraError> {
        let port = listener
            .local_addr()
            .map_err(|error| InfraError::OAuth(format!("failed reading listener address: {error}")))?
            .port();
        let redirect_uri = format!("http://127.0.0.1:{port}/");
        let authorization_url = build_authorization_url(request, &redirect_uri)?;

        let (sender, receiver) = oneshot::channel();
        let task = tokio::spawn(async move {
            let _ = sender.send(await_callback(listener).await);
        });

        eprintln!("\nOpen this URL in your browser to authorize calendar access:\n");
        eprintln!("{authorization_url}\n");
        if self.open_browser && open::that(&authorization_url).is_err() {
            eprintln!("(Could not open a browser automatically, please copy the URL above)");
        }
        info!(port, timeout_secs = self.timeout.as_secs(), "oauth_consent_waiting");

        let outcome = match tokio::time::timeout(self.timeout, receiver).await {
            Ok(Ok(result)) => result?,
            Ok(Err(_)) => {
                return Err(InfraError::OAuth(
                    "oauth callback listener stopped unexpectedly".to_string(),
                ));
            }
            Err(_) => {
                task.abort();
                return Err(InfraError::OAuth(format!(
                    "consent timed out after {} seconds",
                    self.timeout.as_secs()
                )));
            }
        };

        if outcome.state() != Some(request.state.as_str()) {
            return Err(InfraError::OAuth(
                "oauth callback state did not match the request".to_string(),
            ));
        }
        match outcome {
            CallbackOutcome::Denied { reason, .. } => {
                Err(InfraError::OAuth(format!("consent denied: {reason}")))
            }
            CallbackOutcome::Code { code, .. } => {
                info!("oauth_consent_granted");
                Ok(AuthorizationGrant { code, redirect_uri })
            }
        }
    }
}

#[async_trait]
impl ConsentFlow for LoopbackConsentFlow {
    async fn run(&self, request: &ConsentRequest) -> Result<AuthorizationGrant, InfraError> {
        let listener = TcpListener::bind(LOOPBACK_ADDRESS)
            .await
            .map_err(|error| InfraError::OAuth(format!("failed binding oauth callback listener: {error}")))?;
        self.run_on(listener, request).await
    }
}
