use crate::domain::models::{CredentialKey, OAuthToken};
use crate::infrastructure::client_secret::ClientSecret;
use crate::infrastructure::consent_listener::{ConsentFlow, ConsentRequest};
use crate::infrastructure::credential_store::CredentialStore;
use crate::infrastructure::error::InfraError;
use crate::infrastructure::google_calendar_client::CalendarClient;
use crate::infrastructure::oauth_client::{
    OAuthCodeExchangeRequest, OAuthHttpClient, OAuthRefreshRequest, OAuthTokenResponse,
};
use chrono::{DateTime, Duration, Utc};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

pub const CALENDAR_SERVICE: &str = "calendar";
pub const CALENDAR_VERSION: &str = "v3";
pub const CALENDAR_SCOPE: &str = "https://www.googleapis.com/auth/calendar";

const TOKEN_LEEWAY_SECONDS: i64 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenSource {
    Cached,
    Refreshed,
    Consented,
}

/// Calendar API handle bound to a validated access token.
#[derive(Clone)]
pub struct AuthenticatedClient {
    service_name: String,
    service_version: String,
    access_token: String,
    source: TokenSource,
    calendar: Arc<dyn CalendarClient>,
}

impl std::fmt::Debug for AuthenticatedClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthenticatedClient")
            .field("service_name", &self.service_name)
            .field("service_version", &self.service_version)
            .field("source", &self.source)
            .finish_non_exhaustive()
    }
}

impl AuthenticatedClient {
    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    pub fn source(&self) -> TokenSource {
        self.source
    }

    pub fn calendar(&self) -> &dyn CalendarClient {
        self.calendar.as_ref()
    }
}

type NowProvider = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;
type StateProvider = Arc<dyn Fn() -> String + Send + Sync>;

enum SecretSource<'a> {
    File(&'a Path),
    Loaded(&'a ClientSecret),
}

impl SecretSource<'_> {
    fn resolve(&self) -> Result<ClientSecret, InfraError> {
        match self {
            Self::File(path) => ClientSecret::from_file(path),
            Self::Loaded(secret) => Ok((*secret).clone()),
        }
    }
}

pub struct Authorizer<S, C>
where
    S: CredentialStore,
    C: OAuthHttpClient,
{
    credential_store: Arc<S>,
    oauth_client: Arc<C>,
    consent_flow: Arc<dyn ConsentFlow>,
    calendar: Arc<dyn CalendarClient>,
    key_prefix: String,
    now_provider: NowProvider,
    state_provider: StateProvider,
}

impl<S, C> Authorizer<S, C>
where
    S: CredentialStore,
    C: OAuthHttpClient,
{
    pub fn new(
        credential_store: Arc<S>,
        oauth_client: Arc<C>,
        consent_flow: Arc<dyn ConsentFlow>,
        calendar: Arc<dyn CalendarClient>,
    ) -> Self {
        Self {
            credential_store,
            oauth_client,
            consent_flow,
            calendar,
            key_prefix: String::new(),
            now_provider: Arc::new(Utc::now),
            state_provider: Arc::new(|| uuid::Uuid::new_v4().simple().to_string()),
        }
    }

    pub fn with_now_provider(mut self, now_provider: NowProvider) -> Self {
        self.now_provider = now_provider;
        self
    }

    /// Suffix appended to token file names, e.g. one per local user.
    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    pub fn credential_key(&self, service_name: &str, service_version: &str) -> CredentialKey {
        CredentialKey::new(service_name, service_version).with_prefix(self.key_prefix.clone())
    }

    pub fn is_token_valid(&self, token: &OAuthToken) -> bool {
        token.is_valid_at((self.now_provider)(), TOKEN_LEEWAY_SECONDS)
    }

    pub fn clear_stored_token(
        &self,
        service_name: &str,
        service_version: &str,
    ) -> Result<(), InfraError> {
        let key = self.credential_key(service_name, service_version);
        self.credential_store.delete_token(&key)?;
        info!(token_file = %key.file_name(), "cached_token_cleared");
        Ok(())
    }

    /// The client-secret file is only read when a refresh or consent needs it.
    pub async fn acquire(
        &self,
        client_secret_file: &Path,
        service_name: &str,
        service_version: &str,
        scopes: &[String],
    ) -> Result<AuthenticatedClient, InfraError> {
        self.authorize(
            SecretSource::File(client_secret_file),
            service_name,
            service_version,
            scopes,
        )
        .await
    }

    pub async fn acquire_with_secret(
        &self,
        secret: &ClientSecret,
        service_name: &str,
        service_version: &str,
        scopes: &[String],
    ) -> Result<AuthenticatedClient, InfraError> {
        self.authorize(SecretSource::Loaded(secret), service_name, service_version, scopes)
            .await
    }

    async fn authorize(
        &self,
        secrets: SecretSource<'_>,
        service_name: &str,
        service_version: &str,
        scopes: &[String],
    ) -> Result<AuthenticatedClient, InfraError> {
        if service_name != CALENDAR_SERVICE || service_version != CALENDAR_VERSION {
            return Err(InfraError::OAuth(format!(
                "unsupported service {service_name} {service_version}"
            )));
        }
        if scopes.is_empty() {
            return Err(InfraError::OAuth("at least one scope is required".to_string()));
        }

        let key = self.credential_key(service_name, service_version);
        let (token, source) = self.obtain_token(&secrets, &key, scopes).await?;
        if source != TokenSource::Cached {
            self.credential_store.save_token(&key, &token)?;
        }
        info!(
            service = service_name,
            version = service_version,
            source = ?source,
            expires_at = %token.expires_at,
            "calendar_authorized"
        );
        self.build_client(service_name, service_version, token, source)
    }

    async fn obtain_token(
        &self,
        secrets: &SecretSource<'_>,
        key: &CredentialKey,
        scopes: &[String],
    ) -> Result<(OAuthToken, TokenSource), InfraError> {
        let Some(stored) = self.credential_store.load_token(key)? else {
            info!(token_file = %key.file_name(), "no_cached_token");
            return self.consent(&secrets.resolve()?, scopes).await;
        };

        if !stored.covers(scopes) {
            warn!(
                token_file = %key.file_name(),
                "cached_token_missing_requested_scopes"
            );
            return self.consent(&secrets.resolve()?, scopes).await;
        }

        if self.is_token_valid(&stored) {
            return Ok((stored, TokenSource::Cached));
        }

        let secret = secrets.resolve()?;
        let Some(refresh_token) = stored.refresh_token.clone() else {
            info!("cached_token_expired_without_refresh_token");
            return self.consent(&secret, scopes).await;
        };

        let refreshed = self
            .oauth_client
            .refresh_access_token(OAuthRefreshRequest {
                token_endpoint: secret.token_endpoint.clone(),
                client_id: secret.client_id.clone(),
                client_secret: secret.client_secret.clone(),
                refresh_token,
            })
            .await;

        match refreshed {
            Ok(response) => {
                let token = self.token_from_response(
                    response,
                    stored.refresh_token.clone(),
                    &stored.scopes,
                );
                info!("access_token_refreshed");
                Ok((token, TokenSource::Refreshed))
            }
            Err(InfraError::OAuth(reason)) => {
                warn!(%reason, "refresh_rejected");
                self.consent(&secret, scopes).await
            }
            Err(error) => Err(error),
        }
    }

    async fn consent(
        &self,
        secret: &ClientSecret,
        scopes: &[String],
    ) -> Result<(OAuthToken, TokenSource), InfraError> {
        let request = ConsentRequest {
            authorization_endpoint: secret.authorization_endpoint.clone(),
            client_id: secret.client_id.clone(),
            scopes: scopes.to_vec(),
            state: (self.state_provider)(),
        };
        let grant = self.consent_flow.run(&request).await?;
        if grant.code.trim().is_empty() {
            return Err(InfraError::OAuth("authorization code must not be empty".to_string()));
        }

        let response = self
            .oauth_client
            .exchange_authorization_code(OAuthCodeExchangeRequest {
                token_endpoint: secret.token_endpoint.clone(),
                client_id: secret.client_id.clone(),
                client_secret: secret.client_secret.clone(),
                redirect_uri: grant.redirect_uri,
                authorization_code: grant.code,
            })
            .await?;

        Ok((
            self.token_from_response(response, None, scopes),
            TokenSource::Consented,
        ))
    }

    fn token_from_response(
        &self,
        response: OAuthTokenResponse,
        fallback_refresh_token: Option<String>,
        fallback_scopes: &[String],
    ) -> OAuthToken {
        let expires_at = (self.now_provider)() + Duration::seconds(response.expires_in.max(0));
        // Google omits `scope` on some refresh responses.
        let scopes = match response.scope.as_deref() {
            Some(scope) if !scope.trim().is_empty() => {
                scope.split_whitespace().map(ToOwned::to_owned).collect()
            }
            _ => fallback_scopes.to_vec(),
        };
        OAuthToken {
            access_token: response.access_token,
            refresh_token: response.refresh_token.or(fallback_refresh_token),
            expires_at,
            token_type: response.token_type.unwrap_or_else(|| "Bearer".to_string()),
            scopes,
        }
    }

    fn build_client(
        &self,
        service_name: &str,
        service_version: &str,
        token: OAuthToken,
        source: TokenSource,
    ) -> Result<AuthenticatedClient, InfraError> {
        if token.access_token.trim().is_empty() {
            return Err(InfraError::OAuth("access token must not be empty".to_string()));
        }
        Ok(AuthenticatedClient {
            service_name: service_name.to_string(),
            service_version: service_version.to_string(),
            access_token: token.access_token,
            source,
            calendar: Arc::clone(&self.calendar),
        })
    }
}
