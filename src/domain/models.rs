use chrono::{DateTime, Duration, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

pub const EVENT_START_HOUR: u32 = 10;
pub const EVENT_DURATION_MINUTES: i64 = 60;
pub const PRIMARY_CALENDAR_ID: &str = "primary";
pub const DEFAULT_TRIGGER_PHRASES: &[&str] = &["add event", "schedule"];

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Ordered, append-only record of one chat session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transcript {
    messages: Vec<ChatMessage>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: ChatMessage) {
        self.messages.push(message);
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&ChatMessage> {
        self.messages.last()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OAuthToken {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub token_type: String,
    #[serde(default)]
    pub scopes: Vec<String>,
}

impl OAuthToken {
    pub fn is_valid_at(&self, now: DateTime<Utc>, leeway_seconds: i64) -> bool {
        self.expires_at > now + Duration::seconds(leeway_seconds)
            && !self.access_token.trim().is_empty()
    }

    /// True when every requested scope was granted to this token.
    pub fn covers(&self, requested: &[String]) -> bool {
        requested
            .iter()
            .all(|scope| self.scopes.iter().any(|granted| granted == scope))
    }
}

/// Identity of one cached token file. Scopes are deliberately not part of it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CredentialKey {
    pub service_name: String,
    pub service_version: String,
    pub prefix: String,
}

impl CredentialKey {
    pub fn new(service_name: impl Into<String>, service_version: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            service_version: service_version.into(),
            prefix: String::new(),
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn file_name(&self) -> String {
        format!(
            "token_{}_{}{}.json",
            self.service_name, self.service_version, self.prefix
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventRequest {
    pub summary: String,
    pub start: DateTime<Tz>,
    pub end: DateTime<Tz>,
    pub timezone: Tz,
}

impl EventRequest {
    pub fn validate(&self) -> Result<(), String> {
        if self.summary.trim().is_empty() {
            return Err("event summary must not be empty".to_string());
        }
        if self.end <= self.start {
            return Err(format!(
                "event end {} must be after start {}",
                self.end.to_rfc3339(),
                self.start.to_rfc3339()
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedEvent {
    pub id: String,
    pub html_link: String,
}

/// Next calendar day at 10:00 in `timezone`, lasting one hour.
///
/// This is the only scheduling policy: the reply text never influences the
/// window.
pub fn next_day_window(
    now: DateTime<Utc>,
    timezone: Tz,
) -> Result<(DateTime<Tz>, DateTime<Tz>), String> {
    let today = now.with_timezone(&timezone).date_naive();
    let tomorrow = today
        .succ_opt()
        .ok_or_else(|| format!("no calendar day after {today}"))?;
    let ten = NaiveTime::from_hms_opt(EVENT_START_HOUR, 0, 0)
        .ok_or_else(|| "invalid event start hour".to_string())?;
    let start = timezone
        .from_local_datetime(&tomorrow.and_time(ten))
        .earliest()
        .ok_or_else(|| format!("{tomorrow} {ten} does not exist in {timezone}"))?;
    let end = start + Duration::minutes(EVENT_DURATION_MINUTES);
    Ok((start, end))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;
    use proptest::prelude::*;

    fn fixed_time(value: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(value)
            .expect("valid datetime")
            .with_timezone(&Utc)
    }

    fn sample_token(scopes: &[&str]) -> OAuthToken {
        OAuthToken {
            access_token: "access".to_string(),
            refresh_token: Some("refresh".to_string()),
            expires_at: fixed_time("2026-02-16T10:00:00Z"),
            token_type: "Bearer".to_string(),
            scopes: scopes.iter().map(|scope| scope.to_string()).collect(),
        }
    }

    #[test]
    fn token_validity_respects_leeway() {
        let token = sample_token(&[]);
        assert!(token.is_valid_at(fixed_time("2026-02-16T09:58:00Z"), 60));
        assert!(!token.is_valid_at(fixed_time("2026-02-16T09:59:30Z"), 60));
        assert!(!token.is_valid_at(fixed_time("2026-02-16T11:00:00Z"), 0));
    }

    #[test]
    fn token_with_blank_access_token_is_never_valid() {
        let mut token = sample_token(&[]);
        token.access_token = "  ".to_string();
        assert!(!token.is_valid_at(fixed_time("2026-02-16T08:00:00Z"), 0));
    }

    #[test]
    fn covers_requires_every_requested_scope() {
        let token = sample_token(&["a", "b"]);
        assert!(token.covers(&["a".to_string()]));
        assert!(token.covers(&["b".to_string(), "a".to_string()]));
        assert!(!token.covers(&["a".to_string(), "c".to_string()]));
        assert!(token.covers(&[]));
    }

    #[test]
    fn credential_key_file_name_uses_service_version_and_prefix() {
        let key = CredentialKey::new("calendar", "v3");
        assert_eq!(key.file_name(), "token_calendar_v3.json");
        assert_eq!(
            key.with_prefix("_alice").file_name(),
            "token_calendar_v3_alice.json"
        );
    }

    #[test]
    fn next_day_window_starts_tomorrow_at_ten_local() {
        let tz: Tz = "America/New_York".parse().expect("tz");
        // 2026-02-16 23:30 in New York is already the 17th in UTC.
        let now = fixed_time("2026-02-17T04:30:00Z");
        let (start, end) = next_day_window(now, tz).expect("window");

        assert_eq!(start.to_rfc3339(), "2026-02-17T10:00:00-05:00");
        assert_eq!(end - start, Duration::hours(1));
    }

    #[test]
    fn next_day_window_crosses_dst_change() {
        let tz: Tz = "America/New_York".parse().expect("tz");
        let now = fixed_time("2026-03-07T15:00:00Z");
        let (start, end) = next_day_window(now, tz).expect("window");

        assert_eq!(start.to_rfc3339(), "2026-03-08T10:00:00-04:00");
        assert_eq!(end.to_rfc3339(), "2026-03-08T11:00:00-04:00");
    }

    #[test]
    fn event_request_rejects_inverted_window() {
        let tz: Tz = "UTC".parse().expect("tz");
        let start = fixed_time("2026-02-16T10:00:00Z").with_timezone(&tz);
        let request = EventRequest {
            summary: "Sync".to_string(),
            start,
            end: start,
            timezone: tz,
        };
        assert!(request.validate().is_err());
    }

    proptest! {
        #[test]
        fn next_day_window_is_always_one_hour_at_ten(offset_minutes in 0i64..(365 * 24 * 60)) {
            let tz: Tz = "Europe/Berlin".parse().expect("tz");
            let now = fixed_time("2026-01-01T00:00:00Z") + Duration::minutes(offset_minutes);
            let (start, end) = next_day_window(now, tz).expect("window");

            prop_assert_eq!(start.hour(), 10);
            prop_assert_eq!(start.minute(), 0);
            prop_assert_eq!(end - start, Duration::hours(1));
            prop_assert_eq!(
                start.date_naive(),
                now.with_timezone(&tz).date_naive().succ_opt().expect("next day")
            );
        }
    }
}
