pub mod chat_client;
pub mod client_secret;
pub mod config;
pub mod consent_listener;
pub mod credential_store;
pub mod error;
pub mod event_mapper;
pub mod google_calendar_client;
pub mod oauth_client;
