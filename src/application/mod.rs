pub mod authorizer;
pub mod chat;
pub mod event_creator;
pub mod orchestrator;
pub mod trigger;
