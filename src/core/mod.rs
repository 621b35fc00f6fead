pub mod app;
pub mod config;
pub mod context;
pub mod message;
pub mod provider_client;
pub mod providers;
pub mod session;
