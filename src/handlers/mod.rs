pub mod auth;
pub mod health_handlers;
pub mod record_handlers;
pub mod settings_handlers;
pub mod upload_handlers;
