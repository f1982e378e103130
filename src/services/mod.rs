pub mod credential_store;
pub mod file_sweeper;
pub mod nonce_service;
pub mod record_store;
pub mod sanitize;
pub mod settings_service;
pub mod upload_service;
pub mod vimeo_client;
