pub mod client;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod index;
pub mod mcp;
pub mod models;
pub mod repositories;
pub mod router;
pub mod services;

// Make test_utils available for both unit tests and integration tests
pub mod test_utils;

pub use router::create_router;

use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub registration_service: Arc<services::RegistrationService>,
    pub discovery_service: Arc<services::DiscoveryService>,
}
