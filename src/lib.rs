//! Library root for the `lms_autoflow` crate

// Core error handling
pub mod errors;

// Configuration & crypto
pub mod config;
pub mod crypto;

// Environments & credentials
pub mod credentials;
pub mod environment;

// LMS session layer
pub mod client_cache;
pub mod history;
pub mod lms_client;

// Scripted flows
pub mod flows;
pub mod kpi_table;

// Clone-execution audit trail
pub mod exec_history;

// Web server interface
pub mod api_errors;
pub mod app_state;
pub mod web;
