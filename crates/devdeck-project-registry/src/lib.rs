//! # DevDeck Project Registry
//!
//! Registered projects and the control-plane HTTP surface.
//!
//! This crate provides:
//! - ProjectStore - the `projects.json` registry, written through atomically
//! - HTTP API for project CRUD, deployment and process lifecycle
//! - ControlPlaneServer - API, static UI and CORS on one listener

pub mod api;
pub mod server;
pub mod storage;
pub mod types;

// Re-export commonly used items
pub use api::{create_router, AppState};
pub use server::ControlPlaneServer;
pub use storage::ProjectStore;
