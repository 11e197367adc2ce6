//! HTTP hosting for compiled quarry routes.
//!
//! The binary in `main.rs` wires configuration and logging; everything that
//! serves requests lives here so it can be driven directly from tests.

pub mod landing;
pub mod server;

pub use server::{build_router, ApiError, AppState};
