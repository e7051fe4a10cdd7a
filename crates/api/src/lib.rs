//! # Diagram API Server
//!
//! HTTP and WebSocket front end for render-validated diagram generation.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────┐
//! │   REST Endpoints    │ <- /generate, /health, /api-doc/openapi.json
//! ├─────────────────────┤
//! │  Render WebSocket   │ <- /render (one connection per browser tab)
//! ├─────────────────────┤
//! │ Connection Registry │ <- addresses validations to exactly one client
//! ├─────────────────────┤
//! │ Repair Orchestrator │ <- draft → validate → fix, bounded retries
//! ├─────────────────────┤
//! │ Generation Provider │ <- OpenAI-compatible chat completions
//! └─────────────────────┘
//! ```
//!
//! ## Usage Pattern
//!
//! 1. Connect a browser render client to **WebSocket** `/render` and read its
//!    `connectionId` from the first frame
//! 2. **POST** `/generate` with the prompt, chat history, current diagram and
//!    that `connectionId`
//! 3. Render each `validate` frame and answer with a `verdict`
//! 4. The HTTP response carries the final diagram once it renders (or the
//!    best effort and last error once the retry budget is spent)
//!
//! ## Error Handling
//!
//! - Malformed bodies and empty prompts return `ErrorResponse` with a 4xx status
//! - Provider and render failures are reported in the body with `success: false`

pub mod middleware;
pub mod openapi;
pub mod routes;
pub mod server;
pub mod types;

pub use server::{AppState, DiagramServer};
pub use types::*;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
