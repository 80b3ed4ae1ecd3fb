//! Expression Forge library
//!
//! Turns one portrait into sixteen stylized variants (yawning, holding a
//! phone, focused, anxious) through an external image model, labels each
//! variant with normalized bounding boxes, and packages everything as a zip.
//!
//! Modules:
//! - `prompt`: the fixed category/prompt catalog and the combined-instruction builder.
//! - `labels`: detection text to normalized box-format label conversion.
//! - `gemini`: thin client for the Gemini `generateContent` endpoint.
//! - `generation`: the generation seam, result set, and the sequential retry loop.
//! - `archive`: zip packaging of a finished result set.
//! - `session`: single-user view state driven by the HTTP service.
//! - `api`: Axum HTTP handlers and router setup used by the binary.
//! - `utils`: source images and `data:` URIs.
//! - `config`: Env-driven configuration loader.
//! - `error`: Common error type and alias.
pub mod api;
pub mod archive;
pub mod config;
pub mod error;
pub mod gemini;
pub mod generation;
pub mod labels;
pub mod prompt;
pub mod session;
pub mod utils;

pub use archive::ArchiveBuilder;
pub use config::Config;
pub use gemini::client::GeminiClient;
pub use generation::retry::{RetryLoop, RetryPolicy};
pub use generation::{GeneratedVariant, GenerationService};
pub use prompt::catalog::Category;
pub use session::Session;
