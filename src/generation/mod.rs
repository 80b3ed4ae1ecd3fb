//! The generation seam and the orchestration built on it.
//!
//! - `results`: generated images and the per-category result set.
//! - `retry`: the sequential 16-pair loop with rate-limit backoff.
pub mod results;
pub mod retry;

use async_trait::async_trait;

use crate::error::AppResult;
use crate::prompt::catalog::Category;
use crate::utils::media::SourceImage;

/// What one successful generation call yields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedVariant {
    /// Displayable `data:` (or `http(s)`) URI of the image.
    pub image_uri: String,
    /// Normalized box-format label text, possibly empty.
    pub label: String,
}

/// One request to the external image service: source image plus prompt in,
/// image plus labels out. Implementations never retry internally.
#[async_trait]
pub trait GenerationService: Send + Sync {
    async fn generate(
        &self,
        source: &SourceImage,
        prompt: &str,
        category: Category,
    ) -> AppResult<GeneratedVariant>;
}
