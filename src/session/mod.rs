//! Single-user session: the state a front end renders.
//!
//! Holds the selected portrait, the live result set, the current phase and
//! an optional error banner. Generation runs in a background task that
//! reports through [`RunObserver`], so partial results and `k/16` progress
//! are visible while the run is in flight. Only one run (or one download)
//! is active at a time.
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::archive::ArchiveBuilder;
use crate::error::{AppError, AppResult};
use crate::generation::results::{CategorySummary, GeneratedImage, ResultSet};
use crate::generation::retry::{Progress, RetryLoop, RunObserver};
use crate::prompt::catalog::{Category, TOTAL_PAIRS};
use crate::utils::media::SourceImage;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Phase {
    #[default]
    Idle,
    Generating { processed: usize, total: usize },
    Zipping,
}

#[derive(Debug, Default)]
struct SessionState {
    source: Option<SourceImage>,
    results: ResultSet,
    phase: Phase,
    error: Option<String>,
}

/// Snapshot returned by `status`.
#[derive(Debug, Clone, Serialize)]
pub struct StatusView {
    pub phase: Phase,
    pub progress: Option<String>,
    pub error: Option<String>,
    pub has_source: bool,
    pub results: Vec<CategorySummary>,
}

pub struct Session {
    state: Arc<RwLock<SessionState>>,
    runner: Arc<RetryLoop>,
    archive: ArchiveBuilder,
}

impl Session {
    pub fn new(runner: RetryLoop, archive: ArchiveBuilder) -> Self {
        Session {
            state: Arc::new(RwLock::new(SessionState::default())),
            runner: Arc::new(runner),
            archive,
        }
    }

    /// Select a new portrait. Drops the previous one and any results.
    pub async fn select_source(&self, source: SourceImage) -> AppResult<()> {
        let mut st = self.state.write().await;
        ensure_idle(&st)?;
        tracing::info!(bytes = source.bytes.len(), mime = %source.mime_type, "Source image selected");
        st.error = None;
        st.results.clear();
        st.source = Some(source);
        Ok(())
    }

    pub async fn clear_source(&self) -> AppResult<()> {
        let mut st = self.state.write().await;
        ensure_idle(&st)?;
        st.error = None;
        st.results.clear();
        st.source = None;
        Ok(())
    }

    /// Start a run in the background. Fails when no portrait is selected or
    /// when a run or download is already active.
    pub async fn start_generation(&self) -> AppResult<()> {
        let source = {
            let mut st = self.state.write().await;
            let Some(source) = st.source.clone() else {
                let err = AppError::InvalidInput("Select an image first.".to_string());
                st.error = Some(err.to_string());
                return Err(err);
            };
            ensure_idle(&st)?;
            st.error = None;
            st.results.clear();
            st.phase = Phase::Generating { processed: 0, total: TOTAL_PAIRS };
            source
        };

        let state = Arc::clone(&self.state);
        let runner = Arc::clone(&self.runner);
        tokio::spawn(async move {
            let run_state = Arc::clone(&state);
            let task = tokio::spawn(async move {
                let mut observer = SessionObserver { state: run_state };
                runner.run(&source, &mut observer).await
            });

            let banner = match task.await {
                Ok(Ok(report)) => report.partial_failure_message(),
                Ok(Err(e)) => {
                    tracing::error!("Generation run failed: {}", e);
                    Some(format!("generation failed: {}", e))
                }
                Err(e) => {
                    tracing::error!("Generation task aborted: {}", e);
                    Some(format!("generation failed: {}", e))
                }
            };
            let mut st = state.write().await;
            st.phase = Phase::Idle;
            st.error = banner;
        });
        Ok(())
    }

    /// Package the current results. On failure the banner is set and no
    /// bytes are returned. Dropping the returned future mid-build puts the
    /// session back to idle.
    pub async fn download(&self) -> AppResult<Vec<u8>> {
        let results = {
            let mut st = self.state.write().await;
            ensure_idle(&st)?;
            if st.results.is_empty() {
                return Err(AppError::InvalidInput("No generated images to download".to_string()));
            }
            st.error = None;
            st.phase = Phase::Zipping;
            st.results.clone()
        };
        let guard = ZippingGuard { state: Some(Arc::clone(&self.state)) };

        let built = self.archive.build(&results).await;

        let mut st = self.state.write().await;
        guard.disarm();
        st.phase = Phase::Idle;
        built.map_err(|e| {
            tracing::error!("Archive build failed: {}", e);
            st.error = Some(format!("download failed: {}", e));
            e
        })
    }

    pub async fn dismiss_error(&self) {
        self.state.write().await.error = None;
    }

    pub async fn status(&self) -> StatusView {
        let st = self.state.read().await;
        let progress = match st.phase {
            Phase::Generating { processed, total } => Some(Progress { processed, total }.to_string()),
            _ => None,
        };
        StatusView {
            phase: st.phase,
            progress,
            error: st.error.clone(),
            has_source: st.source.is_some(),
            results: st.results.summary(),
        }
    }

    pub async fn image(&self, id: Uuid) -> AppResult<GeneratedImage> {
        self.state
            .read()
            .await
            .results
            .find(id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("image {}", id)))
    }

    pub async fn image_bytes(&self, id: Uuid) -> AppResult<Vec<u8>> {
        let image = self.image(id).await?;
        self.archive.fetch_image(&image.image_uri).await
    }
}

fn ensure_idle(st: &SessionState) -> AppResult<()> {
    match st.phase {
        Phase::Idle => Ok(()),
        Phase::Generating { .. } => Err(AppError::Conflict("A generation run is in progress".to_string())),
        Phase::Zipping => Err(AppError::Conflict("An archive is being built".to_string())),
    }
}

/// Puts `Zipping` back to `Idle` when dropped while still armed.
struct ZippingGuard {
    state: Option<Arc<RwLock<SessionState>>>,
}

impl ZippingGuard {
    fn disarm(mut self) {
        self.state = None;
    }
}

impl Drop for ZippingGuard {
    fn drop(&mut self) {
        let Some(state) = self.state.take() else {
            return;
        };
        tracing::warn!("Archive build abandoned, returning to idle");
        if let Ok(mut st) = state.try_write() {
            leave_zipping(&mut st);
            return;
        }
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move {
                leave_zipping(&mut *state.write().await);
            });
        }
    }
}

fn leave_zipping(st: &mut SessionState) {
    if st.phase == Phase::Zipping {
        st.phase = Phase::Idle;
    }
}

struct SessionObserver {
    state: Arc<RwLock<SessionState>>,
}

#[async_trait]
impl RunObserver for SessionObserver {
    async fn image_added(&mut self, category: Category, image: &GeneratedImage) {
        let mut st = self.state.write().await;
        if let Err(e) = st.results.push(category, image.clone()) {
            tracing::warn!("Dropping result: {}", e);
        }
    }

    async fn progress(&mut self, progress: Progress) {
        tracing::info!("{}", progress);
        self.state.write().await.phase = Phase::Generating {
            processed: progress.processed,
            total: progress.total,
        };
    }
}
