//! readaloud-assess library interface
//!
//! Scores a child's reading of a sentence, turns the scores into
//! kid-friendly feedback, and narrates that feedback.
//!
//! Request handlers hold an [`AppContext`] and call
//! [`AppContext::orchestrator`]; the orchestrator is built on first use,
//! exactly once, even under concurrent first access.

pub mod config;
pub mod error;
pub mod models;
pub mod services;
pub mod utils;

pub use crate::config::AssessConfig;
pub use crate::error::{AssessError, AssessResult};
pub use crate::services::{AssessmentOrchestrator, Backends};

use crate::services::{AzureRestTransport, GeminiClient, ScoringTransport};
use std::sync::Arc;
use tokio::sync::OnceCell;

/// Builds the external service handles from configuration
pub type BackendFactory = Arc<dyn Fn(&AssessConfig) -> AssessResult<Backends> + Send + Sync>;

/// Speech service scoring plus Gemini feedback and synthesis
pub fn provider_backends(config: &AssessConfig) -> AssessResult<Backends> {
    let scoring: Arc<dyn ScoringTransport> = Arc::new(AzureRestTransport::new(&config.scoring)?);
    let gemini = Arc::new(GeminiClient::new(&config.feedback, &config.narration.tts_model_name)?);

    Ok(Backends {
        scoring,
        feedback: gemini.clone(),
        speech: gemini,
    })
}

/// Application context shared by request handlers
#[derive(Clone)]
pub struct AppContext {
    config: Arc<AssessConfig>,
    backend_factory: BackendFactory,
    orchestrator: Arc<OnceCell<Arc<AssessmentOrchestrator>>>,
}

impl AppContext {
    /// Context using the real provider clients
    pub fn new(config: AssessConfig) -> Self {
        Self::with_backend_factory(config, Arc::new(provider_backends))
    }

    pub fn with_backend_factory(config: AssessConfig, backend_factory: BackendFactory) -> Self {
        Self {
            config: Arc::new(config),
            backend_factory,
            orchestrator: Arc::new(OnceCell::new()),
        }
    }

    pub fn config(&self) -> &AssessConfig {
        &self.config
    }

    /// The process-wide orchestrator, built on first call.
    ///
    /// Concurrent first callers wait on one initialization. A failed
    /// initialization is not cached; the next call retries.
    pub async fn orchestrator(&self) -> AssessResult<Arc<AssessmentOrchestrator>> {
        self.orchestrator
            .get_or_try_init(|| async {
                let backends = (self.backend_factory)(&self.config)?;
                let orchestrator = AssessmentOrchestrator::build(&self.config, backends).await?;
                Ok::<_, AssessError>(Arc::new(orchestrator))
            })
            .await
            .map(Arc::clone)
    }

    /// True once the orchestrator has been built
    pub fn is_initialized(&self) -> bool {
        self.orchestrator.initialized()
    }
}
