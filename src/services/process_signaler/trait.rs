use crate::config::RendererConfig;
use crate::error::Result;
use std::sync::Arc;

use super::dry_signaler::DryRunSignaler;
use super::signaler::ProcessSignaler;

/// Trait for renderer control channels that can run in different modes
#[async_trait::async_trait]
pub trait RendererSignaler: Send + Sync {
    /// Deliver the show (`true`) or hide (`false`) signal to the renderer
    async fn signal(&self, visible: bool) -> Result<()>;
}

/// Factory function to create an appropriate renderer signaler based on the dry_run flag
pub fn create_renderer_signaler(
    config: &RendererConfig,
    dry_run: bool,
) -> Result<Arc<dyn RendererSignaler>> {
    if dry_run {
        Ok(Arc::new(DryRunSignaler::new(config)))
    } else {
        Ok(Arc::new(ProcessSignaler::from_config(config)?))
    }
}
