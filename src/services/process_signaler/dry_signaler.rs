use crate::config::RendererConfig;
use crate::error::Result;
use tracing::info;

use super::r#trait::RendererSignaler;

pub struct DryRunSignaler {
    process_name: String,
}

impl DryRunSignaler {
    pub fn new(config: &RendererConfig) -> Self {
        info!("Dry-run режим - сигналы рендереру не отправляются");
        Self {
            process_name: config.process_name.clone(),
        }
    }
}

#[async_trait::async_trait]
impl RendererSignaler for DryRunSignaler {
    async fn signal(&self, visible: bool) -> Result<()> {
        info!(
            "[DRY RUN] {} -> {}",
            self.process_name,
            if visible { "show" } else { "hide" }
        );
        Ok(())
    }
}
