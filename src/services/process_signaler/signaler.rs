use crate::config::RendererConfig;
use crate::error::{OskError, Result};
use crate::utils::ProcessFinder;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use std::time::Duration;
use tracing::{info, warn};

use super::r#trait::RendererSignaler;

/// Доставка сигнала процессу по PID
pub trait SignalSender: Send + Sync {
    fn send(&self, pid: i32, signal: Signal) -> nix::Result<()>;
}

pub struct NixSignalSender;

impl SignalSender for NixSignalSender {
    fn send(&self, pid: i32, signal: Signal) -> nix::Result<()> {
        kill(Pid::from_raw(pid), signal)
    }
}

pub struct ProcessSignaler {
    finder: ProcessFinder,
    sender: Box<dyn SignalSender>,
    process_name: String,
    show_signal: Signal,
    hide_signal: Signal,
    grace_delay: Duration,
}

impl ProcessSignaler {
    pub fn from_config(config: &RendererConfig) -> Result<Self> {
        let show_signal = config.show_signal()?;
        let hide_signal = config.hide_signal()?;

        info!(
            "Инициализация ProcessSignaler: процесс '{}', показ {}, скрытие {}",
            config.process_name, show_signal, hide_signal
        );

        Ok(Self {
            finder: ProcessFinder::new(),
            sender: Box::new(NixSignalSender),
            process_name: config.process_name.clone(),
            show_signal,
            hide_signal,
            grace_delay: config.grace_delay(),
        })
    }

    #[cfg(test)]
    pub fn with_finder(mut self, finder: ProcessFinder) -> Self {
        self.finder = finder;
        self
    }

    #[cfg(test)]
    pub fn with_sender(mut self, sender: Box<dyn SignalSender>) -> Self {
        self.sender = sender;
        self
    }

    /// Найти живой экземпляр рендерера. PID каждый раз ищется заново: процесс мог перезапуститься.
    ///
    /// Если экземпляров несколько, все кроме самого старшего PID считаются
    /// оставшимися после падения и получают SIGTERM.
    fn resolve_renderer(&self) -> Result<i32> {
        let mut pids = self.finder.find_by_name(&self.process_name)?;

        let Some(live) = pids.pop() else {
            return OskError::renderer_not_found(self.process_name.clone());
        };

        for stale in pids {
            warn!(
                "Найден лишний экземпляр {} (pid {}), завершаем его",
                self.process_name, stale
            );
            if let Err(e) = self.sender.send(stale, Signal::SIGTERM) {
                warn!("Не удалось завершить pid {}: {}", stale, e);
            }
        }

        Ok(live)
    }
}

#[async_trait::async_trait]
impl RendererSignaler for ProcessSignaler {
    async fn signal(&self, visible: bool) -> Result<()> {
        // Даём только что запущенному рендереру установить обработчики сигналов
        tokio::time::sleep(self.grace_delay).await;

        let pid = self.resolve_renderer()?;
        let signal = if visible {
            self.show_signal
        } else {
            self.hide_signal
        };

        self.sender
            .send(pid, signal)
            .map_err(|e| OskError::Signal(format!("{} -> pid {}: {}", signal, pid, e)))?;

        info!("Отправлен {} процессу {} (pid {})", signal, self.process_name, pid);
        Ok(())
    }
}
