use std::fmt;
use tokio::time::{Duration, Instant};

/// Фаза конечного автомата видимости
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VisibilityPhase {
    Hidden,
    PendingShow,
    Shown,
    PendingHide,
}

/// Состояние видимости, принадлежит только VisibilityReconciler.
///
/// `visible` - последнее применённое решение (отправлено рендереру и опубликовано
/// на шине). `pending_visible`/`pending_deadline` описывают таймер дребезга.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VisibilityState {
    pub visible: bool,
    pub pending_visible: bool,
    pub pending_deadline: Option<Instant>,
}

impl VisibilityState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Заменяет текущий таймер новым, нацеленным на `visible`
    pub fn request(&mut self, visible: bool, now: Instant, debounce: Duration) {
        self.pending_visible = visible;
        self.pending_deadline = Some(now + debounce);
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.pending_deadline
    }

    /// Срабатывание таймера. Возвращает новое значение только если оно изменилось.
    pub fn settle(&mut self) -> Option<bool> {
        self.pending_deadline.take()?;

        if self.pending_visible == self.visible {
            return None;
        }

        self.visible = self.pending_visible;
        Some(self.visible)
    }

    pub fn phase(&self) -> VisibilityPhase {
        match (self.pending_deadline.is_some(), self.pending_visible, self.visible) {
            (true, true, _) => VisibilityPhase::PendingShow,
            (true, false, _) => VisibilityPhase::PendingHide,
            (false, _, true) => VisibilityPhase::Shown,
            (false, _, false) => VisibilityPhase::Hidden,
        }
    }
}

impl fmt::Display for VisibilityPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            VisibilityPhase::Hidden => "Hidden",
            VisibilityPhase::PendingShow => "PendingShow",
            VisibilityPhase::Shown => "Shown",
            VisibilityPhase::PendingHide => "PendingHide",
        };
        write!(f, "{}", name)
    }
}
