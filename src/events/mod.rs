pub mod arm;
pub mod visibility;

pub use arm::ArmState;
pub use visibility::{VisibilityPhase, VisibilityState};

use std::fmt;
use tokio::sync::mpsc;

/// Источник, из которого пришло событие (для логов)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventSource {
    Compositor,
    Bus,
    Preference,
}

/// События, которые сходятся в VisibilityReconciler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OskEvent {
    /// Поле ввода получило фокус (input-method activate)
    Activate,
    /// Поле ввода потеряло фокус (input-method deactivate)
    Deactivate,
    /// Композитор сообщил о наличии аппаратной клавиатуры
    CapabilityChanged { keyboard_present: bool },
    /// Изменилась настройка специальных возможностей
    PreferenceChanged { enabled: bool },
    /// Вызов SetVisible на шине
    SetVisibleRequested { visible: bool },
}

impl OskEvent {
    pub fn source(&self) -> EventSource {
        match self {
            OskEvent::Activate | OskEvent::Deactivate | OskEvent::CapabilityChanged { .. } => {
                EventSource::Compositor
            }
            OskEvent::PreferenceChanged { .. } => EventSource::Preference,
            OskEvent::SetVisibleRequested { .. } => EventSource::Bus,
        }
    }
}

impl fmt::Display for OskEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OskEvent::Activate => write!(f, "activate"),
            OskEvent::Deactivate => write!(f, "deactivate"),
            OskEvent::CapabilityChanged { keyboard_present } => {
                write!(f, "capability(keyboard={})", keyboard_present)
            }
            OskEvent::PreferenceChanged { enabled } => write!(f, "preference(enabled={})", enabled),
            OskEvent::SetVisibleRequested { visible } => write!(f, "set-visible({})", visible),
        }
    }
}

/// Отправитель событий: каждая задача держит свой клон
pub type EventSender = mpsc::UnboundedSender<OskEvent>;
pub type EventReceiver = mpsc::UnboundedReceiver<OskEvent>;

pub fn event_channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}
