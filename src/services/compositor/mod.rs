//! Compositor collaborators: responsibility and boundaries
//!
//! This module owns the Wayland connection and nothing else: it binds the seat, the
//! input-method manager and (optionally) the phoc device-state global, turns their
//! events into `OskEvent`s and executes start/stop commands for the input-method
//! object. Whether the keyboard is armed or visible is decided by VisibilityReconciler.

mod device_state;
mod input_method;
mod protocol;
mod watch;

pub use self::watch::CompositorWatch;

use crate::error::Result;

/// Команды для цикла композитора
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMethodCommand {
    Start,
    Stop,
}

/// Управление InputMethodWatch со стороны VisibilityReconciler
pub trait InputMethodControl: Send {
    /// Создать объект input-method (при взведении)
    fn start(&self) -> Result<()>;
    /// Уничтожить объект input-method (при снятии со взвода)
    fn stop(&self) -> Result<()>;
}
