//! ProcessSignaler: responsibility and boundaries
//!
//! This module is responsible ONLY for finding the external keyboard renderer process
//! and delivering a show/hide signal to it. It is best-effort: a successful call means
//! the signal was handed to the kernel, not that the renderer changed its state.
//! Visibility decisions are made exclusively by VisibilityReconciler.

mod dry_signaler;
mod signaler;
mod r#trait;

pub use self::r#trait::{create_renderer_signaler, RendererSignaler};
