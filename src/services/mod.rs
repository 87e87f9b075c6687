pub mod bus_service;
pub mod compositor;
pub mod preference_watch;
pub mod process_signaler;
pub mod reconciler;

pub use bus_service::BusService;
pub use compositor::CompositorWatch;
pub use preference_watch::PreferenceWatch;
pub use process_signaler::create_renderer_signaler;
pub use reconciler::VisibilityReconciler;
