use crate::events::OskEvent;
use crate::{debug_if_enabled, trace_if_enabled};
use wayland_client::{Connection, Dispatch, QueueHandle};
use wayland_protocols_misc::zwp_input_method_v2::client::zwp_input_method_v2::{
    self, ZwpInputMethodV2,
};

use super::watch::CompositorState;

/// Обёртка над zwp_input_method_v2, существует только пока клавиатура взведена
pub struct InputMethodWatch {
    proxy: ZwpInputMethodV2,
}

impl InputMethodWatch {
    pub fn new(proxy: ZwpInputMethodV2) -> Self {
        Self { proxy }
    }

    /// Безопасно вызывать в любой момент: незавершённый дребезг не сбрасывается
    pub fn destroy(self) {
        self.proxy.destroy();
    }
}

impl Dispatch<ZwpInputMethodV2, ()> for CompositorState {
    fn event(
        state: &mut Self,
        _: &ZwpInputMethodV2,
        event: zwp_input_method_v2::Event,
        _: &(),
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
        match event {
            zwp_input_method_v2::Event::Activate => {
                debug_if_enabled!("input-method: activate");
                state.forward(OskEvent::Activate);
            }
            zwp_input_method_v2::Event::Deactivate => {
                debug_if_enabled!("input-method: deactivate");
                state.forward(OskEvent::Deactivate);
            }
            zwp_input_method_v2::Event::Unavailable => {
                state.input_method_unavailable();
            }
            // Остальное на видимость не влияет
            zwp_input_method_v2::Event::SurroundingText { text, cursor, anchor } => {
                trace_if_enabled!(
                    "input-method: surrounding_text ({} байт, cursor {}, anchor {})",
                    text.len(),
                    cursor,
                    anchor
                );
            }
            zwp_input_method_v2::Event::TextChangeCause { cause } => {
                trace_if_enabled!("input-method: text_change_cause {:?}", cause);
            }
            zwp_input_method_v2::Event::ContentType { hint, purpose } => {
                trace_if_enabled!("input-method: content_type {:?} / {:?}", hint, purpose);
            }
            zwp_input_method_v2::Event::Done => {
                trace_if_enabled!("input-method: done");
            }
            _ => {}
        }
    }
}
