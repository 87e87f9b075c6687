use crate::debug_if_enabled;
use crate::events::OskEvent;
use wayland_client::{Connection, Dispatch, QueueHandle};

use super::protocol::zphoc_device_state_v1::{self, ZphocDeviceStateV1};
use super::watch::CompositorState;

/// Бит клавиатуры в маске capabilities
pub const CAPABILITY_KEYBOARD: u32 = 1;

pub fn keyboard_present(capabilities: u32) -> bool {
    capabilities & CAPABILITY_KEYBOARD != 0
}

/// Источник событий о подключении аппаратной клавиатуры
pub struct DeviceStateWatch {
    proxy: ZphocDeviceStateV1,
}

impl DeviceStateWatch {
    pub fn new(proxy: ZphocDeviceStateV1) -> Self {
        Self { proxy }
    }
}

impl Drop for DeviceStateWatch {
    fn drop(&mut self) {
        self.proxy.destroy();
    }
}

impl Dispatch<ZphocDeviceStateV1, ()> for CompositorState {
    fn event(
        state: &mut Self,
        _: &ZphocDeviceStateV1,
        event: zphoc_device_state_v1::Event,
        _: &(),
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
        // Первое событие приходит сразу после bind - это и есть начальное значение
        let zphoc_device_state_v1::Event::Capabilities { capabilities } = event;
        let present = keyboard_present(capabilities);
        debug_if_enabled!(
            "device-state: capabilities {:#x}, аппаратная клавиатура: {}",
            capabilities,
            present
        );
        state.forward(OskEvent::CapabilityChanged {
            keyboard_present: present,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyboard_bit() {
        assert!(!keyboard_present(0));
        assert!(keyboard_present(1));
        assert!(keyboard_present(1 | 2 | 4));
        // Только указатель и тачскрин
        assert!(!keyboard_present(2 | 4));
    }
}
