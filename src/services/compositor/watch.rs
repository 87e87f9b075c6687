use crate::error::{OskError, Result};
use crate::events::{EventSender, OskEvent};
use crate::osk_error;
use std::io::ErrorKind;
use std::os::fd::{AsFd, AsRawFd, RawFd};
use tokio::io::unix::AsyncFd;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use wayland_client::backend::WaylandError;
use wayland_client::globals::{registry_queue_init, GlobalListContents};
use wayland_client::protocol::{wl_registry, wl_seat};
use wayland_client::{Connection, Dispatch, EventQueue, QueueHandle};
use wayland_protocols_misc::zwp_input_method_v2::client::zwp_input_method_manager_v2::{
    self, ZwpInputMethodManagerV2,
};

use super::device_state::DeviceStateWatch;
use super::input_method::InputMethodWatch;
use super::protocol::zphoc_device_state_v1::ZphocDeviceStateV1;
use super::{InputMethodCommand, InputMethodControl};

/// Состояние, с которым диспетчеризуются события Wayland. Живёт только в задаче композитора.
pub struct CompositorState {
    events: EventSender,
    seat: wl_seat::WlSeat,
    manager: ZwpInputMethodManagerV2,
    input_method: Option<InputMethodWatch>,
    // Держим объект живым до конца цикла
    _device_state: Option<DeviceStateWatch>,
}

impl CompositorState {
    pub(super) fn forward(&self, event: OskEvent) {
        if let Err(e) = self.events.send(event) {
            warn!("Reconciler недоступен, событие {} потеряно", e.0);
        }
    }

    fn apply(&mut self, command: InputMethodCommand, qh: &QueueHandle<Self>) {
        match command {
            InputMethodCommand::Start => self.start_input_method(qh),
            InputMethodCommand::Stop => self.stop_input_method(),
        }
    }

    fn start_input_method(&mut self, qh: &QueueHandle<Self>) {
        if self.input_method.is_some() {
            debug!("InputMethodWatch уже активен");
            return;
        }

        let proxy = self.manager.get_input_method(&self.seat, qh, ());
        self.input_method = Some(InputMethodWatch::new(proxy));
        info!("InputMethodWatch запущен");
    }

    fn stop_input_method(&mut self) {
        match self.input_method.take() {
            Some(watch) => {
                watch.destroy();
                info!("InputMethodWatch остановлен");
            }
            None => debug!("InputMethodWatch не активен, останавливать нечего"),
        }
    }

    pub(super) fn input_method_unavailable(&mut self) {
        warn!("input-method недоступен: к сиденью уже привязан другой метод ввода");
        // Фокус потерян вместе с объектом: показанная клавиатура должна скрыться
        self.forward(OskEvent::Deactivate);
        self.stop_input_method();
    }
}

#[derive(Clone, Copy, Debug)]
struct RawFdWatcher {
    fd: RawFd,
}

impl RawFdWatcher {
    fn new(fd: RawFd) -> Self {
        Self { fd }
    }
}

impl AsRawFd for RawFdWatcher {
    fn as_raw_fd(&self) -> RawFd {
        self.fd
    }
}

/// Цикл событий композитора: владеет соединением Wayland и ничем больше
pub struct CompositorWatch {
    connection: Connection,
    queue: EventQueue<CompositorState>,
    state: CompositorState,
    commands: mpsc::UnboundedReceiver<InputMethodCommand>,
}

impl CompositorWatch {
    /// Подключиться к композитору и привязать нужные глобалы.
    /// Отсутствие wl_seat или zwp_input_method_manager_v2 фатально.
    pub fn connect(events: EventSender) -> Result<(Self, WaylandInputMethodControl)> {
        info!("Подключение к композитору Wayland");

        let connection = Connection::connect_to_env()
            .map_err(|e| osk_error!(protocol_unavailable, "нет соединения с композитором: {}", e))?;

        let (globals, queue) = registry_queue_init::<CompositorState>(&connection)
            .map_err(|e| osk_error!(protocol_unavailable, "реестр Wayland: {}", e))?;
        let qh = queue.handle();

        let seat = globals
            .bind::<wl_seat::WlSeat, _, _>(&qh, 1..=7, ())
            .map_err(|e| osk_error!(protocol_unavailable, "wl_seat: {}", e))?;

        let manager = globals
            .bind::<ZwpInputMethodManagerV2, _, _>(&qh, 1..=1, ())
            .map_err(|e| osk_error!(protocol_unavailable, "zwp_input_method_manager_v2: {}", e))?;

        let device_state = match globals.bind::<ZphocDeviceStateV1, _, _>(&qh, 1..=1, ()) {
            Ok(proxy) => Some(DeviceStateWatch::new(proxy)),
            Err(e) => {
                warn!(
                    "zphoc_device_state_v1 недоступен ({}), считаем что аппаратной клавиатуры нет",
                    e
                );
                None
            }
        };
        let has_device_state = device_state.is_some();

        let (control, commands) = WaylandInputMethodControl::channel();
        let state = CompositorState {
            events,
            seat,
            manager,
            input_method: None,
            _device_state: device_state,
        };

        // Без device-state начальное значение сообщаем сами
        if !has_device_state {
            state.forward(OskEvent::CapabilityChanged {
                keyboard_present: false,
            });
        }

        info!("Глобалы композитора привязаны (device-state: {})", has_device_state);

        Ok((
            Self {
                connection,
                queue,
                state,
                commands,
            },
            control,
        ))
    }

    pub async fn run(self) -> Result<()> {
        let Self {
            connection,
            mut queue,
            mut state,
            mut commands,
        } = self;

        let async_fd = AsyncFd::new(RawFdWatcher::new(connection.as_fd().as_raw_fd()))?;
        info!("Цикл событий композитора запущен");

        loop {
            queue.dispatch_pending(&mut state)?;
            connection.flush()?;

            let Some(guard) = queue.prepare_read() else {
                continue;
            };

            tokio::select! {
                readiness = async_fd.readable() => {
                    let mut readiness = readiness?;
                    let read_result = guard.read();
                    readiness.clear_ready();

                    match read_result {
                        Ok(_) => {}
                        Err(WaylandError::Io(e)) if e.kind() == ErrorKind::WouldBlock => {}
                        Err(e) => {
                            error!("Ошибка чтения из сокета Wayland: {}", e);
                            return Err(OskError::Wayland(e));
                        }
                    }
                }
                command = commands.recv() => {
                    drop(guard);
                    match command {
                        Some(command) => state.apply(command, &queue.handle()),
                        None => {
                            info!("Канал команд закрыт, цикл композитора завершается");
                            return Ok(());
                        }
                    }
                }
            }
        }
    }
}

/// Реализация InputMethodControl: команды уходят в задачу композитора
pub struct WaylandInputMethodControl {
    commands: mpsc::UnboundedSender<InputMethodCommand>,
}

impl WaylandInputMethodControl {
    fn channel() -> (Self, mpsc::UnboundedReceiver<InputMethodCommand>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { commands: tx }, rx)
    }

    fn send(&self, command: InputMethodCommand) -> Result<()> {
        self.commands
            .send(command)
            .map_err(|_| osk_error!(service_unavailable, "цикл композитора остановлен ({:?})", command))
    }
}

impl InputMethodControl for WaylandInputMethodControl {
    fn start(&self) -> Result<()> {
        self.send(InputMethodCommand::Start)
    }

    fn stop(&self) -> Result<()> {
        self.send(InputMethodCommand::Stop)
    }
}

impl Dispatch<wl_registry::WlRegistry, GlobalListContents> for CompositorState {
    fn event(
        _: &mut Self,
        _: &wl_registry::WlRegistry,
        _: wl_registry::Event,
        _: &GlobalListContents,
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
    }
}

impl Dispatch<wl_seat::WlSeat, ()> for CompositorState {
    fn event(
        _: &mut Self,
        _: &wl_seat::WlSeat,
        _: wl_seat::Event,
        _: &(),
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
    }
}

impl Dispatch<ZwpInputMethodManagerV2, ()> for CompositorState {
    fn event(
        _: &mut Self,
        _: &ZwpInputMethodManagerV2,
        _: zwp_input_method_manager_v2::Event,
        _: &(),
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_control_sends_commands_in_order() {
        let (control, mut rx) = WaylandInputMethodControl::channel();

        control.start().unwrap();
        control.stop().unwrap();

        assert_eq!(rx.try_recv().unwrap(), InputMethodCommand::Start);
        assert_eq!(rx.try_recv().unwrap(), InputMethodCommand::Stop);
    }

    #[test]
    fn test_control_fails_when_loop_is_gone() {
        let (control, rx) = WaylandInputMethodControl::channel();
        drop(rx);

        assert!(matches!(
            control.start(),
            Err(OskError::ServiceUnavailable(_))
        ));
    }
}
