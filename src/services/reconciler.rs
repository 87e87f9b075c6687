//! VisibilityReconciler: the single owner of the visible/hidden decision.
//!
//! Every input (compositor focus, hardware keyboard presence, accessibility
//! preference, bus requests) arrives as an `OskEvent` on one channel and is handled
//! here, one at a time. Nothing else touches `VisibilityState` or `ArmState`.

use crate::debug_if_enabled;
use crate::events::{ArmState, EventReceiver, OskEvent, VisibilityPhase, VisibilityState};
use crate::services::bus_service::VisibilityPublisher;
use crate::services::compositor::InputMethodControl;
use crate::services::process_signaler::RendererSignaler;
use std::sync::Arc;
use tokio::time::{sleep_until, Duration, Instant};
use tracing::{debug, error, info, warn};

pub struct VisibilityReconciler {
    debounce: Duration,
    visibility: VisibilityState,
    arm: ArmState,
    signaler: Arc<dyn RendererSignaler>,
    publisher: Box<dyn VisibilityPublisher>,
    input_method: Box<dyn InputMethodControl>,
}

impl VisibilityReconciler {
    pub fn new(
        debounce: Duration,
        signaler: Arc<dyn RendererSignaler>,
        publisher: Box<dyn VisibilityPublisher>,
        input_method: Box<dyn InputMethodControl>,
    ) -> Self {
        info!("Инициализация VisibilityReconciler (дребезг: {}мс)", debounce.as_millis());

        Self {
            debounce,
            visibility: VisibilityState::new(),
            arm: ArmState::new(),
            signaler,
            publisher,
            input_method,
        }
    }

    #[cfg(test)]
    pub fn visible(&self) -> bool {
        self.visibility.visible
    }

    pub fn phase(&self) -> VisibilityPhase {
        self.visibility.phase()
    }

    #[cfg(test)]
    pub fn arm_state(&self) -> ArmState {
        self.arm
    }

    /// Главный цикл: события из канала и срабатывание таймера дребезга
    pub async fn run(mut self, mut events: EventReceiver) {
        info!("VisibilityReconciler запущен");

        loop {
            let deadline = self.visibility.deadline();

            tokio::select! {
                event = events.recv() => match event {
                    Some(event) => self.handle_event(event),
                    None => {
                        info!("Все источники событий закрыты, reconciler завершается");
                        break;
                    }
                },
                _ = wait_for_deadline(deadline) => self.apply_visibility().await,
            }
        }
    }

    pub fn handle_event(&mut self, event: OskEvent) {
        debug_if_enabled!("Событие {:?}: {} [{}]", event.source(), event, self.phase());

        match event {
            OskEvent::Activate | OskEvent::Deactivate if !self.arm.armed => {
                // Могли прийти из очереди уже после остановки InputMethodWatch
                debug!("Клавиатура не взведена, {} игнорируется", event);
            }
            OskEvent::Activate => self.request_visibility(true),
            OskEvent::Deactivate => self.request_visibility(false),
            OskEvent::CapabilityChanged { keyboard_present } => {
                self.arm.hardware_keyboard_present = keyboard_present;
                self.set_armed(self.arm.derived());
            }
            OskEvent::PreferenceChanged { enabled } => {
                self.arm.preference_enabled = enabled;
                self.set_armed(self.arm.derived());
            }
            OskEvent::SetVisibleRequested { visible } => self.request_visibility(visible),
        }
    }

    /// Заменяет таймер дребезга новым, нацеленным на `visible`. Никогда не блокирует.
    pub fn request_visibility(&mut self, visible: bool) {
        self.visibility.request(visible, Instant::now(), self.debounce);
        debug_if_enabled!("Запрошена видимость {} -> {}", visible, self.phase());
    }

    /// Реагирует только на смену значения: повторный вызов с тем же значением ничего не делает
    pub fn set_armed(&mut self, armed: bool) {
        if self.arm.armed == armed {
            debug!("Состояние взвода не изменилось: {}", self.arm);
            return;
        }

        self.arm.armed = armed;
        info!("Состояние взвода: {}", self.arm);

        if armed {
            if let Err(e) = self.input_method.start() {
                error!("Не удалось запустить InputMethodWatch: {}", e);
            }
        } else {
            if let Err(e) = self.input_method.stop() {
                error!("Не удалось остановить InputMethodWatch: {}", e);
            }
            // Снятая со взвода клавиатура не должна оставаться на экране
            self.request_visibility(false);
        }
    }

    /// Срабатывание таймера: применяет решение, если оно отличается от текущего
    pub async fn apply_visibility(&mut self) {
        let Some(visible) = self.visibility.settle() else {
            debug_if_enabled!("Видимость не изменилась ({})", self.visibility.visible);
            return;
        };

        info!(
            "Экранная клавиатура: {}",
            if visible { "показана" } else { "скрыта" }
        );

        self.dispatch_signal(visible);

        // Ошибка публикации не откатывает решение: следующий переход опубликует его снова
        if let Err(e) = self.publisher.publish(visible).await {
            warn!("Не удалось опубликовать Visible={}: {}", visible, e);
        }
    }

    /// Сигнал уходит в отдельную задачу, чтобы задержка рендерера не тормозила цикл
    fn dispatch_signal(&self, visible: bool) {
        let signaler = Arc::clone(&self.signaler);
        tokio::spawn(async move {
            if let Err(e) = signaler.signal(visible).await {
                warn!("Сигнал рендереру не доставлен: {}", e);
            }
        });
    }
}

async fn wait_for_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{OskError, Result};
    use crate::events::{event_channel, EventSender};
    use parking_lot::Mutex;
    use tokio::task::JoinHandle;
    use tokio::time::sleep;

    #[derive(Clone, Default)]
    struct Recorder {
        signals: Arc<Mutex<Vec<bool>>>,
        published: Arc<Mutex<Vec<bool>>>,
        starts: Arc<Mutex<usize>>,
        stops: Arc<Mutex<usize>>,
    }

    struct FakeSignaler(Recorder);
    struct FakePublisher(Recorder);
    struct FakeInputMethod(Recorder);
    struct FailingSignaler;

    #[async_trait::async_trait]
    impl RendererSignaler for FakeSignaler {
        async fn signal(&self, visible: bool) -> Result<()> {
            self.0.signals.lock().push(visible);
            Ok(())
        }
    }

    #[async_trait::async_trait]
    impl RendererSignaler for FailingSignaler {
        async fn signal(&self, _visible: bool) -> Result<()> {
            OskError::renderer_not_found("wvkbd")
        }
    }

    #[async_trait::async_trait]
    impl VisibilityPublisher for FakePublisher {
        async fn publish(&self, visible: bool) -> Result<()> {
            self.0.published.lock().push(visible);
            Ok(())
        }
    }

    impl InputMethodControl for FakeInputMethod {
        fn start(&self) -> Result<()> {
            *self.0.starts.lock() += 1;
            Ok(())
        }

        fn stop(&self) -> Result<()> {
            *self.0.stops.lock() += 1;
            Ok(())
        }
    }

    const DEBOUNCE: Duration = Duration::from_millis(110);
    const SETTLE: Duration = Duration::from_millis(300);

    fn reconciler(recorder: &Recorder) -> VisibilityReconciler {
        VisibilityReconciler::new(
            DEBOUNCE,
            Arc::new(FakeSignaler(recorder.clone())),
            Box::new(FakePublisher(recorder.clone())),
            Box::new(FakeInputMethod(recorder.clone())),
        )
    }

    fn spawn(recorder: &Recorder) -> (EventSender, JoinHandle<()>) {
        let (tx, rx) = event_channel();
        let handle = tokio::spawn(reconciler(recorder).run(rx));
        (tx, handle)
    }

    fn set_visible(tx: &EventSender, visible: bool) {
        tx.send(OskEvent::SetVisibleRequested { visible }).unwrap();
    }

    fn clear(recorder: &Recorder) {
        recorder.signals.lock().clear();
        recorder.published.lock().clear();
    }

    #[tokio::test(start_paused = true)]
    async fn test_repeated_show_request_signals_once() {
        let recorder = Recorder::default();
        let (tx, _handle) = spawn(&recorder);

        set_visible(&tx, true);
        sleep(Duration::from_millis(10)).await;
        set_visible(&tx, true);
        sleep(SETTLE).await;

        assert_eq!(*recorder.signals.lock(), vec![true]);
        assert_eq!(*recorder.published.lock(), vec![true]);

        // После установления тот же запрос не даёт побочных эффектов
        set_visible(&tx, true);
        sleep(SETTLE).await;

        assert_eq!(*recorder.signals.lock(), vec![true]);
        assert_eq!(*recorder.published.lock(), vec![true]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_show_then_hide_inside_window_never_shows() {
        let recorder = Recorder::default();
        let (tx, _handle) = spawn(&recorder);

        // Исходное состояние - клавиатура показана
        set_visible(&tx, true);
        sleep(SETTLE).await;
        clear(&recorder);

        set_visible(&tx, true);
        sleep(Duration::from_millis(20)).await;
        set_visible(&tx, false);
        sleep(SETTLE).await;

        assert_eq!(*recorder.signals.lock(), vec![false]);
        assert_eq!(*recorder.published.lock(), vec![false]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_show_then_hide_from_hidden_is_silent() {
        let recorder = Recorder::default();
        let (tx, _handle) = spawn(&recorder);

        set_visible(&tx, true);
        sleep(Duration::from_millis(20)).await;
        set_visible(&tx, false);
        sleep(SETTLE).await;

        assert!(recorder.signals.lock().is_empty());
        assert!(recorder.published.lock().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_applies_only_last_value() {
        let recorder = Recorder::default();
        let (tx, _handle) = spawn(&recorder);

        for visible in [true, false, true, false, true] {
            set_visible(&tx, visible);
            sleep(Duration::from_millis(30)).await;
        }
        sleep(SETTLE).await;

        assert_eq!(*recorder.signals.lock(), vec![true]);
        assert_eq!(*recorder.published.lock(), vec![true]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hardware_keyboard_forces_hide() {
        let recorder = Recorder::default();
        let (tx, _handle) = spawn(&recorder);

        tx.send(OskEvent::CapabilityChanged { keyboard_present: false }).unwrap();
        tx.send(OskEvent::PreferenceChanged { enabled: true }).unwrap();
        tx.send(OskEvent::Activate).unwrap();
        sleep(SETTLE).await;

        assert_eq!(*recorder.starts.lock(), 1);
        assert_eq!(*recorder.signals.lock(), vec![true]);

        tx.send(OskEvent::CapabilityChanged { keyboard_present: true }).unwrap();
        sleep(SETTLE).await;

        assert_eq!(*recorder.stops.lock(), 1);
        assert_eq!(*recorder.signals.lock(), vec![true, false]);
        assert_eq!(*recorder.published.lock(), vec![true, false]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_focus_events_ignored_while_disarmed() {
        let recorder = Recorder::default();
        let (tx, _handle) = spawn(&recorder);

        tx.send(OskEvent::Activate).unwrap();
        sleep(SETTLE).await;

        assert!(recorder.signals.lock().is_empty());
        assert_eq!(*recorder.starts.lock(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_signal_failure_keeps_decision() {
        let recorder = Recorder::default();
        let (tx, rx) = event_channel();
        let reconciler = VisibilityReconciler::new(
            DEBOUNCE,
            Arc::new(FailingSignaler),
            Box::new(FakePublisher(recorder.clone())),
            Box::new(FakeInputMethod(recorder.clone())),
        );
        let _handle = tokio::spawn(reconciler.run(rx));

        set_visible(&tx, true);
        sleep(SETTLE).await;

        // Шина отражает намеренное состояние, а не подтверждённую доставку
        assert_eq!(*recorder.published.lock(), vec![true]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_ends_when_all_senders_dropped() {
        let recorder = Recorder::default();
        let (tx, handle) = spawn(&recorder);

        set_visible(&tx, true);
        drop(tx);

        // Незавершённый таймер бросается без применения
        handle.await.unwrap();
        assert!(recorder.signals.lock().is_empty());
    }

    #[test]
    fn test_set_armed_is_edge_triggered() {
        let recorder = Recorder::default();
        let mut reconciler = reconciler(&recorder);

        reconciler.set_armed(false);
        assert_eq!(*recorder.stops.lock(), 0);
        assert_eq!(reconciler.phase(), VisibilityPhase::Hidden);

        reconciler.set_armed(true);
        reconciler.set_armed(true);
        assert_eq!(*recorder.starts.lock(), 1);

        reconciler.set_armed(false);
        reconciler.set_armed(false);
        assert_eq!(*recorder.stops.lock(), 1);
        assert_eq!(reconciler.phase(), VisibilityPhase::PendingHide);
    }

    #[test]
    fn test_repeated_preference_does_not_restart_watch() {
        let recorder = Recorder::default();
        let mut reconciler = reconciler(&recorder);

        reconciler.handle_event(OskEvent::PreferenceChanged { enabled: true });
        reconciler.handle_event(OskEvent::PreferenceChanged { enabled: true });
        reconciler.handle_event(OskEvent::CapabilityChanged { keyboard_present: false });

        assert!(reconciler.arm_state().armed);
        assert_eq!(*recorder.starts.lock(), 1);
        assert_eq!(*recorder.stops.lock(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_lost_input_method_hides_without_disarming() {
        let recorder = Recorder::default();
        let (tx, _handle) = spawn(&recorder);

        tx.send(OskEvent::PreferenceChanged { enabled: true }).unwrap();
        tx.send(OskEvent::Activate).unwrap();
        sleep(SETTLE).await;
        assert_eq!(*recorder.signals.lock(), vec![true]);

        // Так цикл композитора сообщает о событии unavailable
        tx.send(OskEvent::Deactivate).unwrap();
        sleep(SETTLE).await;

        assert_eq!(*recorder.signals.lock(), vec![true, false]);
        assert_eq!(*recorder.published.lock(), vec![true, false]);
        assert_eq!(*recorder.stops.lock(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disarm_hides_even_without_prior_request() {
        let recorder = Recorder::default();
        let mut reconciler = reconciler(&recorder);

        reconciler.handle_event(OskEvent::PreferenceChanged { enabled: true });
        reconciler.request_visibility(true);
        reconciler.apply_visibility().await;
        assert!(reconciler.visible());

        reconciler.handle_event(OskEvent::PreferenceChanged { enabled: false });
        assert_eq!(reconciler.phase(), VisibilityPhase::PendingHide);

        reconciler.apply_visibility().await;
        assert!(!reconciler.visible());
        assert_eq!(*recorder.published.lock(), vec![true, false]);
    }
}
