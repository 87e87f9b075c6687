use crate::error::Result;
use crate::events::{EventSender, OskEvent};
use tracing::{debug, error, info};
use zbus::{interface, Connection};

pub const OSK_BUS_NAME: &str = "sm.puri.OSK0";
pub const OSK_OBJECT_PATH: &str = "/sm/puri/OSK0";

/// Публикация применённой видимости наружу
#[async_trait::async_trait]
pub trait VisibilityPublisher: Send + Sync {
    /// Обновить свойство `Visible` и отправить уведомление об изменении
    async fn publish(&self, visible: bool) -> Result<()>;
}

/// Объект `sm.puri.OSK0` на шине.
///
/// `visible` меняется только через [`DbusVisibilityPublisher`], то есть только
/// после того как VisibilityReconciler применил решение.
pub struct OskInterface {
    events: EventSender,
    visible: bool,
}

impl OskInterface {
    pub fn new(events: EventSender) -> Self {
        Self {
            events,
            visible: false,
        }
    }

    fn forward_request(&self, visible: bool) {
        debug!("D-Bus: SetVisible({})", visible);
        if let Err(e) = self.events.send(OskEvent::SetVisibleRequested { visible }) {
            error!("Не удалось передать SetVisible({}) в reconciler: {}", visible, e);
        }
    }
}

#[interface(name = "sm.puri.OSK0")]
impl OskInterface {
    /// Запросить показ или скрытие. Эффект применяется асинхронно, после окна дребезга.
    #[zbus(name = "SetVisible")]
    async fn request_visible(&self, visible: bool) {
        self.forward_request(visible);
    }

    #[zbus(property)]
    async fn visible(&self) -> bool {
        self.visible
    }
}

pub struct BusService {
    connection: Connection,
}

impl BusService {
    /// Подключиться к сессионной шине, занять имя и зарегистрировать объект.
    /// Ошибка здесь фатальна для запуска.
    pub async fn start(events: EventSender) -> Result<Self> {
        info!("Регистрация {} на сессионной шине", OSK_BUS_NAME);

        let connection = zbus::connection::Builder::session()?
            .name(OSK_BUS_NAME)?
            .serve_at(OSK_OBJECT_PATH, OskInterface::new(events))?
            .build()
            .await?;

        info!("Сервис {} доступен по пути {}", OSK_BUS_NAME, OSK_OBJECT_PATH);
        Ok(Self { connection })
    }

    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    pub fn publisher(&self) -> DbusVisibilityPublisher {
        DbusVisibilityPublisher {
            connection: self.connection.clone(),
        }
    }

    /// Освободить имя на шине
    pub async fn shutdown(self) -> Result<()> {
        let released = self.connection.release_name(OSK_BUS_NAME).await?;
        info!("Имя {} освобождено: {}", OSK_BUS_NAME, released);
        Ok(())
    }
}

pub struct DbusVisibilityPublisher {
    connection: Connection,
}

#[async_trait::async_trait]
impl VisibilityPublisher for DbusVisibilityPublisher {
    async fn publish(&self, visible: bool) -> Result<()> {
        let iface_ref = self
            .connection
            .object_server()
            .interface::<_, OskInterface>(OSK_OBJECT_PATH)
            .await?;

        let mut iface = iface_ref.get_mut().await;
        iface.visible = visible;
        iface.visible_changed(iface_ref.signal_emitter()).await?;

        debug!("PropertiesChanged: Visible = {}", visible);
        Ok(())
    }
}
