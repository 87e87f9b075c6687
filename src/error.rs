use thiserror::Error;

#[derive(Error, Debug)]
pub enum OskError {
    #[error("Ошибка конфигурации: {0}")]
    Config(#[from] anyhow::Error),

    #[error("Ошибка ввода-вывода: {0}")]
    Io(#[from] std::io::Error),

    #[error("Ошибка D-Bus: {0}")]
    DBus(#[from] zbus::Error),

    #[error("Ошибка D-Bus (fdo): {0}")]
    Fdo(#[from] zbus::fdo::Error),

    #[error("Ошибка диспетчеризации Wayland: {0}")]
    Dispatch(#[from] wayland_client::DispatchError),

    #[error("Ошибка соединения Wayland: {0}")]
    Wayland(#[from] wayland_client::backend::WaylandError),

    #[error("Протокол композитора недоступен: {0}")]
    ProtocolUnavailable(String),

    #[error("Процесс рендерера не найден: {0}")]
    RendererNotFound(String),

    #[error("Не удалось отправить сигнал: {0}")]
    Signal(String),

    #[error("Сервис недоступен: {0}")]
    ServiceUnavailable(String),
}

impl OskError {
    pub fn renderer_not_found<T>(msg: impl Into<String>) -> Result<T> {
        Err(OskError::RendererNotFound(msg.into()))
    }
}

pub type Result<T> = std::result::Result<T, OskError>;

// Удобные макросы для создания ошибок
#[macro_export]
macro_rules! osk_error {
    (protocol_unavailable, $($arg:tt)*) => {
        $crate::error::OskError::ProtocolUnavailable(format!($($arg)*))
    };
    (renderer_not_found, $($arg:tt)*) => {
        $crate::error::OskError::RendererNotFound(format!($($arg)*))
    };
    (signal, $($arg:tt)*) => {
        $crate::error::OskError::Signal(format!($($arg)*))
    };
    (service_unavailable, $($arg:tt)*) => {
        $crate::error::OskError::ServiceUnavailable(format!($($arg)*))
    };
}
