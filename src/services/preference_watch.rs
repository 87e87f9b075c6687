use crate::config::PreferenceConfig;
use crate::error::Result;
use crate::events::{EventSender, OskEvent};
use futures_util::StreamExt;
use tracing::{debug, info, warn};
use zbus::zvariant::{OwnedValue, Value};
use zbus::{proxy, Connection};

#[proxy(
    interface = "org.freedesktop.portal.Settings",
    default_service = "org.freedesktop.portal.Desktop",
    default_path = "/org/freedesktop/portal/desktop"
)]
trait PortalSettings {
    /// Версия 2 портала: значение без лишней обёртки
    fn read_one(&self, namespace: &str, key: &str) -> zbus::Result<OwnedValue>;

    /// Устаревший вариант: значение обёрнуто в дополнительный variant
    fn read(&self, namespace: &str, key: &str) -> zbus::Result<OwnedValue>;

    #[zbus(signal)]
    fn setting_changed(&self, namespace: &str, key: &str, value: Value<'_>) -> zbus::Result<()>;
}

/// Достать bool из значения портала, разворачивая вложенные variant
pub fn unwrap_bool(value: &Value<'_>) -> Option<bool> {
    match value {
        Value::Bool(enabled) => Some(*enabled),
        Value::Value(inner) => unwrap_bool(inner),
        _ => None,
    }
}

/// Следит за настройкой специальных возможностей "экранная клавиатура включена"
pub struct PreferenceWatch {
    connection: Connection,
    namespace: String,
    key: String,
    fallback_enabled: bool,
    events: EventSender,
}

impl PreferenceWatch {
    pub fn new(connection: Connection, config: &PreferenceConfig, events: EventSender) -> Self {
        Self {
            connection,
            namespace: config.namespace.clone(),
            key: config.key.clone(),
            fallback_enabled: config.fallback_enabled,
            events,
        }
    }

    pub async fn run(self) -> Result<()> {
        info!("PreferenceWatch: {} {}", self.namespace, self.key);

        let proxy = match PortalSettingsProxy::new(&self.connection).await {
            Ok(proxy) => proxy,
            Err(e) => {
                warn!("Портал настроек недоступен: {}", e);
                self.publish_fallback();
                return Ok(());
            }
        };

        // Подписываемся до чтения, чтобы не пропустить изменение между ними
        let mut changes = match proxy.receive_setting_changed().await {
            Ok(changes) => changes,
            Err(e) => {
                warn!("Не удалось подписаться на SettingChanged: {}", e);
                self.publish_fallback();
                return Ok(());
            }
        };

        match self.read_current(&proxy).await {
            Some(enabled) => self.publish(enabled),
            None => self.publish_fallback(),
        }

        while let Some(signal) = changes.next().await {
            let args = match signal.args() {
                Ok(args) => args,
                Err(e) => {
                    warn!("Не удалось разобрать SettingChanged: {}", e);
                    continue;
                }
            };

            if args.namespace != self.namespace || args.key != self.key {
                continue;
            }

            match unwrap_bool(&args.value) {
                Some(enabled) => self.publish(enabled),
                None => warn!("{} {}: значение не bool", self.namespace, self.key),
            }
        }

        info!("Поток SettingChanged завершён");
        Ok(())
    }

    async fn read_current(&self, proxy: &PortalSettingsProxy<'_>) -> Option<bool> {
        let value = match proxy.read_one(&self.namespace, &self.key).await {
            Ok(value) => value,
            Err(e) => {
                debug!("ReadOne не сработал ({}), пробуем Read", e);
                match proxy.read(&self.namespace, &self.key).await {
                    Ok(value) => value,
                    Err(e) => {
                        warn!("Не удалось прочитать {} {}: {}", self.namespace, self.key, e);
                        return None;
                    }
                }
            }
        };

        let enabled = unwrap_bool(&value);
        if enabled.is_none() {
            warn!("{} {}: значение не bool", self.namespace, self.key);
        }
        enabled
    }

    fn publish_fallback(&self) {
        info!(
            "Используем значение по умолчанию для {}: {}",
            self.key, self.fallback_enabled
        );
        self.publish(self.fallback_enabled);
    }

    fn publish(&self, enabled: bool) {
        debug!("Настройка экранной клавиатуры: {}", enabled);
        if let Err(e) = self.events.send(OskEvent::PreferenceChanged { enabled }) {
            warn!("Reconciler недоступен, событие {} потеряно", e.0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unwrap_plain_bool() {
        assert_eq!(unwrap_bool(&Value::Bool(true)), Some(true));
        assert_eq!(unwrap_bool(&Value::Bool(false)), Some(false));
    }

    #[test]
    fn test_unwrap_nested_variant() {
        let nested = Value::Value(Box::new(Value::Value(Box::new(Value::Bool(true)))));
        assert_eq!(unwrap_bool(&nested), Some(true));
    }

    #[test]
    fn test_unwrap_rejects_other_types() {
        assert_eq!(unwrap_bool(&Value::U32(1)), None);
        assert_eq!(unwrap_bool(&Value::from("true")), None);
    }
}
