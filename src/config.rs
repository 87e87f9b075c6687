use anyhow::{Context, Result};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use nix::sys::signal::Signal;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub logging: LoggingConfig,
    pub renderer: RendererConfig,
    pub visibility: VisibilityConfig,
    pub preference: PreferenceConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Общий выключатель диагностического вывода
    pub enabled: bool,
    pub level: String,
    pub format: String,
    pub filter: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RendererConfig {
    /// Префикс имени процесса в /proc/<pid>/comm
    pub process_name: String,
    pub show_signal: String,
    pub hide_signal: String,
    pub grace_delay_ms: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct VisibilityConfig {
    pub debounce_ms: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PreferenceConfig {
    pub namespace: String,
    pub key: String,
    /// Значение, если портал настроек недоступен
    pub fallback_enabled: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            logging: LoggingConfig::default(),
            renderer: RendererConfig::default(),
            visibility: VisibilityConfig::default(),
            preference: PreferenceConfig::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            level: "info".to_string(),
            format: "pretty".to_string(),
            filter: "osk_dbus=info".to_string(),
        }
    }
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            process_name: "wvkbd".to_string(),
            show_signal: "SIGUSR2".to_string(),
            hide_signal: "SIGUSR1".to_string(),
            grace_delay_ms: 100,
        }
    }
}

impl Default for VisibilityConfig {
    fn default() -> Self {
        Self { debounce_ms: 110 }
    }
}

impl Default for PreferenceConfig {
    fn default() -> Self {
        Self {
            namespace: "org.gnome.desktop.a11y.applications".to_string(),
            key: "screen-keyboard-enabled".to_string(),
            fallback_enabled: true,
        }
    }
}

impl RendererConfig {
    pub fn show_signal(&self) -> Result<Signal> {
        parse_signal(&self.show_signal)
    }

    pub fn hide_signal(&self) -> Result<Signal> {
        parse_signal(&self.hide_signal)
    }

    pub fn grace_delay(&self) -> Duration {
        Duration::from_millis(self.grace_delay_ms)
    }
}

impl VisibilityConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

fn parse_signal(name: &str) -> Result<Signal> {
    Signal::from_str(name).with_context(|| format!("Неизвестный сигнал: {}", name))
}

impl Config {
    pub fn load<P: AsRef<Path>>(config_path: P) -> Result<Self> {
        let config_path = config_path.as_ref();

        // Файл не обязателен: без него работают значения по умолчанию
        let figment = Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file(config_path))
            .merge(Env::prefixed("OSK_").split("__"));

        let config: Config = figment
            .extract()
            .with_context(|| format!("Не удалось загрузить конфигурацию из {:?}", config_path))?;

        config.validate()?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        // Валидация настроек логирования
        match self.logging.level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!("Неверный уровень логирования: {}", self.logging.level),
        }

        match self.logging.format.as_str() {
            "pretty" | "compact" => {}
            _ => anyhow::bail!("Неверный формат логирования: {}", self.logging.format),
        }

        // Валидация настроек рендерера
        if self.renderer.process_name.trim().is_empty() {
            anyhow::bail!("renderer.process_name не может быть пустым");
        }

        let show = self.renderer.show_signal()?;
        let hide = self.renderer.hide_signal()?;
        if show == hide {
            anyhow::bail!(
                "Сигналы показа и скрытия должны различаться (оба {})",
                show
            );
        }

        if self.visibility.debounce_ms == 0 {
            anyhow::bail!("debounce_ms должно быть больше 0");
        }

        if self.preference.namespace.is_empty() || self.preference.key.is_empty() {
            anyhow::bail!("preference.namespace и preference.key не могут быть пустыми");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config_validation() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.visibility.debounce(), Duration::from_millis(110));
        assert_eq!(config.renderer.grace_delay(), Duration::from_millis(100));
    }

    #[test]
    fn test_default_signals() {
        let config = Config::default();
        assert_eq!(config.renderer.show_signal().unwrap(), Signal::SIGUSR2);
        assert_eq!(config.renderer.hide_signal().unwrap(), Signal::SIGUSR1);
    }

    #[test]
    fn test_identical_signals_rejected() {
        let mut config = Config::default();
        config.renderer.hide_signal = "SIGUSR2".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unknown_signal_rejected() {
        let mut config = Config::default();
        config.renderer.show_signal = "SIGBOGUS".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_debounce_rejected() {
        let mut config = Config::default();
        config.visibility.debounce_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.renderer.process_name, "wvkbd");
        assert!(config.logging.enabled);
    }

    #[test]
    fn test_partial_file_overrides_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[renderer]\nprocess_name = \"wvkbd-mobintl\"\n\n[logging]\nenabled = false"
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.renderer.process_name, "wvkbd-mobintl");
        assert_eq!(config.renderer.show_signal, "SIGUSR2");
        assert!(!config.logging.enabled);
        assert_eq!(config.visibility.debounce_ms, 110);
    }
}
