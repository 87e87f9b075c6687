use anyhow::Result;
use clap::Parser;
use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info, warn};
mod config;
mod error;
mod events;
mod services;
mod utils;

use config::{Config, LoggingConfig};
use services::{
    create_renderer_signaler,
    BusService,
    CompositorWatch,
    PreferenceWatch,
    VisibilityReconciler,
};

#[derive(Parser, Debug)]
#[command(name = "osk-dbus")]
#[command(about = "Управляет видимостью экранной клавиатуры по фокусу полей ввода")]
struct Args {
    /// Путь к файлу конфигурации
    #[arg(short, long, default_value = "osk.toml")]
    config: String,

    /// Режим сухого запуска (сигналы рендереру только логируются)
    #[arg(long)]
    dry_run: bool,

    /// Уровень логирования (перекрывает logging.level)
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Загрузка конфигурации
    let config = Config::load(&args.config)?;

    // Инициализация системы логирования
    init_tracing(&config.logging, args.log_level.as_deref())?;

    info!("Запуск osk-dbus v{}", env!("CARGO_PKG_VERSION"));
    info!("Конфигурация загружена из: {}", args.config);

    if args.dry_run {
        warn!("Режим сухого запуска - сигналы рендереру не отправляются");
    }

    let (event_tx, event_rx) = events::event_channel();

    // Без input-method композитора работать нечем: ошибка здесь завершает процесс
    let (compositor, input_method_control) = CompositorWatch::connect(event_tx.clone())?;
    let bus = BusService::start(event_tx.clone()).await?;
    let signaler = create_renderer_signaler(&config.renderer, args.dry_run)?;

    let reconciler = VisibilityReconciler::new(
        config.visibility.debounce(),
        signaler,
        Box::new(bus.publisher()),
        Box::new(input_method_control),
    );
    let preference_watch =
        PreferenceWatch::new(bus.connection().clone(), &config.preference, event_tx);

    info!("Все компоненты инициализированы");

    // Запуск всех сервисов параллельно
    let reconciler_handle = tokio::spawn(reconciler.run(event_rx));
    let mut compositor_handle = tokio::spawn(compositor.run());
    let preference_handle = tokio::spawn(async move {
        if let Err(e) = preference_watch.run().await {
            error!("Ошибка в PreferenceWatch: {}", e);
        }
    });

    info!("Все сервисы запущены");

    let mut exit_error = None;
    let mut compositor_finished = false;

    tokio::select! {
        result = wait_for_shutdown_signal() => {
            if let Err(e) = result {
                error!("Ошибка при ожидании сигнала завершения: {}", e);
            }
        }
        result = &mut compositor_handle => {
            compositor_finished = true;
            match result {
                Ok(Ok(())) => warn!("Цикл композитора завершился"),
                Ok(Err(e)) => {
                    error!("Ошибка в цикле композитора: {}", e);
                    exit_error = Some(anyhow::Error::from(e));
                }
                Err(e) => error!("Задача композитора аварийно завершилась: {}", e),
            }
        }
    }

    info!("Завершение работы...");

    // Незавершённый таймер дребезга бросается: сохранять нечего
    reconciler_handle.abort();
    compositor_handle.abort();
    preference_handle.abort();

    // Ожидаем завершения задач (с таймаутом)
    let shutdown_timeout = tokio::time::Duration::from_secs(5);
    let shutdown_result = tokio::time::timeout(shutdown_timeout, async {
        let _ = reconciler_handle.await;
        if !compositor_finished {
            let _ = compositor_handle.await;
        }
        let _ = preference_handle.await;
    })
    .await;

    match shutdown_result {
        Ok(_) => info!("Все сервисы завершили работу корректно"),
        Err(_) => warn!("Таймаут при завершении сервисов"),
    }

    if let Err(e) = bus.shutdown().await {
        warn!("Не удалось освободить имя на шине: {}", e);
    }

    info!("osk-dbus завершил работу");

    match exit_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

/// Ctrl+C или SIGTERM
async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    let mut terminate = signal(SignalKind::terminate())?;

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result?;
            info!("Получен сигнал завершения (Ctrl+C)");
        }
        _ = terminate.recv() => {
            info!("Получен сигнал завершения (SIGTERM)");
        }
    }

    Ok(())
}

fn init_tracing(logging: &LoggingConfig, level_override: Option<&str>) -> Result<()> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = if !logging.enabled {
        EnvFilter::new("off")
    } else if let Some(level) = level_override {
        EnvFilter::try_new(level)?
    } else {
        EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(format!("{},{}", logging.level, logging.filter)))?
    };

    let registry = tracing_subscriber::registry().with(filter);

    match logging.format.as_str() {
        "compact" => registry.with(tracing_subscriber::fmt::layer().compact()).init(),
        _ => registry.with(tracing_subscriber::fmt::layer()).init(),
    }

    Ok(())
}
