use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Инициализация tracing для CLI.
///
/// Фильтр берётся из `RUST_LOG`, иначе `default_filter`. Логи идут в stderr,
/// чтобы не смешиваться с выводом команд.
pub fn init(default_filter: &str) {
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| default_filter.to_string());

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(filter))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
