use log::LevelFilter;
use simple_logger::SimpleLogger;

/// Diagnostic logging goes to stderr; the transaction log is a separate
/// file sink and is not routed through `log`.
pub fn configure_app() -> Result<(), log::SetLoggerError> {
    SimpleLogger::new()
        .with_level(LevelFilter::Warn)
        .env()
        .init()
}
