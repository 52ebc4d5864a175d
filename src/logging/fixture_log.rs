use log::{LevelFilter, SetLoggerError, trace};
use log4rs::{
    append::console::{ConsoleAppender, Target},
    config::{Appender, Config, Root},
    encode::pattern::PatternEncoder,
    filter::threshold::ThresholdFilter,
};
use std::sync::OnceLock;

const LOG_PATTERN: &str = "{h({d(%d-%m-%Y %H:%M:%S%.3f)(utc)} - {l}: {m}{n})}";

static LOGGING: OnceLock<Result<(), String>> = OnceLock::new();

// Initialize the logging. Only the first call installs the logger, later calls
// return the outcome of that first call.
pub fn init_logging(level: LevelFilter) -> Result<(), String> {
    LOGGING.get_or_init(|| install_logger(level)).clone()
}

fn install_logger(level: LevelFilter) -> Result<(), String> {
    // Build a stderr logger.
    let stderr = ConsoleAppender::builder().target(Target::Stderr).encoder(Box::new(PatternEncoder::new(LOG_PATTERN))).build();

    let config = Config::builder()
        .appender(Appender::builder().filter(Box::new(ThresholdFilter::new(level))).build("stderr", Box::new(stderr)))
        .build(Root::builder().appender("stderr").build(level))
        .map_err(|e| format!("Failed to build log4rs config: {}", e))?;

    // Another logger may already be installed by the test harness
    log4rs::init_config(config).map_err(|e: SetLoggerError| e.to_string())?;

    trace!("Logging was started with no problems");
    Ok(())
}
