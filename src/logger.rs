use std::env;

use simplelog::{ConfigBuilder, LevelFilter, SimpleLogger};

/// Environment variable that overrides the log level (e.g. `debug`).
pub const LOG_ENV: &str = "POS_VOICE_LOG";

pub fn init(verbose: bool) {
    let level = level_from(env::var(LOG_ENV).ok().as_deref(), verbose);
    let config = ConfigBuilder::new()
        .add_filter_allow_str("pos_voice")
        .build();
    let _ = SimpleLogger::init(level, config);
}

fn level_from(setting: Option<&str>, verbose: bool) -> LevelFilter {
    match setting.map(|s| s.trim().to_lowercase()).as_deref() {
        Some("trace") => LevelFilter::Trace,
        Some("debug") => LevelFilter::Debug,
        Some("info") => LevelFilter::Info,
        Some("warn") => LevelFilter::Warn,
        Some("error") => LevelFilter::Error,
        Some("off") => LevelFilter::Off,
        _ if verbose => LevelFilter::Info,
        _ => LevelFilter::Warn,
    }
}
