use log::LevelFilter;

#[derive(Clone, Copy, Debug, Eq, PartialEq, PartialOrd, Ord)]
pub enum LogLevel {
    Error = 0,
    Warn = 1,
    Info = 2,
    Debug = 3,
}

impl LogLevel {
    /// `--debug` wins; otherwise each `-v` raises the level one step from
    /// `Warn`.
    pub fn from_flags(verbose: u8, debug: bool) -> Self {
        if debug {
            return LogLevel::Debug;
        }
        match verbose {
            0 => LogLevel::Warn,
            1 => LogLevel::Info,
            _ => LogLevel::Debug,
        }
    }

    pub fn filter(self) -> LevelFilter {
        match self {
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
        }
    }
}

/// Installs the stderr logger. `RUST_LOG` overrides `level` when set.
pub fn init(level: LogLevel) {
    let mut builder = env_logger::Builder::new();
    builder.filter_level(level.filter());
    if let Ok(spec) = std::env::var("RUST_LOG") {
        builder.parse_filters(&spec);
    }
    // A second call (tests, embedding hosts) keeps the first logger.
    let _ = builder.format_timestamp(None).try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_from_flags() {
        assert_eq!(LogLevel::from_flags(0, false), LogLevel::Warn);
        assert_eq!(LogLevel::from_flags(1, false), LogLevel::Info);
        assert_eq!(LogLevel::from_flags(4, false), LogLevel::Debug);
        assert_eq!(LogLevel::from_flags(0, true), LogLevel::Debug);
    }

    #[test]
    fn test_filter_mapping() {
        assert_eq!(LogLevel::Error.filter(), LevelFilter::Error);
        assert_eq!(LogLevel::Debug.filter(), LevelFilter::Debug);
        assert!(LogLevel::Info > LogLevel::Warn);
    }

    #[test]
    fn test_init_twice_is_harmless() {
        init(LogLevel::Warn);
        init(LogLevel::Debug);
    }
}
