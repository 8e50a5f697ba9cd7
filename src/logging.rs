//! Log output for the CLI

use tracing::Level;

/// Level for a `-v` count: warnings by default, then info, debug, trace
pub fn level_for(verbosity: u8) -> Level {
    match verbosity {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

/// Install a stderr subscriber. Returns false if one was already set.
pub fn init_logging(verbosity: u8) -> bool {
    tracing_subscriber::fmt()
        .with_max_level(level_for(verbosity))
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_for_verbosity() {
        assert_eq!(level_for(0), Level::WARN);
        assert_eq!(level_for(2), Level::DEBUG);
        assert_eq!(level_for(9), Level::TRACE);
    }

    #[test]
    fn test_second_init_is_rejected() {
        init_logging(0);
        assert!(!init_logging(1));
    }
}
