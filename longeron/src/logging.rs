//! Default log sink.
//!
//! The engine emits leveled diagnostics through the [`tracing`] facade and
//! depends on nothing beyond it: any subscriber the host installs becomes
//! the sink. When none is installed, [`init`] sets up the default sink,
//! which writes timestamp-prefixed lines to standard error.

use std::fmt;

use tracing_subscriber::EnvFilter;

/// The engine's diagnostic levels.
///
/// `Fatal` conditions surface as error-level events carrying a
/// `fatal = true` field; the remaining levels map one-to-one onto
/// [`tracing::Level`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    /// Unrecoverable conditions only.
    Fatal,
    /// Non-fatal errors.
    Error,
    /// Warnings.
    Warn,
    /// Informational messages.
    Info,
    /// Debugging detail, including connection state transitions.
    Debug,
}

impl Level {
    /// The equivalent `tracing` level.
    #[must_use]
    pub fn as_tracing(self) -> tracing::Level {
        match self {
            Self::Fatal | Self::Error => tracing::Level::ERROR,
            Self::Warn => tracing::Level::WARN,
            Self::Info => tracing::Level::INFO,
            Self::Debug => tracing::Level::DEBUG,
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Fatal => "FATAL",
            Self::Error => "ERROR",
            Self::Warn => "WARN",
            Self::Info => "INFO",
            Self::Debug => "DEBUG",
        };
        f.write_str(s)
    }
}

/// Install the default sink: timestamp-prefixed lines on standard error,
/// filtered at `level` (overridable through `RUST_LOG`).
///
/// This is a no-op when a global subscriber is already installed, so
/// applications bringing their own sink can call it unconditionally.
pub fn init(level: Level) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_tracing().to_string().to_lowercase()));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// [`init`] at the info level.
pub fn init_default() {
    init(Level::Info);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_mapping() {
        assert_eq!(Level::Fatal.as_tracing(), tracing::Level::ERROR);
        assert_eq!(Level::Error.as_tracing(), tracing::Level::ERROR);
        assert_eq!(Level::Warn.as_tracing(), tracing::Level::WARN);
        assert_eq!(Level::Info.as_tracing(), tracing::Level::INFO);
        assert_eq!(Level::Debug.as_tracing(), tracing::Level::DEBUG);
    }

    #[test]
    fn test_level_ordering() {
        assert!(Level::Fatal < Level::Error);
        assert!(Level::Error < Level::Warn);
        assert!(Level::Warn < Level::Info);
        assert!(Level::Info < Level::Debug);
    }

    #[test]
    fn test_init_is_idempotent() {
        init(Level::Debug);
        init(Level::Info);
        init_default();
    }
}
