//! Server configuration.
//!
//! Everything a [`Server`](crate::Server) would otherwise read from global
//! state is passed in here once, at construction.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use crate::access::DEFAULT_RESET_INTERVAL;
use crate::bind::{Lang, Translator};

/// Debug vs. release behaviour.
///
/// In [`Debug`](RunMode::Debug) the default catcher logs a stack snapshot for
/// every unexpected failure. Clients never see it in either mode.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum RunMode {
    #[default]
    Debug,
    Release,
}

impl FromStr for RunMode {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "debug" => Ok(Self::Debug),
            "release" | "product" | "production" => Ok(Self::Release),
            _ => Err(()),
        }
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Debug => "debug",
            Self::Release => "release",
        })
    }
}

/// Construction-time options for a [`Server`](crate::Server).
///
/// ```rust
/// use kite::{Config, RunMode, bind::Lang};
///
/// let config = Config::new()
///     .mode(RunMode::Release)
///     .lang(Lang::English)
///     .access_log(true);
/// ```
#[derive(Clone)]
pub struct Config {
    pub(crate) mode: RunMode,
    pub(crate) translator: Arc<dyn Translator>,
    pub(crate) logger: Option<tracing::Dispatch>,
    pub(crate) access_log: bool,
    pub(crate) reset_interval: Duration,
}

impl Config {
    pub fn new() -> Self {
        Self {
            mode: RunMode::default(),
            translator: Arc::new(Lang::default()),
            logger: None,
            access_log: false,
            reset_interval: DEFAULT_RESET_INTERVAL,
        }
    }

    /// Reads `KITE_MODE` (`debug` / `release`) and `KITE_LANG` (`zh` / `en`).
    /// Unset or unrecognised values keep the defaults.
    pub fn from_env() -> Self {
        let mut config = Self::new();
        if let Some(mode) = std::env::var("KITE_MODE").ok().and_then(|v| v.parse().ok()) {
            config.mode = mode;
        }
        if let Some(lang) = std::env::var("KITE_LANG").ok().and_then(|v| v.parse::<Lang>().ok()) {
            config.translator = Arc::new(lang);
        }
        config
    }

    pub fn mode(mut self, mode: RunMode) -> Self {
        self.mode = mode;
        self
    }

    /// Selects a built-in message table for validation errors.
    pub fn lang(self, lang: Lang) -> Self {
        self.translator(lang)
    }

    pub fn translator(mut self, translator: impl Translator + 'static) -> Self {
        self.translator = Arc::new(translator);
        self
    }

    /// Runs every request under `dispatch` instead of the global subscriber.
    pub fn logger(mut self, dispatch: tracing::Dispatch) -> Self {
        self.logger = Some(dispatch);
        self
    }

    /// Logs method, path, status and latency once per request.
    pub fn access_log(mut self, enabled: bool) -> Self {
        self.access_log = enabled;
        self
    }

    /// How often the in-flight counter is wiped.
    pub fn reset_interval(mut self, every: Duration) -> Self {
        self.reset_interval = every;
        self
    }

    pub fn run_mode(&self) -> RunMode {
        self.mode
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("mode", &self.mode)
            .field("logger", &self.logger.is_some())
            .field("access_log", &self.access_log)
            .field("reset_interval", &self.reset_interval)
            .finish_non_exhaustive()
    }
}
