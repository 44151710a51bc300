use anyhow::{Context, Result};

use relay_bus::options::{DEFAULT_MAX_DEPTH, DEFAULT_WARN_HANDLER_THRESHOLD};
use relay_bus::DispatcherOptions;

/// Runtime configuration loaded from environment variables (and `.env`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginConfig {
    /// User the binary logs in.
    pub login_user: String,
    pub max_depth: usize,
    /// `None` when `RELAY_WARN_HANDLERS=0`.
    pub warn_handlers: Option<usize>,
}

impl LoginConfig {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self::from_lookup(|key| std::env::var(key).ok())?;
        config.log_values();
        Ok(config)
    }

    /// Build from any key → value lookup. Missing keys take their defaults.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let max_depth = match get("RELAY_MAX_DEPTH") {
            Some(v) => v
                .trim()
                .parse::<usize>()
                .with_context(|| format!("RELAY_MAX_DEPTH must be a number, got {v:?}"))?,
            None => DEFAULT_MAX_DEPTH,
        };
        anyhow::ensure!(max_depth > 0, "RELAY_MAX_DEPTH must be at least 1");

        let warn_handlers = match get("RELAY_WARN_HANDLERS") {
            Some(v) => {
                let n = v.trim().parse::<usize>().with_context(|| {
                    format!("RELAY_WARN_HANDLERS must be a number, got {v:?}")
                })?;
                (n > 0).then_some(n)
            }
            None => Some(DEFAULT_WARN_HANDLER_THRESHOLD),
        };

        Ok(Self {
            login_user: get("LOGIN_USER")
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| "Gustavo".to_string()),
            max_depth,
            warn_handlers,
        })
    }

    pub fn dispatcher_options(&self) -> DispatcherOptions {
        DispatcherOptions::builder()
            .max_depth(self.max_depth)
            .warn_handler_threshold(self.warn_handlers)
            .build()
    }

    fn log_values(&self) {
        tracing::info!("Config loaded:");
        tracing::info!("  LOGIN_USER: {}", self.login_user);
        tracing::info!("  RELAY_MAX_DEPTH: {}", self.max_depth);
        tracing::info!(
            "  RELAY_WARN_HANDLERS: {}",
            self.warn_handlers
                .map_or_else(|| "<disabled>".to_string(), |n| n.to_string())
        );
    }
}
