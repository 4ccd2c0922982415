//! Runtime configuration parsed from enumerated environment variables.
//!
//! `clap::Parser` with `env = "..."` attributes on every field, `.env` loaded first via
//! `dotenv`, scoped to the runtime's own keys.

use std::fmt;
use std::path::PathBuf;

use clap::Parser;
use rand::RngCore;

const MIN_RECONNECT_GRACE_MS: u64 = 60_000;
const MIN_GAME_RETENTION_MS: u64 = 300_000;
const DEFAULT_SWEEP_INTERVAL_MS: u64 = 1_000;
const MIN_SWEEP_INTERVAL_MS: u64 = 250;

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum PersistenceMode {
    Disabled,
    File,
}

impl fmt::Display for PersistenceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PersistenceMode::Disabled => write!(f, "disabled"),
            PersistenceMode::File => write!(f, "file"),
        }
    }
}

/// Parsed and validated process configuration.
///
/// `Debug` is implemented by hand so `reconnect_token_secret` is never printed; logging the
/// config at startup must always go through this redacted form, never the raw fields.
#[derive(Parser, Clone)]
#[command(name = "fun-euchre-server", version, about = None, long_about = None)]
pub struct RuntimeConfig {
    /// Address to bind the HTTP + WebSocket listener to.
    #[arg(long, env = "BIND_ADDR", default_value = "0.0.0.0:8080")]
    pub bind_addr: String,

    #[arg(long, env = "RECONNECT_GRACE_MS", default_value_t = MIN_RECONNECT_GRACE_MS)]
    pub reconnect_grace_ms: u64,

    #[arg(long, env = "GAME_RETENTION_MS", default_value_t = MIN_GAME_RETENTION_MS)]
    pub game_retention_ms: u64,

    #[arg(long, env = "SESSION_TTL_MS")]
    pub session_ttl_ms: Option<u64>,

    #[arg(long, env = "LOBBY_TTL_MS")]
    pub lobby_ttl_ms: Option<u64>,

    #[arg(long, env = "GAME_TTL_MS")]
    pub game_ttl_ms: Option<u64>,

    #[arg(long, env = "LIFECYCLE_SWEEP_INTERVAL_MS", default_value_t = DEFAULT_SWEEP_INTERVAL_MS)]
    pub lifecycle_sweep_interval_ms: u64,

    #[arg(long, env = "PERSISTENCE_MODE", value_enum, default_value_t = PersistenceMode::Disabled)]
    pub persistence_mode: PersistenceMode,

    #[arg(long, env = "PERSISTENCE_PATH")]
    pub persistence_path: Option<PathBuf>,

    #[arg(long, env = "RECONNECT_TOKEN_SECRET", default_value = "")]
    pub reconnect_token_secret: String,

    /// Emit structured logs as JSON lines instead of compact text.
    #[arg(long, env = "LOG_JSON", default_value_t = false)]
    pub log_json: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("RECONNECT_GRACE_MS must be at least {MIN_RECONNECT_GRACE_MS}ms")]
    ReconnectGraceTooLow,
    #[error("GAME_RETENTION_MS must be at least {MIN_GAME_RETENTION_MS}ms")]
    GameRetentionTooLow,
    #[error("LIFECYCLE_SWEEP_INTERVAL_MS must be at least {MIN_SWEEP_INTERVAL_MS}ms")]
    SweepIntervalTooLow,
    #[error("PERSISTENCE_PATH is required when PERSISTENCE_MODE=file")]
    MissingPersistencePath,
}

impl RuntimeConfig {
    /// Validates the configured minimums and resolves an ephemeral reconnect secret when none
    /// was configured, exactly once, without ever surfacing the chosen bytes.
    pub fn validated(mut self) -> Result<Self, ConfigError> {
        if self.reconnect_grace_ms < MIN_RECONNECT_GRACE_MS {
            return Err(ConfigError::ReconnectGraceTooLow);
        }
        if self.game_retention_ms < MIN_GAME_RETENTION_MS {
            return Err(ConfigError::GameRetentionTooLow);
        }
        if self.lifecycle_sweep_interval_ms < MIN_SWEEP_INTERVAL_MS {
            return Err(ConfigError::SweepIntervalTooLow);
        }
        if self.persistence_mode == PersistenceMode::File && self.persistence_path.is_none() {
            return Err(ConfigError::MissingPersistencePath);
        }
        if self.reconnect_token_secret.is_empty() {
            tracing::info!(
                target = "config",
                "RECONNECT_TOKEN_SECRET unset, using ephemeral reconnect secret"
            );
            self.reconnect_token_secret = ephemeral_secret();
        }
        Ok(self)
    }

    pub fn reconnect_token_secret_bytes(&self) -> Vec<u8> {
        self.reconnect_token_secret.as_bytes().to_vec()
    }
}

impl fmt::Debug for RuntimeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuntimeConfig")
            .field("bind_addr", &self.bind_addr)
            .field("reconnect_grace_ms", &self.reconnect_grace_ms)
            .field("game_retention_ms", &self.game_retention_ms)
            .field("session_ttl_ms", &self.session_ttl_ms)
            .field("lobby_ttl_ms", &self.lobby_ttl_ms)
            .field("game_ttl_ms", &self.game_ttl_ms)
            .field(
                "lifecycle_sweep_interval_ms",
                &self.lifecycle_sweep_interval_ms,
            )
            .field("persistence_mode", &self.persistence_mode)
            .field("persistence_path", &self.persistence_path)
            .field("reconnect_token_secret", &"<redacted>")
            .field("log_json", &self.log_json)
            .finish()
    }
}

fn ephemeral_secret() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base(mode: PersistenceMode, path: Option<PathBuf>) -> RuntimeConfig {
        RuntimeConfig {
            bind_addr: "0.0.0.0:8080".into(),
            reconnect_grace_ms: MIN_RECONNECT_GRACE_MS,
            game_retention_ms: MIN_GAME_RETENTION_MS,
            session_ttl_ms: None,
            lobby_ttl_ms: None,
            game_ttl_ms: None,
            lifecycle_sweep_interval_ms: DEFAULT_SWEEP_INTERVAL_MS,
            persistence_mode: mode,
            persistence_path: path,
            reconnect_token_secret: String::new(),
            log_json: false,
        }
    }

    #[test]
    fn rejects_grace_below_minimum() {
        let mut cfg = base(PersistenceMode::Disabled, None);
        cfg.reconnect_grace_ms = 1;
        assert!(matches!(
            cfg.validated(),
            Err(ConfigError::ReconnectGraceTooLow)
        ));
    }

    #[test]
    fn requires_path_when_file_mode() {
        let cfg = base(PersistenceMode::File, None);
        assert!(matches!(
            cfg.validated(),
            Err(ConfigError::MissingPersistencePath)
        ));
    }

    #[test]
    fn fills_in_ephemeral_secret_when_blank() {
        let cfg = base(PersistenceMode::Disabled, None).validated().unwrap();
        assert!(!cfg.reconnect_token_secret.is_empty());
    }

    #[test]
    fn debug_redacts_secret() {
        let mut cfg = base(PersistenceMode::Disabled, None);
        cfg.reconnect_token_secret = "super-secret".into();
        let rendered = format!("{cfg:?}");
        assert!(!rendered.contains("super-secret"));
    }
}
