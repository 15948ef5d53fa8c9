//! Environment-driven application configuration

use std::path::PathBuf;

use crate::error::{ApiError, ApiResult};

pub const DEFAULT_TRAP_PORT: u16 = 162;
pub const DEFAULT_TRAP_FALLBACK_PORT: u16 = 10_162;

/// Trap listener bind policy.
#[derive(Debug, Clone)]
pub struct TrapConfig {
    pub port: u16,
    pub fallback_port: u16,
    /// Prompt instead of silently falling back when the privileged bind
    /// fails.
    pub require_privileged: bool,
    /// Skip the prompt and always fall back.
    pub auto_fallback: bool,
}

impl Default for TrapConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_TRAP_PORT,
            fallback_port: DEFAULT_TRAP_FALLBACK_PORT,
            require_privileged: true,
            auto_fallback: false,
        }
    }
}

/// Application configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub http_port: u16,
    pub trap: TrapConfig,
    /// Directory of JSON MIB mapping files merged into the built-ins.
    pub mib_dir: PathBuf,
    /// Where walk templates and dump files live.
    pub assets_dir: PathBuf,
}

impl AppConfig {
    pub fn from_env() -> ApiResult<Self> {
        let database_url = std::env::var("DATABASE_URL")
            .map_err(|_| ApiError::Config("DATABASE_URL is required".into()))?;

        let trap_port = env_port("SNMP_TRAP_PORT")
            .or_else(|| env_port("TRAP_PORT"))
            .unwrap_or(DEFAULT_TRAP_PORT);

        Ok(Self {
            database_url,
            http_port: env_port("PORT").unwrap_or(3000),
            trap: TrapConfig {
                port: trap_port,
                fallback_port: env_port("SNMP_TRAP_FALLBACK_PORT")
                    .unwrap_or(DEFAULT_TRAP_FALLBACK_PORT),
                require_privileged: env_bool("SNMP_TRAP_REQUIRE_PRIVILEGED", true),
                auto_fallback: env_bool("SNMP_TRAP_AUTO_FALLBACK", false),
            },
            mib_dir: PathBuf::from(
                std::env::var("MIB_DIR").unwrap_or_else(|_| "mibs".to_string()),
            ),
            assets_dir: PathBuf::from(
                std::env::var("ASSETS_DIR").unwrap_or_else(|_| "attached_assets".to_string()),
            ),
        })
    }
}

fn env_port(name: &str) -> Option<u16> {
    std::env::var(name).ok()?.trim().parse().ok()
}

fn env_bool(name: &str, default: bool) -> bool {
    match std::env::var(name) {
        Ok(v) => v.trim().eq_ignore_ascii_case("true"),
        Err(_) => default,
    }
}
