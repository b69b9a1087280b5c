//! Environment configuration, read once at startup

use crate::remote::RemoteConfig;
use crate::runtime::{RuntimeConfig, DEFAULT_IDLE_TTL};
use crate::state_machine::Timing;
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_PORT: u16 = 3000;
const DEFAULT_ASSET_BASE: &str = "/furniture";

#[derive(Debug, Clone)]
pub struct CuratorConfig {
    pub port: u16,
    pub remote: RemoteConfig,
    pub runtime: RuntimeConfig,
    /// Directory holding `furniture_<id>.png`; served under the asset base when set
    pub asset_dir: Option<PathBuf>,
}

impl CuratorConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let port = lookup("CURATOR_PORT")
            .and_then(|p| p.parse().ok())
            .unwrap_or(DEFAULT_PORT);

        let mut timing = Timing::default();
        if let Some(ms) = lookup("CURATOR_REVEAL_TICK_MS").and_then(|s| s.parse::<u64>().ok()) {
            // A zero interval would never tick
            timing.reveal_tick = Duration::from_millis(ms.max(1));
        }

        let asset_base = match lookup("CURATOR_ASSET_BASE") {
            Some(base) if !base.trim_matches('/').is_empty() => {
                format!("/{}", base.trim_matches('/'))
            }
            // Images cannot be nested at the router root
            Some(base) => {
                tracing::warn!(%base, "Asset base may not be the root, using default");
                DEFAULT_ASSET_BASE.to_string()
            }
            None => DEFAULT_ASSET_BASE.to_string(),
        };

        let idle_ttl = lookup("CURATOR_SESSION_IDLE_SECS")
            .and_then(|s| s.parse::<u64>().ok())
            .map_or(DEFAULT_IDLE_TTL, Duration::from_secs);

        Self {
            port,
            remote: RemoteConfig::from_lookup(&lookup),
            runtime: RuntimeConfig {
                timing,
                asset_base,
                idle_ttl,
            },
            asset_dir: lookup("CURATOR_ASSET_DIR").map(PathBuf::from),
        }
    }
}
