//! Configuration for the pool manager and the getWork client

use crate::engine::{Ergodicity, MinerType};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Serde helpers for durations carried in whole seconds
mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_secs(u64::deserialize(d)?))
    }
}

/// Serde helpers for durations carried in milliseconds
mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}

/// Pool manager configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManagerConfig {
    /// Which miner backends to spin up on connect
    pub miner_type: MinerType,
    /// Nonce-space reshuffle policy
    pub ergodicity: Ergodicity,
    /// Consecutive connection attempts per endpoint before rotating
    pub max_tries: u32,
    /// Delay before falling back to the primary pool; zero disables
    #[serde(with = "duration_secs")]
    pub failover_timeout: Duration,
    /// Interval between hash rate reports to the pool
    #[serde(with = "duration_secs")]
    pub hashrate_interval: Duration,
    /// Identifier sent along with hash rate reports
    pub worker_id: String,
}

impl ManagerConfig {
    /// Set the failover timeout from whole minutes, the unit pools quote it in
    pub fn with_failover_minutes(mut self, minutes: u64) -> Self {
        self.failover_timeout = Duration::from_secs(minutes * 60);
        self
    }

    /// Check the configuration for values that cannot work
    pub fn validate(&self) -> Result<()> {
        if self.max_tries == 0 {
            return Err(Error::config("max_tries must be at least 1"));
        }
        if self.hashrate_interval.is_zero() {
            return Err(Error::config("hashrate_interval must be non-zero"));
        }
        Ok(())
    }
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            miner_type: MinerType::Mixed,
            ergodicity: Ergodicity::Default,
            max_tries: 3,
            failover_timeout: Duration::ZERO,
            hashrate_interval: Duration::from_secs(60),
            worker_id: format!("0x{}", "0".repeat(64)),
        }
    }
}

/// getWork client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetworkConfig {
    /// Poll cadence between `eth_getWork` requests
    #[serde(with = "duration_millis")]
    pub farm_recheck: Duration,
    /// Declare the pool stalled when no new work arrives for this long
    #[serde(with = "duration_secs")]
    pub work_timeout: Duration,
    /// ZIL mode: end the PoW window when work stays this stale
    #[serde(with = "duration_secs")]
    pub pow_end_timeout: Duration,
    /// ZIL mode: open the window this close to the next PoW round
    #[serde(with = "duration_secs")]
    pub pow_start_window: Duration,
    /// Log raw JSON-RPC payloads at debug level
    pub log_json: bool,
}

impl GetworkConfig {
    /// Check the configuration for values that cannot work
    pub fn validate(&self) -> Result<()> {
        if self.farm_recheck.is_zero() {
            return Err(Error::config("farm_recheck must be non-zero"));
        }
        if self.work_timeout < self.farm_recheck {
            return Err(Error::config(
                "work_timeout must be at least as long as farm_recheck",
            ));
        }
        Ok(())
    }
}

impl Default for GetworkConfig {
    fn default() -> Self {
        Self {
            farm_recheck: Duration::from_millis(500),
            work_timeout: Duration::from_secs(180),
            pow_end_timeout: Duration::from_secs(300),
            pow_start_window: Duration::from_secs(30),
            log_json: false,
        }
    }
}
