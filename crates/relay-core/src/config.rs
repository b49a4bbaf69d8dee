//! RelayConfig - 環境変数からの設定読み込み
//!
//! `config` crate の `Environment` source を使う。キーは小文字化されて
//! フィールド名と突き合わされる（`REDIS_HOST_URL` → `redis_host_url`）。
//!
//! # 必須
//! `WORKFLOW_INSTANCE_ID`, `WORKFLOW_EXTENSION_ID`, `REDIS_HOST_URL`,
//! `REDIS_CHANNEL_IN`, `REDIS_CHANNEL_OUT`, `REDIS_CHANNEL_READY`
//!
//! # 任意
//! `REDIS_USERNAME`, `REDIS_PASSWORD`, `RELAY_HANDLER`,
//! `RELAY_TASK_TIMEOUT_SECS` (0 で無制限), `RELAY_MODE`,
//! `RELAY_DETAILED_ERRORS`, `RELAY_HEALTH_ADDR`

use std::net::SocketAddr;
use std::time::Duration;

use ::config::{Config, Environment};
use serde::Deserialize;

use crate::app::{DEFAULT_TASK_TIMEOUT, RunMode, RunnerOptions};
use crate::domain::{Channels, WorkflowIds};
use crate::impls::RedisConnector;
use crate::ports::BusError;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {source}")]
    Load {
        #[source]
        source: ::config::ConfigError,
    },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

fn default_task_timeout_secs() -> u64 {
    DEFAULT_TASK_TIMEOUT.as_secs()
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RelayConfig {
    pub workflow_instance_id: String,
    pub workflow_extension_id: String,
    pub redis_host_url: String,
    #[serde(default)]
    pub redis_username: Option<String>,
    #[serde(default)]
    pub redis_password: Option<String>,
    pub redis_channel_in: String,
    pub redis_channel_out: String,
    pub redis_channel_ready: String,
    #[serde(default)]
    pub relay_handler: Option<String>,
    #[serde(default = "default_task_timeout_secs")]
    pub relay_task_timeout_secs: u64,
    #[serde(default)]
    pub relay_mode: RunMode,
    #[serde(default)]
    pub relay_detailed_errors: bool,
    #[serde(default)]
    pub relay_health_addr: Option<SocketAddr>,
}

impl RelayConfig {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::load(Environment::default())
    }

    /// Load from an explicit variable map instead of the process environment.
    pub fn from_vars<K, V>(vars: impl IntoIterator<Item = (K, V)>) -> Result<Self, ConfigError>
    where
        K: Into<String>,
        V: Into<String>,
    {
        let map: ::config::Map<String, String> = vars
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self::load(Environment::default().source(Some(map)))
    }

    fn load(environment: Environment) -> Result<Self, ConfigError> {
        let config: Self = Config::builder()
            .add_source(environment)
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|source| ConfigError::Load { source })?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let required = [
            ("WORKFLOW_INSTANCE_ID", &self.workflow_instance_id),
            ("WORKFLOW_EXTENSION_ID", &self.workflow_extension_id),
            ("REDIS_HOST_URL", &self.redis_host_url),
            ("REDIS_CHANNEL_IN", &self.redis_channel_in),
            ("REDIS_CHANNEL_OUT", &self.redis_channel_out),
            ("REDIS_CHANNEL_READY", &self.redis_channel_ready),
        ];
        for (key, value) in required {
            if value.trim().is_empty() {
                return Err(ConfigError::Invalid(format!("{key} must not be empty")));
            }
        }
        Ok(())
    }

    pub fn channels(&self) -> Channels {
        Channels::new(
            self.redis_channel_ready.as_str(),
            self.redis_channel_in.as_str(),
            self.redis_channel_out.as_str(),
        )
    }

    pub fn workflow_ids(&self) -> WorkflowIds {
        WorkflowIds::new(
            self.workflow_instance_id.as_str(),
            self.workflow_extension_id.as_str(),
        )
    }

    pub fn runner_options(&self) -> RunnerOptions {
        RunnerOptions {
            task_timeout: match self.relay_task_timeout_secs {
                0 => None,
                secs => Some(Duration::from_secs(secs)),
            },
            mode: self.relay_mode,
            detailed_errors: self.relay_detailed_errors,
        }
    }

    pub fn redis_connector(&self) -> Result<RedisConnector, BusError> {
        RedisConnector::new(
            &self.redis_host_url,
            self.redis_username.as_deref(),
            self.redis_password.as_deref(),
        )
    }
}
