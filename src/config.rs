use figment::{
    providers::{Env, Format, Json, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::label::DEFAULT_LABEL_PREFIX;
use crate::marathon::client::{ClientConfig, DEFAULT_MARATHON_URI};
use crate::resolver::WatchOptions;

const ENV_PREFIX: &str = "MARATHON_RESOLVER_";

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub marathon_uri: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dcos_user: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dcos_password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dcos_token: Option<String>,
    pub service_name: String,
    pub label_prefix: String,
    pub poll_interval_secs: u64,
    pub probe_endpoints: bool,
    pub probe_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            marathon_uri: DEFAULT_MARATHON_URI.into(),
            dcos_user: None,
            dcos_password: None,
            dcos_token: None,
            service_name: String::new(),
            label_prefix: DEFAULT_LABEL_PREFIX.into(),
            poll_interval_secs: 2,
            probe_endpoints: false,
            probe_timeout_secs: 5,
        }
    }
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        Self::from_figment(
            Figment::from(Serialized::defaults(Config::default()))
                .merge(Toml::file("marathon-resolver.toml"))
                .merge(Json::file("marathon-resolver.json"))
                .merge(Env::prefixed(ENV_PREFIX)),
        )
    }

    fn from_figment(figment: Figment) -> anyhow::Result<Self> {
        let mut config: Config = figment
            .extract()
            .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))?;

        // Support Docker-style secrets
        if let Ok(secret_file) = std::env::var(format!("{}DCOS_PASSWORD_FILE", ENV_PREFIX)) {
            config.dcos_password = Some(read_secret(&secret_file)?);
        }
        if let Ok(secret_file) = std::env::var(format!("{}DCOS_TOKEN_FILE", ENV_PREFIX)) {
            config.dcos_token = Some(read_secret(&secret_file)?);
        }

        if config.poll_interval_secs == 0 {
            anyhow::bail!("poll_interval_secs must be at least 1");
        }

        Ok(config)
    }

    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            uri: self.marathon_uri.clone(),
            basic_auth_user: self.dcos_user.clone(),
            basic_auth_password: self.dcos_password.clone(),
            dcos_token: self.dcos_token.clone(),
        }
    }

    pub fn watch_options(&self) -> WatchOptions {
        WatchOptions {
            label_prefix: self.label_prefix.clone(),
            poll_interval: Duration::from_secs(self.poll_interval_secs),
        }
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }
}

fn read_secret(path: &str) -> anyhow::Result<String> {
    let secret = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Failed to read secret file {}: {}", path, e))?;
    Ok(secret.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::from_figment(Figment::from(Serialized::defaults(Config::default())))
            .unwrap();

        assert_eq!(config.marathon_uri, "http://marathon.mesos:8080");
        assert_eq!(config.watch_options().poll_interval, Duration::from_secs(2));
        assert_eq!(config.watch_options().label_prefix, "RESOLVER");
        assert_eq!(config.probe_timeout(), Duration::from_secs(5));
        assert!(config.client_config().dcos_token.is_none());
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_figment(
            Figment::from(Serialized::defaults(Config::default())).merge(Serialized::defaults(
                serde_json::json!({
                    "marathon_uri": "http://10.0.0.5:8080",
                    "service_name": "service-test",
                    "dcos_token": "abc",
                    "poll_interval_secs": 10
                }),
            )),
        )
        .unwrap();

        assert_eq!(config.service_name, "service-test");
        assert_eq!(config.client_config().uri, "http://10.0.0.5:8080");
        assert_eq!(config.client_config().dcos_token.as_deref(), Some("abc"));
        assert_eq!(config.watch_options().poll_interval, Duration::from_secs(10));
    }

    #[test]
    fn test_zero_interval_is_rejected() {
        let result = Config::from_figment(
            Figment::from(Serialized::defaults(Config::default()))
                .merge(Serialized::defaults(serde_json::json!({ "poll_interval_secs": 0 }))),
        );
        assert!(result.is_err());
    }
}
