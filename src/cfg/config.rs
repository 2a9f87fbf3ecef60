// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{fs, path::Path, time::Duration};

use anyhow::{Context as _, Result};
use serde::{Deserialize, Serialize};

/// Top-level configuration for the transaction engine (§10.3).
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct EngineConfig {
    #[serde(default)]
    pub keep_alive: KeepAliveConfig,
    #[serde(default)]
    pub proxy: Option<ProxyConfig>,
    #[serde(default = "default_true")]
    pub gzip: bool,
    #[serde(default = "default_buf_max")]
    pub buf_max: usize,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            keep_alive: KeepAliveConfig::default(),
            proxy: None,
            gzip: true,
            buf_max: default_buf_max(),
            user_agent: default_user_agent(),
        }
    }
}

/// Keep-alive knobs (§3 `keep_alive`, §10.6 advanced-keep-alive feature).
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct KeepAliveConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_keep_alive_max")]
    pub max: u32,
    #[serde(default = "default_keep_alive_timeout_secs", rename = "timeout_secs")]
    pub timeout_secs: u64,
}

impl KeepAliveConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for KeepAliveConfig {
    fn default() -> Self {
        KeepAliveConfig {
            enabled: true,
            max: default_keep_alive_max(),
            timeout_secs: default_keep_alive_timeout_secs(),
        }
    }
}

/// HTTP proxy mode, configured via a tagged enum the way the teacher tags
/// `AuthConfig` by `AuthMethod`.
#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(tag = "kind")]
pub enum ProxyConfig {
    #[serde(rename = "http_get")]
    HttpGet { target_address: String },
    #[serde(rename = "http_connect")]
    HttpConnect { target_address: String },
}

fn default_true() -> bool {
    true
}

fn default_buf_max() -> usize {
    crate::constants::BUF_MAX
}

fn default_user_agent() -> String {
    crate::constants::DEFAULT_USER_AGENT.to_string()
}

fn default_keep_alive_max() -> u32 {
    1000
}

fn default_keep_alive_timeout_secs() -> u64 {
    300
}

impl EngineConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_enable_keep_alive_and_gzip() {
        let cfg = EngineConfig::default();
        assert!(cfg.keep_alive.enabled);
        assert!(cfg.gzip);
        assert!(cfg.proxy.is_none());
    }

    #[test]
    fn loads_from_yaml() {
        let yaml = r#"
keep_alive:
  enabled: true
  max: 10
  timeout_secs: 60
proxy:
  kind: http_connect
  target_address: "proxy.example.com:3128"
gzip: false
buf_max: 4096
user_agent: "test-agent/1.0"
"#;
        let cfg: EngineConfig = serde_yaml::from_str(yaml).expect("parse");
        assert_eq!(cfg.keep_alive.max, 10);
        assert!(!cfg.gzip);
        match cfg.proxy {
            Some(ProxyConfig::HttpConnect { target_address }) => {
                assert_eq!(target_address, "proxy.example.com:3128");
            },
            _ => panic!("expected http_connect proxy"),
        }
    }
}
