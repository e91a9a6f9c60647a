// Copyright 2022-2024 Protocol Labs
// SPDX-License-Identifier: MIT

use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

/// Request timeout of the RPC client
pub const DEFAULT_REQ_TIMEOUT: Duration = Duration::from_secs(250);

/// Highest mapping slot index tried by discovery (exclusive)
pub const DEFAULT_DISCOVERY_LIMIT: usize = 20;

/// Connection and search settings shared by the client and the checkpoint engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    pub rpc_url: Url,
    #[serde(default)]
    pub bearer_token: Option<String>,
    #[serde(default = "default_timeout", with = "duration_secs")]
    pub request_timeout: Duration,
    #[serde(default = "default_discovery_limit")]
    pub discovery_limit: usize,
}

fn default_timeout() -> Duration {
    DEFAULT_REQ_TIMEOUT
}

fn default_discovery_limit() -> usize {
    DEFAULT_DISCOVERY_LIMIT
}

impl ClientConfig {
    pub fn new(rpc_url: Url) -> Self {
        Self {
            rpc_url,
            bearer_token: None,
            request_timeout: DEFAULT_REQ_TIMEOUT,
            discovery_limit: DEFAULT_DISCOVERY_LIMIT,
        }
    }

    pub fn with_bearer_token(mut self, token: Option<String>) -> Self {
        self.bearer_token = token;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_discovery_limit(mut self, limit: usize) -> Self {
        self.discovery_limit = limit;
        self
    }
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_secs(u64::deserialize(deserializer)?))
    }
}
