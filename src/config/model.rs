//! Serde data structures for the Frontgate configuration file.
//!
//! The document root is [`ConfigFile`], whose single `proxy` key holds
//! the [`ProxyConfig`]: the listen endpoint and the list of
//! [`Service`]s, each backed by one or more [`HostPort`]s. Every field
//! defaults when absent so that missing values surface as validation
//! errors rather than parse errors.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    #[serde(default)]
    pub proxy: ProxyConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ProxyConfig {
    #[serde(default)]
    pub listen: HostPort,

    #[serde(default)]
    pub services: Vec<Service>,
}

impl ProxyConfig {
    #[must_use]
    pub fn total_hosts(&self) -> usize {
        self.services.iter().map(|s| s.hosts.len()).sum()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Service {
    #[serde(default)]
    pub name: String,

    /// Routing key matched against the `s` query parameter.
    #[serde(default)]
    pub domain: String,

    #[serde(default)]
    pub hosts: Vec<HostPort>,
}

/// A single network endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct HostPort {
    #[serde(default)]
    pub address: String,

    #[serde(default)]
    pub port: u16,
}

impl HostPort {
    #[must_use]
    pub fn new(address: impl Into<String>, port: u16) -> Self {
        Self {
            address: address.into(),
            port,
        }
    }

    /// Host to bind a listener on. An empty address means all interfaces.
    #[must_use]
    pub fn bind_host(&self) -> &str {
        if self.address.is_empty() {
            "0.0.0.0"
        } else {
            &self.address
        }
    }
}

impl fmt::Display for HostPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.address, self.port)
    }
}
