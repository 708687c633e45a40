//! Immutable service-domain routing table.
//!
//! [`RoutingTable::build`] turns a validated [`ProxyConfig`] into a map
//! from service domain to [`BackendSet`]. The table is built once at
//! startup and only read afterwards, so handlers share it without locks.

use std::collections::HashMap;
use std::sync::Arc;

use crate::config::model::{HostPort, ProxyConfig};

use super::selector::{BackendSelector, RandomSelector};

/// The candidate backends for one service plus the policy that picks among them.
#[derive(Debug, Clone)]
pub struct BackendSet {
    hosts: Vec<HostPort>,
    selector: Arc<dyn BackendSelector>,
}

impl BackendSet {
    #[must_use]
    pub fn new(hosts: Vec<HostPort>, selector: Arc<dyn BackendSelector>) -> Self {
        Self { hosts, selector }
    }

    #[must_use]
    pub fn hosts(&self) -> &[HostPort] {
        &self.hosts
    }

    #[must_use]
    pub fn select(&self) -> Option<&HostPort> {
        self.selector.choose(&self.hosts)
    }
}

#[derive(Debug, Clone, Default)]
pub struct RoutingTable {
    services: HashMap<String, BackendSet>,
}

impl RoutingTable {
    /// Build the table with the given selection policy.
    ///
    /// Domains are not required to be unique; when two services share a
    /// domain the later one replaces the earlier one.
    #[must_use]
    pub fn build(config: &ProxyConfig, selector: Arc<dyn BackendSelector>) -> Self {
        let mut services = HashMap::with_capacity(config.services.len());
        for service in &config.services {
            let set = BackendSet::new(service.hosts.clone(), Arc::clone(&selector));
            if services.insert(service.domain.clone(), set).is_some() {
                tracing::warn!(
                    domain = %service.domain,
                    service = %service.name,
                    "duplicate service domain, later definition wins"
                );
            }
        }
        Self { services }
    }

    /// Build the table with uniform-random backend selection.
    #[must_use]
    pub fn from_config(config: &ProxyConfig) -> Self {
        Self::build(config, Arc::new(RandomSelector))
    }

    #[must_use]
    pub fn get(&self, domain: &str) -> Option<&BackendSet> {
        self.services.get(domain)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.services.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &BackendSet)> {
        self.services.iter().map(|(k, v)| (k.as_str(), v))
    }
}
