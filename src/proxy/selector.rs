//! Backend selection policies.
//!
//! [`BackendSelector`] is the seam for load-balancing strategies.
//! [`RandomSelector`] picks uniformly at random on every call and keeps
//! no state between calls.

use std::fmt;

use rand::seq::SliceRandom;

use crate::config::model::HostPort;

pub trait BackendSelector: Send + Sync + fmt::Debug {
    /// Pick one backend. Returns `None` only when `hosts` is empty.
    fn choose<'a>(&self, hosts: &'a [HostPort]) -> Option<&'a HostPort>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct RandomSelector;

impl BackendSelector for RandomSelector {
    fn choose<'a>(&self, hosts: &'a [HostPort]) -> Option<&'a HostPort> {
        // thread_rng is thread-local, so concurrent callers never contend.
        hosts.choose(&mut rand::thread_rng())
    }
}
