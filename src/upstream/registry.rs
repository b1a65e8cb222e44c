//! Shared registry of transport clients keyed by target.
//!
//! Logically identical targets share one client (and so one connection pool).
//! The registry is created once by the application root, handed to every
//! upstream build, and survives configuration reloads.

use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;

use crate::observability::metrics;
use crate::upstream::client::{HttpTransport, Transport, TransportOptions};
use crate::upstream::target::Target;

type TransportFactory = dyn Fn(&Target) -> Arc<dyn Transport> + Send + Sync;

/// Lookup-or-create map from `Target` to client.
#[derive(Clone)]
pub struct ClientRegistry {
    clients: Arc<DashMap<Target, Arc<dyn Transport>>>,
    factory: Arc<TransportFactory>,
}

impl ClientRegistry {
    /// Registry creating clients with `factory`.
    pub fn new<F>(factory: F) -> Self
    where
        F: Fn(&Target) -> Arc<dyn Transport> + Send + Sync + 'static,
    {
        Self {
            clients: Arc::new(DashMap::new()),
            factory: Arc::new(factory),
        }
    }

    /// Registry creating `HttpTransport` clients.
    pub fn http(options: TransportOptions) -> Self {
        Self::new(move |target| {
            Arc::new(HttpTransport::new(target.clone(), options.clone())) as Arc<dyn Transport>
        })
    }

    /// Client for `target`, created on first use.
    ///
    /// Concurrent first lookups of one target resolve to a single client: the
    /// shard lock taken by `entry` makes creation check-then-insert.
    pub fn get(&self, target: &Target) -> Arc<dyn Transport> {
        if let Some(client) = self.clients.get(target) {
            return client.value().clone();
        }

        let client = self
            .clients
            .entry(target.clone())
            .or_insert_with(|| {
                tracing::debug!(upstream = %target, "Creating upstream client");
                (self.factory)(target)
            })
            .value()
            .clone();

        metrics::record_upstream_clients(self.clients.len());
        client
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    /// Drop every cached client. Upstreams already built keep their handles.
    pub fn clear(&self) {
        self.clients.clear();
        metrics::record_upstream_clients(0);
    }
}

impl Default for ClientRegistry {
    fn default() -> Self {
        Self::http(TransportOptions::default())
    }
}

impl fmt::Debug for ClientRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientRegistry")
            .field("clients", &self.clients.len())
            .finish()
    }
}
