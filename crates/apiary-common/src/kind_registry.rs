//! Explicit registry of optional third-party kinds
//!
//! Some objects apiary reconciles (image streams, dashboards, monitoring
//! rules) belong to CRDs that may not be installed in a given cluster. The
//! registry is built once at startup and passed into reconcilers; nothing is
//! registered through global state.

use dashmap::DashMap;
use kube::discovery::ApiResource;
use kube::Client;
use tracing::{debug, info, warn};

use crate::kube_utils::{build_api_resource, find_discovered_resource};

/// Third-party kinds apiary knows how to reconcile when present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OptionalKind {
    /// ImageStream (image.openshift.io)
    ImageStream,
    /// GrafanaDashboard (integreatly.org)
    GrafanaDashboard,
    /// PrometheusRule (monitoring.coreos.com)
    PrometheusRule,
    /// ServiceMonitor (monitoring.coreos.com)
    ServiceMonitor,
    /// PodMonitor (monitoring.coreos.com)
    PodMonitor,
}

/// All OptionalKind variants for iteration.
pub const ALL_OPTIONAL_KINDS: &[OptionalKind] = &[
    OptionalKind::ImageStream,
    OptionalKind::GrafanaDashboard,
    OptionalKind::PrometheusRule,
    OptionalKind::ServiceMonitor,
    OptionalKind::PodMonitor,
];

impl OptionalKind {
    /// API group for discovery lookup.
    pub fn group(&self) -> &'static str {
        match self {
            Self::ImageStream => "image.openshift.io",
            Self::GrafanaDashboard => "integreatly.org",
            Self::PrometheusRule | Self::ServiceMonitor | Self::PodMonitor => {
                "monitoring.coreos.com"
            }
        }
    }

    /// Kubernetes Kind string for discovery lookup.
    pub fn kind_str(&self) -> &'static str {
        match self {
            Self::ImageStream => "ImageStream",
            Self::GrafanaDashboard => "GrafanaDashboard",
            Self::PrometheusRule => "PrometheusRule",
            Self::ServiceMonitor => "ServiceMonitor",
            Self::PodMonitor => "PodMonitor",
        }
    }

    /// API version assumed when a kind is registered without discovery.
    fn default_api_version(&self) -> &'static str {
        match self {
            Self::ImageStream => "image.openshift.io/v1",
            Self::GrafanaDashboard => "integreatly.org/v1alpha1",
            Self::PrometheusRule | Self::ServiceMonitor | Self::PodMonitor => {
                "monitoring.coreos.com/v1"
            }
        }
    }
}

/// Which optional kinds are installed, and at which version.
///
/// Absent kinds are looked up again on demand (the CRD may be installed after
/// startup). Registries built with [`KindRegistry::with_kinds`] have no client
/// and never rediscover.
pub struct KindRegistry {
    client: Option<Client>,
    entries: DashMap<OptionalKind, ApiResource>,
}

impl KindRegistry {
    /// Run API discovery once and record every installed optional kind.
    ///
    /// A discovery failure leaves the registry empty; every optional kind
    /// is then treated as absent until a later lookup rediscovers it.
    pub async fn discover(client: Client) -> Self {
        let registry = Self {
            client: Some(client),
            entries: DashMap::new(),
        };
        registry.rediscover().await;
        info!(
            installed = registry.entries.len(),
            total = ALL_OPTIONAL_KINDS.len(),
            "kind registry populated"
        );
        registry
    }

    /// Build a registry from a fixed set of kinds, without discovery.
    pub fn with_kinds(kinds: &[OptionalKind]) -> Self {
        let entries = DashMap::new();
        for kind in kinds {
            entries.insert(
                *kind,
                build_api_resource(kind.default_api_version(), kind.kind_str()),
            );
        }
        Self {
            client: None,
            entries,
        }
    }

    /// Resolve a kind, rediscovering once if it was missing.
    pub async fn resolve(&self, kind: OptionalKind) -> Option<ApiResource> {
        if let Some(ar) = self.entries.get(&kind) {
            return Some(ar.clone());
        }
        if self.client.is_none() {
            return None;
        }

        debug!(
            kind = kind.kind_str(),
            group = kind.group(),
            "optional kind missing, attempting lazy discovery"
        );
        self.rediscover().await;
        self.entries.get(&kind).map(|r| r.clone())
    }

    /// Whether a kind is installed.
    pub async fn is_installed(&self, kind: OptionalKind) -> bool {
        self.resolve(kind).await.is_some()
    }

    /// Kinds currently known to be installed, without rediscovery.
    pub fn installed(&self) -> Vec<OptionalKind> {
        ALL_OPTIONAL_KINDS
            .iter()
            .copied()
            .filter(|k| self.entries.contains_key(k))
            .collect()
    }

    async fn rediscover(&self) {
        use kube::discovery::Discovery;

        let Some(client) = &self.client else {
            return;
        };
        let discovery = match Discovery::new(client.clone()).run().await {
            Ok(d) => d,
            Err(e) => {
                warn!(error = %e, "API discovery failed");
                return;
            }
        };

        for kind in ALL_OPTIONAL_KINDS {
            if self.entries.contains_key(kind) {
                continue;
            }
            if let Some(ar) = find_discovered_resource(&discovery, kind.group(), kind.kind_str()) {
                self.entries.insert(*kind, ar);
            }
        }
    }
}
