//! Record source backed by `Kubeconfig` custom resources.
//!
//! A reflector keeps an in-memory cache of every `Kubeconfig` in the watched
//! namespace; listing reads from that cache and never calls the API server.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use kube::runtime::reflector::{self, Store};
use kube::runtime::{WatchStreamExt, watcher};
use kube::{Api, Client, CustomResource, ResourceExt};
use kubebrowser_core::{ConfigRecord, KubeconfigSpec, Result};
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::RecordSourceError;
use crate::selector::Selector;
use crate::source::RecordSource;

/// Spec of the `Kubeconfig` custom resource.
#[derive(CustomResource, Debug, Clone, Serialize, Deserialize)]
#[kube(
    group = "kubebrowser.io",
    version = "v1",
    kind = "Kubeconfig",
    namespaced,
    schema = "disabled"
)]
pub struct KubeconfigResourceSpec {
    #[serde(flatten)]
    pub inner: KubeconfigSpec,
}

impl From<&Kubeconfig> for ConfigRecord {
    fn from(resource: &Kubeconfig) -> Self {
        ConfigRecord {
            namespace: resource.namespace().unwrap_or_default(),
            name: resource.name_any(),
            labels: resource.labels().clone(),
            spec: resource.spec.inner.clone(),
        }
    }
}

/// Watch-backed record source.
pub struct KubeRecordSource {
    namespace: String,
    store: Store<Kubeconfig>,
    watch_task: JoinHandle<()>,
}

impl KubeRecordSource {
    /// Connects using the ambient cluster configuration and starts watching.
    ///
    /// # Errors
    ///
    /// Returns an error if no client can be built or the initial sync does
    /// not finish within `sync_timeout`.
    pub async fn connect(
        namespace: &str,
        sync_timeout: Duration,
    ) -> Result<Self, RecordSourceError> {
        let client = Client::try_default()
            .await
            .map_err(|e| RecordSourceError::Connection {
                details: format!("failed to create Kubernetes client: {e}"),
            })?;
        Self::start(client, namespace, sync_timeout).await
    }

    /// Starts watching `namespace` with an existing client.
    ///
    /// # Errors
    ///
    /// Returns an error if the initial sync does not finish within
    /// `sync_timeout`.
    pub async fn start(
        client: Client,
        namespace: &str,
        sync_timeout: Duration,
    ) -> Result<Self, RecordSourceError> {
        let api: Api<Kubeconfig> = Api::namespaced(client, namespace);
        let (store, writer) = reflector::store();

        let stream = watcher(api, watcher::Config::default())
            .default_backoff()
            .reflect(writer)
            .applied_objects();

        let watched = namespace.to_string();
        let watch_task = tokio::spawn(async move {
            stream
                .for_each(|event| async move {
                    match event {
                        Ok(resource) => debug!(record = %resource.name_any(), "record applied"),
                        Err(e) => warn!(error = %e, "record watch error"),
                    }
                })
                .await;
            warn!(namespace = %watched, "record watch stream ended");
        });

        match tokio::time::timeout(sync_timeout, store.wait_until_ready()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                watch_task.abort();
                return Err(RecordSourceError::Sync {
                    details: e.to_string(),
                }
                .into());
            }
            Err(_) => {
                watch_task.abort();
                return Err(RecordSourceError::Sync {
                    details: format!("initial sync did not finish within {sync_timeout:?}"),
                }
                .into());
            }
        }

        info!(namespace, count = store.state().len(), "record cache synced");

        Ok(Self {
            namespace: namespace.to_string(),
            store,
            watch_task,
        })
    }
}

impl Drop for KubeRecordSource {
    fn drop(&mut self) {
        self.watch_task.abort();
    }
}

impl std::fmt::Debug for KubeRecordSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeRecordSource")
            .field("namespace", &self.namespace)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl RecordSource for KubeRecordSource {
    async fn list(
        &self,
        namespace: &str,
        selector: &Selector,
    ) -> Result<Vec<Arc<ConfigRecord>>, RecordSourceError> {
        if namespace != self.namespace {
            warn!(
                requested = namespace,
                watched = %self.namespace,
                "namespace is not watched"
            );
            return Ok(Vec::new());
        }

        let mut records: Vec<Arc<ConfigRecord>> = self
            .store
            .state()
            .iter()
            .map(|resource| ConfigRecord::from(resource.as_ref()))
            .filter(|record| selector.matches(&record.labels))
            .map(Arc::new)
            .collect();
        // The store has no ordering of its own.
        records.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(records)
    }
}
