//! Cluster state store abstraction (component 8's "cluster state store"
//! collaborator, section 1): a trait capturing get/list/create/update/
//! delete/status-subresource-update, plus the `kube`-backed implementation
//! the operator actually runs against.
//!
//! Grounded on `buildit-db::repo::pipeline`'s `PipelineRepo`/`PgPipelineRepo`
//! trait-plus-concrete-impl idiom (trait for testability, one real
//! implementation), reimplemented against `kube::Api<K>` instead of
//! `sqlx::PgPool` — the reconciler no longer owns a SQL connection pool,
//! it owns a `kube::Client`.

use std::fmt::Debug;

use async_trait::async_trait;
use c8s_core::Error;
use kube::api::{Patch, PatchParams, PostParams};
use kube::core::NamespaceResourceScope;
use kube::{Api, Client, Resource};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Namespaced CRUD plus status-subresource access over one resource kind.
/// Parameterized so the reconciler, mapper-facing code, and admission
/// validators all share one store abstraction instead of each hand-rolling
/// `kube::Api` calls.
#[async_trait]
pub trait StateStore<K>: Send + Sync
where
    K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>
        + Clone
        + DeserializeOwned
        + Serialize
        + Debug
        + Send
        + Sync
        + 'static,
{
    async fn get(&self, namespace: &str, name: &str) -> Result<K, Error>;
    async fn get_opt(&self, namespace: &str, name: &str) -> Result<Option<K>, Error>;
    async fn list(&self, namespace: &str) -> Result<Vec<K>, Error>;
    async fn create(&self, namespace: &str, obj: &K) -> Result<K, Error>;
    async fn update(&self, namespace: &str, obj: &K) -> Result<K, Error>;
    async fn delete(&self, namespace: &str, name: &str) -> Result<(), Error>;
    async fn patch_status(&self, namespace: &str, name: &str, status: serde_json::Value) -> Result<K, Error>;
}

/// The real implementation, backed by one shared `kube::Client`. Cloning a
/// `KubeStateStore` is cheap — `kube::Client` is itself an `Arc` handle.
#[derive(Clone)]
pub struct KubeStateStore {
    client: Client,
}

impl KubeStateStore {
    pub fn new(client: Client) -> Self {
        KubeStateStore { client }
    }

    /// The underlying client, for callers that need raw `kube::Api` access
    /// this trait doesn't cover (finalizer patches, the `Controller` watch
    /// set-up in `c8s-reconciler::run`).
    pub fn client(&self) -> &Client {
        &self.client
    }

    fn api<K>(&self, namespace: &str) -> Api<K>
    where
        K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>,
    {
        Api::namespaced(self.client.clone(), namespace)
    }
}

#[async_trait]
impl<K> StateStore<K> for KubeStateStore
where
    K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>
        + Clone
        + DeserializeOwned
        + Serialize
        + Debug
        + Send
        + Sync
        + 'static,
{
    async fn get(&self, namespace: &str, name: &str) -> Result<K, Error> {
        Ok(self.api::<K>(namespace).get(name).await?)
    }

    async fn get_opt(&self, namespace: &str, name: &str) -> Result<Option<K>, Error> {
        Ok(self.api::<K>(namespace).get_opt(name).await?)
    }

    async fn list(&self, namespace: &str) -> Result<Vec<K>, Error> {
        let list = self
            .api::<K>(namespace)
            .list(&Default::default())
            .await?;
        Ok(list.items)
    }

    async fn create(&self, namespace: &str, obj: &K) -> Result<K, Error> {
        Ok(self
            .api::<K>(namespace)
            .create(&PostParams::default(), obj)
            .await?)
    }

    async fn update(&self, namespace: &str, obj: &K) -> Result<K, Error> {
        let name = obj
            .meta()
            .name
            .clone()
            .ok_or_else(|| Error::validation("object has no name; cannot update"))?;
        Ok(self
            .api::<K>(namespace)
            .replace(&name, &PostParams::default(), obj)
            .await?)
    }

    async fn delete(&self, namespace: &str, name: &str) -> Result<(), Error> {
        self.api::<K>(namespace)
            .delete(name, &Default::default())
            .await?;
        Ok(())
    }

    async fn patch_status(&self, namespace: &str, name: &str, status: serde_json::Value) -> Result<K, Error> {
        let patch = Patch::Merge(serde_json::json!({ "status": status }));
        Ok(self
            .api::<K>(namespace)
            .patch_status(name, &PatchParams::default(), &patch)
            .await?)
    }
}
