use crate::Error;
use async_trait::async_trait;
use netpol_generator_core::FIELD_MANAGER;
use netpol_generator_k8s_api::{
    self as k8s, Api, Client, DeleteParams, NetworkPolicy, NetworkPolicyGenerator,
    NetworkPolicyGeneratorStatus, Patch, PatchParams, PostParams, ResourceExt,
};

/// Reads and writes generators and the documents derived from them.
///
/// Lookups of objects that do not exist return `None`, deleting an object that does not exist
/// succeeds, and a write against a stale `resourceVersion` fails with [`Error::Conflict`].
#[async_trait]
pub trait Store: Send + Sync + 'static {
    async fn get_generator(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<NetworkPolicyGenerator>, Error>;

    /// Writes a generator's metadata and spec.
    async fn replace_generator(
        &self,
        generator: &NetworkPolicyGenerator,
    ) -> Result<NetworkPolicyGenerator, Error>;

    /// Writes a generator's status. The spec is left untouched.
    async fn patch_generator_status(
        &self,
        namespace: &str,
        name: &str,
        status: &NetworkPolicyGeneratorStatus,
    ) -> Result<(), Error>;

    async fn get_policy(&self, namespace: &str, name: &str)
        -> Result<Option<NetworkPolicy>, Error>;

    async fn create_policy(&self, policy: &NetworkPolicy) -> Result<NetworkPolicy, Error>;

    async fn replace_policy(&self, policy: &NetworkPolicy) -> Result<NetworkPolicy, Error>;

    /// Returns `false` when there was nothing to delete.
    async fn delete_policy(&self, namespace: &str, name: &str) -> Result<bool, Error>;
}

/// A [`Store`] backed by the Kubernetes API.
#[derive(Clone)]
pub struct KubeStore {
    client: Client,
}

// === impl KubeStore ===

impl KubeStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn generators(&self, namespace: &str) -> Api<NetworkPolicyGenerator> {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn policies(&self, namespace: &str) -> Api<NetworkPolicy> {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn post_params() -> PostParams {
        PostParams {
            field_manager: Some(FIELD_MANAGER.to_string()),
            ..Default::default()
        }
    }
}

#[async_trait]
impl Store for KubeStore {
    async fn get_generator(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<NetworkPolicyGenerator>, Error> {
        Ok(self.generators(namespace).get_opt(name).await?)
    }

    async fn replace_generator(
        &self,
        generator: &NetworkPolicyGenerator,
    ) -> Result<NetworkPolicyGenerator, Error> {
        let (namespace, name) = key(generator)?;
        self.generators(&namespace)
            .replace(&name, &Self::post_params(), generator)
            .await
            .map_err(|error| Error::from_write::<NetworkPolicyGenerator>(error, &namespace, &name))
    }

    async fn patch_generator_status(
        &self,
        namespace: &str,
        name: &str,
        status: &NetworkPolicyGeneratorStatus,
    ) -> Result<(), Error> {
        // Every field is written so that merging never leaves stale flows or timestamps behind.
        let patch = serde_json::json!({
            "status": {
                "phase": status.phase,
                "lastAnalyzed": status.last_analyzed,
                "observedTraffic": status.observed_traffic,
            }
        });
        let params = PatchParams {
            field_manager: Some(FIELD_MANAGER.to_string()),
            ..Default::default()
        };
        self.generators(namespace)
            .patch_status(name, &params, &Patch::Merge(patch))
            .await?;
        Ok(())
    }

    async fn get_policy(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<NetworkPolicy>, Error> {
        Ok(self.policies(namespace).get_opt(name).await?)
    }

    async fn create_policy(&self, policy: &NetworkPolicy) -> Result<NetworkPolicy, Error> {
        let (namespace, name) = key(policy)?;
        self.policies(&namespace)
            .create(&Self::post_params(), policy)
            .await
            .map_err(|error| Error::from_write::<NetworkPolicy>(error, &namespace, &name))
    }

    async fn replace_policy(&self, policy: &NetworkPolicy) -> Result<NetworkPolicy, Error> {
        let (namespace, name) = key(policy)?;
        self.policies(&namespace)
            .replace(&name, &Self::post_params(), policy)
            .await
            .map_err(|error| Error::from_write::<NetworkPolicy>(error, &namespace, &name))
    }

    async fn delete_policy(&self, namespace: &str, name: &str) -> Result<bool, Error> {
        match self
            .policies(namespace)
            .delete(name, &DeleteParams::default())
            .await
        {
            Ok(_) => Ok(true),
            Err(k8s::Error::Api(response)) if response.code == 404 => Ok(false),
            Err(error) => Err(error.into()),
        }
    }
}

fn key<K: ResourceExt>(obj: &K) -> Result<(String, String), Error> {
    let namespace = obj.namespace().ok_or(Error::MissingNamespace)?;
    Ok((namespace, obj.name_any()))
}
