use anyhow::{Context, Result};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Namespace, Pod};
use kube::api::{AttachParams, ListParams};
use kube::config::KubeConfigOptions;
use kube::{Api, Client, Config, ResourceExt};
use std::future::Future;
use std::time::Duration;
use tokio::time::timeout;
use tracing::debug;

use crate::config::KubeconfigStore;
use crate::model::ContainerRef;
use crate::shell;

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[async_trait]
pub trait ClusterApi {
    async fn list_namespaces(&self) -> Result<Vec<String>>;
    async fn list_pods(&self, namespace: &str) -> Result<Vec<String>>;
    async fn list_containers(&self, namespace: &str, pod_name: &str) -> Result<Vec<String>>;
    async fn exec_shell(&self, target: &ContainerRef) -> Result<()>;
}

#[derive(Clone)]
pub struct KubeGateway {
    client: Client,
    context: String,
    request_timeout: Duration,
}

impl KubeGateway {
    pub async fn connect(
        store: &KubeconfigStore,
        context: &str,
        request_timeout: Duration,
    ) -> Result<Self> {
        let kubeconfig = store.load()?;
        let options = KubeConfigOptions {
            context: Some(context.to_string()),
            cluster: None,
            user: None,
        };
        let mut config = Config::from_custom_kubeconfig(kubeconfig, &options)
            .await
            .with_context(|| {
                format!(
                    "unable to load kubeconfig from {} for context '{context}'",
                    store.path().display()
                )
            })?;
        apply_timeouts(&mut config, request_timeout);
        debug!("connecting to {} via context {context}", config.cluster_url);

        let client = Client::try_from(config).context("unable to create a client")?;
        Ok(Self {
            client,
            context: context.to_string(),
            request_timeout,
        })
    }

    async fn bounded<T, F>(&self, what: &str, request: F) -> Result<T>
    where
        F: Future<Output = Result<T, kube::Error>>,
    {
        match timeout(self.request_timeout, request).await {
            Ok(result) => result.with_context(|| format!("unable to {what}")),
            Err(_) => anyhow::bail!(
                "unable to {what}: request timed out after {}s",
                self.request_timeout.as_secs()
            ),
        }
    }
}

#[async_trait]
impl ClusterApi for KubeGateway {
    async fn list_namespaces(&self) -> Result<Vec<String>> {
        debug!("listing namespaces");
        let api: Api<Namespace> = Api::all(self.client.clone());
        let list = self
            .bounded("get namespaces", api.list(&ListParams::default()))
            .await?;
        Ok(resource_names(list))
    }

    async fn list_pods(&self, namespace: &str) -> Result<Vec<String>> {
        debug!("listing pods in {namespace}");
        let api: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        let list = self
            .bounded("get pods", api.list(&ListParams::default()))
            .await?;
        Ok(resource_names(list))
    }

    async fn list_containers(&self, namespace: &str, pod_name: &str) -> Result<Vec<String>> {
        debug!("fetching pod {namespace}/{pod_name}");
        let api: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        let pod = self
            .bounded(
                &format!("get pod {pod_name} in namespace {namespace}"),
                api.get(pod_name),
            )
            .await?;
        Ok(container_names(&pod))
    }

    async fn exec_shell(&self, target: &ContainerRef) -> Result<()> {
        debug!("opening shell in {target} via context {}", self.context);
        let api: Api<Pod> = Api::namespaced(self.client.clone(), &target.namespace);
        let params = AttachParams::interactive_tty().container(target.container.as_str());
        let attached = api
            .exec(&target.pod, shell::shell_command(), &params)
            .await
            .with_context(|| format!("unable to create executor for {target}"))?;
        shell::attach(attached).await?;
        debug!("shell session in {target} closed");
        Ok(())
    }
}

// List and get calls are bounded per request in `bounded`. A socket read
// timeout would also apply to the upgraded exec stream and cut idle shells.
fn apply_timeouts(config: &mut Config, request_timeout: Duration) {
    config.connect_timeout = Some(request_timeout);
    config.read_timeout = None;
}

fn resource_names<K, I>(items: I) -> Vec<String>
where
    K: ResourceExt,
    I: IntoIterator<Item = K>,
{
    items.into_iter().map(|item| item.name_any()).collect()
}

fn container_names(pod: &Pod) -> Vec<String> {
    pod.spec
        .as_ref()
        .map(|spec| {
            spec.containers
                .iter()
                .map(|container| container.name.clone())
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
pub(crate) mod testing {
    use super::ClusterApi;
    use crate::model::ContainerRef;
    use anyhow::{Result, bail};
    use async_trait::async_trait;
    use std::collections::BTreeMap;
    use std::sync::{Arc, Mutex};

    #[derive(Debug, Default)]
    pub struct FakeCluster {
        pub namespaces: Vec<String>,
        pub pods: BTreeMap<String, BTreeMap<String, Vec<String>>>,
        pub execs: Arc<Mutex<Vec<ContainerRef>>>,
    }

    impl FakeCluster {
        pub fn with_namespaces(names: &[&str]) -> Self {
            Self {
                namespaces: names.iter().map(|name| name.to_string()).collect(),
                ..Self::default()
            }
        }

        pub fn with_pod(mut self, namespace: &str, pod: &str, containers: &[&str]) -> Self {
            self.pods.entry(namespace.to_string()).or_default().insert(
                pod.to_string(),
                containers.iter().map(|name| name.to_string()).collect(),
            );
            self
        }

        pub fn exec_log(&self) -> Arc<Mutex<Vec<ContainerRef>>> {
            Arc::clone(&self.execs)
        }
    }

    #[async_trait]
    impl ClusterApi for FakeCluster {
        async fn list_namespaces(&self) -> Result<Vec<String>> {
            Ok(self.namespaces.clone())
        }

        async fn list_pods(&self, namespace: &str) -> Result<Vec<String>> {
            Ok(self
                .pods
                .get(namespace)
                .map(|pods| pods.keys().cloned().collect())
                .unwrap_or_default())
        }

        async fn list_containers(&self, namespace: &str, pod_name: &str) -> Result<Vec<String>> {
            match self.pods.get(namespace).and_then(|pods| pods.get(pod_name)) {
                Some(containers) => Ok(containers.clone()),
                None => bail!("unable to get pod {pod_name} in namespace {namespace}"),
            }
        }

        async fn exec_shell(&self, target: &ContainerRef) -> Result<()> {
            let containers = self.list_containers(&target.namespace, &target.pod).await?;
            if !containers.contains(&target.container) {
                bail!("container {} not found in pod {}", target.container, target.pod);
            }
            if let Ok(mut calls) = self.execs.lock() {
                calls.push(target.clone());
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::FakeCluster;
    use super::{ClusterApi, apply_timeouts, container_names, resource_names};
    use k8s_openapi::api::core::v1::{Container, Namespace, Pod, PodSpec};
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
    use kube::Config;
    use std::time::Duration;

    fn namespace(name: &str) -> Namespace {
        Namespace {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                ..ObjectMeta::default()
            },
            ..Namespace::default()
        }
    }

    #[test]
    fn names_follow_list_order() {
        let names = resource_names(vec![namespace("default"), namespace("kube-system")]);
        assert_eq!(names, vec!["default", "kube-system"]);
    }

    #[test]
    fn containers_follow_spec_order() {
        let pod = Pod {
            spec: Some(PodSpec {
                containers: vec![
                    Container {
                        name: "app".to_string(),
                        ..Container::default()
                    },
                    Container {
                        name: "sidecar".to_string(),
                        ..Container::default()
                    },
                ],
                ..PodSpec::default()
            }),
            ..Pod::default()
        };
        assert_eq!(container_names(&pod), vec!["app", "sidecar"]);
        assert!(container_names(&Pod::default()).is_empty());
    }

    #[tokio::test]
    async fn fake_cluster_lists_namespaces() {
        let cluster = FakeCluster::with_namespaces(&["default", "kube-system"]);
        assert_eq!(
            cluster.list_namespaces().await.unwrap(),
            vec!["default", "kube-system"]
        );
    }

    #[test]
    fn request_timeout_leaves_exec_streams_unbounded() {
        let mut config = Config::new("https://127.0.0.1:6443".parse().unwrap());
        config.read_timeout = Some(Duration::from_secs(295));

        apply_timeouts(&mut config, Duration::from_secs(1));

        assert_eq!(config.connect_timeout, Some(Duration::from_secs(1)));
        assert_eq!(config.read_timeout, None);
    }
}
