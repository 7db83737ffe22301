use anyhow::{Context, Result, bail};
use std::io::Write;
use std::time::Duration;
use tracing::{debug, info};

use crate::cli::{Command, ContextAction, NamespaceAction, PodAction};
use crate::config::KubeconfigStore;
use crate::k8s::{ClusterApi, DEFAULT_REQUEST_TIMEOUT, KubeGateway};
use crate::model::{ContainerRef, ContextMenu, MenuChoice, NamespaceMenu, PodMenu};
use crate::picker::Prompt;

type DynCluster = dyn ClusterApi + Send + Sync;

#[derive(Debug, Clone, Copy)]
pub struct Settings {
    pub request_timeout: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

pub struct Session<'a, P, W> {
    store: &'a KubeconfigStore,
    settings: Settings,
    prompt: P,
    out: W,
    cluster: Option<Box<DynCluster>>,
}

impl<'a, P, W> Session<'a, P, W>
where
    P: Prompt,
    W: Write,
{
    pub fn new(store: &'a KubeconfigStore, settings: Settings, prompt: P, out: W) -> Self {
        Self {
            store,
            settings,
            prompt,
            out,
            cluster: None,
        }
    }

    #[cfg(test)]
    pub fn with_cluster(mut self, cluster: impl ClusterApi + Send + Sync + 'static) -> Self {
        self.cluster = Some(Box::new(cluster));
        self
    }

    #[cfg(test)]
    pub fn into_parts(self) -> (P, W) {
        (self.prompt, self.out)
    }

    pub async fn run(&mut self, command: Command) -> Result<()> {
        match command {
            Command::Context { action } => self.context(action),
            Command::Namespace { action } => self.namespace(action).await,
            Command::Pod { action } => self.pod(action).await,
        }
    }

    async fn cluster(&mut self) -> Result<&DynCluster> {
        let cluster = match self.cluster.take() {
            Some(cluster) => cluster,
            None => {
                let entry = self.store.current_entry()?;
                debug!(
                    "context {} targets cluster {} as {}",
                    entry.name,
                    entry.cluster,
                    entry.user.as_deref().unwrap_or("-")
                );
                let gateway =
                    KubeGateway::connect(self.store, &entry.name, self.settings.request_timeout)
                        .await?;
                Box::new(gateway)
            }
        };
        Ok(&**self.cluster.insert(cluster))
    }

    fn choose<M: MenuChoice>(&mut self, title: &str) -> Result<Option<M>> {
        let Some(answer) = self.prompt.select(title, &M::titles(), None)? else {
            return Ok(None);
        };
        M::from_title(&answer)
            .with_context(|| format!("unknown menu option '{answer}'"))
            .map(Some)
    }

    fn print_lines(&mut self, lines: &[String]) -> Result<()> {
        for line in lines {
            writeln!(self.out, "{line}")?;
        }
        Ok(())
    }

    fn context(&mut self, action: Option<ContextAction>) -> Result<()> {
        match action {
            Some(ContextAction::List) => self.context_list(),
            Some(ContextAction::Get) => self.context_get(),
            Some(ContextAction::Set { context }) => self.context_set(&context),
            None => self.context_menu(),
        }
    }

    fn context_menu(&mut self) -> Result<()> {
        let Some(choice) = self.choose::<ContextMenu>("Select an option")? else {
            return Ok(());
        };
        match choice {
            ContextMenu::GetCurrent => self.context_get(),
            ContextMenu::List => self.context_list(),
            ContextMenu::Set => {
                let names = self.store.context_names()?;
                if names.is_empty() {
                    bail!("no contexts found in kubeconfig");
                }
                let current = self.store.current_context().ok();
                match self
                    .prompt
                    .select("Select a context", &names, current.as_deref())?
                {
                    Some(context) => self.context_set(&context),
                    None => Ok(()),
                }
            }
        }
    }

    fn context_list(&mut self) -> Result<()> {
        let names = self.store.context_names()?;
        if names.is_empty() {
            writeln!(self.out, "No contexts found in kubeconfig.")?;
            return Ok(());
        }
        self.print_lines(&names)
    }

    fn context_get(&mut self) -> Result<()> {
        let current = self.store.current_context()?;
        writeln!(self.out, "{current}")?;
        Ok(())
    }

    fn context_set(&mut self, context: &str) -> Result<()> {
        self.store.set_current_context(context)?;
        info!("switched context to {context}");
        writeln!(self.out, "Current context set to: {context}")?;
        Ok(())
    }

    async fn namespace(&mut self, action: Option<NamespaceAction>) -> Result<()> {
        match action {
            Some(NamespaceAction::List) => self.namespace_list().await,
            Some(NamespaceAction::Get) => self.namespace_get(),
            Some(NamespaceAction::Set { namespace }) => self.namespace_set(&namespace),
            None => self.namespace_menu().await,
        }
    }

    async fn namespace_menu(&mut self) -> Result<()> {
        let Some(choice) = self.choose::<NamespaceMenu>("Select an option")? else {
            return Ok(());
        };
        match choice {
            NamespaceMenu::GetCurrent => self.namespace_get(),
            NamespaceMenu::List => self.namespace_list().await,
            NamespaceMenu::Set => {
                let namespaces = self.cluster().await?.list_namespaces().await?;
                if namespaces.is_empty() {
                    bail!("no namespaces found in cluster");
                }
                let current = self.store.current_namespace().ok();
                match self
                    .prompt
                    .select("Select a namespace", &namespaces, current.as_deref())?
                {
                    Some(namespace) => self.namespace_set(&namespace),
                    None => Ok(()),
                }
            }
        }
    }

    async fn namespace_list(&mut self) -> Result<()> {
        let namespaces = self.cluster().await?.list_namespaces().await?;
        self.print_lines(&namespaces)
    }

    fn namespace_get(&mut self) -> Result<()> {
        let namespace = self.store.current_namespace()?;
        writeln!(self.out, "{namespace}")?;
        Ok(())
    }

    fn namespace_set(&mut self, namespace: &str) -> Result<()> {
        self.store.set_namespace(namespace)?;
        info!("switched namespace to {namespace}");
        writeln!(self.out, "Current namespace set to: {namespace}")?;
        Ok(())
    }

    async fn pod(&mut self, action: Option<PodAction>) -> Result<()> {
        match action {
            Some(PodAction::List) => self.pod_list().await,
            Some(PodAction::ListContainers { pod }) => self.pod_list_containers(&pod).await,
            Some(PodAction::Exec { pod, container }) => self.pod_exec(&pod, container).await,
            None => self.pod_menu().await,
        }
    }

    async fn pod_menu(&mut self) -> Result<()> {
        let namespace = self.store.current_namespace()?;
        let title = format!("Select an option (namespace: {namespace})");
        let Some(choice) = self.choose::<PodMenu>(&title)? else {
            return Ok(());
        };
        if choice == PodMenu::ListPods {
            return self.pod_list().await;
        }

        let Some(pod) = self.pick_pod(&namespace).await? else {
            return Ok(());
        };
        match choice {
            PodMenu::ListContainers => self.pod_list_containers(&pod).await,
            _ => {
                let containers = self
                    .cluster()
                    .await?
                    .list_containers(&namespace, &pod)
                    .await?;
                let container = match containers.as_slice() {
                    [] => bail!("pod {pod} in namespace {namespace} has no containers"),
                    [only] => Some(only.clone()),
                    _ => self.prompt.select(
                        &format!("Select a container (pod: {pod})"),
                        &containers,
                        None,
                    )?,
                };
                match container {
                    Some(container) => self.pod_exec(&pod, Some(container)).await,
                    None => Ok(()),
                }
            }
        }
    }

    async fn pick_pod(&mut self, namespace: &str) -> Result<Option<String>> {
        let pods = self.cluster().await?.list_pods(namespace).await?;
        if pods.is_empty() {
            bail!("no pods found in namespace {namespace}");
        }
        self.prompt.select(
            &format!("Select a pod (namespace: {namespace})"),
            &pods,
            None,
        )
    }

    async fn pod_list(&mut self) -> Result<()> {
        let namespace = self.store.current_namespace()?;
        let pods = self.cluster().await?.list_pods(&namespace).await?;
        self.print_lines(&pods)
    }

    async fn pod_list_containers(&mut self, pod: &str) -> Result<()> {
        let namespace = self.store.current_namespace()?;
        let containers = self
            .cluster()
            .await?
            .list_containers(&namespace, pod)
            .await?;
        self.print_lines(&containers)
    }

    async fn pod_exec(&mut self, pod: &str, container: Option<String>) -> Result<()> {
        let namespace = self.store.current_namespace()?;
        let container = match container {
            Some(container) => container,
            None => {
                let first = self
                    .cluster()
                    .await?
                    .list_containers(&namespace, pod)
                    .await?
                    .into_iter()
                    .next()
                    .with_context(|| {
                        format!("pod {pod} in namespace {namespace} has no containers")
                    })?;
                debug!("defaulting to container {first}");
                first
            }
        };

        let target = ContainerRef {
            namespace,
            pod: pod.to_string(),
            container,
        };
        self.out.flush()?;
        self.cluster().await?.exec_shell(&target).await
    }
}
