use std::fmt::{Display, Formatter};

pub trait MenuChoice: Copy + Eq + 'static {
    const ALL: &'static [Self];

    fn title(self) -> &'static str;

    fn titles() -> Vec<String> {
        Self::ALL
            .iter()
            .map(|choice| choice.title().to_string())
            .collect()
    }

    fn from_title(title: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|choice| choice.title() == title)
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum ContextMenu {
    GetCurrent,
    List,
    Set,
}

impl MenuChoice for ContextMenu {
    const ALL: &'static [Self] = &[Self::GetCurrent, Self::List, Self::Set];

    fn title(self) -> &'static str {
        match self {
            Self::GetCurrent => "Get current context",
            Self::List => "List contexts",
            Self::Set => "Set context",
        }
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum NamespaceMenu {
    GetCurrent,
    List,
    Set,
}

impl MenuChoice for NamespaceMenu {
    const ALL: &'static [Self] = &[Self::GetCurrent, Self::List, Self::Set];

    fn title(self) -> &'static str {
        match self {
            Self::GetCurrent => "Get current namespace",
            Self::List => "List namespaces",
            Self::Set => "Set namespace",
        }
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum PodMenu {
    ListPods,
    ListContainers,
    OpenShell,
}

impl MenuChoice for PodMenu {
    const ALL: &'static [Self] = &[Self::ListPods, Self::ListContainers, Self::OpenShell];

    fn title(self) -> &'static str {
        match self {
            Self::ListPods => "List pods",
            Self::ListContainers => "List containers for a pod",
            Self::OpenShell => "Open a shell in a container",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerRef {
    pub namespace: String,
    pub pod: String,
    pub container: String,
}

impl Display for ContainerRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.namespace, self.pod, self.container)
    }
}
