use anyhow::{Context, Result, bail};
use kube::config::Kubeconfig;
use serde_yaml::{Mapping, Value};
use std::ffi::OsString;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const DEFAULT_NAMESPACE: &str = "default";

const CURRENT_CONTEXT_KEY: &str = "current-context";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextEntry {
    pub name: String,
    pub cluster: String,
    pub user: Option<String>,
    pub namespace: Option<String>,
}

#[derive(Debug, Clone)]
pub struct KubeconfigStore {
    path: PathBuf,
}

impl KubeconfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn discover(explicit: Option<PathBuf>) -> Result<Self> {
        let path = resolve_kubeconfig_path(
            explicit,
            std::env::var_os("KUBECONFIG"),
            dirs::home_dir(),
        )?;
        debug!("using kubeconfig {}", path.display());
        Ok(Self::new(path))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<Kubeconfig> {
        Kubeconfig::read_from(&self.path)
            .with_context(|| format!("could not load kubeconfig {}", self.path.display()))
    }

    pub fn contexts(&self) -> Result<Vec<ContextEntry>> {
        let kubeconfig = self.load()?;
        let mut entries = kubeconfig
            .contexts
            .iter()
            .map(|named| {
                let context = named.context.as_ref();
                ContextEntry {
                    name: named.name.clone(),
                    cluster: context
                        .map(|context| context.cluster.clone())
                        .unwrap_or_default(),
                    user: context.and_then(|context| context.user.clone()),
                    namespace: context.and_then(|context| context.namespace.clone()),
                }
            })
            .collect::<Vec<_>>();
        entries.sort_by(|left, right| left.name.cmp(&right.name));
        Ok(entries)
    }

    pub fn context_names(&self) -> Result<Vec<String>> {
        Ok(self
            .contexts()?
            .into_iter()
            .map(|entry| entry.name)
            .collect())
    }

    pub fn current_context(&self) -> Result<String> {
        self.current_entry().map(|entry| entry.name)
    }

    pub fn current_entry(&self) -> Result<ContextEntry> {
        let kubeconfig = self.load()?;
        let Some(current) = kubeconfig
            .current_context
            .filter(|name| !name.trim().is_empty())
        else {
            bail!(
                "no current context set in kubeconfig {}",
                self.path.display()
            );
        };

        self.contexts()?
            .into_iter()
            .find(|entry| entry.name == current)
            .with_context(|| format!("current context '{current}' does not exist in kubeconfig"))
    }

    pub fn current_namespace(&self) -> Result<String> {
        let entry = self.current_entry()?;
        Ok(entry
            .namespace
            .filter(|namespace| !namespace.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_NAMESPACE.to_string()))
    }

    pub fn set_current_context(&self, name: &str) -> Result<()> {
        let mut document = self.load_document()?;
        if find_context_mut(&mut document, name).is_none() {
            bail!("context '{name}' does not exist");
        }

        document.insert(
            Value::String(CURRENT_CONTEXT_KEY.to_string()),
            Value::String(name.to_string()),
        );
        self.persist(&document)?;
        debug!("current context set to {name}");
        Ok(())
    }

    pub fn set_namespace(&self, namespace: &str) -> Result<()> {
        let namespace = namespace.trim();
        if namespace.is_empty() {
            bail!("namespace name must not be empty");
        }

        let mut document = self.load_document()?;
        let current = document
            .get(CURRENT_CONTEXT_KEY)
            .and_then(Value::as_str)
            .filter(|name| !name.trim().is_empty())
            .map(str::to_string)
            .with_context(|| {
                format!(
                    "no current context set in kubeconfig {}",
                    self.path.display()
                )
            })?;
        let entry = find_context_mut(&mut document, &current)
            .with_context(|| format!("current context '{current}' does not exist in kubeconfig"))?;

        if !matches!(entry.get("context"), Some(Value::Mapping(_))) {
            entry.insert(
                Value::String("context".to_string()),
                Value::Mapping(Mapping::new()),
            );
        }
        if let Some(Value::Mapping(body)) = entry.get_mut("context") {
            body.insert(
                Value::String("namespace".to_string()),
                Value::String(namespace.to_string()),
            );
        }

        self.persist(&document)?;
        debug!("namespace of context {current} set to {namespace}");
        Ok(())
    }

    fn load_document(&self) -> Result<Mapping> {
        let raw = fs::read_to_string(&self.path)
            .with_context(|| format!("could not read kubeconfig {}", self.path.display()))?;
        let parsed: Value = serde_yaml::from_str(&raw)
            .with_context(|| format!("could not parse kubeconfig {}", self.path.display()))?;
        match parsed {
            Value::Mapping(document) => Ok(document),
            Value::Null => Ok(Mapping::new()),
            _ => bail!("kubeconfig {} is not a YAML mapping", self.path.display()),
        }
    }

    fn persist(&self, document: &Mapping) -> Result<()> {
        let rendered =
            serde_yaml::to_string(document).context("could not serialize kubeconfig")?;
        // Write through symlinks so a linked kubeconfig stays a link.
        let target = fs::canonicalize(&self.path).unwrap_or_else(|_| self.path.clone());
        let dir = target
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));

        let mut staged = tempfile::NamedTempFile::new_in(dir)
            .with_context(|| format!("could not stage kubeconfig in {}", dir.display()))?;
        staged
            .write_all(rendered.as_bytes())
            .context("could not write staged kubeconfig")?;
        staged
            .as_file()
            .sync_all()
            .context("could not flush staged kubeconfig")?;
        if let Ok(metadata) = fs::metadata(&target) {
            fs::set_permissions(staged.path(), metadata.permissions())
                .context("could not copy kubeconfig permissions")?;
        }
        staged
            .persist(&target)
            .with_context(|| format!("could not write kubeconfig {}", target.display()))?;
        if target != self.path {
            debug!("wrote kubeconfig {} through {}", target.display(), self.path.display());
        }
        Ok(())
    }
}

fn find_context_mut<'a>(document: &'a mut Mapping, name: &str) -> Option<&'a mut Mapping> {
    document
        .get_mut("contexts")?
        .as_sequence_mut()?
        .iter_mut()
        .filter_map(Value::as_mapping_mut)
        .find(|item| item.get("name").and_then(Value::as_str) == Some(name))
}

fn resolve_kubeconfig_path(
    explicit: Option<PathBuf>,
    env_value: Option<OsString>,
    home: Option<PathBuf>,
) -> Result<PathBuf> {
    if let Some(path) = explicit.filter(|path| !path.as_os_str().is_empty()) {
        return Ok(path);
    }

    if let Some(value) = env_value
        && let Some(path) =
            std::env::split_paths(&value).find(|path| !path.as_os_str().is_empty())
    {
        return Ok(path);
    }

    let home = home.context("could not determine home directory")?;
    Ok(home.join(".kube").join("config"))
}
