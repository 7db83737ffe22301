use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
#[command(
    name = "kubenav",
    version,
    about = "Interactive Kubernetes CLI.",
    disable_help_subcommand = true
)]
pub struct CliArgs {
    /// Path to the kubeconfig file to use. Falls back to $KUBECONFIG, then ~/.kube/config
    #[arg(long, global = true)]
    pub kubeconfig: Option<PathBuf>,

    /// Timeout in seconds for Kubernetes API requests
    #[arg(short = 't', long, global = true, default_value_t = 30)]
    pub request_timeout: u64,

    /// tracing filter (for example: warn,info,debug)
    #[arg(long, global = true, default_value = "warn")]
    pub log_filter: String,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Manage contexts
    Context {
        #[command(subcommand)]
        action: Option<ContextAction>,
    },
    /// Manage namespaces
    Namespace {
        #[command(subcommand)]
        action: Option<NamespaceAction>,
    },
    /// Manage pods
    Pod {
        #[command(subcommand)]
        action: Option<PodAction>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum ContextAction {
    /// List all contexts
    List,
    /// Get current context
    Get,
    /// Set current context
    Set { context: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum NamespaceAction {
    /// List all namespaces
    List,
    /// Get current namespace
    Get,
    /// Set current namespace
    Set { namespace: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum PodAction {
    /// List all pods in the current namespace
    List,
    /// List all containers of a pod
    ListContainers { pod: String },
    /// Open an interactive shell in a container
    Exec {
        pod: String,
        /// Container name, defaults to the first container of the pod
        container: Option<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::{CliArgs, Command, ContextAction, PodAction};
    use clap::{CommandFactory, Parser};

    #[test]
    fn cli_definition_is_consistent() {
        CliArgs::command().debug_assert();
    }

    #[test]
    fn bare_group_opens_menu() {
        let args = CliArgs::parse_from(["kubenav", "context"]);
        assert_eq!(args.command, Some(Command::Context { action: None }));
        assert_eq!(args.request_timeout, 30);
    }

    #[test]
    fn set_requires_exactly_one_argument() {
        assert!(CliArgs::try_parse_from(["kubenav", "context", "set"]).is_err());
        assert!(CliArgs::try_parse_from(["kubenav", "context", "set", "a", "b"]).is_err());

        let args = CliArgs::parse_from(["kubenav", "context", "set", "prod"]);
        assert_eq!(
            args.command,
            Some(Command::Context {
                action: Some(ContextAction::Set {
                    context: "prod".to_string()
                })
            })
        );
    }

    #[test]
    fn global_flags_follow_subcommands() {
        let args = CliArgs::parse_from([
            "kubenav",
            "pod",
            "exec",
            "web-0",
            "--kubeconfig",
            "/tmp/kc",
            "-t",
            "5",
        ]);
        assert_eq!(args.request_timeout, 5);
        assert_eq!(
            args.kubeconfig.as_deref(),
            Some(std::path::Path::new("/tmp/kc"))
        );
        assert_eq!(
            args.command,
            Some(Command::Pod {
                action: Some(PodAction::Exec {
                    pod: "web-0".to_string(),
                    container: None
                })
            })
        );
    }

    #[test]
    fn list_containers_uses_kebab_case() {
        let args = CliArgs::parse_from(["kubenav", "pod", "list-containers", "web-0"]);
        assert_eq!(
            args.command,
            Some(Command::Pod {
                action: Some(PodAction::ListContainers {
                    pod: "web-0".to_string()
                })
            })
        );
    }
}
