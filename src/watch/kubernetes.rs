//! Kubernetes source for ingresses.
//!
//! Lists through [`kube::Api`] and opens a raw watch from the listed
//! resource version. Events are forwarded over a channel until the watch
//! ends or fails; relisting is left to the watch loop.

use async_trait::async_trait;
use futures::StreamExt;
use futures::stream::BoxStream;
use k8s_openapi::api::networking::v1::Ingress;
use kube::api::{ListParams, WatchEvent as ApiEvent, WatchParams};
use kube::config::{
    AuthInfo, Cluster, Context, KubeConfigOptions, Kubeconfig, NamedAuthInfo, NamedCluster,
    NamedContext,
};
use kube::{Api, Client, Config};
use tokio::sync::mpsc;
use tracing::{debug, info, trace};

use crate::config::KubernetesConfig;
use crate::error::{ConvergeError, Result, WatchError};

use super::source::{ObjectList, Source, WatchEvent};

/// Server-side duration of a single watch. Must stay below 295.
const WATCH_TIMEOUT_SECS: u32 = 290;

/// Events buffered between the forwarding task and the loop.
const EVENT_BUFFER: usize = 64;

/// Status code for an expired resource version.
const GONE: u16 = 410;

const KIND: &str = "ingresses";

const CONTEXT: &str = "converge";

/// Lists and watches ingresses through the Kubernetes API.
#[derive(Clone)]
pub struct KubeSource {
    api: Api<Ingress>,
    namespace: String,
}

impl std::fmt::Debug for KubeSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeSource")
            .field("namespace", &self.namespace)
            .finish_non_exhaustive()
    }
}

fn api_code(error: &kube::Error) -> Option<u16> {
    match error {
        kube::Error::Api(status) => Some(status.code),
        _ => None,
    }
}

fn expired() -> ConvergeError {
    WatchError::Expired {
        kind: String::from(KIND),
    }
    .into()
}

fn list_error(error: &kube::Error) -> ConvergeError {
    let message = match api_code(error) {
        Some(GONE) => return expired(),
        Some(code) => format!("HTTP {code}: {error}"),
        None => error.to_string(),
    };
    WatchError::List {
        kind: String::from(KIND),
        message,
    }
    .into()
}

fn watch_error(message: impl ToString) -> ConvergeError {
    WatchError::Watch {
        kind: String::from(KIND),
        message: message.to_string(),
    }
    .into()
}

fn connect_error(message: impl ToString) -> ConvergeError {
    WatchError::Connect {
        message: message.to_string(),
    }
    .into()
}

/// Kubeconfig for a single API server, optionally with a bearer token.
fn server_kubeconfig(server: &str, token: Option<String>) -> Kubeconfig {
    Kubeconfig {
        clusters: vec![NamedCluster {
            name: String::from(CONTEXT),
            cluster: Some(Cluster {
                server: Some(server.to_string()),
                ..Cluster::default()
            }),
        }],
        contexts: vec![NamedContext {
            name: String::from(CONTEXT),
            context: Some(Context {
                cluster: String::from(CONTEXT),
                user: Some(String::from(CONTEXT)),
                ..Context::default()
            }),
        }],
        auth_infos: vec![NamedAuthInfo {
            name: String::from(CONTEXT),
            auth_info: Some(AuthInfo {
                token: token.map(Into::into),
                ..AuthInfo::default()
            }),
        }],
        current_context: Some(String::from(CONTEXT)),
        ..Kubeconfig::default()
    }
}

/// Maps one API watch event. Bookmarks carry nothing to apply.
fn map_event(event: ApiEvent<Ingress>) -> Option<Result<WatchEvent<Ingress>>> {
    match event {
        ApiEvent::Added(object) => Some(Ok(WatchEvent::Added(object))),
        ApiEvent::Modified(object) => Some(Ok(WatchEvent::Modified(object))),
        ApiEvent::Deleted(object) => Some(Ok(WatchEvent::Deleted(object))),
        ApiEvent::Bookmark(_) => {
            trace!("Watch bookmark");
            None
        }
        ApiEvent::Error(status) if status.code == GONE => Some(Err(expired())),
        ApiEvent::Error(status) => Some(Err(watch_error(format!(
            "HTTP {}: {}",
            status.code, status.message
        )))),
    }
}

/// Forwards events until the watch ends, fails or the receiver goes away.
async fn forward(
    mut stream: BoxStream<'static, kube::Result<ApiEvent<Ingress>>>,
    tx: mpsc::Sender<Result<WatchEvent<Ingress>>>,
) {
    while let Some(item) = stream.next().await {
        let event = match item {
            Ok(event) => match map_event(event) {
                Some(event) => event,
                None => continue,
            },
            Err(e) => Err(watch_error(e)),
        };
        let fatal = event.is_err();
        if tx.send(event).await.is_err() || fatal {
            return;
        }
    }
    debug!("Watch stream ended");
}

impl KubeSource {
    /// Creates a source over `client`. An empty namespace watches every
    /// namespace.
    #[must_use]
    pub fn new(client: Client, namespace: &str) -> Self {
        let api = if namespace.is_empty() {
            Api::all(client)
        } else {
            Api::namespaced(client, namespace)
        };
        Self {
            api,
            namespace: namespace.to_string(),
        }
    }

    /// Connects to a single API server.
    ///
    /// # Errors
    ///
    /// Returns an error if the client cannot be configured.
    pub async fn for_server(server: &str, token: Option<String>, namespace: &str) -> Result<Self> {
        let config =
            Config::from_custom_kubeconfig(server_kubeconfig(server, token), &KubeConfigOptions::default())
                .await
                .map_err(connect_error)?;
        let client = Client::try_from(config).map_err(connect_error)?;
        Ok(Self::new(client, namespace))
    }

    /// Connects as configured: to `server` with the token from `token_env`
    /// when a server is set, otherwise through the kubeconfig (optionally a
    /// named context) or the in-cluster service account.
    ///
    /// # Errors
    ///
    /// Returns an error if no usable configuration is found.
    pub async fn from_config(config: &KubernetesConfig) -> Result<Self> {
        if let Some(server) = &config.server {
            let token = std::env::var(&config.token_env).ok().filter(|t| !t.is_empty());
            if token.is_none() {
                debug!("{} is not set; connecting without a token", config.token_env);
            }
            info!("Connecting to Kubernetes API at {server}");
            return Self::for_server(server, token, &config.namespace).await;
        }

        let client_config = match &config.context {
            Some(context) => {
                info!("Connecting to Kubernetes with context {context}");
                Config::from_kubeconfig(&KubeConfigOptions {
                    context: Some(context.clone()),
                    ..KubeConfigOptions::default()
                })
                .await
                .map_err(connect_error)?
            }
            None => Config::infer().await.map_err(connect_error)?,
        };
        let client = Client::try_from(client_config).map_err(connect_error)?;
        Ok(Self::new(client, &config.namespace))
    }
}

#[async_trait]
impl Source<Ingress> for KubeSource {
    fn kind(&self) -> &str {
        KIND
    }

    async fn list(&self) -> Result<ObjectList<Ingress>> {
        let list = self
            .api
            .list(&ListParams::default())
            .await
            .map_err(|e| list_error(&e))?;
        Ok(ObjectList {
            resource_version: list.metadata.resource_version.unwrap_or_default(),
            items: list.items,
        })
    }

    async fn watch(&self, since: &str) -> Result<mpsc::Receiver<Result<WatchEvent<Ingress>>>> {
        let params = WatchParams::default().timeout(WATCH_TIMEOUT_SECS);
        let stream = self.api.watch(&params, since).await.map_err(|e| match api_code(&e) {
            Some(GONE) => expired(),
            _ => watch_error(e),
        })?;

        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        tokio::spawn(forward(stream.boxed(), tx));
        Ok(rx)
    }
}
