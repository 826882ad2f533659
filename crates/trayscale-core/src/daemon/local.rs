// Local API client.
//
// Wraps `reqwest::Client` with the daemon's URL layout, masked-prefs
// editing, and the CLI fallback for connect/disconnect and netcheck.

use async_trait::async_trait;
use futures::TryStreamExt;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tokio_util::io::{ReaderStream, StreamReader};
use tokio_util::sync::CancellationToken;
use tracing::debug;
use url::Url;

use super::cli::CliRunner;
use super::{Daemon, FileReader, StatusFields, scoped, wire};
use crate::config::{DaemonConfig, Endpoint};
use crate::convert;
use crate::error::CoreError;
use crate::model::prefs::normalize_routes;
use crate::model::{
    DerpMap, NetCheckReport, PeerInfo, Prefs, ProfileId, Profiles, RoutePrefix, StableNodeId,
    WaitingFile,
};

/// Host header the daemon expects on its socket.
const SOCKET_HOST: &str = "http://local-tailscaled.sock/";

/// The production [`Daemon`]: local API over the daemon socket plus the CLI.
pub struct LocalDaemon {
    http: reqwest::Client,
    base_url: Url,
    cli: CliRunner,
}

impl LocalDaemon {
    pub fn new(config: &DaemonConfig) -> Result<Self, CoreError> {
        let builder = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .user_agent(concat!("trayscale/", env!("CARGO_PKG_VERSION")));

        let (builder, base_url) = match &config.endpoint {
            #[cfg(unix)]
            Endpoint::UnixSocket(path) => (builder.unix_socket(path.clone()), SOCKET_HOST),
            #[cfg(not(unix))]
            Endpoint::UnixSocket(_) => {
                return Err(CoreError::DaemonUnavailable {
                    op: "connect",
                    reason: "unix sockets are not supported on this platform".into(),
                });
            }
            Endpoint::Http(url) => (builder, url.as_str()),
        };

        let base_url = Url::parse(base_url).map_err(|e| CoreError::invalid("connect", e.to_string()))?;
        let http = builder.build().map_err(|e| CoreError::DaemonUnavailable {
            op: "connect",
            reason: format!("failed to build HTTP client: {e}"),
        })?;

        Ok(Self {
            http,
            base_url,
            cli: CliRunner::new(config.command.clone()),
        })
    }

    pub fn cli(&self) -> &CliRunner {
        &self.cli
    }

    // ── URL builders ─────────────────────────────────────────────────

    /// `{base}/localapi/v0/{segments...}` with each segment escaped.
    fn api_url(&self, op: &'static str, segments: &[&str]) -> Result<Url, CoreError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| CoreError::InternalInvariant {
                op,
                message: format!("base URL {} cannot hold a path", self.base_url),
            })?
            .pop_if_empty()
            .extend(["localapi", "v0"])
            .extend(segments);
        Ok(url)
    }

    // ── Request helpers ──────────────────────────────────────────────

    async fn send(
        &self,
        op: &'static str,
        scope: &CancellationToken,
        req: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, CoreError> {
        scoped(op, scope, async {
            let resp = req
                .send()
                .await
                .map_err(|e| CoreError::from_http(op, &e))?;
            let status = resp.status();
            if status.is_success() {
                return Ok(resp);
            }
            let body = resp.text().await.unwrap_or_default();
            Err(CoreError::DaemonRejected {
                op,
                status: status.as_u16(),
                message: body.trim().to_owned(),
            })
        })
        .await
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        op: &'static str,
        scope: &CancellationToken,
        url: Url,
    ) -> Result<T, CoreError> {
        debug!(op, %url, "GET");
        let resp = self.send(op, scope, self.http.get(url)).await?;
        scoped(op, scope, async {
            resp.json::<T>()
                .await
                .map_err(|e| CoreError::from_http(op, &e))
        })
        .await
    }

    /// The daemon's prefs exactly as it reports them.
    async fn raw_prefs(&self, op: &'static str, scope: &CancellationToken) -> Result<Value, CoreError> {
        let url = self.api_url(op, &["prefs"])?;
        self.get_json(op, scope, url).await
    }

    /// `PATCH /prefs` with a masked prefs body.
    async fn edit_prefs(
        &self,
        op: &'static str,
        scope: &CancellationToken,
        masked: Value,
    ) -> Result<(), CoreError> {
        let url = self.api_url(op, &["prefs"])?;
        debug!(op, %url, body = %masked, "PATCH");
        self.send(op, scope, self.http.patch(url).json(&masked))
            .await
            .map(drop)
    }

    async fn write_routes(
        &self,
        op: &'static str,
        scope: &CancellationToken,
        routes: &[RoutePrefix],
        exit: bool,
    ) -> Result<(), CoreError> {
        let mut all = normalize_routes(routes.iter().copied());
        if exit {
            all.extend(RoutePrefix::exit_routes());
        }
        let all: Vec<String> = all.iter().map(ToString::to_string).collect();
        self.edit_prefs(
            op,
            scope,
            json!({ "AdvertiseRoutes": all, "AdvertiseRoutesSet": true }),
        )
        .await
    }
}

#[async_trait]
impl Daemon for LocalDaemon {
    async fn status(&self, scope: &CancellationToken) -> Result<StatusFields, CoreError> {
        let url = self.api_url("status", &["status"])?;
        let raw: wire::Status = self.get_json("status", scope, url).await?;
        Ok(convert::status_fields(&raw))
    }

    async fn prefs(&self, scope: &CancellationToken) -> Result<Prefs, CoreError> {
        let url = self.api_url("prefs", &["prefs"])?;
        let raw: wire::Prefs = self.get_json("prefs", scope, url).await?;
        Ok(convert::prefs(&raw))
    }

    async fn start(&self, scope: &CancellationToken) -> Result<(), CoreError> {
        self.cli.run("start", scope, &["up"], &[]).await.map(drop)
    }

    async fn stop(&self, scope: &CancellationToken) -> Result<(), CoreError> {
        self.cli.run("stop", scope, &["down"], &[]).await.map(drop)
    }

    async fn start_login(&self, scope: &CancellationToken) -> Result<(), CoreError> {
        const OP: &str = "start_login";
        let url = self.api_url(OP, &["login-interactive"])?;
        self.send(OP, scope, self.http.post(url)).await.map(drop)
    }

    async fn set_exit_node(
        &self,
        scope: &CancellationToken,
        peer: Option<&PeerInfo>,
    ) -> Result<(), CoreError> {
        const OP: &str = "set_exit_node";
        let body = match peer {
            None => json!({
                "ExitNodeID": "",
                "ExitNodeIP": "",
                "ExitNodeIDSet": true,
                "ExitNodeIPSet": true,
            }),
            Some(peer) => {
                let addr = peer.addresses.first().ok_or_else(|| {
                    CoreError::invalid(OP, format!("{} has no address", peer.display_name))
                })?;
                json!({
                    "ExitNodeID": "",
                    "ExitNodeIP": addr.to_string(),
                    "ExitNodeIDSet": true,
                    "ExitNodeIPSet": true,
                })
            }
        };
        self.edit_prefs(OP, scope, body).await
    }

    async fn set_use_exit_node(
        &self,
        scope: &CancellationToken,
        enabled: bool,
    ) -> Result<(), CoreError> {
        const OP: &str = "set_use_exit_node";
        let mut url = self.api_url(OP, &["set-use-exit-node-enabled"])?;
        url.query_pairs_mut()
            .append_pair("enabled", if enabled { "true" } else { "false" });
        self.send(OP, scope, self.http.post(url)).await.map(drop)
    }

    async fn advertise_exit_node(
        &self,
        scope: &CancellationToken,
        enabled: bool,
    ) -> Result<(), CoreError> {
        const OP: &str = "advertise_exit_node";
        let current = self.prefs(scope).await.map_err(|e| retag(OP, e))?;
        self.write_routes(OP, scope, &current.advertise_routes, enabled)
            .await
    }

    async fn advertise_routes(
        &self,
        scope: &CancellationToken,
        routes: &[RoutePrefix],
    ) -> Result<(), CoreError> {
        const OP: &str = "advertise_routes";
        let current = self.prefs(scope).await.map_err(|e| retag(OP, e))?;
        self.write_routes(OP, scope, routes, current.advertises_exit_node)
            .await
    }

    async fn set_allow_lan_access(
        &self,
        scope: &CancellationToken,
        allow: bool,
    ) -> Result<(), CoreError> {
        self.edit_prefs(
            "set_allow_lan_access",
            scope,
            json!({ "ExitNodeAllowLANAccess": allow, "ExitNodeAllowLANAccessSet": true }),
        )
        .await
    }

    async fn set_accept_routes(
        &self,
        scope: &CancellationToken,
        accept: bool,
    ) -> Result<(), CoreError> {
        self.edit_prefs(
            "set_accept_routes",
            scope,
            json!({ "RouteAll": accept, "RouteAllSet": true }),
        )
        .await
    }

    async fn set_control_url(&self, scope: &CancellationToken, url: &str) -> Result<(), CoreError> {
        const OP: &str = "set_control_url";
        let mut prefs = self.raw_prefs(OP, scope).await?;
        let Some(fields) = prefs.as_object_mut() else {
            return Err(CoreError::DaemonRejected {
                op: OP,
                status: 200,
                message: "prefs response is not an object".into(),
            });
        };
        fields.insert("ControlURL".into(), Value::String(url.to_owned()));

        let start = self.api_url(OP, &["start"])?;
        let body = wire::StartOptions {
            update_prefs: prefs,
        };
        self.send(OP, scope, self.http.post(start).json(&body))
            .await
            .map(drop)
    }

    async fn profiles(&self, scope: &CancellationToken) -> Result<Profiles, CoreError> {
        const OP: &str = "profiles";
        let url = self.api_url(OP, &["profiles", "current"])?;
        let current: wire::LoginProfile = self.get_json(OP, scope, url).await?;
        // The list lives at `profiles/`, trailing slash included.
        let url = self.api_url(OP, &["profiles", ""])?;
        let all: Option<Vec<wire::LoginProfile>> = self.get_json(OP, scope, url).await?;
        Ok(convert::profiles(current, all.unwrap_or_default()))
    }

    async fn switch_profile(
        &self,
        scope: &CancellationToken,
        id: &ProfileId,
    ) -> Result<(), CoreError> {
        const OP: &str = "switch_profile";
        let url = self.api_url(OP, &["profiles", id.as_str()])?;
        debug!(op = OP, %url, "POST");
        self.send(OP, scope, self.http.post(url)).await.map(drop)
    }

    async fn net_check(
        &self,
        scope: &CancellationToken,
        full: bool,
    ) -> Result<(NetCheckReport, DerpMap), CoreError> {
        const OP: &str = "net_check";
        debug!(full, "running netcheck");
        let mut args = vec!["netcheck", "--format=json"];
        if full {
            args.push("--verbose");
        }
        let output = self.cli.run(OP, scope, &args, &[]).await?;
        let raw: wire::NetcheckReport =
            serde_json::from_str(output.stdout.trim()).map_err(|e| CoreError::CliFailed {
                op: OP,
                status: "unparsable report".into(),
                output: format!("{e}: {}", output.combined().trim()),
            })?;

        let url = self.api_url(OP, &["derpmap"])?;
        let map: wire::DerpMap = self.get_json(OP, scope, url).await?;

        Ok((convert::netcheck(&raw), convert::derp_map(&map)))
    }

    async fn push_file(
        &self,
        scope: &CancellationToken,
        node: &StableNodeId,
        size: u64,
        name: &str,
        body: FileReader,
    ) -> Result<(), CoreError> {
        const OP: &str = "push_file";
        if name.is_empty() {
            return Err(CoreError::invalid(OP, "file name is empty"));
        }
        let url = self.api_url(OP, &["file-put", node.as_str(), name])?;
        debug!(%url, size, "PUT");
        let body = reqwest::Body::wrap_stream(ReaderStream::new(body));
        let req = self
            .http
            .put(url)
            .header(reqwest::header::CONTENT_LENGTH, size)
            .body(body);
        self.send(OP, scope, req).await.map(drop)
    }

    async fn await_waiting_files(
        &self,
        scope: &CancellationToken,
    ) -> Result<Vec<WaitingFile>, CoreError> {
        const OP: &str = "await_waiting_files";
        let mut url = self.api_url(OP, &["files", ""])?;
        url.query_pairs_mut().append_pair("waitsec", "1");
        let raw: Option<Vec<wire::WaitingFile>> = self.get_json(OP, scope, url).await?;
        Ok(convert::waiting_files(raw.unwrap_or_default()))
    }

    async fn get_waiting_file(
        &self,
        scope: &CancellationToken,
        name: &str,
    ) -> Result<(FileReader, u64), CoreError> {
        const OP: &str = "get_waiting_file";
        let url = self.api_url(OP, &["files", name])?;
        let resp = self.send(OP, scope, self.http.get(url)).await?;
        let size = resp.content_length().unwrap_or(0);
        let stream = resp.bytes_stream().map_err(std::io::Error::other);
        let reader: FileReader = Box::pin(StreamReader::new(stream));
        Ok((reader, size))
    }

    async fn delete_waiting_file(
        &self,
        scope: &CancellationToken,
        name: &str,
    ) -> Result<(), CoreError> {
        const OP: &str = "delete_waiting_file";
        let url = self.api_url(OP, &["files", name])?;
        self.send(OP, scope, self.http.delete(url)).await.map(drop)
    }
}

/// Re-tag an error from a nested read with the outer operation's name.
fn retag(op: &'static str, err: CoreError) -> CoreError {
    match err {
        CoreError::DaemonUnavailable { reason, .. } => CoreError::DaemonUnavailable { op, reason },
        CoreError::DaemonRejected {
            status, message, ..
        } => CoreError::DaemonRejected {
            op,
            status,
            message,
        },
        CoreError::CliFailed { status, output, .. } => CoreError::CliFailed { op, status, output },
        CoreError::InvalidInput { message, .. } => CoreError::InvalidInput { op, message },
        CoreError::Cancelled { .. } => CoreError::Cancelled { op },
        CoreError::InternalInvariant { message, .. } => {
            CoreError::InternalInvariant { op, message }
        }
    }
}
