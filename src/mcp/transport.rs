//! Client-side MCP transports: child process over stdio, and streamable HTTP.

use std::future::Future;
use std::pin::Pin;
use std::process::Stdio;
use std::sync::Mutex as StdMutex;
use std::time::Duration;

use eventsource_stream::Eventsource;
use futures::StreamExt;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Client, StatusCode};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::mcp::error::{McpError, McpResult};
use crate::mcp::protocol::{JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, SESSION_ID_HEADER};

/// Default limit for one request/response exchange.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Boxed future type for transport operations.
pub type McpFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A bidirectional JSON-RPC channel to one MCP server.
pub trait McpTransport: Send + Sync {
    /// Send a request and wait for its response.
    ///
    /// # Errors
    /// Returns an error if the exchange fails or the channel closes first.
    fn request(&self, request: JsonRpcRequest) -> McpFuture<'_, McpResult<JsonRpcResponse>>;

    /// Send a notification.
    ///
    /// # Errors
    /// Returns an error if the message cannot be delivered.
    fn notify(&self, notification: JsonRpcNotification) -> McpFuture<'_, McpResult<()>>;

    /// Shut the channel down.
    ///
    /// # Errors
    /// Returns an error if shutdown fails.
    fn close(&self) -> McpFuture<'_, McpResult<()>>;
}

/// Parse `line` as the response to `request`, if it is one.
fn match_response(line: &str, request: &JsonRpcRequest) -> Option<JsonRpcResponse> {
    let value: Value = serde_json::from_str(line).ok()?;
    if value.get("result").is_none() && value.get("error").is_none() {
        return None;
    }
    let response: JsonRpcResponse = serde_json::from_value(value).ok()?;
    (response.id == request.id).then_some(response)
}

struct ChildIo {
    child: Child,
    stdin: Option<ChildStdin>,
    stdout: Lines<BufReader<ChildStdout>>,
}

/// Runs an MCP server as a child process, one JSON message per line.
pub struct StdioTransport {
    command: String,
    timeout: Duration,
    io: Mutex<ChildIo>,
}

impl StdioTransport {
    /// Spawn `command` with `args`. The child is killed when the transport drops.
    ///
    /// # Errors
    /// Returns an error if the process cannot be started.
    pub fn spawn(command: &str, args: &[String]) -> McpResult<Self> {
        let mut child = Command::new(command)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| McpError::Spawn {
                command: command.to_string(),
                source,
            })?;

        let stdin = child.stdin.take().ok_or(McpError::Closed)?;
        let stdout = child.stdout.take().ok_or(McpError::Closed)?;
        debug!(command = %command, pid = ?child.id(), "Spawned MCP server");

        Ok(Self {
            command: command.to_string(),
            timeout: REQUEST_TIMEOUT,
            io: Mutex::new(ChildIo {
                child,
                stdin: Some(stdin),
                stdout: BufReader::new(stdout).lines(),
            }),
        })
    }

    /// Override the per-request limit.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn read_response(&self, io: &mut ChildIo, request: &JsonRpcRequest) -> McpResult<JsonRpcResponse> {
        loop {
            let Some(line) = io.stdout.next_line().await? else {
                return Err(McpError::Closed);
            };
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match match_response(line, request) {
                Some(response) => return Ok(response),
                None => debug!(command = %self.command, line = %line, "Skipping MCP message"),
            }
        }
    }

    async fn write_line(io: &mut ChildIo, payload: &[u8]) -> McpResult<()> {
        let stdin = io.stdin.as_mut().ok_or(McpError::Closed)?;
        stdin.write_all(payload).await?;
        stdin.write_all(b"\n").await?;
        stdin.flush().await?;
        Ok(())
    }
}

impl McpTransport for StdioTransport {
    fn request(&self, request: JsonRpcRequest) -> McpFuture<'_, McpResult<JsonRpcResponse>> {
        Box::pin(async move {
            let payload = serde_json::to_vec(&request)?;
            let mut io = self.io.lock().await;
            Self::write_line(&mut io, &payload).await?;

            match tokio::time::timeout(self.timeout, self.read_response(&mut io, &request)).await {
                Ok(result) => result,
                Err(_) => {
                    warn!(command = %self.command, method = %request.method, "MCP request timed out");
                    Err(McpError::Timeout(self.timeout))
                }
            }
        })
    }

    fn notify(&self, notification: JsonRpcNotification) -> McpFuture<'_, McpResult<()>> {
        Box::pin(async move {
            let payload = serde_json::to_vec(&notification)?;
            let mut io = self.io.lock().await;
            Self::write_line(&mut io, &payload).await
        })
    }

    fn close(&self) -> McpFuture<'_, McpResult<()>> {
        Box::pin(async move {
            let mut io = self.io.lock().await;
            drop(io.stdin.take());
            if tokio::time::timeout(Duration::from_secs(2), io.child.wait())
                .await
                .is_err()
            {
                warn!(command = %self.command, "MCP server did not exit, killing it");
                io.child.kill().await?;
            }
            Ok(())
        })
    }
}

/// Streamable-HTTP MCP transport.
pub struct HttpTransport {
    client: Client,
    url: String,
    session_id: StdMutex<Option<String>>,
}

impl HttpTransport {
    /// Create a transport for the endpoint at `url`.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(url: impl Into<String>) -> McpResult<Self> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            url: url.into(),
            session_id: StdMutex::new(None),
        })
    }

    /// Session id assigned by the server, if any.
    #[must_use]
    pub fn session_id(&self) -> Option<String> {
        self.session_id.lock().ok().and_then(|id| id.clone())
    }

    async fn post(&self, body: Vec<u8>) -> McpResult<reqwest::Response> {
        let mut builder = self
            .client
            .post(&self.url)
            .header(ACCEPT, "application/json, text/event-stream")
            .header(CONTENT_TYPE, "application/json")
            .body(body);
        if let Some(session) = self.session_id() {
            builder = builder.header(SESSION_ID_HEADER, session);
        }

        let response = builder.send().await?;
        let assigned = response
            .headers()
            .get(SESSION_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        if let (Some(session), Ok(mut slot)) = (assigned, self.session_id.lock()) {
            *slot = Some(session);
        }

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(McpError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    async fn read_sse(
        response: reqwest::Response,
        request: &JsonRpcRequest,
    ) -> McpResult<JsonRpcResponse> {
        let mut events = response.bytes_stream().eventsource();
        while let Some(event) = events.next().await {
            let event = event.map_err(|err| McpError::Protocol(err.to_string()))?;
            if let Some(found) = match_response(&event.data, request) {
                return Ok(found);
            }
        }
        Err(McpError::Closed)
    }
}

impl McpTransport for HttpTransport {
    fn request(&self, request: JsonRpcRequest) -> McpFuture<'_, McpResult<JsonRpcResponse>> {
        Box::pin(async move {
            let response = self.post(serde_json::to_vec(&request)?).await?;
            let is_sse = response
                .headers()
                .get(CONTENT_TYPE)
                .and_then(|value| value.to_str().ok())
                .is_some_and(|value| value.starts_with("text/event-stream"));

            if is_sse {
                return Self::read_sse(response, &request).await;
            }

            let text = response.text().await?;
            match_response(&text, &request).ok_or_else(|| {
                McpError::Protocol(format!("no response for request {:?}", request.id))
            })
        })
    }

    fn notify(&self, notification: JsonRpcNotification) -> McpFuture<'_, McpResult<()>> {
        Box::pin(async move {
            let response = self.post(serde_json::to_vec(&notification)?).await?;
            if response.status() != StatusCode::ACCEPTED {
                debug!(status = response.status().as_u16(), "Notification answered with a body");
            }
            Ok(())
        })
    }

    fn close(&self) -> McpFuture<'_, McpResult<()>> {
        Box::pin(async move {
            let Some(session) = self.session_id() else {
                return Ok(());
            };
            let response = self
                .client
                .delete(&self.url)
                .header(SESSION_ID_HEADER, session)
                .send()
                .await?;
            if !response.status().is_success() && response.status() != StatusCode::METHOD_NOT_ALLOWED {
                warn!(status = response.status().as_u16(), "MCP session close rejected");
            }
            if let Ok(mut slot) = self.session_id.lock() {
                *slot = None;
            }
            Ok(())
        })
    }
}
