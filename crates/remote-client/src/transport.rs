/// JSON-RPC transport to the player plugin.
///
/// ```text
///   RpcClient ──call(method, params, mode)──► Transport
///                                               │
///                                               └── HttpTransport: POST {"jsonrpc":"2.0","id":N,...}
///                                                     ├── "result" → Ok(Value)
///                                                     └── "error"  → RemoteError::Application
/// ```
///
/// One call, one response, no retries.  Long-poll calls (subscriptions) use
/// their own timeout because the server holds them open until an event fires.
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use remote_proto::config::ServerConfig;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::error::{RemoteError, RemoteResult, NETWORK_ERROR_CODE, TIMEOUT_ERROR_CODE};

// ── global request-id counter ─────────────────────────────────────────────────

static NEXT_REQ_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallMode {
    /// Ordinary call, bounded by the request timeout.
    Immediate,
    /// Held open by the server until the subscribed event fires.
    LongPoll,
}

/// Issues a single named remote call.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn call(&self, method: &str, params: Value, mode: CallMode) -> RemoteResult<Value>;
}

// ── HTTP implementation ───────────────────────────────────────────────────────

pub struct HttpTransport {
    client: reqwest::Client,
    endpoint: String,
    request_timeout: Duration,
    poll_timeout: Option<Duration>,
}

impl HttpTransport {
    pub fn new(server: &ServerConfig) -> RemoteResult<Self> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| RemoteError::transport(NETWORK_ERROR_CODE, e.to_string()))?;
        Ok(Self {
            client,
            endpoint: server.rpc_url(),
            request_timeout: server.request_timeout(),
            poll_timeout: server.poll_timeout(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn call(&self, method: &str, params: Value, mode: CallMode) -> RemoteResult<Value> {
        let req_id = NEXT_REQ_ID.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": req_id,
            "method": method,
            "params": params,
        });
        debug!("rpc: send req={} method={} params={}", req_id, method, body["params"]);

        let mut request = self.client.post(&self.endpoint).json(&body);
        let timeout = match mode {
            CallMode::Immediate => Some(self.request_timeout),
            CallMode::LongPoll => self.poll_timeout,
        };
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }

        let response = request.send().await.map_err(transport_error)?;
        let status = response.status();
        if !status.is_success() {
            debug!("rpc: req={} http status {}", req_id, status);
            return Err(RemoteError::transport(
                status.as_u16() as i64,
                format!("HTTP {}", status),
            ));
        }

        let envelope: Envelope = response
            .json()
            .await
            .map_err(|e| RemoteError::malformed(method, e))?;
        let result = envelope.into_result(method, req_id);
        debug!("rpc: response req={} ok={}", req_id, result.is_ok());
        result
    }
}

fn transport_error(e: reqwest::Error) -> RemoteError {
    let code = if e.is_timeout() {
        TIMEOUT_ERROR_CODE
    } else {
        e.status()
            .map(|s| s.as_u16() as i64)
            .unwrap_or(NETWORK_ERROR_CODE)
    };
    RemoteError::transport(code, e.to_string())
}

// ── response envelope ─────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<ErrorObject>,
}

#[derive(Debug, Deserialize)]
struct ErrorObject {
    code: i64,
    #[serde(default)]
    message: String,
}

impl Envelope {
    fn into_result(self, method: &str, req_id: u64) -> RemoteResult<Value> {
        if let Some(err) = self.error {
            return Err(RemoteError::Application {
                code: err.code,
                message: err.message,
            });
        }
        if let Some(id) = &self.id {
            if id.as_u64() != Some(req_id) {
                return Err(RemoteError::malformed(
                    method,
                    format!("response id {} does not match request {}", id, req_id),
                ));
            }
        }
        // Some methods answer with an empty envelope; shape checks happen in RpcClient.
        Ok(self.result.unwrap_or(Value::Null))
    }
}
