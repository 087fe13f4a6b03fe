//! # Daemon RPC Client
//!
//! JSON-RPC over HTTP to the consensus daemon.
//!
//! ## Retry policy
//!
//! | Failure | Handling |
//! |---------|----------|
//! | connect error, timeout, disconnect | retry |
//! | error code -28 (warming up) | retry |
//! | "Work queue depth exceeded" body | retry |
//! | any other JSON-RPC error | returned as [`DaemonError::Rpc`] |
//!
//! Retries back off from `init_retry`, doubling up to `max_retry`. Each
//! time a wait reaches `max_retry` the client fails over to the next URL in
//! its list. At most `max_workqueue` requests are in flight at once.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::header::CONTENT_TYPE;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use shared_types::{hash_to_hex_str, hex_str_to_hash, BlockHash, Height, TxHash};
use tokio::sync::Semaphore;
use tracing::{debug, error, info};

use crate::domain::errors::DaemonError;
use crate::ports::outbound::DaemonApi;

const WARMING_UP: i64 = -28;
const METHOD_NOT_FOUND: i64 = -32601;
const ERROR_LOG_INTERVAL: Duration = Duration::from_secs(60);

/// Client settings.
#[derive(Debug, Clone)]
pub struct DaemonClientConfig {
    /// Daemon URLs in failover order.
    pub urls: Vec<String>,
    pub max_workqueue: usize,
    pub init_retry: Duration,
    pub max_retry: Duration,
    pub request_timeout: Duration,
}

impl Default for DaemonClientConfig {
    fn default() -> Self {
        Self {
            urls: Vec::new(),
            max_workqueue: 10,
            init_retry: Duration::from_millis(250),
            max_retry: Duration::from_secs(4),
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl DaemonClientConfig {
    /// Parse a comma-separated URL list. URLs without a scheme get `http://`.
    pub fn with_url_list(mut self, urls: &str) -> Self {
        self.urls = urls
            .split(',')
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .map(|url| {
                if url.contains("://") {
                    url.to_string()
                } else {
                    format!("http://{url}")
                }
            })
            .collect();
        self
    }
}

#[derive(Debug, Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    method: &'a str,
    params: Value,
    id: u64,
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    #[serde(default)]
    result: Value,
    #[serde(default)]
    error: Option<JsonRpcError>,
    #[serde(default)]
    id: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
struct JsonRpcError {
    code: i64,
    #[serde(default)]
    message: String,
}

impl From<JsonRpcError> for DaemonError {
    fn from(err: JsonRpcError) -> Self {
        DaemonError::Rpc {
            code: err.code,
            message: err.message,
        }
    }
}

/// Why one attempt failed.
enum Failure {
    Retry(String),
    Fatal(DaemonError),
}

/// Consensus daemon client with retry and failover.
pub struct DaemonClient {
    http: reqwest::Client,
    urls: Vec<String>,
    url_index: AtomicUsize,
    workqueue: Semaphore,
    init_retry: Duration,
    max_retry: Duration,
    request_id: AtomicU64,
    cached_height: Mutex<Option<Height>>,
    available_rpcs: Mutex<HashMap<&'static str, bool>>,
}

impl DaemonClient {
    pub fn new(config: DaemonClientConfig) -> Result<Self, DaemonError> {
        if config.urls.is_empty() {
            return Err(DaemonError::NoUrl);
        }
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .no_proxy()
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        for (n, url) in config.urls.iter().enumerate() {
            info!(
                daemon = n + 1,
                url = logged_url(url),
                current = n == 0,
                "Configured daemon"
            );
        }
        Ok(Self {
            http,
            urls: config.urls,
            url_index: AtomicUsize::new(0),
            workqueue: Semaphore::new(config.max_workqueue.max(1)),
            init_retry: config.init_retry,
            max_retry: config.max_retry.max(config.init_retry),
            request_id: AtomicU64::new(1),
            cached_height: Mutex::new(None),
            available_rpcs: Mutex::new(HashMap::new()),
        })
    }

    pub fn current_url(&self) -> &str {
        &self.urls[self.url_index.load(Ordering::Relaxed) % self.urls.len()]
    }

    /// Move to the next URL. `false` when there is only one.
    fn failover(&self) -> bool {
        if self.urls.len() < 2 {
            return false;
        }
        let next = (self.url_index.load(Ordering::Relaxed) + 1) % self.urls.len();
        self.url_index.store(next, Ordering::Relaxed);
        info!(url = logged_url(self.current_url()), "Failing over to daemon");
        true
    }

    fn next_id(&self) -> u64 {
        self.request_id.fetch_add(1, Ordering::Relaxed)
    }

    async fn post_once(&self, body: &Value) -> Result<Value, Failure> {
        let _permit = self
            .workqueue
            .acquire()
            .await
            .map_err(|e| Failure::Fatal(DaemonError::Http(e.to_string())))?;
        let response = self
            .http
            .post(self.current_url())
            .json(body)
            .send()
            .await
            .map_err(|e| Failure::Retry(e.to_string()))?;

        let is_json = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|kind| kind.starts_with("application/json"));
        if is_json {
            return response
                .json::<Value>()
                .await
                .map_err(|e| Failure::Retry(e.to_string()));
        }

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| Failure::Retry(e.to_string()))?;
        if text.contains("Work queue depth exceeded") {
            return Err(Failure::Retry("work queue full".into()));
        }
        let text = text.trim();
        let detail = if text.is_empty() {
            status.to_string()
        } else {
            text.to_string()
        };
        error!(url = logged_url(self.current_url()), %detail, "Daemon returned non-JSON body");
        Err(Failure::Fatal(DaemonError::Http(detail)))
    }

    /// Post `body` until it succeeds or fails for good.
    async fn send<T>(
        &self,
        body: Value,
        process: impl Fn(Value) -> Result<T, Failure>,
    ) -> Result<T, DaemonError> {
        let mut retry = self.init_retry;
        let mut last_logged: Option<Instant> = None;
        let mut recovering = false;
        loop {
            let failure = match self.post_once(&body).await.and_then(&process) {
                Ok(result) => {
                    if recovering {
                        info!(url = logged_url(self.current_url()), "Daemon running normally");
                    }
                    return Ok(result);
                }
                Err(failure) => failure,
            };
            let reason = match failure {
                Failure::Fatal(err) => return Err(err),
                Failure::Retry(reason) => reason,
            };

            recovering = true;
            if last_logged.map_or(true, |at| at.elapsed() > ERROR_LOG_INTERVAL) {
                last_logged = Some(Instant::now());
                error!(
                    url = logged_url(self.current_url()),
                    %reason,
                    "Daemon request failed, retrying occasionally"
                );
            } else {
                debug!(%reason, "Daemon request failed");
            }
            if retry >= self.max_retry && self.failover() {
                retry = Duration::ZERO;
            }
            tokio::time::sleep(retry).await;
            retry = (retry * 2).clamp(self.init_retry, self.max_retry);
        }
    }

    async fn send_single(&self, method: &str, params: Value) -> Result<Value, DaemonError> {
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            method,
            params,
            id: self.next_id(),
        };
        let body = serde_json::to_value(&request)
            .map_err(|e| DaemonError::malformed(method, e.to_string()))?;
        self.send(body, |reply| {
            let reply: JsonRpcResponse = serde_json::from_value(reply)
                .map_err(|e| Failure::Fatal(DaemonError::malformed(method, e.to_string())))?;
            match reply.error {
                Some(err) if err.code == WARMING_UP => Err(Failure::Retry("daemon warming up".into())),
                Some(err) => Err(Failure::Fatal(err.into())),
                None => Ok(reply.result),
            }
        })
        .await
    }

    /// One batch of calls to `method`, results in `params` order. With
    /// `replace_errs` failed items become `None` instead of failing the batch.
    async fn send_vector(
        &self,
        method: &str,
        params: Vec<Value>,
        replace_errs: bool,
    ) -> Result<Vec<Option<Value>>, DaemonError> {
        if params.is_empty() {
            return Ok(Vec::new());
        }
        let first_id = self.request_id.fetch_add(params.len() as u64, Ordering::Relaxed);
        let batch: Vec<JsonRpcRequest<'_>> = params
            .into_iter()
            .enumerate()
            .map(|(n, params)| JsonRpcRequest {
                jsonrpc: "2.0",
                method,
                params,
                id: first_id + n as u64,
            })
            .collect();
        let expected = batch.len();
        let body = serde_json::to_value(&batch)
            .map_err(|e| DaemonError::malformed(method, e.to_string()))?;

        self.send(body, |reply| {
            let mut replies: Vec<JsonRpcResponse> = serde_json::from_value(reply)
                .map_err(|e| Failure::Fatal(DaemonError::malformed(method, e.to_string())))?;
            if replies.len() != expected {
                return Err(Failure::Fatal(DaemonError::malformed(
                    method,
                    format!("{} replies to {expected} requests", replies.len()),
                )));
            }
            replies.sort_by_key(|r| r.id.unwrap_or(u64::MAX));
            if replies
                .iter()
                .any(|r| r.error.as_ref().is_some_and(|e| e.code == WARMING_UP))
            {
                return Err(Failure::Retry("daemon warming up".into()));
            }
            if !replace_errs {
                if let Some(err) = replies.iter().find_map(|r| r.error.clone()) {
                    return Err(Failure::Fatal(err.into()));
                }
            }
            Ok(replies
                .into_iter()
                .map(|r| match r.error {
                    Some(_) => None,
                    None => Some(r.result),
                })
                .collect())
        })
        .await
    }

    /// Whether the daemon knows `method`. Cached after the first lookup.
    async fn rpc_available(&self, method: &'static str) -> Result<bool, DaemonError> {
        if let Some(available) = self.available_rpcs.lock().get(method) {
            return Ok(*available);
        }
        let available = match self.send_single(method, json!([])).await {
            Ok(_) => true,
            Err(DaemonError::Rpc { code, .. }) => code != METHOD_NOT_FOUND,
            Err(other) => return Err(other),
        };
        self.available_rpcs.lock().insert(method, available);
        Ok(available)
    }
}

fn logged_url(url: &str) -> &str {
    url.rsplit('@').next().unwrap_or(url)
}

fn parse_hash(method: &str, value: &Value) -> Result<BlockHash, DaemonError> {
    let text = value
        .as_str()
        .ok_or_else(|| DaemonError::malformed(method, "expected a hash string"))?;
    hex_str_to_hash(text).map_err(|e| DaemonError::malformed(method, e.to_string()))
}

fn parse_hex(method: &str, value: &Value) -> Result<Vec<u8>, DaemonError> {
    let text = value
        .as_str()
        .ok_or_else(|| DaemonError::malformed(method, "expected a hex string"))?;
    hex::decode(text).map_err(|e| DaemonError::malformed(method, e.to_string()))
}

fn require(method: &str, item: Option<Value>) -> Result<Value, DaemonError> {
    item.ok_or_else(|| DaemonError::malformed(method, "missing result"))
}

#[async_trait]
impl DaemonApi for DaemonClient {
    async fn height(&self) -> Result<Height, DaemonError> {
        let value = self.send_single("getblockcount", json!([])).await?;
        let height = value
            .as_u64()
            .and_then(|h| Height::try_from(h).ok())
            .ok_or_else(|| DaemonError::malformed("getblockcount", value.to_string()))?;
        *self.cached_height.lock() = Some(height);
        Ok(height)
    }

    fn cached_height(&self) -> Option<Height> {
        *self.cached_height.lock()
    }

    async fn block_hashes(&self, first: Height, count: u32) -> Result<Vec<BlockHash>, DaemonError> {
        let params = (first..first.saturating_add(count))
            .map(|height| json!([height]))
            .collect();
        self.send_vector("getblockhash", params, false)
            .await?
            .into_iter()
            .map(|item| parse_hash("getblockhash", &require("getblockhash", item)?))
            .collect()
    }

    async fn raw_blocks(&self, hashes: &[BlockHash]) -> Result<Vec<Vec<u8>>, DaemonError> {
        let params = hashes
            .iter()
            .map(|hash| json!([hash_to_hex_str(hash), false]))
            .collect();
        self.send_vector("getblock", params, false)
            .await?
            .into_iter()
            .map(|item| parse_hex("getblock", &require("getblock", item)?))
            .collect()
    }

    async fn mempool_hashes(&self) -> Result<Vec<TxHash>, DaemonError> {
        let value = self.send_single("getrawmempool", json!([])).await?;
        value
            .as_array()
            .ok_or_else(|| DaemonError::malformed("getrawmempool", "expected an array"))?
            .iter()
            .map(|item| parse_hash("getrawmempool", item))
            .collect()
    }

    async fn raw_transactions(&self, hashes: &[TxHash]) -> Result<Vec<Option<Vec<u8>>>, DaemonError> {
        let params = hashes
            .iter()
            .map(|hash| json!([hash_to_hex_str(hash), 0]))
            .collect();
        self.send_vector("getrawtransaction", params, true)
            .await?
            .into_iter()
            .map(|item| match item {
                Some(Value::Null) | None => Ok(None),
                Some(value) => parse_hex("getrawtransaction", &value).map(Some),
            })
            .collect()
    }

    async fn broadcast_transaction(&self, raw: &[u8]) -> Result<TxHash, DaemonError> {
        let value = self
            .send_single("sendrawtransaction", json!([hex::encode(raw)]))
            .await?;
        parse_hash("sendrawtransaction", &value)
    }

    async fn estimate_fee(&self, blocks: u32) -> Result<f64, DaemonError> {
        if self.rpc_available("estimatesmartfee").await? {
            let estimate = self.send_single("estimatesmartfee", json!([blocks])).await?;
            return Ok(estimate
                .get("feerate")
                .and_then(Value::as_f64)
                .unwrap_or(-1.0));
        }
        let value = self.send_single("estimatefee", json!([blocks])).await?;
        value
            .as_f64()
            .ok_or_else(|| DaemonError::malformed("estimatefee", value.to_string()))
    }

    async fn relay_fee(&self) -> Result<f64, DaemonError> {
        let info = self.send_single("getnetworkinfo", json!([])).await?;
        info.get("relayfee")
            .and_then(Value::as_f64)
            .ok_or_else(|| DaemonError::malformed("getnetworkinfo", "missing relayfee"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    async fn read_body(socket: &mut TcpStream) -> Value {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let n = socket.read(&mut chunk).await.unwrap();
            if n == 0 {
                return Value::Null;
            }
            buf.extend_from_slice(&chunk[..n]);
            let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") else {
                continue;
            };
            let head = String::from_utf8_lossy(&buf[..end]).to_lowercase();
            let len = head
                .lines()
                .find_map(|line| line.strip_prefix("content-length:"))
                .and_then(|v| v.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if buf.len() >= end + 4 + len {
                return serde_json::from_slice(&buf[end + 4..end + 4 + len]).unwrap();
            }
        }
    }

    /// A one-route HTTP server answering every request with `respond(body)`.
    async fn fake_daemon<F>(respond: F) -> String
    where
        F: Fn(Value) -> Value + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let respond = Arc::new(respond);
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let respond = respond.clone();
                tokio::spawn(async move {
                    let request = read_body(&mut socket).await;
                    let reply = serde_json::to_vec(&respond(request)).unwrap();
                    let head = format!(
                        "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                        reply.len()
                    );
                    socket.write_all(head.as_bytes()).await.unwrap();
                    socket.write_all(&reply).await.unwrap();
                    socket.shutdown().await.ok();
                });
            }
        });
        format!("http://{addr}")
    }

    fn reply(id: &Value, result: Value) -> Value {
        json!({"result": result, "error": null, "id": id})
    }

    fn fast_config(urls: &str) -> DaemonClientConfig {
        DaemonClientConfig {
            init_retry: Duration::from_millis(1),
            max_retry: Duration::from_millis(4),
            request_timeout: Duration::from_secs(5),
            ..Default::default()
        }
        .with_url_list(urls)
    }

    #[test]
    fn test_url_list_parsing() {
        let config = DaemonClientConfig::default().with_url_list("user:pw@localhost:9245, https://b:1,");
        assert_eq!(config.urls, vec!["http://user:pw@localhost:9245", "https://b:1"]);
        assert_eq!(logged_url(&config.urls[0]), "localhost:9245");
        assert!(matches!(
            DaemonClient::new(DaemonClientConfig::default()),
            Err(DaemonError::NoUrl)
        ));
    }

    #[tokio::test]
    async fn test_height_is_cached() {
        let url = fake_daemon(|req| reply(&req["id"], json!(812))).await;
        let client = DaemonClient::new(fast_config(&url)).unwrap();
        assert_eq!(client.cached_height(), None);
        assert_eq!(client.height().await.unwrap(), 812);
        assert_eq!(client.cached_height(), Some(812));
    }

    #[tokio::test]
    async fn test_vector_call_keeps_request_order() {
        let url = fake_daemon(|req| {
            let mut replies: Vec<Value> = req
                .as_array()
                .unwrap()
                .iter()
                .map(|item| {
                    let height = item["params"][0].as_u64().unwrap() as u8;
                    reply(&item["id"], json!(hash_to_hex_str(&[height; 32])))
                })
                .collect();
            replies.reverse();
            Value::Array(replies)
        })
        .await;
        let client = DaemonClient::new(fast_config(&url)).unwrap();
        let hashes = client.block_hashes(3, 3).await.unwrap();
        assert_eq!(hashes, vec![[3u8; 32], [4u8; 32], [5u8; 32]]);
        assert!(client.block_hashes(3, 0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_warming_up_is_retried() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();
        let url = fake_daemon(move |req| {
            if seen.fetch_add(1, Ordering::SeqCst) < 2 {
                json!({"result": null, "error": {"code": -28, "message": "Loading"}, "id": req["id"]})
            } else {
                reply(&req["id"], json!(7))
            }
        })
        .await;
        let client = DaemonClient::new(fast_config(&url)).unwrap();
        assert_eq!(client.height().await.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_rpc_error_is_returned() {
        let url = fake_daemon(|req| {
            json!({"result": null, "error": {"code": -25, "message": "missing inputs"}, "id": req["id"]})
        })
        .await;
        let client = DaemonClient::new(fast_config(&url)).unwrap();
        let err = client.broadcast_transaction(&[1, 2, 3]).await.unwrap_err();
        assert_eq!(
            err,
            DaemonError::Rpc {
                code: -25,
                message: "missing inputs".into()
            }
        );
    }

    #[tokio::test]
    async fn test_failover_to_second_url() {
        let dead = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let dead_url = format!("http://{}", dead.local_addr().unwrap());
        drop(dead);
        let live = fake_daemon(|req| reply(&req["id"], json!(55))).await;

        let client = DaemonClient::new(fast_config(&format!("{dead_url},{live}"))).unwrap();
        assert_eq!(client.height().await.unwrap(), 55);
        assert_eq!(client.current_url(), live);
    }

    #[tokio::test]
    async fn test_missing_transactions_become_none() {
        let url = fake_daemon(|req| {
            Value::Array(
                req.as_array()
                    .unwrap()
                    .iter()
                    .enumerate()
                    .map(|(n, item)| {
                        if n == 0 {
                            reply(&item["id"], json!("0102"))
                        } else {
                            json!({"result": null, "error": {"code": -5, "message": "No such tx"}, "id": item["id"]})
                        }
                    })
                    .collect(),
            )
        })
        .await;
        let client = DaemonClient::new(fast_config(&url)).unwrap();
        let txs = client.raw_transactions(&[[1u8; 32], [2u8; 32]]).await.unwrap();
        assert_eq!(txs, vec![Some(vec![1, 2]), None]);
    }

    #[tokio::test]
    async fn test_estimate_fee_falls_back_without_smart_fee() {
        let url = fake_daemon(|req| match req["method"].as_str().unwrap() {
            "estimatesmartfee" => {
                json!({"result": null, "error": {"code": -32601, "message": "Method not found"}, "id": req["id"]})
            }
            "estimatefee" => reply(&req["id"], json!(0.0002)),
            _ => reply(&req["id"], json!({"relayfee": 0.00001})),
        })
        .await;
        let client = DaemonClient::new(fast_config(&url)).unwrap();
        assert_eq!(client.estimate_fee(6).await.unwrap(), 0.0002);
        assert_eq!(client.estimate_fee(6).await.unwrap(), 0.0002);
        assert_eq!(client.relay_fee().await.unwrap(), 0.00001);
    }
}
