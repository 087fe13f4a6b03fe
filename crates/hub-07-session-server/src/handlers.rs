//! # Method Handlers
//!
//! Every wallet-facing method, dispatched by name.
//!
//! | Family | Methods |
//! |--------|---------|
//! | `server.*` | `version`, `banner`, `ping`, `features`, `donation_address` |
//! | headers | `blockchain.headers.subscribe`, `blockchain.block.header`, `blockchain.block.headers` |
//! | fees | `blockchain.estimatefee`, `blockchain.relayfee`, `mempool.get_fee_histogram` |
//! | addresses | `subscribe`, `unsubscribe`, `get_history`, `get_mempool`, `get_balance`, `listunspent` under `blockchain.address.*` and `blockchain.scripthash.*` |
//! | transactions | `blockchain.transaction.{get, get_merkle, broadcast, get_height}` |
//! | claims | `blockchain.claimtrie.resolve`, `blockchain.claimtrie.search` |
//!
//! Addresses are base58 addresses of the configured network; script
//! hashes are the hex SHA-256 of an output script. Both map to the same
//! hashX index.

use hub_01_codec::merkle_branch;
use hub_02_storage::UtxoReader;
use hub_04_block_processor::DaemonError;
use hub_05_mempool::MempoolStatus;
use serde_json::{json, Map, Value};
use shared_types::{hash_to_hex_str, hex_str_to_hash, HashX, Height, Outpoint, TxHash};
use tracing::{info, warn};

use crate::domain::errors::RpcError;
use crate::domain::protocol::{Params, Request};
use crate::domain::version::{negotiate, protocol_max, protocol_min, ProtocolVersion};
use crate::domain::status;
use crate::service::SessionManager;
use crate::session::Session;

/// Most headers returned by one `blockchain.block.headers` call.
pub const MAX_CHUNK_SIZE: u32 = 2016;

/// Most addresses accepted by one `subscribe` call.
pub const MAX_SUBSCRIBE_BATCH: usize = 1000;

const CLIENT_NAME_LEN: usize = 17;

/// How a method names the address it is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AddressForm {
    Address,
    ScriptHash,
}

impl SessionManager {
    pub(crate) async fn dispatch(
        &self,
        session: &Session,
        request: &Request,
    ) -> Result<Value, RpcError> {
        let params = &request.params;
        if let Some(rest) = request.method.strip_prefix("blockchain.address.") {
            return self.address_method(session, rest, AddressForm::Address, params).await;
        }
        if let Some(rest) = request.method.strip_prefix("blockchain.scripthash.") {
            return self.address_method(session, rest, AddressForm::ScriptHash, params).await;
        }
        match request.method.as_str() {
            "server.version" => self.server_version(session, params),
            "server.banner" => self.server_banner().await,
            "server.ping" => Ok(Value::Null),
            "server.features" => Ok(self.server_features()),
            "server.donation_address" => Ok(json!(self.config.donation_address)),

            "blockchain.headers.subscribe" => self.headers_subscribe(session, params),
            "blockchain.block.header" => self.block_header(params),
            "blockchain.block.headers" => self.block_headers(params),

            "blockchain.estimatefee" => {
                let blocks = u32_arg(params, 0, "number")?;
                Ok(json!(self.backend.daemon.estimate_fee(blocks).await?))
            }
            "blockchain.relayfee" => Ok(json!(self.backend.daemon.relay_fee().await?)),
            "mempool.get_fee_histogram" => Ok(json!(self.backend.mempool.compact_fee_histogram())),

            "blockchain.transaction.get" => self.transaction_get(params).await,
            "blockchain.transaction.get_merkle" => self.transaction_merkle(params),
            "blockchain.transaction.broadcast" => self.transaction_broadcast(params).await,
            "blockchain.transaction.get_height" => self.transaction_height(params),

            "blockchain.claimtrie.resolve" => self.claimtrie_resolve(params).await,
            "blockchain.claimtrie.search" => self.claimtrie_search(params).await,

            method => Err(RpcError::method_not_found(method)),
        }
    }

    // ---------------------------------------------------------------------
    // server.*
    // ---------------------------------------------------------------------

    fn server_version(&self, session: &Session, params: &Params) -> Result<Value, RpcError> {
        let client: String = match params.arg(0, "client_name") {
            None | Some(Value::Null) => String::new(),
            Some(Value::String(name)) => name.chars().take(CLIENT_NAME_LEN).collect(),
            Some(_) => return Err(RpcError::invalid_args("client_name must be a string")),
        };
        if self.config.drop_client.matches(&client) {
            info!(session = session.id, client = %client, "Dropping unsupported client");
            session.close_after_send();
            return Err(RpcError::bad_request(format!("unsupported client: {client}")));
        }

        let mut state = session.state.lock();
        if state.version_sent && state.protocol >= ProtocolVersion::new(&[1, 4]) {
            return Err(RpcError::bad_request("server.version already sent"));
        }
        let requested = params.arg(1, "protocol_version");
        let Some(version) = negotiate(requested, &protocol_min(), &protocol_max()) else {
            info!(session = session.id, client = %client, "Unsupported protocol version");
            session.close_after_send();
            return Err(RpcError::bad_request(format!(
                "unsupported protocol version: {}",
                requested.map(Value::to_string).unwrap_or_default()
            )));
        };
        if !client.is_empty() {
            state.client = client;
        }
        state.protocol = version.clone();
        state.version_sent = true;
        Ok(json!([self.config.server_version, version.to_string()]))
    }

    async fn server_banner(&self) -> Result<Value, RpcError> {
        let default = format!("You are connected to a {} server.", self.config.server_version);
        let Some(path) = &self.config.banner_file else {
            return Ok(json!(default));
        };
        match tokio::fs::read_to_string(path).await {
            Ok(banner) => Ok(json!(banner
                .replace("$SERVER_VERSION", &self.config.server_version)
                .replace("$DONATION_ADDRESS", &self.config.donation_address))),
            Err(err) => {
                warn!(path = %path.display(), error = %err, "Cannot read banner file");
                Ok(json!(default))
            }
        }
    }

    fn server_features(&self) -> Value {
        let mut hosts = Map::new();
        hosts.insert(
            self.config.listen.ip().to_string(),
            json!({"tcp_port": self.config.listen.port(), "ssl_port": null}),
        );
        json!({
            "hosts": hosts,
            "pruning": null,
            "server_version": self.config.server_version,
            "protocol_min": protocol_min().to_string(),
            "protocol_max": protocol_max().to_string(),
            "genesis_hash": self.backend.network.genesis_hash,
            "description": self.config.description,
            "donation_address": self.config.donation_address,
            "hash_function": "sha256",
        })
    }

    // ---------------------------------------------------------------------
    // Headers
    // ---------------------------------------------------------------------

    fn headers_subscribe(&self, session: &Session, params: &Params) -> Result<Value, RpcError> {
        let raw = bool_arg(params, 0, "raw", false)?;
        let payload = self.header_payload(self.tip_height()?, raw)?;
        session.state.lock().headers = Some(raw);
        Ok(payload)
    }

    fn block_header(&self, params: &Params) -> Result<Value, RpcError> {
        let height = u32_arg(params, 0, "height")?;
        let cp_height = opt_u32_arg(params, 1, "cp_height", 0)?;
        let raw = hex::encode(self.backend.headers.header(height).map_err(|_| {
            RpcError::bad_request(format!("height {height} out of range"))
        })?);
        if cp_height == 0 {
            return Ok(json!(raw));
        }
        let (branch, root) = self.header_branch(height, cp_height)?;
        Ok(json!({"header": raw, "branch": branch, "root": root}))
    }

    fn block_headers(&self, params: &Params) -> Result<Value, RpcError> {
        let start = u32_arg(params, 0, "start_height")?;
        let count = u32_arg(params, 1, "count")?.min(MAX_CHUNK_SIZE);
        let cp_height = opt_u32_arg(params, 2, "cp_height", 0)?;
        let bytes = self.backend.headers.read_range(start, count)?;
        let count = (bytes.len() / shared_types::HEADER_SIZE) as u32;
        let mut result = json!({"hex": hex::encode(&bytes), "count": count, "max": MAX_CHUNK_SIZE});
        if count > 0 && cp_height != 0 {
            let (branch, root) = self.header_branch(start + count - 1, cp_height)?;
            result["branch"] = json!(branch);
            result["root"] = json!(root);
        }
        Ok(result)
    }

    /// Merkle proof that the header at `height` is in the tree over block
    /// hashes `0..=cp_height`.
    fn header_branch(&self, height: Height, cp_height: Height) -> Result<(Vec<String>, String), RpcError> {
        let tip = self.tip_height()?;
        if height > cp_height || cp_height > tip {
            return Err(RpcError::bad_request(format!(
                "header height {height} must be <= cp_height {cp_height} which must be <= chain height {tip}"
            )));
        }
        let hashes = self.backend.headers.block_hashes(0, cp_height + 1);
        let (branch, root) = merkle_branch(&hashes, height as usize)
            .ok_or_else(|| RpcError::internal("header branch out of range"))?;
        Ok((
            branch.iter().map(|hash| hash_to_hex_str(hash)).collect(),
            hash_to_hex_str(&root),
        ))
    }

    // ---------------------------------------------------------------------
    // Addresses
    // ---------------------------------------------------------------------

    async fn address_method(
        &self,
        session: &Session,
        method: &str,
        form: AddressForm,
        params: &Params,
    ) -> Result<Value, RpcError> {
        if method == "subscribe" {
            return self.address_subscribe(session, form, params);
        }
        let alias = str_arg(params, 0, form.arg_name())?;
        let hashx = self.hashx_of(alias, form)?;
        match method {
            "unsubscribe" => Ok(json!(self.unsubscribe(session, &hashx))),
            "get_history" => {
                let history = self.history(&hashx)?;
                let mempool = self.backend.mempool.transaction_summaries(&hashx);
                let mut rows = status::confirmed_rows(&history);
                rows.extend(status::unconfirmed_rows(&mempool));
                Ok(Value::Array(rows))
            }
            "get_mempool" => Ok(Value::Array(status::unconfirmed_rows(
                &self.backend.mempool.transaction_summaries(&hashx),
            ))),
            "get_balance" => {
                let confirmed = self.backend.db.get_balance(&hashx)?;
                let unconfirmed = self.backend.mempool.balance_delta(&hashx);
                Ok(json!({"confirmed": confirmed, "unconfirmed": unconfirmed}))
            }
            "listunspent" => self.list_unspent(&hashx),
            other => Err(RpcError::method_not_found(&format!("{}{other}", form.prefix()))),
        }
    }

    /// One address answers with its status, several with a list of them.
    fn address_subscribe(
        &self,
        session: &Session,
        form: AddressForm,
        params: &Params,
    ) -> Result<Value, RpcError> {
        let aliases: Vec<&str> = match params {
            Params::Positional(items) => items
                .iter()
                .map(|item| {
                    item.as_str()
                        .ok_or_else(|| RpcError::invalid_args("addresses must be strings"))
                })
                .collect::<Result<_, _>>()?,
            _ => vec![str_arg(params, 0, form.arg_name())?],
        };
        match aliases.len() {
            0 => Err(RpcError::invalid_args(format!("missing argument {}", form.arg_name()))),
            n if n > MAX_SUBSCRIBE_BATCH => Err(RpcError::bad_request(format!(
                "too many addresses: {n} (limit {MAX_SUBSCRIBE_BATCH})"
            ))),
            1 => {
                let hashx = self.hashx_of(aliases[0], form)?;
                Ok(json!(self.subscribe(session, hashx, aliases[0].to_string())?))
            }
            _ => {
                let mut statuses = Vec::with_capacity(aliases.len());
                for alias in aliases {
                    let hashx = self.hashx_of(alias, form)?;
                    statuses.push(json!(self.subscribe(session, hashx, alias.to_string())?));
                }
                Ok(Value::Array(statuses))
            }
        }
    }

    fn list_unspent(&self, hashx: &HashX) -> Result<Value, RpcError> {
        let spent = self.backend.mempool.potential_spends(hashx);
        let view = self.backend.db.snapshot();
        let mut confirmed = Vec::new();
        for (outpoint, value) in view.get_hashx_utxos(hashx)? {
            if spent.contains(&outpoint) {
                continue;
            }
            let height = view
                .get_tx_location(&outpoint.tx_hash)?
                .map_or(0, |location| location.height);
            confirmed.push((height, outpoint, value));
        }
        confirmed.sort_unstable_by_key(|(height, outpoint, _)| (*height, *outpoint));

        let mut rows: Vec<Value> = confirmed
            .into_iter()
            .map(|(height, outpoint, value)| utxo_row(&outpoint, height, value))
            .collect();
        for utxo in self.backend.mempool.unordered_utxos(hashx) {
            let outpoint = Outpoint::new(utxo.tx_hash, utxo.nout);
            if !spent.contains(&outpoint) {
                rows.push(utxo_row(&outpoint, 0, utxo.value));
            }
        }
        Ok(Value::Array(rows))
    }

    fn hashx_of(&self, alias: &str, form: AddressForm) -> Result<HashX, RpcError> {
        match form {
            AddressForm::Address => self
                .backend
                .network
                .address_to_hashx(alias)
                .map_err(|_| RpcError::bad_request(format!("{alias} is not a valid address"))),
            AddressForm::ScriptHash => HashX::from_scripthash_hex(alias)
                .map_err(|_| RpcError::bad_request(format!("{alias} is not a valid script hash"))),
        }
    }

    // ---------------------------------------------------------------------
    // Transactions
    // ---------------------------------------------------------------------

    async fn transaction_get(&self, params: &Params) -> Result<Value, RpcError> {
        let tx_hash = tx_hash_arg(params, 0)?;
        let verbose = bool_arg(params, 1, "verbose", false)?;

        let (raw, height) = match self.backend.db.get_raw_tx(&tx_hash)? {
            Some(raw) => {
                let height = self.backend.db.get_tx_location(&tx_hash)?.map(|l| l.height);
                (raw, height)
            }
            None => match self.backend.mempool.raw_transaction(&tx_hash) {
                Some(raw) => (raw, None),
                None => {
                    let fetched = self.backend.daemon.raw_transactions(&[tx_hash]).await?;
                    let raw = fetched.into_iter().next().flatten().ok_or_else(|| {
                        RpcError::bad_request(format!(
                            "no such mempool or blockchain transaction: {}",
                            hash_to_hex_str(&tx_hash)
                        ))
                    })?;
                    (raw, None)
                }
            },
        };

        if !verbose {
            return Ok(json!(hex::encode(raw)));
        }
        let confirmations = match (height, self.backend.headers.tip_height()) {
            (Some(height), Some(tip)) if tip >= height => tip - height + 1,
            _ => 0,
        };
        Ok(json!({
            "txid": hash_to_hex_str(&tx_hash),
            "hex": hex::encode(raw),
            "height": height,
            "confirmations": confirmations,
        }))
    }

    fn transaction_merkle(&self, params: &Params) -> Result<Value, RpcError> {
        let tx_hash = tx_hash_arg(params, 0)?;
        let height = u32_arg(params, 1, "height")?;
        let hashes = self
            .backend
            .db
            .get_block_tx_hashes(height)?
            .ok_or_else(|| RpcError::bad_request(format!("block {height} not on chain")))?;
        let pos = hashes.iter().position(|hash| *hash == tx_hash).ok_or_else(|| {
            RpcError::bad_request(format!(
                "tx {} not in block at height {height}",
                hash_to_hex_str(&tx_hash)
            ))
        })?;
        let (branch, _root) = merkle_branch(&hashes, pos)
            .ok_or_else(|| RpcError::internal("merkle position out of range"))?;
        Ok(json!({
            "block_height": height,
            "merkle": branch.iter().map(|hash| hash_to_hex_str(hash)).collect::<Vec<_>>(),
            "pos": pos,
        }))
    }

    async fn transaction_broadcast(&self, params: &Params) -> Result<Value, RpcError> {
        let raw_hex = str_arg(params, 0, "raw_tx")?;
        let raw = hex::decode(raw_hex)
            .map_err(|_| RpcError::bad_request(format!("{raw_hex} is not a hex string")))?;
        match self.backend.daemon.broadcast_transaction(&raw).await {
            Ok(tx_hash) => {
                self.backend.mempool.wake();
                info!(tx = %hash_to_hex_str(&tx_hash), size = raw.len(), "Broadcast transaction");
                Ok(json!(hash_to_hex_str(&tx_hash)))
            }
            Err(DaemonError::Rpc { message, .. }) => Err(RpcError::bad_request(format!(
                "the transaction was rejected by network rules.\n\n{message}"
            ))),
            Err(err) => Err(err.into()),
        }
    }

    fn transaction_height(&self, params: &Params) -> Result<Value, RpcError> {
        let tx_hash = tx_hash_arg(params, 0)?;
        if let Some(location) = self.backend.db.get_tx_location(&tx_hash)? {
            return Ok(json!(location.height));
        }
        Ok(match self.backend.mempool.status(&tx_hash) {
            MempoolStatus::Unknown => Value::Null,
            status => json!(status.height()),
        })
    }

    // ---------------------------------------------------------------------
    // Claims
    // ---------------------------------------------------------------------

    async fn claimtrie_resolve(&self, params: &Params) -> Result<Value, RpcError> {
        let urls: Vec<String> = match params {
            Params::Positional(items) => items
                .iter()
                .map(|item| {
                    item.as_str()
                        .map(str::to_string)
                        .ok_or_else(|| RpcError::invalid_args("urls must be strings"))
                })
                .collect::<Result<_, _>>()?,
            Params::Named(map) => match map.get("urls") {
                Some(Value::Array(items)) => items
                    .iter()
                    .filter_map(|item| item.as_str().map(str::to_string))
                    .collect(),
                Some(Value::String(url)) => vec![url.clone()],
                _ => return Err(RpcError::invalid_args("missing argument urls")),
            },
            Params::None => Vec::new(),
        };
        let encoded = self.backend.query.resolve(urls).await?;
        Ok(json!(encoded.as_ref()))
    }

    async fn claimtrie_search(&self, params: &Params) -> Result<Value, RpcError> {
        let constraints = match params {
            Params::Named(map) => map.clone(),
            Params::Positional(items) => match items.as_slice() {
                [Value::Object(map)] => map.clone(),
                [] => Map::new(),
                _ => return Err(RpcError::invalid_args("search takes named constraints")),
            },
            Params::None => Map::new(),
        };
        let encoded = self.backend.query.search(constraints).await?;
        Ok(json!(encoded.as_ref()))
    }
}

impl AddressForm {
    fn arg_name(self) -> &'static str {
        match self {
            Self::Address => "address",
            Self::ScriptHash => "scripthash",
        }
    }

    fn prefix(self) -> &'static str {
        match self {
            Self::Address => "blockchain.address.",
            Self::ScriptHash => "blockchain.scripthash.",
        }
    }
}

fn utxo_row(outpoint: &Outpoint, height: Height, value: u64) -> Value {
    json!({
        "tx_hash": hash_to_hex_str(&outpoint.tx_hash),
        "tx_pos": outpoint.nout,
        "height": height,
        "value": value,
    })
}

// -------------------------------------------------------------------------
// Arguments
// -------------------------------------------------------------------------

fn required<'a>(params: &'a Params, index: usize, name: &str) -> Result<&'a Value, RpcError> {
    match params.arg(index, name) {
        None | Some(Value::Null) => Err(RpcError::invalid_args(format!("missing argument {name}"))),
        Some(value) => Ok(value),
    }
}

fn str_arg<'a>(params: &'a Params, index: usize, name: &str) -> Result<&'a str, RpcError> {
    required(params, index, name)?
        .as_str()
        .ok_or_else(|| RpcError::invalid_args(format!("{name} must be a string")))
}

fn u32_arg(params: &Params, index: usize, name: &str) -> Result<u32, RpcError> {
    let value = required(params, index, name)?;
    value
        .as_u64()
        .or_else(|| value.as_str().and_then(|s| s.parse().ok()))
        .and_then(|n| u32::try_from(n).ok())
        .ok_or_else(|| RpcError::bad_request(format!("{name} must be a non-negative integer")))
}

fn opt_u32_arg(params: &Params, index: usize, name: &str, default: u32) -> Result<u32, RpcError> {
    match params.arg(index, name) {
        None | Some(Value::Null) => Ok(default),
        Some(_) => u32_arg(params, index, name),
    }
}

fn bool_arg(params: &Params, index: usize, name: &str, default: bool) -> Result<bool, RpcError> {
    match params.arg(index, name) {
        None | Some(Value::Null) => Ok(default),
        Some(Value::Bool(flag)) => Ok(*flag),
        Some(Value::Number(n)) => Ok(n.as_u64() != Some(0)),
        Some(_) => Err(RpcError::invalid_args(format!("{name} must be a boolean"))),
    }
}

fn tx_hash_arg(params: &Params, index: usize) -> Result<TxHash, RpcError> {
    let value = str_arg(params, index, "tx_hash")?;
    hex_str_to_hash(value)
        .map_err(|_| RpcError::bad_request(format!("{value} should be a transaction hash")))
}
