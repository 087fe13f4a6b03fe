//! # JSON-RPC Framing
//!
//! One JSON value per newline-terminated line. A line holds a request, a
//! notification (a request without `id`) or a batch array of them.
//!
//! ## Responses
//!
//! | Incoming | Outgoing |
//! |----------|----------|
//! | request | one response object |
//! | notification | nothing |
//! | batch | array of responses, in request order, notifications omitted |
//! | batch of notifications only | nothing |
//! | unparseable line | one error object with `id: null` |

use serde_json::{json, Map, Value};

use super::errors::RpcError;

const MAX_ID_LEN: usize = 256;

/// Request parameters, by position or by name.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Params {
    #[default]
    None,
    Positional(Vec<Value>),
    Named(Map<String, Value>),
}

impl Params {
    fn from_value(value: Option<Value>) -> Result<Self, RpcError> {
        match value {
            None | Some(Value::Null) => Ok(Self::None),
            Some(Value::Array(items)) => Ok(Self::Positional(items)),
            Some(Value::Object(map)) => Ok(Self::Named(map)),
            Some(_) => Err(RpcError::invalid_request("params must be an array or object")),
        }
    }

    /// The argument at `index`, or named `name`.
    pub fn arg(&self, index: usize, name: &str) -> Option<&Value> {
        match self {
            Self::None => None,
            Self::Positional(items) => items.get(index),
            Self::Named(map) => map.get(name),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::None => 0,
            Self::Positional(items) => items.len(),
            Self::Named(map) => map.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    /// `None` for a notification.
    pub id: Option<Value>,
    pub method: String,
    pub params: Params,
}

impl Request {
    pub fn new(id: impl Into<Value>, method: &str, params: Params) -> Self {
        Self {
            id: Some(id.into()),
            method: method.to_string(),
            params,
        }
    }
}

/// A request, or the error answering a malformed one under its id.
pub type ParsedRequest = Result<Request, (Value, RpcError)>;

#[derive(Debug)]
pub enum Incoming {
    Single(ParsedRequest),
    Batch(Vec<ParsedRequest>),
}

/// Split one line into requests. Only unparseable JSON or an empty batch
/// fails the whole line.
pub fn parse_message(line: &str) -> Result<Incoming, RpcError> {
    let value: Value = serde_json::from_str(line).map_err(RpcError::parse_error)?;
    match value {
        Value::Array(items) if items.is_empty() => {
            Err(RpcError::invalid_request("empty batch"))
        }
        Value::Array(items) => Ok(Incoming::Batch(items.into_iter().map(parse_request).collect())),
        single => Ok(Incoming::Single(parse_request(single))),
    }
}

fn parse_request(value: Value) -> ParsedRequest {
    let Value::Object(mut object) = value else {
        return Err((Value::Null, RpcError::invalid_request("request must be an object")));
    };
    let id = object.remove("id");
    let reply_id = id.clone().unwrap_or(Value::Null);
    if let Some(id) = &id {
        validate_id(id).map_err(|err| (Value::Null, err))?;
    }
    let method = match object.remove("method") {
        Some(Value::String(method)) => method,
        _ => return Err((reply_id, RpcError::invalid_request("missing method"))),
    };
    let params = Params::from_value(object.remove("params")).map_err(|err| (reply_id, err))?;
    Ok(Request { id, method, params })
}

fn validate_id(id: &Value) -> Result<(), RpcError> {
    match id {
        Value::Null | Value::Number(_) => Ok(()),
        Value::String(s) if s.len() <= MAX_ID_LEN => Ok(()),
        Value::String(_) => Err(RpcError::invalid_request("id string too long")),
        _ => Err(RpcError::invalid_request("id must be a string, number or null")),
    }
}

pub fn response(id: Value, result: Result<Value, RpcError>) -> Value {
    match result {
        Ok(result) => json!({"jsonrpc": "2.0", "id": id, "result": result}),
        Err(err) => json!({
            "jsonrpc": "2.0",
            "id": id,
            "error": {"code": err.code, "message": err.message},
        }),
    }
}

pub fn notification(method: &str, params: Value) -> Value {
    json!({"jsonrpc": "2.0", "method": method, "params": params})
}

/// Serialize `value` as one outgoing line.
pub fn encode_line(value: &Value) -> String {
    let mut line = value.to_string();
    line.push('\n');
    line
}
