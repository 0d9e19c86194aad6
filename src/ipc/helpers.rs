use rusqlite::Connection;
use serde_json::Value;

use crate::ipc::error::err;
use crate::ipc::types::{AppState, Request};

/// The open workspace connection, or the `no_workspace` error envelope.
pub fn require_db<'a>(state: &'a AppState, req: &Request) -> Result<&'a Connection, Value> {
    state
        .db
        .as_ref()
        .ok_or_else(|| err(&req.id, "no_workspace", "select a workspace first", None))
}

pub fn required_str<'a>(req: &'a Request, key: &str) -> Result<&'a str, Value> {
    match req.params.get(key) {
        Some(Value::String(s)) => Ok(s.as_str()),
        Some(_) => Err(err(
            &req.id,
            "bad_params",
            format!("{} must be a string", key),
            None,
        )),
        None => Err(err(&req.id, "bad_params", format!("missing {}", key), None)),
    }
}

/// A patch field that must be a string when present.
pub fn optional_patch_str(
    patch: &serde_json::Map<String, Value>,
    key: &str,
) -> Result<Option<String>, String> {
    match patch.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(format!("patch.{} must be a string", key)),
    }
}

/// Non-negative integer parameter. Numeric strings are accepted.
pub fn optional_count(req: &Request, key: &str) -> Result<Option<usize>, Value> {
    let raw = match req.params.get(key) {
        None | Some(Value::Null) => return Ok(None),
        Some(v) => v,
    };
    let parsed = match raw {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    };
    match parsed {
        Some(n) => Ok(Some(n as usize)),
        None => Err(err(
            &req.id,
            "bad_params",
            format!("{} must be a non-negative integer", key),
            None,
        )),
    }
}
