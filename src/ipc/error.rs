use serde_json::json;

use crate::store::StoreError;

pub fn ok(id: &str, result: serde_json::Value) -> serde_json::Value {
    json!({
        "id": id,
        "ok": true,
        "result": result
    })
}

pub fn err(
    id: &str,
    code: &str,
    message: impl Into<String>,
    details: Option<serde_json::Value>,
) -> serde_json::Value {
    let mut error = json!({
        "code": code,
        "message": message.into(),
    });
    if let Some(d) = details {
        error["details"] = d;
    }
    json!({
        "id": id,
        "ok": false,
        "error": error,
    })
}

/// Maps a store failure onto the envelope. `db_code` names the failed
/// operation when the cause is SQLite itself.
pub fn store_err(id: &str, e: StoreError, db_code: &'static str) -> serde_json::Value {
    let code = e.code(db_code);
    match &e {
        StoreError::Db(inner) => {
            tracing::warn!(code, error = %inner, "store operation failed");
            err(id, code, e.to_string(), Some(json!({ "table": "students" })))
        }
        StoreError::DuplicateEmail(email) => {
            err(id, code, e.to_string(), Some(json!({ "email": email })))
        }
        _ => err(id, code, e.to_string(), None),
    }
}

/// Envelope for lines that are not valid JSON requests; there is no id to echo.
pub fn bad_json(message: impl Into<String>) -> serde_json::Value {
    json!({
        "ok": false,
        "error": {
            "code": "bad_json",
            "message": message.into(),
        }
    })
}
