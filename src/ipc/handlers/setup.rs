use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::require_db;
use crate::ipc::types::{AppState, Request};
use serde_json::{json, Map, Value};

#[derive(Clone, Copy)]
enum SetupSection {
    Analytics,
}

impl SetupSection {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "analytics" => Some(Self::Analytics),
            _ => None,
        }
    }

    fn key(self) -> &'static str {
        match self {
            Self::Analytics => "setup.analytics",
        }
    }
}

pub const DEFAULT_TOP_COUNT: i64 = 5;

fn default_section(section: SetupSection) -> Value {
    match section {
        SetupSection::Analytics => json!({
            "defaultTopCount": DEFAULT_TOP_COUNT
        }),
    }
}

fn as_object_mut(v: &mut Value) -> Result<&mut Map<String, Value>, String> {
    v.as_object_mut()
        .ok_or_else(|| "section must be an object".to_string())
}

fn parse_i64_range(v: &Value, key: &str, min: i64, max: i64) -> Result<i64, String> {
    let Some(n) = v.as_i64() else {
        return Err(format!("{} must be an integer", key));
    };
    if n < min || n > max {
        return Err(format!("{} must be between {} and {}", key, min, max));
    }
    Ok(n)
}

fn merge_section_patch(
    section: SetupSection,
    current: &mut Value,
    patch: &Map<String, Value>,
) -> Result<(), String> {
    let obj = as_object_mut(current)?;
    for (k, v) in patch {
        match section {
            SetupSection::Analytics => match k.as_str() {
                "defaultTopCount" => {
                    obj.insert(k.clone(), Value::from(parse_i64_range(v, k, 1, 100)?));
                }
                _ => return Err(format!("unknown analytics field: {}", k)),
            },
        }
    }
    Ok(())
}

fn load_section(conn: &rusqlite::Connection, section: SetupSection) -> anyhow::Result<Value> {
    let mut current = default_section(section);
    if let Some(saved) = db::settings_get_json(conn, section.key())? {
        if let Some(saved_obj) = saved.as_object() {
            // Malformed historical values fall back to defaults.
            if let Err(msg) = merge_section_patch(section, &mut current, saved_obj) {
                tracing::warn!(key = section.key(), %msg, "ignoring saved setting");
                current = default_section(section);
            }
        }
    }
    Ok(current)
}

/// Configured default for `analytics.top` when no limit is given.
pub fn default_top_count(conn: &rusqlite::Connection) -> anyhow::Result<usize> {
    let section = load_section(conn, SetupSection::Analytics)?;
    let n = section
        .get("defaultTopCount")
        .and_then(|v| v.as_i64())
        .unwrap_or(DEFAULT_TOP_COUNT);
    Ok(n.max(0) as usize)
}

fn handle_setup_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match require_db(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let analytics = match load_section(conn, SetupSection::Analytics) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    ok(&req.id, json!({ "analytics": analytics }))
}

fn handle_setup_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match require_db(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let Some(section_raw) = req.params.get("section").and_then(|v| v.as_str()) else {
        return err(&req.id, "bad_params", "missing section", None);
    };
    let Some(section) = SetupSection::parse(section_raw) else {
        return err(&req.id, "bad_params", "unknown section", None);
    };
    let Some(patch_obj) = req.params.get("patch").and_then(|v| v.as_object()) else {
        return err(&req.id, "bad_params", "patch must be an object", None);
    };

    let mut current = match load_section(conn, section) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    if let Err(msg) = merge_section_patch(section, &mut current, patch_obj) {
        return err(&req.id, "bad_params", msg, None);
    }
    if let Err(e) = db::settings_set_json(conn, section.key(), &current) {
        return err(&req.id, "db_update_failed", e.to_string(), None);
    }
    tracing::info!(section = section_raw, "setup updated");
    ok(&req.id, json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "setup.get" => Some(handle_setup_get(state, req)),
        "setup.update" => Some(handle_setup_update(state, req)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conn() -> rusqlite::Connection {
        let conn = rusqlite::Connection::open_in_memory().expect("open");
        db::init_schema(&conn).expect("schema");
        conn
    }

    #[test]
    fn default_top_count_without_saved_settings() {
        assert_eq!(default_top_count(&conn()).unwrap(), 5);
    }

    #[test]
    fn malformed_saved_section_falls_back_to_defaults() {
        let conn = conn();
        db::settings_set_json(&conn, "setup.analytics", &json!({ "defaultTopCount": 0 }))
            .unwrap();
        assert_eq!(default_top_count(&conn).unwrap(), 5);
        db::settings_set_json(&conn, "setup.analytics", &json!({ "defaultTopCount": 12 }))
            .unwrap();
        assert_eq!(default_top_count(&conn).unwrap(), 12);
    }

    #[test]
    fn merge_rejects_unknown_and_out_of_range() {
        let mut current = default_section(SetupSection::Analytics);
        let patch = json!({ "histogramBins": 4 });
        assert!(merge_section_patch(
            SetupSection::Analytics,
            &mut current,
            patch.as_object().unwrap()
        )
        .is_err());
        let patch = json!({ "defaultTopCount": 101 });
        assert!(merge_section_patch(
            SetupSection::Analytics,
            &mut current,
            patch.as_object().unwrap()
        )
        .is_err());
    }
}
