use serde_json::json;

use crate::calc;
use crate::ipc::error::{err, ok, store_err};
use crate::ipc::handlers::setup;
use crate::ipc::helpers::{optional_count, require_db};
use crate::ipc::types::{AppState, Request};
use crate::store;

fn handle_analytics_top(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match require_db(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let limit = match optional_count(req, "limit") {
        Ok(Some(n)) => n,
        Ok(None) => match setup::default_top_count(conn) {
            Ok(n) => n,
            Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
        },
        Err(resp) => return resp,
    };

    let students = match store::list_students(conn) {
        Ok(v) => v,
        Err(e) => return store_err(&req.id, e, "db_query_failed"),
    };
    let top = calc::top(&students, limit);
    tracing::debug!(limit, returned = top.len(), "top students");
    ok(&req.id, json!({ "limit": limit, "students": top }))
}

fn handle_analytics_courses(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match require_db(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    match store::list_students(conn) {
        Ok(students) => ok(
            &req.id,
            json!({ "courses": calc::course_averages(&students) }),
        ),
        Err(e) => store_err(&req.id, e, "db_query_failed"),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "analytics.top" => Some(handle_analytics_top(state, req)),
        "analytics.courses" => Some(handle_analytics_courses(state, req)),
        _ => None,
    }
}
