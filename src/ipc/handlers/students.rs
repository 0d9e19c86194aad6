use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::json;
use sha2::{Digest, Sha256};

use crate::calc;
use crate::ipc::error::{err, ok, store_err};
use crate::ipc::helpers::{optional_patch_str, require_db, required_str};
use crate::ipc::types::{AppState, Request};
use crate::store::{self, NewStudent, StudentPatch};

pub const MAX_PHOTO_BYTES: usize = 5 * 1024 * 1024;

const PATCH_FIELDS: [&str; 7] = [
    "name",
    "email",
    "course",
    "math",
    "science",
    "english",
    "attendance",
];

fn handle_students_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match require_db(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    match store::list_students(conn) {
        Ok(students) => ok(&req.id, json!({ "students": students })),
        Err(e) => store_err(&req.id, e, "db_query_failed"),
    }
}

fn handle_students_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match require_db(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let student_id = match required_str(req, "studentId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match store::get_student(conn, student_id) {
        Ok(student) => ok(&req.id, json!({ "student": student })),
        Err(e) => store_err(&req.id, e, "db_query_failed"),
    }
}

fn handle_students_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match require_db(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };

    let text = |key: &str| {
        req.params
            .get(key)
            .and_then(|v| v.as_str())
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    };
    let (Some(name), Some(email), Some(course)) = (text("name"), text("email"), text("course"))
    else {
        tracing::debug!("create rejected: missing required fields");
        return err(
            &req.id,
            "bad_params",
            "missing required fields: name, email, course",
            None,
        );
    };

    let p = &req.params;
    let input = NewStudent::new(&name, &email, &course)
        .scores(
            calc::coerce_f64(p.get("math"), 0.0),
            calc::coerce_f64(p.get("science"), 0.0),
            calc::coerce_f64(p.get("english"), 0.0),
        )
        .attendance(calc::coerce_f64(p.get("attendance"), 100.0));

    match store::create_student(conn, input) {
        Ok(student) => ok(&req.id, json!({ "student": student })),
        Err(e) => store_err(&req.id, e, "db_insert_failed"),
    }
}

fn parse_patch(patch: &serde_json::Map<String, serde_json::Value>) -> Result<StudentPatch, String> {
    if !patch.keys().any(|k| PATCH_FIELDS.contains(&k.as_str())) {
        return Err("patch must include at least one field".into());
    }
    // Scores that do not parse keep their current value.
    let score = |key: &str| patch.get(key).and_then(|v| calc::try_coerce_f64(Some(v)));
    Ok(StudentPatch {
        name: optional_patch_str(patch, "name")?,
        email: optional_patch_str(patch, "email")?,
        course: optional_patch_str(patch, "course")?,
        math: score("math"),
        science: score("science"),
        english: score("english"),
        attendance: score("attendance"),
    })
}

fn handle_students_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match require_db(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let student_id = match required_str(req, "studentId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let Some(patch_obj) = req.params.get("patch").and_then(|v| v.as_object()) else {
        return err(&req.id, "bad_params", "missing/invalid patch", None);
    };
    let patch = match parse_patch(patch_obj) {
        Ok(p) => p,
        Err(msg) => return err(&req.id, "bad_params", msg, None),
    };

    match store::update_student(conn, student_id, patch) {
        Ok(student) => ok(&req.id, json!({ "student": student })),
        Err(e) => store_err(&req.id, e, "db_update_failed"),
    }
}

fn handle_students_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match require_db(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let student_id = match required_str(req, "studentId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match store::delete_student(conn, student_id) {
        Ok(()) => ok(&req.id, json!({ "ok": true })),
        Err(e) => store_err(&req.id, e, "db_delete_failed"),
    }
}

fn sha256_hex(bytes: &[u8]) -> String {
    Sha256::digest(bytes)
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

fn handle_photo_set(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match require_db(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let student_id = match required_str(req, "studentId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let encoded = match required_str(req, "dataBase64") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let bytes = match STANDARD.decode(encoded.trim()) {
        Ok(b) => b,
        Err(e) => {
            return err(
                &req.id,
                "bad_params",
                format!("dataBase64 is not valid base64: {}", e),
                None,
            )
        }
    };
    if bytes.is_empty() {
        return err(&req.id, "bad_params", "photo must not be empty", None);
    }
    if bytes.len() > MAX_PHOTO_BYTES {
        return err(
            &req.id,
            "bad_params",
            "photo too large",
            Some(json!({ "bytes": bytes.len(), "maxBytes": MAX_PHOTO_BYTES })),
        );
    }

    match store::set_photo(conn, student_id, &bytes) {
        Ok(()) => ok(
            &req.id,
            json!({ "photoSha256": sha256_hex(&bytes), "bytes": bytes.len() }),
        ),
        Err(e) => store_err(&req.id, e, "db_update_failed"),
    }
}

fn handle_photo_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match require_db(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let student_id = match required_str(req, "studentId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match store::photo(conn, student_id) {
        Ok(Some(bytes)) => ok(
            &req.id,
            json!({
                "dataBase64": STANDARD.encode(&bytes),
                "photoSha256": sha256_hex(&bytes)
            }),
        ),
        Ok(None) => ok(&req.id, json!({ "dataBase64": "", "photoSha256": null })),
        Err(e) => store_err(&req.id, e, "db_query_failed"),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "students.list" => Some(handle_students_list(state, req)),
        "students.get" => Some(handle_students_get(state, req)),
        "students.create" => Some(handle_students_create(state, req)),
        "students.update" => Some(handle_students_update(state, req)),
        "students.delete" => Some(handle_students_delete(state, req)),
        "students.photo.set" => Some(handle_photo_set(state, req)),
        "students.photo.get" => Some(handle_photo_get(state, req)),
        _ => None,
    }
}
