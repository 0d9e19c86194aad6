use serde_json::json;

use crate::calc::{self, PredictInput};
use crate::ipc::error::{err, ok, store_err};
use crate::ipc::helpers::require_db;
use crate::ipc::types::{AppState, Request};
use crate::store;

fn handle_grades_classify(_state: &mut AppState, req: &Request) -> serde_json::Value {
    let average = calc::coerce_f64(req.params.get("average"), 0.0);
    ok(
        &req.id,
        json!({ "average": average, "grade": calc::classify(average) }),
    )
}

fn handle_grades_predict(_state: &mut AppState, req: &Request) -> serde_json::Value {
    let p = &req.params;
    let prediction = calc::predict(PredictInput {
        math: p.get("math"),
        science: p.get("science"),
        english: p.get("english"),
        marks: p.get("marks"),
        attendance: p.get("attendance"),
    });
    ok(&req.id, json!(prediction))
}

fn handle_insights_generate(state: &mut AppState, req: &Request) -> serde_json::Value {
    let p = &req.params;

    // A stored student supplies its own scores and attendance.
    let student_id = match p.get("studentId") {
        None | Some(serde_json::Value::Null) => None,
        Some(serde_json::Value::String(s)) => Some(s.as_str()),
        Some(_) => {
            return err(&req.id, "bad_params", "studentId must be a string", None);
        }
    };
    if let Some(student_id) = student_id {
        let conn = match require_db(state, req) {
            Ok(c) => c,
            Err(resp) => return resp,
        };
        return match store::get_student(conn, student_id) {
            Ok(s) => ok(
                &req.id,
                json!(calc::generate_insights(
                    s.math,
                    s.science,
                    s.english,
                    s.attendance
                )),
            ),
            Err(e) => store_err(&req.id, e, "db_query_failed"),
        };
    }

    let insights = calc::generate_insights_from_json(
        p.get("math"),
        p.get("science"),
        p.get("english"),
        p.get("attendance"),
    );
    ok(&req.id, json!(insights))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "grades.classify" => Some(handle_grades_classify(state, req)),
        "grades.predict" => Some(handle_grades_predict(state, req)),
        "insights.generate" => Some(handle_insights_generate(state, req)),
        _ => None,
    }
}
