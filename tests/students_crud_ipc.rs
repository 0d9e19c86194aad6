use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_studentd");
    let mut child = Command::new(exe)
        .env_remove("STUDENTD_WORKSPACE")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn studentd");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

fn request(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let payload = json!({
        "id": id,
        "method": method,
        "params": params,
    });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    assert!(!line.trim().is_empty(), "empty response for {}", method);
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    value
}

fn request_ok(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let value = request(stdin, reader, id, method, params);
    assert!(
        value.get("ok").and_then(|v| v.as_bool()).unwrap_or(false),
        "{} failed: {}",
        method,
        value
    );
    value.get("result").cloned().unwrap_or_else(|| json!({}))
}

fn error_code(value: &serde_json::Value) -> &str {
    value
        .get("error")
        .and_then(|e| e.get("code"))
        .and_then(|v| v.as_str())
        .unwrap_or("")
}

#[test]
fn students_require_a_workspace() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let resp = request(&mut stdin, &mut reader, "1", "students.list", json!({}));
    assert_eq!(resp.get("ok").and_then(|v| v.as_bool()), Some(false));
    assert_eq!(error_code(&resp), "no_workspace");

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn create_update_delete_roundtrip() {
    let workspace = tempfile::tempdir().expect("temp dir");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.path().to_string_lossy() }),
    );

    let created = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "students.create",
        json!({
            "name": "Alice",
            "email": "alice@example.com",
            "course": "Physics",
            "math": 85,
            "science": "90",
            "english": 78
        }),
    );
    let student = created.get("student").expect("student");
    let student_id = student
        .get("id")
        .and_then(|v| v.as_str())
        .expect("id")
        .to_string();
    assert_eq!(student.get("total").and_then(|v| v.as_f64()), Some(253.0));
    assert_eq!(student.get("grade").and_then(|v| v.as_str()), Some("A"));
    assert_eq!(student.get("attendance").and_then(|v| v.as_f64()), Some(100.0));
    assert_eq!(student.get("hasPhoto").and_then(|v| v.as_bool()), Some(false));

    // Only math changes; total and grade follow, other fields stay.
    let updated = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "students.update",
        json!({ "studentId": student_id, "patch": { "math": 40 } }),
    );
    let student = updated.get("student").expect("student");
    assert_eq!(student.get("total").and_then(|v| v.as_f64()), Some(208.0));
    assert_eq!(student.get("grade").and_then(|v| v.as_str()), Some("B"));
    assert_eq!(student.get("name").and_then(|v| v.as_str()), Some("Alice"));
    assert_eq!(student.get("science").and_then(|v| v.as_f64()), Some(90.0));

    // Attendance never moves total/grade.
    let updated = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "students.update",
        json!({ "studentId": student_id, "patch": { "attendance": 50 } }),
    );
    let student = updated.get("student").expect("student");
    assert_eq!(student.get("total").and_then(|v| v.as_f64()), Some(208.0));
    assert_eq!(student.get("attendance").and_then(|v| v.as_f64()), Some(50.0));

    let fetched = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "students.get",
        json!({ "studentId": student_id }),
    );
    assert_eq!(
        fetched
            .get("student")
            .and_then(|s| s.get("email"))
            .and_then(|v| v.as_str()),
        Some("alice@example.com")
    );

    request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "students.delete",
        json!({ "studentId": student_id }),
    );
    let gone = request(
        &mut stdin,
        &mut reader,
        "7",
        "students.get",
        json!({ "studentId": student_id }),
    );
    assert_eq!(error_code(&gone), "not_found");

    let listed = request_ok(&mut stdin, &mut reader, "8", "students.list", json!({}));
    assert_eq!(
        listed
            .get("students")
            .and_then(|v| v.as_array())
            .map(|a| a.len()),
        Some(0)
    );

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn create_validation_and_duplicate_email() {
    let workspace = tempfile::tempdir().expect("temp dir");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.path().to_string_lossy() }),
    );

    let missing = request(
        &mut stdin,
        &mut reader,
        "2",
        "students.create",
        json!({ "name": "NoEmail", "course": "Maths" }),
    );
    assert_eq!(error_code(&missing), "bad_params");

    let blank = request(
        &mut stdin,
        &mut reader,
        "3",
        "students.create",
        json!({ "name": "   ", "email": "x@example.com", "course": "Maths" }),
    );
    assert_eq!(error_code(&blank), "bad_params");

    let first = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "students.create",
        json!({
            "name": "Bob",
            "email": "bob@example.com",
            "course": "Chemistry",
            "math": "not a number",
            "attendance": null
        }),
    );
    let bob = first.get("student").expect("student");
    assert_eq!(bob.get("math").and_then(|v| v.as_f64()), Some(0.0));
    assert_eq!(bob.get("attendance").and_then(|v| v.as_f64()), Some(100.0));
    assert_eq!(bob.get("grade").and_then(|v| v.as_str()), Some("F"));

    let dup = request(
        &mut stdin,
        &mut reader,
        "5",
        "students.create",
        json!({ "name": "Bobby", "email": "bob@example.com", "course": "Maths" }),
    );
    assert_eq!(error_code(&dup), "duplicate_email");

    let other = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "students.create",
        json!({ "name": "Carol", "email": "carol@example.com", "course": "Maths" }),
    );
    let carol_id = other
        .get("student")
        .and_then(|s| s.get("id"))
        .and_then(|v| v.as_str())
        .expect("id")
        .to_string();
    let clash = request(
        &mut stdin,
        &mut reader,
        "7",
        "students.update",
        json!({ "studentId": carol_id, "patch": { "email": "bob@example.com" } }),
    );
    assert_eq!(error_code(&clash), "duplicate_email");

    let empty_patch = request(
        &mut stdin,
        &mut reader,
        "8",
        "students.update",
        json!({ "studentId": carol_id, "patch": {} }),
    );
    assert_eq!(error_code(&empty_patch), "bad_params");

    let unknown = request(
        &mut stdin,
        &mut reader,
        "9",
        "students.update",
        json!({ "studentId": "missing", "patch": { "math": 10 } }),
    );
    assert_eq!(error_code(&unknown), "not_found");

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn photo_upload_and_fetch() {
    let workspace = tempfile::tempdir().expect("temp dir");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.path().to_string_lossy() }),
    );
    let created = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "students.create",
        json!({ "name": "Eve", "email": "eve@example.com", "course": "Chemistry" }),
    );
    let student_id = created
        .get("student")
        .and_then(|s| s.get("id"))
        .and_then(|v| v.as_str())
        .expect("id")
        .to_string();

    let empty = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "students.photo.get",
        json!({ "studentId": student_id }),
    );
    assert_eq!(empty.get("dataBase64").and_then(|v| v.as_str()), Some(""));
    assert!(empty.get("photoSha256").map(|v| v.is_null()).unwrap_or(false));

    // "abc" in base64.
    let stored = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "students.photo.set",
        json!({ "studentId": student_id, "dataBase64": "YWJj" }),
    );
    assert_eq!(stored.get("bytes").and_then(|v| v.as_u64()), Some(3));
    assert_eq!(
        stored.get("photoSha256").and_then(|v| v.as_str()),
        Some("ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad")
    );

    let fetched = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "students.photo.get",
        json!({ "studentId": student_id }),
    );
    assert_eq!(fetched.get("dataBase64").and_then(|v| v.as_str()), Some("YWJj"));

    let bad = request(
        &mut stdin,
        &mut reader,
        "6",
        "students.photo.set",
        json!({ "studentId": student_id, "dataBase64": "***" }),
    );
    assert_eq!(error_code(&bad), "bad_params");

    let missing = request(
        &mut stdin,
        &mut reader,
        "7",
        "students.photo.set",
        json!({ "studentId": "nope", "dataBase64": "YWJj" }),
    );
    assert_eq!(error_code(&missing), "not_found");

    drop(stdin);
    let _ = child.wait();
}
