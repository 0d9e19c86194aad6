use chrono::{SecondsFormat, Utc};
use rusqlite::{Connection, OptionalExtension, Row};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::calc::{self, Grade};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("student not found")]
    NotFound,

    #[error("email already exists: {0}")]
    DuplicateEmail(String),

    #[error("{0}")]
    Invalid(String),

    #[error(transparent)]
    Db(#[from] rusqlite::Error),
}

impl StoreError {
    /// Stable error code for the response envelope.
    pub fn code(&self, db_code: &'static str) -> &'static str {
        match self {
            StoreError::NotFound => "not_found",
            StoreError::DuplicateEmail(_) => "duplicate_email",
            StoreError::Invalid(_) => "bad_params",
            StoreError::Db(_) => db_code,
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: String,
    pub name: String,
    pub email: String,
    pub course: String,
    pub math: f64,
    pub science: f64,
    pub english: f64,
    pub attendance: f64,
    pub total: f64,
    pub grade: Grade,
    pub has_photo: bool,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone)]
pub struct NewStudent {
    pub name: String,
    pub email: String,
    pub course: String,
    pub math: f64,
    pub science: f64,
    pub english: f64,
    pub attendance: f64,
}

impl NewStudent {
    pub fn new(name: &str, email: &str, course: &str) -> Self {
        Self {
            name: name.to_string(),
            email: email.to_string(),
            course: course.to_string(),
            math: 0.0,
            science: 0.0,
            english: 0.0,
            attendance: 100.0,
        }
    }

    pub fn scores(mut self, math: f64, science: f64, english: f64) -> Self {
        self.math = math;
        self.science = science;
        self.english = english;
        self
    }

    pub fn attendance(mut self, attendance: f64) -> Self {
        self.attendance = attendance;
        self
    }
}

/// Partial update. `None` leaves the stored value alone.
#[derive(Debug, Clone, Default)]
pub struct StudentPatch {
    pub name: Option<String>,
    pub email: Option<String>,
    pub course: Option<String>,
    pub math: Option<f64>,
    pub science: Option<f64>,
    pub english: Option<f64>,
    pub attendance: Option<f64>,
}

/// Total and grade are always derived together from the three subject scores.
pub fn total_and_grade(math: f64, science: f64, english: f64) -> (f64, Grade) {
    let total = math + science + english;
    (total, calc::classify(total / 3.0))
}

fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn required_text(field: &str, value: &str) -> StoreResult<String> {
    let t = value.trim();
    if t.is_empty() {
        return Err(StoreError::Invalid(format!("{} must not be empty", field)));
    }
    Ok(t.to_string())
}

const STUDENT_COLUMNS: &str = "id, name, email, course, math, science, english, attendance,
     total, grade, photo IS NOT NULL, COALESCE(created_at, ''), COALESCE(updated_at, '')";

fn student_from_row(row: &Row<'_>) -> rusqlite::Result<Student> {
    let total: f64 = row.get(8)?;
    let grade_raw: String = row.get(9)?;
    let has_photo: i64 = row.get(10)?;
    Ok(Student {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        course: row.get(3)?,
        math: row.get(4)?,
        science: row.get(5)?,
        english: row.get(6)?,
        attendance: row.get(7)?,
        total,
        grade: Grade::parse(&grade_raw).unwrap_or_else(|| calc::classify(total / 3.0)),
        has_photo: has_photo != 0,
        created_at: row.get(11)?,
        updated_at: row.get(12)?,
    })
}

pub fn list_students(conn: &Connection) -> StoreResult<Vec<Student>> {
    let sql = format!("SELECT {} FROM students ORDER BY rowid", STUDENT_COLUMNS);
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([], student_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn get_student(conn: &Connection, student_id: &str) -> StoreResult<Student> {
    let sql = format!("SELECT {} FROM students WHERE id = ?", STUDENT_COLUMNS);
    conn.query_row(&sql, [student_id], student_from_row)
        .optional()?
        .ok_or(StoreError::NotFound)
}

fn email_owner(conn: &Connection, email: &str) -> StoreResult<Option<String>> {
    Ok(conn
        .query_row("SELECT id FROM students WHERE email = ?", [email], |r| {
            r.get(0)
        })
        .optional()?)
}

pub fn create_student(conn: &Connection, input: NewStudent) -> StoreResult<Student> {
    let name = required_text("name", &input.name)?;
    let email = required_text("email", &input.email)?;
    let course = required_text("course", &input.course)?;

    if email_owner(conn, &email)?.is_some() {
        return Err(StoreError::DuplicateEmail(email));
    }

    let (total, grade) = total_and_grade(input.math, input.science, input.english);
    let student_id = Uuid::new_v4().to_string();
    let now = now_rfc3339();
    conn.execute(
        "INSERT INTO students(
           id, name, email, course, math, science, english, attendance,
           total, grade, created_at, updated_at
         ) VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        (
            &student_id,
            &name,
            &email,
            &course,
            input.math,
            input.science,
            input.english,
            input.attendance,
            total,
            grade.as_str(),
            &now,
            &now,
        ),
    )?;
    tracing::info!(student_id = %student_id, %grade, "student created");

    get_student(conn, &student_id)
}

pub fn update_student(
    conn: &Connection,
    student_id: &str,
    patch: StudentPatch,
) -> StoreResult<Student> {
    let mut s = get_student(conn, student_id)?;

    if let Some(v) = patch.name {
        s.name = required_text("name", &v)?;
    }
    if let Some(v) = patch.email {
        let email = required_text("email", &v)?;
        if let Some(owner) = email_owner(conn, &email)? {
            if owner != s.id {
                return Err(StoreError::DuplicateEmail(email));
            }
        }
        s.email = email;
    }
    if let Some(v) = patch.course {
        s.course = required_text("course", &v)?;
    }
    if let Some(v) = patch.math {
        s.math = v;
    }
    if let Some(v) = patch.science {
        s.science = v;
    }
    if let Some(v) = patch.english {
        s.english = v;
    }
    if let Some(v) = patch.attendance {
        s.attendance = v;
    }

    let (total, grade) = total_and_grade(s.math, s.science, s.english);
    let changed = conn.execute(
        "UPDATE students
         SET name = ?, email = ?, course = ?, math = ?, science = ?, english = ?,
             attendance = ?, total = ?, grade = ?, updated_at = ?
         WHERE id = ?",
        (
            &s.name,
            &s.email,
            &s.course,
            s.math,
            s.science,
            s.english,
            s.attendance,
            total,
            grade.as_str(),
            now_rfc3339(),
            &s.id,
        ),
    )?;
    if changed == 0 {
        return Err(StoreError::NotFound);
    }
    tracing::info!(student_id = %s.id, %grade, "student updated");

    get_student(conn, &s.id)
}

pub fn delete_student(conn: &Connection, student_id: &str) -> StoreResult<()> {
    let changed = conn.execute("DELETE FROM students WHERE id = ?", [student_id])?;
    if changed == 0 {
        return Err(StoreError::NotFound);
    }
    tracing::info!(student_id, "student deleted");
    Ok(())
}

pub fn set_photo(conn: &Connection, student_id: &str, bytes: &[u8]) -> StoreResult<()> {
    let changed = conn.execute(
        "UPDATE students SET photo = ?, updated_at = ? WHERE id = ?",
        (bytes, now_rfc3339(), student_id),
    )?;
    if changed == 0 {
        return Err(StoreError::NotFound);
    }
    tracing::info!(student_id, bytes = bytes.len(), "student photo stored");
    Ok(())
}

/// `Ok(None)` when the student exists but has no photo.
pub fn photo(conn: &Connection, student_id: &str) -> StoreResult<Option<Vec<u8>>> {
    let row: Option<Option<Vec<u8>>> = conn
        .query_row(
            "SELECT photo FROM students WHERE id = ?",
            [student_id],
            |r| r.get(0),
        )
        .optional()?;
    row.ok_or(StoreError::NotFound)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SeedSummary {
    pub inserted: usize,
    pub skipped: usize,
}

/// Demo roster: (name, email, course, math, science, english, attendance).
const SAMPLES: [(&str, &str, &str, f64, f64, f64, f64); 5] = [
    ("Alice", "alice@example.com", "Physics", 85.0, 90.0, 78.0, 95.0),
    ("Bob", "bob@example.com", "Chemistry", 72.0, 65.0, 70.0, 88.0),
    ("Carol", "carol@example.com", "Maths", 92.0, 88.0, 90.0, 98.0),
    ("David", "david@example.com", "Physics", 60.0, 55.0, 58.0, 80.0),
    ("Eve", "eve@example.com", "Chemistry", 78.0, 82.0, 75.0, 85.0),
];

/// Inserts the demo roster. Existing emails are skipped; `replace` clears
/// the table first.
pub fn seed_samples(conn: &Connection, replace: bool) -> StoreResult<SeedSummary> {
    let tx = conn.unchecked_transaction()?;
    if replace {
        let removed = tx.execute("DELETE FROM students", [])?;
        tracing::info!(removed, "cleared students before seeding");
    }

    let mut summary = SeedSummary::default();
    for (name, email, course, math, science, english, attendance) in SAMPLES {
        let input = NewStudent::new(name, email, course)
            .scores(math, science, english)
            .attendance(attendance);
        match create_student(&tx, input) {
            Ok(_) => summary.inserted += 1,
            Err(StoreError::DuplicateEmail(_)) => summary.skipped += 1,
            Err(e) => return Err(e),
        }
    }
    tx.commit()?;
    Ok(summary)
}
