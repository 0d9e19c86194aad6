use serde::Serialize;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use crate::store::Student;

pub const ATTENDANCE_WARNING_BELOW: f64 = 75.0;

const ATTENDANCE_SUGGESTION: &str = "Attend classes regularly to improve learning consistency.";
const ON_TRACK_SUGGESTION: &str =
    "Great performance! Continue with regular revision and mock tests.";

/// Letter grade. Variant order is the grade order, lowest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Grade {
    #[serde(rename = "F")]
    F,
    #[serde(rename = "C")]
    C,
    #[serde(rename = "B")]
    B,
    #[serde(rename = "B+")]
    BPlus,
    #[serde(rename = "A")]
    A,
    #[serde(rename = "A+")]
    APlus,
}

impl Grade {
    pub fn as_str(self) -> &'static str {
        match self {
            Grade::F => "F",
            Grade::C => "C",
            Grade::B => "B",
            Grade::BPlus => "B+",
            Grade::A => "A",
            Grade::APlus => "A+",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "F" => Some(Grade::F),
            "C" => Some(Grade::C),
            "B" => Some(Grade::B),
            "B+" => Some(Grade::BPlus),
            "A" => Some(Grade::A),
            "A+" => Some(Grade::APlus),
            _ => None,
        }
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Maps an average to a letter grade. Inclusive lower bounds, checked high to
/// low; values outside 0..=100 are not clamped. NaN falls through to `F`.
pub fn classify(average: f64) -> Grade {
    if average >= 90.0 {
        Grade::APlus
    } else if average >= 80.0 {
        Grade::A
    } else if average >= 70.0 {
        Grade::BPlus
    } else if average >= 60.0 {
        Grade::B
    } else if average >= 50.0 {
        Grade::C
    } else {
        Grade::F
    }
}

/// Magnitude from which `x * 100` has no fractional bits left (2^52 / 100).
const ROUND_2_PASS_THROUGH: f64 = 4_503_599_627_370_496.0 / 100.0;

/// Rounds to 2 decimals. A tie that is exact in binary goes to the even
/// neighbour (so 0.125 -> 0.12, 0.375 -> 0.38). Non-finite values and
/// magnitudes past `ROUND_2_PASS_THROUGH` come back unchanged.
pub fn round_2(x: f64) -> f64 {
    if !x.is_finite() || x.abs() >= ROUND_2_PASS_THROUGH {
        return x;
    }
    let scaled = x * 100.0;
    // Exact rounding error of the product: tells a true tie from one the
    // multiplication produced.
    let err = x.mul_add(100.0, -scaled);
    let floor = scaled.floor();
    let rounded = if scaled - floor == 0.5 {
        let up = if err != 0.0 {
            err > 0.0
        } else {
            floor % 2.0 != 0.0
        };
        if up {
            floor + 1.0
        } else {
            floor
        }
    } else {
        scaled.round()
    };
    rounded / 100.0
}

/// Arithmetic mean that stays finite for finite input and never leaves
/// `[min, max]` of the values. Empty input gives 0.
fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let n = values.len() as f64;
    let sum: f64 = values.iter().sum();
    let raw = if sum.is_finite() {
        sum / n
    } else {
        values.iter().map(|v| v / n).sum()
    };
    let lo = values.iter().copied().fold(f64::INFINITY, f64::min);
    let hi = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if raw.is_nan() {
        raw
    } else {
        raw.clamp(lo, hi)
    }
}

/// Numeric coercion policy for request input.
///
/// Numbers pass through, numeric strings are parsed, booleans become 1/0.
/// Anything else (absent, null, blank or unparseable text, arrays, objects,
/// non-finite values) becomes `default`. Never fails.
pub fn coerce_f64(value: Option<&serde_json::Value>, default: f64) -> f64 {
    try_coerce_f64(value).unwrap_or(default)
}

/// The parse half of [`coerce_f64`]: `None` where the policy would default.
pub fn try_coerce_f64(value: Option<&serde_json::Value>) -> Option<f64> {
    let parsed = match value {
        Some(serde_json::Value::Number(n)) => n.as_f64(),
        Some(serde_json::Value::String(s)) => s.trim().parse::<f64>().ok(),
        Some(serde_json::Value::Bool(b)) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    };
    parsed.filter(|v| v.is_finite())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Subject {
    Math,
    Science,
    English,
}

impl Subject {
    pub const ALL: [Subject; 3] = [Subject::Math, Subject::Science, Subject::English];

    fn remediation(self) -> &'static str {
        match self {
            Subject::Math => "Practice topic-wise Math problems and revise formulas.",
            Subject::Science => "Revise Science fundamentals and perform simple experiments.",
            Subject::English => "Improve vocabulary and practice comprehension passages.",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Insights {
    pub average: f64,
    pub grade: Grade,
    pub weak_subjects: Vec<Subject>,
    pub suggestions: Vec<String>,
}

pub fn generate_insights(math: f64, science: f64, english: f64, attendance: f64) -> Insights {
    let exact = mean(&[math, science, english]);
    let average = round_2(exact);
    let grade = classify(average);

    // Below the unrounded mean too, so rounding up cannot mark all three.
    let weak_subjects: Vec<Subject> = Subject::ALL
        .into_iter()
        .zip([math, science, english])
        .filter(|(_, score)| *score < average && *score < exact)
        .map(|(subject, _)| subject)
        .collect();

    let mut suggestions: Vec<String> = weak_subjects
        .iter()
        .map(|s| s.remediation().to_string())
        .collect();
    if attendance < ATTENDANCE_WARNING_BELOW {
        suggestions.push(ATTENDANCE_SUGGESTION.to_string());
    }
    if suggestions.is_empty() {
        suggestions.push(ON_TRACK_SUGGESTION.to_string());
    }

    Insights {
        average,
        grade,
        weak_subjects,
        suggestions,
    }
}

/// Same as [`generate_insights`], coercing every input with default 0.
pub fn generate_insights_from_json(
    math: Option<&serde_json::Value>,
    science: Option<&serde_json::Value>,
    english: Option<&serde_json::Value>,
    attendance: Option<&serde_json::Value>,
) -> Insights {
    generate_insights(
        coerce_f64(math, 0.0),
        coerce_f64(science, 0.0),
        coerce_f64(english, 0.0),
        coerce_f64(attendance, 0.0),
    )
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Prediction {
    pub average: f64,
    pub predicted_grade: Grade,
    pub insights: Insights,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PredictInput<'a> {
    pub math: Option<&'a serde_json::Value>,
    pub science: Option<&'a serde_json::Value>,
    pub english: Option<&'a serde_json::Value>,
    pub marks: Option<&'a serde_json::Value>,
    pub attendance: Option<&'a serde_json::Value>,
}

/// Grade prediction. When all three subject scores are zero and a `marks`
/// figure is supplied, that figure stands in for the average and for each
/// subject score.
pub fn predict(input: PredictInput<'_>) -> Prediction {
    let math = coerce_f64(input.math, 0.0);
    let science = coerce_f64(input.science, 0.0);
    let english = coerce_f64(input.english, 0.0);
    let attendance = coerce_f64(input.attendance, 100.0);

    let marks = input.marks.filter(|v| !v.is_null());
    let all_zero = math == 0.0 && science == 0.0 && english == 0.0;

    let (average, insights) = match marks {
        Some(m) if all_zero => {
            let avg = coerce_f64(Some(m), 0.0);
            (avg, generate_insights(avg, avg, avg, attendance))
        }
        _ => (
            mean(&[math, science, english]),
            generate_insights(math, science, english, attendance),
        ),
    };

    Prediction {
        average: round_2(average),
        predicted_grade: classify(average),
        insights,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopStudent {
    pub id: String,
    pub name: String,
    pub course: String,
    pub total: f64,
    pub grade: Grade,
}

/// At most `n` students by total, highest first. Ties keep input order.
pub fn top(students: &[Student], n: usize) -> Vec<TopStudent> {
    let mut ranked: Vec<&Student> = students.iter().collect();
    // Vec::sort_by is stable.
    ranked.sort_by(|a, b| b.total.partial_cmp(&a.total).unwrap_or(Ordering::Equal));
    ranked
        .into_iter()
        .take(n)
        .map(|s| TopStudent {
            id: s.id.clone(),
            name: s.name.clone(),
            course: s.course.clone(),
            total: s.total,
            grade: s.grade,
        })
        .collect()
}

/// Mean total per course, rounded to 2 decimals. Only observed courses appear.
pub fn course_averages(students: &[Student]) -> BTreeMap<String, f64> {
    let mut totals: BTreeMap<String, Vec<f64>> = BTreeMap::new();
    for s in students {
        totals.entry(s.course.clone()).or_default().push(s.total);
    }
    totals
        .into_iter()
        .map(|(course, values)| (course, round_2(mean(&values))))
        .collect()
}
