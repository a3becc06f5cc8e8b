//! Attendance ledger domain: per-record status, role-based query scoping and
//! the dashboard trend aggregation. Everything here is pure; the SQL that
//! feeds it lives in the attendance API handler.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::roles::Role;

/// Number of distinct date labels kept by the trend view.
pub const TREND_WINDOW: usize = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttendanceStatus {
    Present,
    Absent,
    Late,
}

impl AttendanceStatus {
    pub fn parse(raw: &str) -> Option<AttendanceStatus> {
        match raw {
            "present" => Some(AttendanceStatus::Present),
            "absent" => Some(AttendanceStatus::Absent),
            "late" => Some(AttendanceStatus::Late),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AttendanceStatus::Present => "present",
            AttendanceStatus::Absent => "absent",
            AttendanceStatus::Late => "late",
        }
    }
}

/// Filters accepted by the query engine, after request parsing. `student_id`
/// narrows each session's records; for student callers it is forced to the
/// caller's own identity by [`scope_filters`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionFilters {
    pub class_id: Option<String>,
    pub subject_id: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub student_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Visibility {
    Scoped(SessionFilters),
    /// The caller can see nothing; the response is success with no data.
    Nothing,
}

/// Role-based visibility scoping as a pure step, independent of storage.
///
/// Admin and teacher callers see every matching session. A student caller has
/// `student_id` overwritten with their own Student identity regardless of what
/// the request carried; a student with no Student profile sees nothing.
pub fn scope_filters(
    role: Role,
    caller_student_id: Option<String>,
    mut filters: SessionFilters,
) -> Visibility {
    match role {
        Role::Admin | Role::Teacher => Visibility::Scoped(filters),
        Role::Student => match caller_student_id {
            Some(student_id) => {
                filters.student_id = Some(student_id);
                Visibility::Scoped(filters)
            }
            None => Visibility::Nothing,
        },
    }
}

// --- read-side projection shapes -------------------------------------------
//
// The ledger stores bare identifiers; these views attach the display fields
// the client renders. A reference whose directory row has been deleted keeps
// its id and loses the display fields.

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefView {
    pub id: String,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TeacherRefView {
    pub id: String,
    pub employee_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentRefView {
    pub id: String,
    pub name: Option<String>,
    pub roll_number: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordView {
    pub student: StudentRefView,
    pub status: AttendanceStatus,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub id: String,
    pub date: String,
    pub class: RefView,
    pub subject: Option<RefView>,
    pub marked_by: TeacherRefView,
    pub records: Vec<RecordView>,
    pub created_at: String,
    pub updated_at: String,
}

// --- trend aggregation ------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendPoint {
    pub date: String,
    pub present: i64,
    pub total: i64,
}

/// Per-date present/total counts for the dashboard chart.
///
/// Input is the query engine's result set, most recent first. Sessions sharing
/// a calendar-date label are summed into one point; the window keeps the
/// [`TREND_WINDOW`] most recent labels and is returned in ascending order for
/// charting.
pub fn attendance_trend(sessions: &[SessionView]) -> Vec<TrendPoint> {
    let mut points: Vec<TrendPoint> = Vec::new();
    for session in sessions {
        let label = date_label(session);
        let present = session
            .records
            .iter()
            .filter(|r| r.status == AttendanceStatus::Present)
            .count() as i64;
        let total = session.records.len() as i64;
        let len = points.len();
        match points.iter_mut().find(|p| p.date == label) {
            Some(point) => {
                point.present += present;
                point.total += total;
            }
            None if len < TREND_WINDOW => points.push(TrendPoint {
                date: label,
                present,
                total,
            }),
            // Older than the newest TREND_WINDOW labels.
            None => {}
        }
    }
    points.reverse();
    points
}

fn date_label(session: &SessionView) -> String {
    let raw = if session.date.is_empty() {
        &session.created_at
    } else {
        &session.date
    };
    DateTime::parse_from_rfc3339(raw)
        .map(|d| d.date_naive().to_string())
        .unwrap_or_else(|_| raw.clone())
}

// --- date parsing -----------------------------------------------------------

/// Parses a session date or a range start: RFC 3339, or a bare `YYYY-MM-DD`
/// taken as midnight UTC.
pub fn parse_range_start(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    let date = raw.parse::<NaiveDate>().ok()?;
    Some(date.and_hms_opt(0, 0, 0)?.and_utc())
}

/// Parses a range end. A bare `YYYY-MM-DD` covers the whole day so the range
/// stays inclusive by calendar date.
pub fn parse_range_end(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    let date = raw.parse::<NaiveDate>().ok()?;
    Some(date.and_hms_opt(23, 59, 59)?.and_utc())
}
