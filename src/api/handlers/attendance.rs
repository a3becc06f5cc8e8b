//! Attendance recorder and query engine.
//!
//! The ledger is append-only: marking creates one immutable session document
//! (session row plus embedded records) in a single transaction, and no edit or
//! delete operation exists. Queries expand references into display summaries
//! as a read-side projection; the stored rows keep bare identifiers.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use rusqlite::{params_from_iter, Connection};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::attendance::{
    attendance_trend, parse_range_end, parse_range_start, scope_filters, AttendanceStatus,
    RecordView, RefView, SessionFilters, SessionView, StudentRefView, TeacherRefView, Visibility,
};
use crate::directory;
use crate::roles::{Capability, Role};

use super::super::auth::Identity;
use super::super::error::ApiError;
use super::super::types::{ApiJson, AppState};
use super::clean;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkAttendancePayload {
    #[serde(default)]
    pub class_id: Option<String>,
    #[serde(default)]
    pub subject_id: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub teacher_id: Option<String>,
    #[serde(default)]
    pub records: Vec<MarkRecordPayload>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkRecordPayload {
    pub student_id: String,
    #[serde(default)]
    pub status: Option<AttendanceStatus>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceQueryParams {
    pub class_id: Option<String>,
    pub subject_id: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub student_id: Option<String>,
}

pub async fn mark_attendance(
    State(state): State<AppState>,
    identity: Identity,
    ApiJson(payload): ApiJson<MarkAttendancePayload>,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    identity.require(Capability::AttendanceWrite)?;

    let class_id = clean(payload.class_id);
    let Some(class_id) = class_id else {
        return Err(ApiError::validation("Class and attendance records are required"));
    };
    if payload.records.is_empty() {
        return Err(ApiError::validation("Class and attendance records are required"));
    }
    let subject_id = clean(payload.subject_id);

    let date = match payload.date.as_deref().map(str::trim).filter(|d| !d.is_empty()) {
        Some(raw) => parse_range_start(raw)
            .ok_or_else(|| ApiError::validation("date must be YYYY-MM-DD or RFC 3339"))?,
        None => Utc::now(),
    };

    let conn = state.db.lock().await;

    let teacher_id = match clean(payload.teacher_id) {
        Some(id) => Some(id),
        None if identity.role == Role::Teacher => {
            directory::find_teacher_for_user(&conn, &identity.user_id)?
        }
        None => None,
    };
    let teacher_id = match teacher_id {
        Some(id) if directory::teacher_exists(&conn, &id)? => id,
        _ => return Err(ApiError::validation("Teacher information missing")),
    };

    if !directory::class_exists(&conn, &class_id)? {
        return Err(ApiError::validation("class not found"));
    }
    if let Some(subject_id) = subject_id.as_deref() {
        if !directory::subject_exists(&conn, subject_id)? {
            return Err(ApiError::validation("subject not found"));
        }
    }
    for record in &payload.records {
        if !directory::student_exists(&conn, &record.student_id)? {
            return Err(ApiError::validation(format!(
                "student not found: {}",
                record.student_id
            )));
        }
    }

    let session_id = Uuid::new_v4().to_string();
    let now = Utc::now().to_rfc3339();
    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "INSERT INTO attendance_sessions(id, date, class_id, subject_id, marked_by, created_at, updated_at)
         VALUES(?, ?, ?, ?, ?, ?, ?)",
        (
            &session_id,
            &date.to_rfc3339(),
            &class_id,
            &subject_id,
            &teacher_id,
            &now,
            &now,
        ),
    )?;
    for (idx, record) in payload.records.iter().enumerate() {
        tx.execute(
            "INSERT INTO attendance_records(session_id, idx, student_id, status)
             VALUES(?, ?, ?, ?)",
            (
                &session_id,
                idx as i64,
                &record.student_id,
                record.status.unwrap_or(AttendanceStatus::Present).as_str(),
            ),
        )?;
    }
    tx.commit()?;

    let session = load_session(&conn, &session_id)?
        .ok_or_else(|| ApiError::internal(anyhow::anyhow!("session missing after insert")))?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "data": session })),
    ))
}

pub async fn get_attendance(
    State(state): State<AppState>,
    identity: Identity,
    Query(params): Query<AttendanceQueryParams>,
) -> Result<Json<serde_json::Value>, ApiError> {
    identity.require(Capability::AttendanceRead)?;
    let filters = parse_filters(params)?;
    let conn = state.db.lock().await;
    let sessions = visible_sessions(&conn, &identity, filters)?;
    Ok(Json(json!({ "success": true, "data": sessions })))
}

pub async fn get_attendance_trend(
    State(state): State<AppState>,
    identity: Identity,
    Query(params): Query<AttendanceQueryParams>,
) -> Result<Json<serde_json::Value>, ApiError> {
    identity.require(Capability::AttendanceRead)?;
    let filters = parse_filters(params)?;
    let conn = state.db.lock().await;
    let sessions = visible_sessions(&conn, &identity, filters)?;
    Ok(Json(json!({ "success": true, "data": attendance_trend(&sessions) })))
}

fn parse_filters(params: AttendanceQueryParams) -> Result<SessionFilters, ApiError> {
    let from = params
        .from
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(|raw| {
            parse_range_start(raw)
                .ok_or_else(|| ApiError::validation("from must be YYYY-MM-DD or RFC 3339"))
        })
        .transpose()?;
    let to = params
        .to
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(|raw| {
            parse_range_end(raw)
                .ok_or_else(|| ApiError::validation("to must be YYYY-MM-DD or RFC 3339"))
        })
        .transpose()?;
    Ok(SessionFilters {
        class_id: clean(params.class_id),
        subject_id: clean(params.subject_id),
        from,
        to,
        student_id: clean(params.student_id),
    })
}

fn visible_sessions(
    conn: &Connection,
    identity: &Identity,
    filters: SessionFilters,
) -> Result<Vec<SessionView>, ApiError> {
    let caller_student_id = if identity.role == Role::Student {
        directory::find_student_for_user(conn, &identity.user_id)?
    } else {
        None
    };
    match scope_filters(identity.role, caller_student_id, filters) {
        Visibility::Nothing => Ok(Vec::new()),
        Visibility::Scoped(filters) => Ok(query_sessions(conn, &filters)?),
    }
}

struct SessionHead {
    id: String,
    date: String,
    class_id: String,
    class_name: Option<String>,
    subject_id: Option<String>,
    subject_name: Option<String>,
    marked_by: String,
    employee_id: Option<String>,
    created_at: String,
    updated_at: String,
}

impl SessionHead {
    fn into_view(self, records: Vec<RecordView>) -> SessionView {
        SessionView {
            id: self.id,
            date: self.date,
            class: RefView {
                id: self.class_id,
                name: self.class_name,
            },
            subject: self.subject_id.map(|id| RefView {
                id,
                name: self.subject_name,
            }),
            marked_by: TeacherRefView {
                id: self.marked_by,
                employee_id: self.employee_id,
            },
            records,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

const SESSION_HEAD_SQL: &str = "SELECT a.id, a.date, a.class_id, c.name, a.subject_id, s.name,
        a.marked_by, t.employee_id, a.created_at, a.updated_at
     FROM attendance_sessions a
     LEFT JOIN classes c ON c.id = a.class_id
     LEFT JOIN subjects s ON s.id = a.subject_id
     LEFT JOIN teachers t ON t.id = a.marked_by";

fn session_head_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<SessionHead> {
    Ok(SessionHead {
        id: row.get(0)?,
        date: row.get(1)?,
        class_id: row.get(2)?,
        class_name: row.get(3)?,
        subject_id: row.get(4)?,
        subject_name: row.get(5)?,
        marked_by: row.get(6)?,
        employee_id: row.get(7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}

/// Runs the scoped query: sessions most recent first, same-date ties in
/// insertion order, records narrowed to `student_id` when one is active.
fn query_sessions(conn: &Connection, filters: &SessionFilters) -> rusqlite::Result<Vec<SessionView>> {
    let mut sql = format!("{SESSION_HEAD_SQL} WHERE 1=1");
    let mut params: Vec<String> = Vec::new();
    if let Some(class_id) = &filters.class_id {
        sql.push_str(" AND a.class_id = ?");
        params.push(class_id.clone());
    }
    if let Some(subject_id) = &filters.subject_id {
        sql.push_str(" AND a.subject_id = ?");
        params.push(subject_id.clone());
    }
    if let Some(from) = &filters.from {
        sql.push_str(" AND a.date >= ?");
        params.push(from.to_rfc3339());
    }
    if let Some(to) = &filters.to {
        sql.push_str(" AND a.date <= ?");
        params.push(to.to_rfc3339());
    }
    sql.push_str(" ORDER BY a.date DESC, a.rowid");

    let mut stmt = conn.prepare(&sql)?;
    let heads = stmt
        .query_map(params_from_iter(params.iter()), session_head_from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    heads
        .into_iter()
        .map(|head| {
            let records = load_records(conn, &head.id, filters.student_id.as_deref())?;
            Ok(head.into_view(records))
        })
        .collect()
}

fn load_session(conn: &Connection, session_id: &str) -> rusqlite::Result<Option<SessionView>> {
    let sql = format!("{SESSION_HEAD_SQL} WHERE a.id = ?");
    let mut stmt = conn.prepare(&sql)?;
    let mut heads = stmt
        .query_map([session_id], session_head_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    let Some(head) = heads.pop() else {
        return Ok(None);
    };
    let records = load_records(conn, session_id, None)?;
    Ok(Some(head.into_view(records)))
}

fn load_records(
    conn: &Connection,
    session_id: &str,
    student_id: Option<&str>,
) -> rusqlite::Result<Vec<RecordView>> {
    let mut sql = String::from(
        "SELECT r.student_id, r.status, u.name, st.roll_number
         FROM attendance_records r
         LEFT JOIN students st ON st.id = r.student_id
         LEFT JOIN users u ON u.id = st.user_id
         WHERE r.session_id = ?",
    );
    let mut params: Vec<String> = vec![session_id.to_string()];
    if let Some(student_id) = student_id {
        sql.push_str(" AND r.student_id = ?");
        params.push(student_id.to_string());
    }
    sql.push_str(" ORDER BY r.idx");

    let mut stmt = conn.prepare(&sql)?;
    let records = stmt.query_map(params_from_iter(params.iter()), |row| {
        let status_raw: String = row.get(1)?;
        Ok(RecordView {
            student: StudentRefView {
                id: row.get(0)?,
                name: row.get(2)?,
                roll_number: row.get(3)?,
            },
            status: AttendanceStatus::parse(&status_raw).unwrap_or(AttendanceStatus::Present),
        })
    })?
    .collect::<rusqlite::Result<Vec<RecordView>>>();
    records
}
