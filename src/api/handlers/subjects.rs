use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use rusqlite::{Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::attendance::{RefView, TeacherRefView};
use crate::directory;
use crate::roles::Capability;

use super::super::auth::Identity;
use super::super::error::ApiError;
use super::super::types::{ApiJson, AppState};
use super::clean;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectPayload {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub class_id: Option<String>,
    #[serde(default)]
    pub teacher_id: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SubjectView {
    id: String,
    name: String,
    code: String,
    description: Option<String>,
    class: Option<RefView>,
    teacher: Option<TeacherRefView>,
}

pub async fn list(
    State(state): State<AppState>,
    identity: Identity,
) -> Result<Json<serde_json::Value>, ApiError> {
    identity.require(Capability::SubjectsRead)?;
    let conn = state.db.lock().await;
    let mut stmt = conn.prepare(&format!("{SUBJECT_VIEW_SQL} ORDER BY s.name"))?;
    let subjects = stmt
        .query_map([], subject_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Json(json!({ "success": true, "data": subjects })))
}

pub async fn get_one(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    identity.require(Capability::SubjectsRead)?;
    let conn = state.db.lock().await;
    let subject = load_subject(&conn, &id)?.ok_or_else(|| ApiError::not_found("Subject not found"))?;
    Ok(Json(json!({ "success": true, "data": subject })))
}

pub async fn create(
    State(state): State<AppState>,
    identity: Identity,
    ApiJson(payload): ApiJson<SubjectPayload>,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    identity.require(Capability::SubjectsWrite)?;
    let (Some(name), Some(code)) = (clean(payload.name), clean(payload.code)) else {
        return Err(ApiError::validation("Missing required subject fields"));
    };
    let class_id = clean(payload.class_id);
    let teacher_id = clean(payload.teacher_id);

    let conn = state.db.lock().await;
    if code_taken(&conn, &code)? {
        return Err(ApiError::conflict("Subject code already used"));
    }
    if let Some(class_id) = class_id.as_deref() {
        if !directory::class_exists(&conn, class_id)? {
            return Err(ApiError::validation("class not found"));
        }
    }
    if let Some(teacher_id) = teacher_id.as_deref() {
        if !directory::teacher_exists(&conn, teacher_id)? {
            return Err(ApiError::validation("teacher not found"));
        }
    }

    let id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO subjects(id, name, code, class_id, teacher_id, description)
         VALUES(?, ?, ?, ?, ?, ?)",
        (&id, &name, &code, &class_id, &teacher_id, &payload.description),
    )?;

    let subject = load_subject(&conn, &id)?
        .ok_or_else(|| ApiError::internal(anyhow::anyhow!("subject missing after insert")))?;
    Ok((StatusCode::CREATED, Json(json!({ "success": true, "data": subject }))))
}

pub async fn update(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<String>,
    ApiJson(payload): ApiJson<SubjectPayload>,
) -> Result<Json<serde_json::Value>, ApiError> {
    identity.require(Capability::SubjectsWrite)?;
    let conn = state.db.lock().await;
    if !directory::subject_exists(&conn, &id)? {
        return Err(ApiError::not_found("Subject not found"));
    }
    if let Some(name) = clean(payload.name) {
        conn.execute("UPDATE subjects SET name = ? WHERE id = ?", (&name, &id))?;
    }
    if let Some(code) = clean(payload.code) {
        conn.execute("UPDATE subjects SET code = ? WHERE id = ?", (&code, &id))?;
    }
    if let Some(class_id) = clean(payload.class_id) {
        if !directory::class_exists(&conn, &class_id)? {
            return Err(ApiError::validation("class not found"));
        }
        conn.execute("UPDATE subjects SET class_id = ? WHERE id = ?", (&class_id, &id))?;
    }
    if let Some(teacher_id) = clean(payload.teacher_id) {
        if !directory::teacher_exists(&conn, &teacher_id)? {
            return Err(ApiError::validation("teacher not found"));
        }
        conn.execute("UPDATE subjects SET teacher_id = ? WHERE id = ?", (&teacher_id, &id))?;
    }
    if let Some(description) = payload.description {
        conn.execute("UPDATE subjects SET description = ? WHERE id = ?", (&description, &id))?;
    }

    let subject = load_subject(&conn, &id)?.ok_or_else(|| ApiError::not_found("Subject not found"))?;
    Ok(Json(json!({ "success": true, "data": subject })))
}

pub async fn remove(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    identity.require(Capability::SubjectsWrite)?;
    let conn = state.db.lock().await;
    if !directory::subject_exists(&conn, &id)? {
        return Err(ApiError::not_found("Subject not found"));
    }
    conn.execute("DELETE FROM subjects WHERE id = ?", [&id])?;
    Ok(Json(json!({ "success": true, "data": { "id": id } })))
}

const SUBJECT_VIEW_SQL: &str = "SELECT s.id, s.name, s.code, s.description, s.class_id, c.name,
        s.teacher_id, t.employee_id
     FROM subjects s
     LEFT JOIN classes c ON c.id = s.class_id
     LEFT JOIN teachers t ON t.id = s.teacher_id";

fn subject_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<SubjectView> {
    let class_id: Option<String> = row.get(4)?;
    let class_name: Option<String> = row.get(5)?;
    let teacher_id: Option<String> = row.get(6)?;
    let employee_id: Option<String> = row.get(7)?;
    Ok(SubjectView {
        id: row.get(0)?,
        name: row.get(1)?,
        code: row.get(2)?,
        description: row.get(3)?,
        class: class_id.map(|id| RefView { id, name: class_name }),
        teacher: teacher_id.map(|id| TeacherRefView { id, employee_id }),
    })
}

fn load_subject(conn: &Connection, id: &str) -> rusqlite::Result<Option<SubjectView>> {
    conn.query_row(&format!("{SUBJECT_VIEW_SQL} WHERE s.id = ?"), [id], subject_from_row)
        .optional()
}

fn code_taken(conn: &Connection, code: &str) -> rusqlite::Result<bool> {
    conn.query_row("SELECT 1 FROM subjects WHERE code = ?", [code], |r| r.get::<_, i64>(0))
        .optional()
        .map(|v| v.is_some())
}
