use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use rusqlite::{Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::attendance::TeacherRefView;
use crate::directory;
use crate::roles::Capability;

use super::super::auth::Identity;
use super::super::error::ApiError;
use super::super::types::{ApiJson, AppState};
use super::clean;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassPayload {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub teacher_id: Option<String>,
    #[serde(default)]
    pub schedule: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ClassView {
    id: String,
    name: String,
    description: Option<String>,
    schedule: Option<String>,
    teacher: Option<TeacherRefView>,
    student_count: i64,
}

pub async fn list(
    State(state): State<AppState>,
    identity: Identity,
) -> Result<Json<serde_json::Value>, ApiError> {
    identity.require(Capability::ClassesRead)?;
    let conn = state.db.lock().await;
    let mut stmt = conn.prepare(&format!("{CLASS_VIEW_SQL} ORDER BY c.name"))?;
    let classes = stmt
        .query_map([], class_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Json(json!({ "success": true, "data": classes })))
}

pub async fn get_one(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    identity.require(Capability::ClassesRead)?;
    let conn = state.db.lock().await;
    let class = load_class(&conn, &id)?.ok_or_else(|| ApiError::not_found("Class not found"))?;
    Ok(Json(json!({ "success": true, "data": class })))
}

pub async fn create(
    State(state): State<AppState>,
    identity: Identity,
    ApiJson(payload): ApiJson<ClassPayload>,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    identity.require(Capability::ClassesWrite)?;
    let Some(name) = clean(payload.name) else {
        return Err(ApiError::validation("Missing required class fields"));
    };
    let teacher_id = clean(payload.teacher_id);

    let conn = state.db.lock().await;
    if row_with_name_exists(&conn, &name)? {
        return Err(ApiError::conflict("Class name already used"));
    }
    if let Some(teacher_id) = teacher_id.as_deref() {
        if !directory::teacher_exists(&conn, teacher_id)? {
            return Err(ApiError::validation("teacher not found"));
        }
    }

    let id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO classes(id, name, description, teacher_id, schedule) VALUES(?, ?, ?, ?, ?)",
        (&id, &name, &payload.description, &teacher_id, &payload.schedule),
    )?;

    let class = load_class(&conn, &id)?
        .ok_or_else(|| ApiError::internal(anyhow::anyhow!("class missing after insert")))?;
    Ok((StatusCode::CREATED, Json(json!({ "success": true, "data": class }))))
}

pub async fn update(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<String>,
    ApiJson(payload): ApiJson<ClassPayload>,
) -> Result<Json<serde_json::Value>, ApiError> {
    identity.require(Capability::ClassesWrite)?;
    let conn = state.db.lock().await;
    if !directory::class_exists(&conn, &id)? {
        return Err(ApiError::not_found("Class not found"));
    }
    if let Some(teacher_id) = clean(payload.teacher_id.clone()) {
        if !directory::teacher_exists(&conn, &teacher_id)? {
            return Err(ApiError::validation("teacher not found"));
        }
        conn.execute("UPDATE classes SET teacher_id = ? WHERE id = ?", (&teacher_id, &id))?;
    }
    if let Some(name) = clean(payload.name) {
        conn.execute("UPDATE classes SET name = ? WHERE id = ?", (&name, &id))?;
    }
    if let Some(description) = payload.description {
        conn.execute("UPDATE classes SET description = ? WHERE id = ?", (&description, &id))?;
    }
    if let Some(schedule) = payload.schedule {
        conn.execute("UPDATE classes SET schedule = ? WHERE id = ?", (&schedule, &id))?;
    }

    let class = load_class(&conn, &id)?.ok_or_else(|| ApiError::not_found("Class not found"))?;
    Ok(Json(json!({ "success": true, "data": class })))
}

pub async fn remove(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    identity.require(Capability::ClassesWrite)?;
    let conn = state.db.lock().await;
    if !directory::class_exists(&conn, &id)? {
        return Err(ApiError::not_found("Class not found"));
    }
    // Detach directory references; attendance history keeps its weak ref.
    let tx = conn.unchecked_transaction()?;
    tx.execute("UPDATE students SET class_id = NULL WHERE class_id = ?", [&id])?;
    tx.execute("UPDATE subjects SET class_id = NULL WHERE class_id = ?", [&id])?;
    tx.execute("DELETE FROM classes WHERE id = ?", [&id])?;
    tx.commit()?;
    Ok(Json(json!({ "success": true, "data": { "id": id } })))
}

const CLASS_VIEW_SQL: &str = "SELECT c.id, c.name, c.description, c.schedule, c.teacher_id, t.employee_id,
        (SELECT COUNT(*) FROM students st WHERE st.class_id = c.id)
     FROM classes c
     LEFT JOIN teachers t ON t.id = c.teacher_id";

fn class_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ClassView> {
    let teacher_id: Option<String> = row.get(4)?;
    let employee_id: Option<String> = row.get(5)?;
    Ok(ClassView {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        schedule: row.get(3)?,
        teacher: teacher_id.map(|id| TeacherRefView { id, employee_id }),
        student_count: row.get(6)?,
    })
}

fn load_class(conn: &Connection, id: &str) -> rusqlite::Result<Option<ClassView>> {
    conn.query_row(&format!("{CLASS_VIEW_SQL} WHERE c.id = ?"), [id], class_from_row)
        .optional()
}

fn row_with_name_exists(conn: &Connection, name: &str) -> rusqlite::Result<bool> {
    conn.query_row("SELECT 1 FROM classes WHERE name = ?", [name], |r| r.get::<_, i64>(0))
        .optional()
        .map(|v| v.is_some())
}
