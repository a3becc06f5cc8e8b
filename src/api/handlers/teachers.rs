use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use rusqlite::{Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::directory;
use crate::roles::{Capability, Role};

use super::super::auth::Identity;
use super::super::error::ApiError;
use super::super::types::{ApiJson, AppState};
use super::clean;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeacherPayload {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub employee_id: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub specialization: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct UserSummary {
    id: String,
    name: String,
    email: String,
    role: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TeacherView {
    id: String,
    employee_id: String,
    phone: Option<String>,
    specialization: Option<String>,
    user: UserSummary,
}

pub async fn list(
    State(state): State<AppState>,
    identity: Identity,
) -> Result<Json<serde_json::Value>, ApiError> {
    identity.require(Capability::TeachersRead)?;
    let conn = state.db.lock().await;
    // A teacher caller only sees their own record.
    let (sql, params) = if identity.role == Role::Teacher {
        (
            format!("{TEACHER_VIEW_SQL} WHERE t.user_id = ? ORDER BY u.name"),
            vec![identity.user_id.clone()],
        )
    } else {
        (format!("{TEACHER_VIEW_SQL} ORDER BY u.name"), Vec::new())
    };
    let mut stmt = conn.prepare(&sql)?;
    let teachers = stmt
        .query_map(rusqlite::params_from_iter(params.iter()), teacher_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Json(json!({ "success": true, "data": teachers })))
}

pub async fn get_one(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    identity.require(Capability::TeachersRead)?;
    let conn = state.db.lock().await;
    let teacher = load_teacher(&conn, &id)?.ok_or_else(|| ApiError::not_found("Teacher not found"))?;
    if identity.role == Role::Teacher && teacher.user.id != identity.user_id {
        return Err(ApiError::forbidden("You can only view your own record"));
    }
    Ok(Json(json!({ "success": true, "data": teacher })))
}

pub async fn create(
    State(state): State<AppState>,
    identity: Identity,
    ApiJson(payload): ApiJson<TeacherPayload>,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    identity.require(Capability::TeachersWrite)?;
    let (Some(name), Some(email), Some(employee_id)) = (
        clean(payload.name),
        clean(payload.email),
        clean(payload.employee_id),
    ) else {
        return Err(ApiError::validation("Missing required teacher fields"));
    };

    let conn = state.db.lock().await;
    if directory::email_taken(&conn, &email)? {
        return Err(ApiError::conflict("Email already used"));
    }
    if employee_id_taken(&conn, &employee_id)? {
        return Err(ApiError::conflict("Employee id already used"));
    }

    let user_id = Uuid::new_v4().to_string();
    let teacher_id = Uuid::new_v4().to_string();
    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "INSERT INTO users(id, name, email, role) VALUES(?, ?, ?, ?)",
        (&user_id, &name, &email, Role::Teacher.as_str()),
    )?;
    tx.execute(
        "INSERT INTO teachers(id, user_id, employee_id, phone, specialization)
         VALUES(?, ?, ?, ?, ?)",
        (&teacher_id, &user_id, &employee_id, &payload.phone, &payload.specialization),
    )?;
    tx.commit()?;

    let teacher = load_teacher(&conn, &teacher_id)?
        .ok_or_else(|| ApiError::internal(anyhow::anyhow!("teacher missing after insert")))?;
    Ok((StatusCode::CREATED, Json(json!({ "success": true, "data": teacher }))))
}

pub async fn update(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<String>,
    ApiJson(payload): ApiJson<TeacherPayload>,
) -> Result<Json<serde_json::Value>, ApiError> {
    identity.require(Capability::TeachersWrite)?;
    let conn = state.db.lock().await;
    let existing = load_teacher(&conn, &id)?.ok_or_else(|| ApiError::not_found("Teacher not found"))?;

    if let Some(name) = clean(payload.name) {
        conn.execute("UPDATE users SET name = ? WHERE id = ?", (&name, &existing.user.id))?;
    }
    if let Some(email) = clean(payload.email) {
        conn.execute("UPDATE users SET email = ? WHERE id = ?", (&email, &existing.user.id))?;
    }
    if let Some(employee_id) = clean(payload.employee_id) {
        conn.execute("UPDATE teachers SET employee_id = ? WHERE id = ?", (&employee_id, &id))?;
    }
    if let Some(phone) = payload.phone {
        conn.execute("UPDATE teachers SET phone = ? WHERE id = ?", (&phone, &id))?;
    }
    if let Some(specialization) = payload.specialization {
        conn.execute(
            "UPDATE teachers SET specialization = ? WHERE id = ?",
            (&specialization, &id),
        )?;
    }

    let teacher = load_teacher(&conn, &id)?.ok_or_else(|| ApiError::not_found("Teacher not found"))?;
    Ok(Json(json!({ "success": true, "data": teacher })))
}

pub async fn remove(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    identity.require(Capability::TeachersWrite)?;
    let conn = state.db.lock().await;
    let existing = load_teacher(&conn, &id)?.ok_or_else(|| ApiError::not_found("Teacher not found"))?;

    // Detach directory references; attendance sessions marked by this teacher
    // keep their weak ref as immutable history.
    let tx = conn.unchecked_transaction()?;
    tx.execute("UPDATE classes SET teacher_id = NULL WHERE teacher_id = ?", [&id])?;
    tx.execute("UPDATE subjects SET teacher_id = NULL WHERE teacher_id = ?", [&id])?;
    tx.execute("DELETE FROM teachers WHERE id = ?", [&id])?;
    tx.execute("DELETE FROM users WHERE id = ?", [&existing.user.id])?;
    tx.commit()?;
    Ok(Json(json!({ "success": true, "data": { "id": id } })))
}

const TEACHER_VIEW_SQL: &str = "SELECT t.id, t.employee_id, t.phone, t.specialization,
        u.id, u.name, u.email, u.role
     FROM teachers t
     JOIN users u ON u.id = t.user_id";

fn teacher_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<TeacherView> {
    Ok(TeacherView {
        id: row.get(0)?,
        employee_id: row.get(1)?,
        phone: row.get(2)?,
        specialization: row.get(3)?,
        user: UserSummary {
            id: row.get(4)?,
            name: row.get(5)?,
            email: row.get(6)?,
            role: row.get(7)?,
        },
    })
}

fn load_teacher(conn: &Connection, id: &str) -> rusqlite::Result<Option<TeacherView>> {
    conn.query_row(&format!("{TEACHER_VIEW_SQL} WHERE t.id = ?"), [id], teacher_from_row)
        .optional()
}

fn employee_id_taken(conn: &Connection, employee_id: &str) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT 1 FROM teachers WHERE employee_id = ?",
        [employee_id],
        |r| r.get::<_, i64>(0),
    )
    .optional()
    .map(|v| v.is_some())
}
