use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use rusqlite::{Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::attendance::RefView;
use crate::directory;
use crate::roles::{Capability, Role};

use super::super::auth::Identity;
use super::super::error::ApiError;
use super::super::types::{ApiJson, AppState};
use super::clean;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentPayload {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub roll_number: Option<String>,
    #[serde(default)]
    pub class_id: Option<String>,
    #[serde(default)]
    pub guardian_name: Option<String>,
    #[serde(default)]
    pub contact_info: Option<String>,
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
struct StudentView {
    id: String,
    roll_number: String,
    guardian_name: Option<String>,
    contact_info: Option<String>,
    class: Option<RefView>,
    user: UserSummary,
}

pub async fn list(
    State(state): State<AppState>,
    identity: Identity,
) -> Result<Json<serde_json::Value>, ApiError> {
    identity.require(Capability::StudentsRead)?;
    let conn = state.db.lock().await;
    // A student caller only sees their own record.
    let (sql, params) = if identity.role == Role::Student {
        (
            format!("{STUDENT_VIEW_SQL} WHERE st.user_id = ? ORDER BY u.name"),
            vec![identity.user_id.clone()],
        )
    } else {
        (format!("{STUDENT_VIEW_SQL} ORDER BY u.name"), Vec::new())
    };
    let mut stmt = conn.prepare(&sql)?;
    let students = stmt
        .query_map(rusqlite::params_from_iter(params.iter()), student_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Json(json!({ "success": true, "data": students })))
}

pub async fn get_one(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    identity.require(Capability::StudentsRead)?;
    let conn = state.db.lock().await;
    let student = load_student(&conn, &id)?.ok_or_else(|| ApiError::not_found("Student not found"))?;
    if identity.role == Role::Student && student.user.id != identity.user_id {
        return Err(ApiError::forbidden("You can only view your own record"));
    }
    Ok(Json(json!({ "success": true, "data": student })))
}

pub async fn create(
    State(state): State<AppState>,
    identity: Identity,
    ApiJson(payload): ApiJson<StudentPayload>,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    identity.require(Capability::StudentsWrite)?;
    let (Some(name), Some(email), Some(roll_number)) = (
        clean(payload.name),
        clean(payload.email),
        clean(payload.roll_number),
    ) else {
        return Err(ApiError::validation("Missing required student fields"));
    };
    let class_id = clean(payload.class_id);

    let conn = state.db.lock().await;
    if directory::email_taken(&conn, &email)? {
        return Err(ApiError::conflict("Email already used"));
    }
    if roll_number_taken(&conn, &roll_number)? {
        return Err(ApiError::conflict("Roll number already used"));
    }
    if let Some(class_id) = class_id.as_deref() {
        if !directory::class_exists(&conn, class_id)? {
            return Err(ApiError::validation("class not found"));
        }
    }

    let user_id = Uuid::new_v4().to_string();
    let student_id = Uuid::new_v4().to_string();
    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "INSERT INTO users(id, name, email, role) VALUES(?, ?, ?, ?)",
        (&user_id, &name, &email, Role::Student.as_str()),
    )?;
    tx.execute(
        "INSERT INTO students(id, user_id, roll_number, class_id, guardian_name, contact_info)
         VALUES(?, ?, ?, ?, ?, ?)",
        (
            &student_id,
            &user_id,
            &roll_number,
            &class_id,
            &payload.guardian_name,
            &payload.contact_info,
        ),
    )?;
    tx.commit()?;

    let student = load_student(&conn, &student_id)?
        .ok_or_else(|| ApiError::internal(anyhow::anyhow!("student missing after insert")))?;
    Ok((StatusCode::CREATED, Json(json!({ "success": true, "data": student }))))
}

pub async fn update(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<String>,
    ApiJson(payload): ApiJson<StudentPayload>,
) -> Result<Json<serde_json::Value>, ApiError> {
    identity.require(Capability::StudentsWrite)?;
    let conn = state.db.lock().await;
    let existing = load_student(&conn, &id)?.ok_or_else(|| ApiError::not_found("Student not found"))?;

    if let Some(name) = clean(payload.name) {
        conn.execute("UPDATE users SET name = ? WHERE id = ?", (&name, &existing.user.id))?;
    }
    if let Some(email) = clean(payload.email) {
        conn.execute("UPDATE users SET email = ? WHERE id = ?", (&email, &existing.user.id))?;
    }
    if let Some(roll_number) = clean(payload.roll_number) {
        conn.execute("UPDATE students SET roll_number = ? WHERE id = ?", (&roll_number, &id))?;
    }
    if let Some(class_id) = clean(payload.class_id) {
        if !directory::class_exists(&conn, &class_id)? {
            return Err(ApiError::validation("class not found"));
        }
        conn.execute("UPDATE students SET class_id = ? WHERE id = ?", (&class_id, &id))?;
    }
    if let Some(guardian_name) = payload.guardian_name {
        conn.execute("UPDATE students SET guardian_name = ? WHERE id = ?", (&guardian_name, &id))?;
    }
    if let Some(contact_info) = payload.contact_info {
        conn.execute("UPDATE students SET contact_info = ? WHERE id = ?", (&contact_info, &id))?;
    }

    let student = load_student(&conn, &id)?.ok_or_else(|| ApiError::not_found("Student not found"))?;
    Ok(Json(json!({ "success": true, "data": student })))
}

pub async fn remove(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    identity.require(Capability::StudentsWrite)?;
    let conn = state.db.lock().await;
    let existing = load_student(&conn, &id)?.ok_or_else(|| ApiError::not_found("Student not found"))?;

    // Ledger records referencing this student stay put; they are history.
    let tx = conn.unchecked_transaction()?;
    tx.execute("DELETE FROM students WHERE id = ?", [&id])?;
    tx.execute("DELETE FROM users WHERE id = ?", [&existing.user.id])?;
    tx.commit()?;
    Ok(Json(json!({ "success": true, "data": { "id": id } })))
}

const STUDENT_VIEW_SQL: &str = "SELECT st.id, st.roll_number, st.guardian_name, st.contact_info,
        st.class_id, c.name, u.id, u.name, u.email, u.role
     FROM students st
     JOIN users u ON u.id = st.user_id
     LEFT JOIN classes c ON c.id = st.class_id";

fn student_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<StudentView> {
    let class_id: Option<String> = row.get(4)?;
    let class_name: Option<String> = row.get(5)?;
    Ok(StudentView {
        id: row.get(0)?,
        roll_number: row.get(1)?,
        guardian_name: row.get(2)?,
        contact_info: row.get(3)?,
        class: class_id.map(|id| RefView { id, name: class_name }),
        user: UserSummary {
            id: row.get(6)?,
            name: row.get(7)?,
            email: row.get(8)?,
            role: row.get(9)?,
        },
    })
}

fn load_student(conn: &Connection, id: &str) -> rusqlite::Result<Option<StudentView>> {
    conn.query_row(&format!("{STUDENT_VIEW_SQL} WHERE st.id = ?"), [id], student_from_row)
        .optional()
}

fn roll_number_taken(conn: &Connection, roll_number: &str) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT 1 FROM students WHERE roll_number = ?",
        [roll_number],
        |r| r.get::<_, i64>(0),
    )
    .optional()
    .map(|v| v.is_some())
}
