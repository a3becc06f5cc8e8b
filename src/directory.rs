//! Read-only lookups against the directory tables, consumed by the attendance
//! core. Writes to the directory live in the per-resource API handlers.

use rusqlite::{Connection, OptionalExtension};

pub fn find_teacher_for_user(conn: &Connection, user_id: &str) -> rusqlite::Result<Option<String>> {
    conn.query_row(
        "SELECT id FROM teachers WHERE user_id = ?",
        [user_id],
        |r| r.get(0),
    )
    .optional()
}

pub fn find_student_for_user(conn: &Connection, user_id: &str) -> rusqlite::Result<Option<String>> {
    conn.query_row(
        "SELECT id FROM students WHERE user_id = ?",
        [user_id],
        |r| r.get(0),
    )
    .optional()
}

pub fn class_exists(conn: &Connection, class_id: &str) -> rusqlite::Result<bool> {
    row_exists(conn, "SELECT 1 FROM classes WHERE id = ?", class_id)
}

pub fn subject_exists(conn: &Connection, subject_id: &str) -> rusqlite::Result<bool> {
    row_exists(conn, "SELECT 1 FROM subjects WHERE id = ?", subject_id)
}

pub fn teacher_exists(conn: &Connection, teacher_id: &str) -> rusqlite::Result<bool> {
    row_exists(conn, "SELECT 1 FROM teachers WHERE id = ?", teacher_id)
}

pub fn student_exists(conn: &Connection, student_id: &str) -> rusqlite::Result<bool> {
    row_exists(conn, "SELECT 1 FROM students WHERE id = ?", student_id)
}

pub fn email_taken(conn: &Connection, email: &str) -> rusqlite::Result<bool> {
    row_exists(conn, "SELECT 1 FROM users WHERE email = ?", email)
}

fn row_exists(conn: &Connection, sql: &str, id: &str) -> rusqlite::Result<bool> {
    conn.query_row(sql, [id], |r| r.get::<_, i64>(0))
        .optional()
        .map(|v| v.is_some())
}
