#![allow(dead_code)]

use std::net::SocketAddr;

use chrono::Utc;
use jsonwebtoken::{encode, EncodingKey, Header};
use schoold::api::auth::Claims;
use schoold::{build_router, AppState, Config};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use uuid::Uuid;

pub const TEST_SECRET: &str = "schoold-test-secret";

pub struct TestApp {
    pub addr: SocketAddr,
    pub state: AppState,
    _data_dir: tempfile::TempDir,
}

pub async fn spawn_app() -> TestApp {
    // Mirror the non-production startup path explicitly; first caller wins.
    schoold::api::set_expose_stacks(false);
    let data_dir = tempfile::tempdir().expect("tempdir");
    let conn = schoold::db::open_db(data_dir.path()).expect("open db");
    let config = Config {
        bind_addr: "127.0.0.1:0".parse().expect("bind addr"),
        data_dir: data_dir.path().to_path_buf(),
        jwt_secret: TEST_SECRET.to_string(),
        production: false,
    };
    let state = AppState::new(conn, config);
    let app = build_router(state.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind listener");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move { axum::serve(listener, app).await.expect("serve app") });
    TestApp {
        addr,
        state,
        _data_dir: data_dir,
    }
}

impl TestApp {
    pub fn token_for(&self, user_id: &str) -> String {
        let claims = Claims {
            sub: user_id.to_string(),
            exp: (Utc::now().timestamp() + 3600) as usize,
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(TEST_SECRET.as_bytes()),
        )
        .expect("encode token")
    }

    pub async fn seed_user(&self, name: &str, email: &str, role: &str) -> String {
        let id = Uuid::new_v4().to_string();
        let conn = self.state.db.lock().await;
        conn.execute(
            "INSERT INTO users(id, name, email, role) VALUES(?, ?, ?, ?)",
            (&id, name, email, role),
        )
        .expect("insert user");
        id
    }

    pub async fn seed_admin(&self, name: &str) -> String {
        self.seed_user(name, &format!("{}@school.test", slug(name)), "admin")
            .await
    }

    /// Returns `(user_id, teacher_id)`.
    pub async fn seed_teacher(&self, name: &str, employee_id: &str) -> (String, String) {
        let user_id = self
            .seed_user(name, &format!("{}@school.test", slug(name)), "teacher")
            .await;
        let teacher_id = Uuid::new_v4().to_string();
        let conn = self.state.db.lock().await;
        conn.execute(
            "INSERT INTO teachers(id, user_id, employee_id) VALUES(?, ?, ?)",
            (&teacher_id, &user_id, employee_id),
        )
        .expect("insert teacher");
        (user_id, teacher_id)
    }

    /// Returns `(user_id, student_id)`.
    pub async fn seed_student(
        &self,
        name: &str,
        roll_number: &str,
        class_id: Option<&str>,
    ) -> (String, String) {
        let user_id = self
            .seed_user(name, &format!("{}@school.test", slug(name)), "student")
            .await;
        let student_id = Uuid::new_v4().to_string();
        let conn = self.state.db.lock().await;
        conn.execute(
            "INSERT INTO students(id, user_id, roll_number, class_id) VALUES(?, ?, ?, ?)",
            (&student_id, &user_id, roll_number, &class_id),
        )
        .expect("insert student");
        (user_id, student_id)
    }

    pub async fn seed_class(&self, name: &str) -> String {
        let id = Uuid::new_v4().to_string();
        let conn = self.state.db.lock().await;
        conn.execute("INSERT INTO classes(id, name) VALUES(?, ?)", (&id, name))
            .expect("insert class");
        id
    }

    pub async fn seed_subject(&self, name: &str, code: &str, class_id: Option<&str>) -> String {
        let id = Uuid::new_v4().to_string();
        let conn = self.state.db.lock().await;
        conn.execute(
            "INSERT INTO subjects(id, name, code, class_id) VALUES(?, ?, ?, ?)",
            (&id, name, code, &class_id),
        )
        .expect("insert subject");
        id
    }

    pub async fn get(&self, path: &str, token: Option<&str>) -> (u16, serde_json::Value) {
        self.send("GET", path, token, None).await
    }

    pub async fn post(
        &self,
        path: &str,
        token: Option<&str>,
        body: &serde_json::Value,
    ) -> (u16, serde_json::Value) {
        self.send("POST", path, token, Some(body)).await
    }

    pub async fn put(
        &self,
        path: &str,
        token: Option<&str>,
        body: &serde_json::Value,
    ) -> (u16, serde_json::Value) {
        self.send("PUT", path, token, Some(body)).await
    }

    pub async fn delete(&self, path: &str, token: Option<&str>) -> (u16, serde_json::Value) {
        self.send("DELETE", path, token, None).await
    }

    async fn send(
        &self,
        method: &str,
        path: &str,
        token: Option<&str>,
        body: Option<&serde_json::Value>,
    ) -> (u16, serde_json::Value) {
        let mut stream = tokio::net::TcpStream::connect(self.addr)
            .await
            .expect("connect server");
        let payload = body.map(|b| b.to_string()).unwrap_or_default();
        let mut req = format!(
            "{method} {path} HTTP/1.1\r\nHost: {}\r\nConnection: close\r\n",
            self.addr
        );
        if let Some(token) = token {
            req.push_str(&format!("Authorization: Bearer {token}\r\n"));
        }
        if body.is_some() {
            req.push_str("Content-Type: application/json\r\n");
            req.push_str(&format!("Content-Length: {}\r\n", payload.len()));
        }
        req.push_str("\r\n");
        req.push_str(&payload);

        stream.write_all(req.as_bytes()).await.expect("write request");
        let mut response = String::new();
        stream
            .read_to_string(&mut response)
            .await
            .expect("read response");
        let (head, raw_body) = response
            .split_once("\r\n\r\n")
            .expect("http response must have separator");
        let status = head
            .lines()
            .next()
            .and_then(|line| line.split_whitespace().nth(1))
            .and_then(|s| s.parse::<u16>().ok())
            .expect("http status");
        let json = serde_json::from_str(raw_body).unwrap_or(serde_json::Value::Null);
        (status, json)
    }
}

fn slug(name: &str) -> String {
    name.to_lowercase().replace(' ', ".")
}
