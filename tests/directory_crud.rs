mod test_support;

use serde_json::json;
use test_support::spawn_app;

#[tokio::test]
async fn admin_builds_out_the_directory() {
    let app = spawn_app().await;
    let admin = app.seed_admin("Builder Admin").await;
    let token = app.token_for(&admin);

    let (status, body) = app
        .post(
            "/api/teachers",
            Some(&token),
            &json!({
                "name": "New Teacher",
                "email": "new.teacher@school.test",
                "employeeId": "EMP-400",
                "specialization": "Maths",
            }),
        )
        .await;
    assert_eq!(status, 201, "teacher create failed: {body}");
    let teacher_id = body["data"]["id"].as_str().unwrap().to_string();
    assert_eq!(body["data"]["user"]["role"], json!("teacher"));

    let (status, body) = app
        .post(
            "/api/classes",
            Some(&token),
            &json!({ "name": "9-C", "teacherId": teacher_id, "schedule": "Mon-Fri" }),
        )
        .await;
    assert_eq!(status, 201, "class create failed: {body}");
    let class_id = body["data"]["id"].as_str().unwrap().to_string();
    assert_eq!(body["data"]["teacher"]["employeeId"], json!("EMP-400"));

    let (status, body) = app
        .post(
            "/api/subjects",
            Some(&token),
            &json!({ "name": "Physics", "code": "PHY-9", "classId": class_id, "teacherId": teacher_id }),
        )
        .await;
    assert_eq!(status, 201, "subject create failed: {body}");
    assert_eq!(body["data"]["class"]["name"], json!("9-C"));

    let (status, body) = app
        .post(
            "/api/students",
            Some(&token),
            &json!({
                "name": "New Student",
                "email": "new.student@school.test",
                "rollNumber": "R-400",
                "classId": class_id,
            }),
        )
        .await;
    assert_eq!(status, 201, "student create failed: {body}");
    assert_eq!(body["data"]["class"]["name"], json!("9-C"));

    let (status, body) = app.get("/api/classes", Some(&token)).await;
    assert_eq!(status, 200);
    let classes = body["data"].as_array().unwrap();
    assert_eq!(classes.len(), 1);
    assert_eq!(classes[0]["studentCount"], json!(1));
}

#[tokio::test]
async fn duplicate_email_and_roll_number_conflict() {
    let app = spawn_app().await;
    let admin = app.seed_admin("Conflict Admin").await;
    let token = app.token_for(&admin);

    let payload = json!({
        "name": "Dup Student",
        "email": "dup@school.test",
        "rollNumber": "R-410",
    });
    let (status, _) = app.post("/api/students", Some(&token), &payload).await;
    assert_eq!(status, 201);

    let (status, body) = app.post("/api/students", Some(&token), &payload).await;
    assert_eq!(status, 409);
    assert_eq!(body["message"], json!("Email already used"));

    let (status, body) = app
        .post(
            "/api/students",
            Some(&token),
            &json!({ "name": "Other", "email": "other@school.test", "rollNumber": "R-410" }),
        )
        .await;
    assert_eq!(status, 409);
    assert_eq!(body["message"], json!("Roll number already used"));
}

#[tokio::test]
async fn missing_required_fields_fail_validation() {
    let app = spawn_app().await;
    let admin = app.seed_admin("Strict Admin").await;
    let token = app.token_for(&admin);

    let (status, body) = app
        .post("/api/teachers", Some(&token), &json!({ "name": "No Email" }))
        .await;
    assert_eq!(status, 400);
    assert_eq!(body["message"], json!("Missing required teacher fields"));

    let (status, body) = app.post("/api/classes", Some(&token), &json!({})).await;
    assert_eq!(status, 400);
    assert_eq!(body["message"], json!("Missing required class fields"));
}

#[tokio::test]
async fn teacher_can_only_see_their_own_record() {
    let app = spawn_app().await;
    let (me_user, me) = app.seed_teacher("Own Teacher", "EMP-420").await;
    let (_, other) = app.seed_teacher("Other Teacher", "EMP-421").await;
    let token = app.token_for(&me_user);

    let (status, body) = app.get("/api/teachers", Some(&token)).await;
    assert_eq!(status, 200);
    let teachers = body["data"].as_array().unwrap();
    assert_eq!(teachers.len(), 1);
    assert_eq!(teachers[0]["id"], json!(me.clone()));

    let (status, _) = app.get(&format!("/api/teachers/{me}"), Some(&token)).await;
    assert_eq!(status, 200);

    let (status, body) = app.get(&format!("/api/teachers/{other}"), Some(&token)).await;
    assert_eq!(status, 403);
    assert_eq!(body["message"], json!("You can only view your own record"));
}

#[tokio::test]
async fn student_listing_is_scoped_to_self() {
    let app = spawn_app().await;
    let class_id = app.seed_class("Self Class").await;
    let (me_user, me) = app.seed_student("Self Student", "R-430", Some(&class_id)).await;
    let (_, other) = app.seed_student("Peer Student", "R-431", Some(&class_id)).await;
    let token = app.token_for(&me_user);

    let (status, body) = app.get("/api/students", Some(&token)).await;
    assert_eq!(status, 200);
    let students = body["data"].as_array().unwrap();
    assert_eq!(students.len(), 1);
    assert_eq!(students[0]["id"], json!(me));

    let (status, _) = app.get(&format!("/api/students/{other}"), Some(&token)).await;
    assert_eq!(status, 403);
}

#[tokio::test]
async fn updates_touch_user_and_entity_rows() {
    let app = spawn_app().await;
    let admin = app.seed_admin("Update Admin").await;
    let (_, teacher_id) = app.seed_teacher("Old Name", "EMP-440").await;
    let token = app.token_for(&admin);

    let (status, body) = app
        .put(
            &format!("/api/teachers/{teacher_id}"),
            Some(&token),
            &json!({ "name": "New Name", "phone": "555-0101" }),
        )
        .await;
    assert_eq!(status, 200, "update failed: {body}");
    assert_eq!(body["data"]["user"]["name"], json!("New Name"));
    assert_eq!(body["data"]["phone"], json!("555-0101"));
}

#[tokio::test]
async fn deleting_a_student_leaves_the_ledger_intact() {
    let app = spawn_app().await;
    let admin = app.seed_admin("Ledger Admin").await;
    let (_, teacher_id) = app.seed_teacher("Ledger Teacher", "EMP-450").await;
    let class_id = app.seed_class("Ledger Class").await;
    let (_, student_id) = app.seed_student("Gone Student", "R-450", Some(&class_id)).await;
    let token = app.token_for(&admin);

    let (status, body) = app
        .post(
            "/api/attendance",
            Some(&token),
            &json!({
                "classId": class_id,
                "teacherId": teacher_id,
                "date": "2024-04-01",
                "records": [{ "studentId": student_id, "status": "present" }],
            }),
        )
        .await;
    assert_eq!(status, 201, "mark failed: {body}");

    let (status, _) = app
        .delete(&format!("/api/students/{student_id}"), Some(&token))
        .await;
    assert_eq!(status, 200);

    // The session survives with its weak reference; display fields are gone.
    let (status, body) = app.get("/api/attendance", Some(&token)).await;
    assert_eq!(status, 200);
    let data = body["data"].as_array().unwrap();
    assert_eq!(data.len(), 1);
    let record = &data[0]["records"][0];
    assert_eq!(record["student"]["id"], json!(student_id));
    assert_eq!(record["student"]["name"], json!(null));
    assert_eq!(record["status"], json!("present"));
}

#[tokio::test]
async fn deleting_a_class_detaches_students_and_subjects() {
    let app = spawn_app().await;
    let admin = app.seed_admin("Detach Admin").await;
    let class_id = app.seed_class("Doomed Class").await;
    let subject_id = app.seed_subject("Doomed Subject", "DOO-1", Some(&class_id)).await;
    let (_, student_id) = app.seed_student("Detached", "R-460", Some(&class_id)).await;
    let token = app.token_for(&admin);

    let (status, _) = app.delete(&format!("/api/classes/{class_id}"), Some(&token)).await;
    assert_eq!(status, 200);

    let (_, body) = app.get(&format!("/api/students/{student_id}"), Some(&token)).await;
    assert_eq!(body["data"]["class"], json!(null));
    let (_, body) = app.get(&format!("/api/subjects/{subject_id}"), Some(&token)).await;
    assert_eq!(body["data"]["class"], json!(null));
}
