/// Integration tests for the House Points API
///
/// These run the whole router (guards, handlers, ledger and standings) over
/// the in-memory store:
/// - login and session tokens
/// - role guards on every route group
/// - result recording and its effect on house totals
/// - dashboards
/// - standings drift detection and repair

mod common;

use axum::http::StatusCode;
use common::{TestContext, PASSWORD};
use housepoints_shared::auth::token::TokenService;
use serde_json::json;

#[tokio::test]
async fn test_health_check() {
    let ctx = TestContext::new().await.unwrap();

    let (status, body) = ctx.send("GET", "/health", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["database"], "connected");
}

#[tokio::test]
async fn test_login_issues_usable_token() {
    let ctx = TestContext::new().await.unwrap();

    let (status, body) = ctx
        .send(
            "POST",
            "/auth/login",
            None,
            Some(json!({ "username": "mcgonagall", "password": PASSWORD })),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["username"], "mcgonagall");
    assert_eq!(body["user"]["role"], "teacher");
    assert!(body["user"].get("password_hash").is_none());

    let token = body["token"].as_str().unwrap();
    let claims = ctx.tokens.verify(token).unwrap();
    assert_eq!(claims.id, ctx.teacher.id);

    let (status, _) = ctx.send("GET", "/teacher/dashboard", Some(token), None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_login_failures_are_indistinguishable() {
    let ctx = TestContext::new().await.unwrap();

    let (wrong_status, wrong_body) = ctx
        .send(
            "POST",
            "/auth/login",
            None,
            Some(json!({ "username": "mcgonagall", "password": "nope" })),
        )
        .await;
    let (unknown_status, unknown_body) = ctx
        .send(
            "POST",
            "/auth/login",
            None,
            Some(json!({ "username": "nobody", "password": "nope" })),
        )
        .await;

    assert_eq!(wrong_status, StatusCode::UNAUTHORIZED);
    assert_eq!(unknown_status, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong_body, unknown_body);
}

#[tokio::test]
async fn test_login_rejects_incomplete_body() {
    let ctx = TestContext::new().await.unwrap();

    let (status, body) = ctx
        .send(
            "POST",
            "/auth/login",
            None,
            Some(json!({ "username": "", "password": "" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");

    let (status, _) = ctx
        .send("POST", "/auth/login", None, Some(json!({ "username": "alice" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_guards_reject_missing_and_bad_tokens() {
    let ctx = TestContext::new().await.unwrap();

    let (status, body) = ctx.send("GET", "/house-spirits", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "unauthorized");

    let (status, _) = ctx
        .send("GET", "/house-spirits", Some("not-a-token"), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let forged = TokenService::new("a-completely-different-secret-of-32-bytes")
        .issue(&ctx.admin)
        .unwrap()
        .token;
    let (status, _) = ctx.send("GET", "/house-spirits", Some(&forged), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let expired = TokenService::with_ttl(common::SECRET, chrono::Duration::seconds(-60))
        .issue(&ctx.admin)
        .unwrap()
        .token;
    let (status, _) = ctx.send("GET", "/house-spirits", Some(&expired), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_role_guards() {
    let ctx = TestContext::new().await.unwrap();
    let student = ctx.token_for(&ctx.alice_user);
    let teacher = ctx.token_for(&ctx.teacher);
    let admin = ctx.token_for(&ctx.admin);

    let cases = [
        ("GET", "/student/dashboard", &student, StatusCode::OK),
        ("GET", "/student/dashboard", &teacher, StatusCode::FORBIDDEN),
        ("GET", "/teacher/dashboard", &student, StatusCode::FORBIDDEN),
        ("GET", "/teacher/dashboard", &teacher, StatusCode::OK),
        ("GET", "/teacher/dashboard", &admin, StatusCode::OK),
        ("GET", "/house-spirits", &student, StatusCode::OK),
        ("GET", "/house-spirits", &teacher, StatusCode::OK),
        ("GET", "/admin/standings/drift", &teacher, StatusCode::FORBIDDEN),
        ("GET", "/admin/standings/drift", &admin, StatusCode::OK),
    ];

    for (method, uri, token, expected) in cases {
        let (status, _) = ctx.send(method, uri, Some(token), None).await;
        assert_eq!(status, expected, "{} {}", method, uri);
    }
}

#[tokio::test]
async fn test_result_lifecycle_moves_house_points() {
    let ctx = TestContext::new().await.unwrap();
    let teacher = ctx.token_for(&ctx.teacher);

    let (status, created) = ctx
        .send(
            "POST",
            "/teacher/results",
            Some(&teacher),
            Some(json!({
                "student_id": ctx.alice.id,
                "activity_name": "Potions exam",
                "score": 88.5,
                "house_spirit_points": 10
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["recorded_by"], ctx.teacher.id.to_string());
    assert_eq!(ctx.house_points(&ctx.phoenix).await, 10);

    let id = created["id"].as_str().unwrap().to_string();
    let uri = format!("/teacher/results/{}", id);

    let (status, updated) = ctx
        .send(
            "PUT",
            &uri,
            Some(&teacher),
            Some(json!({ "house_spirit_points": 4 })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["house_spirit_points"], 4);
    assert_eq!(updated["activity_name"], "Potions exam");
    assert_eq!(ctx.house_points(&ctx.phoenix).await, 4);

    let (status, _) = ctx
        .send(
            "PUT",
            &uri,
            Some(&teacher),
            Some(json!({ "student_id": ctx.bram.id })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ctx.house_points(&ctx.phoenix).await, 0);
    assert_eq!(ctx.house_points(&ctx.dragon).await, 4);

    let (status, body) = ctx.send("DELETE", &uri, Some(&teacher), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(body.is_null());
    assert_eq!(ctx.house_points(&ctx.dragon).await, 0);

    let (status, _) = ctx.send("DELETE", &uri, Some(&teacher), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_create_result_validation() {
    let ctx = TestContext::new().await.unwrap();
    let teacher = ctx.token_for(&ctx.teacher);

    let (status, body) = ctx
        .send(
            "POST",
            "/teacher/results",
            Some(&teacher),
            Some(json!({ "score": "lots", "house_spirit_points": -3 })),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");
    let fields: Vec<&str> = body["details"]
        .as_array()
        .unwrap()
        .iter()
        .map(|d| d["field"].as_str().unwrap())
        .collect();
    assert!(fields.contains(&"student_id"));
    assert!(fields.contains(&"activity_name"));
    assert!(fields.contains(&"score"));
    assert!(fields.contains(&"house_spirit_points"));
    assert_eq!(ctx.house_points(&ctx.phoenix).await, 0);

    let (status, _) = ctx
        .send(
            "POST",
            "/teacher/results",
            Some(&teacher),
            Some(json!({
                "student_id": uuid::Uuid::new_v4(),
                "activity_name": "Quiz",
                "score": 1
            })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_malformed_path_and_body_are_bad_requests() {
    let ctx = TestContext::new().await.unwrap();
    let teacher = ctx.token_for(&ctx.teacher);

    let (status, body) = ctx
        .send(
            "PUT",
            "/teacher/results/not-a-uuid",
            Some(&teacher),
            Some(json!({ "score": 1 })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "bad_request");

    let (status, _) = ctx
        .send("DELETE", "/teacher/results/not-a-uuid", Some(&teacher), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_only_owner_or_admin_can_modify_result() {
    let ctx = TestContext::new().await.unwrap();
    let teacher = ctx.token_for(&ctx.teacher);
    let other = ctx.token_for(&ctx.other_teacher);
    let admin = ctx.token_for(&ctx.admin);

    let (_, created) = ctx
        .send(
            "POST",
            "/teacher/results",
            Some(&teacher),
            Some(json!({
                "student_id": ctx.alice.id,
                "activity_name": "Essay",
                "score": 70,
                "house_spirit_points": 3
            })),
        )
        .await;
    let uri = format!("/teacher/results/{}", created["id"].as_str().unwrap());

    let (status, _) = ctx
        .send("PUT", &uri, Some(&other), Some(json!({ "score": 100 })))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = ctx.send("DELETE", &uri, Some(&other), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(ctx.house_points(&ctx.phoenix).await, 3);

    let (status, _) = ctx.send("DELETE", &uri, Some(&admin), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(ctx.house_points(&ctx.phoenix).await, 0);
}

#[tokio::test]
async fn test_dashboards() {
    let ctx = TestContext::new().await.unwrap();
    let teacher = ctx.token_for(&ctx.teacher);

    for (activity, points) in [("Quiz", 2), ("Project", 5)] {
        let (status, _) = ctx
            .send(
                "POST",
                "/teacher/results",
                Some(&teacher),
                Some(json!({
                    "student_id": ctx.alice.id,
                    "activity_name": activity,
                    "score": 9,
                    "house_spirit_points": points
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, body) = ctx
        .send("GET", "/teacher/dashboard", Some(&teacher), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["students"].as_array().unwrap().len(), 2);
    assert_eq!(body["houseSpirits"][0]["name"], "Phoenix");
    assert_eq!(body["houseSpirits"][0]["points"], 7);
    assert_eq!(body["recentResults"].as_array().unwrap().len(), 2);
    assert_eq!(body["teacherProfile"]["firstName"], "Minerva");

    let other = ctx.token_for(&ctx.other_teacher);
    let (_, body) = ctx.send("GET", "/teacher/dashboard", Some(&other), None).await;
    assert!(body["recentResults"].as_array().unwrap().is_empty());
    assert!(body["teacherProfile"].is_null());

    let student = ctx.token_for(&ctx.alice_user);
    let (status, body) = ctx
        .send("GET", "/student/dashboard", Some(&student), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["student"]["id"], ctx.alice.id.to_string());
    assert_eq!(body["houseSpirit"]["name"], "Phoenix");
    assert_eq!(body["houseSpirit"]["points"], 7);
    assert_eq!(body["results"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_student_without_record_gets_not_found() {
    let ctx = TestContext::new().await.unwrap();

    let orphan = housepoints_shared::models::user::User {
        id: uuid::Uuid::new_v4(),
        username: "ghost".to_string(),
        password_hash: String::new(),
        role: housepoints_shared::models::user::Role::Student,
        created_at: chrono::Utc::now(),
    };
    let token = ctx.token_for(&orphan);

    let (status, _) = ctx
        .send("GET", "/student/dashboard", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_drift_detection_and_repair() {
    let ctx = TestContext::new().await.unwrap();
    let teacher = ctx.token_for(&ctx.teacher);
    let admin = ctx.token_for(&ctx.admin);

    ctx.send(
        "POST",
        "/teacher/results",
        Some(&teacher),
        Some(json!({
            "student_id": ctx.alice.id,
            "activity_name": "Match",
            "score": 3,
            "house_spirit_points": 6
        })),
    )
    .await;

    let (_, report) = ctx
        .send("GET", "/admin/standings/drift", Some(&admin), None)
        .await;
    assert_eq!(report["repaired"], false);
    assert!(report["houses"]
        .as_array()
        .unwrap()
        .iter()
        .all(|h| h["recorded"] == h["computed"]));

    ctx.store.corrupt_house_points(ctx.phoenix.id, 50).await;

    let (status, report) = ctx
        .send("GET", "/admin/standings/drift", Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let phoenix = report["houses"]
        .as_array()
        .unwrap()
        .iter()
        .find(|h| h["name"] == "Phoenix")
        .unwrap()
        .clone();
    assert_eq!(phoenix["recorded"], 50);
    assert_eq!(phoenix["computed"], 6);
    assert_eq!(ctx.house_points(&ctx.phoenix).await, 50);

    let (status, report) = ctx
        .send("POST", "/admin/standings/reconcile", Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["repaired"], true);
    assert_eq!(ctx.house_points(&ctx.phoenix).await, 6);
}

#[tokio::test]
async fn test_concurrent_result_creation_keeps_totals_exact() {
    let ctx = TestContext::new().await.unwrap();
    let teacher = ctx.token_for(&ctx.teacher);

    let requests = (0..20).map(|i| {
        ctx.send(
            "POST",
            "/teacher/results",
            Some(&teacher),
            Some(json!({
                "student_id": ctx.alice.id,
                "activity_name": format!("Round {}", i),
                "score": i,
                "house_spirit_points": 1
            })),
        )
    });

    let responses = futures::future::join_all(requests).await;
    assert!(responses.iter().all(|(s, _)| *s == StatusCode::CREATED));
    assert_eq!(ctx.house_points(&ctx.phoenix).await, 20);
}

#[tokio::test]
async fn test_security_headers_present() {
    let ctx = TestContext::new().await.unwrap();

    let request = axum::http::Request::builder()
        .uri("/health")
        .body(axum::body::Body::empty())
        .unwrap();
    let response = tower::ServiceExt::oneshot(ctx.app.clone(), request)
        .await
        .unwrap();

    assert_eq!(
        response.headers().get("x-content-type-options").unwrap(),
        "nosniff"
    );
    assert_eq!(response.headers().get("x-frame-options").unwrap(), "DENY");
    assert!(response.headers().get("strict-transport-security").is_none());
}
