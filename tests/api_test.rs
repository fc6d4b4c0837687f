mod common;

use std::sync::Arc;

use actix_web::http::StatusCode;
use actix_web::web::Data;
use actix_web::{App, test};
use sea_orm::EntityTrait;
use serde_json::{Value, json};

use common::{ADMIN, memory_db};
use helpdesk::api;
use helpdesk::api::auth::{ensure_admin, resolve_admin_recipient};
use helpdesk::auth::JwtUtils;
use helpdesk::entity::user;
use helpdesk::model::auth::UserRole;
use helpdesk::service::{FileStorage, LocalFileStorage, NotificationRules, SlaPolicies, TicketStore};

const SECRET: &str = "test-secret";

fn bearer(user_id: &str, role: &str) -> (&'static str, String) {
    let token = JwtUtils::new(SECRET).generate_token(user_id, role).unwrap();
    ("Authorization", format!("Bearer {token}"))
}

fn submission() -> Value {
    json!({
        "type": "bug",
        "priority": "high",
        "subject": "Crash on login",
        "description": "The app closes right after I press the login button on Android.",
        "tags": ["login", "android"]
    })
}

macro_rules! app {
    ($uploads:expr) => {{
        let db = memory_db().await;
        let store = TicketStore::new(db.clone(), SlaPolicies::default(), NotificationRules::new(ADMIN));
        let storage: Arc<dyn FileStorage> = Arc::new(LocalFileStorage::new($uploads));
        test::init_service(
            App::new()
                .app_data(Data::new(db))
                .app_data(Data::new(store))
                .app_data(Data::new(JwtUtils::new(SECRET)))
                .app_data(Data::from(storage))
                .configure(api::routes),
        )
        .await
    }};
}

#[actix_web::test]
async fn health_check_is_public() {
    let dir = tempfile::tempdir().unwrap();
    let app = app!(dir.path());

    let resp = test::call_service(&app, test::TestRequest::get().uri("/health-check").to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);
}

#[actix_web::test]
async fn api_requires_a_token() {
    let dir = tempfile::tempdir().unwrap();
    let app = app!(dir.path());

    let req = test::TestRequest::get().uri("/api/tickets").to_request();
    let err = test::try_call_service(&app, req).await.unwrap_err();
    assert_eq!(err.as_response_error().status_code(), StatusCode::UNAUTHORIZED);

    let refresh = JwtUtils::new(SECRET).generate_refresh_token("user-1").unwrap();
    let req = test::TestRequest::get()
        .uri("/api/tickets")
        .insert_header(("Authorization", format!("Bearer {refresh}")))
        .to_request();
    let err = test::try_call_service(&app, req).await.unwrap_err();
    assert_eq!(err.as_response_error().status_code(), StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn users_submit_and_see_only_their_own_tickets() {
    let dir = tempfile::tempdir().unwrap();
    let app = app!(dir.path());

    let req = test::TestRequest::post()
        .uri("/api/tickets")
        .insert_header(bearer("user-1", "user"))
        .set_json(submission())
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let created: Value = test::read_body_json(resp).await;
    assert_eq!(created["status"], "new");
    assert_eq!(created["userId"], "user-1");
    assert!(created["sla"]["responseDeadline"].is_string());

    let req = test::TestRequest::get()
        .uri("/api/tickets")
        .insert_header(bearer("user-2", "user"))
        .to_request();
    let listed: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(listed["total"], 0);

    let req = test::TestRequest::get()
        .uri("/api/tickets?status=new&sortBy=priority-high")
        .insert_header(bearer("support-1", "support"))
        .to_request();
    let listed: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(listed["total"], 1);

    let req = test::TestRequest::get()
        .uri(&format!("/api/tickets/{}", created["id"].as_str().unwrap()))
        .insert_header(bearer("user-2", "user"))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn invalid_submission_lists_the_fields() {
    let dir = tempfile::tempdir().unwrap();
    let app = app!(dir.path());

    let req = test::TestRequest::post()
        .uri("/api/tickets")
        .insert_header(bearer("user-1", "user"))
        .set_json(json!({ "type": "bug", "priority": "urgent", "subject": "short", "description": "too short" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let body: Value = test::read_body_json(resp).await;
    let fields: Vec<&str> = body["errors"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["field"].as_str().unwrap())
        .collect();
    assert_eq!(fields, vec!["priority", "description"]);
}

#[actix_web::test]
async fn only_staff_move_tickets_between_statuses() {
    let dir = tempfile::tempdir().unwrap();
    let app = app!(dir.path());

    let req = test::TestRequest::post()
        .uri("/api/tickets")
        .insert_header(bearer("user-1", "user"))
        .set_json(submission())
        .to_request();
    let created: Value = test::call_and_read_body_json(&app, req).await;
    let status_uri = format!("/api/tickets/{}/status", created["id"].as_str().unwrap());

    let req = test::TestRequest::post()
        .uri(&status_uri)
        .insert_header(bearer("user-1", "user"))
        .set_json(json!({ "status": "closed" }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::FORBIDDEN);

    let req = test::TestRequest::post()
        .uri(&status_uri)
        .insert_header(bearer("support-1", "support"))
        .set_json(json!({ "status": "in-progress", "comment": "picked up" }))
        .to_request();
    let moved: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(moved["status"], "in-progress");
    assert_eq!(moved["statusHistory"][0]["fromStatus"], "new");

    let req = test::TestRequest::get()
        .uri("/api/notifications")
        .insert_header(bearer("user-1", "user"))
        .to_request();
    let inbox: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(inbox["unreadCount"], 1);
    assert_eq!(inbox["notifications"][0]["type"], "status_change");
}

#[actix_web::test]
async fn stats_route_is_not_shadowed_by_ticket_ids() {
    let dir = tempfile::tempdir().unwrap();
    let app = app!(dir.path());

    let req = test::TestRequest::get()
        .uri("/api/tickets/stats")
        .insert_header(bearer("support-1", "support"))
        .to_request();
    let stats: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(stats["total"], 0);

    let req = test::TestRequest::get()
        .uri("/api/tickets/board")
        .insert_header(bearer("user-1", "user"))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::FORBIDDEN);
}

#[actix_web::test]
async fn uploads_are_stored_and_referenced() {
    let dir = tempfile::tempdir().unwrap();
    let app = app!(dir.path());

    let req = test::TestRequest::post()
        .uri("/api/uploads?name=trace.log")
        .insert_header(bearer("user-1", "user"))
        .insert_header(("Content-Type", "text/plain"))
        .set_payload("panic at login.rs:42")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let stored: Value = test::read_body_json(resp).await;
    assert_eq!(stored["name"], "trace.log");
    assert_eq!(stored["size"], 20);
    assert_eq!(stored["type"], "text/plain");

    let mut ticket = submission();
    ticket["attachments"] = json!([stored]);
    let req = test::TestRequest::post()
        .uri("/api/tickets")
        .insert_header(bearer("user-1", "user"))
        .set_json(ticket)
        .to_request();
    let created: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(created["attachments"][0]["name"], "trace.log");
}

#[actix_web::test]
async fn attachments_must_come_from_storage() {
    let dir = tempfile::tempdir().unwrap();
    let app = app!(dir.path());

    let mut ticket = submission();
    ticket["attachments"] = json!([{ "name": "passwd", "size": 1, "type": "text/plain", "url": "/etc/passwd" }]);
    let req = test::TestRequest::post()
        .uri("/api/tickets")
        .insert_header(bearer("user-1", "user"))
        .set_json(ticket)
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);

    let req = test::TestRequest::post()
        .uri("/api/uploads?name=trace.log")
        .insert_header(bearer("user-1", "user"))
        .set_payload("panic at login.rs:42")
        .to_request();
    let mut stored: Value = test::call_and_read_body_json(&app, req).await;
    stored["size"] = json!(1);

    let mut ticket = submission();
    ticket["attachments"] = json!([stored]);
    let req = test::TestRequest::post()
        .uri("/api/tickets")
        .insert_header(bearer("user-1", "user"))
        .set_json(ticket)
        .to_request();
    let created: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(created["attachments"][0]["size"], 20);
}

#[actix_web::test]
async fn bootstrap_admin_owns_the_admin_inbox() {
    let db = memory_db().await;
    assert_eq!(resolve_admin_recipient(&db, ADMIN).await.unwrap(), ADMIN);

    ensure_admin(&db, ADMIN, "Root@Example.com", "change me please".into()).await.unwrap();
    let admin = user::Entity::find_by_id(ADMIN).one(&db).await.unwrap().unwrap();
    assert_eq!(admin.role, UserRole::Admin);
    assert_eq!(admin.email, "root@example.com");
    assert_eq!(resolve_admin_recipient(&db, ADMIN).await.unwrap(), ADMIN);

    // a second start with the same email leaves the account alone
    ensure_admin(&db, "admin-2", "root@example.com", "another one".into()).await.unwrap();
    assert!(user::Entity::find_by_id("admin-2").one(&db).await.unwrap().is_none());
}

#[actix_web::test]
async fn unknown_admin_recipient_resolves_to_an_existing_admin() {
    let db = memory_db().await;
    ensure_admin(&db, "ops-lead", "lead@example.com", "change me please".into()).await.unwrap();

    assert_eq!(resolve_admin_recipient(&db, ADMIN).await.unwrap(), "ops-lead");
}

#[actix_web::test]
async fn register_then_login() {
    let dir = tempfile::tempdir().unwrap();
    let app = app!(dir.path());

    let req = test::TestRequest::post()
        .uri("/auth/register")
        .set_json(json!({ "name": "Dana", "email": "Dana@Example.com", "password": "correct horse" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let registered: Value = test::read_body_json(resp).await;
    assert_eq!(registered["user"]["email"], "dana@example.com");
    assert_eq!(registered["user"]["role"], "user");

    let req = test::TestRequest::post()
        .uri("/auth/login")
        .set_json(json!({ "email": "dana@example.com", "password": "wrong password" }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);

    let req = test::TestRequest::post()
        .uri("/auth/login")
        .set_json(json!({ "email": "dana@example.com", "password": "correct horse" }))
        .to_request();
    let logged_in: Value = test::call_and_read_body_json(&app, req).await;
    let token = logged_in["token"].as_str().unwrap();

    let req = test::TestRequest::get()
        .uri("/api/auth/me")
        .insert_header(("Authorization", format!("Bearer {token}")))
        .to_request();
    let me: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(me["id"], registered["user"]["id"]);
}
