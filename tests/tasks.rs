use std::sync::Arc;
use std::time::Duration;

use actix_web::http::{header, StatusCode};
use actix_web::{test, web, App};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

use tasks_app::auth::AuthMiddleware;
use tasks_app::cache::InMemoryTaskCache;
use tasks_app::config::Config;
use tasks_app::routes;
use tasks_app::state::AppState;
use tasks_app::store::MemoryStore;

fn test_config() -> Config {
    Config {
        database_url: None,
        server_port: 0,
        server_host: "127.0.0.1".to_string(),
        jwt_secret: "integration-test-secret".to_string(),
        frontend_url: "http://localhost:3000".to_string(),
        cache_ttl: Duration::from_secs(30),
        smtp: None,
    }
}

macro_rules! test_app {
    ($state:expr) => {
        test::init_service(
            App::new().app_data(web::Data::new($state)).service(
                web::scope("/api")
                    .wrap(AuthMiddleware)
                    .configure(routes::config),
            ),
        )
        .await
    };
}

/// Signs up `email` and returns `(user id, "Bearer <token>")`.
macro_rules! signup {
    ($app:expr, $email:expr) => {{
        let req = test::TestRequest::post()
            .uri("/api/auth/signup")
            .set_json(json!({"email": $email, "password": "hunter22"}))
            .to_request();
        let resp = test::call_service(&$app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let body: Value = test::read_body_json(resp).await;
        (
            body["user"]["id"].as_i64().unwrap(),
            format!("Bearer {}", body["token"].as_str().unwrap()),
        )
    }};
}

macro_rules! create_task {
    ($app:expr, $auth:expr, $payload:expr) => {{
        let req = test::TestRequest::post()
            .uri("/api/tasks")
            .insert_header((header::AUTHORIZATION, $auth.clone()))
            .set_json($payload)
            .to_request();
        let resp = test::call_service(&$app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let task: Value = test::read_body_json(resp).await;
        task
    }};
}

macro_rules! list_tasks {
    ($app:expr, $auth:expr, $uri:expr) => {{
        let req = test::TestRequest::get()
            .uri($uri)
            .insert_header((header::AUTHORIZATION, $auth.clone()))
            .to_request();
        let resp = test::call_service(&$app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let listing: Value = test::read_body_json(resp).await;
        listing
    }};
}

#[actix_rt::test]
async fn test_task_lifecycle() {
    let app = test_app!(AppState::new(Arc::new(MemoryStore::new()), &test_config()));
    let (user_id, auth) = signup!(app, "tasks@example.com");

    let task = create_task!(
        app,
        auth,
        json!({"title": "Buy milk", "category": "Errands", "due_date": "2026-11-01"})
    );
    assert_eq!(task["title"], "Buy milk");
    assert_eq!(task["status"], "TODO");
    assert_eq!(task["category"], "Errands");
    assert_eq!(task["due_date"], "2026-11-01");
    assert_eq!(task["user_id"].as_i64(), Some(user_id));
    let task_id = task["id"].as_str().unwrap().to_string();

    let req = test::TestRequest::patch()
        .uri(&format!("/api/tasks/{}", task_id))
        .insert_header((header::AUTHORIZATION, auth.clone()))
        .set_json(json!({"status": "DONE", "due_date": null}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let updated: Value = test::read_body_json(resp).await;
    assert_eq!(updated["status"], "DONE");
    assert_eq!(updated["title"], "Buy milk");
    assert_eq!(updated["category"], "Errands");
    assert!(updated["due_date"].is_null());

    let req = test::TestRequest::get()
        .uri("/api/tasks/summary")
        .insert_header((header::AUTHORIZATION, auth.clone()))
        .to_request();
    let summary: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(summary, json!({"TODO": 0, "IN_PROGRESS": 0, "DONE": 1}));

    let req = test::TestRequest::delete()
        .uri(&format!("/api/tasks/{}", task_id))
        .insert_header((header::AUTHORIZATION, auth.clone()))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["message"], "Task deleted");

    let req = test::TestRequest::delete()
        .uri(&format!("/api/tasks/{}", task_id))
        .insert_header((header::AUTHORIZATION, auth.clone()))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "Task not found");
}

#[actix_rt::test]
async fn test_task_validation() {
    let app = test_app!(AppState::new(Arc::new(MemoryStore::new()), &test_config()));
    let (_, auth) = signup!(app, "strict@example.com");

    for payload in [
        json!({"title": ""}),
        json!({"title": "x".repeat(201)}),
        json!({"description": "no title"}),
        json!({"title": "Bad date", "due_date": "next tuesday"}),
    ] {
        let req = test::TestRequest::post()
            .uri("/api/tasks")
            .insert_header((header::AUTHORIZATION, auth.clone()))
            .set_json(&payload)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "payload {}", payload);
    }

    let task = create_task!(app, auth, json!({"title": "Valid"}));
    let uri = format!("/api/tasks/{}", task["id"].as_str().unwrap());

    let req = test::TestRequest::patch()
        .uri(&uri)
        .insert_header((header::AUTHORIZATION, auth.clone()))
        .set_json(json!({"status": "ARCHIVED"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let req = test::TestRequest::patch()
        .uri(&uri)
        .insert_header((header::AUTHORIZATION, auth.clone()))
        .set_json(json!({}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "No updates provided");

    let req = test::TestRequest::get()
        .uri("/api/tasks?status=ARCHIVED")
        .insert_header((header::AUTHORIZATION, auth.clone()))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let req = test::TestRequest::patch()
        .uri("/api/tasks/not-a-uuid")
        .insert_header((header::AUTHORIZATION, auth.clone()))
        .set_json(json!({"status": "DONE"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[actix_rt::test]
async fn test_tasks_are_scoped_to_owner() {
    let app = test_app!(AppState::new(Arc::new(MemoryStore::new()), &test_config()));
    let (_, owner) = signup!(app, "owner@example.com");
    let (_, intruder) = signup!(app, "intruder@example.com");

    let task = create_task!(app, owner, json!({"title": "Private"}));
    let uri = format!("/api/tasks/{}", task["id"].as_str().unwrap());

    let req = test::TestRequest::patch()
        .uri(&uri)
        .insert_header((header::AUTHORIZATION, intruder.clone()))
        .set_json(json!({"title": "Mine now"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let req = test::TestRequest::delete()
        .uri(&uri)
        .insert_header((header::AUTHORIZATION, intruder.clone()))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let listing = list_tasks!(app, intruder, "/api/tasks");
    assert_eq!(listing["tasks"], json!([]));

    let listing = list_tasks!(app, owner, "/api/tasks");
    assert_eq!(listing["tasks"][0]["title"], "Private");
}

#[actix_rt::test]
async fn test_listing_cache() {
    let app = test_app!(AppState::new(Arc::new(MemoryStore::new()), &test_config()));
    let (_, auth) = signup!(app, "cache@example.com");

    let task = create_task!(app, auth, json!({"title": "Buy milk"}));

    let first = list_tasks!(app, auth, "/api/tasks");
    assert_eq!(first["cached"], false);
    let second = list_tasks!(app, auth, "/api/tasks");
    assert_eq!(second["cached"], true);
    assert_eq!(first["tasks"], second["tasks"]);

    // Mutations evict the listing.
    let req = test::TestRequest::patch()
        .uri(&format!("/api/tasks/{}", task["id"].as_str().unwrap()))
        .insert_header((header::AUTHORIZATION, auth.clone()))
        .set_json(json!({"status": "IN_PROGRESS"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let after_patch = list_tasks!(app, auth, "/api/tasks");
    assert_eq!(after_patch["cached"], false);
    assert_eq!(after_patch["tasks"][0]["status"], "IN_PROGRESS");

    create_task!(app, auth, json!({"title": "Walk dog"}));
    let after_create = list_tasks!(app, auth, "/api/tasks");
    assert_eq!(after_create["cached"], false);
    assert_eq!(after_create["tasks"].as_array().unwrap().len(), 2);

    // Filtered listings never touch the cache.
    for _ in 0..2 {
        let filtered = list_tasks!(app, auth, "/api/tasks?status=IN_PROGRESS");
        assert_eq!(filtered["cached"], false);
        assert_eq!(filtered["tasks"].as_array().unwrap().len(), 1);
    }
    let unfiltered = list_tasks!(app, auth, "/api/tasks");
    assert_eq!(unfiltered["cached"], true);
}

#[actix_rt::test]
async fn test_listing_cache_expires() {
    let state = AppState::new(Arc::new(MemoryStore::new()), &test_config())
        .with_cache(Arc::new(InMemoryTaskCache::new(Duration::from_millis(50))));
    let app = test_app!(state);
    let (_, auth) = signup!(app, "ttl@example.com");

    create_task!(app, auth, json!({"title": "Short lived"}));
    assert_eq!(list_tasks!(app, auth, "/api/tasks")["cached"], false);
    assert_eq!(list_tasks!(app, auth, "/api/tasks")["cached"], true);

    tokio::time::sleep(Duration::from_millis(80)).await;
    assert_eq!(list_tasks!(app, auth, "/api/tasks")["cached"], false);
}

#[actix_rt::test]
async fn test_filters_and_categories() {
    let app = test_app!(AppState::new(Arc::new(MemoryStore::new()), &test_config()));
    let (_, auth) = signup!(app, "filters@example.com");

    create_task!(
        app,
        auth,
        json!({"title": "Buy milk", "category": "Errands", "description": "Two litres"})
    );
    create_task!(app, auth, json!({"title": "File taxes", "category": "Admin"}));
    create_task!(app, auth, json!({"title": "Call plumber", "category": "Errands"}));
    create_task!(app, auth, json!({"title": "Read book"}));

    let errands = list_tasks!(app, auth, "/api/tasks?category=Errands");
    assert_eq!(errands["tasks"].as_array().unwrap().len(), 2);

    let search = list_tasks!(app, auth, "/api/tasks?search=LITRES");
    assert_eq!(search["tasks"].as_array().unwrap().len(), 1);
    assert_eq!(search["tasks"][0]["title"], "Buy milk");

    let combined = list_tasks!(app, auth, "/api/tasks?category=Errands&search=plumb");
    assert_eq!(combined["tasks"].as_array().unwrap().len(), 1);

    // Wildcard characters are matched literally.
    let literal = list_tasks!(app, auth, "/api/tasks?search=%25");
    assert_eq!(literal["tasks"], json!([]));

    let req = test::TestRequest::get()
        .uri("/api/tasks/categories")
        .insert_header((header::AUTHORIZATION, auth.clone()))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body, json!({"categories": ["Admin", "Errands"]}));
}

#[actix_rt::test]
async fn test_profile() {
    let app = test_app!(AppState::new(Arc::new(MemoryStore::new()), &test_config()));
    let (user_id, auth) = signup!(app, "profile@example.com");

    let first = create_task!(app, auth, json!({"title": "One"}));
    create_task!(app, auth, json!({"title": "Two"}));
    create_task!(app, auth, json!({"title": "Three"}));

    let req = test::TestRequest::patch()
        .uri(&format!("/api/tasks/{}", first["id"].as_str().unwrap()))
        .insert_header((header::AUTHORIZATION, auth.clone()))
        .set_json(json!({"status": "DONE"}))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

    let req = test::TestRequest::get()
        .uri("/api/user/profile")
        .insert_header((header::AUTHORIZATION, auth.clone()))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let profile: Value = test::read_body_json(resp).await;
    assert_eq!(profile["id"].as_i64(), Some(user_id));
    assert_eq!(profile["email"], "profile@example.com");
    assert_eq!(profile["name"], "profile");
    assert_eq!(profile["email_verified"], false);
    assert!(profile["created_at"].is_string());
    assert!(profile.get("password_hash").is_none());
    assert_eq!(
        profile["stats"],
        json!({"total": 3, "completed": 1, "pending": 2, "in_progress": 0})
    );

    let req = test::TestRequest::patch()
        .uri("/api/user/profile")
        .insert_header((header::AUTHORIZATION, auth.clone()))
        .set_json(json!({}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let req = test::TestRequest::patch()
        .uri("/api/user/profile")
        .insert_header((header::AUTHORIZATION, auth.clone()))
        .set_json(json!({"name": "Pat", "avatar_color": "#43e97b"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let updated: Value = test::read_body_json(resp).await;
    assert_eq!(
        updated,
        json!({
            "id": user_id,
            "email": "profile@example.com",
            "name": "Pat",
            "avatar_color": "#43e97b"
        })
    );
}

#[actix_rt::test]
async fn test_blank_optional_fields_are_stored_as_null() {
    let app = test_app!(AppState::new(Arc::new(MemoryStore::new()), &test_config()));
    let (_, auth) = signup!(app, "blank@example.com");

    // What the web client sends when the optional inputs are left empty.
    let task = create_task!(
        app,
        auth,
        json!({"title": "Buy milk", "description": "", "category": "", "due_date": null})
    );
    assert!(task["description"].is_null());
    assert!(task["category"].is_null());
    assert!(task["due_date"].is_null());

    let req = test::TestRequest::get()
        .uri("/api/tasks/categories")
        .insert_header((header::AUTHORIZATION, auth.clone()))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body, json!({"categories": []}));

    // Clearing through an edit behaves the same way.
    let tagged = create_task!(app, auth, json!({"title": "File taxes", "category": "Admin"}));
    let req = test::TestRequest::patch()
        .uri(&format!("/api/tasks/{}", tagged["id"].as_str().unwrap()))
        .insert_header((header::AUTHORIZATION, auth.clone()))
        .set_json(json!({"category": ""}))
        .to_request();
    let updated: Value = test::call_and_read_body_json(&app, req).await;
    assert!(updated["category"].is_null());

    let req = test::TestRequest::get()
        .uri("/api/tasks/categories")
        .insert_header((header::AUTHORIZATION, auth.clone()))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body, json!({"categories": []}));
}
