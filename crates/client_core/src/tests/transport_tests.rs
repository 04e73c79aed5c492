use super::*;
use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode as AxumStatus},
    routing::{get, post, put},
    Json, Router,
};
use shared::domain::{TaskPriority, TaskStatus, UserId};
use tokio::{net::TcpListener, sync::Mutex};

use crate::{
    notifications::{NotificationCenter, NotificationVariant},
    profile::{ProfileChange, ProfileService},
    session::Session,
};

#[derive(Clone, Default)]
struct MockState {
    seen_queries: Arc<Mutex<Vec<TaskListQuery>>>,
    seen_auth_headers: Arc<Mutex<Vec<String>>>,
    created: Arc<Mutex<Vec<TaskDraft>>>,
    deleted: Arc<Mutex<Vec<String>>>,
    profile_updates: Arc<Mutex<Vec<serde_json::Value>>>,
}

fn sample_task(id: &str, title: &str) -> Task {
    Task {
        id: TaskId::new(id),
        title: title.to_string(),
        description: None,
        status: TaskStatus::Todo,
        priority: TaskPriority::Medium,
        due_date: None,
        created_at: None,
        updated_at: None,
    }
}

fn bearer(headers: &HeaderMap) -> String {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

async fn list_handler(
    State(state): State<MockState>,
    headers: HeaderMap,
    Query(query): Query<TaskListQuery>,
) -> Result<Json<TaskListResponse>, (AxumStatus, Json<ApiError>)> {
    let auth = bearer(&headers);
    state.seen_auth_headers.lock().await.push(auth.clone());
    if auth != "Bearer good-token" {
        return Err((
            AxumStatus::UNAUTHORIZED,
            Json(ApiError::new("Not authorized, token failed")),
        ));
    }
    state.seen_queries.lock().await.push(query.clone());
    Ok(Json(TaskListResponse {
        tasks: vec![sample_task("t1", "Write docs")],
        page: query.page,
        pages: 2,
        total: 7,
    }))
}

async fn create_handler(
    State(state): State<MockState>,
    Json(draft): Json<TaskDraft>,
) -> (AxumStatus, Json<Task>) {
    let mut task = sample_task("new-1", &draft.title);
    task.priority = draft.priority.unwrap_or_default();
    state.created.lock().await.push(draft);
    (AxumStatus::CREATED, Json(task))
}

async fn update_handler(
    Path(id): Path<String>,
    Json(patch): Json<TaskPatch>,
) -> Result<Json<Task>, (AxumStatus, Json<ApiError>)> {
    if id != "t1" {
        return Err((AxumStatus::NOT_FOUND, Json(ApiError::new("Task not found"))));
    }
    let mut task = sample_task("t1", "Write docs");
    task.status = patch.status.unwrap_or(task.status);
    Ok(Json(task))
}

async fn delete_handler(
    State(state): State<MockState>,
    Path(id): Path<String>,
) -> Json<MessageResponse> {
    state.deleted.lock().await.push(id);
    Json(MessageResponse {
        message: "Task removed".to_string(),
    })
}

async fn login_handler(
    Json(request): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, (AxumStatus, Json<ApiError>)> {
    if request.password != "hunter2" {
        return Err((
            AxumStatus::UNAUTHORIZED,
            Json(ApiError::new("Invalid email or password")),
        ));
    }
    Ok(Json(AuthResponse {
        user_id: UserId::new("u1"),
        name: "Ada".to_string(),
        email: request.email,
        token: "good-token".to_string(),
    }))
}

fn authorized(headers: &HeaderMap) -> Result<(), (AxumStatus, Json<ApiError>)> {
    if bearer(headers) == "Bearer good-token" {
        Ok(())
    } else {
        Err((
            AxumStatus::UNAUTHORIZED,
            Json(ApiError::new("Not authorized, token failed")),
        ))
    }
}

async fn get_profile_handler(
    headers: HeaderMap,
) -> Result<Json<UserProfile>, (AxumStatus, Json<ApiError>)> {
    authorized(&headers)?;
    Ok(Json(UserProfile {
        user_id: UserId::new("u1"),
        name: "Ada".to_string(),
        email: "ada@example.com".to_string(),
        token: None,
    }))
}

async fn update_profile_handler(
    State(state): State<MockState>,
    headers: HeaderMap,
    Json(body): Json<serde_json::Value>,
) -> Result<Json<UserProfile>, (AxumStatus, Json<ApiError>)> {
    authorized(&headers)?;
    state.profile_updates.lock().await.push(body.clone());
    let field = |key: &str, fallback: &str| {
        body.get(key)
            .and_then(|value| value.as_str())
            .unwrap_or(fallback)
            .to_string()
    };
    Ok(Json(UserProfile {
        user_id: UserId::new("u1"),
        name: field("name", "Ada"),
        email: field("email", "ada@example.com"),
        token: None,
    }))
}

async fn broken_handler() -> (AxumStatus, &'static str) {
    (AxumStatus::INTERNAL_SERVER_ERROR, "<html>oops</html>")
}

async fn spawn_task_server() -> anyhow::Result<(String, MockState)> {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let state = MockState::default();
    let app = Router::new()
        .route("/api/tasks", get(list_handler).post(create_handler))
        .route("/api/tasks/:id", put(update_handler).delete(delete_handler))
        .route("/api/auth/login", post(login_handler))
        .route(
            "/api/users/profile",
            get(get_profile_handler).put(update_profile_handler),
        )
        .route("/api/broken/tasks", get(broken_handler))
        .with_state(state.clone());
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Ok((format!("http://{addr}/api"), state))
}

fn first_page_query() -> TaskListQuery {
    TaskListQuery {
        page: 1,
        search: String::new(),
        status: "all".to_string(),
        priority: "all".to_string(),
        limit: 6,
    }
}

fn signed_in(token: &str) -> Arc<SessionContext> {
    Arc::new(SessionContext::in_memory(Some(Session {
        user_id: UserId::new("u1"),
        name: "Ada".to_string(),
        email: "ada@example.com".to_string(),
        token: token.to_string(),
    })))
}

#[test]
fn rejects_non_http_base_urls() {
    let session = Arc::new(SessionContext::in_memory(None));
    assert!(HttpTaskApi::new("ftp://example.com/api", session.clone()).is_err());
    assert!(HttpTaskApi::new("not a url", session.clone()).is_err());
    let api = HttpTaskApi::new("http://localhost:5000/api/", session).expect("valid url");
    assert_eq!(api.base_url(), "http://localhost:5000/api");
}

#[tokio::test]
async fn list_sends_bearer_token_and_filters() {
    let (base_url, state) = spawn_task_server().await.expect("spawn server");
    let api = HttpTaskApi::new(&base_url, signed_in("good-token")).expect("api");

    let query = TaskListQuery {
        page: 2,
        search: "docs".to_string(),
        status: "in-progress".to_string(),
        priority: "all".to_string(),
        limit: 6,
    };
    let response = api.list_tasks(&query).await.expect("list");

    assert_eq!(response.page, 2);
    assert_eq!(response.pages, 2);
    assert_eq!(response.tasks.len(), 1);
    assert_eq!(state.seen_queries.lock().await.as_slice(), &[query]);
    assert_eq!(
        state.seen_auth_headers.lock().await.as_slice(),
        &["Bearer good-token".to_string()]
    );
}

#[tokio::test]
async fn unauthorized_response_expires_the_session() {
    let (base_url, _state) = spawn_task_server().await.expect("spawn server");
    let session = signed_in("stale-token");
    let api = HttpTaskApi::new(&base_url, session.clone()).expect("api");

    let err = api
        .list_tasks(&first_page_query())
        .await
        .expect_err("401 must fail");

    assert!(matches!(err, ClientError::Unauthorized));
    assert!(!session.is_authenticated().await);
}

#[tokio::test]
async fn missing_session_fails_without_request() {
    let (base_url, state) = spawn_task_server().await.expect("spawn server");
    let api = HttpTaskApi::new(&base_url, Arc::new(SessionContext::in_memory(None))).expect("api");

    let err = api
        .delete_task(&TaskId::new("t1"))
        .await
        .expect_err("no session");

    assert!(matches!(err, ClientError::NoSession));
    assert!(state.deleted.lock().await.is_empty());
    assert!(state.seen_auth_headers.lock().await.is_empty());
}

#[tokio::test]
async fn create_update_and_delete_round_trip() {
    let (base_url, state) = spawn_task_server().await.expect("spawn server");
    let api = HttpTaskApi::new(&base_url, signed_in("good-token")).expect("api");

    let draft = TaskDraft {
        priority: Some(TaskPriority::High),
        ..TaskDraft::new("Ship it")
    };
    let created = api.create_task(&draft).await.expect("create");
    assert_eq!(created.title, "Ship it");
    assert_eq!(created.priority, TaskPriority::High);
    assert_eq!(state.created.lock().await.len(), 1);

    let updated = api
        .update_task(&TaskId::new("t1"), &TaskPatch::status(TaskStatus::Done))
        .await
        .expect("update");
    assert_eq!(updated.status, TaskStatus::Done);

    api.delete_task(&TaskId::new("t1")).await.expect("delete");
    assert_eq!(state.deleted.lock().await.as_slice(), &["t1".to_string()]);
}

#[tokio::test]
async fn not_found_carries_backend_message() {
    let (base_url, _state) = spawn_task_server().await.expect("spawn server");
    let api = HttpTaskApi::new(&base_url, signed_in("good-token")).expect("api");

    let err = api
        .update_task(&TaskId::new("missing"), &TaskPatch::status(TaskStatus::Done))
        .await
        .expect_err("missing task");

    match err {
        ClientError::Rejected { status, message } => {
            assert_eq!(status, 404);
            assert_eq!(message, "Task not found");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn server_fault_without_json_body_uses_status_reason() {
    let (base_url, _state) = spawn_task_server().await.expect("spawn server");
    let api = HttpTaskApi::new(&format!("{base_url}/broken"), signed_in("good-token"))
        .expect("api");

    let err = api
        .list_tasks(&first_page_query())
        .await
        .expect_err("server fault");

    match err {
        ClientError::Server { status, message } => {
            assert_eq!(status, 500);
            assert_eq!(message, "Internal Server Error");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn unreachable_backend_is_a_transport_failure() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");

    let api = HttpTaskApi::new(&format!("http://{addr}/api"), signed_in("good-token"))
        .expect("api");
    let err = api
        .list_tasks(&first_page_query())
        .await
        .expect_err("connection refused");

    assert!(matches!(err, ClientError::Transport(_)), "got {err:?}");
}

#[tokio::test]
async fn login_rejection_does_not_touch_session() {
    let (base_url, _state) = spawn_task_server().await.expect("spawn server");
    let session = signed_in("good-token");
    let api = HttpTaskApi::new(&base_url, session.clone()).expect("api");

    let err = api
        .login(&LoginRequest {
            email: "ada@example.com".to_string(),
            password: "wrong".to_string(),
        })
        .await
        .expect_err("bad credentials");
    assert_eq!(err.user_message(), "Invalid email or password");
    assert!(session.is_authenticated().await);

    let ok = api
        .login(&LoginRequest {
            email: "ada@example.com".to_string(),
            password: "hunter2".to_string(),
        })
        .await
        .expect("login");
    assert_eq!(ok.token, "good-token");
}

#[tokio::test]
async fn profile_is_read_and_updated_with_bearer_token() {
    let (base_url, state) = spawn_task_server().await.expect("spawn server");
    let api = HttpTaskApi::new(&base_url, signed_in("good-token")).expect("api");

    let profile = api.get_profile().await.expect("profile");
    assert_eq!(profile.name, "Ada");
    assert!(profile.token.is_none());

    let updated = api
        .update_profile(&ProfileUpdate {
            name: Some("Ada Lovelace".to_string()),
            ..ProfileUpdate::default()
        })
        .await
        .expect("update");
    assert_eq!(updated.name, "Ada Lovelace");
    assert_eq!(
        state.profile_updates.lock().await.as_slice(),
        &[serde_json::json!({ "name": "Ada Lovelace" })]
    );
}

#[tokio::test]
async fn profile_service_merges_reply_and_keeps_token() {
    let (base_url, state) = spawn_task_server().await.expect("spawn server");
    let session = signed_in("good-token");
    let api = Arc::new(HttpTaskApi::new(&base_url, session.clone()).expect("api"));
    let profile = ProfileService::new(api, session.clone(), NotificationCenter::new());

    let merged = profile
        .update(&ProfileChange {
            email: Some("ada@lovelace.dev".to_string()),
            password: Some("n3w-secret".to_string()),
            confirm_password: Some("n3w-secret".to_string()),
            ..ProfileChange::default()
        })
        .await
        .expect("update");

    assert_eq!(merged.email, "ada@lovelace.dev");
    assert_eq!(merged.token, "good-token");
    assert_eq!(session.current().await, Some(merged));
    assert_eq!(
        state.profile_updates.lock().await[0],
        serde_json::json!({ "email": "ada@lovelace.dev", "password": "n3w-secret" })
    );
    let active = profile.notifications().active().await;
    assert_eq!(active[0].notification.variant, NotificationVariant::Success);
}

#[tokio::test]
async fn profile_request_with_stale_token_expires_the_session() {
    let (base_url, state) = spawn_task_server().await.expect("spawn server");
    let session = signed_in("stale-token");
    let api = HttpTaskApi::new(&base_url, session.clone()).expect("api");

    let err = api
        .update_profile(&ProfileUpdate {
            name: Some("Mallory".to_string()),
            ..ProfileUpdate::default()
        })
        .await
        .expect_err("401 must fail");

    assert!(matches!(err, ClientError::Unauthorized));
    assert!(!session.is_authenticated().await);
    assert!(state.profile_updates.lock().await.is_empty());
}
