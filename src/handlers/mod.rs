//! Request handlers — translate HTTP requests into service and cache calls.
//!
//! | Route          | Action                                                    |
//! |----------------|-----------------------------------------------------------|
//! | `GET /create`  | insert the fixed demo user through [`UserService`]        |
//! | `POST /users`  | insert the JSON body through [`UserService`]              |
//! | `GET /users`   | list users through the read-through [`CachedUsers`]       |
//! | `GET /health`  | liveness probe                                            |
//!
//! Storage calls block, so every handler moves them onto Tokio's blocking pool.

use std::sync::Arc;

use tracing::{error, info, warn};

use crate::cache::CachedUsers;
use crate::context::Context;
use crate::router::Router;
use crate::service::UserService;
use crate::store::{StoreError, User, UserRepository};
use crate::{Response, StatusCode};

/// Body sent with `201 Created`.
pub const CREATED_BODY: &str = "Create user";

/// The record `GET /create` inserts on every call.
pub fn demo_user() -> User {
    User {
        email: "demo@example.com".to_owned(),
        password: "demo-password".to_owned(),
        name: "Demo User".to_owned(),
        age: 20,
    }
}

/// Everything the handlers need, built once at startup.
///
/// The service and the cache share one repository handle.
#[derive(Clone)]
pub struct AppState {
    service: UserService,
    users: Arc<CachedUsers>,
}

impl AppState {
    pub fn new(repo: Arc<dyn UserRepository>) -> Self {
        Self {
            service: UserService::new(Arc::clone(&repo)),
            users: Arc::new(CachedUsers::new(repo)),
        }
    }

    pub fn service(&self) -> &UserService {
        &self.service
    }

    pub fn users(&self) -> &CachedUsers {
        &self.users
    }
}

/// Registers every route on a fresh [`Router`].
pub fn routes(state: AppState) -> Router {
    let mut router = Router::new();

    let s = state.clone();
    router.get("/create", move |_ctx| create_demo_user(s.clone()));

    let s = state.clone();
    router.post("/users", move |ctx| create_user(s.clone(), ctx));

    router.get("/users", move |_ctx| list_users(state.clone()));

    router.get("/health", |_ctx| async { Response::text(StatusCode::Ok, "ok") });

    router
}

async fn create_demo_user(state: AppState) -> Response {
    insert(state, demo_user()).await
}

async fn create_user(state: AppState, ctx: Context) -> Response {
    match ctx.json::<User>() {
        Ok(user) => insert(state, user).await,
        Err(e) => {
            warn!(error = %e, "rejected malformed user body");
            Response::text(StatusCode::BadRequest, e.to_string())
        }
    }
}

async fn insert(state: AppState, user: User) -> Response {
    let email = user.email.clone();
    let result = tokio::task::spawn_blocking(move || state.service.create_user(&user)).await;

    match result {
        Ok(Ok(())) => {
            info!(%email, "user created");
            Response::text(StatusCode::Created, CREATED_BODY)
        }
        Ok(Err(e)) => store_error(e),
        Err(e) => join_error(e),
    }
}

async fn list_users(state: AppState) -> Response {
    let result = tokio::task::spawn_blocking(move || state.users.get_all_users()).await;

    match result {
        Ok(Ok(users)) => Response::json(StatusCode::Ok, &users[..]),
        Ok(Err(e)) => store_error(e),
        Err(e) => join_error(e),
    }
}

fn store_error(e: StoreError) -> Response {
    let status = e.status();
    if status == StatusCode::InternalServerError {
        error!(error = %e, "storage failure");
    } else {
        warn!(error = %e, "request rejected");
    }
    Response::text(status, e.to_string())
}

fn join_error(e: tokio::task::JoinError) -> Response {
    error!(error = %e, "blocking task failed");
    Response::text(StatusCode::InternalServerError, e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Request;
    use crate::database::Database;
    use crate::store::UserRepo;

    fn state() -> AppState {
        let db = Arc::new(Database::open_in_memory().unwrap());
        AppState::new(Arc::new(UserRepo::new(db)))
    }

    fn request(method: &str, path: &str, body: &str) -> Request {
        let raw = format!(
            "{method} {path} HTTP/1.1\r\nContent-Length: {}\r\n\r\n{body}",
            body.len()
        );
        Request::parse(raw.as_bytes()).unwrap().0
    }

    fn users_of(res: &Response) -> Vec<User> {
        serde_json::from_slice(res.content()).unwrap()
    }

    #[tokio::test]
    async fn create_returns_201_then_400_on_repeat() {
        let router = routes(state());

        let first = router.route(request("GET", "/create", "")).await;
        assert_eq!(first.status(), StatusCode::Created);
        assert_eq!(first.content(), CREATED_BODY.as_bytes());

        let second = router.route(request("GET", "/create", "")).await;
        assert_eq!(second.status(), StatusCode::BadRequest);
        assert_eq!(
            second.content(),
            b"user with the demo@example.com email already exists"
        );
    }

    #[tokio::test]
    async fn list_on_empty_store_is_empty_array() {
        let router = routes(state());
        let res = router.route(request("GET", "/users", "")).await;
        assert_eq!(res.status(), StatusCode::Ok);
        assert_eq!(res.headers().get("content-type"), Some("application/json"));
        assert_eq!(res.content(), b"[]");
    }

    #[tokio::test]
    async fn post_users_parses_the_body() {
        let router = routes(state());
        let body = r#"{"email":"a@x.com","password":"p","name":"A","age":20}"#;

        let res = router.route(request("POST", "/users", body)).await;
        assert_eq!(res.status(), StatusCode::Created);

        let res = router.route(request("GET", "/users", "")).await;
        let users = users_of(&res);
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].email, "a@x.com");
        assert_eq!(users[0].age, 20);
    }

    #[tokio::test]
    async fn post_users_rejects_minors_and_bad_json() {
        let router = routes(state());

        let minor = r#"{"email":"b@x.com","password":"p","name":"B","age":15}"#;
        let res = router.route(request("POST", "/users", minor)).await;
        assert_eq!(res.status(), StatusCode::BadRequest);
        assert_eq!(res.content(), b"user must be at least 18 years old");

        let res = router.route(request("POST", "/users", "{\"email\":")).await;
        assert_eq!(res.status(), StatusCode::BadRequest);
    }

    #[tokio::test]
    async fn list_keeps_serving_the_first_snapshot() {
        let router = routes(state());

        let body = r#"{"email":"a@x.com","password":"p","name":"A","age":20}"#;
        router.route(request("POST", "/users", body)).await;
        let before = router.route(request("GET", "/users", "")).await;

        router.route(request("GET", "/create", "")).await;
        let after = router.route(request("GET", "/users", "")).await;

        assert_eq!(users_of(&before), users_of(&after));
        assert_eq!(users_of(&after).len(), 1);
    }

    #[tokio::test]
    async fn storage_failure_is_500_with_message() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        db.conn().execute_batch("DROP TABLE users").unwrap();
        let router = routes(AppState::new(Arc::new(UserRepo::new(db))));

        let res = router.route(request("GET", "/users", "")).await;
        assert_eq!(res.status(), StatusCode::InternalServerError);
        assert!(std::str::from_utf8(res.content()).unwrap().contains("no such table"));
    }

    #[tokio::test]
    async fn health_is_ok() {
        let res = routes(state()).route(request("GET", "/health", "")).await;
        assert_eq!(res.status(), StatusCode::Ok);
        assert_eq!(res.content(), b"ok");
    }
}
