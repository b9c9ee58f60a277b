use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::oneshot;

use usercache::Server;
use usercache::database::Database;
use usercache::handlers::{AppState, routes};
use usercache::middleware::LoggerMiddleware;
use usercache::store::{User, UserRepo, UserRepository};

struct Running {
    addr: SocketAddr,
    repo: Arc<UserRepo>,
    _stop: oneshot::Sender<()>,
}

async fn start() -> Running {
    let db = Arc::new(Database::open_in_memory().unwrap());
    let repo = Arc::new(UserRepo::new(db));

    let mut router = routes(AppState::new(repo.clone()));
    router.layer(LoggerMiddleware);

    let server = Server::bind("127.0.0.1:0").await.unwrap();
    let addr = server.local_addr();
    let (tx, rx) = oneshot::channel::<()>();
    tokio::spawn(server.serve(router, async move {
        let _ = rx.await;
    }));

    Running {
        addr,
        repo,
        _stop: tx,
    }
}

struct Reply {
    status: u16,
    body: String,
}

async fn send(addr: SocketAddr, method: &str, path: &str, body: &str) -> Reply {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let raw = format!(
        "{method} {path} HTTP/1.1\r\nHost: test\r\nConnection: close\r\nContent-Length: {}\r\n\r\n{body}",
        body.len()
    );
    stream.write_all(raw.as_bytes()).await.unwrap();

    let mut out = Vec::new();
    stream.read_to_end(&mut out).await.unwrap();
    let text = String::from_utf8(out).unwrap();

    let status = text[9..12].parse().unwrap();
    let (_, body) = text.split_once("\r\n\r\n").unwrap();
    Reply {
        status,
        body: body.to_owned(),
    }
}

fn user_json(email: &str, age: i64) -> String {
    format!(r#"{{"email":"{email}","password":"pw","name":"Someone","age":{age}}}"#)
}

#[tokio::test]
async fn create_list_and_reject() {
    let app = start().await;

    let reply = send(app.addr, "POST", "/users", &user_json("a@x.com", 20)).await;
    assert_eq!(reply.status, 201);

    let reply = send(app.addr, "GET", "/users", "").await;
    assert_eq!(reply.status, 200);
    let users: Vec<User> = serde_json::from_str(&reply.body).unwrap();
    assert_eq!(users.len(), 1);
    assert_eq!(users[0].email, "a@x.com");
    assert_eq!(users[0].age, 20);

    let reply = send(app.addr, "POST", "/users", &user_json("a@x.com", 20)).await;
    assert_eq!(reply.status, 400);
    assert_eq!(reply.body, "user with the a@x.com email already exists");

    let reply = send(app.addr, "POST", "/users", &user_json("b@x.com", 15)).await;
    assert_eq!(reply.status, 400);
    assert_eq!(reply.body, "user must be at least 18 years old");
}

#[tokio::test]
async fn json_fields_are_named_after_the_table_columns() {
    let app = start().await;
    send(app.addr, "GET", "/create", "").await;

    let reply = send(app.addr, "GET", "/users", "").await;
    let value: serde_json::Value = serde_json::from_str(&reply.body).unwrap();
    let first = &value[0];
    for field in ["email", "password", "name", "age"] {
        assert!(first.get(field).is_some(), "missing field {field}");
    }
}

#[tokio::test]
async fn reads_after_warmup_miss_new_rows() {
    let app = start().await;
    app.repo
        .create_user(&User {
            email: "first@x.com".to_owned(),
            password: "pw".to_owned(),
            name: "First".to_owned(),
            age: 30,
        })
        .unwrap();

    let warm = send(app.addr, "GET", "/users", "").await;
    let created = send(app.addr, "GET", "/create", "").await;
    assert_eq!(created.status, 201);
    assert_eq!(created.body, "Create user");

    let stale = send(app.addr, "GET", "/users", "").await;
    assert_eq!(stale.body, warm.body);
    assert_eq!(app.repo.get_all_users().unwrap().len(), 2);
}

#[tokio::test]
async fn concurrent_cold_reads_agree() {
    let app = start().await;
    for i in 0..5 {
        let email = format!("u{i}@x.com");
        send(app.addr, "POST", "/users", &user_json(&email, 25)).await;
    }

    let mut tasks = Vec::new();
    for _ in 0..16 {
        let addr = app.addr;
        tasks.push(tokio::spawn(async move { send(addr, "GET", "/users", "").await }));
    }

    for task in tasks {
        let reply = task.await.unwrap();
        assert_eq!(reply.status, 200);
        let users: Vec<User> = serde_json::from_str(&reply.body).unwrap();
        assert_eq!(users.len(), 5);
    }
}

#[tokio::test]
async fn unknown_route_and_wrong_method() {
    let app = start().await;
    assert_eq!(send(app.addr, "GET", "/nope", "").await.status, 404);
    assert_eq!(send(app.addr, "DELETE", "/users", "").await.status, 405);
}
