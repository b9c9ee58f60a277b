//! # usercache
//!
//! User records in SQLite behind a read-through cache, served over a small
//! async HTTP/1.1 stack.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use usercache::database::Database;
//! use usercache::handlers::{AppState, routes};
//! use usercache::store::UserRepo;
//! use usercache::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Arc::new(Database::open("users.db")?);
//!     let router = routes(AppState::new(Arc::new(UserRepo::new(db))));
//!
//!     let server = Server::bind("127.0.0.1:8080").await?;
//!     server.serve(router, async { let _ = tokio::signal::ctrl_c().await; }).await?;
//!     Ok(())
//! }
//! ```

// ── Users: storage, cache and request handling ───────────────────────────────
pub mod cache;
pub mod database;
pub mod handlers;
pub mod service;
pub mod store;

// ── HTTP plumbing ─────────────────────────────────────────────────────────────
pub mod context;
pub mod http;
pub mod middleware;
pub mod router;
pub mod server;

pub mod config;

// ── Convenience re-exports ────────────────────────────────────────────────────
pub use http::{Headers, Method, Request, Response, StatusCode};
pub use router::Router;
pub use server::{Server, ServerError};
