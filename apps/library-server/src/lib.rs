//! # Library Server
//!
//! JSON API over the school library database.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Library Server Routes                           │
//! │                                                                         │
//! │  ┌────────────────┐  ┌────────────────┐  ┌────────────────────────────┐│
//! │  │  /api/books    │  │  /api/members  │  │  /api/lending              ││
//! │  │                │  │                │  │                            ││
//! │  │ • all, id      │  │ • all, id      │  │ • all, active, returned    ││
//! │  │ • create       │  │ • create       │  │ • overdue                  ││
//! │  │ • update       │  │ • update       │  │ • create (borrow)          ││
//! │  │ • delete       │  │ • delete       │  │ • PUT id{n} (return)       ││
//! │  │ • search       │  │ • history      │  │                            ││
//! │  │ • history      │  │                │  │                            ││
//! │  │ • barcodes     │  │                │  │                            ││
//! │  └────────────────┘  └────────────────┘  └────────────────────────────┘│
//! │                                                                         │
//! │  Public: /health, /api/signup, /api/login, /api/logout                 │
//! │  Everything else passes through auth::require_login                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration
//! See [`config`] for the TOML file and the `LIBRARY_*` environment
//! variables.

pub mod auth;
pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::middleware;
use axum::routing::{delete, get, post, put};
use axum::Router;
use library_db::Database;

// Re-exports
pub use auth::SessionManager;
pub use config::LibraryConfig;
pub use error::{ApiError, ApiResult};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub sessions: Arc<SessionManager>,
    pub config: Arc<LibraryConfig>,
}

impl AppState {
    pub fn new(db: Database, config: LibraryConfig) -> Self {
        let sessions = SessionManager::new(
            config.auth.session_secret.clone(),
            config.auth.session_lifetime_secs,
        );

        AppState {
            db,
            sessions: Arc::new(sessions),
            config: Arc::new(config),
        }
    }
}

/// Builds the application router.
pub fn router(state: AppState) -> Router {
    use routes::{account, books, health, lending, members};

    let protected = Router::new()
        // Catalogue
        .route("/api/books/all", get(books::list_books))
        .route("/api/books/id/{id}", get(books::get_book))
        .route("/api/books/create", post(books::create_book))
        .route("/api/books/update/{id}", put(books::update_book))
        .route("/api/books/delete/{id}", delete(books::delete_book))
        .route("/api/books/search", get(books::search_books))
        .route("/api/books/history/{id}", get(books::book_history))
        .route(
            "/api/books/barcodes/{id}",
            get(books::list_barcodes).post(books::generate_barcodes),
        )
        // Members
        .route("/api/members/all", get(members::list_members))
        .route("/api/members/id/{id}", get(members::get_member))
        .route("/api/members/create", post(members::create_member))
        .route("/api/members/update/{id}", put(members::update_member))
        .route("/api/members/delete/{id}", delete(members::delete_member))
        .route("/api/members/history/{id}", get(members::member_history))
        // Lending
        .route("/api/lending/all", get(lending::list_all))
        .route("/api/lending/active", get(lending::list_active))
        .route("/api/lending/returned", get(lending::list_returned))
        .route("/api/lending/overdue", get(lending::list_overdue))
        .route("/api/lending/create", post(lending::borrow_book))
        .route("/api/lending/{loan_ref}", put(lending::return_book))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_login,
        ));

    Router::new()
        .route("/health", get(health::health))
        .route("/api/signup", post(account::signup))
        .route("/api/login", post(account::login))
        .route("/api/logout", post(account::logout))
        .merge(protected)
        .with_state(state)
}
