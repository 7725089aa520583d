//! # library-db: Database Layer for the School Library
//!
//! This crate provides database access for the library service.
//! It uses SQLite with sqlx for async operations.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Library Data Flow                                │
//! │                                                                         │
//! │  HTTP handler (POST /api/lending/create)                               │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     library-db (THIS CRATE)                     │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌────────────────┐    ┌──────────────┐ │   │
//! │  │   │   Database    │    │  Repositories  │    │  Migrations  │ │   │
//! │  │   │   (pool.rs)   │    │                │    │  (embedded)  │ │   │
//! │  │   │               │    │ BookRepository │    │              │ │   │
//! │  │   │ SqlitePool    │◄───│ InventoryLedger│    │ 001_initial_ │ │   │
//! │  │   │ LendingPolicy │    │ LoanRegistry   │    │   schema.sql │ │   │
//! │  │   │               │    │ Member/Barcode │    │              │ │   │
//! │  │   └───────────────┘    └────────────────┘    └──────────────┘ │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     SQLite Database (WAL)                       │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Repositories (books, inventory, members, loans, ...)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use library_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("library.db")).await?;
//!
//! let loan = db.loans().borrow(book_id, member_id, None).await?;
//! let returned = db.loans().return_loan(loan.id).await?;
//! println!("fine: {:?}", returned.fine());
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

pub use repository::barcode::BarcodeRepository;
pub use repository::book::BookRepository;
pub use repository::inventory::InventoryLedger;
pub use repository::librarian::LibrarianRepository;
pub use repository::loan::LoanRegistry;
pub use repository::member::MemberRepository;
