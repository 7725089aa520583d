//! # library-core: Pure Lending Logic for the School Library
//!
//! This crate is the **heart** of the library service. It contains the
//! lending rules as pure functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     School Library Architecture                         │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    Desktop Client (GUI)                         │   │
//! │  │    Books ──► Members ──► Lending ──► Overdue                     │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ HTTP JSON                              │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    library-server (axum)                        │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │              ★ library-core (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │   money   │  │  policy   │  │ validation│  │   │
//! │  │   │   Book    │  │   Money   │  │  limits   │  │   rules   │  │   │
//! │  │   │   Loan    │  │  (cents)  │  │  fines    │  │  checks   │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO CLOCK • PURE FUNCTIONS             │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                  library-db (Database Layer)                    │   │
//! │  │        SQLite, migrations, inventory ledger, loan registry      │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Book, Member, Loan, Barcode, ...)
//! - [`money`] - Money type with integer arithmetic (fines)
//! - [`policy`] - Borrowing limits, due dates and fine computation
//! - [`error`] - Domain error types
//! - [`validation`] - Input validation
//!
//! ## Example Usage
//!
//! ```rust
//! use chrono::NaiveDate;
//! use library_core::{LendingPolicy, MemberRole};
//!
//! let policy = LendingPolicy::default();
//! let issued = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
//!
//! // Two weeks to bring it back
//! let due = policy.due_date(issued);
//! assert_eq!(due, NaiveDate::from_ymd_opt(2024, 3, 15).unwrap());
//!
//! // Three days late
//! let returned = NaiveDate::from_ymd_opt(2024, 3, 18).unwrap();
//! assert_eq!(policy.fine_for(due, returned), policy.fine_per_day.times(3));
//!
//! assert_eq!(policy.limit(MemberRole::Student), 5);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod money;
pub mod policy;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use policy::LendingPolicy;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Number of days a book may be kept before it becomes overdue.
pub const DEFAULT_LOAN_PERIOD_DAYS: u32 = 14;

/// Simultaneous active loans allowed for a student.
pub const STUDENT_BORROW_LIMIT: u32 = 5;

/// Simultaneous active loans allowed for a class monitor.
pub const CLASS_MONITOR_BORROW_LIMIT: u32 = 10;

/// Default fine per late day, in cents.
pub const DEFAULT_FINE_PER_DAY_CENTS: i64 = 10;
