//! # Error Types
//!
//! Domain-specific error types for library-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  library-core errors (this file)                                       │
//! │  ├── CoreError        - Lending rule violations                        │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  library-db errors (separate crate)                                    │
//! │  └── DbError          - Database operation failures                    │
//! │                                                                         │
//! │  library-server errors (in app)                                        │
//! │  └── ApiError         - What HTTP clients see (JSON body + status)     │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → DbError → ApiError → Client       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Lending rule violations and domain lookup failures.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Book not found: {0}")]
    BookNotFound(i64),

    #[error("Member not found: {0}")]
    MemberNotFound(i64),

    /// No *active* loan exists with this id (it may have been returned).
    #[error("No active loan with id {0}")]
    LoanNotFound(i64),

    /// Every copy of the book is currently lent out.
    ///
    /// ## User Workflow
    /// ```text
    /// Borrow "Matilda" (copies: 0)
    ///      │
    ///      ▼
    /// UPDATE books SET copies = copies - 1 WHERE id = ? AND copies > 0
    ///      │  rows_affected = 0
    ///      ▼
    /// OutOfStock { book_id }  →  422 "No copies of book 3 are available"
    /// ```
    #[error("No copies of book {book_id} are available")]
    OutOfStock { book_id: i64 },

    /// The member already holds as many books as their role allows.
    #[error("Member {member_id} has reached the borrowing limit of {limit} books")]
    LimitExceeded { member_id: i64, limit: u32 },

    /// The borrow/return unit of work failed for a non-domain reason and
    /// was rolled back.
    #[error("Lending operation failed: {0}")]
    LendingFailed(String),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    /// Whether this is a lookup miss rather than a rule violation.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            CoreError::BookNotFound(_) | CoreError::MemberNotFound(_) | CoreError::LoanNotFound(_)
        )
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Raised at the boundary, before any database work starts.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("{field} is required")]
    Required { field: String },

    #[error("{field} must be at least {min} characters")]
    TooShort { field: String, min: usize },

    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (ISBN with letters, unparseable date, ...).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },

    /// Duplicate value (ISBN, username).
    #[error("{field} '{value}' already exists")]
    Duplicate { field: String, value: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
