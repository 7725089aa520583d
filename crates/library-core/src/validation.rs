//! # Validation Module
//!
//! Input validation for catalogue, member, lending and account requests.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: HTTP boundary (library-server)                               │
//! │  ├── JSON deserialization into explicit request structs                │
//! │  └── THIS MODULE: field rules (required, length, format)               │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Repositories (library-db)                                    │
//! │  └── Lending rules: stock, borrowing limits                            │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── CHECK (copies >= 0)                                               │
//! │  ├── UNIQUE (isbn), UNIQUE (barcode), UNIQUE (username)                │
//! │  └── Foreign key constraints                                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use library_core::validation::{validate_isbn, validate_title};
//!
//! validate_title("The Hobbit").unwrap();
//! validate_isbn("978-0-261-10221-7").unwrap();
//! ```

use crate::error::ValidationError;
use crate::types::{NewBook, NewMember};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Most copies of a single title the catalogue accepts.
pub const MAX_COPIES: i64 = 1_000;

/// Most barcodes generated in one request.
pub const MAX_BARCODE_BATCH: i64 = 100;

// =============================================================================
// Helpers
// =============================================================================

fn required_text(field: &str, value: &str, max: usize) -> ValidationResult<()> {
    let value = value.trim();

    if value.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if value.chars().count() > max {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max,
        });
    }

    Ok(())
}

fn optional_text(field: &str, value: Option<&str>, max: usize) -> ValidationResult<()> {
    match value {
        Some(v) if v.chars().count() > max => Err(ValidationError::TooLong {
            field: field.to_string(),
            max,
        }),
        _ => Ok(()),
    }
}

// =============================================================================
// Catalogue Validators
// =============================================================================

/// Validates a book title (1-200 characters after trimming).
pub fn validate_title(title: &str) -> ValidationResult<()> {
    required_text("title", title, 200)
}

/// Validates an author name (1-200 characters after trimming).
pub fn validate_author(author: &str) -> ValidationResult<()> {
    required_text("author", author, 200)
}

/// Validates an ISBN.
///
/// ## Rules
/// - Digits, hyphens and spaces only; a trailing `X` check digit is allowed
/// - 10 or 13 digits once separators are removed
///
/// ## Example
/// ```rust
/// use library_core::validation::validate_isbn;
///
/// assert!(validate_isbn("9780261102217").is_ok());
/// assert!(validate_isbn("0-261-10221-X").is_ok());
/// assert!(validate_isbn("12345").is_err());
/// assert!(validate_isbn("").is_err());
/// ```
pub fn validate_isbn(isbn: &str) -> ValidationResult<()> {
    let isbn = isbn.trim();

    if isbn.is_empty() {
        return Err(ValidationError::Required {
            field: "isbn".to_string(),
        });
    }

    let compact: Vec<char> = isbn.chars().filter(|c| *c != '-' && *c != ' ').collect();
    let last = compact.len().saturating_sub(1);
    let well_formed = compact
        .iter()
        .enumerate()
        .all(|(i, c)| c.is_ascii_digit() || (i == last && (*c == 'X' || *c == 'x')));

    if !well_formed || !(compact.len() == 10 || compact.len() == 13) {
        return Err(ValidationError::InvalidFormat {
            field: "isbn".to_string(),
            reason: "must be 10 or 13 digits".to_string(),
        });
    }

    Ok(())
}

/// Validates a copy count for a new or updated book.
///
/// Zero is allowed: a title can be catalogued before copies arrive.
pub fn validate_copies(copies: i64) -> ValidationResult<()> {
    if !(0..=MAX_COPIES).contains(&copies) {
        return Err(ValidationError::OutOfRange {
            field: "copies".to_string(),
            min: 0,
            max: MAX_COPIES,
        });
    }

    Ok(())
}

/// Validates the number of barcodes to generate in one batch.
pub fn validate_barcode_count(count: i64) -> ValidationResult<()> {
    if count <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "count".to_string(),
        });
    }

    if count > MAX_BARCODE_BATCH {
        return Err(ValidationError::OutOfRange {
            field: "count".to_string(),
            min: 1,
            max: MAX_BARCODE_BATCH,
        });
    }

    Ok(())
}

/// Validates every field of a book payload.
pub fn validate_new_book(book: &NewBook) -> ValidationResult<()> {
    validate_title(&book.title)?;
    validate_author(&book.author)?;
    optional_text("genre", book.genre.as_deref(), 100)?;
    validate_isbn(&book.isbn)?;
    validate_copies(book.copies)
}

/// Validates a search filter.
///
/// ## Returns
/// The trimmed filter, or `None` when it is blank.
pub fn validate_search_term(field: &str, term: Option<&str>) -> ValidationResult<Option<String>> {
    let Some(term) = term.map(str::trim) else {
        return Ok(None);
    };

    if term.is_empty() {
        return Ok(None);
    }

    if term.chars().count() > 100 {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: 100,
        });
    }

    Ok(Some(term.to_string()))
}

// =============================================================================
// Member Validators
// =============================================================================

/// Validates a member name (1-120 characters after trimming).
pub fn validate_member_name(name: &str) -> ValidationResult<()> {
    required_text("name", name, 120)
}

/// Validates every field of a member payload.
pub fn validate_new_member(member: &NewMember) -> ValidationResult<()> {
    validate_member_name(&member.name)?;
    optional_text("contact", member.contact.as_deref(), 200)
}

// =============================================================================
// Account Validators
// =============================================================================

/// Validates a librarian username.
///
/// ## Rules
/// - 3-50 characters
/// - Letters, digits, `.`, `_` and `-` only
pub fn validate_username(username: &str) -> ValidationResult<()> {
    let username = username.trim();

    if username.is_empty() {
        return Err(ValidationError::Required {
            field: "username".to_string(),
        });
    }

    let len = username.chars().count();
    if len < 3 {
        return Err(ValidationError::TooShort {
            field: "username".to_string(),
            min: 3,
        });
    }
    if len > 50 {
        return Err(ValidationError::TooLong {
            field: "username".to_string(),
            max: 50,
        });
    }

    if !username
        .chars()
        .all(|c| c.is_alphanumeric() || matches!(c, '.' | '_' | '-'))
    {
        return Err(ValidationError::InvalidFormat {
            field: "username".to_string(),
            reason: "must contain only letters, numbers, dots, hyphens, and underscores"
                .to_string(),
        });
    }

    Ok(())
}

/// Validates a new password (8-128 characters, not trimmed).
pub fn validate_password(password: &str) -> ValidationResult<()> {
    if password.is_empty() {
        return Err(ValidationError::Required {
            field: "password".to_string(),
        });
    }

    let len = password.chars().count();
    if len < 8 {
        return Err(ValidationError::TooShort {
            field: "password".to_string(),
            min: 8,
        });
    }
    if len > 128 {
        return Err(ValidationError::TooLong {
            field: "password".to_string(),
            max: 128,
        });
    }

    Ok(())
}

// =============================================================================
// Identifier Validators
// =============================================================================

/// Validates a row id taken from a path or request body.
pub fn validate_id(field: &str, id: i64) -> ValidationResult<()> {
    if id <= 0 {
        return Err(ValidationError::MustBePositive {
            field: field.to_string(),
        });
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
