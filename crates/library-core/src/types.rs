//! # Domain Types
//!
//! Core domain types used throughout the library service.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │      Book       │   │     Member      │   │      Loan       │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id             │   │  id             │   │  id             │       │
//! │  │  isbn (unique)  │   │  name           │   │  book_id  (FK)  │       │
//! │  │  title, author  │   │  role           │   │  member_id (FK) │       │
//! │  │  copies (≥ 0)   │   │  join_date      │   │  due/return     │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Barcode      │   │   MemberRole    │   │   LoanStatus    │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  one per copy   │   │  Student   (5)  │   │  Active         │       │
//! │  │  is_borrowed    │   │  ClassMonitor   │   │  Overdue        │       │
//! │  └─────────────────┘   │           (10)  │   │  Returned       │       │
//! │                        └─────────────────┘   └─────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Copies Semantics
//! `Book::copies` is the number of copies currently on the shelf, not the
//! number the library owns. Every active loan has already taken one unit.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;

use crate::error::ValidationError;
use crate::money::Money;

// =============================================================================
// Book
// =============================================================================

/// A title in the catalogue together with its shelf count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Book {
    pub id: i64,
    pub title: String,
    pub author: String,
    pub genre: Option<String>,
    /// ISBN, unique across the catalogue.
    pub isbn: String,
    /// Copies currently available for lending.
    pub copies: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Book {
    /// A book can be lent while at least one copy is on the shelf.
    #[inline]
    pub fn is_available(&self) -> bool {
        self.copies > 0
    }

    /// Shelf status shown in the catalogue.
    pub fn status(&self) -> BookStatus {
        if self.is_available() {
            BookStatus::Available
        } else {
            BookStatus::Borrowed
        }
    }
}

/// Derived catalogue status of a book.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub enum BookStatus {
    Available,
    Borrowed,
}

/// Fields accepted when adding or replacing a book.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewBook {
    pub title: String,
    pub author: String,
    #[serde(default)]
    pub genre: Option<String>,
    pub isbn: String,
    pub copies: i64,
}

/// A book search result with its popularity (number of active loans).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct BookSearchHit {
    #[serde(flatten)]
    #[cfg_attr(feature = "sqlx", sqlx(flatten))]
    pub book: Book,
    pub active_loans: i64,
}

/// Catalogue search criteria.
///
/// Every text filter is an optional, case-insensitive substring match;
/// filters combine with AND.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(default)]
#[ts(export)]
pub struct BookSearch {
    pub title: Option<String>,
    pub author: Option<String>,
    pub isbn: Option<String>,
    pub genre: Option<String>,
    /// Only books with at least one copy on the shelf.
    pub available_only: bool,
    /// Order by number of active loans, most borrowed first.
    pub sort_by_popularity: bool,
}

// =============================================================================
// Member Role
// =============================================================================

/// The role of a member, which decides how many books they may hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum MemberRole {
    #[default]
    Student,
    ClassMonitor,
}

impl MemberRole {
    /// Wire/database spelling of the role.
    pub fn as_str(&self) -> &'static str {
        match self {
            MemberRole::Student => "student",
            MemberRole::ClassMonitor => "class_monitor",
        }
    }
}

impl fmt::Display for MemberRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MemberRole {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace([' ', '-'], "_").as_str() {
            "student" => Ok(MemberRole::Student),
            "class_monitor" | "monitor" => Ok(MemberRole::ClassMonitor),
            _ => Err(ValidationError::NotAllowed {
                field: "role".to_string(),
                allowed: vec!["student".to_string(), "class_monitor".to_string()],
            }),
        }
    }
}

// =============================================================================
// Member
// =============================================================================

/// A student or class monitor who can borrow books.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Member {
    pub id: i64,
    pub name: String,
    /// Phone number or e-mail, free form.
    pub contact: Option<String>,
    #[ts(as = "String")]
    pub join_date: NaiveDate,
    pub role: MemberRole,
}

/// Fields accepted when adding or updating a member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewMember {
    pub name: String,
    #[serde(default)]
    pub contact: Option<String>,
    #[serde(default)]
    pub role: MemberRole,
    /// Defaults to the day the member is added.
    #[serde(default)]
    #[ts(as = "Option<String>")]
    pub join_date: Option<NaiveDate>,
}

// =============================================================================
// Loan
// =============================================================================

/// Where a loan is in its two-state lifecycle, with overdue derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum LoanStatus {
    /// Not yet returned, still within the loan period.
    Active,
    /// Not yet returned and past its due date.
    Overdue,
    /// Returned; the return date is final.
    Returned,
}

/// One member borrowing one copy of a book.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Loan {
    pub id: i64,
    pub book_id: i64,
    pub member_id: i64,
    /// Physical copy handed out, when the book has barcodes.
    pub barcode: Option<String>,
    #[ts(as = "String")]
    pub issue_date: NaiveDate,
    #[ts(as = "String")]
    pub due_date: NaiveDate,
    #[ts(as = "Option<String>")]
    pub return_date: Option<NaiveDate>,
    /// Fine charged at return, in cents.
    pub fine_cents: Option<i64>,
}

impl Loan {
    /// A loan is active until it is returned.
    #[inline]
    pub fn is_active(&self) -> bool {
        self.return_date.is_none()
    }

    /// Active and past its due date.
    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        self.is_active() && self.due_date < today
    }

    pub fn status(&self, today: NaiveDate) -> LoanStatus {
        loan_status(self.return_date, self.due_date, today)
    }

    /// Whole days past due as of `today` (0 when not overdue).
    pub fn days_overdue(&self, today: NaiveDate) -> i64 {
        days_overdue(self.return_date, self.due_date, today)
    }

    pub fn fine(&self) -> Option<Money> {
        self.fine_cents.map(Money::from_cents)
    }
}

/// A loan joined with the book title and member name for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct LoanRecord {
    pub id: i64,
    pub book_id: i64,
    pub book_title: String,
    pub member_id: i64,
    pub member_name: String,
    pub barcode: Option<String>,
    #[ts(as = "String")]
    pub issue_date: NaiveDate,
    #[ts(as = "String")]
    pub due_date: NaiveDate,
    #[ts(as = "Option<String>")]
    pub return_date: Option<NaiveDate>,
    pub fine_cents: Option<i64>,
}

impl LoanRecord {
    pub fn status(&self, today: NaiveDate) -> LoanStatus {
        loan_status(self.return_date, self.due_date, today)
    }

    pub fn days_overdue(&self, today: NaiveDate) -> i64 {
        days_overdue(self.return_date, self.due_date, today)
    }
}

fn loan_status(return_date: Option<NaiveDate>, due_date: NaiveDate, today: NaiveDate) -> LoanStatus {
    match return_date {
        Some(_) => LoanStatus::Returned,
        None if due_date < today => LoanStatus::Overdue,
        None => LoanStatus::Active,
    }
}

fn days_overdue(return_date: Option<NaiveDate>, due_date: NaiveDate, today: NaiveDate) -> i64 {
    if return_date.is_some() {
        return 0;
    }
    (today - due_date).num_days().max(0)
}

// =============================================================================
// Barcode
// =============================================================================

/// One physical copy of a book.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Barcode {
    pub barcode: String,
    pub book_id: i64,
    pub is_borrowed: bool,
}

impl Barcode {
    /// Builds the label printed on a copy: `LIB-{book:06}-{copy:04}`.
    ///
    /// ## Example
    /// ```rust
    /// use library_core::Barcode;
    ///
    /// assert_eq!(Barcode::label(42, 3), "LIB-000042-0003");
    /// ```
    pub fn label(book_id: i64, copy_number: i64) -> String {
        format!("LIB-{:06}-{:04}", book_id, copy_number)
    }
}

// =============================================================================
// Librarian
// =============================================================================

/// A staff account allowed to log in to the service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Librarian {
    pub id: i64,
    pub username: String,
    /// Argon2 PHC string; never sent to clients.
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn loan(due: NaiveDate, returned: Option<NaiveDate>) -> Loan {
        Loan {
            id: 1,
            book_id: 1,
            member_id: 1,
            barcode: None,
            issue_date: due - chrono::Duration::days(14),
            due_date: due,
            return_date: returned,
            fine_cents: None,
        }
    }

    #[test]
    fn test_book_status_follows_copies() {
        let now = Utc::now();
        let mut book = Book {
            id: 1,
            title: "Matilda".to_string(),
            author: "Roald Dahl".to_string(),
            genre: Some("Fiction".to_string()),
            isbn: "9780142410370".to_string(),
            copies: 1,
            created_at: now,
            updated_at: now,
        };
        assert!(book.is_available());
        assert_eq!(book.status(), BookStatus::Available);

        book.copies = 0;
        assert!(!book.is_available());
        assert_eq!(book.status(), BookStatus::Borrowed);
    }

    #[test]
    fn test_member_role_parsing() {
        assert_eq!("student".parse::<MemberRole>().unwrap(), MemberRole::Student);
        assert_eq!(
            "Class Monitor".parse::<MemberRole>().unwrap(),
            MemberRole::ClassMonitor
        );
        assert_eq!(
            "class_monitor".parse::<MemberRole>().unwrap(),
            MemberRole::ClassMonitor
        );
        assert!("principal".parse::<MemberRole>().is_err());
    }

    #[test]
    fn test_member_role_serde() {
        let json = serde_json::to_string(&MemberRole::ClassMonitor).unwrap();
        assert_eq!(json, "\"class_monitor\"");
        assert_eq!(MemberRole::default(), MemberRole::Student);
    }

    #[test]
    fn test_loan_status_transitions() {
        let due = date(2024, 5, 15);

        let open = loan(due, None);
        assert_eq!(open.status(date(2024, 5, 10)), LoanStatus::Active);
        // Due today is not overdue yet
        assert_eq!(open.status(due), LoanStatus::Active);
        assert_eq!(open.status(date(2024, 5, 16)), LoanStatus::Overdue);
        assert!(open.is_overdue(date(2024, 5, 16)));

        let closed = loan(due, Some(date(2024, 5, 20)));
        assert_eq!(closed.status(date(2024, 6, 1)), LoanStatus::Returned);
        assert!(!closed.is_overdue(date(2024, 6, 1)));
    }

    #[test]
    fn test_days_overdue() {
        let due = date(2024, 5, 15);
        assert_eq!(loan(due, None).days_overdue(date(2024, 5, 10)), 0);
        assert_eq!(loan(due, None).days_overdue(date(2024, 5, 18)), 3);
        assert_eq!(
            loan(due, Some(date(2024, 5, 18))).days_overdue(date(2024, 5, 30)),
            0
        );
    }

    #[test]
    fn test_new_member_defaults() {
        let member: NewMember = serde_json::from_str(r#"{"name": "Ada"}"#).unwrap();
        assert_eq!(member.role, MemberRole::Student);
        assert!(member.contact.is_none());
        assert!(member.join_date.is_none());
    }

    #[test]
    fn test_barcode_label() {
        assert_eq!(Barcode::label(7, 12), "LIB-000007-0012");
    }
}
