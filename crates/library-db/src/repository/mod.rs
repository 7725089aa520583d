//! # Repository Module
//!
//! Database repository implementations for the library.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  HTTP handler                                                          │
//! │       │                                                                 │
//! │       │  db.loans().borrow(book_id, member_id, None)                   │
//! │       ▼                                                                 │
//! │  LoanRegistry ─────────────┐                                           │
//! │  ├── borrow / return_loan  │ one transaction                           │
//! │  └── list_* projections    ▼                                           │
//! │                     InventoryLedger::decrement_in / increment_in       │
//! │       │                                                                 │
//! │       │  SQL                                                            │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`book::BookRepository`] - Catalogue CRUD and advanced search
//! - [`inventory::InventoryLedger`] - Available-copies counter per book
//! - [`member::MemberRepository`] - Member CRUD
//! - [`loan::LoanRegistry`] - Borrow, return and loan projections
//! - [`barcode::BarcodeRepository`] - Physical copy labels
//! - [`librarian::LibrarianRepository`] - Staff accounts

pub mod barcode;
pub mod book;
pub mod inventory;
pub mod librarian;
pub mod loan;
pub mod member;

/// Escapes a user search term for use inside `LIKE ? ESCAPE '\'`.
pub(crate) fn like_pattern(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len() + 2);
    escaped.push('%');
    for c in term.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("hob"), "%hob%");
        assert_eq!(like_pattern("100%"), "%100\\%%");
        assert_eq!(like_pattern("a_b"), "%a\\_b%");
    }
}
