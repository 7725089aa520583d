//! Route handlers and the JSON shapes they exchange.
//!
//! Handlers stay thin: decode the request, validate at the boundary, call
//! one repository operation, shape the response.

pub mod account;
pub mod books;
pub mod health;
pub mod lending;
pub mod members;

use chrono::{Local, NaiveDate};
use library_core::{Book, BookStatus, LoanRecord, LoanStatus};
use serde::Serialize;

/// A book with its derived shelf status.
#[derive(Debug, Clone, Serialize)]
pub struct BookView {
    #[serde(flatten)]
    pub book: Book,
    pub status: BookStatus,
}

impl From<Book> for BookView {
    fn from(book: Book) -> Self {
        let status = book.status();
        BookView { book, status }
    }
}

/// A loan row as shown in listings, with status derived for `today`.
#[derive(Debug, Clone, Serialize)]
pub struct LoanView {
    #[serde(flatten)]
    pub record: LoanRecord,
    pub status: LoanStatus,
    pub days_overdue: i64,
}

impl LoanView {
    pub fn at(record: LoanRecord, today: NaiveDate) -> Self {
        LoanView {
            status: record.status(today),
            days_overdue: record.days_overdue(today),
            record,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        MessageResponse {
            message: message.into(),
        }
    }
}

pub(crate) fn today() -> NaiveDate {
    Local::now().date_naive()
}

pub(crate) fn loan_views(records: Vec<LoanRecord>) -> Vec<LoanView> {
    let today = today();
    records
        .into_iter()
        .map(|record| LoanView::at(record, today))
        .collect()
}
