//! Lending endpoints: `/api/lending/*`.
//!
//! ## Borrow / Return
//! ```text
//! POST /api/lending/create   {book_id, member_id, barcode?}
//!        │
//!        ▼
//!   LoanRegistry::borrow ──► one transaction:
//!        decrement copies → member lookup → limit check
//!        → claim barcode → insert loan
//!        │
//!        ▼
//!   201 {message, loan}      or 404 / 409 / 422 with nothing written
//!
//! PUT /api/lending/id{loan_id}
//!        │
//!        ▼
//!   LoanRegistry::return_loan ──► one transaction:
//!        stamp return_date → fine → increment copies → release barcode
//!        │
//!        ▼
//!   200 {message, fine_cents, loan}
//! ```

use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use library_core::validation::validate_id;
use library_core::{Loan, ValidationError};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{loan_views, LoanView};
use crate::error::ApiResult;
use crate::AppState;

/// Body of `POST /api/lending/create`.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateLoanRequest {
    pub book_id: i64,
    pub member_id: i64,
    /// A specific copy to lend; otherwise the first free one is used.
    #[serde(default)]
    pub barcode: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoanCreated {
    pub message: String,
    pub loan: Loan,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoanReturned {
    pub message: String,
    pub fine_cents: i64,
    pub loan: Loan,
}

pub async fn list_all(State(state): State<AppState>) -> ApiResult<Json<Vec<LoanView>>> {
    Ok(Json(loan_views(state.db.loans().list_all().await?)))
}

pub async fn list_active(State(state): State<AppState>) -> ApiResult<Json<Vec<LoanView>>> {
    Ok(Json(loan_views(state.db.loans().list_active().await?)))
}

pub async fn list_returned(State(state): State<AppState>) -> ApiResult<Json<Vec<LoanView>>> {
    Ok(Json(loan_views(state.db.loans().list_returned().await?)))
}

pub async fn list_overdue(State(state): State<AppState>) -> ApiResult<Json<Vec<LoanView>>> {
    Ok(Json(loan_views(state.db.loans().list_overdue().await?)))
}

pub async fn borrow_book(
    State(state): State<AppState>,
    payload: Result<Json<CreateLoanRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<LoanCreated>)> {
    let Json(req) = payload?;
    validate_id("book_id", req.book_id)?;
    validate_id("member_id", req.member_id)?;

    let barcode = req.barcode.as_deref().filter(|b| !b.trim().is_empty());
    let loan = state
        .db
        .loans()
        .borrow(req.book_id, req.member_id, barcode)
        .await?;

    info!(loan_id = loan.id, book_id = loan.book_id, member_id = loan.member_id, "Loan created via API");

    Ok((
        StatusCode::CREATED,
        Json(LoanCreated {
            message: format!("Book lent, due back on {}", loan.due_date),
            loan,
        }),
    ))
}

pub async fn return_book(
    State(state): State<AppState>,
    path: Result<Path<String>, PathRejection>,
) -> ApiResult<Json<LoanReturned>> {
    let Path(loan_ref) = path?;
    let loan_id = parse_loan_ref(&loan_ref)?;

    let loan = state.db.loans().return_loan(loan_id).await?;
    let fine = loan.fine().unwrap_or_default();

    let message = if fine.is_positive() {
        format!("Book returned late, fine {}", fine)
    } else {
        "Book returned".to_string()
    };

    Ok(Json(LoanReturned {
        message,
        fine_cents: fine.cents(),
        loan,
    }))
}

/// Accepts `id12` as well as a bare `12`.
fn parse_loan_ref(raw: &str) -> Result<i64, ValidationError> {
    let digits = raw.strip_prefix("id").unwrap_or(raw);
    let id = digits
        .parse::<i64>()
        .map_err(|_| ValidationError::InvalidFormat {
            field: "loan_id".to_string(),
            reason: format!("'{}' is not a loan id", raw),
        })?;
    validate_id("loan_id", id)?;
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LibraryConfig;
    use crate::routes::testing::{seed_book, seed_member, test_state, test_state_with};
    use chrono::{Duration, Local};
    use library_core::{Barcode, LoanStatus, MemberRole};

    fn request(book_id: i64, member_id: i64) -> CreateLoanRequest {
        CreateLoanRequest {
            book_id,
            member_id,
            barcode: None,
        }
    }

    #[test]
    fn test_parse_loan_ref() {
        assert_eq!(parse_loan_ref("id12").unwrap(), 12);
        assert_eq!(parse_loan_ref("7").unwrap(), 7);
        assert!(parse_loan_ref("idx").is_err());
        assert!(parse_loan_ref("id0").is_err());
        assert!(parse_loan_ref("").is_err());
    }

    #[tokio::test]
    async fn test_last_copy_scenario() {
        let state = test_state().await;
        let book = seed_book(&state, "Matilda", "9780142410370", 1).await;
        let alice = seed_member(&state, "Alice", MemberRole::Student).await;
        let bob = seed_member(&state, "Bob", MemberRole::Student).await;

        let (status, Json(created)) = borrow_book(State(state.clone()), Ok(Json(request(book.id, alice.id))))
            .await
            .unwrap();
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created.loan.member_id, alice.id);
        assert_eq!(state.db.inventory().copies(book.id).await.unwrap(), 0);

        let refused = borrow_book(State(state.clone()), Ok(Json(request(book.id, bob.id))))
            .await
            .unwrap_err();
        assert_eq!(refused.status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(refused.code, "OUT_OF_STOCK");

        let Json(returned) = return_book(
            State(state.clone()),
            Ok(Path(format!("id{}", created.loan.id))),
        )
        .await
        .unwrap();
        assert_eq!(returned.fine_cents, 0);
        assert_eq!(returned.message, "Book returned");
        assert!(returned.loan.return_date.is_some());
        assert_eq!(state.db.inventory().copies(book.id).await.unwrap(), 1);

        let twice = return_book(State(state), Ok(Path(format!("id{}", created.loan.id))))
            .await
            .unwrap_err();
        assert_eq!(twice.status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_limit_and_unknown_ids() {
        let mut config = LibraryConfig::default();
        config.lending.student_limit = 1;
        let state = test_state_with(config).await;

        let first = seed_book(&state, "Matilda", "9780142410370", 3).await;
        let second = seed_book(&state, "The BFG", "9780142410387", 3).await;
        let ben = seed_member(&state, "Ben", MemberRole::Student).await;

        let (status, _) = borrow_book(State(state.clone()), Ok(Json(request(first.id, ben.id))))
            .await
            .unwrap();
        assert_eq!(status, StatusCode::CREATED);
        let limited = borrow_book(State(state.clone()), Ok(Json(request(second.id, ben.id))))
            .await
            .unwrap_err();
        assert_eq!(limited.code, "LIMIT_EXCEEDED");
        assert_eq!(state.db.inventory().copies(second.id).await.unwrap(), 3);

        let no_member = borrow_book(State(state.clone()), Ok(Json(request(second.id, 999))))
            .await
            .unwrap_err();
        assert_eq!(no_member.status, StatusCode::NOT_FOUND);

        let no_book = borrow_book(State(state.clone()), Ok(Json(request(999, ben.id))))
            .await
            .unwrap_err();
        assert_eq!(no_book.status, StatusCode::NOT_FOUND);

        let bad_id = borrow_book(State(state), Ok(Json(request(0, ben.id))))
            .await
            .unwrap_err();
        assert_eq!(bad_id.status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_borrow_specific_barcode() {
        let state = test_state().await;
        let book = seed_book(&state, "Matilda", "9780142410370", 2).await;
        state.db.barcodes().generate(book.id, 2).await.unwrap();
        let ada = seed_member(&state, "Ada", MemberRole::Student).await;

        let wanted = Barcode::label(book.id, 2);
        let (_, Json(created)) = borrow_book(
            State(state.clone()),
            Ok(Json(CreateLoanRequest {
                book_id: book.id,
                member_id: ada.id,
                barcode: Some(wanted.clone()),
            })),
        )
        .await
        .unwrap();
        assert_eq!(created.loan.barcode.as_deref(), Some(wanted.as_str()));

        let taken = borrow_book(
            State(state),
            Ok(Json(CreateLoanRequest {
                book_id: book.id,
                member_id: ada.id,
                barcode: Some(wanted),
            })),
        )
        .await
        .unwrap_err();
        assert_eq!(taken.status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_late_return_and_projections() {
        let state = test_state().await;
        let book = seed_book(&state, "Matilda", "9780142410370", 2).await;
        let ada = seed_member(&state, "Ada", MemberRole::Student).await;
        let today = Local::now().date_naive();

        // Issued 20 days ago, due 6 days ago
        let late = state
            .db
            .loans()
            .borrow_on(book.id, ada.id, None, today - Duration::days(20))
            .await
            .unwrap();
        let current = state.db.loans().borrow(book.id, ada.id, None).await.unwrap();

        let Json(overdue) = list_overdue(State(state.clone())).await.unwrap();
        assert_eq!(overdue.len(), 1);
        assert_eq!(overdue[0].record.id, late.id);
        assert_eq!(overdue[0].status, LoanStatus::Overdue);
        assert_eq!(overdue[0].days_overdue, 6);

        let Json(returned) = return_book(State(state.clone()), Ok(Path(late.id.to_string())))
            .await
            .unwrap();
        assert_eq!(returned.fine_cents, 60);
        assert!(returned.message.contains("$0.60"));

        let Json(active) = list_active(State(state.clone())).await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].record.id, current.id);
        assert_eq!(active[0].status, LoanStatus::Active);

        let Json(done) = list_returned(State(state.clone())).await.unwrap();
        assert_eq!(done.len(), 1);
        assert_eq!(done[0].status, LoanStatus::Returned);

        let Json(all) = list_all(State(state)).await.unwrap();
        assert_eq!(all.len(), 2);
    }
}
