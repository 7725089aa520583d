//! Catalogue endpoints: `/api/books/*`.

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use library_core::validation::{validate_barcode_count, validate_new_book};
use library_core::{Barcode, BookSearch, BookSearchHit, BookStatus, NewBook};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{loan_views, BookView, LoanView, MessageResponse};
use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// Body of `POST /api/books/create`.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateBookRequest {
    pub title: String,
    pub author: String,
    #[serde(default)]
    pub genre: Option<String>,
    pub isbn: String,
    pub copies: i64,
    /// Also label every copy with a barcode.
    #[serde(default)]
    pub generate_barcodes: bool,
}

impl CreateBookRequest {
    fn to_new_book(&self) -> NewBook {
        NewBook {
            title: self.title.clone(),
            author: self.author.clone(),
            genre: self.genre.clone(),
            isbn: self.isbn.clone(),
            copies: self.copies,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BookCreated {
    pub message: String,
    pub book: BookView,
    pub barcodes: Vec<Barcode>,
}

/// Body of `POST /api/books/barcodes/{id}`.
#[derive(Debug, Clone, Deserialize)]
pub struct GenerateBarcodesRequest {
    pub count: i64,
}

/// A search hit with its shelf status.
#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    #[serde(flatten)]
    pub hit: BookSearchHit,
    pub status: BookStatus,
}

pub async fn list_books(State(state): State<AppState>) -> ApiResult<Json<Vec<BookView>>> {
    let books = state.db.books().list().await?;
    Ok(Json(books.into_iter().map(BookView::from).collect()))
}

pub async fn get_book(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
) -> ApiResult<Json<BookView>> {
    let Path(id) = path?;
    let book = state
        .db
        .books()
        .get(id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("Book not found: {}", id)))?;

    Ok(Json(book.into()))
}

pub async fn create_book(
    State(state): State<AppState>,
    payload: Result<Json<CreateBookRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<BookCreated>)> {
    let Json(req) = payload?;
    let new_book = req.to_new_book();
    validate_new_book(&new_book)?;
    if req.generate_barcodes {
        validate_barcode_count(req.copies)?;
    }

    let book = state.db.books().insert(&new_book).await?;

    let barcodes = if req.generate_barcodes {
        state.db.barcodes().generate(book.id, book.copies).await?
    } else {
        Vec::new()
    };

    info!(book_id = book.id, barcodes = barcodes.len(), "Book created via API");

    Ok((
        StatusCode::CREATED,
        Json(BookCreated {
            message: format!("Book '{}' added", book.title),
            book: book.into(),
            barcodes,
        }),
    ))
}

pub async fn update_book(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
    payload: Result<Json<NewBook>, JsonRejection>,
) -> ApiResult<Json<BookView>> {
    let Path(id) = path?;
    let Json(book) = payload?;
    validate_new_book(&book)?;

    let updated = state.db.books().update(id, &book).await?;
    Ok(Json(updated.into()))
}

pub async fn delete_book(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
) -> ApiResult<Json<MessageResponse>> {
    let Path(id) = path?;
    state.db.books().delete(id).await?;
    Ok(Json(MessageResponse::new(format!("Book {} deleted", id))))
}

pub async fn search_books(
    State(state): State<AppState>,
    query: Result<Query<BookSearch>, QueryRejection>,
) -> ApiResult<Json<Vec<SearchResult>>> {
    let Query(criteria) = query?;
    let hits = state.db.books().search(&criteria).await?;

    Ok(Json(
        hits.into_iter()
            .map(|hit| SearchResult {
                status: hit.book.status(),
                hit,
            })
            .collect(),
    ))
}

pub async fn book_history(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
) -> ApiResult<Json<Vec<LoanView>>> {
    let Path(id) = path?;
    ensure_book(&state, id).await?;

    let records = state.db.loans().borrowing_history_for_book(id).await?;
    Ok(Json(loan_views(records)))
}

pub async fn list_barcodes(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
) -> ApiResult<Json<Vec<Barcode>>> {
    let Path(id) = path?;
    ensure_book(&state, id).await?;

    Ok(Json(state.db.barcodes().list_for_book(id).await?))
}

pub async fn generate_barcodes(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
    payload: Result<Json<GenerateBarcodesRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Vec<Barcode>>)> {
    let Path(id) = path?;
    let Json(req) = payload?;

    let created = state.db.barcodes().generate(id, req.count).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn ensure_book(state: &AppState, id: i64) -> ApiResult<()> {
    match state.db.books().get(id).await? {
        Some(_) => Ok(()),
        None => Err(ApiError::not_found(format!("Book not found: {}", id))),
    }
}
