//! # Book Repository
//!
//! Catalogue operations: add, list, update, delete and advanced search.
//!
//! ## Advanced Search
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    How Advanced Search Works                            │
//! │                                                                         │
//! │  BookSearch { author: "dahl", available_only: true,                    │
//! │               sort_by_popularity: true }                               │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  WHERE 1 = 1                                                           │
//! │    AND b.author LIKE '%dahl%' ESCAPE '\'     (case-insensitive)        │
//! │    AND b.copies > 0                                                    │
//! │  ORDER BY active_loans DESC, b.title                                   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌───────────────────────────────────────────┐                         │
//! │  │ Matilda            copies 2  active 5     │                         │
//! │  │ The BFG            copies 1  active 2     │                         │
//! │  │ Fantastic Mr Fox   copies 3  active 0     │                         │
//! │  └───────────────────────────────────────────┘                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use library_core::validation::validate_search_term;
use library_core::{Book, BookSearch, BookSearchHit, NewBook};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use tracing::{debug, info};

use super::like_pattern;
use crate::error::{DbError, DbResult};

const BOOK_COLUMNS: &str =
    "b.id, b.title, b.author, b.genre, b.isbn, b.copies, b.created_at, b.updated_at";

/// Repository for the book catalogue.
///
/// Copy counts change through [`crate::InventoryLedger`]; `update` here
/// replaces them wholesale (a librarian correcting the shelf count).
#[derive(Debug, Clone)]
pub struct BookRepository {
    pool: SqlitePool,
}

impl BookRepository {
    pub fn new(pool: SqlitePool) -> Self {
        BookRepository { pool }
    }

    /// Inserts a new book.
    ///
    /// ## Returns
    /// * `Ok(Book)` - Inserted book with its generated id
    /// * `Err(DbError::UniqueViolation)` - ISBN already catalogued
    pub async fn insert(&self, book: &NewBook) -> DbResult<Book> {
        debug!(isbn = %book.isbn, "Inserting book");

        let now = Utc::now();
        let result = sqlx::query(
            r#"
            INSERT INTO books (title, author, genre, isbn, copies, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
            "#,
        )
        .bind(book.title.trim())
        .bind(book.author.trim())
        .bind(book.genre.as_deref().map(str::trim))
        .bind(book.isbn.trim())
        .bind(book.copies)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| DbError::from(e).with_duplicate_value(book.isbn.trim()))?;

        let id = result.last_insert_rowid();
        info!(book_id = id, isbn = %book.isbn, copies = book.copies, "Book added");

        self.get(id)
            .await?
            .ok_or_else(|| DbError::Internal(format!("book {} vanished after insert", id)))
    }

    /// Gets a book by its id.
    pub async fn get(&self, id: i64) -> DbResult<Option<Book>> {
        let book = sqlx::query_as::<_, Book>(&format!(
            "SELECT {} FROM books b WHERE b.id = ?1",
            BOOK_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(book)
    }

    /// Gets a book by its ISBN.
    pub async fn get_by_isbn(&self, isbn: &str) -> DbResult<Option<Book>> {
        let book = sqlx::query_as::<_, Book>(&format!(
            "SELECT {} FROM books b WHERE b.isbn = ?1",
            BOOK_COLUMNS
        ))
        .bind(isbn.trim())
        .fetch_optional(&self.pool)
        .await?;

        Ok(book)
    }

    /// Lists the whole catalogue ordered by title.
    pub async fn list(&self) -> DbResult<Vec<Book>> {
        let books = sqlx::query_as::<_, Book>(&format!(
            "SELECT {} FROM books b ORDER BY b.title COLLATE NOCASE, b.id",
            BOOK_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        debug!(count = books.len(), "Listed books");
        Ok(books)
    }

    /// Replaces every editable field of a book.
    ///
    /// ## Returns
    /// * `Err(DbError::NotFound)` - no such book
    /// * `Err(DbError::UniqueViolation)` - the new ISBN belongs to another book
    pub async fn update(&self, id: i64, book: &NewBook) -> DbResult<Book> {
        debug!(book_id = id, "Updating book");

        let result = sqlx::query(
            r#"
            UPDATE books SET
                title = ?2,
                author = ?3,
                genre = ?4,
                isbn = ?5,
                copies = ?6,
                updated_at = ?7
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(book.title.trim())
        .bind(book.author.trim())
        .bind(book.genre.as_deref().map(str::trim))
        .bind(book.isbn.trim())
        .bind(book.copies)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(|e| DbError::from(e).with_duplicate_value(book.isbn.trim()))?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Book", id));
        }

        info!(book_id = id, "Book updated");
        self.get(id).await?.ok_or_else(|| DbError::not_found("Book", id))
    }

    /// Deletes a book together with its loan history and barcodes.
    ///
    /// Refused with `DbError::Conflict` while any copy is on loan.
    pub async fn delete(&self, id: i64) -> DbResult<()> {
        debug!(book_id = id, "Deleting book");

        let mut tx = self.pool.begin().await?;

        // Touch the row first: existence check and write lock in one step
        let touched = sqlx::query("UPDATE books SET updated_at = ?2 WHERE id = ?1")
            .bind(id)
            .bind(Utc::now())
            .execute(&mut *tx)
            .await?;

        if touched.rows_affected() == 0 {
            return Err(DbError::not_found("Book", id));
        }

        let active: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM loans WHERE book_id = ?1 AND return_date IS NULL",
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        if active > 0 {
            return Err(DbError::Conflict(format!(
                "book {} has {} active loan(s)",
                id, active
            )));
        }

        let history = sqlx::query("DELETE FROM loans WHERE book_id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM barcodes WHERE book_id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM books WHERE id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        debug!(book_id = id, loans = history.rows_affected(), "Removed loan history");
        tx.commit().await?;

        info!(book_id = id, "Book deleted");
        Ok(())
    }

    /// Searches the catalogue.
    ///
    /// Text filters are trimmed; blank filters are ignored. Each hit carries
    /// its number of active loans (popularity).
    pub async fn search(&self, criteria: &BookSearch) -> DbResult<Vec<BookSearchHit>> {
        let filters = [
            ("b.title", validate_search_term("title", criteria.title.as_deref())?),
            ("b.author", validate_search_term("author", criteria.author.as_deref())?),
            ("b.isbn", validate_search_term("isbn", criteria.isbn.as_deref())?),
            ("b.genre", validate_search_term("genre", criteria.genre.as_deref())?),
        ];

        debug!(?criteria, "Searching books");

        let mut query: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT ");
        query.push(BOOK_COLUMNS);
        query.push(
            r#",
                (SELECT COUNT(*) FROM loans l
                 WHERE l.book_id = b.id AND l.return_date IS NULL) AS active_loans
            FROM books b
            WHERE 1 = 1"#,
        );

        for (column, term) in filters {
            if let Some(term) = term {
                query
                    .push(" AND ")
                    .push(column)
                    .push(" LIKE ")
                    .push_bind(like_pattern(&term))
                    .push(" ESCAPE '\\'");
            }
        }

        if criteria.available_only {
            query.push(" AND b.copies > 0");
        }

        if criteria.sort_by_popularity {
            query.push(" ORDER BY active_loans DESC, b.title COLLATE NOCASE, b.id");
        } else {
            query.push(" ORDER BY b.title COLLATE NOCASE, b.id");
        }

        let hits = query
            .build_query_as::<BookSearchHit>()
            .fetch_all(&self.pool)
            .await?;

        debug!(count = hits.len(), "Search returned books");
        Ok(hits)
    }

    /// Counts catalogued titles (for diagnostics).
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM books")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
