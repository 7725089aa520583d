//! # Inventory Ledger
//!
//! The per-book counter of copies currently on the shelf.
//!
//! ## Delta Updates, Never Absolute
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                    Copy Count Update Strategy                       │
//! │                                                                     │
//! │  ❌ WRONG: read, check, write back                                  │
//! │     SELECT copies FROM books WHERE id = ?      → 1                 │
//! │     (another request borrows the last copy here)                   │
//! │     UPDATE books SET copies = 0 WHERE id = ?   → two loans, 1 copy │
//! │                                                                     │
//! │  ✅ CORRECT: one conditional delta                                  │
//! │     UPDATE books SET copies = copies - 1                           │
//! │     WHERE id = ? AND copies > 0                                    │
//! │     rows_affected = 0  →  not found or out of stock                │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The `*_in` functions run on a caller's transaction so the Loan Registry
//! can compose them into its unit of work.

use chrono::Utc;
use library_core::CoreError;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::DbResult;

/// Repository view over `books.copies`.
#[derive(Debug, Clone)]
pub struct InventoryLedger {
    pool: SqlitePool,
}

impl InventoryLedger {
    pub fn new(pool: SqlitePool) -> Self {
        InventoryLedger { pool }
    }

    /// Takes one copy off the shelf.
    ///
    /// ## Errors
    /// * `CoreError::BookNotFound` - no such book
    /// * `CoreError::OutOfStock` - `copies` is already 0
    pub async fn decrement(&self, book_id: i64) -> DbResult<()> {
        let mut conn = self.pool.acquire().await?;
        decrement_in(&mut conn, book_id).await
    }

    /// Puts one copy back on the shelf. There is no upper bound.
    pub async fn increment(&self, book_id: i64) -> DbResult<()> {
        let mut conn = self.pool.acquire().await?;
        increment_in(&mut conn, book_id).await
    }

    /// Whether at least one copy is on the shelf.
    pub async fn availability(&self, book_id: i64) -> DbResult<bool> {
        Ok(self.copies(book_id).await? > 0)
    }

    /// Copies currently on the shelf.
    pub async fn copies(&self, book_id: i64) -> DbResult<i64> {
        let mut conn = self.pool.acquire().await?;
        copies_in(&mut conn, book_id)
            .await?
            .ok_or_else(|| CoreError::BookNotFound(book_id).into())
    }
}

// =============================================================================
// Transaction-Scoped Operations
// =============================================================================

/// Conditional decrement on an existing connection or transaction.
pub async fn decrement_in(conn: &mut SqliteConnection, book_id: i64) -> DbResult<()> {
    debug!(book_id, "Decrementing copies");

    let result = sqlx::query(
        r#"
        UPDATE books
        SET copies = copies - 1, updated_at = ?2
        WHERE id = ?1 AND copies > 0
        "#,
    )
    .bind(book_id)
    .bind(Utc::now())
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 1 {
        return Ok(());
    }

    // Zero rows: tell a missing book apart from an empty shelf
    match copies_in(conn, book_id).await? {
        None => Err(CoreError::BookNotFound(book_id).into()),
        Some(_) => Err(CoreError::OutOfStock { book_id }.into()),
    }
}

/// Unconditional increment on an existing connection or transaction.
pub async fn increment_in(conn: &mut SqliteConnection, book_id: i64) -> DbResult<()> {
    debug!(book_id, "Incrementing copies");

    let result = sqlx::query(
        r#"
        UPDATE books
        SET copies = copies + 1, updated_at = ?2
        WHERE id = ?1
        "#,
    )
    .bind(book_id)
    .bind(Utc::now())
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(CoreError::BookNotFound(book_id).into());
    }

    Ok(())
}

async fn copies_in(conn: &mut SqliteConnection, book_id: i64) -> DbResult<Option<i64>> {
    let copies = sqlx::query_scalar("SELECT copies FROM books WHERE id = ?1")
        .bind(book_id)
        .fetch_optional(&mut *conn)
        .await?;

    Ok(copies)
}

// =============================================================================
// Unit Tests
// =============================================================================
