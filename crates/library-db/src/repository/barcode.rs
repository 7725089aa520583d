//! # Barcode Repository
//!
//! One barcode per physical copy of a book. A loan claims a free barcode
//! of its book and releases it on return.
//!
//! ## Label Format
//! `LIB-{book_id:06}-{copy:04}`, e.g. `LIB-000042-0003` is the third copy
//! of book 42. Copy numbers continue from the highest existing one, so a
//! second batch never reuses a label.

use chrono::Utc;
use library_core::validation::validate_barcode_count;
use library_core::{Barcode, CoreError};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};

use crate::error::{DbError, DbResult};

/// Repository for barcode operations.
#[derive(Debug, Clone)]
pub struct BarcodeRepository {
    pool: SqlitePool,
}

impl BarcodeRepository {
    pub fn new(pool: SqlitePool) -> Self {
        BarcodeRepository { pool }
    }

    /// Generates `count` new barcodes for a book.
    pub async fn generate(&self, book_id: i64, count: i64) -> DbResult<Vec<Barcode>> {
        validate_barcode_count(count)?;

        let mut tx = self.pool.begin().await?;

        let touched = sqlx::query("UPDATE books SET updated_at = ?2 WHERE id = ?1")
            .bind(book_id)
            .bind(Utc::now())
            .execute(&mut *tx)
            .await?;

        if touched.rows_affected() == 0 {
            return Err(CoreError::BookNotFound(book_id).into());
        }

        let existing: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM barcodes WHERE book_id = ?1")
            .bind(book_id)
            .fetch_one(&mut *tx)
            .await?;

        let mut created = Vec::with_capacity(count as usize);
        for copy in (existing + 1)..=(existing + count) {
            let label = Barcode::label(book_id, copy);

            sqlx::query("INSERT INTO barcodes (barcode, book_id, is_borrowed) VALUES (?1, ?2, 0)")
                .bind(&label)
                .bind(book_id)
                .execute(&mut *tx)
                .await
                .map_err(|e| DbError::from(e).with_duplicate_value(&label))?;

            created.push(Barcode {
                barcode: label,
                book_id,
                is_borrowed: false,
            });
        }

        tx.commit().await?;

        info!(book_id, count, "Barcodes generated");
        Ok(created)
    }

    /// Lists the barcodes of a book in label order.
    pub async fn list_for_book(&self, book_id: i64) -> DbResult<Vec<Barcode>> {
        let barcodes = sqlx::query_as::<_, Barcode>(
            "SELECT barcode, book_id, is_borrowed FROM barcodes WHERE book_id = ?1 ORDER BY barcode",
        )
        .bind(book_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(barcodes)
    }

    /// Looks up a single barcode.
    pub async fn find(&self, barcode: &str) -> DbResult<Option<Barcode>> {
        let found = sqlx::query_as::<_, Barcode>(
            "SELECT barcode, book_id, is_borrowed FROM barcodes WHERE barcode = ?1",
        )
        .bind(barcode.trim())
        .fetch_optional(&self.pool)
        .await?;

        Ok(found)
    }
}

// =============================================================================
// Transaction-Scoped Operations
// =============================================================================

/// Marks a barcode of `book_id` as borrowed.
///
/// With `requested`, that exact copy must belong to the book and be free.
/// Without it, the first free copy is taken; a book with no free barcodes
/// yields `None` and the loan simply carries no barcode.
pub(crate) async fn claim_in(
    conn: &mut SqliteConnection,
    book_id: i64,
    requested: Option<&str>,
) -> DbResult<Option<String>> {
    let label = match requested.map(str::trim) {
        Some(code) => {
            let found: Option<(i64, bool)> =
                sqlx::query_as("SELECT book_id, is_borrowed FROM barcodes WHERE barcode = ?1")
                    .bind(code)
                    .fetch_optional(&mut *conn)
                    .await?;

            match found {
                Some((owner, _)) if owner != book_id => {
                    return Err(DbError::Conflict(format!(
                        "barcode {} belongs to book {}, not {}",
                        code, owner, book_id
                    )))
                }
                Some((_, true)) => {
                    return Err(DbError::Conflict(format!("barcode {} is already on loan", code)))
                }
                Some((_, false)) => code.to_string(),
                None => return Err(DbError::not_found("Barcode", code)),
            }
        }
        None => {
            let free: Option<String> = sqlx::query_scalar(
                r#"
                SELECT barcode FROM barcodes
                WHERE book_id = ?1 AND is_borrowed = 0
                ORDER BY barcode
                LIMIT 1
                "#,
            )
            .bind(book_id)
            .fetch_optional(&mut *conn)
            .await?;

            match free {
                Some(label) => label,
                None => return Ok(None),
            }
        }
    };

    sqlx::query("UPDATE barcodes SET is_borrowed = 1 WHERE barcode = ?1")
        .bind(&label)
        .execute(&mut *conn)
        .await?;

    debug!(book_id, barcode = %label, "Barcode claimed");
    Ok(Some(label))
}

/// Marks a barcode as back on the shelf. Unknown labels are ignored.
pub(crate) async fn release_in(conn: &mut SqliteConnection, barcode: &str) -> DbResult<()> {
    sqlx::query("UPDATE barcodes SET is_borrowed = 0 WHERE barcode = ?1")
        .bind(barcode)
        .execute(&mut *conn)
        .await?;

    debug!(barcode, "Barcode released");
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::testing::{add_book, test_db};

    #[tokio::test]
    async fn test_generate_continues_numbering() {
        let db = test_db().await;
        let book = add_book(&db, "9780000000070", 3).await;
        let repo = db.barcodes();

        let first = repo.generate(book.id, 2).await.unwrap();
        let labels: Vec<_> = first.iter().map(|b| b.barcode.as_str()).collect();
        assert_eq!(
            labels,
            vec![
                Barcode::label(book.id, 1).as_str(),
                Barcode::label(book.id, 2).as_str()
            ]
        );

        let second = repo.generate(book.id, 1).await.unwrap();
        assert_eq!(second[0].barcode, Barcode::label(book.id, 3));

        let all = repo.list_for_book(book.id).await.unwrap();
        assert_eq!(all.len(), 3);
        assert!(all.iter().all(|b| !b.is_borrowed));

        let found = repo.find(&Barcode::label(book.id, 2)).await.unwrap().unwrap();
        assert_eq!(found.book_id, book.id);
        assert!(repo.find("LIB-999999-0001").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_generate_rejects_bad_input() {
        let db = test_db().await;
        let repo = db.barcodes();

        assert!(matches!(
            repo.generate(404, 1).await,
            Err(DbError::Rule(CoreError::BookNotFound(404)))
        ));

        let book = add_book(&db, "9780000000071", 1).await;
        assert!(matches!(
            repo.generate(book.id, 0).await,
            Err(DbError::Rule(CoreError::Validation(_)))
        ));
    }

    #[tokio::test]
    async fn test_claim_and_release() {
        let db = test_db().await;
        let book = add_book(&db, "9780000000072", 2).await;
        let other = add_book(&db, "9780000000073", 1).await;
        db.barcodes().generate(book.id, 2).await.unwrap();
        db.barcodes().generate(other.id, 1).await.unwrap();

        let mut conn = db.pool().acquire().await.unwrap();

        let taken = claim_in(&mut conn, book.id, None).await.unwrap();
        assert_eq!(taken, Some(Barcode::label(book.id, 1)));

        // Same copy twice
        let again = claim_in(&mut conn, book.id, Some(&Barcode::label(book.id, 1))).await;
        assert!(matches!(again, Err(DbError::Conflict(_))));

        // Someone else's copy
        let wrong = claim_in(&mut conn, book.id, Some(&Barcode::label(other.id, 1))).await;
        assert!(matches!(wrong, Err(DbError::Conflict(_))));

        let unknown = claim_in(&mut conn, book.id, Some("LIB-000000-0000")).await;
        assert!(matches!(unknown, Err(DbError::NotFound { .. })));

        let second = claim_in(&mut conn, book.id, None).await.unwrap();
        assert_eq!(second, Some(Barcode::label(book.id, 2)));
        assert_eq!(claim_in(&mut conn, book.id, None).await.unwrap(), None);

        release_in(&mut conn, &Barcode::label(book.id, 1)).await.unwrap();
        drop(conn);

        let listed = db.barcodes().list_for_book(book.id).await.unwrap();
        assert!(!listed[0].is_borrowed);
        assert!(listed[1].is_borrowed);
    }
}
