//! # Loan Registry
//!
//! Borrowing, returning and the read-only loan projections.
//!
//! ## Unit of Work
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       borrow(book, member)                              │
//! │                                                                         │
//! │  BEGIN                                                                 │
//! │    1. UPDATE books SET copies = copies - 1        ← takes write lock   │
//! │       WHERE id = ? AND copies > 0                   0 rows → NotFound  │
//! │                                                          / OutOfStock  │
//! │    2. SELECT member                                 none → NotFound    │
//! │    3. COUNT active loans of member                  ≥ limit → Limit-   │
//! │                                                           Exceeded     │
//! │    4. claim barcode (requested or first free)                          │
//! │    5. INSERT loan (issue = today, due = today + period)                │
//! │  COMMIT                                       any error → ROLLBACK     │
//! │                                                                         │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                       return_loan(loan)                                 │
//! │                                                                         │
//! │  BEGIN                                                                 │
//! │    1. UPDATE loans SET return_date = today        ← takes write lock   │
//! │       WHERE id = ? AND return_date IS NULL          0 rows → NotFound  │
//! │    2. fine = max(today - due, 0) × fine_per_day, stored on the loan    │
//! │    3. UPDATE books SET copies = copies + 1                             │
//! │    4. release barcode                                                  │
//! │  COMMIT                                                                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Because the first statement of each unit is a write, SQLite serializes
//! the whole unit against other writers: two borrows of the last copy, or
//! two borrows that would push a member past their limit, cannot both
//! commit.
//!
//! Rule rejections and lookups (`NotFound`, `OutOfStock`, `LimitExceeded`,
//! barcode conflicts) reach the caller unchanged. Anything else that goes
//! wrong inside a unit is reported as `CoreError::LendingFailed`.

use chrono::{Local, NaiveDate};
use library_core::{CoreError, LendingPolicy, Loan, LoanRecord, Member};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info, warn};

use super::barcode::{claim_in, release_in};
use super::inventory::{decrement_in, increment_in};
use crate::error::{DbError, DbResult};

const LOAN_COLUMNS: &str =
    "id, book_id, member_id, barcode, issue_date, due_date, return_date, fine_cents";

const RECORD_SELECT: &str = r#"
    SELECT
        l.id,
        l.book_id,
        b.title AS book_title,
        l.member_id,
        m.name AS member_name,
        l.barcode,
        l.issue_date,
        l.due_date,
        l.return_date,
        l.fine_cents
    FROM loans l
    INNER JOIN books b ON b.id = l.book_id
    INNER JOIN members m ON m.id = l.member_id
"#;

/// Today's calendar date in the server's local time zone.
fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// Keeps rejections, folds infrastructure failures into `LendingFailed`.
fn lending_error(err: DbError) -> DbError {
    if err.is_rejection() {
        err
    } else {
        warn!(error = %err, "Lending unit of work failed");
        CoreError::LendingFailed(err.to_string()).into()
    }
}

/// Registry of loans, applying a [`LendingPolicy`].
#[derive(Debug, Clone)]
pub struct LoanRegistry {
    pool: SqlitePool,
    policy: LendingPolicy,
}

impl LoanRegistry {
    pub fn new(pool: SqlitePool, policy: LendingPolicy) -> Self {
        LoanRegistry { pool, policy }
    }

    pub fn policy(&self) -> &LendingPolicy {
        &self.policy
    }

    // =========================================================================
    // Borrow
    // =========================================================================

    /// Lends one copy of `book_id` to `member_id`, due after the loan period.
    ///
    /// `barcode` picks a specific copy; without it the first free copy (if
    /// the book has barcodes) is used.
    pub async fn borrow(
        &self,
        book_id: i64,
        member_id: i64,
        barcode: Option<&str>,
    ) -> DbResult<Loan> {
        self.borrow_on(book_id, member_id, barcode, today()).await
    }

    /// [`LoanRegistry::borrow`] with an explicit issue date.
    pub async fn borrow_on(
        &self,
        book_id: i64,
        member_id: i64,
        barcode: Option<&str>,
        today: NaiveDate,
    ) -> DbResult<Loan> {
        debug!(book_id, member_id, ?barcode, %today, "Borrowing book");

        let mut tx = self.pool.begin().await.map_err(|e| lending_error(e.into()))?;

        match self.borrow_in(&mut tx, book_id, member_id, barcode, today).await {
            Ok(loan) => {
                tx.commit().await.map_err(|e| lending_error(e.into()))?;
                info!(
                    loan_id = loan.id,
                    book_id,
                    member_id,
                    due_date = %loan.due_date,
                    "Book lent"
                );
                Ok(loan)
            }
            Err(err) => {
                if let Err(rollback) = tx.rollback().await {
                    warn!(error = %rollback, "Rollback after failed borrow also failed");
                }
                debug!(book_id, member_id, error = %err, "Borrow rejected");
                Err(lending_error(err))
            }
        }
    }

    async fn borrow_in(
        &self,
        conn: &mut SqliteConnection,
        book_id: i64,
        member_id: i64,
        barcode: Option<&str>,
        today: NaiveDate,
    ) -> DbResult<Loan> {
        decrement_in(conn, book_id).await?;

        let member = sqlx::query_as::<_, Member>(
            "SELECT id, name, contact, join_date, role FROM members WHERE id = ?1",
        )
        .bind(member_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or(CoreError::MemberNotFound(member_id))?;

        let active = active_count_in(conn, member_id).await?;
        if !self.policy.can_borrow(member.role, active) {
            return Err(CoreError::LimitExceeded {
                member_id,
                limit: self.policy.limit(member.role),
            }
            .into());
        }

        let barcode = claim_in(conn, book_id, barcode).await?;
        let due_date = self.policy.due_date(today);

        let result = sqlx::query(
            r#"
            INSERT INTO loans (book_id, member_id, barcode, issue_date, due_date)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(book_id)
        .bind(member_id)
        .bind(barcode.as_deref())
        .bind(today)
        .bind(due_date)
        .execute(&mut *conn)
        .await?;

        Ok(Loan {
            id: result.last_insert_rowid(),
            book_id,
            member_id,
            barcode,
            issue_date: today,
            due_date,
            return_date: None,
            fine_cents: None,
        })
    }

    // =========================================================================
    // Return
    // =========================================================================

    /// Closes an active loan and puts the copy back on the shelf.
    ///
    /// The returned loan carries its return date and fine.
    pub async fn return_loan(&self, loan_id: i64) -> DbResult<Loan> {
        self.return_on(loan_id, today()).await
    }

    /// [`LoanRegistry::return_loan`] with an explicit return date.
    pub async fn return_on(&self, loan_id: i64, today: NaiveDate) -> DbResult<Loan> {
        debug!(loan_id, %today, "Returning loan");

        let mut tx = self.pool.begin().await.map_err(|e| lending_error(e.into()))?;

        match self.return_in(&mut tx, loan_id, today).await {
            Ok(loan) => {
                tx.commit().await.map_err(|e| lending_error(e.into()))?;
                info!(
                    loan_id,
                    book_id = loan.book_id,
                    fine_cents = loan.fine_cents.unwrap_or(0),
                    "Book returned"
                );
                Ok(loan)
            }
            Err(err) => {
                if let Err(rollback) = tx.rollback().await {
                    warn!(error = %rollback, "Rollback after failed return also failed");
                }
                debug!(loan_id, error = %err, "Return rejected");
                Err(lending_error(err))
            }
        }
    }

    async fn return_in(
        &self,
        conn: &mut SqliteConnection,
        loan_id: i64,
        today: NaiveDate,
    ) -> DbResult<Loan> {
        let closed = sqlx::query(
            "UPDATE loans SET return_date = ?2 WHERE id = ?1 AND return_date IS NULL",
        )
        .bind(loan_id)
        .bind(today)
        .execute(&mut *conn)
        .await?;

        if closed.rows_affected() == 0 {
            return Err(CoreError::LoanNotFound(loan_id).into());
        }

        let mut loan = sqlx::query_as::<_, Loan>(&format!(
            "SELECT {} FROM loans WHERE id = ?1",
            LOAN_COLUMNS
        ))
        .bind(loan_id)
        .fetch_one(&mut *conn)
        .await?;

        let fine = self.policy.fine_for(loan.due_date, today);
        sqlx::query("UPDATE loans SET fine_cents = ?2 WHERE id = ?1")
            .bind(loan_id)
            .bind(fine.cents())
            .execute(&mut *conn)
            .await?;
        loan.fine_cents = Some(fine.cents());

        increment_in(conn, loan.book_id).await?;

        if let Some(barcode) = loan.barcode.as_deref() {
            release_in(conn, barcode).await?;
        }

        Ok(loan)
    }

    // =========================================================================
    // Lookups
    // =========================================================================

    /// Gets a loan by id, active or returned.
    pub async fn get(&self, loan_id: i64) -> DbResult<Option<Loan>> {
        let loan = sqlx::query_as::<_, Loan>(&format!(
            "SELECT {} FROM loans WHERE id = ?1",
            LOAN_COLUMNS
        ))
        .bind(loan_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(loan)
    }

    /// Gets a loan joined with its book title and member name.
    pub async fn get_record(&self, loan_id: i64) -> DbResult<Option<LoanRecord>> {
        let record = sqlx::query_as::<_, LoanRecord>(&format!("{} WHERE l.id = ?1", RECORD_SELECT))
            .bind(loan_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(record)
    }

    /// Number of books a member currently holds.
    pub async fn active_count(&self, member_id: i64) -> DbResult<i64> {
        let mut conn = self.pool.acquire().await?;
        active_count_in(&mut conn, member_id).await
    }

    // =========================================================================
    // Projections
    // =========================================================================

    /// Every loan, newest first.
    pub async fn list_all(&self) -> DbResult<Vec<LoanRecord>> {
        self.records("ORDER BY l.issue_date DESC, l.id DESC", None)
            .await
    }

    /// Loans not yet returned, soonest due first.
    pub async fn list_active(&self) -> DbResult<Vec<LoanRecord>> {
        self.records(
            "WHERE l.return_date IS NULL ORDER BY l.due_date, l.id",
            None,
        )
        .await
    }

    /// Returned loans, most recently returned first.
    pub async fn list_returned(&self) -> DbResult<Vec<LoanRecord>> {
        self.records(
            "WHERE l.return_date IS NOT NULL ORDER BY l.return_date DESC, l.id DESC",
            None,
        )
        .await
    }

    /// Active loans past their due date as of today.
    pub async fn list_overdue(&self) -> DbResult<Vec<LoanRecord>> {
        self.list_overdue_on(today()).await
    }

    /// Active loans whose due date is strictly before `today`.
    pub async fn list_overdue_on(&self, today: NaiveDate) -> DbResult<Vec<LoanRecord>> {
        let records = sqlx::query_as::<_, LoanRecord>(&format!(
            "{} WHERE l.return_date IS NULL AND l.due_date < ?1 ORDER BY l.due_date, l.id",
            RECORD_SELECT
        ))
        .bind(today)
        .fetch_all(&self.pool)
        .await?;

        debug!(count = records.len(), %today, "Listed overdue loans");
        Ok(records)
    }

    /// A member's borrowing history, newest first.
    pub async fn borrowing_history(&self, member_id: i64) -> DbResult<Vec<LoanRecord>> {
        self.records(
            "WHERE l.member_id = ?1 ORDER BY l.issue_date DESC, l.id DESC",
            Some(member_id),
        )
        .await
    }

    /// A book's lending history, newest first.
    pub async fn borrowing_history_for_book(&self, book_id: i64) -> DbResult<Vec<LoanRecord>> {
        self.records(
            "WHERE l.book_id = ?1 ORDER BY l.issue_date DESC, l.id DESC",
            Some(book_id),
        )
        .await
    }

    async fn records(&self, tail: &str, param: Option<i64>) -> DbResult<Vec<LoanRecord>> {
        let sql = format!("{} {}", RECORD_SELECT, tail);
        let mut query = sqlx::query_as::<_, LoanRecord>(&sql);
        if let Some(param) = param {
            query = query.bind(param);
        }

        let records = query.fetch_all(&self.pool).await?;
        debug!(count = records.len(), "Listed loans");
        Ok(records)
    }
}

async fn active_count_in(conn: &mut SqliteConnection, member_id: i64) -> DbResult<i64> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM loans WHERE member_id = ?1 AND return_date IS NULL",
    )
    .bind(member_id)
    .fetch_one(&mut *conn)
    .await?;

    Ok(count)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::testing::{add_book, add_member, copies, test_db};
    use crate::{Database, DbConfig};
    use chrono::Duration;
    use library_core::{Barcode, LoanStatus, MemberRole, Money};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    async fn loan_rows(db: &Database) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM loans")
            .fetch_one(db.pool())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_borrow_sets_dates_and_decrements() {
        let db = test_db().await;
        let book = add_book(&db, "9780000000100", 2).await;
        let member = add_member(&db, "Ada", MemberRole::Student).await;
        let issued = date(2024, 3, 1);

        let loan = db
            .loans()
            .borrow_on(book.id, member.id, None, issued)
            .await
            .unwrap();

        assert_eq!(loan.issue_date, issued);
        assert_eq!(loan.due_date, date(2024, 3, 15));
        assert!(loan.is_active());
        assert_eq!(copies(&db, book.id).await, 1);
        assert_eq!(db.loans().get(loan.id).await.unwrap().unwrap(), loan);
        assert_eq!(db.loans().active_count(member.id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_last_copy_scenario() {
        let db = test_db().await;
        let book = add_book(&db, "9780000000101", 1).await;
        let a = add_member(&db, "A", MemberRole::Student).await;
        let b = add_member(&db, "B", MemberRole::Student).await;

        let loan = db.loans().borrow(book.id, a.id, None).await.unwrap();
        assert_eq!(copies(&db, book.id).await, 0);

        let err = db.loans().borrow(book.id, b.id, None).await.unwrap_err();
        assert!(matches!(err, DbError::Rule(CoreError::OutOfStock { .. })));
        assert_eq!(loan_rows(&db).await, 1);
        assert_eq!(copies(&db, book.id).await, 0);

        db.loans().return_loan(loan.id).await.unwrap();
        assert_eq!(copies(&db, book.id).await, 1);
    }

    #[tokio::test]
    async fn test_borrow_missing_book_or_member() {
        let db = test_db().await;
        let book = add_book(&db, "9780000000102", 1).await;
        let member = add_member(&db, "Ada", MemberRole::Student).await;

        assert!(matches!(
            db.loans().borrow(999, member.id, None).await,
            Err(DbError::Rule(CoreError::BookNotFound(999)))
        ));

        assert!(matches!(
            db.loans().borrow(book.id, 999, None).await,
            Err(DbError::Rule(CoreError::MemberNotFound(999)))
        ));
        // Decrement rolled back
        assert_eq!(copies(&db, book.id).await, 1);
        assert_eq!(loan_rows(&db).await, 0);
    }

    #[tokio::test]
    async fn test_student_limit_until_return() {
        let db = test_db().await;
        let book = add_book(&db, "9780000000103", 20).await;
        let student = add_member(&db, "Sam", MemberRole::Student).await;
        let registry = db.loans();

        let mut loans = Vec::new();
        for _ in 0..5 {
            loans.push(registry.borrow(book.id, student.id, None).await.unwrap());
        }

        let err = registry.borrow(book.id, student.id, None).await.unwrap_err();
        assert!(matches!(
            err,
            DbError::Rule(CoreError::LimitExceeded { limit: 5, .. })
        ));
        // The rejected borrow left the shelf alone
        assert_eq!(copies(&db, book.id).await, 15);
        assert_eq!(loan_rows(&db).await, 5);

        registry.return_loan(loans[0].id).await.unwrap();
        registry.borrow(book.id, student.id, None).await.unwrap();
    }

    #[tokio::test]
    async fn test_class_monitor_limit() {
        let db = test_db().await;
        let book = add_book(&db, "9780000000104", 20).await;
        let monitor = add_member(&db, "Mo", MemberRole::ClassMonitor).await;

        for _ in 0..10 {
            db.loans().borrow(book.id, monitor.id, None).await.unwrap();
        }
        assert!(matches!(
            db.loans().borrow(book.id, monitor.id, None).await,
            Err(DbError::Rule(CoreError::LimitExceeded { limit: 10, .. }))
        ));
    }

    #[tokio::test]
    async fn test_return_twice_fails() {
        let db = test_db().await;
        let book = add_book(&db, "9780000000105", 1).await;
        let member = add_member(&db, "Ada", MemberRole::Student).await;
        let loan = db.loans().borrow(book.id, member.id, None).await.unwrap();

        db.loans().return_loan(loan.id).await.unwrap();
        let err = db.loans().return_loan(loan.id).await.unwrap_err();
        assert!(matches!(err, DbError::Rule(CoreError::LoanNotFound(id)) if id == loan.id));

        // The second attempt changed nothing
        assert_eq!(copies(&db, book.id).await, 1);

        assert!(matches!(
            db.loans().return_loan(12345).await,
            Err(DbError::Rule(CoreError::LoanNotFound(12345)))
        ));
    }

    #[tokio::test]
    async fn test_return_date_is_immutable() {
        let db = test_db().await;
        let book = add_book(&db, "9780000000106", 1).await;
        let member = add_member(&db, "Ada", MemberRole::Student).await;
        let loan = db
            .loans()
            .borrow_on(book.id, member.id, None, date(2024, 3, 1))
            .await
            .unwrap();

        db.loans().return_on(loan.id, date(2024, 3, 10)).await.unwrap();
        let _ = db.loans().return_on(loan.id, date(2024, 4, 30)).await;

        let stored = db.loans().get(loan.id).await.unwrap().unwrap();
        assert_eq!(stored.return_date, Some(date(2024, 3, 10)));
        assert_eq!(stored.fine_cents, Some(0));
    }

    #[tokio::test]
    async fn test_fines() {
        let db = test_db().await;
        let book = add_book(&db, "9780000000107", 3).await;
        let member = add_member(&db, "Ada", MemberRole::Student).await;
        let registry = db.loans();
        let issued = date(2024, 3, 1);

        let on_time = registry.borrow_on(book.id, member.id, None, issued).await.unwrap();
        let returned = registry.return_on(on_time.id, on_time.due_date).await.unwrap();
        assert_eq!(returned.fine(), Some(Money::zero()));

        let late = registry.borrow_on(book.id, member.id, None, issued).await.unwrap();
        let returned = registry
            .return_on(late.id, late.due_date + Duration::days(6))
            .await
            .unwrap();
        assert_eq!(returned.fine(), Some(registry.policy().fine_per_day.times(6)));
        assert_eq!(returned.return_date, Some(late.due_date + Duration::days(6)));
    }

    #[tokio::test]
    async fn test_fine_uses_configured_rate() {
        let db = Database::new(DbConfig::in_memory())
            .await
            .unwrap()
            .with_policy(LendingPolicy {
                fine_per_day: Money::from_cents(25),
                loan_period_days: 7,
                ..LendingPolicy::default()
            });
        let book = add_book(&db, "9780000000108", 1).await;
        let member = add_member(&db, "Ada", MemberRole::Student).await;

        let loan = db
            .loans()
            .borrow_on(book.id, member.id, None, date(2024, 1, 1))
            .await
            .unwrap();
        assert_eq!(loan.due_date, date(2024, 1, 8));

        let returned = db.loans().return_on(loan.id, date(2024, 1, 12)).await.unwrap();
        assert_eq!(returned.fine_cents, Some(100));
    }

    #[tokio::test]
    async fn test_barcodes_follow_loans() {
        let db = test_db().await;
        let book = add_book(&db, "9780000000109", 2).await;
        let member = add_member(&db, "Ada", MemberRole::Student).await;
        db.barcodes().generate(book.id, 2).await.unwrap();
        let second = Barcode::label(book.id, 2);

        let chosen = db
            .loans()
            .borrow(book.id, member.id, Some(&second))
            .await
            .unwrap();
        assert_eq!(chosen.barcode.as_deref(), Some(second.as_str()));

        let automatic = db.loans().borrow(book.id, member.id, None).await.unwrap();
        assert_eq!(automatic.barcode, Some(Barcode::label(book.id, 1)));
        assert!(db
            .barcodes()
            .list_for_book(book.id)
            .await
            .unwrap()
            .iter()
            .all(|b| b.is_borrowed));

        db.loans().return_loan(chosen.id).await.unwrap();
        let freed = db.barcodes().find(&second).await.unwrap().unwrap();
        assert!(!freed.is_borrowed);
    }

    #[tokio::test]
    async fn test_failed_borrow_leaves_barcodes_untouched() {
        let db = test_db().await;
        let book = add_book(&db, "9780000000110", 2).await;
        let member = add_member(&db, "Ada", MemberRole::Student).await;
        db.barcodes().generate(book.id, 2).await.unwrap();
        let first = Barcode::label(book.id, 1);

        db.loans().borrow(book.id, member.id, Some(&first)).await.unwrap();

        // Asking for a copy that is already out
        let err = db
            .loans()
            .borrow(book.id, member.id, Some(&first))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Conflict(_)));
        assert_eq!(copies(&db, book.id).await, 1);
        let second = db
            .barcodes()
            .find(&Barcode::label(book.id, 2))
            .await
            .unwrap()
            .unwrap();
        assert!(!second.is_borrowed);
    }

    #[tokio::test]
    async fn test_books_without_barcodes_lend_without_one() {
        let db = test_db().await;
        let book = add_book(&db, "9780000000111", 1).await;
        let member = add_member(&db, "Ada", MemberRole::Student).await;

        let loan = db.loans().borrow(book.id, member.id, None).await.unwrap();
        assert!(loan.barcode.is_none());
        db.loans().return_loan(loan.id).await.unwrap();
    }

    #[tokio::test]
    async fn test_projections() {
        let db = test_db().await;
        let book = add_book(&db, "9780000000112", 5).await;
        let ada = add_member(&db, "Ada", MemberRole::Student).await;
        let bob = add_member(&db, "Bob", MemberRole::Student).await;
        let registry = db.loans();
        let today = date(2024, 6, 20);

        // Due 2024-06-15: overdue
        let late = registry
            .borrow_on(book.id, ada.id, None, date(2024, 6, 1))
            .await
            .unwrap();
        // Due today: not overdue yet
        let due_today = registry
            .borrow_on(book.id, bob.id, None, date(2024, 6, 6))
            .await
            .unwrap();
        // Overdue but returned
        let returned = registry
            .borrow_on(book.id, bob.id, None, date(2024, 5, 1))
            .await
            .unwrap();
        registry.return_on(returned.id, date(2024, 6, 1)).await.unwrap();

        let all = registry.list_all().await.unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].id, due_today.id);

        let active: Vec<i64> = registry
            .list_active()
            .await
            .unwrap()
            .iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(active, vec![late.id, due_today.id]);

        let done = registry.list_returned().await.unwrap();
        assert_eq!(done.len(), 1);
        assert_eq!(done[0].status(today), LoanStatus::Returned);

        let overdue = registry.list_overdue_on(today).await.unwrap();
        assert_eq!(overdue.len(), 1);
        assert_eq!(overdue[0].id, late.id);
        assert_eq!(overdue[0].member_name, "Ada");
        assert_eq!(overdue[0].book_title, book.title);
        assert_eq!(overdue[0].days_overdue(today), 5);

        let bob_history = registry.borrowing_history(bob.id).await.unwrap();
        assert_eq!(bob_history.len(), 2);
        assert!(bob_history.iter().all(|r| r.member_id == bob.id));

        assert_eq!(registry.borrowing_history_for_book(book.id).await.unwrap().len(), 3);

        let record = registry.get_record(late.id).await.unwrap().unwrap();
        assert_eq!(record.status(today), LoanStatus::Overdue);
        assert!(registry.get_record(999).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_copies_never_negative_over_a_sequence() {
        let db = test_db().await;
        let book = add_book(&db, "9780000000113", 2).await;
        let monitor = add_member(&db, "Mo", MemberRole::ClassMonitor).await;
        let registry = db.loans();

        let mut open = Vec::new();
        for step in 0..12 {
            if step % 3 == 2 {
                if let Some(id) = open.pop() {
                    registry.return_loan(id).await.unwrap();
                }
            } else {
                match registry.borrow(book.id, monitor.id, None).await {
                    Ok(loan) => open.push(loan.id),
                    Err(DbError::Rule(CoreError::OutOfStock { .. })) => {}
                    Err(other) => panic!("unexpected error: {other:?}"),
                }
            }
            let shelf = copies(&db, book.id).await;
            assert!(shelf >= 0);
            assert_eq!(shelf + open.len() as i64, 2);
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_parallel_borrows_of_last_copy() {
        let dir = tempfile::TempDir::new().unwrap();
        let db = Database::new(DbConfig::new(dir.path().join("library.db")).max_connections(8))
            .await
            .unwrap();

        for round in 0..5 {
            let book = add_book(&db, &format!("97800000002{:02}", round), 1).await;
            let mut members = Vec::new();
            for i in 0..8 {
                members.push(add_member(&db, &format!("Reader {}-{}", round, i), MemberRole::Student).await);
            }

            let book_id = book.id;
            let handles: Vec<_> = members
                .into_iter()
                .map(|member| {
                    let db = db.clone();
                    tokio::spawn(async move { db.loans().borrow(book_id, member.id, None).await })
                })
                .collect();

            let mut lent = 0;
            for handle in handles {
                match handle.await.unwrap() {
                    Ok(_) => lent += 1,
                    Err(DbError::Rule(CoreError::OutOfStock { .. })) => {}
                    Err(other) => panic!("unexpected borrow error: {other}"),
                }
            }

            assert_eq!(lent, 1);
            assert_eq!(copies(&db, book.id).await, 0);
            assert_eq!(db.loans().borrowing_history_for_book(book.id).await.unwrap().len(), 1);
        }

        db.close().await;
    }

    #[tokio::test]
    async fn test_storage_failure_rolls_back_borrow() {
        let db = test_db().await;
        let book = add_book(&db, "9780000000120", 2).await;
        let member = add_member(&db, "Ada", MemberRole::Student).await;
        db.barcodes().generate(book.id, 2).await.unwrap();

        sqlx::query(
            "CREATE TRIGGER fail_loan_insert BEFORE INSERT ON loans \
             BEGIN SELECT RAISE(ABORT, 'disk gone'); END",
        )
        .execute(db.pool())
        .await
        .unwrap();

        let err = db.loans().borrow(book.id, member.id, None).await.unwrap_err();
        assert!(matches!(err, DbError::Rule(CoreError::LendingFailed(_))));

        // Decrement and barcode claim were undone with the unit
        assert_eq!(copies(&db, book.id).await, 2);
        assert_eq!(loan_rows(&db).await, 0);
        assert!(db
            .barcodes()
            .list_for_book(book.id)
            .await
            .unwrap()
            .iter()
            .all(|b| !b.is_borrowed));
    }

    #[tokio::test]
    async fn test_storage_failure_rolls_back_return() {
        let db = test_db().await;
        let book = add_book(&db, "9780000000121", 1).await;
        let member = add_member(&db, "Ada", MemberRole::Student).await;
        db.barcodes().generate(book.id, 1).await.unwrap();
        let loan = db.loans().borrow(book.id, member.id, None).await.unwrap();

        sqlx::query(
            "CREATE TRIGGER fail_stock_update BEFORE UPDATE ON books \
             BEGIN SELECT RAISE(ABORT, 'disk gone'); END",
        )
        .execute(db.pool())
        .await
        .unwrap();

        let err = db.loans().return_loan(loan.id).await.unwrap_err();
        assert!(matches!(err, DbError::Rule(CoreError::LendingFailed(_))));

        let still_out = db.loans().get(loan.id).await.unwrap().unwrap();
        assert!(still_out.is_active());
        assert!(still_out.return_date.is_none());
        assert_eq!(copies(&db, book.id).await, 0);
        assert!(db
            .barcodes()
            .list_for_book(book.id)
            .await
            .unwrap()
            .iter()
            .all(|b| b.is_borrowed));
    }

    #[test]
    fn test_lending_error_folding() {
        let kept = lending_error(CoreError::OutOfStock { book_id: 1 }.into());
        assert!(matches!(kept, DbError::Rule(CoreError::OutOfStock { .. })));

        let folded = lending_error(DbError::QueryFailed("disk I/O error".to_string()));
        assert!(matches!(
            folded,
            DbError::Rule(CoreError::LendingFailed(_))
        ));
    }
}
