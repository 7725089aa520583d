//! # Member Repository
//!
//! Database operations for library members (students and class monitors).

use chrono::{Local, NaiveDate};
use library_core::{Member, NewMember};
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::error::{DbError, DbResult};

const MEMBER_COLUMNS: &str = "id, name, contact, join_date, role";

/// Repository for member database operations.
#[derive(Debug, Clone)]
pub struct MemberRepository {
    pool: SqlitePool,
}

impl MemberRepository {
    pub fn new(pool: SqlitePool) -> Self {
        MemberRepository { pool }
    }

    /// Adds a member. A missing join date means "joined today".
    pub async fn insert(&self, member: &NewMember) -> DbResult<Member> {
        self.insert_on(member, Local::now().date_naive()).await
    }

    /// Adds a member, using `today` when no join date is given.
    pub async fn insert_on(&self, member: &NewMember, today: NaiveDate) -> DbResult<Member> {
        let join_date = member.join_date.unwrap_or(today);
        debug!(name = %member.name, role = %member.role, "Inserting member");

        let result = sqlx::query(
            r#"
            INSERT INTO members (name, contact, join_date, role)
            VALUES (?1, ?2, ?3, ?4)
            "#,
        )
        .bind(member.name.trim())
        .bind(member.contact.as_deref().map(str::trim))
        .bind(join_date)
        .bind(member.role)
        .execute(&self.pool)
        .await?;

        let id = result.last_insert_rowid();
        info!(member_id = id, role = %member.role, "Member added");

        Ok(Member {
            id,
            name: member.name.trim().to_string(),
            contact: member.contact.as_deref().map(|c| c.trim().to_string()),
            join_date,
            role: member.role,
        })
    }

    /// Gets a member by id.
    pub async fn get(&self, id: i64) -> DbResult<Option<Member>> {
        let member = sqlx::query_as::<_, Member>(&format!(
            "SELECT {} FROM members WHERE id = ?1",
            MEMBER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(member)
    }

    /// Lists all members ordered by name.
    pub async fn list(&self) -> DbResult<Vec<Member>> {
        let members = sqlx::query_as::<_, Member>(&format!(
            "SELECT {} FROM members ORDER BY name COLLATE NOCASE, id",
            MEMBER_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(members)
    }

    /// Updates a member's details. The join date is kept when none is given.
    pub async fn update(&self, id: i64, member: &NewMember) -> DbResult<Member> {
        debug!(member_id = id, "Updating member");

        let result = sqlx::query(
            r#"
            UPDATE members SET
                name = ?2,
                contact = ?3,
                role = ?4,
                join_date = COALESCE(?5, join_date)
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(member.name.trim())
        .bind(member.contact.as_deref().map(str::trim))
        .bind(member.role)
        .bind(member.join_date)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Member", id));
        }

        info!(member_id = id, "Member updated");
        self.get(id)
            .await?
            .ok_or_else(|| DbError::not_found("Member", id))
    }

    /// Deletes a member together with their loan history.
    ///
    /// Refused with `DbError::Conflict` while the member still holds books.
    pub async fn delete(&self, id: i64) -> DbResult<()> {
        debug!(member_id = id, "Deleting member");

        let mut tx = self.pool.begin().await?;

        // Existence check that also takes the write lock
        let touched = sqlx::query("UPDATE members SET name = name WHERE id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        if touched.rows_affected() == 0 {
            return Err(DbError::not_found("Member", id));
        }

        let active: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM loans WHERE member_id = ?1 AND return_date IS NULL",
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        if active > 0 {
            return Err(DbError::Conflict(format!(
                "member {} still holds {} book(s)",
                id, active
            )));
        }

        sqlx::query("DELETE FROM loans WHERE member_id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM members WHERE id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        info!(member_id = id, "Member deleted");
        Ok(())
    }

    /// Counts members (for diagnostics).
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM members")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
