//! # Lending Policy
//!
//! The rules that decide who may borrow, for how long, and what a late
//! return costs.
//!
//! ## Loan Timeline
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   issue_date              due_date                  return_date         │
//! │       │◄──── loan_period_days ────►│◄──── days late ────►│              │
//! │       ●────────────────────────────●─────────────────────●              │
//! │                                                                         │
//! │   fine = max(return_date - due_date, 0) × fine_per_day                 │
//! │                                                                         │
//! │   Returned on or before due_date  →  fine = $0.00                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The policy never reads the clock. Callers pass "today" in.

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::money::Money;
use crate::types::MemberRole;
use crate::{
    CLASS_MONITOR_BORROW_LIMIT, DEFAULT_FINE_PER_DAY_CENTS, DEFAULT_LOAN_PERIOD_DAYS,
    STUDENT_BORROW_LIMIT,
};

// =============================================================================
// Lending Policy
// =============================================================================

/// Lending limits, loan period and fine rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LendingPolicy {
    /// Days between issue and due date.
    pub loan_period_days: u32,
    /// Fine charged for each whole day past the due date.
    pub fine_per_day: Money,
    /// Maximum simultaneous active loans for a student.
    pub student_limit: u32,
    /// Maximum simultaneous active loans for a class monitor.
    pub class_monitor_limit: u32,
}

impl Default for LendingPolicy {
    fn default() -> Self {
        Self {
            loan_period_days: DEFAULT_LOAN_PERIOD_DAYS,
            fine_per_day: Money::from_cents(DEFAULT_FINE_PER_DAY_CENTS),
            student_limit: STUDENT_BORROW_LIMIT,
            class_monitor_limit: CLASS_MONITOR_BORROW_LIMIT,
        }
    }
}

impl LendingPolicy {
    /// Maximum number of simultaneous active loans for `role`.
    pub fn limit(&self, role: MemberRole) -> u32 {
        match role {
            MemberRole::Student => self.student_limit,
            MemberRole::ClassMonitor => self.class_monitor_limit,
        }
    }

    /// Whether a member with `active_count` open loans may take one more.
    ///
    /// ## Example
    /// ```rust
    /// use library_core::{LendingPolicy, MemberRole};
    ///
    /// let policy = LendingPolicy::default();
    /// assert!(policy.can_borrow(MemberRole::Student, 4));
    /// assert!(!policy.can_borrow(MemberRole::Student, 5));
    /// assert!(policy.can_borrow(MemberRole::ClassMonitor, 5));
    /// ```
    pub fn can_borrow(&self, role: MemberRole, active_count: i64) -> bool {
        active_count < i64::from(self.limit(role))
    }

    /// Due date for a loan issued on `issue_date`.
    pub fn due_date(&self, issue_date: NaiveDate) -> NaiveDate {
        issue_date + Duration::days(i64::from(self.loan_period_days))
    }

    /// Whole days between `due_date` and `returned`, never negative.
    pub fn days_late(&self, due_date: NaiveDate, returned: NaiveDate) -> i64 {
        (returned - due_date).num_days().max(0)
    }

    /// Fine owed for a loan returned on `returned`.
    pub fn fine_for(&self, due_date: NaiveDate, returned: NaiveDate) -> Money {
        self.fine_per_day.times(self.days_late(due_date, returned))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
