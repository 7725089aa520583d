//! Member endpoints: `/api/members/*`.

use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::NaiveDate;
use library_core::validation::validate_new_member;
use library_core::{Member, MemberRole, NewMember, ValidationError};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{loan_views, LoanView, MessageResponse};
use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// Body of member create and update.
///
/// `role` is free text ("student", "class monitor", "monitor"); it
/// defaults to student.
#[derive(Debug, Clone, Deserialize)]
pub struct MemberRequest {
    pub name: String,
    #[serde(default)]
    pub contact: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub join_date: Option<NaiveDate>,
}

impl MemberRequest {
    fn into_new_member(self) -> Result<NewMember, ValidationError> {
        let role = match self.role.as_deref().map(str::trim) {
            Some(raw) if !raw.is_empty() => raw.parse::<MemberRole>()?,
            _ => MemberRole::default(),
        };

        let member = NewMember {
            name: self.name,
            contact: self.contact,
            role,
            join_date: self.join_date,
        };
        validate_new_member(&member)?;
        Ok(member)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MemberCreated {
    pub message: String,
    pub member: Member,
}

pub async fn list_members(State(state): State<AppState>) -> ApiResult<Json<Vec<Member>>> {
    Ok(Json(state.db.members().list().await?))
}

pub async fn get_member(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
) -> ApiResult<Json<Member>> {
    let Path(id) = path?;
    let member = state
        .db
        .members()
        .get(id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("Member not found: {}", id)))?;

    Ok(Json(member))
}

pub async fn create_member(
    State(state): State<AppState>,
    payload: Result<Json<MemberRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<MemberCreated>)> {
    let Json(req) = payload?;
    let new_member = req.into_new_member()?;

    let member = state.db.members().insert(&new_member).await?;
    info!(member_id = member.id, role = %member.role, "Member created via API");

    Ok((
        StatusCode::CREATED,
        Json(MemberCreated {
            message: format!("Member '{}' added", member.name),
            member,
        }),
    ))
}

pub async fn update_member(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
    payload: Result<Json<MemberRequest>, JsonRejection>,
) -> ApiResult<Json<Member>> {
    let Path(id) = path?;
    let Json(req) = payload?;
    let member = req.into_new_member()?;

    Ok(Json(state.db.members().update(id, &member).await?))
}

pub async fn delete_member(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
) -> ApiResult<Json<MessageResponse>> {
    let Path(id) = path?;
    state.db.members().delete(id).await?;
    Ok(Json(MessageResponse::new(format!("Member {} deleted", id))))
}

pub async fn member_history(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
) -> ApiResult<Json<Vec<LoanView>>> {
    let Path(id) = path?;
    if state.db.members().get(id).await?.is_none() {
        return Err(ApiError::not_found(format!("Member not found: {}", id)));
    }

    let records = state.db.loans().borrowing_history(id).await?;
    Ok(Json(loan_views(records)))
}
