use std::sync::Arc;

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::delivery::http::v1::middleware::AuthenticatedUser;
use crate::domain::notice::{
    Notice, NoticeCategory, NoticeChanges, NoticeDraft, NoticeFilter, NoticeId, NoticePriority,
    TargetAudience,
};
use crate::domain::user::UserId;
use crate::usecase::error::UsecaseError;
use crate::usecase::notices::Pagination;
use crate::AppState;

#[derive(Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self { success: true, data }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NoticeListResponse {
    pub success: bool,
    pub count: usize,
    pub total: i64,
    pub total_pages: i64,
    pub page: i64,
    pub data: Vec<NoticeResponse>,
}

#[derive(Serialize)]
pub struct TeacherSummary {
    pub id: UserId,
    pub name: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NoticeResponse {
    pub id: NoticeId,
    pub title: String,
    pub content: String,
    pub category: NoticeCategory,
    pub branch: Option<String>,
    pub year: Option<String>,
    pub target_audience: TargetAudience,
    pub teacher: TeacherSummary,
    pub scheduled_for: Option<DateTime<Utc>>,
    pub priority: NoticePriority,
    pub attachment: Option<String>,
    pub is_published: bool,
    pub views: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn notice_to_response(n: Notice) -> NoticeResponse {
    NoticeResponse {
        id: n.id,
        title: n.title,
        content: n.content,
        category: n.category,
        branch: n.branch,
        year: n.year,
        target_audience: n.target_audience,
        teacher: TeacherSummary {
            id: n.teacher_id,
            name: n.teacher_name,
        },
        scheduled_for: n.scheduled_for,
        priority: n.priority,
        attachment: n.attachment,
        is_published: n.is_published,
        views: n.views,
        created_at: n.created_at,
        updated_at: n.updated_at,
    }
}

#[derive(Debug, Deserialize)]
pub struct NoticeListParams {
    pub category: Option<NoticeCategory>,
    pub branch: Option<String>,
    pub year: Option<String>,
    pub teacher: Option<UserId>,
    pub search: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

impl NoticeListParams {
    fn into_query(self) -> (NoticeFilter, Pagination) {
        let non_blank = |s: Option<String>| {
            s.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
        };

        let filter = NoticeFilter {
            category: self.category,
            branch: non_blank(self.branch),
            year: non_blank(self.year),
            teacher_id: self.teacher,
            search: non_blank(self.search),
        };
        (filter, Pagination::new(self.page, self.limit))
    }
}

/// Raw selectors; shape is checked by hand so a bad value yields a precise message.
#[derive(Debug, Default, Deserialize)]
pub struct TargetAudienceRequest {
    pub branches: Option<Value>,
    pub years: Option<Value>,
}

impl TargetAudienceRequest {
    fn into_audience(self) -> Result<TargetAudience, UsecaseError> {
        Ok(TargetAudience {
            branches: string_selectors("targetAudience.branches", self.branches)?,
            years: string_selectors("targetAudience.years", self.years)?,
        })
    }
}

fn string_selectors(field: &str, value: Option<Value>) -> Result<Vec<String>, UsecaseError> {
    let invalid = || UsecaseError::Validation(format!("{} must be an array of strings", field));

    match value {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => items
            .into_iter()
            .map(|item| match item {
                Value::String(s) => Ok(s),
                _ => Err(invalid()),
            })
            .collect(),
        Some(_) => Err(invalid()),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateNoticeRequest {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub category: NoticeCategory,
    pub branch: Option<String>,
    pub year: Option<String>,
    pub target_audience: Option<TargetAudienceRequest>,
    pub scheduled_for: Option<DateTime<Utc>>,
    #[serde(default)]
    pub priority: NoticePriority,
    pub attachment: Option<String>,
}

impl TryFrom<CreateNoticeRequest> for NoticeDraft {
    type Error = UsecaseError;

    fn try_from(r: CreateNoticeRequest) -> Result<Self, Self::Error> {
        Ok(NoticeDraft {
            title: r.title,
            content: r.content,
            category: r.category,
            branch: r.branch,
            year: r.year,
            target_audience: r.target_audience.map(|t| t.into_audience()).transpose()?,
            scheduled_for: r.scheduled_for,
            priority: r.priority,
            attachment: r.attachment,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateNoticeRequest {
    pub title: Option<String>,
    pub content: Option<String>,
    pub category: Option<NoticeCategory>,
    pub branch: Option<String>,
    pub year: Option<String>,
    pub target_audience: Option<TargetAudienceRequest>,
    pub scheduled_for: Option<DateTime<Utc>>,
    pub priority: Option<NoticePriority>,
    pub attachment: Option<String>,
    pub is_published: Option<bool>,
}

impl TryFrom<UpdateNoticeRequest> for NoticeChanges {
    type Error = UsecaseError;

    fn try_from(r: UpdateNoticeRequest) -> Result<Self, Self::Error> {
        Ok(NoticeChanges {
            title: r.title,
            content: r.content,
            category: r.category,
            branch: r.branch,
            year: r.year,
            target_audience: r.target_audience.map(|t| t.into_audience()).transpose()?,
            scheduled_for: r.scheduled_for,
            priority: r.priority,
            attachment: r.attachment,
            is_published: r.is_published,
        })
    }
}

fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, UsecaseError> {
    payload.map(|Json(body)| body).map_err(|rejection| {
        tracing::warn!(error = %rejection, "rejected request body");
        UsecaseError::Validation(rejection.body_text())
    })
}

fn notice_id(path: Result<Path<NoticeId>, PathRejection>) -> Result<NoticeId, UsecaseError> {
    path.map(|Path(id)| id).map_err(|rejection| {
        tracing::debug!(error = %rejection, "malformed notice id");
        UsecaseError::NotFound("Notice".to_string())
    })
}

#[tracing::instrument(skip(state, params))]
pub async fn list_notices(
    State(state): State<Arc<AppState>>,
    params: Result<Query<NoticeListParams>, QueryRejection>,
) -> Result<impl IntoResponse, UsecaseError> {
    let Query(params) = params.map_err(|rejection| UsecaseError::Validation(rejection.body_text()))?;
    tracing::debug!(?params, "handling list notices request");

    let (filter, pagination) = params.into_query();
    let page = state.notices_usecase.list_notices(filter, pagination).await?;

    let data: Vec<NoticeResponse> = page.notices.into_iter().map(notice_to_response).collect();

    tracing::debug!(count = data.len(), total = page.total, "notices listed successfully");
    Ok((
        StatusCode::OK,
        Json(NoticeListResponse {
            success: true,
            count: data.len(),
            total: page.total,
            total_pages: page.total_pages,
            page: page.page,
            data,
        }),
    ))
}

#[tracing::instrument(skip(state, path))]
pub async fn get_notice(
    State(state): State<Arc<AppState>>,
    path: Result<Path<NoticeId>, PathRejection>,
) -> Result<impl IntoResponse, UsecaseError> {
    let id = notice_id(path)?;
    tracing::debug!(notice_id = %id, "handling get notice request");

    let notice = state.notices_usecase.get_notice(id).await?;

    Ok((StatusCode::OK, Json(ApiResponse::ok(notice_to_response(notice)))))
}

#[tracing::instrument(skip(state, payload), fields(user_id = %user.user_id))]
pub async fn create_notice(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    payload: Result<Json<CreateNoticeRequest>, JsonRejection>,
) -> Result<impl IntoResponse, UsecaseError> {
    tracing::debug!("handling create notice request");

    let draft = NoticeDraft::try_from(json_body(payload)?)?;
    let notice = state.notices_usecase.create_notice(&user.actor(), draft).await?;

    tracing::debug!(notice_id = %notice.id, "notice created successfully");
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(notice_to_response(notice)))))
}

#[tracing::instrument(skip(state, path, payload), fields(user_id = %user.user_id))]
pub async fn update_notice(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    path: Result<Path<NoticeId>, PathRejection>,
    payload: Result<Json<UpdateNoticeRequest>, JsonRejection>,
) -> Result<impl IntoResponse, UsecaseError> {
    let id = notice_id(path)?;
    tracing::debug!(notice_id = %id, "handling update notice request");

    let changes = json_body(payload).and_then(NoticeChanges::try_from);
    let notice = state
        .notices_usecase
        .update_notice(&user.actor(), id, changes)
        .await?;

    tracing::debug!(notice_id = %id, "notice updated successfully");
    Ok((StatusCode::OK, Json(ApiResponse::ok(notice_to_response(notice)))))
}

#[tracing::instrument(skip(state, path), fields(user_id = %user.user_id))]
pub async fn delete_notice(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    path: Result<Path<NoticeId>, PathRejection>,
) -> Result<impl IntoResponse, UsecaseError> {
    let id = notice_id(path)?;
    tracing::debug!(notice_id = %id, "handling delete notice request");

    state.notices_usecase.delete_notice(&user.actor(), id).await?;

    tracing::debug!(notice_id = %id, "notice deleted successfully");
    Ok((StatusCode::OK, Json(ApiResponse::ok(serde_json::json!({})))))
}

#[tracing::instrument(skip(state), fields(user_id = %user.user_id))]
pub async fn notice_stats(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
) -> Result<impl IntoResponse, UsecaseError> {
    tracing::debug!("handling notice stats request");

    let stats = state.stats_usecase.notice_stats(user.user_id).await?;

    Ok((StatusCode::OK, Json(ApiResponse::ok(stats))))
}
