use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use tracing::error;

use super::app::RosterApp;
use super::applications::{application_routes, LifecycleError};
use super::directory::StaffMember;
use super::domain::{GroupId, JobDraft, JobId, LocationId, NotificationId, QuestionId, UserId, YearMonth};
use super::error::{ShiftServiceError, ValidationError};
use super::notifications::Response as InboxResponse;
use super::quiz::QuestionDraft;
use super::repository::{RepositoryError, RosterStore};
use super::roster::{export_file_name, RosterExportError};
use super::session::Session;

/// Header carrying the caller's already-verified user id.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Service error rendered as a JSON body with a matching status code.
#[derive(Debug)]
pub struct ApiError(pub ShiftServiceError);

impl From<ShiftServiceError> for ApiError {
    fn from(err: ShiftServiceError) -> Self {
        Self(err)
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        Self(err.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let err = self.0;
        let status = status_for(&err);
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!(error = %err, "roster request failed");
        }

        let payload = if err.is_stale() {
            json!({ "error": err.to_string(), "stale": true })
        } else {
            json!({ "error": err.to_string() })
        };
        (status, Json(payload)).into_response()
    }
}

pub fn status_for(err: &ShiftServiceError) -> StatusCode {
    match err {
        ShiftServiceError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        ShiftServiceError::Lifecycle(LifecycleError::NotOwner) => StatusCode::FORBIDDEN,
        ShiftServiceError::Lifecycle(_) => StatusCode::CONFLICT,
        ShiftServiceError::Forbidden(_) => StatusCode::FORBIDDEN,
        ShiftServiceError::Unauthenticated => StatusCode::UNAUTHORIZED,
        ShiftServiceError::Repository(RepositoryError::NotFound) => StatusCode::NOT_FOUND,
        ShiftServiceError::Repository(RepositoryError::Conflict | RepositoryError::Stale) => {
            StatusCode::CONFLICT
        }
        ShiftServiceError::Repository(RepositoryError::Unavailable(_)) => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        ShiftServiceError::Export(RosterExportError::Empty { .. }) => StatusCode::NOT_FOUND,
        ShiftServiceError::Export(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Restore the session named by the `x-user-id` header.
pub(crate) async fn caller<S>(
    app: &RosterApp<S>,
    headers: &HeaderMap,
) -> Result<Session, ShiftServiceError>
where
    S: RosterStore,
{
    let user_id = headers
        .get(USER_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .and_then(|raw| raw.trim().parse().ok())
        .map(UserId)
        .ok_or(ShiftServiceError::Unauthenticated)?;
    app.session(user_id).await
}

#[derive(Debug, Deserialize)]
pub(crate) struct MonthQuery {
    pub(crate) year: i32,
    pub(crate) month: u32,
}

fn period_of(year: i32, month: u32) -> Result<YearMonth, ValidationError> {
    YearMonth::new(year, month).ok_or(ValidationError::InvalidPeriod { year, month })
}

impl MonthQuery {
    fn period(&self) -> Result<YearMonth, ValidationError> {
        period_of(self.year, self.month)
    }
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct OptionalMonthQuery {
    year: Option<i32>,
    month: Option<u32>,
}

impl OptionalMonthQuery {
    fn period(&self) -> Result<Option<YearMonth>, ValidationError> {
        match (self.year, self.month) {
            (Some(year), Some(month)) => period_of(year, month).map(Some),
            _ => Ok(None),
        }
    }
}

#[derive(Debug, Deserialize)]
struct HourlyRateBody {
    rate: u32,
}

#[derive(Debug, Deserialize)]
struct ReleaseBody {
    year: i32,
    month: u32,
    group_id: GroupId,
    release_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct NameBody {
    name: String,
}

#[derive(Debug, Deserialize)]
struct StrikesBody {
    delta: i32,
}

#[derive(Debug, Deserialize)]
struct QuizResultBody {
    score: u32,
    total: u32,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ResolveBody {
    pub(crate) response: InboxResponse,
}

/// Every roster endpoint under `/api/v1`, bound to one application instance.
pub fn roster_router<S>(app: Arc<RosterApp<S>>) -> Router
where
    S: RosterStore,
{
    Router::new()
        .route("/api/v1/session", get(session_handler::<S>))
        .route("/api/v1/board", get(board_handler::<S>))
        .route("/api/v1/jobs", get(list_jobs_handler::<S>).post(create_job_handler::<S>))
        .route(
            "/api/v1/jobs/:job_id",
            get(get_job_handler::<S>)
                .put(update_job_handler::<S>)
                .delete(delete_job_handler::<S>),
        )
        .route("/api/v1/jobs/:job_id/toggle", post(toggle_job_handler::<S>))
        .route(
            "/api/v1/settings/hourly-rate",
            get(hourly_rate_handler::<S>).put(set_hourly_rate_handler::<S>),
        )
        .route(
            "/api/v1/releases",
            get(list_releases_handler::<S>).put(schedule_release_handler::<S>),
        )
        .route(
            "/api/v1/releases/:year/:month/:group_id",
            delete(clear_release_handler::<S>),
        )
        .route("/api/v1/roster", get(roster_handler::<S>))
        .route("/api/v1/roster/export", get(export_handler::<S>))
        .route("/api/v1/quiz", get(start_quiz_handler::<S>))
        .route("/api/v1/quiz/results", post(quiz_result_handler::<S>))
        .route(
            "/api/v1/quiz/questions",
            get(list_questions_handler::<S>).post(create_question_handler::<S>),
        )
        .route(
            "/api/v1/quiz/questions/:question_id",
            put(update_question_handler::<S>).delete(delete_question_handler::<S>),
        )
        .route(
            "/api/v1/locations",
            get(locations_handler::<S>).post(add_location_handler::<S>),
        )
        .route(
            "/api/v1/locations/:location_id",
            delete(remove_location_handler::<S>),
        )
        .route(
            "/api/v1/groups",
            get(groups_handler::<S>).post(create_group_handler::<S>),
        )
        .route("/api/v1/groups/:group_id", delete(delete_group_handler::<S>))
        .route(
            "/api/v1/groups/:group_id/members/:user_id/toggle",
            post(toggle_membership_handler::<S>),
        )
        .route("/api/v1/staff", get(staff_handler::<S>))
        .route("/api/v1/staff/:user_id/strikes", post(strikes_handler::<S>))
        .route(
            "/api/v1/staff/:user_id/overview",
            get(staff_overview_handler::<S>),
        )
        .route("/api/v1/overview", get(own_overview_handler::<S>))
        .route("/api/v1/admin/stats", get(admin_stats_handler::<S>))
        .route("/api/v1/notifications", get(notifications_handler::<S>))
        .route(
            "/api/v1/notifications/unread",
            get(unread_count_handler::<S>),
        )
        .route("/api/v1/notifications/read", post(mark_read_handler::<S>))
        .route(
            "/api/v1/notifications/:notification_id",
            delete(dismiss_handler::<S>),
        )
        .route(
            "/api/v1/notifications/:notification_id/invite",
            post(resolve_invite_handler::<S>),
        )
        .route(
            "/api/v1/notifications/:notification_id/emergency",
            post(resolve_emergency_handler::<S>),
        )
        .merge(application_routes::<S>())
        .with_state(app)
}

async fn session_handler<S>(
    State(app): State<Arc<RosterApp<S>>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError>
where
    S: RosterStore,
{
    let session = caller(&app, &headers).await?;
    Ok(Json(session))
}

pub(crate) async fn board_handler<S>(
    State(app): State<Arc<RosterApp<S>>>,
    headers: HeaderMap,
    Query(query): Query<MonthQuery>,
) -> Result<impl IntoResponse, ApiError>
where
    S: RosterStore,
{
    let session = caller(&app, &headers).await?;
    let board = app.board().month(&session, query.period()?).await?;
    Ok(Json(board))
}

async fn list_jobs_handler<S>(
    State(app): State<Arc<RosterApp<S>>>,
    headers: HeaderMap,
    Query(query): Query<MonthQuery>,
) -> Result<impl IntoResponse, ApiError>
where
    S: RosterStore,
{
    let session = caller(&app, &headers).await?;
    session.require_admin("listing all jobs")?;
    let jobs = app.jobs().list(query.period()?).await?;
    Ok(Json(jobs))
}

async fn create_job_handler<S>(
    State(app): State<Arc<RosterApp<S>>>,
    headers: HeaderMap,
    Json(draft): Json<JobDraft>,
) -> Result<impl IntoResponse, ApiError>
where
    S: RosterStore,
{
    let session = caller(&app, &headers).await?;
    let job = app.jobs().create(&session, draft).await?;
    Ok((StatusCode::CREATED, Json(job)))
}

async fn get_job_handler<S>(
    State(app): State<Arc<RosterApp<S>>>,
    headers: HeaderMap,
    Path(job_id): Path<JobId>,
) -> Result<impl IntoResponse, ApiError>
where
    S: RosterStore,
{
    let session = caller(&app, &headers).await?;
    let summary = app.jobs().get(&session, job_id).await?;
    Ok(Json(summary))
}

async fn update_job_handler<S>(
    State(app): State<Arc<RosterApp<S>>>,
    headers: HeaderMap,
    Path(job_id): Path<JobId>,
    Json(draft): Json<JobDraft>,
) -> Result<impl IntoResponse, ApiError>
where
    S: RosterStore,
{
    let session = caller(&app, &headers).await?;
    let job = app.jobs().update(&session, job_id, draft).await?;
    Ok(Json(job))
}

async fn delete_job_handler<S>(
    State(app): State<Arc<RosterApp<S>>>,
    headers: HeaderMap,
    Path(job_id): Path<JobId>,
) -> Result<impl IntoResponse, ApiError>
where
    S: RosterStore,
{
    let session = caller(&app, &headers).await?;
    app.jobs().delete(&session, job_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn toggle_job_handler<S>(
    State(app): State<Arc<RosterApp<S>>>,
    headers: HeaderMap,
    Path(job_id): Path<JobId>,
) -> Result<impl IntoResponse, ApiError>
where
    S: RosterStore,
{
    let session = caller(&app, &headers).await?;
    let job = app.jobs().toggle_active(&session, job_id).await?;
    Ok(Json(job))
}

async fn hourly_rate_handler<S>(
    State(app): State<Arc<RosterApp<S>>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError>
where
    S: RosterStore,
{
    caller(&app, &headers).await?;
    let rate = app.jobs().hourly_rate().await?;
    Ok(Json(json!({ "rate": rate })))
}

async fn set_hourly_rate_handler<S>(
    State(app): State<Arc<RosterApp<S>>>,
    headers: HeaderMap,
    Json(body): Json<HourlyRateBody>,
) -> Result<impl IntoResponse, ApiError>
where
    S: RosterStore,
{
    let session = caller(&app, &headers).await?;
    app.jobs().set_hourly_rate(&session, body.rate).await?;
    Ok(Json(json!({ "rate": body.rate })))
}

async fn list_releases_handler<S>(
    State(app): State<Arc<RosterApp<S>>>,
    headers: HeaderMap,
    Query(query): Query<MonthQuery>,
) -> Result<impl IntoResponse, ApiError>
where
    S: RosterStore,
{
    let session = caller(&app, &headers).await?;
    let releases = app.releases().list(&session, query.period()?).await?;
    Ok(Json(releases))
}

async fn schedule_release_handler<S>(
    State(app): State<Arc<RosterApp<S>>>,
    headers: HeaderMap,
    Json(body): Json<ReleaseBody>,
) -> Result<impl IntoResponse, ApiError>
where
    S: RosterStore,
{
    let session = caller(&app, &headers).await?;
    let period = period_of(body.year, body.month)?;
    let release = app
        .releases()
        .schedule(&session, period, body.group_id, body.release_at)
        .await?;
    Ok(Json(release))
}

async fn clear_release_handler<S>(
    State(app): State<Arc<RosterApp<S>>>,
    headers: HeaderMap,
    Path((year, month, group_id)): Path<(i32, u32, GroupId)>,
) -> Result<impl IntoResponse, ApiError>
where
    S: RosterStore,
{
    let session = caller(&app, &headers).await?;
    let period = period_of(year, month)?;
    app.releases().clear(&session, period, group_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn roster_handler<S>(
    State(app): State<Arc<RosterApp<S>>>,
    headers: HeaderMap,
    Query(query): Query<MonthQuery>,
) -> Result<impl IntoResponse, ApiError>
where
    S: RosterStore,
{
    let session = caller(&app, &headers).await?;
    let matrix = app.roster().matrix(&session, query.period()?).await?;
    Ok(Json(matrix))
}

pub(crate) async fn export_handler<S>(
    State(app): State<Arc<RosterApp<S>>>,
    headers: HeaderMap,
    Query(query): Query<MonthQuery>,
) -> Result<impl IntoResponse, ApiError>
where
    S: RosterStore,
{
    let session = caller(&app, &headers).await?;
    let period = query.period()?;
    let bytes = app.roster().export_csv(&session, period).await?;
    let disposition = format!("attachment; filename=\"{}\"", export_file_name(period));
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    ))
}

async fn start_quiz_handler<S>(
    State(app): State<Arc<RosterApp<S>>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError>
where
    S: RosterStore,
{
    caller(&app, &headers).await?;
    let attempt = app.quiz().start().await?;
    Ok(Json(attempt.questions().to_vec()))
}

async fn quiz_result_handler<S>(
    State(app): State<Arc<RosterApp<S>>>,
    headers: HeaderMap,
    Json(body): Json<QuizResultBody>,
) -> Result<impl IntoResponse, ApiError>
where
    S: RosterStore,
{
    let session = caller(&app, &headers).await?;
    let result = app
        .quiz()
        .record(session.user_id, body.score, body.total)
        .await?;
    Ok(Json(result))
}

async fn list_questions_handler<S>(
    State(app): State<Arc<RosterApp<S>>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError>
where
    S: RosterStore,
{
    let session = caller(&app, &headers).await?;
    let questions = app.quiz().questions(&session).await?;
    Ok(Json(questions))
}

async fn create_question_handler<S>(
    State(app): State<Arc<RosterApp<S>>>,
    headers: HeaderMap,
    Json(draft): Json<QuestionDraft>,
) -> Result<impl IntoResponse, ApiError>
where
    S: RosterStore,
{
    let session = caller(&app, &headers).await?;
    let question = app.quiz().create_question(&session, draft).await?;
    Ok((StatusCode::CREATED, Json(question)))
}

async fn update_question_handler<S>(
    State(app): State<Arc<RosterApp<S>>>,
    headers: HeaderMap,
    Path(question_id): Path<QuestionId>,
    Json(draft): Json<QuestionDraft>,
) -> Result<impl IntoResponse, ApiError>
where
    S: RosterStore,
{
    let session = caller(&app, &headers).await?;
    let question = app
        .quiz()
        .update_question(&session, question_id, draft)
        .await?;
    Ok(Json(question))
}

async fn delete_question_handler<S>(
    State(app): State<Arc<RosterApp<S>>>,
    headers: HeaderMap,
    Path(question_id): Path<QuestionId>,
) -> Result<impl IntoResponse, ApiError>
where
    S: RosterStore,
{
    let session = caller(&app, &headers).await?;
    app.quiz().delete_question(&session, question_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn locations_handler<S>(
    State(app): State<Arc<RosterApp<S>>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError>
where
    S: RosterStore,
{
    caller(&app, &headers).await?;
    let locations = app.directory().locations().await?;
    Ok(Json(locations))
}

async fn add_location_handler<S>(
    State(app): State<Arc<RosterApp<S>>>,
    headers: HeaderMap,
    Json(body): Json<NameBody>,
) -> Result<impl IntoResponse, ApiError>
where
    S: RosterStore,
{
    let session = caller(&app, &headers).await?;
    let location = app.directory().add_location(&session, &body.name).await?;
    Ok((StatusCode::CREATED, Json(location)))
}

async fn remove_location_handler<S>(
    State(app): State<Arc<RosterApp<S>>>,
    headers: HeaderMap,
    Path(location_id): Path<LocationId>,
) -> Result<impl IntoResponse, ApiError>
where
    S: RosterStore,
{
    let session = caller(&app, &headers).await?;
    app.directory().remove_location(&session, location_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn groups_handler<S>(
    State(app): State<Arc<RosterApp<S>>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError>
where
    S: RosterStore,
{
    caller(&app, &headers).await?;
    let groups = app.directory().groups().await?;
    Ok(Json(groups))
}

async fn create_group_handler<S>(
    State(app): State<Arc<RosterApp<S>>>,
    headers: HeaderMap,
    Json(body): Json<NameBody>,
) -> Result<impl IntoResponse, ApiError>
where
    S: RosterStore,
{
    let session = caller(&app, &headers).await?;
    let group = app.directory().create_group(&session, &body.name).await?;
    Ok((StatusCode::CREATED, Json(group)))
}

async fn delete_group_handler<S>(
    State(app): State<Arc<RosterApp<S>>>,
    headers: HeaderMap,
    Path(group_id): Path<GroupId>,
) -> Result<impl IntoResponse, ApiError>
where
    S: RosterStore,
{
    let session = caller(&app, &headers).await?;
    app.directory().delete_group(&session, group_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn toggle_membership_handler<S>(
    State(app): State<Arc<RosterApp<S>>>,
    headers: HeaderMap,
    Path((group_id, user_id)): Path<(GroupId, UserId)>,
) -> Result<impl IntoResponse, ApiError>
where
    S: RosterStore,
{
    let session = caller(&app, &headers).await?;
    let change = app
        .directory()
        .toggle_membership(&session, user_id, group_id)
        .await?;
    Ok(Json(json!({ "change": change })))
}

async fn staff_handler<S>(
    State(app): State<Arc<RosterApp<S>>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError>
where
    S: RosterStore,
{
    let session = caller(&app, &headers).await?;
    let staff: Vec<StaffMember> = app.directory().staff(&session).await?;
    Ok(Json(staff))
}

async fn strikes_handler<S>(
    State(app): State<Arc<RosterApp<S>>>,
    headers: HeaderMap,
    Path(user_id): Path<UserId>,
    Json(body): Json<StrikesBody>,
) -> Result<impl IntoResponse, ApiError>
where
    S: RosterStore,
{
    let session = caller(&app, &headers).await?;
    let profile = app
        .directory()
        .adjust_strikes(&session, user_id, body.delta)
        .await?;
    Ok(Json(profile))
}

async fn own_overview_handler<S>(
    State(app): State<Arc<RosterApp<S>>>,
    headers: HeaderMap,
    Query(query): Query<OptionalMonthQuery>,
) -> Result<impl IntoResponse, ApiError>
where
    S: RosterStore,
{
    let session = caller(&app, &headers).await?;
    let overview = app
        .overview()
        .staff(&session, session.user_id, query.period()?)
        .await?;
    Ok(Json(overview))
}

async fn staff_overview_handler<S>(
    State(app): State<Arc<RosterApp<S>>>,
    headers: HeaderMap,
    Path(user_id): Path<UserId>,
    Query(query): Query<OptionalMonthQuery>,
) -> Result<impl IntoResponse, ApiError>
where
    S: RosterStore,
{
    let session = caller(&app, &headers).await?;
    let overview = app
        .overview()
        .staff(&session, user_id, query.period()?)
        .await?;
    Ok(Json(overview))
}

async fn admin_stats_handler<S>(
    State(app): State<Arc<RosterApp<S>>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError>
where
    S: RosterStore,
{
    let session = caller(&app, &headers).await?;
    let stats = app.overview().admin(&session).await?;
    Ok(Json(stats))
}

async fn notifications_handler<S>(
    State(app): State<Arc<RosterApp<S>>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError>
where
    S: RosterStore,
{
    let session = caller(&app, &headers).await?;
    let notifications = app.inbox().list(&session).await?;
    Ok(Json(notifications))
}

async fn unread_count_handler<S>(
    State(app): State<Arc<RosterApp<S>>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError>
where
    S: RosterStore,
{
    let session = caller(&app, &headers).await?;
    let unread = app.inbox().unread_count(&session).await?;
    Ok(Json(json!({ "unread": unread })))
}

async fn mark_read_handler<S>(
    State(app): State<Arc<RosterApp<S>>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError>
where
    S: RosterStore,
{
    let session = caller(&app, &headers).await?;
    let updated = app.inbox().mark_all_read(&session).await?;
    Ok(Json(json!({ "updated": updated })))
}

async fn dismiss_handler<S>(
    State(app): State<Arc<RosterApp<S>>>,
    headers: HeaderMap,
    Path(notification_id): Path<NotificationId>,
) -> Result<impl IntoResponse, ApiError>
where
    S: RosterStore,
{
    let session = caller(&app, &headers).await?;
    app.inbox().dismiss(&session, notification_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub(crate) async fn resolve_invite_handler<S>(
    State(app): State<Arc<RosterApp<S>>>,
    headers: HeaderMap,
    Path(notification_id): Path<NotificationId>,
    Json(body): Json<ResolveBody>,
) -> Result<impl IntoResponse, ApiError>
where
    S: RosterStore,
{
    let session = caller(&app, &headers).await?;
    let resolution = app
        .inbox()
        .resolve_invite(&session, notification_id, body.response)
        .await?;
    Ok(Json(resolution))
}

async fn resolve_emergency_handler<S>(
    State(app): State<Arc<RosterApp<S>>>,
    headers: HeaderMap,
    Path(notification_id): Path<NotificationId>,
    Json(body): Json<ResolveBody>,
) -> Result<impl IntoResponse, ApiError>
where
    S: RosterStore,
{
    let session = caller(&app, &headers).await?;
    let resolution = app
        .inbox()
        .resolve_emergency(&session, notification_id, body.response)
        .await?;
    Ok(Json(resolution))
}
