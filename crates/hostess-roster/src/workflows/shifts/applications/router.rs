use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{delete, get, post},
    Json, Router,
};
use serde::Deserialize;

use crate::workflows::shifts::app::RosterApp;
use crate::workflows::shifts::domain::{ApplicationId, JobId, UserId};
use crate::workflows::shifts::repository::RosterStore;
use crate::workflows::shifts::router::{caller, ApiError};

#[derive(Debug, Deserialize)]
pub(crate) struct StaffTarget {
    pub(crate) user_id: UserId,
}

/// Application, invitation and giveaway endpoints. State is attached by the caller.
pub fn application_routes<S>() -> Router<Arc<RosterApp<S>>>
where
    S: RosterStore,
{
    Router::new()
        .route("/api/v1/jobs/:job_id/applications", post(apply_handler::<S>))
        .route(
            "/api/v1/jobs/:job_id/applications/mine",
            delete(withdraw_handler::<S>),
        )
        .route("/api/v1/jobs/:job_id/applicants", get(applicants_handler::<S>))
        .route("/api/v1/jobs/:job_id/invitations", post(invite_handler::<S>))
        .route(
            "/api/v1/jobs/:job_id/invitations/accept",
            post(accept_invite_handler::<S>),
        )
        .route("/api/v1/jobs/:job_id/assignments", post(assign_handler::<S>))
        .route(
            "/api/v1/jobs/:job_id/giveaway",
            post(request_giveaway_handler::<S>).delete(cancel_giveaway_handler::<S>),
        )
        .route(
            "/api/v1/jobs/:job_id/giveaway/claim",
            post(claim_giveaway_handler::<S>),
        )
        .route(
            "/api/v1/jobs/:job_id/giveaway/queue",
            get(giveaway_queue_handler::<S>),
        )
        .route(
            "/api/v1/applications/:application_id",
            delete(decline_handler::<S>),
        )
        .route(
            "/api/v1/applications/:application_id/approve",
            post(approve_handler::<S>),
        )
        .route(
            "/api/v1/applications/:application_id/assignment",
            delete(remove_approved_handler::<S>),
        )
        .route(
            "/api/v1/applications/:application_id/emergency/approve",
            post(approve_emergency_handler::<S>),
        )
        .route(
            "/api/v1/applications/:application_id/emergency/decline",
            post(decline_emergency_handler::<S>),
        )
}

pub(crate) async fn apply_handler<S>(
    State(app): State<Arc<RosterApp<S>>>,
    headers: HeaderMap,
    Path(job_id): Path<JobId>,
) -> Result<impl IntoResponse, ApiError>
where
    S: RosterStore,
{
    let session = caller(&app, &headers).await?;
    let application = app.applications().apply(&session, job_id).await?;
    Ok((StatusCode::CREATED, Json(application)))
}

async fn withdraw_handler<S>(
    State(app): State<Arc<RosterApp<S>>>,
    headers: HeaderMap,
    Path(job_id): Path<JobId>,
) -> Result<impl IntoResponse, ApiError>
where
    S: RosterStore,
{
    let session = caller(&app, &headers).await?;
    app.applications().withdraw(&session, job_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn applicants_handler<S>(
    State(app): State<Arc<RosterApp<S>>>,
    headers: HeaderMap,
    Path(job_id): Path<JobId>,
) -> Result<impl IntoResponse, ApiError>
where
    S: RosterStore,
{
    let session = caller(&app, &headers).await?;
    let applicants = app.applications().applicants(&session, job_id).await?;
    Ok(Json(applicants))
}

async fn invite_handler<S>(
    State(app): State<Arc<RosterApp<S>>>,
    headers: HeaderMap,
    Path(job_id): Path<JobId>,
    Json(target): Json<StaffTarget>,
) -> Result<impl IntoResponse, ApiError>
where
    S: RosterStore,
{
    let session = caller(&app, &headers).await?;
    let application = app
        .applications()
        .invite(&session, job_id, target.user_id)
        .await?;
    Ok((StatusCode::CREATED, Json(application)))
}

pub(crate) async fn accept_invite_handler<S>(
    State(app): State<Arc<RosterApp<S>>>,
    headers: HeaderMap,
    Path(job_id): Path<JobId>,
) -> Result<impl IntoResponse, ApiError>
where
    S: RosterStore,
{
    let session = caller(&app, &headers).await?;
    let application = app.applications().accept_invite(&session, job_id).await?;
    Ok(Json(application))
}

async fn assign_handler<S>(
    State(app): State<Arc<RosterApp<S>>>,
    headers: HeaderMap,
    Path(job_id): Path<JobId>,
    Json(target): Json<StaffTarget>,
) -> Result<impl IntoResponse, ApiError>
where
    S: RosterStore,
{
    let session = caller(&app, &headers).await?;
    let application = app
        .applications()
        .assign(&session, job_id, target.user_id)
        .await?;
    Ok(Json(application))
}

async fn request_giveaway_handler<S>(
    State(app): State<Arc<RosterApp<S>>>,
    headers: HeaderMap,
    Path(job_id): Path<JobId>,
) -> Result<impl IntoResponse, ApiError>
where
    S: RosterStore,
{
    let session = caller(&app, &headers).await?;
    let receipt = app.applications().request_giveaway(&session, job_id).await?;
    Ok(Json(receipt))
}

async fn cancel_giveaway_handler<S>(
    State(app): State<Arc<RosterApp<S>>>,
    headers: HeaderMap,
    Path(job_id): Path<JobId>,
) -> Result<impl IntoResponse, ApiError>
where
    S: RosterStore,
{
    let session = caller(&app, &headers).await?;
    let application = app.applications().cancel_giveaway(&session, job_id).await?;
    Ok(Json(application))
}

pub(crate) async fn claim_giveaway_handler<S>(
    State(app): State<Arc<RosterApp<S>>>,
    headers: HeaderMap,
    Path(job_id): Path<JobId>,
) -> Result<impl IntoResponse, ApiError>
where
    S: RosterStore,
{
    let session = caller(&app, &headers).await?;
    let claimed = app.applications().claim_giveaway(&session, job_id).await?;
    Ok(Json(claimed))
}

async fn giveaway_queue_handler<S>(
    State(app): State<Arc<RosterApp<S>>>,
    headers: HeaderMap,
    Path(job_id): Path<JobId>,
) -> Result<impl IntoResponse, ApiError>
where
    S: RosterStore,
{
    caller(&app, &headers).await?;
    let queue = app.applications().giveaway_queue(job_id).await?;
    Ok(Json(queue))
}

async fn decline_handler<S>(
    State(app): State<Arc<RosterApp<S>>>,
    headers: HeaderMap,
    Path(application_id): Path<ApplicationId>,
) -> Result<impl IntoResponse, ApiError>
where
    S: RosterStore,
{
    let session = caller(&app, &headers).await?;
    app.applications().decline(&session, application_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn approve_handler<S>(
    State(app): State<Arc<RosterApp<S>>>,
    headers: HeaderMap,
    Path(application_id): Path<ApplicationId>,
) -> Result<impl IntoResponse, ApiError>
where
    S: RosterStore,
{
    let session = caller(&app, &headers).await?;
    let application = app.applications().approve(&session, application_id).await?;
    Ok(Json(application))
}

async fn remove_approved_handler<S>(
    State(app): State<Arc<RosterApp<S>>>,
    headers: HeaderMap,
    Path(application_id): Path<ApplicationId>,
) -> Result<impl IntoResponse, ApiError>
where
    S: RosterStore,
{
    let session = caller(&app, &headers).await?;
    app.applications()
        .remove_approved(&session, application_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn approve_emergency_handler<S>(
    State(app): State<Arc<RosterApp<S>>>,
    headers: HeaderMap,
    Path(application_id): Path<ApplicationId>,
) -> Result<impl IntoResponse, ApiError>
where
    S: RosterStore,
{
    let session = caller(&app, &headers).await?;
    let application = app
        .applications()
        .approve_emergency_giveaway(&session, application_id)
        .await?;
    Ok(Json(application))
}

async fn decline_emergency_handler<S>(
    State(app): State<Arc<RosterApp<S>>>,
    headers: HeaderMap,
    Path(application_id): Path<ApplicationId>,
) -> Result<impl IntoResponse, ApiError>
where
    S: RosterStore,
{
    let session = caller(&app, &headers).await?;
    let application = app
        .applications()
        .decline_emergency_giveaway(&session, application_id)
        .await?;
    Ok(Json(application))
}
