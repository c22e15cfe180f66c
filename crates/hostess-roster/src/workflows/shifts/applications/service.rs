use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use super::lifecycle::{self, GiveawayKind, LifecycleError};
use crate::workflows::shifts::clock::Clock;
use crate::workflows::shifts::domain::{
    Application, ApplicationId, ApplicationStatus, Job, JobId, NewNotification, NotificationKind,
    Role, UserId,
};
use crate::workflows::shifts::release::ReleaseScheduler;
use crate::workflows::shifts::error::{stale_on_miss, ShiftServiceError};
use crate::workflows::shifts::repository::{ClaimedSpot, RepositoryError, RosterStore};
use crate::workflows::shifts::session::Session;

/// Result of a giveaway request: which queue the shift landed in.
#[derive(Debug, Clone, Serialize)]
pub struct GiveawayReceipt {
    pub application: Application,
    pub kind: GiveawayKind,
}

/// Applicant row as shown to administrators on a job.
#[derive(Debug, Clone, Serialize)]
pub struct ApplicantView {
    pub application: Application,
    pub state: &'static str,
    pub full_name: String,
    pub email: String,
    pub strikes: u32,
}

/// Drives the per-(job, user) lifecycle against the store.
pub struct ShiftApplicationService<S> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
}

impl<S> Clone for ShiftApplicationService<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            clock: self.clock.clone(),
        }
    }
}

impl<S> ShiftApplicationService<S>
where
    S: RosterStore,
{
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Apply to a job. Normal applications are approved immediately.
    pub async fn apply(
        &self,
        session: &Session,
        job_id: JobId,
    ) -> Result<Application, ShiftServiceError> {
        let job = self.job(job_id).await?;
        self.ensure_released(session, &job).await?;
        let existing = self.store.application_for(job_id, session.user_id).await?;
        let slots_taken = self.store.count_approved(job_id).await?;
        lifecycle::check_apply(existing.as_ref(), &job, slots_taken)?;

        let application = Application::new(
            job_id,
            session.user_id,
            ApplicationStatus::Approved,
            self.clock.now(),
        );
        let stored = self
            .store
            .insert_application(application)
            .await
            .map_err(already_applied)?;

        info!(job_id = %job_id, user_id = %session.user_id, application_id = %stored.id, "application auto-approved");
        Ok(stored)
    }

    pub async fn invite(
        &self,
        session: &Session,
        job_id: JobId,
        user_id: UserId,
    ) -> Result<Application, ShiftServiceError> {
        session.require_admin("inviting staff")?;
        let job = self.job(job_id).await?;
        let existing = self.store.application_for(job_id, user_id).await?;
        lifecycle::check_invite(existing.as_ref())?;

        let application =
            Application::new(job_id, user_id, ApplicationStatus::Invited, self.clock.now());
        let stored = self
            .store
            .insert_application(application)
            .await
            .map_err(already_applied)?;

        self.notify(NewNotification {
            user_id,
            kind: NotificationKind::Invite,
            message: format!("You have been invited to the following job: {}", job.title),
            related_job_id: Some(job_id),
            related_application_id: Some(stored.id),
        })
        .await;

        info!(job_id = %job_id, user_id = %user_id, "staff invited");
        Ok(stored)
    }

    pub async fn accept_invite(
        &self,
        session: &Session,
        job_id: JobId,
    ) -> Result<Application, ShiftServiceError> {
        let current = self.store.application_for(job_id, session.user_id).await?;
        let next = lifecycle::accept_invite(current.as_ref())?;
        let stored = self.commit(current.as_ref(), next).await.map_err(|err| {
            if err.is_stale() {
                LifecycleError::InvitationNoLongerValid.into()
            } else {
                err
            }
        })?;

        info!(job_id = %job_id, user_id = %session.user_id, "invitation accepted");
        Ok(stored)
    }

    /// Admin acceptance of a pending or invited row.
    pub async fn approve(
        &self,
        session: &Session,
        application_id: ApplicationId,
    ) -> Result<Application, ShiftServiceError> {
        session.require_admin("approving applications")?;
        let current = self.application(application_id).await?;
        let next = lifecycle::approve(&current)?;
        let job = self.job(current.job_id).await?;
        let stored = self.commit(Some(&current), next).await?;

        self.notify(NewNotification {
            user_id: stored.user_id,
            kind: NotificationKind::Info,
            message: format!("Your application was accepted for the following job: {}", job.title),
            related_job_id: Some(job.id),
            related_application_id: Some(stored.id),
        })
        .await;

        info!(application_id = %stored.id, "application approved by admin");
        Ok(stored)
    }

    /// Put a user straight onto the roster, upgrading any pending or invited row.
    pub async fn assign(
        &self,
        session: &Session,
        job_id: JobId,
        user_id: UserId,
    ) -> Result<Application, ShiftServiceError> {
        session.require_admin("assigning staff")?;
        self.job(job_id).await?;

        let stored = match self.store.application_for(job_id, user_id).await? {
            Some(existing) if existing.is_approved() => existing,
            Some(existing) => {
                let next = lifecycle::approve(&existing)?;
                self.commit(Some(&existing), next).await?
            }
            None => {
                let application = Application::new(
                    job_id,
                    user_id,
                    ApplicationStatus::Approved,
                    self.clock.now(),
                );
                self.store
                    .insert_application(application)
                    .await
                    .map_err(already_applied)?
            }
        };

        info!(job_id = %job_id, user_id = %user_id, "staff assigned by admin");
        Ok(stored)
    }

    /// Delete the row; the user may apply again afterwards.
    pub async fn decline(
        &self,
        session: &Session,
        application_id: ApplicationId,
    ) -> Result<(), ShiftServiceError> {
        let current = self.application(application_id).await?;
        if current.user_id != session.user_id && !session.is_admin() {
            return Err(LifecycleError::NotOwner.into());
        }
        self.store
            .delete_application(application_id)
            .await
            .map_err(stale_on_miss)?;

        info!(application_id = %application_id, job_id = %current.job_id, user_id = %current.user_id, "application removed");
        Ok(())
    }

    /// Decline the caller's own row for a job, e.g. an unwanted invitation.
    pub async fn withdraw(&self, session: &Session, job_id: JobId) -> Result<(), ShiftServiceError> {
        let current = self
            .store
            .application_for(job_id, session.user_id)
            .await?
            .ok_or(LifecycleError::Stale)?;
        self.decline(session, current.id).await
    }

    pub async fn request_giveaway(
        &self,
        session: &Session,
        job_id: JobId,
    ) -> Result<GiveawayReceipt, ShiftServiceError> {
        let job = self.job(job_id).await?;
        let now = self.clock.now();
        let current = self.store.application_for(job_id, session.user_id).await?;
        let (next, kind) =
            lifecycle::request_giveaway(current.as_ref(), job.hours_until_start(now), now)?;
        let stored = self.commit(current.as_ref(), next).await?;

        if kind == GiveawayKind::Emergency {
            self.notify_admins_of_emergency(session, &job, &stored).await;
        }

        info!(job_id = %job_id, user_id = %session.user_id, ?kind, "giveaway requested");
        Ok(GiveawayReceipt {
            application: stored,
            kind,
        })
    }

    /// Make an emergency request claimable. Calling it twice is harmless.
    pub async fn approve_emergency_giveaway(
        &self,
        session: &Session,
        application_id: ApplicationId,
    ) -> Result<Application, ShiftServiceError> {
        session.require_admin("approving emergency giveaways")?;
        let current = self.application(application_id).await?;
        let Some(next) = lifecycle::approve_emergency(&current) else {
            return Ok(current);
        };
        let stored = self.commit(Some(&current), next).await?;
        info!(application_id = %application_id, "emergency giveaway approved");
        Ok(stored)
    }

    /// Reject an emergency request; the holder keeps the shift.
    pub async fn decline_emergency_giveaway(
        &self,
        session: &Session,
        application_id: ApplicationId,
    ) -> Result<Application, ShiftServiceError> {
        session.require_admin("declining emergency giveaways")?;
        let current = self.application(application_id).await?;
        let Some(next) = lifecycle::decline_emergency(&current) else {
            return Ok(current);
        };
        let stored = self.commit(Some(&current), next).await?;
        info!(application_id = %application_id, "emergency giveaway declined");
        Ok(stored)
    }

    pub async fn cancel_giveaway(
        &self,
        session: &Session,
        job_id: JobId,
    ) -> Result<Application, ShiftServiceError> {
        let current = self.store.application_for(job_id, session.user_id).await?;
        let stored = match lifecycle::cancel_giveaway(current.as_ref())? {
            Some(next) => self.commit(current.as_ref(), next).await?,
            None => current.ok_or(LifecycleError::Stale)?,
        };
        info!(job_id = %job_id, user_id = %session.user_id, "giveaway withdrawn");
        Ok(stored)
    }

    /// Take over a released shift. The store decides the winner atomically.
    pub async fn claim_giveaway(
        &self,
        session: &Session,
        job_id: JobId,
    ) -> Result<ClaimedSpot, ShiftServiceError> {
        let job = self.job(job_id).await?;
        self.ensure_released(session, &job).await?;
        let outcome = self
            .store
            .claim_giveaway_spot(job_id, session.user_id, self.clock.now())
            .await?;

        let claimed = match (outcome.success, outcome.claimed) {
            (true, Some(claimed)) => claimed,
            _ => {
                warn!(job_id = %job_id, user_id = %session.user_id, reason = %outcome.message, "giveaway claim rejected");
                return Err(LifecycleError::NoLongerAvailable(outcome.message).into());
            }
        };

        self.notify(NewNotification {
            user_id: claimed.vacated.user_id,
            kind: NotificationKind::GiveawayClaimed,
            message: format!("{} took over your shift: {}", session.full_name, job.title),
            related_job_id: Some(job_id),
            related_application_id: Some(claimed.application.id),
        })
        .await;

        info!(
            job_id = %job_id,
            claimant = %session.user_id,
            vacated_by = %claimed.vacated.user_id,
            "giveaway claimed"
        );
        Ok(claimed)
    }

    /// Hard removal of an approved row by an administrator.
    pub async fn remove_approved(
        &self,
        session: &Session,
        application_id: ApplicationId,
    ) -> Result<(), ShiftServiceError> {
        session.require_admin("removing staff from a job")?;
        let current = self.application(application_id).await?;
        if !current.is_approved() {
            return Err(LifecycleError::NotApproved.into());
        }
        self.store
            .delete_application(application_id)
            .await
            .map_err(stale_on_miss)?;
        info!(application_id = %application_id, job_id = %current.job_id, "approved staff removed");
        Ok(())
    }

    /// Every row on a job with the applicant's profile, oldest first.
    pub async fn applicants(
        &self,
        session: &Session,
        job_id: JobId,
    ) -> Result<Vec<ApplicantView>, ShiftServiceError> {
        session.require_admin("listing applicants")?;
        let applications = self.store.applications_for_job(job_id).await?;
        let mut views = Vec::with_capacity(applications.len());
        for application in applications {
            let profile = self.store.fetch_profile(application.user_id).await?;
            let (full_name, email, strikes) = match profile {
                Some(profile) => (profile.full_name, profile.email, profile.strikes),
                None => (String::new(), String::new(), 0),
            };
            views.push(ApplicantView {
                state: lifecycle::ApplicationState::of(Some(&application)).label(),
                application,
                full_name,
                email,
                strikes,
            });
        }
        Ok(views)
    }

    /// Claim candidates for a job in request order. Informational only.
    pub async fn giveaway_queue(&self, job_id: JobId) -> Result<Vec<Application>, ShiftServiceError> {
        let applications = self.store.applications_for_job(job_id).await?;
        Ok(lifecycle::giveaway_queue(&applications)
            .into_iter()
            .cloned()
            .collect())
    }

    async fn notify_admins_of_emergency(
        &self,
        session: &Session,
        job: &Job,
        application: &Application,
    ) {
        let profiles = match self.store.profiles().await {
            Ok(profiles) => profiles,
            Err(err) => {
                warn!(application_id = %application.id, error = %err, "admins not notified of emergency giveaway");
                return;
            }
        };
        for admin in profiles.into_iter().filter(|profile| profile.role == Role::Admin) {
            self.notify(NewNotification {
                user_id: admin.id,
                kind: NotificationKind::EmergencyGiveaway,
                message: format!(
                    "{} requested an emergency giveaway for: {}",
                    session.full_name, job.title
                ),
                related_job_id: Some(job.id),
                related_application_id: Some(application.id),
            })
            .await;
        }
    }

    /// Delivery happens after the transition is committed and never undoes it.
    async fn notify(&self, notification: NewNotification) {
        let user_id = notification.user_id;
        let kind = notification.kind;
        if let Err(err) = self.store.publish(notification).await {
            warn!(user_id = %user_id, ?kind, error = %err, "notification not delivered");
        }
    }

    async fn ensure_released(&self, session: &Session, job: &Job) -> Result<(), ShiftServiceError> {
        let visible = ReleaseScheduler::new(self.store.clone())
            .job_visible(session, job, self.clock.now())
            .await?;
        if visible {
            return Ok(());
        }
        warn!(job_id = %job.id, user_id = %session.user_id, "job month not released to caller");
        Err(LifecycleError::NotReleased.into())
    }

    async fn commit(
        &self,
        expected: Option<&Application>,
        next: Application,
    ) -> Result<Application, ShiftServiceError> {
        let expected = expected.ok_or(LifecycleError::Stale)?;
        self.store
            .replace_application(expected, next)
            .await
            .map_err(stale_on_miss)
    }

    async fn job(&self, job_id: JobId) -> Result<Job, ShiftServiceError> {
        self.store
            .fetch_job(job_id)
            .await?
            .ok_or(ShiftServiceError::Repository(RepositoryError::NotFound))
    }

    async fn application(
        &self,
        application_id: ApplicationId,
    ) -> Result<Application, ShiftServiceError> {
        self.store
            .fetch_application(application_id)
            .await?
            .ok_or_else(|| LifecycleError::Stale.into())
    }
}

fn already_applied(err: RepositoryError) -> ShiftServiceError {
    match err {
        RepositoryError::Conflict => LifecycleError::AlreadyApplied.into(),
        other => other.into(),
    }
}
