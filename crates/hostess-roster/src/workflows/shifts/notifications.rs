use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::applications::{LifecycleError, ShiftApplicationService};
use super::domain::{Application, Notification, NotificationId, NotificationKind};
use super::error::ShiftServiceError;
use super::repository::{RepositoryError, RosterStore};
use super::session::Session;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Response {
    Accept,
    Decline,
}

/// Outcome of acting on a notification.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Resolution {
    Accepted { application: Application },
    Declined,
    /// Someone else acted first; the notification was cleared anyway.
    Expired { reason: String },
}

/// The signed-in user's notifications and the actions attached to them.
pub struct NotificationInbox<S> {
    store: Arc<S>,
    applications: ShiftApplicationService<S>,
}

impl<S> Clone for NotificationInbox<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            applications: self.applications.clone(),
        }
    }
}

impl<S> NotificationInbox<S>
where
    S: RosterStore,
{
    pub fn new(store: Arc<S>, applications: ShiftApplicationService<S>) -> Self {
        Self {
            store,
            applications,
        }
    }

    pub async fn list(&self, session: &Session) -> Result<Vec<Notification>, ShiftServiceError> {
        let mut notifications = self.store.notifications_for(session.user_id).await?;
        notifications.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(notifications)
    }

    pub async fn unread_count(&self, session: &Session) -> Result<usize, ShiftServiceError> {
        Ok(self.store.unread_count(session.user_id).await?)
    }

    pub async fn mark_all_read(&self, session: &Session) -> Result<usize, ShiftServiceError> {
        let updated = self.store.mark_all_read(session.user_id).await?;
        debug!(user_id = %session.user_id, updated, "notifications marked read");
        Ok(updated)
    }

    pub async fn dismiss(
        &self,
        session: &Session,
        id: NotificationId,
    ) -> Result<(), ShiftServiceError> {
        self.owned(session, id).await?;
        self.store.dismiss(id).await?;
        Ok(())
    }

    /// Accept or decline the invitation a notification points at.
    pub async fn resolve_invite(
        &self,
        session: &Session,
        id: NotificationId,
        response: Response,
    ) -> Result<Resolution, ShiftServiceError> {
        let notification = self.owned(session, id).await?;
        if notification.kind != NotificationKind::Invite {
            return Err(LifecycleError::InvitationNoLongerValid.into());
        }
        let job_id = notification
            .related_job_id
            .ok_or(LifecycleError::InvitationNoLongerValid)?;

        let outcome = match response {
            Response::Accept => self
                .applications
                .accept_invite(session, job_id)
                .await
                .map(|application| Resolution::Accepted { application }),
            Response::Decline => self
                .applications
                .withdraw(session, job_id)
                .await
                .map(|()| Resolution::Declined),
        };

        self.finish(id, outcome).await
    }

    /// Admin approval or rejection of an emergency giveaway from the inbox.
    pub async fn resolve_emergency(
        &self,
        session: &Session,
        id: NotificationId,
        response: Response,
    ) -> Result<Resolution, ShiftServiceError> {
        session.require_admin("resolving emergency giveaways")?;
        let notification = self.owned(session, id).await?;
        let application_id = match (notification.kind, notification.related_application_id) {
            (NotificationKind::EmergencyGiveaway, Some(application_id)) => application_id,
            _ => return Err(LifecycleError::Stale.into()),
        };

        let outcome = match response {
            Response::Accept => self
                .applications
                .approve_emergency_giveaway(session, application_id)
                .await
                .map(|application| Resolution::Accepted { application }),
            Response::Decline => self
                .applications
                .decline_emergency_giveaway(session, application_id)
                .await
                .map(|_| Resolution::Declined),
        };

        self.finish(id, outcome).await
    }

    /// Clear the notification once handled, or once it turned out to be stale.
    async fn finish(
        &self,
        id: NotificationId,
        outcome: Result<Resolution, ShiftServiceError>,
    ) -> Result<Resolution, ShiftServiceError> {
        let resolution = match outcome {
            Ok(resolution) => resolution,
            Err(err) if err.is_stale() => {
                info!(notification_id = %id, reason = %err, "stale notification cleared");
                Resolution::Expired {
                    reason: err.to_string(),
                }
            }
            Err(err) => return Err(err),
        };
        self.store.dismiss(id).await?;
        Ok(resolution)
    }

    async fn owned(
        &self,
        session: &Session,
        id: NotificationId,
    ) -> Result<Notification, ShiftServiceError> {
        let notification = self
            .store
            .fetch_notification(id)
            .await?
            .ok_or(ShiftServiceError::Repository(RepositoryError::NotFound))?;
        if notification.user_id != session.user_id {
            return Err(LifecycleError::NotOwner.into());
        }
        Ok(notification)
    }
}
