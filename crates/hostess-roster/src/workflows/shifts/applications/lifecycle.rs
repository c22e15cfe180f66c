//! Pure transition rules for one (job, user) pair.
//!
//! Every function takes the row as last read and returns the row to write; the
//! service pairs the result with a compare-and-set so a concurrent change shows
//! up as stale state instead of a lost update.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::workflows::shifts::domain::{
    Application, ApplicationStatus, Job, GIVEAWAY_NOTICE_HOURS,
};

/// Giveaway sub-state of an approved application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum GiveawayState {
    Held,
    Requested { at: Option<DateTime<Utc>> },
    EmergencyRequested { at: Option<DateTime<Utc>> },
}

/// Tagged view of a user's relationship to a job. `None` means no row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ApplicationState {
    None,
    Pending,
    Invited,
    Approved { giveaway: GiveawayState },
}

impl ApplicationState {
    pub fn of(application: Option<&Application>) -> Self {
        let Some(application) = application else {
            return ApplicationState::None;
        };

        match application.status {
            ApplicationStatus::Pending => ApplicationState::Pending,
            ApplicationStatus::Invited => ApplicationState::Invited,
            ApplicationStatus::Approved => {
                let at = application.give_away_requested_at;
                let giveaway = if application.emergency_giveaway_requested {
                    GiveawayState::EmergencyRequested { at }
                } else if application.give_away_requested {
                    GiveawayState::Requested { at }
                } else {
                    GiveawayState::Held
                };
                ApplicationState::Approved { giveaway }
            }
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            ApplicationState::None => "none",
            ApplicationState::Pending => "pending",
            ApplicationState::Invited => "invited",
            ApplicationState::Approved {
                giveaway: GiveawayState::Held,
            } => "approved",
            ApplicationState::Approved {
                giveaway: GiveawayState::Requested { .. },
            } => "giveaway_requested",
            ApplicationState::Approved {
                giveaway: GiveawayState::EmergencyRequested { .. },
            } => "emergency_giveaway_requested",
        }
    }
}

/// Which queue a giveaway request lands in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GiveawayKind {
    /// Immediately claimable by other staff.
    Normal,
    /// Held back until an administrator approves it.
    Emergency,
}

impl GiveawayKind {
    pub fn for_notice(hours_until_start: f64) -> Self {
        if hours_until_start > GIVEAWAY_NOTICE_HOURS {
            GiveawayKind::Normal
        } else {
            GiveawayKind::Emergency
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LifecycleError {
    #[error("already applied or invited")]
    AlreadyApplied,
    #[error("job is full")]
    JobFull,
    #[error("job is not open for applications")]
    JobInactive,
    #[error("the job's month has not been released yet")]
    NotReleased,
    #[error("invitation no longer valid")]
    InvitationNoLongerValid,
    #[error("invitation already accepted")]
    AlreadyAccepted,
    #[error("application is not approved")]
    NotApproved,
    #[error("application cannot be approved from status {0}")]
    NotApprovable(&'static str),
    #[error("a giveaway is already requested for this shift")]
    GiveawayAlreadyRequested,
    #[error("no longer available: {0}")]
    NoLongerAvailable(String),
    #[error("application belongs to another user")]
    NotOwner,
    #[error("someone else already acted on this application")]
    Stale,
}

impl LifecycleError {
    /// Conditions caused by a concurrent actor rather than by the caller.
    pub fn is_stale(&self) -> bool {
        matches!(
            self,
            LifecycleError::InvitationNoLongerValid
                | LifecycleError::NoLongerAvailable(_)
                | LifecycleError::Stale
        )
    }
}

pub fn check_apply(
    existing: Option<&Application>,
    job: &Job,
    slots_taken: u32,
) -> Result<(), LifecycleError> {
    if existing.is_some() {
        return Err(LifecycleError::AlreadyApplied);
    }
    if !job.is_active {
        return Err(LifecycleError::JobInactive);
    }
    if slots_taken >= job.slots_total {
        return Err(LifecycleError::JobFull);
    }
    Ok(())
}

pub fn check_invite(existing: Option<&Application>) -> Result<(), LifecycleError> {
    match existing {
        Some(_) => Err(LifecycleError::AlreadyApplied),
        None => Ok(()),
    }
}

pub fn accept_invite(current: Option<&Application>) -> Result<Application, LifecycleError> {
    let current = current.ok_or(LifecycleError::InvitationNoLongerValid)?;
    match current.status {
        ApplicationStatus::Invited => Ok(Application {
            status: ApplicationStatus::Approved,
            ..current.clone()
        }),
        ApplicationStatus::Approved => Err(LifecycleError::AlreadyAccepted),
        ApplicationStatus::Pending => Err(LifecycleError::InvitationNoLongerValid),
    }
}

/// Admin acceptance of a pending application or an outstanding invitation.
pub fn approve(current: &Application) -> Result<Application, LifecycleError> {
    match current.status {
        ApplicationStatus::Pending | ApplicationStatus::Invited => Ok(Application {
            status: ApplicationStatus::Approved,
            ..current.clone()
        }),
        ApplicationStatus::Approved => Err(LifecycleError::NotApprovable(current.status.label())),
    }
}

pub fn request_giveaway(
    current: Option<&Application>,
    hours_until_start: f64,
    now: DateTime<Utc>,
) -> Result<(Application, GiveawayKind), LifecycleError> {
    let current = current.ok_or(LifecycleError::Stale)?;
    if !current.is_approved() {
        return Err(LifecycleError::NotApproved);
    }
    if current.has_pending_giveaway() {
        return Err(LifecycleError::GiveawayAlreadyRequested);
    }

    let kind = GiveawayKind::for_notice(hours_until_start);
    let next = Application {
        give_away_requested: kind == GiveawayKind::Normal,
        emergency_giveaway_requested: kind == GiveawayKind::Emergency,
        give_away_requested_at: Some(now),
        ..current.clone()
    };
    Ok((next, kind))
}

/// `None` when there is no emergency request to approve.
pub fn approve_emergency(current: &Application) -> Option<Application> {
    current.emergency_giveaway_requested.then(|| Application {
        give_away_requested: true,
        emergency_giveaway_requested: false,
        ..current.clone()
    })
}

/// `None` when there is no emergency request to decline.
pub fn decline_emergency(current: &Application) -> Option<Application> {
    current.emergency_giveaway_requested.then(|| Application {
        emergency_giveaway_requested: false,
        give_away_requested_at: None,
        ..current.clone()
    })
}

/// `Ok(None)` when nothing was requested; the row is already plain approved.
pub fn cancel_giveaway(current: Option<&Application>) -> Result<Option<Application>, LifecycleError> {
    let current = current.ok_or(LifecycleError::Stale)?;
    if !current.is_approved() {
        return Err(LifecycleError::NotApproved);
    }
    if !current.has_pending_giveaway() && current.give_away_requested_at.is_none() {
        return Ok(None);
    }
    Ok(Some(Application {
        give_away_requested: false,
        emergency_giveaway_requested: false,
        give_away_requested_at: None,
        ..current.clone()
    }))
}

/// Claim candidates for one job, oldest request first.
pub fn giveaway_queue(applications: &[Application]) -> Vec<&Application> {
    let mut queue: Vec<&Application> = applications
        .iter()
        .filter(|application| application.is_claimable())
        .collect();
    queue.sort_by_key(|application| (application.give_away_requested_at, application.created_at));
    queue
}
