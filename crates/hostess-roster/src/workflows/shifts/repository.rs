use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{
    Application, ApplicationId, Group, GroupId, Job, JobId, Location, LocationId, Membership,
    MonthlyRelease, NewNotification, Notification, NotificationId, Profile, QuestionId,
    QuizQuestion, UserId, YearMonth,
};

/// Error enumeration for store failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    /// A conditional update matched zero rows.
    #[error("record changed since it was read")]
    Stale,
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Result of the store's atomic claim procedure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimOutcome {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub claimed: Option<ClaimedSpot>,
}

impl ClaimOutcome {
    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            claimed: None,
        }
    }
}

/// Ownership change performed by a successful claim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimedSpot {
    pub vacated: Application,
    pub application: Application,
}

#[async_trait]
pub trait JobRepository: Send + Sync {
    async fn insert_job(&self, job: Job) -> Result<Job, RepositoryError>;
    async fn update_job(&self, job: Job) -> Result<(), RepositoryError>;
    /// Hard delete; dependent applications are removed by the store.
    async fn delete_job(&self, id: JobId) -> Result<(), RepositoryError>;
    async fn fetch_job(&self, id: JobId) -> Result<Option<Job>, RepositoryError>;
    /// Jobs starting in `[from, until)`, ascending by start.
    async fn jobs_between(
        &self,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<Job>, RepositoryError>;
}

#[async_trait]
pub trait ApplicationRepository: Send + Sync {
    /// Fails with `Conflict` when the (job, user) pair already has a row.
    async fn insert_application(
        &self,
        application: Application,
    ) -> Result<Application, RepositoryError>;
    async fn fetch_application(
        &self,
        id: ApplicationId,
    ) -> Result<Option<Application>, RepositoryError>;
    async fn application_for(
        &self,
        job_id: JobId,
        user_id: UserId,
    ) -> Result<Option<Application>, RepositoryError>;
    /// All rows for a job, oldest first.
    async fn applications_for_job(&self, job_id: JobId)
        -> Result<Vec<Application>, RepositoryError>;
    async fn applications_for_user(
        &self,
        user_id: UserId,
    ) -> Result<Vec<Application>, RepositoryError>;
    /// Approved rows carrying either giveaway flag, across all jobs.
    async fn pending_giveaways(&self) -> Result<Vec<Application>, RepositoryError>;
    async fn count_approved(&self, job_id: JobId) -> Result<u32, RepositoryError>;
    /// Compare-and-set: `Stale` unless the stored row equals `expected`.
    async fn replace_application(
        &self,
        expected: &Application,
        next: Application,
    ) -> Result<Application, RepositoryError>;
    async fn delete_application(&self, id: ApplicationId) -> Result<(), RepositoryError>;
    /// Atomically vacate the oldest claimable row of the job and hand it to `claimant`.
    async fn claim_giveaway_spot(
        &self,
        job_id: JobId,
        claimant: UserId,
        now: DateTime<Utc>,
    ) -> Result<ClaimOutcome, RepositoryError>;
}

#[async_trait]
pub trait ProfileRepository: Send + Sync {
    async fn fetch_profile(&self, id: UserId) -> Result<Option<Profile>, RepositoryError>;
    /// Ordered by full name.
    async fn profiles(&self) -> Result<Vec<Profile>, RepositoryError>;
    async fn update_profile(&self, profile: Profile) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait DirectoryRepository: Send + Sync {
    async fn locations(&self) -> Result<Vec<Location>, RepositoryError>;
    async fn insert_location(&self, location: Location) -> Result<Location, RepositoryError>;
    async fn delete_location(&self, id: LocationId) -> Result<(), RepositoryError>;
    async fn groups(&self) -> Result<Vec<Group>, RepositoryError>;
    async fn insert_group(&self, group: Group) -> Result<Group, RepositoryError>;
    /// Also removes the group's memberships and releases.
    async fn delete_group(&self, id: GroupId) -> Result<(), RepositoryError>;
    async fn memberships_for(&self, user_id: UserId) -> Result<Vec<Membership>, RepositoryError>;
    async fn memberships(&self) -> Result<Vec<Membership>, RepositoryError>;
    /// Atomically drop every membership of the user and add the given one.
    async fn replace_memberships(&self, membership: Membership) -> Result<(), RepositoryError>;
    async fn remove_membership(&self, membership: Membership) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait ReleaseRepository: Send + Sync {
    async fn releases_for(&self, period: YearMonth)
        -> Result<Vec<MonthlyRelease>, RepositoryError>;
    async fn upsert_release(&self, release: MonthlyRelease) -> Result<(), RepositoryError>;
    async fn delete_release(
        &self,
        period: YearMonth,
        group_id: GroupId,
    ) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait QuizRepository: Send + Sync {
    /// Ordered by creation time.
    async fn questions(&self) -> Result<Vec<QuizQuestion>, RepositoryError>;
    async fn insert_question(&self, question: QuizQuestion)
        -> Result<QuizQuestion, RepositoryError>;
    async fn update_question(&self, question: QuizQuestion) -> Result<(), RepositoryError>;
    async fn delete_question(&self, id: QuestionId) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait SettingsRepository: Send + Sync {
    async fn hourly_rate(&self) -> Result<Option<u32>, RepositoryError>;
    async fn set_hourly_rate(&self, rate: u32) -> Result<(), RepositoryError>;
}

/// Insert-only outbound notification rows plus the recipient's inbox reads.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn publish(&self, notification: NewNotification)
        -> Result<Notification, RepositoryError>;
    /// Newest first.
    async fn notifications_for(&self, user_id: UserId)
        -> Result<Vec<Notification>, RepositoryError>;
    async fn unread_count(&self, user_id: UserId) -> Result<usize, RepositoryError>;
    async fn mark_all_read(&self, user_id: UserId) -> Result<usize, RepositoryError>;
    async fn fetch_notification(
        &self,
        id: NotificationId,
    ) -> Result<Option<Notification>, RepositoryError>;
    async fn dismiss(&self, id: NotificationId) -> Result<(), RepositoryError>;
}

/// Everything the roster services need from the remote store.
pub trait RosterStore:
    JobRepository
    + ApplicationRepository
    + ProfileRepository
    + DirectoryRepository
    + ReleaseRepository
    + QuizRepository
    + SettingsRepository
    + NotificationSink
    + 'static
{
}

impl<T> RosterStore for T where
    T: JobRepository
        + ApplicationRepository
        + ProfileRepository
        + DirectoryRepository
        + ReleaseRepository
        + QuizRepository
        + SettingsRepository
        + NotificationSink
        + 'static
{
}
