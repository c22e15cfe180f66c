//! In-process store used by the service binary, the demo and the tests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::domain::{
    Application, ApplicationId, ApplicationStatus, Group, GroupId, Job, JobId, Location,
    LocationId, Membership, MonthlyRelease, NewNotification, Notification, NotificationId,
    Profile, QuestionId, QuizQuestion, UserId, YearMonth,
};
use super::repository::{
    ApplicationRepository, ClaimOutcome, ClaimedSpot, DirectoryRepository, JobRepository,
    NotificationSink, ProfileRepository, QuizRepository, ReleaseRepository, RepositoryError,
    SettingsRepository,
};

#[derive(Debug, Default)]
struct Tables {
    jobs: Vec<Job>,
    applications: Vec<Application>,
    profiles: Vec<Profile>,
    locations: Vec<Location>,
    groups: Vec<Group>,
    memberships: Vec<Membership>,
    releases: Vec<MonthlyRelease>,
    questions: Vec<QuizQuestion>,
    hourly_rate: Option<u32>,
    notifications: Vec<Notification>,
}

/// Every table behind one mutex; the lock is never held across an await.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
    unavailable: Arc<AtomicBool>,
    outbox_unavailable: Arc<AtomicBool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate an unreachable backend: every call fails with `Unavailable`.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Make only notification delivery fail; every other table keeps working.
    pub fn set_outbox_unavailable(&self, unavailable: bool) {
        self.outbox_unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Profiles are created by the auth backend; this stands in for sign-up.
    pub fn insert_profile(&self, profile: Profile) -> Result<Profile, RepositoryError> {
        let mut tables = self.tables()?;
        if tables.profiles.iter().any(|existing| existing.id == profile.id) {
            return Err(RepositoryError::Conflict);
        }
        tables.profiles.push(profile.clone());
        Ok(profile)
    }

    fn tables(&self) -> Result<MutexGuard<'_, Tables>, RepositoryError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(RepositoryError::Unavailable("store offline".to_string()));
        }
        self.tables
            .lock()
            .map_err(|_| RepositoryError::Unavailable("store mutex poisoned".to_string()))
    }
}

#[async_trait]
impl JobRepository for MemoryStore {
    async fn insert_job(&self, job: Job) -> Result<Job, RepositoryError> {
        let mut tables = self.tables()?;
        if tables.jobs.iter().any(|existing| existing.id == job.id) {
            return Err(RepositoryError::Conflict);
        }
        tables.jobs.push(job.clone());
        Ok(job)
    }

    async fn update_job(&self, job: Job) -> Result<(), RepositoryError> {
        let mut tables = self.tables()?;
        let slot = tables
            .jobs
            .iter_mut()
            .find(|existing| existing.id == job.id)
            .ok_or(RepositoryError::NotFound)?;
        *slot = job;
        Ok(())
    }

    async fn delete_job(&self, id: JobId) -> Result<(), RepositoryError> {
        let mut tables = self.tables()?;
        let before = tables.jobs.len();
        tables.jobs.retain(|job| job.id != id);
        if tables.jobs.len() == before {
            return Err(RepositoryError::NotFound);
        }
        tables.applications.retain(|application| application.job_id != id);
        Ok(())
    }

    async fn fetch_job(&self, id: JobId) -> Result<Option<Job>, RepositoryError> {
        let tables = self.tables()?;
        Ok(tables.jobs.iter().find(|job| job.id == id).cloned())
    }

    async fn jobs_between(
        &self,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<Job>, RepositoryError> {
        let tables = self.tables()?;
        let mut jobs: Vec<Job> = tables
            .jobs
            .iter()
            .filter(|job| job.starts_at >= from && job.starts_at < until)
            .cloned()
            .collect();
        jobs.sort_by_key(|job| job.starts_at);
        Ok(jobs)
    }
}

#[async_trait]
impl ApplicationRepository for MemoryStore {
    async fn insert_application(
        &self,
        application: Application,
    ) -> Result<Application, RepositoryError> {
        let mut tables = self.tables()?;
        if !tables.jobs.iter().any(|job| job.id == application.job_id) {
            return Err(RepositoryError::NotFound);
        }
        let duplicate = tables.applications.iter().any(|existing| {
            existing.id == application.id
                || (existing.job_id == application.job_id && existing.user_id == application.user_id)
        });
        if duplicate {
            return Err(RepositoryError::Conflict);
        }
        tables.applications.push(application.clone());
        Ok(application)
    }

    async fn fetch_application(
        &self,
        id: ApplicationId,
    ) -> Result<Option<Application>, RepositoryError> {
        let tables = self.tables()?;
        Ok(tables
            .applications
            .iter()
            .find(|application| application.id == id)
            .cloned())
    }

    async fn application_for(
        &self,
        job_id: JobId,
        user_id: UserId,
    ) -> Result<Option<Application>, RepositoryError> {
        let tables = self.tables()?;
        Ok(tables
            .applications
            .iter()
            .find(|application| application.job_id == job_id && application.user_id == user_id)
            .cloned())
    }

    async fn applications_for_job(
        &self,
        job_id: JobId,
    ) -> Result<Vec<Application>, RepositoryError> {
        let tables = self.tables()?;
        let mut rows: Vec<Application> = tables
            .applications
            .iter()
            .filter(|application| application.job_id == job_id)
            .cloned()
            .collect();
        rows.sort_by_key(|application| application.created_at);
        Ok(rows)
    }

    async fn applications_for_user(
        &self,
        user_id: UserId,
    ) -> Result<Vec<Application>, RepositoryError> {
        let tables = self.tables()?;
        let mut rows: Vec<Application> = tables
            .applications
            .iter()
            .filter(|application| application.user_id == user_id)
            .cloned()
            .collect();
        rows.sort_by_key(|application| application.created_at);
        Ok(rows)
    }

    async fn pending_giveaways(&self) -> Result<Vec<Application>, RepositoryError> {
        let tables = self.tables()?;
        let mut rows: Vec<Application> = tables
            .applications
            .iter()
            .filter(|application| application.is_approved() && application.has_pending_giveaway())
            .cloned()
            .collect();
        rows.sort_by_key(|application| application.give_away_requested_at);
        Ok(rows)
    }

    async fn count_approved(&self, job_id: JobId) -> Result<u32, RepositoryError> {
        let tables = self.tables()?;
        Ok(tables
            .applications
            .iter()
            .filter(|application| application.job_id == job_id && application.is_approved())
            .count() as u32)
    }

    async fn replace_application(
        &self,
        expected: &Application,
        next: Application,
    ) -> Result<Application, RepositoryError> {
        let mut tables = self.tables()?;
        let slot = tables
            .applications
            .iter_mut()
            .find(|application| application.id == expected.id)
            .ok_or(RepositoryError::NotFound)?;
        if *slot != *expected || next.id != expected.id {
            return Err(RepositoryError::Stale);
        }
        *slot = next.clone();
        Ok(next)
    }

    async fn delete_application(&self, id: ApplicationId) -> Result<(), RepositoryError> {
        let mut tables = self.tables()?;
        let before = tables.applications.len();
        tables.applications.retain(|application| application.id != id);
        if tables.applications.len() == before {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn claim_giveaway_spot(
        &self,
        job_id: JobId,
        claimant: UserId,
        now: DateTime<Utc>,
    ) -> Result<ClaimOutcome, RepositoryError> {
        let mut tables = self.tables()?;

        if !tables.jobs.iter().any(|job| job.id == job_id) {
            return Ok(ClaimOutcome::rejected("job no longer exists"));
        }
        if tables
            .applications
            .iter()
            .any(|application| application.job_id == job_id && application.user_id == claimant)
        {
            return Ok(ClaimOutcome::rejected("you are already on this job"));
        }

        let candidate = tables
            .applications
            .iter()
            .enumerate()
            .filter(|(_, application)| application.job_id == job_id && application.is_claimable())
            .min_by_key(|(_, application)| (application.give_away_requested_at, application.created_at))
            .map(|(index, _)| index);
        let Some(index) = candidate else {
            return Ok(ClaimOutcome::rejected("no shift is up for grabs"));
        };

        let vacated = tables.applications.remove(index);
        let application = Application::new(job_id, claimant, ApplicationStatus::Approved, now);
        tables.applications.push(application.clone());

        Ok(ClaimOutcome {
            success: true,
            message: "shift claimed".to_string(),
            claimed: Some(ClaimedSpot {
                vacated,
                application,
            }),
        })
    }
}

#[async_trait]
impl ProfileRepository for MemoryStore {
    async fn fetch_profile(&self, id: UserId) -> Result<Option<Profile>, RepositoryError> {
        let tables = self.tables()?;
        Ok(tables.profiles.iter().find(|profile| profile.id == id).cloned())
    }

    async fn profiles(&self) -> Result<Vec<Profile>, RepositoryError> {
        let tables = self.tables()?;
        let mut profiles = tables.profiles.clone();
        profiles.sort_by(|a, b| a.full_name.cmp(&b.full_name));
        Ok(profiles)
    }

    async fn update_profile(&self, profile: Profile) -> Result<(), RepositoryError> {
        let mut tables = self.tables()?;
        let slot = tables
            .profiles
            .iter_mut()
            .find(|existing| existing.id == profile.id)
            .ok_or(RepositoryError::NotFound)?;
        *slot = profile;
        Ok(())
    }
}

#[async_trait]
impl DirectoryRepository for MemoryStore {
    async fn locations(&self) -> Result<Vec<Location>, RepositoryError> {
        Ok(self.tables()?.locations.clone())
    }

    async fn insert_location(&self, location: Location) -> Result<Location, RepositoryError> {
        let mut tables = self.tables()?;
        if tables.locations.iter().any(|existing| existing.name == location.name) {
            return Err(RepositoryError::Conflict);
        }
        tables.locations.push(location.clone());
        Ok(location)
    }

    async fn delete_location(&self, id: LocationId) -> Result<(), RepositoryError> {
        let mut tables = self.tables()?;
        let before = tables.locations.len();
        tables.locations.retain(|location| location.id != id);
        if tables.locations.len() == before {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn groups(&self) -> Result<Vec<Group>, RepositoryError> {
        Ok(self.tables()?.groups.clone())
    }

    async fn insert_group(&self, group: Group) -> Result<Group, RepositoryError> {
        let mut tables = self.tables()?;
        if tables.groups.iter().any(|existing| existing.id == group.id) {
            return Err(RepositoryError::Conflict);
        }
        tables.groups.push(group.clone());
        Ok(group)
    }

    async fn delete_group(&self, id: GroupId) -> Result<(), RepositoryError> {
        let mut tables = self.tables()?;
        let before = tables.groups.len();
        tables.groups.retain(|group| group.id != id);
        if tables.groups.len() == before {
            return Err(RepositoryError::NotFound);
        }
        tables.memberships.retain(|membership| membership.group_id != id);
        tables.releases.retain(|release| release.group_id != id);
        Ok(())
    }

    async fn memberships_for(&self, user_id: UserId) -> Result<Vec<Membership>, RepositoryError> {
        let tables = self.tables()?;
        Ok(tables
            .memberships
            .iter()
            .filter(|membership| membership.user_id == user_id)
            .copied()
            .collect())
    }

    async fn memberships(&self) -> Result<Vec<Membership>, RepositoryError> {
        Ok(self.tables()?.memberships.clone())
    }

    async fn replace_memberships(&self, membership: Membership) -> Result<(), RepositoryError> {
        let mut tables = self.tables()?;
        if !tables.groups.iter().any(|group| group.id == membership.group_id) {
            return Err(RepositoryError::NotFound);
        }
        tables
            .memberships
            .retain(|existing| existing.user_id != membership.user_id);
        tables.memberships.push(membership);
        Ok(())
    }

    async fn remove_membership(&self, membership: Membership) -> Result<(), RepositoryError> {
        let mut tables = self.tables()?;
        tables.memberships.retain(|existing| *existing != membership);
        Ok(())
    }
}

#[async_trait]
impl ReleaseRepository for MemoryStore {
    async fn releases_for(
        &self,
        period: YearMonth,
    ) -> Result<Vec<MonthlyRelease>, RepositoryError> {
        let tables = self.tables()?;
        Ok(tables
            .releases
            .iter()
            .filter(|release| release.period() == period)
            .cloned()
            .collect())
    }

    async fn upsert_release(&self, release: MonthlyRelease) -> Result<(), RepositoryError> {
        let mut tables = self.tables()?;
        if !tables.groups.iter().any(|group| group.id == release.group_id) {
            return Err(RepositoryError::NotFound);
        }
        match tables
            .releases
            .iter_mut()
            .find(|existing| existing.period() == release.period() && existing.group_id == release.group_id)
        {
            Some(existing) => existing.release_at = release.release_at,
            None => tables.releases.push(release),
        }
        Ok(())
    }

    async fn delete_release(
        &self,
        period: YearMonth,
        group_id: GroupId,
    ) -> Result<(), RepositoryError> {
        let mut tables = self.tables()?;
        tables
            .releases
            .retain(|release| !(release.period() == period && release.group_id == group_id));
        Ok(())
    }
}

#[async_trait]
impl QuizRepository for MemoryStore {
    async fn questions(&self) -> Result<Vec<QuizQuestion>, RepositoryError> {
        let mut questions = self.tables()?.questions.clone();
        questions.sort_by_key(|question| question.created_at);
        Ok(questions)
    }

    async fn insert_question(
        &self,
        question: QuizQuestion,
    ) -> Result<QuizQuestion, RepositoryError> {
        let mut tables = self.tables()?;
        if tables.questions.iter().any(|existing| existing.id == question.id) {
            return Err(RepositoryError::Conflict);
        }
        tables.questions.push(question.clone());
        Ok(question)
    }

    async fn update_question(&self, question: QuizQuestion) -> Result<(), RepositoryError> {
        let mut tables = self.tables()?;
        let slot = tables
            .questions
            .iter_mut()
            .find(|existing| existing.id == question.id)
            .ok_or(RepositoryError::NotFound)?;
        *slot = question;
        Ok(())
    }

    async fn delete_question(&self, id: QuestionId) -> Result<(), RepositoryError> {
        let mut tables = self.tables()?;
        let before = tables.questions.len();
        tables.questions.retain(|question| question.id != id);
        if tables.questions.len() == before {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}

#[async_trait]
impl SettingsRepository for MemoryStore {
    async fn hourly_rate(&self) -> Result<Option<u32>, RepositoryError> {
        Ok(self.tables()?.hourly_rate)
    }

    async fn set_hourly_rate(&self, rate: u32) -> Result<(), RepositoryError> {
        self.tables()?.hourly_rate = Some(rate);
        Ok(())
    }
}

#[async_trait]
impl NotificationSink for MemoryStore {
    async fn publish(
        &self,
        notification: NewNotification,
    ) -> Result<Notification, RepositoryError> {
        if self.outbox_unavailable.load(Ordering::SeqCst) {
            return Err(RepositoryError::Unavailable("notification outbox offline".to_string()));
        }
        let mut tables = self.tables()?;
        let stored = Notification {
            id: NotificationId::new(),
            user_id: notification.user_id,
            kind: notification.kind,
            message: notification.message,
            related_job_id: notification.related_job_id,
            related_application_id: notification.related_application_id,
            read: false,
            created_at: Utc::now(),
        };
        tables.notifications.push(stored.clone());
        Ok(stored)
    }

    async fn notifications_for(
        &self,
        user_id: UserId,
    ) -> Result<Vec<Notification>, RepositoryError> {
        let tables = self.tables()?;
        Ok(tables
            .notifications
            .iter()
            .rev()
            .filter(|notification| notification.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn unread_count(&self, user_id: UserId) -> Result<usize, RepositoryError> {
        let tables = self.tables()?;
        Ok(tables
            .notifications
            .iter()
            .filter(|notification| notification.user_id == user_id && !notification.read)
            .count())
    }

    async fn mark_all_read(&self, user_id: UserId) -> Result<usize, RepositoryError> {
        let mut tables = self.tables()?;
        let mut updated = 0;
        for notification in tables
            .notifications
            .iter_mut()
            .filter(|notification| notification.user_id == user_id && !notification.read)
        {
            notification.read = true;
            updated += 1;
        }
        Ok(updated)
    }

    async fn fetch_notification(
        &self,
        id: NotificationId,
    ) -> Result<Option<Notification>, RepositoryError> {
        let tables = self.tables()?;
        Ok(tables
            .notifications
            .iter()
            .find(|notification| notification.id == id)
            .cloned())
    }

    async fn dismiss(&self, id: NotificationId) -> Result<(), RepositoryError> {
        let mut tables = self.tables()?;
        tables.notifications.retain(|notification| notification.id != id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::shifts::domain::Role;
    use chrono::{Duration, TimeZone};

    fn job(start: DateTime<Utc>) -> Job {
        Job {
            id: JobId::new(),
            title: "Gala".to_string(),
            starts_at: start,
            ends_at: None,
            location: "Opera".to_string(),
            slots_total: 2,
            description: String::new(),
            is_active: true,
            created_by: None,
            created_at: start - Duration::days(30),
        }
    }

    fn requested(job_id: JobId, at: DateTime<Utc>) -> Application {
        let mut application =
            Application::new(job_id, UserId::new(), ApplicationStatus::Approved, at);
        application.give_away_requested = true;
        application.give_away_requested_at = Some(at);
        application
    }

    #[tokio::test]
    async fn claim_takes_oldest_request_first() {
        let store = MemoryStore::new();
        let start = Utc.with_ymd_and_hms(2024, 5, 10, 18, 0, 0).unwrap();
        let job = store.insert_job(job(start)).await.unwrap();

        let newer = requested(job.id, start - Duration::days(3));
        let older = requested(job.id, start - Duration::days(5));
        store.insert_application(newer.clone()).await.unwrap();
        store.insert_application(older.clone()).await.unwrap();

        let claimant = UserId::new();
        let outcome = store
            .claim_giveaway_spot(job.id, claimant, start - Duration::days(2))
            .await
            .unwrap();

        assert!(outcome.success);
        let claimed = outcome.claimed.unwrap();
        assert_eq!(claimed.vacated.id, older.id);
        assert_eq!(claimed.application.user_id, claimant);
        assert_eq!(store.count_approved(job.id).await.unwrap(), 2);
        assert!(store.fetch_application(older.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn claim_rejects_holders_and_empty_queues() {
        let store = MemoryStore::new();
        let start = Utc.with_ymd_and_hms(2024, 5, 10, 18, 0, 0).unwrap();
        let job = store.insert_job(job(start)).await.unwrap();

        let outcome = store
            .claim_giveaway_spot(job.id, UserId::new(), start)
            .await
            .unwrap();
        assert!(!outcome.success);

        let own = requested(job.id, start - Duration::days(4));
        store.insert_application(own.clone()).await.unwrap();
        let outcome = store
            .claim_giveaway_spot(job.id, own.user_id, start)
            .await
            .unwrap();
        assert!(!outcome.success);
        assert!(outcome.claimed.is_none());
    }

    #[tokio::test]
    async fn replace_is_compare_and_set() {
        let store = MemoryStore::new();
        let start = Utc.with_ymd_and_hms(2024, 5, 10, 18, 0, 0).unwrap();
        let job = store.insert_job(job(start)).await.unwrap();
        let row = Application::new(job.id, UserId::new(), ApplicationStatus::Invited, start);
        store.insert_application(row.clone()).await.unwrap();

        let accepted = Application {
            status: ApplicationStatus::Approved,
            ..row.clone()
        };
        store.replace_application(&row, accepted.clone()).await.unwrap();

        let err = store.replace_application(&row, accepted).await.unwrap_err();
        assert!(matches!(err, RepositoryError::Stale));
    }

    #[tokio::test]
    async fn deleting_group_cascades() {
        let store = MemoryStore::new();
        let profile = store
            .insert_profile(Profile::new("Anna", "anna@example.com", Role::Hostess))
            .unwrap();
        let group = store
            .insert_group(Group {
                id: GroupId::new(),
                name: "A".to_string(),
            })
            .await
            .unwrap();
        store
            .replace_memberships(Membership {
                user_id: profile.id,
                group_id: group.id,
            })
            .await
            .unwrap();
        store
            .upsert_release(MonthlyRelease {
                year: 2024,
                month: 6,
                group_id: group.id,
                release_at: Utc::now(),
            })
            .await
            .unwrap();

        store.delete_group(group.id).await.unwrap();
        assert!(store.memberships_for(profile.id).await.unwrap().is_empty());
        let june = YearMonth::new(2024, 6).unwrap();
        assert!(store.releases_for(june).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn offline_store_reports_unavailable() {
        let store = MemoryStore::new();
        store.set_unavailable(true);
        let err = store.profiles().await.unwrap_err();
        assert!(matches!(err, RepositoryError::Unavailable(_)));
    }
}
