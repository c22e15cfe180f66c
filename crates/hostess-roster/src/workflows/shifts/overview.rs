use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::applications::lifecycle;
use super::clock::Clock;
use super::domain::{JobId, Role, UserId, YearMonth};
use super::error::ShiftServiceError;
use super::jobs::{JobService, JobSummary};
use super::repository::{RepositoryError, RosterStore};
use super::session::Session;

/// Position of one of the user's own giveaway requests in the claim queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueuePosition {
    pub job_id: JobId,
    pub title: String,
    pub starts_at: DateTime<Utc>,
    /// `None` while an emergency request waits for an administrator.
    pub rank: Option<usize>,
    pub queue_length: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StaffOverview {
    pub user_id: UserId,
    pub jobs_completed: usize,
    /// Rounded to one decimal.
    pub hours_worked: f64,
    pub earnings: u64,
    pub strikes: u32,
    pub quiz_score: u32,
    pub quiz_total: usize,
    pub giveaways: Vec<QueuePosition>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AdminStats {
    pub staff_count: usize,
    pub upcoming_jobs: usize,
    pub pending_giveaways: usize,
    /// The next few jobs, soonest first.
    pub next_jobs: Vec<JobSummary>,
}

const NEXT_JOBS_SHOWN: usize = 5;

pub struct OverviewService<S> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
    jobs: JobService<S>,
}

impl<S> OverviewService<S>
where
    S: RosterStore,
{
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>, jobs: JobService<S>) -> Self {
        Self { store, clock, jobs }
    }

    /// Work history of `user_id`, optionally limited to jobs starting in `period`.
    pub async fn staff(
        &self,
        session: &Session,
        user_id: UserId,
        period: Option<YearMonth>,
    ) -> Result<StaffOverview, ShiftServiceError> {
        if user_id != session.user_id {
            session.require_admin("viewing another user's overview")?;
        }

        let now = self.clock.now();
        let profile = self
            .store
            .fetch_profile(user_id)
            .await?
            .ok_or(ShiftServiceError::Repository(RepositoryError::NotFound))?;
        let hourly_rate = self.jobs.hourly_rate().await?;
        let quiz_total = self.store.questions().await?.len();

        let mut minutes = 0i64;
        let mut jobs_completed = 0usize;
        let mut giveaways = Vec::new();

        for application in self.store.applications_for_user(user_id).await? {
            if !application.is_approved() {
                continue;
            }
            let Some(job) = self.store.fetch_job(application.job_id).await? else {
                continue;
            };

            if application.has_pending_giveaway() {
                let rows = self.store.applications_for_job(job.id).await?;
                let queue = lifecycle::giveaway_queue(&rows);
                let rank = queue
                    .iter()
                    .position(|queued| queued.id == application.id)
                    .map(|index| index + 1);
                giveaways.push(QueuePosition {
                    job_id: job.id,
                    title: job.title.clone(),
                    starts_at: job.starts_at,
                    rank,
                    queue_length: queue.len(),
                });
            }

            if period.is_some_and(|period| !period.contains(job.starts_at)) {
                continue;
            }
            if job.effective_end() < now {
                jobs_completed += 1;
                minutes += job.duration().num_minutes().max(0);
            }
        }

        let hours = minutes as f64 / 60.0;
        giveaways.sort_by_key(|position| position.starts_at);

        Ok(StaffOverview {
            user_id,
            jobs_completed,
            hours_worked: (hours * 10.0).round() / 10.0,
            earnings: (hours * f64::from(hourly_rate)).round() as u64,
            strikes: profile.strikes,
            quiz_score: profile.quiz_score,
            quiz_total,
            giveaways,
        })
    }

    pub async fn admin(&self, session: &Session) -> Result<AdminStats, ShiftServiceError> {
        session.require_admin("viewing the dashboard")?;
        let now = self.clock.now();

        let staff_count = self
            .store
            .profiles()
            .await?
            .iter()
            .filter(|profile| profile.role == Role::Hostess)
            .count();
        let mut upcoming = self.store.jobs_between(now, DateTime::<Utc>::MAX_UTC).await?;
        upcoming.sort_by_key(|job| job.starts_at);
        let pending_giveaways = self.store.pending_giveaways().await?.len();

        let upcoming_jobs = upcoming.len();
        let hourly_rate = self.jobs.hourly_rate().await?;
        let mut next_jobs = Vec::with_capacity(NEXT_JOBS_SHOWN);
        for job in upcoming.into_iter().take(NEXT_JOBS_SHOWN) {
            next_jobs.push(self.jobs.summarize(job, hourly_rate).await?);
        }

        Ok(AdminStats {
            staff_count,
            upcoming_jobs,
            pending_giveaways,
            next_jobs,
        })
    }
}
