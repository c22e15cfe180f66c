use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info};

use super::clock::Clock;
use super::domain::{Job, JobDraft, JobId, YearMonth, URGENT_WINDOW_HOURS};
use super::error::{ShiftServiceError, ValidationError};
use super::release::ReleaseScheduler;
use super::repository::{RepositoryError, RosterStore};
use super::session::Session;
use crate::config::RosterConfig;

/// Read-time facts about a job. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct JobMetrics {
    pub slots_taken: u32,
    pub slots_total: u32,
    pub duration_minutes: i64,
    pub hours_until_start: f64,
    pub is_full: bool,
    pub is_urgent: bool,
    pub is_ongoing: bool,
    pub estimated_pay: u64,
    pub fill_ratio: f32,
}

impl JobMetrics {
    pub fn compute(job: &Job, slots_taken: u32, now: DateTime<Utc>, hourly_rate: u32) -> Self {
        let duration = job.duration();
        let duration_hours = duration.num_minutes() as f64 / 60.0;
        let hours_until_start = job.hours_until_start(now);
        let is_full = slots_taken >= job.slots_total;
        let is_urgent =
            hours_until_start > 0.0 && hours_until_start <= URGENT_WINDOW_HOURS && !is_full;
        let is_ongoing = now >= job.starts_at && now <= job.effective_end();
        let estimated_pay = (duration_hours * f64::from(hourly_rate)).round().max(0.0) as u64;
        let fill_ratio = if job.slots_total == 0 {
            1.0
        } else {
            slots_taken as f32 / job.slots_total as f32
        };

        Self {
            slots_taken,
            slots_total: job.slots_total,
            duration_minutes: duration.num_minutes(),
            hours_until_start,
            is_full,
            is_urgent,
            is_ongoing,
            estimated_pay,
            fill_ratio,
        }
    }
}

/// Job paired with its derived metrics.
#[derive(Debug, Clone, Serialize)]
pub struct JobSummary {
    #[serde(flatten)]
    pub job: Job,
    pub metrics: JobMetrics,
}

pub fn validate_draft(draft: &JobDraft) -> Result<(), ValidationError> {
    if draft.title.trim().is_empty() {
        return Err(ValidationError::Empty { field: "title" });
    }
    if draft.slots_total == 0 {
        return Err(ValidationError::NoSlots);
    }
    if let Some(end) = draft.ends_at {
        if end <= draft.starts_at {
            return Err(ValidationError::EndNotAfterStart);
        }
    }
    Ok(())
}

/// Admin job management plus month listings.
pub struct JobService<S> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
    config: RosterConfig,
}

impl<S> Clone for JobService<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            clock: self.clock.clone(),
            config: self.config,
        }
    }
}

impl<S> JobService<S>
where
    S: RosterStore,
{
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>, config: RosterConfig) -> Self {
        Self {
            store,
            clock,
            config,
        }
    }

    /// Stored rate, or the configured default when none is set.
    pub async fn hourly_rate(&self) -> Result<u32, ShiftServiceError> {
        Ok(self
            .store
            .hourly_rate()
            .await?
            .unwrap_or(self.config.default_hourly_rate))
    }

    pub async fn set_hourly_rate(
        &self,
        session: &Session,
        rate: u32,
    ) -> Result<(), ShiftServiceError> {
        session.require_admin("changing the hourly rate")?;
        if rate == 0 {
            return Err(ValidationError::InvalidHourlyRate.into());
        }
        self.store.set_hourly_rate(rate).await?;
        info!(rate, "hourly rate updated");
        Ok(())
    }

    pub async fn create(&self, session: &Session, draft: JobDraft) -> Result<Job, ShiftServiceError> {
        session.require_admin("creating jobs")?;
        validate_draft(&draft)?;

        let job = Job {
            id: JobId::new(),
            title: draft.title.trim().to_string(),
            starts_at: draft.starts_at,
            ends_at: draft.ends_at,
            location: draft.location.trim().to_string(),
            slots_total: draft.slots_total,
            description: draft.description,
            is_active: true,
            created_by: Some(session.user_id),
            created_at: self.clock.now(),
        };

        let stored = self.store.insert_job(job).await?;
        info!(job_id = %stored.id, title = %stored.title, starts_at = %stored.starts_at, "job created");
        Ok(stored)
    }

    pub async fn update(
        &self,
        session: &Session,
        id: JobId,
        draft: JobDraft,
    ) -> Result<Job, ShiftServiceError> {
        session.require_admin("editing jobs")?;
        validate_draft(&draft)?;

        let mut job = self.require(id).await?;
        job.title = draft.title.trim().to_string();
        job.starts_at = draft.starts_at;
        job.ends_at = draft.ends_at;
        job.location = draft.location.trim().to_string();
        job.slots_total = draft.slots_total;
        job.description = draft.description;

        self.store.update_job(job.clone()).await?;
        info!(job_id = %job.id, "job updated");
        Ok(job)
    }

    pub async fn delete(&self, session: &Session, id: JobId) -> Result<(), ShiftServiceError> {
        session.require_admin("deleting jobs")?;
        self.store.delete_job(id).await?;
        info!(job_id = %id, "job deleted");
        Ok(())
    }

    pub async fn toggle_active(
        &self,
        session: &Session,
        id: JobId,
    ) -> Result<Job, ShiftServiceError> {
        session.require_admin("toggling jobs")?;
        let mut job = self.require(id).await?;
        job.is_active = !job.is_active;
        self.store.update_job(job.clone()).await?;
        info!(job_id = %job.id, is_active = job.is_active, "job visibility toggled");
        Ok(job)
    }

    /// Jobs in months not yet released to the caller read as missing.
    pub async fn get(&self, session: &Session, id: JobId) -> Result<JobSummary, ShiftServiceError> {
        let job = self.require(id).await?;
        let visible = ReleaseScheduler::new(self.store.clone())
            .job_visible(session, &job, self.clock.now())
            .await?;
        if !visible {
            debug!(job_id = %id, user_id = %session.user_id, "job hidden by release gate");
            return Err(RepositoryError::NotFound.into());
        }
        let rate = self.hourly_rate().await?;
        self.summarize(job, rate).await
    }

    /// Every job starting in the month, ascending by start.
    pub async fn list(&self, period: YearMonth) -> Result<Vec<JobSummary>, ShiftServiceError> {
        let jobs = self.jobs_in(period).await?;
        let rate = self.hourly_rate().await?;
        let mut summaries = Vec::with_capacity(jobs.len());
        for job in jobs {
            summaries.push(self.summarize(job, rate).await?);
        }
        Ok(summaries)
    }

    pub(crate) async fn jobs_in(&self, period: YearMonth) -> Result<Vec<Job>, ShiftServiceError> {
        let mut jobs = self
            .store
            .jobs_between(period.start(), period.next().start())
            .await?;
        jobs.sort_by_key(|job| job.starts_at);
        Ok(jobs)
    }

    pub(crate) async fn summarize(
        &self,
        job: Job,
        hourly_rate: u32,
    ) -> Result<JobSummary, ShiftServiceError> {
        let slots_taken = self.store.count_approved(job.id).await?;
        let metrics = JobMetrics::compute(&job, slots_taken, self.clock.now(), hourly_rate);
        Ok(JobSummary { job, metrics })
    }

    async fn require(&self, id: JobId) -> Result<Job, ShiftServiceError> {
        self.store
            .fetch_job(id)
            .await?
            .ok_or(ShiftServiceError::Repository(RepositoryError::NotFound))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn job_starting(start: DateTime<Utc>, hours: Option<i64>, slots: u32) -> Job {
        Job {
            id: JobId::new(),
            title: "Concert".to_string(),
            starts_at: start,
            ends_at: hours.map(|h| start + Duration::hours(h)),
            location: "Hall".to_string(),
            slots_total: slots,
            description: String::new(),
            is_active: true,
            created_by: None,
            created_at: start,
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 15, 12, 0, 0).unwrap()
    }

    #[test]
    fn urgent_requires_open_slots_inside_window() {
        let job = job_starting(now() + Duration::hours(30), Some(5), 2);
        assert!(JobMetrics::compute(&job, 1, now(), 1500).is_urgent);
        assert!(!JobMetrics::compute(&job, 2, now(), 1500).is_urgent);

        let later = job_starting(now() + Duration::hours(49), Some(5), 2);
        assert!(!JobMetrics::compute(&later, 0, now(), 1500).is_urgent);

        let started = job_starting(now() - Duration::hours(1), Some(5), 2);
        let metrics = JobMetrics::compute(&started, 0, now(), 1500);
        assert!(!metrics.is_urgent);
        assert!(metrics.is_ongoing);
    }

    #[test]
    fn pay_rounds_fractional_hours() {
        let start = now() + Duration::days(3);
        let mut job = job_starting(start, None, 1);
        job.ends_at = Some(start + Duration::minutes(270));
        let metrics = JobMetrics::compute(&job, 0, now(), 1500);
        assert_eq!(metrics.duration_minutes, 270);
        assert_eq!(metrics.estimated_pay, 6750);
    }

    #[test]
    fn default_duration_applies_to_pay() {
        let job = job_starting(now() + Duration::days(3), None, 4);
        let metrics = JobMetrics::compute(&job, 1, now(), 1500);
        assert_eq!(metrics.estimated_pay, 6000);
        assert!((metrics.fill_ratio - 0.25).abs() < f32::EPSILON);
    }

    #[test]
    fn draft_validation_rejects_inverted_range() {
        let start = now();
        let draft = JobDraft {
            title: "Gala".to_string(),
            starts_at: start,
            ends_at: Some(start),
            location: String::new(),
            slots_total: 2,
            description: String::new(),
        };
        assert_eq!(validate_draft(&draft), Err(ValidationError::EndNotAfterStart));

        let no_slots = JobDraft {
            ends_at: None,
            slots_total: 0,
            ..draft.clone()
        };
        assert_eq!(validate_draft(&no_slots), Err(ValidationError::NoSlots));

        let blank = JobDraft {
            title: "  ".to_string(),
            ends_at: None,
            ..draft
        };
        assert_eq!(
            validate_draft(&blank),
            Err(ValidationError::Empty { field: "title" })
        );
    }
}
