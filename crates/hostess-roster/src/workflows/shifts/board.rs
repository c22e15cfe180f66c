use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;

use super::applications::ApplicationState;
use super::clock::Clock;
use super::domain::{ApplicationId, Profile, UserId, YearMonth};
use super::error::ShiftServiceError;
use super::jobs::{JobMetrics, JobService, JobSummary};
use super::release::{ReleaseDecision, ReleaseScheduler};
use super::repository::RosterStore;
use super::session::Session;

#[derive(Debug, Clone, Serialize)]
pub struct AssignedStaff {
    pub user_id: UserId,
    pub full_name: String,
}

/// A job as seen by one caller.
#[derive(Debug, Clone, Serialize)]
pub struct BoardJob {
    #[serde(flatten)]
    pub summary: JobSummary,
    pub my_state: ApplicationState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub my_application_id: Option<ApplicationId>,
    /// Some approved holder asked to give the shift away (normal or emergency).
    pub has_giveaway_requests: bool,
    /// The caller could take over a released spot right now.
    pub claimable: bool,
    pub assigned: Vec<AssignedStaff>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MonthlyBoard {
    pub year: i32,
    pub month: u32,
    pub released: bool,
    pub release: ReleaseDecision,
    pub jobs: Vec<BoardJob>,
}

/// Monthly job listing for a session: release gate, derived metrics and own state.
pub struct ShiftBoard<S> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
    jobs: JobService<S>,
    releases: ReleaseScheduler<S>,
}

impl<S> ShiftBoard<S>
where
    S: RosterStore,
{
    pub fn new(
        store: Arc<S>,
        clock: Arc<dyn Clock>,
        jobs: JobService<S>,
        releases: ReleaseScheduler<S>,
    ) -> Self {
        Self {
            store,
            clock,
            jobs,
            releases,
        }
    }

    pub async fn month(
        &self,
        session: &Session,
        period: YearMonth,
    ) -> Result<MonthlyBoard, ShiftServiceError> {
        let now = self.clock.now();
        let release = self.releases.check(session, period, now).await?;
        if !release.is_granted() {
            return Ok(MonthlyBoard {
                year: period.year,
                month: period.month,
                released: false,
                release,
                jobs: Vec::new(),
            });
        }

        let hourly_rate = self.jobs.hourly_rate().await?;
        let names: HashMap<UserId, Profile> = self
            .store
            .profiles()
            .await?
            .into_iter()
            .map(|profile| (profile.id, profile))
            .collect();

        let mut jobs = Vec::new();
        for job in self.jobs.jobs_in(period).await? {
            if !job.is_active && !session.is_admin() {
                continue;
            }

            let applications = self.store.applications_for_job(job.id).await?;
            let approved: Vec<_> = applications.iter().filter(|app| app.is_approved()).collect();
            let mine = applications
                .iter()
                .find(|app| app.user_id == session.user_id);

            let has_giveaway_requests = approved.iter().any(|app| app.has_pending_giveaway());
            let claimable = mine.is_none() && approved.iter().any(|app| app.give_away_requested);
            let assigned = approved
                .iter()
                .map(|app| AssignedStaff {
                    user_id: app.user_id,
                    full_name: names
                        .get(&app.user_id)
                        .map(|profile| profile.full_name.clone())
                        .unwrap_or_default(),
                })
                .collect();

            let metrics = JobMetrics::compute(&job, approved.len() as u32, now, hourly_rate);
            jobs.push(BoardJob {
                my_state: ApplicationState::of(mine),
                my_application_id: mine.map(|app| app.id),
                has_giveaway_requests,
                claimable,
                assigned,
                summary: JobSummary { job, metrics },
            });
        }

        Ok(MonthlyBoard {
            year: period.year,
            month: period.month,
            released: true,
            release,
            jobs,
        })
    }
}
