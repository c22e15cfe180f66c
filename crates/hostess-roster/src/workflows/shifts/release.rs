use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info};

use super::domain::{GroupId, Job, Membership, MonthlyRelease, YearMonth};
use super::error::ShiftServiceError;
use super::repository::RosterStore;
use super::session::Session;

/// Why a month is or is not visible to a staff member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum ReleaseDecision {
    /// Current and past months are always visible.
    NotGated,
    /// Administrators see every month.
    Admin,
    Released { at: DateTime<Utc> },
    /// A release exists for the caller's group but lies in the future.
    Scheduled { at: DateTime<Utc> },
    NoRelease,
}

impl ReleaseDecision {
    pub fn is_granted(self) -> bool {
        matches!(
            self,
            ReleaseDecision::NotGated | ReleaseDecision::Admin | ReleaseDecision::Released { .. }
        )
    }
}

/// Decide whether the target month is visible to members of `groups`.
///
/// Only releases whose period equals `target` and whose group is one of the
/// caller's groups are considered.
pub fn evaluate(
    target: YearMonth,
    groups: &[GroupId],
    releases: &[MonthlyRelease],
    now: DateTime<Utc>,
) -> ReleaseDecision {
    if target <= YearMonth::of(now) {
        return ReleaseDecision::NotGated;
    }

    let matching = releases
        .iter()
        .filter(|release| release.period() == target && groups.contains(&release.group_id));

    let mut earliest_pending: Option<DateTime<Utc>> = None;
    for release in matching {
        if release.release_at <= now {
            return ReleaseDecision::Released {
                at: release.release_at,
            };
        }
        earliest_pending = Some(match earliest_pending {
            Some(at) => at.min(release.release_at),
            None => release.release_at,
        });
    }

    match earliest_pending {
        Some(at) => ReleaseDecision::Scheduled { at },
        None => ReleaseDecision::NoRelease,
    }
}

/// Admin scheduling of monthly releases plus the per-request gate check.
pub struct ReleaseScheduler<S> {
    store: Arc<S>,
}

impl<S> Clone for ReleaseScheduler<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
        }
    }
}

impl<S> ReleaseScheduler<S>
where
    S: RosterStore,
{
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Evaluated fresh on every listing; nothing is cached.
    pub async fn check(
        &self,
        session: &Session,
        target: YearMonth,
        now: DateTime<Utc>,
    ) -> Result<ReleaseDecision, ShiftServiceError> {
        if session.is_admin() {
            return Ok(ReleaseDecision::Admin);
        }
        if target <= YearMonth::of(now) {
            return Ok(ReleaseDecision::NotGated);
        }

        let groups: Vec<GroupId> = self
            .store
            .memberships_for(session.user_id)
            .await?
            .into_iter()
            .map(|membership: Membership| membership.group_id)
            .collect();
        let releases = self.store.releases_for(target).await?;
        let decision = evaluate(target, &groups, &releases, now);

        debug!(user_id = %session.user_id, year = target.year, month = target.month, ?decision, "release gate evaluated");
        Ok(decision)
    }

    /// Gate check for a single job, keyed by the month it starts in.
    pub async fn job_visible(
        &self,
        session: &Session,
        job: &Job,
        now: DateTime<Utc>,
    ) -> Result<bool, ShiftServiceError> {
        let decision = self
            .check(session, YearMonth::of(job.starts_at), now)
            .await?;
        Ok(decision.is_granted())
    }

    pub async fn list(
        &self,
        session: &Session,
        period: YearMonth,
    ) -> Result<Vec<MonthlyRelease>, ShiftServiceError> {
        session.require_admin("viewing release schedules")?;
        Ok(self.store.releases_for(period).await?)
    }

    pub async fn schedule(
        &self,
        session: &Session,
        period: YearMonth,
        group_id: GroupId,
        release_at: DateTime<Utc>,
    ) -> Result<MonthlyRelease, ShiftServiceError> {
        session.require_admin("scheduling releases")?;
        let release = MonthlyRelease {
            year: period.year,
            month: period.month,
            group_id,
            release_at,
        };
        self.store.upsert_release(release.clone()).await?;
        info!(year = period.year, month = period.month, group_id = %group_id, %release_at, "release scheduled");
        Ok(release)
    }

    pub async fn clear(
        &self,
        session: &Session,
        period: YearMonth,
        group_id: GroupId,
    ) -> Result<(), ShiftServiceError> {
        session.require_admin("clearing releases")?;
        self.store.delete_release(period, group_id).await?;
        info!(year = period.year, month = period.month, group_id = %group_id, "release cleared");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 15, 9, 30, 0).unwrap()
    }

    fn release(group: GroupId, year: i32, month: u32, at: DateTime<Utc>) -> MonthlyRelease {
        MonthlyRelease {
            year,
            month,
            group_id: group,
            release_at: at,
        }
    }

    #[test]
    fn future_month_opens_once_release_passes() {
        let group = GroupId::new();
        let april = YearMonth::new(2024, 4).unwrap();
        let released = release(group, 2024, 4, Utc.with_ymd_and_hms(2024, 3, 14, 8, 0, 0).unwrap());

        let decision = evaluate(april, &[group], &[released.clone()], now());
        assert!(decision.is_granted());

        let pending = release(group, 2024, 4, Utc.with_ymd_and_hms(2024, 3, 20, 8, 0, 0).unwrap());
        let decision = evaluate(april, &[group], &[pending], now());
        assert!(!decision.is_granted());
        assert!(matches!(decision, ReleaseDecision::Scheduled { .. }));

        let exactly_now = release(group, 2024, 4, now());
        assert!(evaluate(april, &[group], &[exactly_now], now()).is_granted());
    }

    #[test]
    fn current_and_past_months_are_never_gated() {
        let march = YearMonth::new(2024, 3).unwrap();
        let january = YearMonth::new(2024, 1).unwrap();
        assert_eq!(evaluate(march, &[], &[], now()), ReleaseDecision::NotGated);
        assert_eq!(evaluate(january, &[], &[], now()), ReleaseDecision::NotGated);
    }

    #[test]
    fn future_month_without_release_is_denied() {
        let april = YearMonth::new(2024, 4).unwrap();
        assert_eq!(
            evaluate(april, &[GroupId::new()], &[], now()),
            ReleaseDecision::NoRelease
        );
    }

    #[test]
    fn releases_for_other_groups_do_not_count() {
        let mine = GroupId::new();
        let theirs = GroupId::new();
        let april = YearMonth::new(2024, 4).unwrap();
        let other = release(theirs, 2024, 4, Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap());
        assert_eq!(
            evaluate(april, &[mine], &[other], now()),
            ReleaseDecision::NoRelease
        );
    }

    #[test]
    fn next_year_january_is_future() {
        let december_now = Utc.with_ymd_and_hms(2024, 12, 20, 0, 0, 0).unwrap();
        let january = YearMonth::new(2025, 1).unwrap();
        assert_eq!(
            evaluate(january, &[GroupId::new()], &[], december_now),
            ReleaseDecision::NoRelease
        );
    }
}
