use std::sync::Arc;

use super::applications::ShiftApplicationService;
use super::board::ShiftBoard;
use super::clock::Clock;
use super::directory::DirectoryService;
use super::domain::UserId;
use super::error::ShiftServiceError;
use super::jobs::JobService;
use super::notifications::NotificationInbox;
use super::overview::OverviewService;
use super::quiz::QuizService;
use super::release::ReleaseScheduler;
use super::repository::RosterStore;
use super::roster::RosterService;
use super::session::Session;
use crate::config::RosterConfig;

/// One store and one clock shared by every roster service.
pub struct RosterApp<S> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
    config: RosterConfig,
}

impl<S> Clone for RosterApp<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            clock: self.clock.clone(),
            config: self.config,
        }
    }
}

impl<S> RosterApp<S>
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

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub async fn session(&self, user_id: UserId) -> Result<Session, ShiftServiceError> {
        Session::restore(self.store.as_ref(), user_id).await
    }

    pub fn jobs(&self) -> JobService<S> {
        JobService::new(self.store.clone(), self.clock.clone(), self.config)
    }

    pub fn applications(&self) -> ShiftApplicationService<S> {
        ShiftApplicationService::new(self.store.clone(), self.clock.clone())
    }

    pub fn releases(&self) -> ReleaseScheduler<S> {
        ReleaseScheduler::new(self.store.clone())
    }

    pub fn board(&self) -> ShiftBoard<S> {
        ShiftBoard::new(
            self.store.clone(),
            self.clock.clone(),
            self.jobs(),
            self.releases(),
        )
    }

    pub fn roster(&self) -> RosterService<S> {
        RosterService::new(self.store.clone())
    }

    pub fn quiz(&self) -> QuizService<S> {
        QuizService::new(self.store.clone(), self.clock.clone())
    }

    pub fn directory(&self) -> DirectoryService<S> {
        DirectoryService::new(self.store.clone())
    }

    pub fn inbox(&self) -> NotificationInbox<S> {
        NotificationInbox::new(self.store.clone(), self.applications())
    }

    pub fn overview(&self) -> OverviewService<S> {
        OverviewService::new(self.store.clone(), self.clock.clone(), self.jobs())
    }
}
