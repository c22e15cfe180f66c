//! Month visibility as seen through the shift board: release schedules per
//! group, single-group membership, and the administrator bypass.

mod common {
    use std::sync::Arc;

    use chrono::{DateTime, Duration, TimeZone, Utc};

    use hostess_roster::config::RosterConfig;
    use hostess_roster::workflows::shifts::domain::{Group, JobDraft, Profile, Role};
    use hostess_roster::workflows::shifts::{FixedClock, MemoryStore, RosterApp, Session};

    pub(super) fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 15, 9, 30, 0)
            .single()
            .expect("valid timestamp")
    }

    pub(super) struct World {
        pub(super) app: RosterApp<MemoryStore>,
        pub(super) store: Arc<MemoryStore>,
        pub(super) admin: Session,
        pub(super) hostess: Session,
        pub(super) group_a: Group,
        pub(super) group_b: Group,
    }

    pub(super) async fn world() -> World {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(FixedClock::new(now()));
        let app = RosterApp::new(store.clone(), clock, RosterConfig::default());

        let admin = store
            .insert_profile(Profile::new("Zoe Admin", "zoe@example.com", Role::Admin))
            .expect("admin seeded");
        let hostess = store
            .insert_profile(Profile::new("Anna Kovacs", "anna@example.com", Role::Hostess))
            .expect("hostess seeded");
        let admin = Session::from_profile(&admin);
        let hostess = Session::from_profile(&hostess);

        let directory = app.directory();
        let group_a = directory.create_group(&admin, "Group A").await.expect("group");
        let group_b = directory.create_group(&admin, "Group B").await.expect("group");

        for (title, start) in [
            ("March gala", Utc.with_ymd_and_hms(2024, 3, 28, 18, 0, 0)),
            ("April fair", Utc.with_ymd_and_hms(2024, 4, 6, 10, 0, 0)),
        ] {
            app.jobs()
                .create(
                    &admin,
                    JobDraft {
                        title: title.to_string(),
                        starts_at: start.single().expect("valid start"),
                        ends_at: None,
                        location: "Expo".to_string(),
                        slots_total: 4,
                        description: String::new(),
                    },
                )
                .await
                .expect("job created");
        }

        World {
            app,
            store,
            admin,
            hostess,
            group_a,
            group_b,
        }
    }

    pub(super) fn days(n: i64) -> Duration {
        Duration::days(n)
    }
}

use common::*;
use hostess_roster::workflows::shifts::applications::LifecycleError;
use hostess_roster::workflows::shifts::directory::MembershipChange;
use hostess_roster::workflows::shifts::domain::{Profile, Role, YearMonth};
use hostess_roster::workflows::shifts::release::ReleaseDecision;
use hostess_roster::workflows::shifts::{RepositoryError, Session, ShiftServiceError};

fn april() -> YearMonth {
    YearMonth::new(2024, 4).expect("valid month")
}

#[tokio::test]
async fn current_month_is_always_visible() {
    let world = world().await;
    let march = YearMonth::new(2024, 3).expect("valid month");

    let board = world.app.board().month(&world.hostess, march).await.unwrap();
    assert!(board.released);
    assert_eq!(board.release, ReleaseDecision::NotGated);
    assert_eq!(board.jobs.len(), 1);
}

#[tokio::test]
async fn future_month_opens_only_for_released_groups() {
    let world = world().await;
    world
        .app
        .directory()
        .toggle_membership(&world.admin, world.hostess.user_id, world.group_a.id)
        .await
        .unwrap();

    let board = world.app.board().month(&world.hostess, april()).await.unwrap();
    assert!(!board.released);
    assert!(board.jobs.is_empty());
    assert_eq!(board.release, ReleaseDecision::NoRelease);

    world
        .app
        .releases()
        .schedule(&world.admin, april(), world.group_b.id, now() - days(1))
        .await
        .unwrap();
    let board = world.app.board().month(&world.hostess, april()).await.unwrap();
    assert!(!board.released, "release for another group must not apply");

    world
        .app
        .releases()
        .schedule(&world.admin, april(), world.group_a.id, now() + days(5))
        .await
        .unwrap();
    let board = world.app.board().month(&world.hostess, april()).await.unwrap();
    assert!(matches!(board.release, ReleaseDecision::Scheduled { .. }));

    world
        .app
        .releases()
        .schedule(&world.admin, april(), world.group_a.id, now() - days(1))
        .await
        .unwrap();
    let board = world.app.board().month(&world.hostess, april()).await.unwrap();
    assert!(board.released);
    assert_eq!(board.jobs.len(), 1);
    assert_eq!(board.jobs[0].summary.job.title, "April fair");
}

#[tokio::test]
async fn admins_bypass_the_gate() {
    let world = world().await;
    let board = world.app.board().month(&world.admin, april()).await.unwrap();
    assert!(board.released);
    assert_eq!(board.release, ReleaseDecision::Admin);
}

#[tokio::test]
async fn membership_toggle_keeps_a_single_group() {
    let world = world().await;
    let directory = world.app.directory();
    let user = world.hostess.user_id;

    let change = directory
        .toggle_membership(&world.admin, user, world.group_a.id)
        .await
        .unwrap();
    assert_eq!(change, MembershipChange::Joined);

    directory
        .toggle_membership(&world.admin, user, world.group_b.id)
        .await
        .unwrap();
    let staff = directory.staff(&world.admin).await.unwrap();
    let anna = staff
        .iter()
        .find(|member| member.profile.id == user)
        .expect("hostess listed");
    assert_eq!(anna.groups, vec![world.group_b.id]);

    let change = directory
        .toggle_membership(&world.admin, user, world.group_b.id)
        .await
        .unwrap();
    assert_eq!(change, MembershipChange::Left);
    let staff = directory.staff(&world.admin).await.unwrap();
    assert!(staff
        .iter()
        .find(|member| member.profile.id == user)
        .expect("hostess listed")
        .groups
        .is_empty());
}

#[tokio::test]
async fn deleting_a_group_closes_its_release() {
    let world = world().await;
    world
        .app
        .directory()
        .toggle_membership(&world.admin, world.hostess.user_id, world.group_a.id)
        .await
        .unwrap();
    world
        .app
        .releases()
        .schedule(&world.admin, april(), world.group_a.id, now() - days(1))
        .await
        .unwrap();
    assert!(world.app.board().month(&world.hostess, april()).await.unwrap().released);

    world
        .app
        .directory()
        .delete_group(&world.admin, world.group_a.id)
        .await
        .unwrap();
    let board = world.app.board().month(&world.hostess, april()).await.unwrap();
    assert!(!board.released);
}

#[tokio::test]
async fn unreleased_jobs_cannot_be_applied_claimed_or_fetched() {
    let world = world().await;
    let fair = world.app.jobs().list(april()).await.unwrap().remove(0).job;
    let bella = world
        .store
        .insert_profile(Profile::new("Bella Nagy", "bella@example.com", Role::Hostess))
        .expect("hostess seeded");
    let bella = Session::from_profile(&bella);

    let applications = world.app.applications();
    applications
        .assign(&world.admin, fair.id, bella.user_id)
        .await
        .unwrap();
    applications.request_giveaway(&bella, fair.id).await.unwrap();

    let err = applications.apply(&world.hostess, fair.id).await.unwrap_err();
    assert!(matches!(
        err,
        ShiftServiceError::Lifecycle(LifecycleError::NotReleased)
    ));
    let err = applications
        .claim_giveaway(&world.hostess, fair.id)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ShiftServiceError::Lifecycle(LifecycleError::NotReleased)
    ));
    let err = world.app.jobs().get(&world.hostess, fair.id).await.unwrap_err();
    assert!(matches!(
        err,
        ShiftServiceError::Repository(RepositoryError::NotFound)
    ));
    assert!(world.app.jobs().get(&world.admin, fair.id).await.is_ok());
    assert_eq!(
        applications.giveaway_queue(fair.id).await.unwrap().len(),
        1,
        "rejected claim leaves the queue untouched"
    );

    world
        .app
        .directory()
        .toggle_membership(&world.admin, world.hostess.user_id, world.group_a.id)
        .await
        .unwrap();
    world
        .app
        .releases()
        .schedule(&world.admin, april(), world.group_a.id, now() - days(1))
        .await
        .unwrap();

    assert!(world.app.jobs().get(&world.hostess, fair.id).await.is_ok());
    let spot = applications
        .claim_giveaway(&world.hostess, fair.id)
        .await
        .unwrap();
    assert_eq!(spot.vacated.user_id, bella.user_id);
    let err = applications.apply(&world.hostess, fair.id).await.unwrap_err();
    assert!(matches!(
        err,
        ShiftServiceError::Lifecycle(LifecycleError::AlreadyApplied)
    ));
}
