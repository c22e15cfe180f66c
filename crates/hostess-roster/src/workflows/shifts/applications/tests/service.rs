use std::sync::Arc;

use chrono::Duration;

use super::common::*;
use crate::workflows::shifts::applications::{ApplicationState, GiveawayKind, LifecycleError};
use crate::workflows::shifts::domain::{ApplicationStatus, NotificationKind};
use crate::workflows::shifts::error::ShiftServiceError;
use crate::workflows::shifts::notifications::{Resolution, Response};
use crate::workflows::shifts::repository::{
    ApplicationRepository, NotificationSink, RepositoryError,
};

#[tokio::test]
async fn apply_is_approved_immediately_and_counts_toward_slots() {
    let fx = Fixture::new();
    let job = fx.job_in(Duration::days(5), 2).await;

    let application = fx.approved(&job, &fx.anna).await;
    assert_eq!(application.status, ApplicationStatus::Approved);

    let summary = fx.app.jobs().get(&fx.admin, job.id).await.unwrap();
    assert_eq!(summary.metrics.slots_taken, 1);
    assert_eq!(fx.approved_count(job.id).await, 1);
}

#[tokio::test]
async fn full_job_rejects_further_applications() {
    let fx = Fixture::new();
    let job = fx.job_in(Duration::days(5), 1).await;
    fx.approved(&job, &fx.anna).await;

    match fx.app.applications().apply(&fx.bella, job.id).await {
        Err(ShiftServiceError::Lifecycle(LifecycleError::JobFull)) => {}
        other => panic!("expected full job, got {other:?}"),
    }
}

#[tokio::test]
async fn second_application_is_rejected() {
    let fx = Fixture::new();
    let job = fx.job_in(Duration::days(5), 3).await;
    fx.approved(&job, &fx.anna).await;

    match fx.app.applications().apply(&fx.anna, job.id).await {
        Err(ShiftServiceError::Lifecycle(LifecycleError::AlreadyApplied)) => {}
        other => panic!("expected duplicate rejection, got {other:?}"),
    }
}

#[tokio::test]
async fn apply_then_decline_returns_to_no_row() {
    let fx = Fixture::new();
    let job = fx.job_in(Duration::days(5), 2).await;
    let applications = fx.app.applications();

    let application = fx.approved(&job, &fx.anna).await;
    applications.decline(&fx.anna, application.id).await.unwrap();

    let row = fx.store.application_for(job.id, fx.anna.user_id).await.unwrap();
    assert_eq!(ApplicationState::of(row.as_ref()), ApplicationState::None);
    assert_eq!(fx.approved_count(job.id).await, 0);

    applications
        .apply(&fx.anna, job.id)
        .await
        .expect("can apply again after declining");
}

#[tokio::test]
async fn only_owner_or_admin_may_decline() {
    let fx = Fixture::new();
    let job = fx.job_in(Duration::days(5), 2).await;
    let application = fx.approved(&job, &fx.anna).await;

    match fx.app.applications().decline(&fx.bella, application.id).await {
        Err(ShiftServiceError::Lifecycle(LifecycleError::NotOwner)) => {}
        other => panic!("expected ownership failure, got {other:?}"),
    }
    fx.app
        .applications()
        .decline(&fx.admin, application.id)
        .await
        .expect("admin can remove any row");
}

#[tokio::test]
async fn invite_notifies_and_accept_approves() {
    let fx = Fixture::new();
    let job = fx.job_in(Duration::days(5), 2).await;
    let applications = fx.app.applications();

    let invited = applications
        .invite(&fx.admin, job.id, fx.anna.user_id)
        .await
        .unwrap();
    assert_eq!(invited.status, ApplicationStatus::Invited);
    assert_eq!(fx.approved_count(job.id).await, 0);

    let inbox = fx.store.notifications_for(fx.anna.user_id).await.unwrap();
    assert_eq!(inbox.len(), 1);
    assert_eq!(inbox[0].kind, NotificationKind::Invite);
    assert_eq!(inbox[0].related_application_id, Some(invited.id));

    let accepted = applications.accept_invite(&fx.anna, job.id).await.unwrap();
    assert!(accepted.is_approved());

    match applications.accept_invite(&fx.anna, job.id).await {
        Err(ShiftServiceError::Lifecycle(LifecycleError::AlreadyAccepted)) => {}
        other => panic!("expected already accepted, got {other:?}"),
    }
}

#[tokio::test]
async fn hostess_cannot_invite() {
    let fx = Fixture::new();
    let job = fx.job_in(Duration::days(5), 2).await;

    match fx
        .app
        .applications()
        .invite(&fx.anna, job.id, fx.bella.user_id)
        .await
    {
        Err(ShiftServiceError::Forbidden(_)) => {}
        other => panic!("expected forbidden, got {other:?}"),
    }
}

#[tokio::test]
async fn accepting_a_withdrawn_invitation_is_stale_and_clears_the_notification() {
    let fx = Fixture::new();
    let job = fx.job_in(Duration::days(5), 2).await;
    let invited = fx
        .app
        .applications()
        .invite(&fx.admin, job.id, fx.anna.user_id)
        .await
        .unwrap();
    fx.app
        .applications()
        .decline(&fx.admin, invited.id)
        .await
        .unwrap();

    let err = fx
        .app
        .applications()
        .accept_invite(&fx.anna, job.id)
        .await
        .unwrap_err();
    assert!(err.is_stale());

    let notification = fx.store.notifications_for(fx.anna.user_id).await.unwrap()[0].clone();
    let resolution = fx
        .app
        .inbox()
        .resolve_invite(&fx.anna, notification.id, Response::Accept)
        .await
        .unwrap();
    assert!(matches!(resolution, Resolution::Expired { .. }));
    assert!(fx
        .store
        .fetch_notification(notification.id)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn declining_an_invite_from_the_inbox_removes_the_row() {
    let fx = Fixture::new();
    let job = fx.job_in(Duration::days(5), 2).await;
    fx.app
        .applications()
        .invite(&fx.admin, job.id, fx.anna.user_id)
        .await
        .unwrap();

    let notification = fx.app.inbox().list(&fx.anna).await.unwrap()[0].clone();
    let resolution = fx
        .app
        .inbox()
        .resolve_invite(&fx.anna, notification.id, Response::Decline)
        .await
        .unwrap();
    assert!(matches!(resolution, Resolution::Declined));
    assert!(fx
        .store
        .application_for(job.id, fx.anna.user_id)
        .await
        .unwrap()
        .is_none());
    assert_eq!(fx.app.inbox().unread_count(&fx.anna).await.unwrap(), 0);
}

#[tokio::test]
async fn giveaway_just_over_two_days_out_is_claimable() {
    let fx = Fixture::new();
    let job = fx.job_in(Duration::seconds(172_836), 2).await;
    fx.approved(&job, &fx.anna).await;

    let receipt = fx
        .app
        .applications()
        .request_giveaway(&fx.anna, job.id)
        .await
        .unwrap();
    assert_eq!(receipt.kind, GiveawayKind::Normal);
    assert!(receipt.application.is_claimable());
    assert!(fx.store.notifications_for(fx.admin.user_id).await.unwrap().is_empty());
}

#[tokio::test]
async fn giveaway_just_under_two_days_out_needs_an_admin() {
    let fx = Fixture::new();
    let job = fx.job_in(Duration::seconds(172_764), 2).await;
    fx.approved(&job, &fx.anna).await;
    let applications = fx.app.applications();

    let receipt = applications.request_giveaway(&fx.anna, job.id).await.unwrap();
    assert_eq!(receipt.kind, GiveawayKind::Emergency);
    assert!(!receipt.application.is_claimable());

    let alerts = fx.store.notifications_for(fx.admin.user_id).await.unwrap();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].kind, NotificationKind::EmergencyGiveaway);

    match applications.claim_giveaway(&fx.bella, job.id).await {
        Err(err) => assert!(err.is_stale()),
        Ok(spot) => panic!("emergency request must not be claimable yet: {spot:?}"),
    }
}

#[tokio::test]
async fn approving_an_emergency_twice_is_harmless() {
    let fx = Fixture::new();
    let job = fx.job_in(Duration::hours(12), 2).await;
    fx.approved(&job, &fx.anna).await;
    let applications = fx.app.applications();
    let receipt = applications.request_giveaway(&fx.anna, job.id).await.unwrap();

    let first = applications
        .approve_emergency_giveaway(&fx.admin, receipt.application.id)
        .await
        .unwrap();
    let second = applications
        .approve_emergency_giveaway(&fx.admin, receipt.application.id)
        .await
        .unwrap();

    assert_eq!(first, second);
    assert!(second.is_claimable());
    assert_eq!(applications.giveaway_queue(job.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn emergency_can_be_approved_from_the_admin_inbox() {
    let fx = Fixture::new();
    let job = fx.job_in(Duration::hours(12), 2).await;
    fx.approved(&job, &fx.anna).await;
    fx.app
        .applications()
        .request_giveaway(&fx.anna, job.id)
        .await
        .unwrap();

    let alert = fx.app.inbox().list(&fx.admin).await.unwrap()[0].clone();
    let resolution = fx
        .app
        .inbox()
        .resolve_emergency(&fx.admin, alert.id, Response::Accept)
        .await
        .unwrap();
    match resolution {
        Resolution::Accepted { application } => assert!(application.is_claimable()),
        other => panic!("expected acceptance, got {other:?}"),
    }
    assert!(fx.app.inbox().list(&fx.admin).await.unwrap().is_empty());
}

#[tokio::test]
async fn claim_transfers_the_spot_and_notifies_the_giver() {
    let fx = Fixture::new();
    let job = fx.job_in(Duration::days(4), 1).await;
    fx.approved(&job, &fx.anna).await;
    let applications = fx.app.applications();
    applications.request_giveaway(&fx.anna, job.id).await.unwrap();

    let spot = applications.claim_giveaway(&fx.bella, job.id).await.unwrap();
    assert_eq!(spot.vacated.user_id, fx.anna.user_id);
    assert_eq!(spot.application.user_id, fx.bella.user_id);
    assert!(spot.application.is_approved());
    assert!(!spot.application.has_pending_giveaway());
    assert_eq!(fx.approved_count(job.id).await, 1);

    let notices = fx.store.notifications_for(fx.anna.user_id).await.unwrap();
    assert_eq!(notices[0].kind, NotificationKind::GiveawayClaimed);
    assert!(fx
        .store
        .application_for(job.id, fx.anna.user_id)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn cancelled_giveaway_cannot_be_claimed() {
    let fx = Fixture::new();
    let job = fx.job_in(Duration::days(4), 1).await;
    fx.approved(&job, &fx.anna).await;
    let applications = fx.app.applications();
    applications.request_giveaway(&fx.anna, job.id).await.unwrap();
    applications.cancel_giveaway(&fx.anna, job.id).await.unwrap();

    match applications.claim_giveaway(&fx.bella, job.id).await {
        Err(ShiftServiceError::Lifecycle(LifecycleError::NoLongerAvailable(_))) => {}
        other => panic!("expected no longer available, got {other:?}"),
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_claims_have_a_single_winner() {
    let fx = Fixture::new();
    let job = fx.job_in(Duration::days(4), 1).await;
    fx.approved(&job, &fx.anna).await;
    fx.app
        .applications()
        .request_giveaway(&fx.anna, job.id)
        .await
        .unwrap();

    let app = Arc::new(fx.app.clone());
    let mut handles = Vec::new();
    for index in 0..8 {
        let claimant = fx.hostess(&format!("Claimant {index}"));
        let app = app.clone();
        let job_id = job.id;
        handles.push(tokio::spawn(async move {
            app.applications().claim_giveaway(&claimant, job_id).await
        }));
    }

    let mut winners = 0;
    for handle in handles {
        match handle.await.expect("claim task") {
            Ok(_) => winners += 1,
            Err(err) => assert!(err.is_stale(), "unexpected failure: {err}"),
        }
    }

    assert_eq!(winners, 1);
    assert_eq!(fx.approved_count(job.id).await, 1);
}

#[tokio::test]
async fn slots_taken_tracks_every_mutation() {
    let fx = Fixture::new();
    let job = fx.job_in(Duration::days(6), 3).await;
    let applications = fx.app.applications();
    let carla = fx.hostess("Carla Szabo");

    fx.approved(&job, &fx.anna).await;
    let invited = applications
        .invite(&fx.admin, job.id, fx.bella.user_id)
        .await
        .unwrap();
    applications
        .assign(&fx.admin, job.id, carla.user_id)
        .await
        .unwrap();
    assert_eq!(fx.app.jobs().get(&fx.admin, job.id).await.unwrap().metrics.slots_taken, 2);

    applications.approve(&fx.admin, invited.id).await.unwrap();
    let summary = fx.app.jobs().get(&fx.admin, job.id).await.unwrap();
    assert_eq!(summary.metrics.slots_taken, 3);
    assert!(summary.metrics.is_full);

    let anna_row = fx
        .store
        .application_for(job.id, fx.anna.user_id)
        .await
        .unwrap()
        .unwrap();
    applications.remove_approved(&fx.admin, anna_row.id).await.unwrap();
    assert_eq!(
        fx.app.jobs().get(&fx.admin, job.id).await.unwrap().metrics.slots_taken as usize,
        fx.approved_count(job.id).await
    );
}

#[tokio::test]
async fn offline_store_surfaces_unavailable() {
    let fx = Fixture::new();
    let job = fx.job_in(Duration::days(6), 3).await;
    fx.store.set_unavailable(true);

    match fx.app.applications().apply(&fx.anna, job.id).await {
        Err(ShiftServiceError::Repository(RepositoryError::Unavailable(_))) => {}
        other => panic!("expected unavailable, got {other:?}"),
    }
}

#[tokio::test]
async fn committed_transitions_survive_a_failed_notification() {
    let fx = Fixture::new();
    let job = fx.job_in(Duration::days(4), 2).await;
    let urgent = fx.job_in(Duration::hours(12), 1).await;
    fx.approved(&job, &fx.anna).await;
    fx.approved(&urgent, &fx.anna).await;
    let carla = fx.hostess("Carla Varga");
    let applications = fx.app.applications();
    fx.store.set_outbox_unavailable(true);

    let invited = applications
        .invite(&fx.admin, job.id, carla.user_id)
        .await
        .expect("invite committed despite failed delivery");
    assert_eq!(invited.status, ApplicationStatus::Invited);
    match applications.invite(&fx.admin, job.id, carla.user_id).await {
        Err(ShiftServiceError::Lifecycle(LifecycleError::AlreadyApplied)) => {}
        other => panic!("expected already applied, got {other:?}"),
    }

    let approved = applications.approve(&fx.admin, invited.id).await.unwrap();
    assert!(approved.is_approved());

    let receipt = applications.request_giveaway(&fx.anna, urgent.id).await.unwrap();
    assert_eq!(receipt.kind, GiveawayKind::Emergency);

    applications.request_giveaway(&fx.anna, job.id).await.unwrap();
    let spot = applications.claim_giveaway(&fx.bella, job.id).await.unwrap();
    assert_eq!(spot.vacated.user_id, fx.anna.user_id);
    assert_eq!(fx.approved_count(job.id).await, 2);

    fx.store.set_outbox_unavailable(false);
    assert!(fx.store.notifications_for(carla.user_id).await.unwrap().is_empty());
    assert!(fx.store.notifications_for(fx.admin.user_id).await.unwrap().is_empty());
}

#[tokio::test]
async fn giveaway_after_the_clock_passes_the_notice_window_becomes_emergency() {
    let fx = Fixture::new();
    let job = fx.job_in(Duration::days(3), 2).await;
    fx.approved(&job, &fx.anna).await;
    fx.clock.advance(Duration::days(2));

    let receipt = fx
        .app
        .applications()
        .request_giveaway(&fx.anna, job.id)
        .await
        .unwrap();
    assert_eq!(receipt.kind, GiveawayKind::Emergency);
}
