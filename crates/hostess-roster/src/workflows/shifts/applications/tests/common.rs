use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Method, Request};
use axum::response::Response;
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::Value;

use crate::config::RosterConfig;
use crate::workflows::shifts::app::RosterApp;
use crate::workflows::shifts::clock::FixedClock;
use crate::workflows::shifts::domain::{
    Application, ApplicationStatus, Job, JobDraft, JobId, Profile, Role, UserId,
};
use crate::workflows::shifts::memory::MemoryStore;
use crate::workflows::shifts::router::USER_ID_HEADER;
use crate::workflows::shifts::session::Session;

/// Friday 2024-03-15 09:30 UTC.
pub(super) fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 15, 9, 30, 0)
        .single()
        .expect("valid timestamp")
}

pub(super) struct Fixture {
    pub(super) app: RosterApp<MemoryStore>,
    pub(super) store: Arc<MemoryStore>,
    pub(super) clock: Arc<FixedClock>,
    pub(super) admin: Session,
    pub(super) anna: Session,
    pub(super) bella: Session,
}

impl Fixture {
    pub(super) fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(FixedClock::new(base_time()));
        let app = RosterApp::new(store.clone(), clock.clone(), RosterConfig::default());

        let admin = seed(&store, "Zoe Admin", Role::Admin);
        let anna = seed(&store, "Anna Kovacs", Role::Hostess);
        let bella = seed(&store, "Bella Nagy", Role::Hostess);

        Self {
            app,
            store,
            clock,
            admin,
            anna,
            bella,
        }
    }

    pub(super) fn hostess(&self, name: &str) -> Session {
        seed(&self.store, name, Role::Hostess)
    }

    /// Active job starting `lead` after the fixture clock.
    pub(super) async fn job_in(&self, lead: Duration, slots: u32) -> Job {
        self.app
            .jobs()
            .create(
                &self.admin,
                JobDraft {
                    title: "Opera gala".to_string(),
                    starts_at: base_time() + lead,
                    ends_at: Some(base_time() + lead + Duration::hours(5)),
                    location: "State Opera".to_string(),
                    slots_total: slots,
                    description: "Cloakroom and ushering".to_string(),
                },
            )
            .await
            .expect("job created")
    }

    pub(super) async fn approved(&self, job: &Job, session: &Session) -> Application {
        self.app
            .applications()
            .apply(session, job.id)
            .await
            .expect("application accepted")
    }

    pub(super) async fn approved_count(&self, job_id: JobId) -> usize {
        self.app
            .applications()
            .applicants(&self.admin, job_id)
            .await
            .expect("applicants listed")
            .iter()
            .filter(|view| view.application.status == ApplicationStatus::Approved)
            .count()
    }
}

fn seed(store: &MemoryStore, name: &str, role: Role) -> Session {
    let email = format!("{}@example.com", name.to_lowercase().replace(' ', "."));
    let profile = store
        .insert_profile(Profile::new(name, email, role))
        .expect("profile seeded");
    Session::from_profile(&profile)
}

pub(super) fn request(
    method: Method,
    uri: &str,
    user: Option<UserId>,
    body: Option<Value>,
) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(user) = user {
        builder = builder.header(USER_ID_HEADER, user.to_string());
    }
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(serde_json::to_vec(&body).expect("json body")))
            .expect("request"),
        None => builder.body(Body::empty()).expect("request"),
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
