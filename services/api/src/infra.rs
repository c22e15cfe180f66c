use chrono::{DateTime, Duration, Utc};
use hostess_roster::config::RosterConfig;
use hostess_roster::workflows::shifts::domain::{JobDraft, Profile, Role, YearMonth};
use hostess_roster::workflows::shifts::quiz::QuestionDraft;
use hostess_roster::workflows::shifts::{
    Clock, MemoryStore, RosterApp, Session, ShiftServiceError,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Sample people created by [`seed_demo_data`].
pub(crate) struct DemoCast {
    pub(crate) admin: Session,
    pub(crate) staff: Vec<Session>,
}

pub(crate) fn in_memory_app(
    clock: Arc<dyn Clock>,
    config: RosterConfig,
) -> (RosterApp<MemoryStore>, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let app = RosterApp::new(store.clone(), clock, config);
    (app, store)
}

const DEMO_STAFF: [(&str, &str); 4] = [
    ("Anna Kovacs", "anna@example.com"),
    ("Bella Nagy", "bella@example.com"),
    ("Csilla Toth", "csilla@example.com"),
    ("Dora Szabo", "dora@example.com"),
];

const DEMO_JOBS: [(&str, i64, u32, i64, &str, u32); 4] = [
    ("Opera gala", 3, 18, 5, "State Opera", 3),
    ("Wine festival", 9, 12, 8, "Castle District", 4),
    ("Corporate dinner", 16, 19, 4, "Riverside Hotel", 2),
    ("Trade fair", 23, 9, 9, "Expo Center", 4),
];

/// Populate a fresh store with staff, groups, quiz questions and the month's jobs.
pub(crate) async fn seed_demo_data(
    app: &RosterApp<MemoryStore>,
    store: &MemoryStore,
    period: YearMonth,
) -> Result<DemoCast, ShiftServiceError> {
    let admin = store.insert_profile(Profile::new("Zoe Admin", "zoe@example.com", Role::Admin))?;
    let admin = Session::from_profile(&admin);

    let mut staff = Vec::with_capacity(DEMO_STAFF.len());
    for (name, email) in DEMO_STAFF {
        let profile = store.insert_profile(Profile::new(name, email, Role::Hostess))?;
        staff.push(Session::from_profile(&profile));
    }

    let directory = app.directory();
    let regulars = directory.create_group(&admin, "Regulars").await?;
    let newcomers = directory.create_group(&admin, "Newcomers").await?;
    for (index, member) in staff.iter().enumerate() {
        let group = if index < 2 { &regulars } else { &newcomers };
        directory
            .toggle_membership(&admin, member.user_id, group.id)
            .await?;
    }

    for (_, _, _, _, location, _) in DEMO_JOBS {
        directory.add_location(&admin, location).await?;
    }

    let jobs = app.jobs();
    for (title, day, hour, hours, location, slots) in DEMO_JOBS {
        let starts_at = period.start() + Duration::days(day - 1) + Duration::hours(i64::from(hour));
        jobs.create(
            &admin,
            JobDraft {
                title: title.to_string(),
                starts_at,
                ends_at: Some(starts_at + Duration::hours(hours)),
                location: location.to_string(),
                slots_total: slots,
                description: String::new(),
            },
        )
        .await?;
    }

    let quiz = app.quiz();
    for (question, answers, correct) in [
        ("What do we wear at evening events?", ["Black dress", "Jeans", "Sportswear"], 0),
        ("When do you arrive for a shift?", ["On the minute", "15 minutes early", "When convenient"], 1),
        ("Where does your phone go during service?", ["In hand", "On the table", "Silent, in the locker"], 2),
    ] {
        quiz.create_question(
            &admin,
            QuestionDraft {
                question: question.to_string(),
                answers: answers.iter().map(|answer| answer.to_string()).collect(),
                correct_answer_index: correct,
                image_url: None,
            },
        )
        .await?;
    }

    Ok(DemoCast { admin, staff })
}

pub(crate) fn parse_month(raw: &str) -> Result<u32, String> {
    match raw.trim().parse::<u32>() {
        Ok(month) if (1..=12).contains(&month) => Ok(month),
        _ => Err(format!("'{raw}' is not a month between 1 and 12")),
    }
}

pub(crate) fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(raw.trim())
        .map(|at| at.with_timezone(&Utc))
        .map_err(|err| format!("failed to parse '{raw}' as an RFC 3339 timestamp ({err})"))
}
