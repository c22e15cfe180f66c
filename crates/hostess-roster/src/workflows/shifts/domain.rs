use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Shifts without an explicit end are assumed to last this long.
pub const DEFAULT_SHIFT_HOURS: i64 = 4;

/// Giveaways requested closer than this to the start need admin approval.
pub const GIVEAWAY_NOTICE_HOURS: f64 = 48.0;

/// Open shifts starting within this window are flagged urgent.
pub const URGENT_WINDOW_HOURS: f64 = 48.0;

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                self.0.fmt(f)
            }
        }
    };
}

id_type!(
    /// Identifier of a shift.
    JobId
);
id_type!(
    /// Identifier of an application row.
    ApplicationId
);
id_type!(
    /// Identifier of a staff or admin profile.
    UserId
);
id_type!(GroupId);
id_type!(LocationId);
id_type!(QuestionId);
id_type!(NotificationId);

/// A shift staff can apply to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub title: String,
    pub starts_at: DateTime<Utc>,
    pub ends_at: Option<DateTime<Utc>>,
    pub location: String,
    pub slots_total: u32,
    pub description: String,
    pub is_active: bool,
    pub created_by: Option<UserId>,
    pub created_at: DateTime<Utc>,
}

impl Job {
    /// End time, falling back to the default shift length.
    pub fn effective_end(&self) -> DateTime<Utc> {
        self.ends_at
            .unwrap_or_else(|| self.starts_at + Duration::hours(DEFAULT_SHIFT_HOURS))
    }

    pub fn duration(&self) -> Duration {
        self.effective_end() - self.starts_at
    }

    /// Fractional hours between `now` and the start; negative once started.
    pub fn hours_until_start(&self, now: DateTime<Utc>) -> f64 {
        (self.starts_at - now).num_milliseconds() as f64 / 3_600_000.0
    }
}

/// Editable job fields submitted by admins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobDraft {
    pub title: String,
    pub starts_at: DateTime<Utc>,
    #[serde(default)]
    pub ends_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub location: String,
    pub slots_total: u32,
    #[serde(default)]
    pub description: String,
}

/// Persisted application status. Rejection is modeled as row deletion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    Pending,
    Invited,
    Approved,
}

impl ApplicationStatus {
    pub const fn label(self) -> &'static str {
        match self {
            ApplicationStatus::Pending => "pending",
            ApplicationStatus::Invited => "invited",
            ApplicationStatus::Approved => "approved",
        }
    }
}

/// One user's relationship to one job, as stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Application {
    pub id: ApplicationId,
    pub job_id: JobId,
    pub user_id: UserId,
    pub status: ApplicationStatus,
    pub give_away_requested: bool,
    pub emergency_giveaway_requested: bool,
    pub give_away_requested_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Application {
    pub fn new(
        job_id: JobId,
        user_id: UserId,
        status: ApplicationStatus,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: ApplicationId::new(),
            job_id,
            user_id,
            status,
            give_away_requested: false,
            emergency_giveaway_requested: false,
            give_away_requested_at: None,
            created_at: now,
        }
    }

    pub fn is_approved(&self) -> bool {
        self.status == ApplicationStatus::Approved
    }

    /// Approved and offered to claimants.
    pub fn is_claimable(&self) -> bool {
        self.is_approved() && self.give_away_requested
    }

    pub fn has_pending_giveaway(&self) -> bool {
        self.give_away_requested || self.emergency_giveaway_requested
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Hostess,
    Admin,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: UserId,
    pub full_name: String,
    pub email: String,
    pub role: Role,
    pub strikes: u32,
    pub quiz_score: u32,
    pub quiz_total: u32,
}

impl Profile {
    pub fn new(full_name: impl Into<String>, email: impl Into<String>, role: Role) -> Self {
        Self {
            id: UserId::new(),
            full_name: full_name.into(),
            email: email.into(),
            role,
            strikes: 0,
            quiz_score: 0,
            quiz_total: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub id: GroupId,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Membership {
    pub user_id: UserId,
    pub group_id: GroupId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub id: LocationId,
    pub name: String,
}

/// Calendar month, `month` is 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct YearMonth {
    pub year: i32,
    pub month: u32,
}

impl YearMonth {
    /// `None` for months outside 1..=12 or years chrono cannot represent,
    /// including the last one so that [`YearMonth::next`] stays in range.
    pub fn new(year: i32, month: u32) -> Option<Self> {
        use chrono::Datelike;
        let years = chrono::NaiveDate::MIN.year()..chrono::NaiveDate::MAX.year();
        ((1..=12).contains(&month) && years.contains(&year)).then_some(Self { year, month })
    }

    pub fn of(at: DateTime<Utc>) -> Self {
        use chrono::Datelike;
        Self {
            year: at.year(),
            month: at.month(),
        }
    }

    pub fn next(self) -> Self {
        if self.month == 12 {
            Self {
                year: self.year.saturating_add(1),
                month: 1,
            }
        } else {
            Self {
                year: self.year,
                month: self.month + 1,
            }
        }
    }

    /// Midnight UTC on the first day of the month.
    pub fn start(self) -> DateTime<Utc> {
        chrono::NaiveDate::from_ymd_opt(self.year, self.month, 1)
            .and_then(|date| date.and_hms_opt(0, 0, 0))
            .map(|naive| naive.and_utc())
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    pub fn contains(self, at: DateTime<Utc>) -> bool {
        at >= self.start() && at < self.next().start()
    }
}

/// Scheduled visibility of a month's jobs for one group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthlyRelease {
    pub year: i32,
    pub month: u32,
    pub group_id: GroupId,
    pub release_at: DateTime<Utc>,
}

impl MonthlyRelease {
    pub fn period(&self) -> YearMonth {
        YearMonth {
            year: self.year,
            month: self.month,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizQuestion {
    pub id: QuestionId,
    pub question: String,
    pub answers: Vec<String>,
    pub correct_answer_index: usize,
    #[serde(default)]
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Info,
    Invite,
    EmergencyGiveaway,
    GiveawayClaimed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: NotificationId,
    pub user_id: UserId,
    pub kind: NotificationKind,
    pub message: String,
    pub related_job_id: Option<JobId>,
    pub related_application_id: Option<ApplicationId>,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

/// Notification payload handed to the sink; the store assigns id and timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewNotification {
    pub user_id: UserId,
    pub kind: NotificationKind,
    pub message: String,
    pub related_job_id: Option<JobId>,
    pub related_application_id: Option<ApplicationId>,
}
