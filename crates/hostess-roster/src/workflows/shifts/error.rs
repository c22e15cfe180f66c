use super::applications::LifecycleError;
use super::repository::RepositoryError;
use super::roster::RosterExportError;

/// Input rejected before any store call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("{field} must not be empty")]
    Empty { field: &'static str },
    #[error("end time must be after the start time")]
    EndNotAfterStart,
    #[error("a job needs at least one slot")]
    NoSlots,
    #[error("{year}-{month:02} is not a supported calendar month")]
    InvalidPeriod { year: i32, month: u32 },
    #[error("a question needs at least two answers")]
    TooFewAnswers,
    #[error("correct answer index {index} is out of range for {answers} answers")]
    CorrectAnswerOutOfRange { index: usize, answers: usize },
    #[error("hourly rate must be positive")]
    InvalidHourlyRate,
    #[error("location '{0}' already exists")]
    DuplicateLocation(String),
    #[error("score {score} exceeds the {total} questions answered")]
    ScoreAboveTotal { score: u32, total: u32 },
    #[error("quiz has {questions} questions, result claims {total}")]
    QuizTotalMismatch { total: u32, questions: usize },
}

/// Error raised by the roster services.
#[derive(Debug, thiserror::Error)]
pub enum ShiftServiceError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
    #[error("{0} requires an administrator")]
    Forbidden(&'static str),
    #[error("no active session")]
    Unauthenticated,
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Export(#[from] RosterExportError),
}

impl ShiftServiceError {
    /// Someone else already acted; drop local state instead of retrying.
    pub fn is_stale(&self) -> bool {
        match self {
            ShiftServiceError::Lifecycle(err) => err.is_stale(),
            ShiftServiceError::Repository(RepositoryError::Stale) => true,
            _ => false,
        }
    }
}

/// Conditional updates that match nothing surface as stale lifecycle state.
pub(crate) fn stale_on_miss(err: RepositoryError) -> ShiftServiceError {
    match err {
        RepositoryError::NotFound | RepositoryError::Stale => {
            ShiftServiceError::Lifecycle(LifecycleError::Stale)
        }
        other => ShiftServiceError::Repository(other),
    }
}
