//! Shift roster: jobs, applications and giveaways, monthly releases, the
//! roster export, the onboarding quiz and the staff directory.

pub mod app;
pub mod applications;
pub mod board;
pub mod clock;
pub mod directory;
pub mod domain;
pub mod error;
pub mod jobs;
pub mod memory;
pub mod notifications;
pub mod overview;
pub mod quiz;
pub mod release;
pub mod repository;
pub mod roster;
pub mod router;
pub mod session;

pub use app::RosterApp;
pub use clock::{Clock, FixedClock, SystemClock};
pub use error::{ShiftServiceError, ValidationError};
pub use memory::MemoryStore;
pub use repository::{RepositoryError, RosterStore};
pub use router::{roster_router, ApiError, USER_ID_HEADER};
pub use session::Session;
