//! Application, invitation and giveaway lifecycle for staff on a job.

pub mod lifecycle;
pub mod router;
pub mod service;

#[cfg(test)]
mod tests;

pub use lifecycle::{ApplicationState, GiveawayKind, GiveawayState, LifecycleError};
pub use router::application_routes;
pub use service::{ApplicantView, GiveawayReceipt, ShiftApplicationService};
