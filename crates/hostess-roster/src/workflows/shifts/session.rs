use serde::Serialize;
use tracing::{debug, info};

use super::domain::{Profile, Role, UserId};
use super::error::ShiftServiceError;
use super::repository::ProfileRepository;

/// Authenticated caller, passed explicitly to every operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Session {
    pub user_id: UserId,
    pub role: Role,
    pub full_name: String,
}

impl Session {
    pub fn from_profile(profile: &Profile) -> Self {
        Self {
            user_id: profile.id,
            role: profile.role,
            full_name: profile.full_name.clone(),
        }
    }

    /// Rebuild the session for an identity the auth backend already verified.
    pub async fn restore<P>(profiles: &P, user_id: UserId) -> Result<Self, ShiftServiceError>
    where
        P: ProfileRepository + ?Sized,
    {
        let profile = profiles
            .fetch_profile(user_id)
            .await?
            .ok_or(ShiftServiceError::Unauthenticated)?;
        debug!(user_id = %profile.id, role = ?profile.role, "session restored");
        Ok(Self::from_profile(&profile))
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn require_admin(&self, action: &'static str) -> Result<(), ShiftServiceError> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(ShiftServiceError::Forbidden(action))
        }
    }

    pub fn sign_out(self) {
        info!(user_id = %self.user_id, "session closed");
    }
}
