use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use super::domain::{Group, GroupId, Location, LocationId, Membership, Profile, UserId};
use super::error::{ShiftServiceError, ValidationError};
use super::repository::{RepositoryError, RosterStore};
use super::session::Session;

/// Whether a toggle added or removed the membership.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MembershipChange {
    Joined,
    Left,
}

/// Staff directory entry: profile plus its group, if any.
#[derive(Debug, Clone, Serialize)]
pub struct StaffMember {
    #[serde(flatten)]
    pub profile: Profile,
    pub groups: Vec<GroupId>,
}

/// Locations, groups, memberships and strikes.
pub struct DirectoryService<S> {
    store: Arc<S>,
}

impl<S> Clone for DirectoryService<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
        }
    }
}

impl<S> DirectoryService<S>
where
    S: RosterStore,
{
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub async fn locations(&self) -> Result<Vec<Location>, ShiftServiceError> {
        let mut locations = self.store.locations().await?;
        locations.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(locations)
    }

    pub async fn add_location(
        &self,
        session: &Session,
        name: &str,
    ) -> Result<Location, ShiftServiceError> {
        session.require_admin("managing locations")?;
        let name = name.trim();
        if name.is_empty() {
            return Err(ValidationError::Empty { field: "location" }.into());
        }

        let existing = self.store.locations().await?;
        if existing.iter().any(|location| location.name == name) {
            return Err(ValidationError::DuplicateLocation(name.to_string()).into());
        }

        let location = Location {
            id: LocationId::new(),
            name: name.to_string(),
        };
        let stored = self
            .store
            .insert_location(location)
            .await
            .map_err(|err| match err {
                RepositoryError::Conflict => {
                    ValidationError::DuplicateLocation(name.to_string()).into()
                }
                other => ShiftServiceError::from(other),
            })?;
        info!(location = %stored.name, "location added");
        Ok(stored)
    }

    pub async fn remove_location(
        &self,
        session: &Session,
        id: LocationId,
    ) -> Result<(), ShiftServiceError> {
        session.require_admin("managing locations")?;
        self.store.delete_location(id).await?;
        info!(location_id = %id, "location removed");
        Ok(())
    }

    pub async fn groups(&self) -> Result<Vec<Group>, ShiftServiceError> {
        let mut groups = self.store.groups().await?;
        groups.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(groups)
    }

    pub async fn create_group(
        &self,
        session: &Session,
        name: &str,
    ) -> Result<Group, ShiftServiceError> {
        session.require_admin("managing groups")?;
        let name = name.trim();
        if name.is_empty() {
            return Err(ValidationError::Empty { field: "group" }.into());
        }
        let stored = self
            .store
            .insert_group(Group {
                id: GroupId::new(),
                name: name.to_string(),
            })
            .await?;
        info!(group_id = %stored.id, group = %stored.name, "group created");
        Ok(stored)
    }

    /// Memberships and releases of the group go with it.
    pub async fn delete_group(
        &self,
        session: &Session,
        id: GroupId,
    ) -> Result<(), ShiftServiceError> {
        session.require_admin("managing groups")?;
        self.store.delete_group(id).await?;
        info!(group_id = %id, "group deleted");
        Ok(())
    }

    /// Leave the group when already a member; otherwise make it the user's only group.
    pub async fn toggle_membership(
        &self,
        session: &Session,
        user_id: UserId,
        group_id: GroupId,
    ) -> Result<MembershipChange, ShiftServiceError> {
        session.require_admin("managing memberships")?;
        let membership = Membership { user_id, group_id };
        let current = self.store.memberships_for(user_id).await?;

        if current.contains(&membership) {
            self.store.remove_membership(membership).await?;
            info!(user_id = %user_id, group_id = %group_id, "membership removed");
            return Ok(MembershipChange::Left);
        }

        self.store.replace_memberships(membership).await?;
        info!(user_id = %user_id, group_id = %group_id, replaced = current.len(), "membership set");
        Ok(MembershipChange::Joined)
    }

    /// Add `delta` strikes, never dropping below zero.
    pub async fn adjust_strikes(
        &self,
        session: &Session,
        user_id: UserId,
        delta: i32,
    ) -> Result<Profile, ShiftServiceError> {
        session.require_admin("adjusting strikes")?;
        let mut profile = self
            .store
            .fetch_profile(user_id)
            .await?
            .ok_or(ShiftServiceError::Repository(RepositoryError::NotFound))?;

        profile.strikes = profile.strikes.saturating_add_signed(delta);
        self.store.update_profile(profile.clone()).await?;
        info!(user_id = %user_id, delta, strikes = profile.strikes, "strikes adjusted");
        Ok(profile)
    }

    /// Every profile with its group ids, by full name.
    pub async fn staff(&self, session: &Session) -> Result<Vec<StaffMember>, ShiftServiceError> {
        session.require_admin("listing staff")?;
        let memberships = self.store.memberships().await?;
        let mut profiles = self.store.profiles().await?;
        profiles.sort_by(|a, b| a.full_name.cmp(&b.full_name));

        Ok(profiles
            .into_iter()
            .map(|profile| {
                let groups = memberships
                    .iter()
                    .filter(|membership| membership.user_id == profile.id)
                    .map(|membership| membership.group_id)
                    .collect();
                StaffMember { profile, groups }
            })
            .collect())
    }
}
