//! Profile contact details for the signed-in user.

use std::sync::Arc;

use crate::domain::aggregates::Profile;
use crate::domain::value_objects::Identity;
use crate::error::{AppError, Result};
use crate::store::ProfileStore;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProfileUpdate {
    pub full_name: String,
    pub email: String,
    pub phone: String,
}

pub struct ProfileService {
    profiles: Arc<dyn ProfileStore>,
}

impl ProfileService {
    pub fn new(profiles: Arc<dyn ProfileStore>) -> Self { Self { profiles } }

    /// A user without a stored profile gets an empty one.
    pub async fn get(&self, identity: Identity) -> Result<Profile> {
        let user = identity.user().ok_or(AppError::Unauthenticated)?;
        Ok(self.profiles.get(user).await?.unwrap_or_else(|| Profile::empty(user)))
    }

    #[tracing::instrument(skip(self, update))]
    pub async fn update(&self, identity: Identity, update: ProfileUpdate) -> Result<Profile> {
        let user = identity.user().ok_or(AppError::Unauthenticated)?;
        let profile = Profile { user_id: user, full_name: update.full_name, email: update.email, phone: update.phone };
        self.profiles.upsert(&profile).await?;
        Ok(profile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::value_objects::UserId;
    use crate::store::memory::MemoryProfiles;

    #[tokio::test]
    async fn test_profile_defaults_and_update() {
        let service = ProfileService::new(Arc::new(MemoryProfiles::new()));
        let me = Identity::User(UserId::new(5));
        assert_eq!(service.get(me).await.unwrap(), Profile::empty(UserId::new(5)));
        let update = ProfileUpdate { full_name: "Ivan".into(), email: "ivan@example.com".into(), phone: "+7".into() };
        service.update(me, update).await.unwrap();
        assert_eq!(service.get(me).await.unwrap().full_name, "Ivan");
        assert!(matches!(service.get(Identity::Anonymous).await, Err(AppError::Unauthenticated)));
    }
}
