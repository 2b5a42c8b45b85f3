//! User profile contact details.

use serde::{Deserialize, Serialize};

use crate::domain::value_objects::UserId;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub user_id: UserId,
    pub full_name: String,
    pub email: String,
    pub phone: String,
}

impl Profile {
    pub fn empty(user_id: UserId) -> Self {
        Self { user_id, full_name: String::new(), email: String::new(), phone: String::new() }
    }
}
