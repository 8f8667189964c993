//! User profile model (`Users` collection).

use crate::model::note::UserId;
use serde::{Deserialize, Serialize};

/// Profile written once at sign-up or first federated sign-in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(rename = "userId")]
    pub user_id: UserId,
    pub email: String,
    pub username: String,
}
