use serde::{Deserialize, Serialize};

/// The signed-in user, as injected by the auth middleware.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentUser {
    pub id: String,
}
