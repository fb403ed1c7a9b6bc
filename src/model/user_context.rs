use serde::{Deserialize, Serialize};

/// Caller identity taken from request headers, recorded on catalog audit fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserContext {
    pub user_id: String,
    pub user_email: Option<String>,
    pub user_name: Option<String>,
}

impl UserContext {
    pub fn new(user_id: String) -> Self {
        Self {
            user_id,
            user_email: None,
            user_name: None,
        }
    }

    pub fn with_details(user_id: String, email: Option<String>, name: Option<String>) -> Self {
        Self {
            user_id,
            user_email: email,
            user_name: name,
        }
    }

    /// Context for seed loading and other internal writes
    pub fn system() -> Self {
        Self {
            user_id: "system".to_string(),
            user_email: Some("system@liftworks.internal".to_string()),
            user_name: Some("System".to_string()),
        }
    }

    /// Fallback when a request carries no identity headers
    pub fn anonymous() -> Self {
        Self {
            user_id: "anonymous".to_string(),
            user_email: None,
            user_name: None,
        }
    }
}

impl Default for UserContext {
    fn default() -> Self {
        Self::anonymous()
    }
}
