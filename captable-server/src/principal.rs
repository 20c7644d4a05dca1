//! The identity an operation runs as

use std::fmt;

use serde::{Deserialize, Serialize};

/// Authenticated user on whose behalf an operation runs.
///
/// Authentication happens upstream; every service call receives the
/// principal explicitly.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActingPrincipal {
    user_id: String,
}

impl ActingPrincipal {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self { user_id: user_id.into() }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn is(&self, user_id: &str) -> bool {
        self.user_id == user_id
    }
}

impl fmt::Display for ActingPrincipal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.user_id)
    }
}
