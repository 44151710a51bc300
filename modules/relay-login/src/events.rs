use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use relay_bus::Event;

pub const USER_LOGGED_IN: &str = "user:loggedIn";

/// A user finished logging in. `time` is ISO-8601 UTC with milliseconds,
/// e.g. `2024-01-01T00:00:00.000Z`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserLoggedIn {
    pub name: String,
    pub time: String,
}

impl UserLoggedIn {
    pub fn new(name: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            name: name.into(),
            time: at.to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }
}

impl Event for UserLoggedIn {
    const NAME: &'static str = USER_LOGGED_IN;
}
