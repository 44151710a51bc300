//! User operations that announce what they did on the bus.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use relay_bus::{JsonDispatcher, PublishError};

use crate::events::UserLoggedIn;

pub struct UserService {
    bus: Arc<JsonDispatcher>,
}

impl UserService {
    pub fn new(bus: Arc<JsonDispatcher>) -> Self {
        Self { bus }
    }

    /// Log `name` in now and emit `user:loggedIn`.
    pub fn login_user(&self, name: &str) -> Result<UserLoggedIn, PublishError> {
        self.login_user_at(name, Utc::now())
    }

    pub fn login_user_at(
        &self,
        name: &str,
        at: DateTime<Utc>,
    ) -> Result<UserLoggedIn, PublishError> {
        let event = UserLoggedIn::new(name, at);
        debug!(user = %event.name, "Emitting login");
        if let Err(err) = self.bus.emit(&event) {
            warn!(event = %err.event(), error = %err, "Login event delivery failed");
            return Err(err);
        }
        Ok(event)
    }
}
