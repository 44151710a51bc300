//! Listeners for user events.

use std::io::Write;
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Context};
use tracing::info;

use relay_bus::{BusResult, JsonDispatcher, Subscription};

use crate::events::UserLoggedIn;

/// Where audit lines go. Stdout in the binary, a buffer in tests.
pub type AuditSink = Arc<Mutex<dyn Write + Send>>;

pub fn audit_line(user: &UserLoggedIn) -> String {
    format!("Usuario logueado: {} a las {}", user.name, user.time)
}

/// Subscribe the login-audit handler. Call before any producer runs.
pub fn register_user_listeners(
    bus: &JsonDispatcher,
    sink: AuditSink,
) -> BusResult<Vec<Subscription>> {
    let login_audit = bus.subscribe_event_labeled("login-audit", move |user: UserLoggedIn| {
        info!(user = %user.name, time = %user.time, "User logged in");

        let mut out = sink.lock().map_err(|_| anyhow!("audit sink poisoned"))?;
        writeln!(out, "{}", audit_line(&user)).context("writing audit line")?;
        out.flush().context("flushing audit sink")?;
        Ok(())
    })?;

    Ok(vec![login_audit])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn audit_line_format() {
        let user = UserLoggedIn {
            name: "Gustavo".into(),
            time: "2024-01-01T00:00:00.000Z".into(),
        };

        assert_eq!(
            audit_line(&user),
            "Usuario logueado: Gustavo a las 2024-01-01T00:00:00.000Z"
        );
    }

    #[test]
    fn registers_one_handler_on_user_logged_in() {
        let bus = JsonDispatcher::new();
        let sink: AuditSink = Arc::new(Mutex::new(Vec::<u8>::new()));

        let subs = register_user_listeners(&bus, sink).unwrap();

        assert_eq!(subs.len(), 1);
        assert_eq!(subs[0].event.as_str(), "user:loggedIn");
        assert_eq!(bus.handler_count("user:loggedIn"), 1);
    }
}
