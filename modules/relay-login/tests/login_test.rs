//! End-to-end: login producer → bus → audit listener.

use std::io::{self, Write};
use std::sync::{Arc, Mutex};

use anyhow::{bail, Result};
use chrono::{TimeZone, Utc};
use relay_bus::{CollectingReporter, DispatcherOptions, JsonDispatcher};
use relay_login::events::USER_LOGGED_IN;
use relay_login::{register_user_listeners, AuditSink, UserLoggedIn, UserService};
use serde_json::json;

// ---------------------------------------------------------------------------
// Test helpers
// ---------------------------------------------------------------------------

fn buffer_sink() -> (AuditSink, Arc<Mutex<Vec<u8>>>) {
    let buffer = Arc::new(Mutex::new(Vec::new()));
    let sink: AuditSink = buffer.clone();
    (sink, buffer)
}

fn contents(buffer: &Arc<Mutex<Vec<u8>>>) -> String {
    String::from_utf8(buffer.lock().unwrap().clone()).unwrap()
}

/// A sink whose writes always fail.
struct BrokenSink;

impl Write for BrokenSink {
    fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
        Err(io::Error::new(io::ErrorKind::BrokenPipe, "pipe closed"))
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

// =========================================================================
// Tests
// =========================================================================

#[test]
fn published_login_writes_exactly_one_audit_line() {
    let bus = JsonDispatcher::new();
    let (sink, buffer) = buffer_sink();
    register_user_listeners(&bus, sink).unwrap();

    bus.publish(
        USER_LOGGED_IN,
        &json!({"name": "Gustavo", "time": "2024-01-01T00:00:00.000Z"}),
    )
    .unwrap();

    assert_eq!(
        contents(&buffer),
        "Usuario logueado: Gustavo a las 2024-01-01T00:00:00.000Z\n"
    );
}

#[test]
fn user_service_login_reaches_the_listener() {
    let bus = Arc::new(JsonDispatcher::new());
    let (sink, buffer) = buffer_sink();
    register_user_listeners(&bus, sink).unwrap();
    let service = UserService::new(Arc::clone(&bus));
    let at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();

    let event = service.login_user_at("Gustavo", at).unwrap();

    assert_eq!(
        event,
        UserLoggedIn {
            name: "Gustavo".into(),
            time: "2024-01-01T00:00:00.000Z".into(),
        }
    );
    assert_eq!(
        contents(&buffer),
        "Usuario logueado: Gustavo a las 2024-01-01T00:00:00.000Z\n"
    );
}

#[test]
fn login_now_uses_a_current_timestamp() {
    let bus = Arc::new(JsonDispatcher::new());
    let service = UserService::new(Arc::clone(&bus));
    let before = Utc::now();

    let event = service.login_user("Ana").unwrap();

    let logged_at = chrono::DateTime::parse_from_rfc3339(&event.time).unwrap();
    assert!(event.time.ends_with('Z'));
    assert!(logged_at.timestamp_millis() >= before.timestamp_millis());
}

#[test]
fn login_without_listeners_is_fine() {
    let bus = Arc::new(JsonDispatcher::new());
    let service = UserService::new(bus);

    assert!(service.login_user("nobody-listening").is_ok());
}

#[test]
fn broken_sink_fails_the_audit_handler_but_not_its_siblings() {
    let reporter = Arc::new(CollectingReporter::new());
    let bus = Arc::new(JsonDispatcher::with_options(
        DispatcherOptions::builder()
            .reporter(reporter.clone())
            .build(),
    ));
    register_user_listeners(&bus, Arc::new(Mutex::new(BrokenSink))).unwrap();
    let greeted = Arc::new(Mutex::new(Vec::new()));
    let names = Arc::clone(&greeted);
    bus.subscribe_event(move |user: UserLoggedIn| -> Result<()> {
        names.lock().unwrap().push(user.name);
        Ok(())
    })
    .unwrap();

    let err = UserService::new(Arc::clone(&bus))
        .login_user("Gustavo")
        .unwrap_err();

    assert_eq!(*greeted.lock().unwrap(), vec!["Gustavo"]);
    assert_eq!(err.event().as_str(), "user:loggedIn");
    assert_eq!(err.failures().len(), 1);
    assert_eq!(err.failures()[0].handler, "login-audit");
    let reported = reporter.failures();
    assert_eq!(reported.len(), 1);
    assert!(reported[0].error.starts_with("writing audit line"));
}

#[test]
fn malformed_login_payload_is_reported_not_panicked() {
    let reporter = Arc::new(CollectingReporter::new());
    let bus = JsonDispatcher::with_options(
        DispatcherOptions::builder()
            .reporter(reporter.clone())
            .build(),
    );
    let (sink, buffer) = buffer_sink();
    register_user_listeners(&bus, sink).unwrap();
    bus.subscribe(USER_LOGGED_IN, |_: &serde_json::Value| -> Result<()> {
        bail!("downstream unavailable")
    })
    .unwrap();

    let err = bus
        .publish(USER_LOGGED_IN, &json!({"name": "Gustavo"}))
        .unwrap_err();

    assert!(contents(&buffer).is_empty());
    assert_eq!(err.failures().len(), 2);
    assert!(reporter.failures()[0]
        .error
        .starts_with("payload does not match 'user:loggedIn'"));
}
