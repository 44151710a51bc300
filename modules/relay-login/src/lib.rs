//! Login audit wiring on top of `relay-bus`.
//!
//! `UserService` announces logins as `user:loggedIn` events; the audit
//! listener writes one line per login to a sink. Neither knows about the
//! other.

pub mod config;
pub mod events;
pub mod listeners;
pub mod service;

pub use config::LoginConfig;
pub use events::UserLoggedIn;
pub use listeners::{audit_line, register_user_listeners, AuditSink};
pub use service::UserService;
