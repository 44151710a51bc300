use std::io;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use tracing::info;
use tracing_subscriber::EnvFilter;

use relay_bus::JsonDispatcher;
use relay_login::{register_user_listeners, LoginConfig, UserService};

fn main() -> Result<()> {
    // Logs go to stderr; stdout carries only audit lines.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("relay=info".parse()?)
                .add_directive("login_audit=info".parse()?),
        )
        .with_writer(io::stderr)
        .init();

    info!("Login audit starting...");

    let config = LoginConfig::from_env()?;
    let bus = Arc::new(JsonDispatcher::with_options(config.dispatcher_options()));

    register_user_listeners(&bus, Arc::new(Mutex::new(io::stdout())))?;

    let service = UserService::new(Arc::clone(&bus));
    let event = service.login_user(&config.login_user)?;

    info!(user = %event.name, time = %event.time, "Login simulated");
    Ok(())
}
