//! ashlar - a stacking window manager for X11
//!
//! Startup: load the config, open the display, acquire the manager role
//! and hand the session the event loop. Exit code 1 means the display
//! could not be opened; exit code 2 means another manager is running.

mod config;
mod shared;
mod wm;

use std::process::ExitCode;

use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::wm::session::{AnotherWmRunning, Session};

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let replace = std::env::args().any(|arg| arg == "--replace");

    let config = match Config::load() {
        Ok(config) => config,
        Err(err) => {
            error!("failed to load configuration: {err:#}");
            Config::default()
        }
    };

    let (conn, screen_num) = match x11rb::connect(None) {
        Ok(connected) => connected,
        Err(err) => {
            error!("failed to open display: {err:#}");
            return ExitCode::from(1);
        }
    };
    info!("connected to display, screen {}", screen_num);

    let mut session = match Session::new(conn, screen_num, config, replace) {
        Ok(session) => session,
        Err(err) => {
            if err.downcast_ref::<AnotherWmRunning>().is_some() {
                error!("{err:#}");
                return ExitCode::from(2);
            }
            error!("startup failed: {err:#}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(err) = session.run() {
        error!("session error: {err:#}");
        return ExitCode::FAILURE;
    }
    info!("clean exit");
    ExitCode::SUCCESS
}
