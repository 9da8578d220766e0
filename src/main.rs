/*
 *  main.rs
 *
 *  nexusd - iCUE Nexus display daemon
 *  (c) 2025-26 nexusd authors
 *
 *  Startup wiring: configuration, the device session, producer tasks
 *  and the display scheduler, then wait for a termination signal.
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the GNU General Public License as published by
 *  the Free Software Foundation, either version 3 of the License, or
 *  (at your option) any later version.
 *
 *  This program is distributed in the hope that it will be useful,
 *  but WITHOUT ANY WARRANTY; without even the implied warranty of
 *  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *  GNU General Public License for more details.
 *
 *  See <http://www.gnu.org/licenses/> to get a copy of the GNU General
 *  Public License.
 *
 */
use std::sync::{Arc, RwLock};

use clap::Parser;
use env_logger::Env;
use log::{info, warn};
use tokio::signal::unix::{SignalKind, signal};
use tokio::sync::mpsc;

mod color;
mod config;
mod constants;
mod display;
mod draw;
mod font;
mod geoloc;
mod metrics;
mod netstats;
mod session;
mod transport;
mod weather;

use config::Cli;
use session::Session;

include!(concat!(env!("OUT_DIR"), "/build_info.rs"));

/// Waits for SIGINT, SIGTERM or SIGHUP so shutdown can run the
/// session teardown instead of dying mid-transmission.
async fn signal_handler() {
    let mut sigint = signal(SignalKind::interrupt()).expect("failed to register SIGINT handler");
    let mut sigterm = signal(SignalKind::terminate()).expect("failed to register SIGTERM handler");
    let mut sighup = signal(SignalKind::hangup()).expect("failed to register SIGHUP handler");

    tokio::select! {
        _ = sigint.recv() => info!("Received SIGINT"),
        _ = sigterm.recv() => info!("Received SIGTERM"),
        _ = sighup.recv() => info!("Received SIGHUP"),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = cli.log_level.clone().unwrap_or_else(|| "info".to_string());
    env_logger::Builder::from_env(Env::default().default_filter_or(filter)).init();

    info!("nexusd v{} (built {})", env!("CARGO_PKG_VERSION"), BUILD_DATE);

    let cfg = config::load(&cli)?;
    let shared_cfg = Arc::new(RwLock::new(cfg.clone()));

    // the device session; a panel that is not plugged in yet is fine,
    // the monitor keeps trying in the background
    let session = Arc::new(Session::new()?);
    match session.connect() {
        Ok(()) => info!("iCUE Nexus: connected"),
        Err(e) => warn!("iCUE Nexus: not connected yet ({e})"),
    }
    tokio::spawn(session::run_monitor(session.clone()));

    // producers feed the scheduler over bounded channels and never
    // block on it
    let (temp_tx, temp_rx) = mpsc::channel(1);
    let (net_tx, net_rx) = mpsc::channel(1);
    let (weather_tx, weather_rx) = mpsc::channel(1);
    let (prefs_tx, prefs_rx) = mpsc::channel(1);
    let (weather_refresh_tx, weather_refresh_rx) = mpsc::channel(1);

    tokio::spawn(metrics::run_temp_monitor(session.clone(), temp_tx));
    tokio::spawn(netstats::run_network_monitor(session.clone(), net_tx));
    tokio::spawn(weather::run_weather_monitor(
        shared_cfg.clone(),
        weather_tx,
        weather_refresh_rx,
    ));
    tokio::spawn(config::run_watcher(
        cli.config.clone(),
        shared_cfg.clone(),
        prefs_tx,
        weather_refresh_tx.clone(),
    ));

    let renderer = draw::Renderer::new(&cfg);
    let inputs = display::SchedulerInputs {
        temp_rx,
        net_rx,
        weather_rx,
        prefs_rx,
        weather_refresh_tx,
    };
    tokio::spawn(display::run_display_loop(
        session.clone(),
        renderer,
        cfg,
        inputs,
    ));

    signal_handler().await;

    info!("Main application exiting, closing device");
    session.reset();

    Ok(())
}
