/*
 *  display.rs
 *
 *  nexusd - iCUE Nexus display daemon
 *  (c) 2025-26 nexusd authors
 *
 *  The scheduler: one event loop merging temperature, network,
 *  weather and preference updates into an aggregate state, and pacing
 *  render+transmit at 24 Hz. Weather and preference changes redraw
 *  immediately; sensor updates coalesce into the next tick. The tick
 *  renders unconditionally so the clock and animated background keep
 *  moving with no sensor activity.
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
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::error;
use tokio::sync::mpsc;

use crate::config::Config;
use crate::constants::{REFRESH_RATE_HZ, WEATHER_STALE_AFTER};
use crate::draw::Renderer;
use crate::metrics::SystemTemps;
use crate::netstats::NetRates;
use crate::session::Session;
use crate::transport;
use crate::weather::WeatherInfo;

/// Last-known values from every producer. Mutated only inside the
/// scheduler loop; each field tolerates staleness independently.
pub struct AggregateState {
    pub cpu_temp: f64,
    pub gpu_temp: f64,
    pub net: NetRates,
    pub weather: Option<WeatherInfo>,
    pub last_weather_refresh: Option<Instant>,
    pub prefs: Config,
}

impl AggregateState {
    pub fn new(prefs: Config) -> Self {
        AggregateState {
            cpu_temp: 0.0,
            gpu_temp: 0.0,
            net: NetRates::default(),
            weather: None,
            last_weather_refresh: None,
            prefs,
        }
    }

    fn apply_temps(&mut self, temps: SystemTemps) {
        self.cpu_temp = temps.cpu;
        self.gpu_temp = temps.gpu;
    }

    fn apply_net(&mut self, rates: NetRates) {
        self.net = rates;
    }

    fn apply_weather(&mut self, info: WeatherInfo) {
        self.weather = Some(info);
        self.last_weather_refresh = Some(Instant::now());
    }

    /// Applies new preferences; returns true when the weather snapshot
    /// is stale enough to warrant an out-of-band refetch.
    fn apply_prefs(&mut self, prefs: Config) -> bool {
        self.prefs = prefs;
        self.last_weather_refresh
            .map(|t| t.elapsed() > WEATHER_STALE_AFTER)
            .unwrap_or(true)
    }
}

/// Receiving ends of every producer, plus the handle for poking the
/// weather monitor.
pub struct SchedulerInputs {
    pub temp_rx: mpsc::Receiver<SystemTemps>,
    pub net_rx: mpsc::Receiver<NetRates>,
    pub weather_rx: mpsc::Receiver<WeatherInfo>,
    pub prefs_rx: mpsc::Receiver<Config>,
    pub weather_refresh_tx: mpsc::Sender<()>,
}

/// The single event loop. Events are handled one at a time; render and
/// transmit are bounded synchronous work inside an iteration, so no
/// two frames are ever in flight together.
pub async fn run_display_loop(
    session: Arc<Session>,
    mut renderer: Renderer,
    initial_prefs: Config,
    mut inputs: SchedulerInputs,
) {
    let mut state = AggregateState::new(initial_prefs);

    let mut ticker =
        tokio::time::interval(Duration::from_micros(1_000_000 / REFRESH_RATE_HZ as u64));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            Some(temps) = inputs.temp_rx.recv() => {
                state.apply_temps(temps);
                // coalesced into the next tick
            }
            Some(rates) = inputs.net_rx.recv() => {
                state.apply_net(rates);
            }
            Some(info) = inputs.weather_rx.recv() => {
                state.apply_weather(info);
                // weather changes are rare and user-visible
                redraw(&session, &renderer, &state);
            }
            Some(prefs) = inputs.prefs_rx.recv() => {
                if prefs.background_image != state.prefs.background_image {
                    renderer = Renderer::new(&prefs);
                }
                if state.apply_prefs(prefs) {
                    let _ = inputs.weather_refresh_tx.try_send(());
                }
                redraw(&session, &renderer, &state);
            }
            _ = ticker.tick() => {
                redraw(&session, &renderer, &state);
            }
        }
    }
}

/// One render+transmit cycle. Disconnected is a quiet success so a
/// dead handle costs nothing per tick; a transmit failure resets the
/// session immediately instead of waiting for the next monitor pass.
fn redraw(session: &Session, renderer: &Renderer, state: &AggregateState) {
    if !session.is_connected() {
        return;
    }

    let frame = renderer.render(state);
    if let Err(e) = transport::send_frame(session, &frame) {
        error!("Screen update failed: {e}");
        session.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot() -> WeatherInfo {
        WeatherInfo {
            location: "Jersey City, NJ".into(),
            temperature: 21.0,
            condition: "Cloudy".into(),
            wind_speed: "14.0".into(),
        }
    }

    #[test]
    fn sensor_updates_merge_without_touching_weather() {
        let mut state = AggregateState::new(Config::default());
        state.apply_temps(SystemTemps { cpu: 61.5, gpu: 48.0 });
        state.apply_net(NetRates { sent_kbps: 120, received_kbps: 3400 });

        assert_eq!(state.cpu_temp, 61.5);
        assert_eq!(state.net.received_kbps, 3400);
        assert!(state.weather.is_none());
        assert!(state.last_weather_refresh.is_none());
    }

    #[test]
    fn weather_merge_stamps_refresh_time() {
        let mut state = AggregateState::new(Config::default());
        state.apply_weather(snapshot());
        assert!(state.weather.is_some());
        assert!(state.last_weather_refresh.is_some());
    }

    #[test]
    fn prefs_without_weather_history_request_a_refresh() {
        let mut state = AggregateState::new(Config::default());
        assert!(state.apply_prefs(Config::default()));

        state.apply_weather(snapshot());
        // fresh snapshot, no refetch needed
        assert!(!state.apply_prefs(Config::default()));
    }

    #[test]
    fn weather_update_while_disconnected_transmits_nothing() {
        let Ok(session) = Session::new() else {
            return;
        };
        let renderer = Renderer::new(&Config::default());
        let mut state = AggregateState::new(Config::default());

        state.apply_weather(snapshot());
        redraw(&session, &renderer, &state);

        assert!(state.weather.is_some());
        assert!(!session.is_connected());
    }
}
