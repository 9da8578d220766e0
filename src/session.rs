/*
 *  session.rs
 *
 *  nexusd - iCUE Nexus display daemon
 *  (c) 2025-26 nexusd authors
 *
 *  Owns the relationship between the process and the one physical
 *  panel: discovery, claiming, health checks and reconnection with
 *  exponential backoff. The device handle never leaves this module
 *  unguarded; every other component goes through the session mutex.
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
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use log::{debug, error, info, warn};
use rusb::{Context, DeviceHandle, UsbContext};
use thiserror::Error;

use crate::constants::{
    MAX_RECONNECT_ATTEMPTS, MONITOR_INTERVAL, PRODUCT_ID, USB_CONFIGURATION, USB_INTERFACE,
    VENDOR_ID,
};

#[derive(Debug, Error)]
pub enum SessionError {
    /// Discovery found zero matching devices. Recoverable, the monitor
    /// retries on its next wakeup.
    #[error("no iCUE Nexus device found")]
    NoDeviceFound,

    /// A found device could not be claimed or configured. Recoverable.
    #[error("device init failed during {stage}: {source}")]
    DeviceInit {
        stage: &'static str,
        source: rusb::Error,
    },
}

pub(crate) struct SessionInner {
    pub(crate) handle: Option<DeviceHandle<Context>>,
    pub(crate) connected: bool,
}

/// Process-wide singleton for the device relationship.
pub struct Session {
    context: Context,
    inner: Mutex<SessionInner>,
}

impl Session {
    pub fn new() -> Result<Self, SessionError> {
        let context = Context::new().map_err(|source| SessionError::DeviceInit {
            stage: "usb context",
            source,
        })?;
        Ok(Session {
            context,
            inner: Mutex::new(SessionInner {
                handle: None,
                connected: false,
            }),
        })
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, SessionInner> {
        // a poisoned lock only means a panicking writer; the state it
        // left behind is still a valid disconnected-or-connected session
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Enumerates, claims and configures the panel, then installs the
    /// fresh handle. Any stale handle is closed first.
    pub fn connect(&self) -> Result<(), SessionError> {
        let handle = self.open_device()?;

        let mut inner = self.lock();
        drop(inner.handle.take());
        inner.handle = Some(handle);
        inner.connected = true;
        Ok(())
    }

    fn open_device(&self) -> Result<DeviceHandle<Context>, SessionError> {
        let init = |stage: &'static str| {
            move |source: rusb::Error| SessionError::DeviceInit { stage, source }
        };

        let devices = self.context.devices().map_err(init("enumeration"))?;
        let device = devices
            .iter()
            .find(|d| {
                d.device_descriptor()
                    .map(|desc| desc.vendor_id() == VENDOR_ID && desc.product_id() == PRODUCT_ID)
                    .unwrap_or(false)
            })
            .ok_or(SessionError::NoDeviceFound)?;

        let mut handle = device.open().map_err(init("open"))?;

        match handle.set_auto_detach_kernel_driver(true) {
            Ok(()) | Err(rusb::Error::NotSupported) => {}
            Err(source) => {
                return Err(SessionError::DeviceInit {
                    stage: "kernel auto-detach",
                    source,
                });
            }
        }

        handle
            .set_active_configuration(USB_CONFIGURATION)
            .map_err(init("set configuration"))?;
        handle
            .claim_interface(USB_INTERFACE)
            .map_err(init("claim interface"))?;

        Ok(handle)
    }

    pub fn is_connected(&self) -> bool {
        self.lock().connected
    }

    /// Lightweight liveness probe on an already connected handle.
    /// Returns a boolean, never an error.
    pub fn health_check(&self) -> bool {
        let inner = self.lock();
        match inner.handle.as_ref() {
            Some(handle) => handle.active_configuration().is_ok(),
            None => {
                debug!("health check: device handle is not available");
                false
            }
        }
    }

    /// Closes the handle and flips to disconnected. Used both by the
    /// monitor and by the transport fast path after a write failure.
    pub fn reset(&self) {
        let mut inner = self.lock();
        drop(inner.handle.take());
        inner.connected = false;
    }

    /// Bounded reconnection: 10 attempts with delays doubling from 1s.
    /// Returns true on success; on exhaustion the session stays
    /// disconnected and the monitor retries on its next wakeup.
    pub async fn reconnect_with_backoff(&self) -> bool {
        for attempt in 0..MAX_RECONNECT_ATTEMPTS {
            match self.connect() {
                Ok(()) => {
                    info!("iCUE Nexus: successfully reconnected");
                    return true;
                }
                Err(e) => {
                    if attempt + 1 < MAX_RECONNECT_ATTEMPTS {
                        let delay = backoff_delay(attempt);
                        info!(
                            "iCUE Nexus: reconnection attempt {} failed ({}), waiting {:?}",
                            attempt + 1,
                            e,
                            delay
                        );
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }
        error!("iCUE Nexus: failed all reconnection attempts");
        false
    }
}

/// Delay before retry `attempt + 1`: 1s, 2s, 4s, ... 256s.
pub fn backoff_delay(attempt: usize) -> Duration {
    Duration::from_secs(1u64 << attempt.min(63))
}

/// Periodic connection keeper. Reconnects when disconnected; when
/// connected, demotes the session on a failed health check so the next
/// wakeup's retry sequence can recover it.
pub async fn run_monitor(session: Arc<Session>) {
    let mut ticker = tokio::time::interval(MONITOR_INTERVAL);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;

        if !session.is_connected() {
            session.reconnect_with_backoff().await;
            continue;
        }

        if !session.health_check() {
            warn!("iCUE Nexus: health check failed, closing device");
            session.reset();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_from_one_second() {
        let delays: Vec<u64> = (0..MAX_RECONNECT_ATTEMPTS - 1)
            .map(|i| backoff_delay(i).as_secs())
            .collect();
        assert_eq!(delays, vec![1, 2, 4, 8, 16, 32, 64, 128, 256]);
    }

    #[test]
    fn new_session_starts_disconnected() {
        let Ok(session) = Session::new() else {
            // libusb unavailable in this environment, nothing to assert
            return;
        };
        assert!(!session.is_connected());
        assert!(!session.health_check());
        // reset on a never-connected session is a no-op
        session.reset();
        assert!(!session.is_connected());
    }
}
