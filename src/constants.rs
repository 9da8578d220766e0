/*
 *  constants.rs
 *
 *  nexusd - iCUE Nexus display daemon
 *  (c) 2025-26 nexusd authors
 *
 *  Device identity, frame geometry and wire protocol constants.
 *  All of these are hardware contracts with the iCUE Nexus firmware.
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
use std::time::Duration;

/// Corsair vendor ID.
pub const VENDOR_ID: u16 = 0x1b1c;
/// iCUE Nexus product ID.
pub const PRODUCT_ID: u16 = 0x1b8e;

/// USB configuration the panel expects to be active.
pub const USB_CONFIGURATION: u8 = 1;
/// Interface carrying both endpoints.
pub const USB_INTERFACE: u8 = 0;
/// Bulk OUT endpoint for frame data (address with direction bit clear).
pub const OUT_ENDPOINT: u8 = 0x02;
/// Interrupt IN endpoint for the touch overlay (orthogonal subsystem).
#[allow(dead_code)]
pub const IN_ENDPOINT: u8 = 0x81;

/// Display width in pixels.
pub const WIDTH: usize = 640;
/// Display height in pixels.
pub const HEIGHT: usize = 48;
/// Bytes per pixel (packed RGBA).
pub const BYTES_PER_PIXEL: usize = 4;
/// One full frame: 640 * 48 * 4 = 122,880 bytes.
pub const FRAME_LEN: usize = WIDTH * HEIGHT * BYTES_PER_PIXEL;
/// Total pixels per frame.
pub const FRAME_PIXELS: usize = WIDTH * HEIGHT;

/// Wire transmission unit size.
pub const CHUNK_LEN: usize = 4096;
/// Pixels carried per chunk.
pub const PIXELS_PER_CHUNK: usize = 254;
/// Chunks per frame, indices 0..=120.
pub const CHUNKS_PER_FRAME: usize = 121;
/// Pixel payload starts after the 8 byte header.
pub const CHUNK_HEADER_LEN: usize = 8;

/// Display refresh cadence in Hz.
pub const REFRESH_RATE_HZ: u32 = 24;
/// Background animation frame period, in nanoseconds (1s / 24).
pub const BACKGROUND_FRAME_NANOS: i64 = 41_666_667;

/// How often the connection monitor wakes up.
pub const MONITOR_INTERVAL: Duration = Duration::from_secs(5);
/// Reconnection attempts per monitor wakeup before giving up.
pub const MAX_RECONNECT_ATTEMPTS: usize = 10;

/// Bulk write timeout per chunk.
pub const WRITE_TIMEOUT: Duration = Duration::from_secs(1);

/// Producer cadences.
pub const TEMP_INTERVAL: Duration = Duration::from_secs(5);
pub const NETWORK_INTERVAL: Duration = Duration::from_secs(1);
pub const WEATHER_INTERVAL: Duration = Duration::from_secs(600);
pub const CONFIG_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// A preference change forces a weather refetch when the last one is
/// older than this.
pub const WEATHER_STALE_AFTER: Duration = Duration::from_secs(30);
