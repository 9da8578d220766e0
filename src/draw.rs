/*
 *  draw.rs
 *
 *  nexusd - iCUE Nexus display daemon
 *  (c) 2025-26 nexusd authors
 *
 *  Turns the aggregate state into one full RGBA frame: background,
 *  CPU/GPU temperatures, network rates, clock and weather summary.
 *  Individual elements that cannot be composed (no weather yet, no
 *  background asset) are skipped, never fatal; the frame is always
 *  fully sized.
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
use chrono::{DateTime, Local};
use log::warn;
use tiny_skia::Pixmap;

use crate::color::{Rgba, parse_color};
use crate::config::{self, Config, TIME_FORMAT_12H, UNIT_IMPERIAL, UNIT_METRIC};
use crate::constants::{BACKGROUND_FRAME_NANOS, BYTES_PER_PIXEL, FRAME_LEN, HEIGHT, WIDTH};
use crate::display::AggregateState;
use crate::font::{draw_text, text_width};

/// Text scale: 5x7 glyphs doubled to 10x14 read well on the 48px strip.
const TEXT_SCALE: usize = 2;
/// Baseline rows for the two text lines.
const LINE1_Y: i32 = 4;
const LINE2_Y: i32 = 26;
/// Left margin for the temperature column; right margin for clock and
/// weather.
const LEFT_X: i32 = 10;
const RIGHT_MARGIN: i32 = 10;
/// Network column sits at a quarter of the panel width.
const NET_X: i32 = (WIDTH / 4) as i32;

pub struct Renderer {
    /// Background frames, decoded once at startup. Multiple frames give
    /// the background its own animation clock; empty means solid fill.
    background: Vec<Pixmap>,
}

impl Renderer {
    pub fn new(cfg: &Config) -> Renderer {
        Renderer {
            background: load_background_frames(&cfg.background_image),
        }
    }

    /// Composes one frame from the current aggregate state.
    pub fn render(&self, state: &AggregateState) -> Vec<u8> {
        self.render_at(state, Local::now())
    }

    /// Deterministic variant taking the clock as input.
    fn render_at(&self, state: &AggregateState, now: DateTime<Local>) -> Vec<u8> {
        let mut frame = vec![0u8; FRAME_LEN];

        // preferences are copied into the state before render, so a
        // frame never mixes old and new colors across elements
        let text_color = parse_color(&state.prefs.text_color, Rgba::WHITE);
        let bg_color = parse_color(&state.prefs.background_color, Rgba::BLACK);

        self.paint_background(&mut frame, bg_color, now);

        // temperatures, left column
        let cpu = format!("CPU {:.1}°C", state.cpu_temp);
        let gpu = format!("GPU {:.1}°C", state.gpu_temp);
        draw_text(&mut frame, LEFT_X, LINE1_Y, &cpu, text_color, TEXT_SCALE);
        draw_text(&mut frame, LEFT_X, LINE2_Y, &gpu, text_color, TEXT_SCALE);

        // network rates, center-left
        let sent = format_network_rate("UP", state.net.sent_kbps);
        let recv = format_network_rate("DN", state.net.received_kbps);
        draw_text(&mut frame, NET_X, LINE1_Y, &sent, text_color, TEXT_SCALE);
        draw_text(&mut frame, NET_X, LINE2_Y, &recv, text_color, TEXT_SCALE);

        // clock, right-aligned top line
        let clock = format_clock(now, &state.prefs.time_format);
        let x = WIDTH as i32 - RIGHT_MARGIN - text_width(&clock, TEXT_SCALE) as i32;
        draw_text(&mut frame, x, LINE1_Y, &clock, text_color, TEXT_SCALE);

        // weather, right-aligned second line; absent until first fetch
        if let Some(weather) = &state.weather {
            let (degree, speed) = measurement_units(&state.prefs.unit);
            let summary = format!(
                "{} {} {:.1}{} {} {}",
                weather.location,
                weather.condition,
                weather.temperature,
                degree,
                weather.wind_speed,
                speed
            );
            let x = WIDTH as i32 - RIGHT_MARGIN - text_width(&summary, TEXT_SCALE) as i32;
            draw_text(&mut frame, x, LINE2_Y, &summary, text_color, TEXT_SCALE);
        }

        frame
    }

    /// Solid fill, then the active background frame if any. The frame
    /// index follows wall clock time, decoupled from render cadence,
    /// so the animation speed survives dropped ticks.
    fn paint_background(&self, frame: &mut [u8], fill: Rgba, now: DateTime<Local>) {
        for px in frame.chunks_exact_mut(BYTES_PER_PIXEL) {
            px[0] = fill.r;
            px[1] = fill.g;
            px[2] = fill.b;
            px[3] = fill.a;
        }

        if self.background.is_empty() {
            return;
        }

        let nanos = now.timestamp_nanos_opt().unwrap_or(0);
        let index = (nanos / BACKGROUND_FRAME_NANOS).rem_euclid(self.background.len() as i64);
        let pixmap = &self.background[index as usize];

        let w = (pixmap.width() as usize).min(WIDTH);
        let h = (pixmap.height() as usize).min(HEIGHT);
        let data = pixmap.data();
        let stride = pixmap.width() as usize * BYTES_PER_PIXEL;

        for y in 0..h {
            let src = y * stride;
            let dst = y * WIDTH * BYTES_PER_PIXEL;
            frame[dst..dst + w * BYTES_PER_PIXEL]
                .copy_from_slice(&data[src..src + w * BYTES_PER_PIXEL]);
        }
    }
}

/// Loads the background asset from ~/.config/nexusd/images. A plain
/// PNG gives a static background; a directory of PNGs, sorted by
/// name, gives an animated sequence. Anything missing or undecodable
/// falls back to the solid background color.
fn load_background_frames(image_name: &str) -> Vec<Pixmap> {
    let Some(dir) = config::images_dir() else {
        return Vec::new();
    };
    let path = dir.join(image_name);

    let mut files = Vec::new();
    if path.is_dir() {
        if let Ok(entries) = std::fs::read_dir(&path) {
            for entry in entries.flatten() {
                let p = entry.path();
                if p.extension().and_then(|e| e.to_str()) == Some("png") {
                    files.push(p);
                }
            }
        }
        files.sort();
    } else if path.is_file() {
        files.push(path);
    } else {
        return Vec::new();
    }

    let mut frames = Vec::new();
    for file in files {
        match std::fs::read(&file) {
            Ok(bytes) => match Pixmap::decode_png(&bytes) {
                Ok(pixmap) => frames.push(pixmap),
                Err(e) => warn!("Undecodable background frame {}: {e}", file.display()),
            },
            Err(e) => warn!("Unreadable background frame {}: {e}", file.display()),
        }
    }
    frames
}

/// Formats a throughput value: integer Kbps up to 1000, then Mbps with
/// one decimal (divided by 1024).
pub fn format_network_rate(label: &str, rate: i64) -> String {
    if rate > 1000 {
        format!("{} {:.1} Mbps", label, rate as f64 / 1024.0)
    } else {
        format!("{} {} Kbps", label, rate)
    }
}

/// Clock text per the configured format, with the separator blinking
/// at 1 Hz: on even whole seconds the first ':' becomes a space.
pub fn format_clock(now: DateTime<Local>, time_format: &str) -> String {
    let mut s = if time_format == TIME_FORMAT_12H {
        now.format("%-I:%M %p").to_string()
    } else {
        now.format("%H:%M").to_string()
    };

    if now.timestamp() % 2 == 0 {
        s = s.replacen(':', " ", 1);
    }
    s
}

/// Unit symbols for the weather summary.
fn measurement_units(unit: &str) -> (&'static str, &'static str) {
    match unit {
        UNIT_METRIC => ("°C", "km/h"),
        UNIT_IMPERIAL => ("°F", "mph"),
        _ => ("K", "m/s"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::weather::WeatherInfo;
    use chrono::TimeZone;

    fn local(h: u32, m: u32, s: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(2026, 8, 12, h, m, s).single().unwrap()
    }

    #[test]
    fn render_is_exactly_one_frame() {
        let renderer = Renderer { background: Vec::new() };
        let mut state = AggregateState::new(Config::default());
        assert_eq!(renderer.render(&state).len(), FRAME_LEN);

        state.weather = Some(WeatherInfo {
            location: "Jersey City, NJ".into(),
            temperature: 28.4,
            condition: "Partly cloudy".into(),
            wind_speed: "9.7".into(),
        });
        state.cpu_temp = 57.2;
        state.gpu_temp = 49.0;
        assert_eq!(renderer.render(&state).len(), FRAME_LEN);
    }

    #[test]
    fn background_fill_uses_configured_color() {
        let renderer = Renderer { background: Vec::new() };
        let mut state = AggregateState::new(Config::default());
        state.prefs.background_color = "#102030".into();
        state.prefs.text_color = "#102030".into(); // keep the frame uniform
        let frame = renderer.render_at(&state, local(3, 4, 5));
        assert_eq!(&frame[0..4], &[0x10, 0x20, 0x30, 0xff]);
        assert_eq!(&frame[FRAME_LEN - 4..], &[0x10, 0x20, 0x30, 0xff]);
    }

    #[test]
    fn network_rate_switches_units_above_1000() {
        assert_eq!(format_network_rate("UP", 500), "UP 500 Kbps");
        assert_eq!(format_network_rate("UP", 1000), "UP 1000 Kbps");
        assert_eq!(format_network_rate("DN", 2048), "DN 2.0 Mbps");
        assert_eq!(format_network_rate("DN", 1025), "DN 1.0 Mbps");
        assert_eq!(format_network_rate("UP", 0), "UP 0 Kbps");
    }

    #[test]
    fn clock_formats_follow_preference() {
        let odd = local(15, 4, 5); // odd second, separator visible
        assert_eq!(format_clock(odd, "12h"), "3:04 PM");
        assert_eq!(format_clock(odd, "24h"), "15:04");
    }

    #[test]
    fn clock_separator_blinks_on_even_seconds() {
        let odd = local(9, 30, 1);
        let even = local(9, 30, 2);
        assert_eq!(format_clock(odd, "24h"), "09:30");
        assert_eq!(format_clock(even, "24h"), "09 30");
        assert_eq!(format_clock(even, "12h"), "9 30 AM");
    }

    #[test]
    fn unit_symbols_match_preference() {
        assert_eq!(measurement_units("metric"), ("°C", "km/h"));
        assert_eq!(measurement_units("imperial"), ("°F", "mph"));
        assert_eq!(measurement_units("other"), ("K", "m/s"));
    }
}
