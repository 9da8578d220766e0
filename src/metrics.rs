/*
 *  metrics.rs
 *
 *  nexusd - iCUE Nexus display daemon
 *  (c) 2025-26 nexusd authors
 *
 *  CPU and GPU temperature sampling from /sys and vendor tools.
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
use std::fs;
use std::io;
use std::process::Command;
use std::sync::Arc;

use log::{debug, warn};
use serde_json::Value;
use tokio::sync::mpsc;

use crate::constants::TEMP_INTERVAL;
use crate::session::Session;

/// One temperature sample pair, in degrees Celsius.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct SystemTemps {
    pub cpu: f64,
    pub gpu: f64,
}

/// Reads the first float value from a given file path.
fn read_first_float(path: &str) -> io::Result<f64> {
    let content = fs::read_to_string(path)?;
    let first_word = content.split_whitespace().next().unwrap_or("0.0");
    first_word
        .parse::<f64>()
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

/// CPU temperature from the first thermal zone, millidegrees Celsius.
pub fn cpu_temp() -> io::Result<f64> {
    let millideg = read_first_float("/sys/class/thermal/thermal_zone0/temp")?;
    Ok(millideg / 1000.0)
}

/// GPU temperature, trying NVIDIA then AMD then Intel.
pub fn gpu_temp() -> io::Result<f64> {
    nvidia_temp()
        .or_else(|_| sensors_temp("amdgpu"))
        .or_else(|_| sensors_temp("i915"))
}

fn nvidia_temp() -> io::Result<f64> {
    let out = Command::new("nvidia-smi")
        .args(["--query-gpu=temperature.gpu", "--format=csv,noheader,nounits"])
        .output()?;
    if !out.status.success() {
        return Err(io::Error::other("nvidia-smi reported failure"));
    }
    String::from_utf8_lossy(&out.stdout)
        .trim()
        .parse::<f64>()
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

/// Pulls temp1_input for a chip out of `sensors -j` output. Top-level
/// keys are chip names like "amdgpu-pci-0300".
fn sensors_temp(chip: &str) -> io::Result<f64> {
    let out = Command::new("sensors").arg("-j").output()?;
    if !out.status.success() {
        return Err(io::Error::other("sensors reported failure"));
    }
    let root: Value = serde_json::from_slice(&out.stdout)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

    let Some(chips) = root.as_object() else {
        return Err(io::Error::new(io::ErrorKind::InvalidData, "unexpected sensors layout"));
    };

    for (name, readings) in chips {
        if !name.contains(chip) {
            continue;
        }
        if let Some(temp) = find_temp1_input(readings) {
            return Ok(temp);
        }
    }

    Err(io::Error::new(
        io::ErrorKind::NotFound,
        format!("no {chip} temperature found"),
    ))
}

fn find_temp1_input(value: &Value) -> Option<f64> {
    let obj = value.as_object()?;
    if let Some(t) = obj.get("temp1_input").and_then(Value::as_f64) {
        return Some(t);
    }
    obj.values().find_map(find_temp1_input)
}

/// Producer task: samples both temperatures every 5s while the panel
/// is connected and feeds the scheduler. A failed sample skips the
/// cycle; the previous values simply stay on screen.
pub async fn run_temp_monitor(session: Arc<Session>, tx: mpsc::Sender<SystemTemps>) {
    let mut ticker = tokio::time::interval(TEMP_INTERVAL);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;

        if !session.is_connected() {
            continue;
        }

        let cpu = match cpu_temp() {
            Ok(t) => t,
            Err(e) => {
                warn!("Failed to get CPU temperature: {e}");
                continue;
            }
        };
        let gpu = match gpu_temp() {
            Ok(t) => t,
            Err(e) => {
                debug!("Failed to get GPU temperature: {e}");
                continue;
            }
        };

        let _ = tx.try_send(SystemTemps { cpu, gpu });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_temp1_input_nested() {
        let v: Value = serde_json::from_str(
            r#"{
                "amdgpu-pci-0300": {
                    "Adapter": "PCI adapter",
                    "edge": { "temp1_input": 47.5, "temp1_crit": 100.0 }
                }
            }"#,
        )
        .unwrap();
        let chip = v.as_object().unwrap().get("amdgpu-pci-0300").unwrap();
        assert_eq!(find_temp1_input(chip), Some(47.5));
    }

    #[test]
    fn missing_temp_is_none() {
        let v: Value = serde_json::from_str(r#"{"Adapter": "PCI adapter"}"#).unwrap();
        assert_eq!(find_temp1_input(&v), None);
    }
}
