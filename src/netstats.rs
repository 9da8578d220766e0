/*
 *  netstats.rs
 *
 *  nexusd - iCUE Nexus display daemon
 *  (c) 2025-26 nexusd authors
 *
 *  Network throughput sampling: two /proc/net/dev reads one second
 *  apart, summed across interfaces (loopback excluded), reported in
 *  kilobits per second.
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
use std::sync::Arc;
use std::time::Duration;

use log::warn;
use tokio::sync::mpsc;

use crate::constants::NETWORK_INTERVAL;
use crate::session::Session;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct NetRates {
    pub sent_kbps: i64,
    pub received_kbps: i64,
}

/// (received_bytes, sent_bytes) totals across all non-loopback
/// interfaces.
fn read_counters() -> io::Result<(u64, u64)> {
    let content = fs::read_to_string("/proc/net/dev")?;
    parse_counters(&content)
}

fn parse_counters(content: &str) -> io::Result<(u64, u64)> {
    let mut received = 0u64;
    let mut sent = 0u64;
    let mut seen = false;

    // first two lines are headers; data lines are "iface: rx_bytes ..."
    for line in content.lines().skip(2) {
        let Some((iface, rest)) = line.split_once(':') else {
            continue;
        };
        if iface.trim() == "lo" {
            continue;
        }
        let fields: Vec<&str> = rest.split_whitespace().collect();
        if fields.len() < 9 {
            continue;
        }
        let rx = fields[0]
            .parse::<u64>()
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        let tx = fields[8]
            .parse::<u64>()
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        received += rx;
        sent += tx;
        seen = true;
    }

    if !seen {
        return Err(io::Error::new(
            io::ErrorKind::NotFound,
            "no network interfaces found",
        ));
    }
    Ok((received, sent))
}

/// Converts a byte delta over `secs` seconds into kilobits per second.
fn kbps(delta_bytes: u64, secs: f64) -> i64 {
    if secs <= 0.0 {
        return 0;
    }
    ((delta_bytes as f64) * 8.0 / 1000.0 / secs) as i64
}

/// Measures current throughput by sampling the counters one second
/// apart.
pub async fn sample() -> io::Result<NetRates> {
    let wait = Duration::from_secs(1);
    let (rx0, tx0) = read_counters()?;
    tokio::time::sleep(wait).await;
    let (rx1, tx1) = read_counters()?;

    Ok(NetRates {
        sent_kbps: kbps(tx1.saturating_sub(tx0), wait.as_secs_f64()),
        received_kbps: kbps(rx1.saturating_sub(rx0), wait.as_secs_f64()),
    })
}

/// Producer task feeding the scheduler while the panel is connected.
pub async fn run_network_monitor(session: Arc<Session>, tx: mpsc::Sender<NetRates>) {
    loop {
        if !session.is_connected() {
            tokio::time::sleep(NETWORK_INTERVAL).await;
            continue;
        }

        match sample().await {
            Ok(rates) => {
                let _ = tx.try_send(rates);
            }
            Err(e) => warn!("Failed to get network usage: {e}"),
        }

        tokio::time::sleep(NETWORK_INTERVAL).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
Inter-|   Receive                                                |  Transmit
 face |bytes    packets errs drop fifo frame compressed multicast|bytes    packets errs drop fifo colls carrier compressed
    lo: 1000000    1000    0    0    0     0          0         0  1000000    1000    0    0    0     0       0          0
  eth0: 5000000    4000    0    0    0     0          0         0  2500000    2000    0    0    0     0       0          0
 wlan0:  300000     200    0    0    0     0          0         0   100000     100    0    0    0     0       0          0
";

    #[test]
    fn sums_interfaces_excluding_loopback() {
        let (rx, tx) = parse_counters(SAMPLE).unwrap();
        assert_eq!(rx, 5_300_000);
        assert_eq!(tx, 2_600_000);
    }

    #[test]
    fn errors_without_interfaces() {
        let headers_only = "Inter-| Receive\n face |bytes\n";
        assert!(parse_counters(headers_only).is_err());
    }

    #[test]
    fn converts_bytes_to_kilobits() {
        // 125,000 bytes in one second = 1,000,000 bits = 1000 Kbps
        assert_eq!(kbps(125_000, 1.0), 1000);
        assert_eq!(kbps(0, 1.0), 0);
        assert_eq!(kbps(125_000, 0.0), 0);
    }
}
