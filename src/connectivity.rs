//! Network bring-up: join a configured network, otherwise host our own.
//!
//! ```text
//! Idle ──► AttemptingStation ──► StationConnected(addr)
//!   │              │
//!   │              └─ no association after max_polls ─┐
//!   └─ no credentials ────────────────────────────────┴─► ApFallback(addr)
//! ```
//!
//! The machine runs once at startup. Polling is linear (fixed interval, fixed
//! count); a failed association is never fatal, the device stays reachable on
//! its own access point.

use std::net::Ipv4Addr;
use std::time::Duration;

use log::{info, warn};

use crate::clock::Clock;
use crate::config::{ConnectivityConfig, WifiCredentials};
use crate::radio::{Radio, RadioRole};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Idle,
    AttemptingStation,
    StationConnected(Ipv4Addr),
    ApFallback(Ipv4Addr),
}

impl ConnectionState {
    /// The reachable address, once resolved
    pub fn address(&self) -> Option<Ipv4Addr> {
        match self {
            ConnectionState::StationConnected(addr) | ConnectionState::ApFallback(addr) => {
                Some(*addr)
            }
            ConnectionState::Idle | ConnectionState::AttemptingStation => None,
        }
    }
}

pub struct ConnectivityManager<R: Radio, C: Clock> {
    radio: R,
    clock: C,
    credentials: Option<WifiCredentials>,
    poll_interval: Duration,
    max_polls: u32,
    keep_ap_active: bool,
    state: ConnectionState,
}

impl<R: Radio, C: Clock> ConnectivityManager<R, C> {
    pub fn new(
        radio: R,
        clock: C,
        config: &ConnectivityConfig,
        credentials: Option<WifiCredentials>,
    ) -> Self {
        ConnectivityManager {
            radio,
            clock,
            credentials,
            poll_interval: config.poll_interval(),
            max_polls: config.max_polls,
            keep_ap_active: config.keep_ap_active,
            state: ConnectionState::Idle,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Bring the network up and return the address clients can reach us on.
    ///
    /// Only the first call does any work; later calls return the same address.
    pub fn resolve(&mut self) -> Ipv4Addr {
        if let Some(addr) = self.state.address() {
            return addr;
        }

        self.activate(RadioRole::AccessPoint, true);
        self.activate(RadioRole::Station, true);

        self.state = match self.credentials.take() {
            Some(credentials) => self.attempt_station(&credentials),
            None => {
                info!("No station network configured");
                self.fall_back_to_ap()
            }
        };

        match self.state {
            ConnectionState::StationConnected(addr) => info!("Connected to wifi, address {}", addr),
            ConnectionState::ApFallback(addr) => info!("Configured in AP mode, address {}", addr),
            ConnectionState::Idle | ConnectionState::AttemptingStation => {}
        }

        self.state.address().unwrap_or(Ipv4Addr::UNSPECIFIED)
    }

    fn attempt_station(&mut self, credentials: &WifiCredentials) -> ConnectionState {
        self.state = ConnectionState::AttemptingStation;
        info!(
            "Joining '{}' ({} polls every {:?})",
            credentials.ssid, self.max_polls, self.poll_interval
        );

        if let Err(e) = self.radio.connect(&credentials.ssid, &credentials.passwd) {
            warn!("Station connect request failed: {}", e);
            return self.fall_back_to_ap();
        }

        for poll in 1..=self.max_polls {
            self.clock.sleep(self.poll_interval);
            if self.radio.is_connected() {
                info!("Station associated after {} polls", poll);
                return self.station_connected();
            }
        }

        warn!(
            "Radio association timed out after {} polls, falling back to AP",
            self.max_polls
        );
        self.fall_back_to_ap()
    }

    fn station_connected(&mut self) -> ConnectionState {
        if !self.keep_ap_active {
            self.activate(RadioRole::AccessPoint, false);
        }
        let addr = self.radio.address(RadioRole::Station).unwrap_or_else(|| {
            warn!("Station reports no address");
            Ipv4Addr::UNSPECIFIED
        });
        ConnectionState::StationConnected(addr)
    }

    fn fall_back_to_ap(&mut self) -> ConnectionState {
        self.radio.disconnect();
        self.activate(RadioRole::Station, false);
        let addr = self.radio.address(RadioRole::AccessPoint).unwrap_or_else(|| {
            warn!("Access point reports no address");
            Ipv4Addr::UNSPECIFIED
        });
        ConnectionState::ApFallback(addr)
    }

    fn activate(&mut self, role: RadioRole, active: bool) {
        if let Err(e) = self.radio.set_active(role, active) {
            warn!("Failed to set {:?} active={}: {}", role, active, e);
        }
    }
}
