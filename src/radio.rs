//! Wireless radio handle used by the connectivity state machine

use std::net::{IpAddr, Ipv4Addr, SocketAddr, UdpSocket};

use log::{debug, info};

use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RadioRole {
    /// Client joining an existing network
    Station,
    /// Self-hosted local network
    AccessPoint,
}

/// Owned handle to the device radio.
///
/// Station association is asynchronous on real hardware: `connect` only issues
/// the request and `is_connected` is polled until it reports success.
pub trait Radio {
    fn set_active(&mut self, role: RadioRole, active: bool) -> Result<()>;

    /// Issue an association request for the station role
    fn connect(&mut self, ssid: &str, passwd: &str) -> Result<()>;

    fn is_connected(&mut self) -> bool;

    fn disconnect(&mut self);

    /// Address assigned to a role, if it has one
    fn address(&self, role: RadioRole) -> Option<Ipv4Addr>;
}

/// Radio stand-in for running on a host computer.
///
/// The station role counts as associated once the host has a routable IPv4
/// address toward `route_target`; the access point role reports a fixed address.
pub struct HostRadio {
    route_target: SocketAddr,
    ap_address: Ipv4Addr,
    station_active: bool,
    ap_active: bool,
    join_requested: bool,
    station_address: Option<Ipv4Addr>,
}

impl HostRadio {
    pub fn new(route_target: SocketAddr, ap_address: Ipv4Addr) -> Self {
        HostRadio {
            route_target,
            ap_address,
            station_active: false,
            ap_active: false,
            join_requested: false,
            station_address: None,
        }
    }

    /// Local address the OS would use to reach `route_target`. No packets are sent.
    fn routable_address(&self) -> Option<Ipv4Addr> {
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).ok()?;
        socket.connect(self.route_target).ok()?;
        match socket.local_addr().ok()?.ip() {
            IpAddr::V4(addr) if !addr.is_unspecified() && !addr.is_loopback() => Some(addr),
            _ => None,
        }
    }
}

impl Radio for HostRadio {
    fn set_active(&mut self, role: RadioRole, active: bool) -> Result<()> {
        debug!("Radio {:?} active={}", role, active);
        match role {
            RadioRole::Station => {
                self.station_active = active;
                if !active {
                    self.join_requested = false;
                    self.station_address = None;
                }
            }
            RadioRole::AccessPoint => self.ap_active = active,
        }
        Ok(())
    }

    fn connect(&mut self, ssid: &str, _passwd: &str) -> Result<()> {
        info!("Joining network '{}' (host uses its existing route)", ssid);
        self.join_requested = self.station_active;
        Ok(())
    }

    fn is_connected(&mut self) -> bool {
        if !self.join_requested {
            return false;
        }
        if self.station_address.is_none() {
            self.station_address = self.routable_address();
        }
        self.station_address.is_some()
    }

    fn disconnect(&mut self) {
        self.join_requested = false;
        self.station_address = None;
    }

    fn address(&self, role: RadioRole) -> Option<Ipv4Addr> {
        match role {
            RadioRole::Station => self.station_address,
            RadioRole::AccessPoint => self.ap_active.then_some(self.ap_address),
        }
    }
}
