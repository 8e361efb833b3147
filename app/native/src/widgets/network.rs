//! Network link state of the Wi-Fi and Ethernet interfaces.
//!
//! `networksetup -listallhardwareports` maps hardware ports to BSD devices and
//! `ifconfig <device>` reports link status and addresses.

use serde::Serialize;

use crate::error::{BarikError, Result};
use crate::performance::Metric;
use crate::utils::command::run_binary;
use crate::widgets::ids;
use crate::widgets::manager::MetricSource;

/// Link state of one interface kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum NetworkState {
    Connected,
    /// Link is up but only a self-assigned address was obtained.
    ConnectedWithoutInternet,
    /// Link is up and waiting for an address.
    Connecting,
    #[default]
    Disconnected,
    /// No such interface on this machine.
    NotSupported,
}

/// Published network state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct NetworkStatus {
    pub wifi: NetworkState,
    pub ethernet: NetworkState,
}

/// One entry of `networksetup -listallhardwareports`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HardwarePort {
    pub name: String,
    pub device: String,
}

impl HardwarePort {
    fn is_wifi(&self) -> bool { self.name == "Wi-Fi" || self.name == "AirPort" }

    fn is_ethernet(&self) -> bool {
        !self.name.contains("Bridge") && (self.name.contains("Ethernet") || self.name.contains("LAN"))
    }
}

/// Parses the hardware port listing.
#[must_use]
pub fn parse_hardware_ports(output: &str) -> Vec<HardwarePort> {
    let mut ports = Vec::new();
    let mut name: Option<&str> = None;

    for line in output.lines().map(str::trim) {
        if let Some(value) = line.strip_prefix("Hardware Port:") {
            name = Some(value.trim());
        } else if let Some(device) = line.strip_prefix("Device:")
            && let Some(port_name) = name.take()
        {
            ports.push(HardwarePort {
                name: port_name.to_string(),
                device: device.trim().to_string(),
            });
        }
    }

    ports
}

/// The parts of `ifconfig <device>` that decide the link state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InterfaceInfo {
    pub is_up: bool,
    pub is_active: bool,
    pub inet: Option<String>,
}

/// Parses `ifconfig` output for a single device.
#[must_use]
pub fn parse_ifconfig(output: &str) -> InterfaceInfo {
    let mut info = InterfaceInfo::default();
    let mut status_line = None;
    let mut running = false;

    for (index, line) in output.lines().enumerate() {
        let trimmed = line.trim();
        if index == 0 {
            let flags = trimmed
                .split_once('<')
                .and_then(|(_, rest)| rest.split_once('>'))
                .map_or("", |(flags, _)| flags);
            info.is_up = flags.split(',').any(|flag| flag == "UP");
            running = flags.split(',').any(|flag| flag == "RUNNING");
        } else if let Some(status) = trimmed.strip_prefix("status:") {
            status_line = Some(status.trim() == "active");
        } else if let Some(rest) = trimmed.strip_prefix("inet ")
            && info.inet.is_none()
        {
            info.inet = rest.split_whitespace().next().map(str::to_string);
        }
    }

    info.is_active = info.is_up && status_line.unwrap_or(running);
    info
}

/// Maps interface details to a link state.
#[must_use]
pub fn link_state(info: &InterfaceInfo) -> NetworkState {
    if !info.is_active {
        return NetworkState::Disconnected;
    }

    match info.inet.as_deref() {
        Some(address) if address.starts_with("169.254.") => NetworkState::ConnectedWithoutInternet,
        Some(_) => NetworkState::Connected,
        None => NetworkState::Connecting,
    }
}

/// Polls both interface kinds.
#[derive(Debug, Default)]
pub struct NetworkSource;

impl NetworkSource {
    fn state_of(port: Option<&HardwarePort>) -> NetworkState {
        let Some(port) = port else {
            return NetworkState::NotSupported;
        };

        match run_binary("ifconfig", &[port.device.as_str()]) {
            Ok(output) => link_state(&parse_ifconfig(&output)),
            Err(err) => {
                tracing::debug!(device = %port.device, error = %err, "ifconfig failed");
                NetworkState::Disconnected
            }
        }
    }
}

impl MetricSource for NetworkSource {
    type State = NetworkStatus;

    const METRIC: Metric = Metric::Network;
    const WIDGET_IDS: &'static [&'static str] = &[ids::NETWORK];

    fn poll(&mut self) -> Result<NetworkStatus> {
        let listing = run_binary("networksetup", &["-listallhardwareports"])?;
        let ports = parse_hardware_ports(&listing);
        if ports.is_empty() {
            return Err(BarikError::Decode("no hardware ports reported".to_string()));
        }

        Ok(NetworkStatus {
            wifi: Self::state_of(ports.iter().find(|port| port.is_wifi())),
            ethernet: Self::state_of(ports.iter().find(|port| port.is_ethernet())),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PORTS: &str = "
Hardware Port: Thunderbolt Bridge
Device: bridge0
Ethernet Address: N/A

Hardware Port: Wi-Fi
Device: en0
Ethernet Address: 3c:22:fb:00:00:01

Hardware Port: USB 10/100/1000 LAN
Device: en7
Ethernet Address: 00:e0:4c:00:00:02

VLAN Configurations
===================
";

    const WIFI_ACTIVE: &str = "en0: flags=8863<UP,BROADCAST,SMART,RUNNING,SIMPLEX,MULTICAST> mtu 1500
\toptions=6460<TSO4,TSO6,CHANNEL_IO,PARTIAL_CSUM,ZEROINVERT_CSUM>
\tether 3c:22:fb:00:00:01
\tinet6 fe80::1c0b:1234:abcd:1%en0 prefixlen 64 secured scopeid 0xb
\tinet 192.168.1.23 netmask 0xffffff00 broadcast 192.168.1.255
\tnd6 options=201<PERFORMNUD,DAD>
\tmedia: autoselect
\tstatus: active
";

    const ETHERNET_INACTIVE: &str = "en7: flags=8863<UP,BROADCAST,SMART,RUNNING,SIMPLEX,MULTICAST> mtu 1500
\tether 00:e0:4c:00:00:02
\tmedia: autoselect (none)
\tstatus: inactive
";

    #[test]
    fn parses_hardware_ports() {
        let ports = parse_hardware_ports(PORTS);
        assert_eq!(ports.len(), 3);
        assert_eq!(ports[1], HardwarePort {
            name: "Wi-Fi".into(),
            device: "en0".into()
        });

        let wifi = ports.iter().find(|port| port.is_wifi()).unwrap();
        assert_eq!(wifi.device, "en0");
        let ethernet = ports.iter().find(|port| port.is_ethernet()).unwrap();
        assert_eq!(ethernet.device, "en7");
    }

    #[test]
    fn active_interface_with_address_is_connected() {
        let info = parse_ifconfig(WIFI_ACTIVE);
        assert!(info.is_up);
        assert!(info.is_active);
        assert_eq!(info.inet.as_deref(), Some("192.168.1.23"));
        assert_eq!(link_state(&info), NetworkState::Connected);
    }

    #[test]
    fn inactive_status_is_disconnected() {
        let info = parse_ifconfig(ETHERNET_INACTIVE);
        assert!(info.is_up);
        assert!(!info.is_active);
        assert_eq!(link_state(&info), NetworkState::Disconnected);
    }

    #[test]
    fn link_local_address_has_no_internet() {
        let output = "en0: flags=8863<UP,RUNNING> mtu 1500\n\tinet 169.254.10.2 netmask 0xffff0000\n\tstatus: active\n";
        assert_eq!(link_state(&parse_ifconfig(output)), NetworkState::ConnectedWithoutInternet);
    }

    #[test]
    fn active_without_address_is_connecting() {
        let output = "en0: flags=8863<UP,RUNNING> mtu 1500\n\tstatus: active\n";
        assert_eq!(link_state(&parse_ifconfig(output)), NetworkState::Connecting);
    }

    #[test]
    fn missing_status_line_uses_running_flag() {
        let running = "utun0: flags=8051<UP,POINTOPOINT,RUNNING,MULTICAST> mtu 1380\n\tinet 10.0.0.2 --> 10.0.0.1\n";
        assert!(parse_ifconfig(running).is_active);

        let down = "en3: flags=8822<BROADCAST,SMART,SIMPLEX,MULTICAST> mtu 1500\n";
        assert!(!parse_ifconfig(down).is_active);
    }

    #[test]
    fn missing_port_is_not_supported() {
        assert_eq!(NetworkSource::state_of(None), NetworkState::NotSupported);
    }
}
