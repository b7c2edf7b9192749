//! Configuration for wifishare
//!
//! Every value has a default, so a missing file gives the stock
//! wlan-to-eth0 setup with a 192.168.137.0/24 DHCP pool.

use crate::firewall::is_valid_interface_name;
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};

pub const CONFIG_ENV: &str = "WIFISHARE_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "/etc/wifishare/config.toml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Main configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Run administrative commands through `sudo`
    #[serde(default = "default_true")]
    pub use_sudo: bool,

    #[serde(default)]
    pub packages: PackagesConfig,

    #[serde(default)]
    pub interfaces: InterfacesConfig,

    #[serde(default)]
    pub dhcp: DhcpConfig,

    #[serde(default)]
    pub services: ServicesConfig,

    #[serde(default)]
    pub conflict: ConflictConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackagesConfig {
    /// Packages installed with `apt-get install -y` during provisioning
    #[serde(default = "default_packages")]
    pub install: Vec<String>,
}

/// Name prefixes used to fill the two interface pickers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterfacesConfig {
    #[serde(default = "default_wireless_prefixes")]
    pub wireless_prefixes: Vec<String>,

    #[serde(default = "default_wired_prefixes")]
    pub wired_prefixes: Vec<String>,
}

/// dnsmasq settings written at provisioning time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DhcpConfig {
    #[serde(default = "default_dnsmasq_path")]
    pub config_path: PathBuf,

    /// Interface dnsmasq binds to
    #[serde(default = "default_dhcp_interface")]
    pub interface: String,

    #[serde(default = "default_range_start")]
    pub range_start: Ipv4Addr,

    #[serde(default = "default_range_end")]
    pub range_end: Ipv4Addr,

    #[serde(default = "default_netmask")]
    pub netmask: Ipv4Addr,

    /// Lease time in dnsmasq syntax, e.g. "12h"
    #[serde(default = "default_lease")]
    pub lease: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceControl {
    /// systemd over D-Bus, `systemctl` when the bus refuses
    #[default]
    Auto,
    Dbus,
    Systemctl,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServicesConfig {
    #[serde(default = "default_dhcp_service")]
    pub dhcp: String,

    #[serde(default = "default_upnp_service")]
    pub upnp: String,

    #[serde(default)]
    pub control: ServiceControl,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConflictConfig {
    /// Process name that must not hold port 53. The kernel truncates command
    /// names to 15 bytes, so "systemd-resolve" also matches systemd-resolved.
    #[serde(default = "default_resolver")]
    pub resolver: String,
}

fn default_true() -> bool { true }
fn default_packages() -> Vec<String> {
    vec!["dnsmasq".into(), "iptables".into(), "miniupnpd".into()]
}
fn default_wireless_prefixes() -> Vec<String> { vec!["wl".into()] }
fn default_wired_prefixes() -> Vec<String> { vec!["eth".into()] }
fn default_dnsmasq_path() -> PathBuf { PathBuf::from("/etc/dnsmasq.conf") }
fn default_dhcp_interface() -> String { "eth0".into() }
fn default_range_start() -> Ipv4Addr { Ipv4Addr::new(192, 168, 137, 2) }
fn default_range_end() -> Ipv4Addr { Ipv4Addr::new(192, 168, 137, 50) }
fn default_netmask() -> Ipv4Addr { Ipv4Addr::new(255, 255, 255, 0) }
fn default_lease() -> String { "12h".into() }
fn default_dhcp_service() -> String { "dnsmasq".into() }
fn default_upnp_service() -> String { "miniupnpd".into() }
fn default_resolver() -> String { "systemd-resolve".into() }

impl Default for PackagesConfig {
    fn default() -> Self {
        Self {
            install: default_packages(),
        }
    }
}

impl Default for InterfacesConfig {
    fn default() -> Self {
        Self {
            wireless_prefixes: default_wireless_prefixes(),
            wired_prefixes: default_wired_prefixes(),
        }
    }
}

impl Default for DhcpConfig {
    fn default() -> Self {
        Self {
            config_path: default_dnsmasq_path(),
            interface: default_dhcp_interface(),
            range_start: default_range_start(),
            range_end: default_range_end(),
            netmask: default_netmask(),
            lease: default_lease(),
        }
    }
}

impl Default for ServicesConfig {
    fn default() -> Self {
        Self {
            dhcp: default_dhcp_service(),
            upnp: default_upnp_service(),
            control: ServiceControl::default(),
        }
    }
}

impl Default for ConflictConfig {
    fn default() -> Self {
        Self {
            resolver: default_resolver(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            use_sudo: true,
            packages: PackagesConfig::default(),
            interfaces: InterfacesConfig::default(),
            dhcp: DhcpConfig::default(),
            services: ServicesConfig::default(),
            conflict: ConflictConfig::default(),
        }
    }
}

impl Config {
    /// `$WIFISHARE_CONFIG` when set, the system-wide path otherwise.
    pub fn default_path() -> PathBuf {
        std::env::var_os(CONFIG_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
    }

    /// Load configuration from a TOML file. A missing file yields defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("No config at {}, using defaults", path.display());
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };

        let config: Config = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !is_valid_interface_name(&self.dhcp.interface) {
            return Err(ConfigError::Invalid(format!(
                "dhcp.interface {:?} is not an interface name",
                self.dhcp.interface
            )));
        }
        let lease = &self.dhcp.lease;
        if lease.is_empty() || !lease.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(ConfigError::Invalid(format!(
                "dhcp.lease {lease:?} is not a lease time"
            )));
        }
        if self.dhcp.range_start > self.dhcp.range_end {
            return Err(ConfigError::Invalid(format!(
                "dhcp range start {} is after end {}",
                self.dhcp.range_start, self.dhcp.range_end
            )));
        }
        Ok(())
    }
}

impl DhcpConfig {
    /// Contents of the dnsmasq configuration file.
    pub fn render(&self) -> String {
        format!(
            "interface={}\ndhcp-range={},{},{},{}\n",
            self.interface, self.range_start, self.range_end, self.netmask, self.lease
        )
    }

    /// Syntax check of the file at `config_path`.
    pub fn test_command(&self) -> String {
        format!("dnsmasq --test --conf-file={}", self.config_path.display())
    }
}
