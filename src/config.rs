//! Configuration loading from TOML
//!
//! # Configuration File Format
//!
//! The configuration file is TOML-formatted with the following structure:
//!
//! ```toml
//! [device]
//! type = "sim"
//! name = "Simulated 64x32 panel"
//!
//! [device.sim]
//! rows = 32        # strips advertised to controllers
//! cols = 64        # pixels per strip
//! refresh_hz = 60  # vsync rate of the simulated panel
//!
//! [pusher]
//! udp_packet_size = 1460   # 200..=65507; caps strips per data packet
//! logarithmic = false      # advertise luminance-corrected strips
//! controller_ordinal = 0
//! group_ordinal = 0
//! artnet_universe = 0
//! artnet_channel = 0
//!
//! [network]
//! interface = "eth0"       # interface whose MAC/IPv4 go into the beacon
//! ```
//!
//! See `deepa-io.toml` for a complete example.

use crate::error::{Error, Result};
use crate::protocol::data::MAX_UDP_PACKET_SIZE;
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// Smallest accepted `udp_packet_size`. Anything below this cannot carry a
/// useful strip record on common panel widths.
const MIN_UDP_PACKET_SIZE: usize = 200;

/// Dimensions and refresh rate of the simulated panel
#[derive(Debug, Clone, Deserialize)]
pub struct SimConfig {
    /// Number of strips (display rows). Advertised as `strips_attached`,
    /// so it must fit in one byte: valid range 1-255.
    pub rows: usize,

    /// Pixels per strip (display columns). Advertised as
    /// `pixels_per_strip` (u16): valid range 1-65535.
    pub cols: usize,

    /// Refresh rate of the vsync thread in Hz.
    ///
    /// **Default**: 60
    #[serde(default = "default_refresh_hz")]
    pub refresh_hz: u32,
}

fn default_refresh_hz() -> u32 {
    60
}

/// Device configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DeviceConfig {
    /// Device type identifier
    ///
    /// **Valid values**: "sim". Real panel drivers are external
    /// integrations against the `OutputDevice` trait.
    #[serde(rename = "type")]
    pub device_type: String,

    /// Human-readable device name (used for logging only)
    pub name: String,

    /// Simulated panel parameters
    ///
    /// **Required**: for the "sim" device type
    #[serde(default)]
    pub sim: Option<SimConfig>,
}

/// Options copied into the advertised pusher description
///
/// These affect only what the discovery beacon reports and how many strips
/// a single data packet may carry; the pixel path itself is sized from the
/// device.
#[derive(Debug, Clone, Deserialize)]
pub struct PusherConfig {
    /// Largest data datagram controllers are told to send
    ///
    /// **Units**: bytes, including the 4-byte sequence number
    /// **Valid range**: 200-65507
    /// **Default**: 1460 (the non-fragmenting size controllers favor)
    #[serde(default = "default_udp_packet_size")]
    pub udp_packet_size: usize,

    /// Advertise luminance-corrected strips (purely informational)
    #[serde(default)]
    pub logarithmic: bool,

    /// Ordering number for this controller, copied verbatim into the beacon
    #[serde(default)]
    pub controller_ordinal: i32,

    /// Group number for this controller, copied verbatim into the beacon
    #[serde(default)]
    pub group_ordinal: i32,

    /// Configured Art-Net starting universe, if any
    #[serde(default)]
    pub artnet_universe: u16,

    /// Configured Art-Net starting channel, if any
    #[serde(default)]
    pub artnet_channel: u16,
}

fn default_udp_packet_size() -> usize {
    1460
}

impl Default for PusherConfig {
    fn default() -> Self {
        Self {
            udp_packet_size: default_udp_packet_size(),
            logarithmic: false,
            controller_ordinal: 0,
            group_ordinal: 0,
            artnet_universe: 0,
            artnet_channel: 0,
        }
    }
}

/// Network configuration
#[derive(Debug, Clone, Deserialize)]
pub struct NetworkConfig {
    /// Interface whose MAC and IPv4 address identify this endpoint in the
    /// discovery beacon (e.g. "eth0", "wlan0")
    pub interface: String,
}

/// Root configuration
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub device: DeviceConfig,
    #[serde(default)]
    pub pusher: PusherConfig,
    pub network: NetworkConfig,
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Validation
    ///
    /// - `pusher.udp_packet_size` must be within 200-65507
    /// - the device type must be known
    /// - the "sim" device requires a `[device.sim]` section with `rows`
    ///   within 1-255 and `cols` within 1-65535 (the wire field widths)
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)
            .map_err(|e| Error::Config(format!("Failed to read config: {}", e)))?;
        Self::parse(&content)
    }

    fn parse(content: &str) -> Result<Self> {
        let config: Config = basic_toml::from_str(content)
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))?;

        let size = config.pusher.udp_packet_size;
        if !(MIN_UDP_PACKET_SIZE..=MAX_UDP_PACKET_SIZE).contains(&size) {
            return Err(Error::Config(format!(
                "udp_packet_size must be between {} and {} (got {})",
                MIN_UDP_PACKET_SIZE, MAX_UDP_PACKET_SIZE, size
            )));
        }

        match config.device.device_type.as_str() {
            "sim" => {
                let sim = config.device.sim.as_ref().ok_or_else(|| {
                    Error::Config("sim device requires [device.sim] section".to_string())
                })?;
                if !(1..=255).contains(&sim.rows) {
                    return Err(Error::Config(format!(
                        "rows must be between 1 and 255 (got {})",
                        sim.rows
                    )));
                }
                if !(1..=65535).contains(&sim.cols) {
                    return Err(Error::Config(format!(
                        "cols must be between 1 and 65535 (got {})",
                        sim.cols
                    )));
                }
                if sim.refresh_hz == 0 {
                    return Err(Error::Config("refresh_hz must be positive".to_string()));
                }
            }
            other => {
                return Err(Error::UnknownDevice(other.to_string()));
            }
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_toml() -> String {
        r#"
            [device]
            type = "sim"
            name = "test panel"

            [device.sim]
            rows = 32
            cols = 64

            [network]
            interface = "eth0"
        "#
        .to_string()
    }

    #[test]
    fn test_minimal_config_parses_with_defaults() {
        let config = Config::parse(&minimal_toml()).unwrap();
        assert_eq!(config.device.device_type, "sim");
        assert_eq!(config.device.sim.as_ref().unwrap().rows, 32);
        assert_eq!(config.device.sim.as_ref().unwrap().refresh_hz, 60);
        assert_eq!(config.pusher.udp_packet_size, 1460);
        assert!(!config.pusher.logarithmic);
        assert_eq!(config.network.interface, "eth0");
    }

    #[test]
    fn test_unknown_device_type_rejected() {
        let toml = minimal_toml().replace("\"sim\"", "\"gpio\"");
        assert!(matches!(
            Config::parse(&toml),
            Err(Error::UnknownDevice(t)) if t == "gpio"
        ));
    }

    #[test]
    fn test_sim_device_requires_sim_section() {
        let toml = r#"
            [device]
            type = "sim"
            name = "test panel"

            [network]
            interface = "eth0"
        "#;
        assert!(matches!(Config::parse(toml), Err(Error::Config(_))));
    }

    #[test]
    fn test_udp_packet_size_bounds() {
        let small = format!("{}\n[pusher]\nudp_packet_size = 199\n", minimal_toml());
        assert!(matches!(Config::parse(&small), Err(Error::Config(_))));

        let large = format!("{}\n[pusher]\nudp_packet_size = 65508\n", minimal_toml());
        assert!(matches!(Config::parse(&large), Err(Error::Config(_))));

        let min = format!("{}\n[pusher]\nudp_packet_size = 200\n", minimal_toml());
        assert_eq!(Config::parse(&min).unwrap().pusher.udp_packet_size, 200);

        let max = format!("{}\n[pusher]\nudp_packet_size = 65507\n", minimal_toml());
        assert_eq!(Config::parse(&max).unwrap().pusher.udp_packet_size, 65507);
    }

    #[test]
    fn test_sim_dimension_bounds() {
        let zero_rows = minimal_toml().replace("rows = 32", "rows = 0");
        assert!(matches!(Config::parse(&zero_rows), Err(Error::Config(_))));

        let wide_rows = minimal_toml().replace("rows = 32", "rows = 256");
        assert!(matches!(Config::parse(&wide_rows), Err(Error::Config(_))));

        let wide_cols = minimal_toml().replace("cols = 64", "cols = 65536");
        assert!(matches!(Config::parse(&wide_cols), Err(Error::Config(_))));
    }

    #[test]
    fn test_pusher_options_are_copied() {
        let toml = format!(
            "{}\n[pusher]\nlogarithmic = true\ncontroller_ordinal = 3\n\
             group_ordinal = -1\nartnet_universe = 7\nartnet_channel = 12\n",
            minimal_toml()
        );
        let config = Config::parse(&toml).unwrap();
        assert!(config.pusher.logarithmic);
        assert_eq!(config.pusher.controller_ordinal, 3);
        assert_eq!(config.pusher.group_ordinal, -1);
        assert_eq!(config.pusher.artnet_universe, 7);
        assert_eq!(config.pusher.artnet_channel, 12);
    }
}
