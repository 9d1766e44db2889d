//! Output device implementations

pub mod sim;

pub use sim::SimPanel;

use crate::config::Config;
use crate::core::device::OutputDevice;
use crate::error::{Error, Result};

/// Create the output device named by the configuration.
///
/// Real LED panel drivers live outside this crate; they implement
/// [`OutputDevice`] and get wired in here by the integration.
pub fn create_device(config: &Config) -> Result<Box<dyn OutputDevice>> {
    match config.device.device_type.as_str() {
        "sim" => {
            let sim = config.device.sim.as_ref().ok_or_else(|| {
                Error::Config("sim device requires [device.sim] section".to_string())
            })?;
            let panel = SimPanel::new(sim.rows, sim.cols, sim.refresh_hz)?;
            Ok(Box::new(panel))
        }
        other => Err(Error::UnknownDevice(other.to_string())),
    }
}
