//! Server lifecycle
//!
//! Wires the probe, beacon, and receiver together:
//!
//! ```text
//! start()
//!  ├─ probe interface (60 x 1s retries)      -- fatal on exhaustion
//!  ├─ assemble discovery header + container  -- immutable after this
//!  ├─ bind data + broadcast sockets          -- fatal on failure
//!  └─ spawn threads
//!       ├─ pusher-receiver  (normal priority)
//!       └─ pusher-beacon    (best-effort realtime priority)
//! ```
//!
//! `ServerHandle::shutdown` clears the shared running flag and joins both
//! threads; each loop notices within its own wake interval.

pub mod beacon;
pub mod probe;
pub mod receiver;

pub use beacon::Beacon;
pub use receiver::FrameReceiver;

use crate::config::Config;
use crate::core::device::OutputDevice;
use crate::error::{Error, Result};
use crate::protocol::data::{strip_record_size, DATA_PORT, SEQUENCE_SIZE};
use crate::protocol::discovery::{
    DiscoveryPacketHeader, PixelPusherBase, PixelPusherContainer, PixelPusherExt,
    DEVICE_TYPE_PIXELPUSHER, LINK_SPEED_BPS, PRODUCT_ID, PROTOCOL_VERSION, SFLAG_LOGARITHMIC,
    SW_REVISION, VENDOR_ID,
};
use std::net::UdpSocket;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// How often (1 Hz) and how long the probe retries before startup fails.
const PROBE_ATTEMPTS: u32 = 60;

/// Initial advertised update period before any frame has been measured.
/// Stays above the floor the beacon clamps measured values to.
const INITIAL_UPDATE_PERIOD_USEC: u32 = 2000;

/// Realtime priority requested for the beacon thread. Beacons must be
/// timely; the receiver is I/O-bound and runs at normal priority.
const BEACON_RT_PRIORITY: libc::c_int = 5;

/// Handle to the running server threads.
pub struct ServerHandle {
    running: Arc<AtomicBool>,
    beacon_thread: Option<JoinHandle<()>>,
    receiver_thread: Option<JoinHandle<()>>,
}

impl ServerHandle {
    /// Stop both threads and wait for them to exit.
    pub fn shutdown(mut self) {
        self.running
            .store(false, std::sync::atomic::Ordering::Relaxed);
        if let Some(handle) = self.receiver_thread.take() {
            if handle.join().is_err() {
                log::error!("Receiver thread panicked");
            }
        }
        if let Some(handle) = self.beacon_thread.take() {
            if handle.join().is_err() {
                log::error!("Beacon thread panicked");
            }
        }
    }
}

/// Largest number of strips one data packet may carry: whatever fits in
/// the configured datagram size, but never more than one full frame.
fn max_strips_per_packet(
    udp_packet_size: usize,
    record_size: usize,
    strips_attached: usize,
) -> usize {
    ((udp_packet_size - SEQUENCE_SIZE) / record_size).min(strips_attached)
}

/// Probe the network, build the advertised pusher description, and start
/// the beacon and receiver threads.
pub fn start(
    config: &Config,
    device: Box<dyn OutputDevice>,
    running: Arc<AtomicBool>,
) -> Result<ServerHandle> {
    let (mac, ip) = probe::probe_with_retry(&config.network.interface, PROBE_ATTEMPTS)?;
    log::info!(
        "Interface {}: IP {}.{}.{}.{}, MAC {:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
        config.network.interface,
        ip[0],
        ip[1],
        ip[2],
        ip[3],
        mac[0],
        mac[1],
        mac[2],
        mac[3],
        mac[4],
        mac[5]
    );

    let strips = device.num_strips();
    let pixels = device.num_pixels_per_strip();
    if strips == 0 || strips > usize::from(u8::MAX) {
        return Err(Error::Config(format!(
            "device reports {} strips; 1-255 supported",
            strips
        )));
    }
    if pixels == 0 || pixels > usize::from(u16::MAX) {
        return Err(Error::Config(format!(
            "device reports {} pixels per strip; 1-65535 supported",
            pixels
        )));
    }

    let record_size = strip_record_size(pixels);
    let max_strips = max_strips_per_packet(config.pusher.udp_packet_size, record_size, strips);
    if max_strips == 0 {
        return Err(Error::Config(format!(
            "udp_packet_size {} cannot fit a single {}-byte strip record",
            config.pusher.udp_packet_size, record_size
        )));
    }
    log::info!("Accepting at most {} strips per packet", max_strips);

    let header = DiscoveryPacketHeader {
        mac_address: mac,
        ip_address: ip,
        device_type: DEVICE_TYPE_PIXELPUSHER,
        protocol_version: PROTOCOL_VERSION,
        vendor_id: VENDOR_ID,
        product_id: PRODUCT_ID,
        hw_revision: 0,
        sw_revision: SW_REVISION,
        link_speed: LINK_SPEED_BPS,
    };

    let strip_flag = if config.pusher.logarithmic {
        SFLAG_LOGARITHMIC
    } else {
        0
    };
    let base = PixelPusherBase {
        strips_attached: strips as u8,
        max_strips_per_packet: max_strips as u8,
        pixels_per_strip: pixels as u16,
        update_period: INITIAL_UPDATE_PERIOD_USEC,
        power_total: 1,
        delta_sequence: 0,
        controller_ordinal: config.pusher.controller_ordinal,
        group_ordinal: config.pusher.group_ordinal,
        artnet_universe: config.pusher.artnet_universe,
        artnet_channel: config.pusher.artnet_channel,
        my_port: DATA_PORT,
        strip_flags: vec![strip_flag; strips],
    };
    let container = PixelPusherContainer {
        base,
        ext: PixelPusherExt::default(),
    };

    let beacon = Arc::new(Beacon::new(header, container));

    // Bind both sockets before spawning anything so a taken port is a
    // startup failure, not a half-running daemon. Each socket is then
    // owned by exactly one thread.
    let data_socket = UdpSocket::bind(("0.0.0.0", DATA_PORT))?;
    let beacon_socket = UdpSocket::bind(("0.0.0.0", 0))?;
    beacon_socket.set_broadcast(true)?;

    let mut frame_receiver =
        FrameReceiver::new(device, Arc::clone(&beacon), Arc::clone(&running));
    let receiver_thread = thread::Builder::new()
        .name("pusher-receiver".to_string())
        .spawn(move || {
            if let Err(e) = frame_receiver.run(data_socket) {
                log::error!("Receiver error: {}", e);
            }
        })
        .map_err(|e| Error::Other(format!("Failed to spawn receiver thread: {}", e)))?;

    let beacon_running = Arc::clone(&running);
    let beacon_ref = Arc::clone(&beacon);
    let beacon_thread = thread::Builder::new()
        .name("pusher-beacon".to_string())
        .spawn(move || {
            elevate_thread_priority();
            beacon_ref.run(beacon_socket, &beacon_running);
        })
        .map_err(|e| Error::Other(format!("Failed to spawn beacon thread: {}", e)))?;

    Ok(ServerHandle {
        running,
        beacon_thread: Some(beacon_thread),
        receiver_thread: Some(receiver_thread),
    })
}

/// Ask the OS for realtime scheduling on the calling thread. Needs
/// CAP_SYS_NICE; refusal is logged and the thread keeps its normal
/// priority.
fn elevate_thread_priority() {
    let param = libc::sched_param {
        sched_priority: BEACON_RT_PRIORITY,
    };
    let rc = unsafe { libc::pthread_setschedparam(libc::pthread_self(), libc::SCHED_FIFO, &param) };
    if rc != 0 {
        log::warn!(
            "Could not raise beacon thread to realtime priority (errno {}); continuing at normal priority",
            rc
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_max_strips_limited_by_packet_size() {
        // 3-pixel strips: 10-byte records. 200-byte packets fit 19 records.
        assert_eq!(max_strips_per_packet(200, 10, 64), 19);
    }

    #[test]
    fn test_max_strips_limited_by_frame_size() {
        // Plenty of room, but never more than one full frame per packet
        assert_eq!(max_strips_per_packet(65507, 10, 64), 64);
    }

    #[test]
    fn test_max_strips_zero_when_record_does_not_fit() {
        // 500-pixel strips: 1501-byte records cannot fit a 1460-byte packet
        assert_eq!(max_strips_per_packet(1460, 1501, 8), 0);
    }

    #[test]
    fn test_max_strips_at_udp_maximum() {
        let record = strip_record_size(480); // 1441 bytes
        assert_eq!(max_strips_per_packet(65507, record, 64), 45);
    }
}
