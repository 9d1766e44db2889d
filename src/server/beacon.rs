//! Discovery beacon thread
//!
//! Broadcasts one discovery packet per second to port 7331 so controllers
//! can find this endpoint, and owns the only mutable state shared between
//! threads: the live statistics fields of the pusher description.
//!
//! # Locking discipline
//!
//! One mutex guards the pusher description and the sequence baseline.
//! The receiver writes through [`Beacon::record_frame`]; the beacon
//! serializes the packet and zeroes `delta_sequence` under the same lock,
//! so every broadcast carries a consistent snapshot and each gap is
//! reported exactly once. Neither side holds the lock across a syscall
//! or a sleep.

use crate::protocol::discovery::{
    discovery_packet_size, DiscoveryPacketHeader, PixelPusherContainer, DISCOVERY_PORT,
};
use std::net::{Ipv4Addr, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::thread;
use std::time::Duration;

/// Floor for the advertised update period in microseconds: a 60 Hz frame
/// spread over 9 packets. Controllers throttle to the advertised value, so
/// advertising faster than this buys nothing.
pub const MIN_UPDATE_PERIOD_USEC: u32 = 16_666 / 9;

/// Seconds between broadcasts.
const BEACON_INTERVAL: Duration = Duration::from_secs(1);

struct BeaconState {
    pusher: PixelPusherContainer,
    /// Baseline for gap detection. Starts at -1 so the first frame ever
    /// received yields a zero gap.
    previous_sequence: i64,
}

/// Discovery broadcaster and statistics keeper.
pub struct Beacon {
    header: DiscoveryPacketHeader,
    state: Mutex<BeaconState>,
    packet_size: usize,
}

impl Beacon {
    pub fn new(header: DiscoveryPacketHeader, pusher: PixelPusherContainer) -> Self {
        let packet_size = discovery_packet_size(pusher.base.strip_flags.len());
        Self {
            header,
            state: Mutex::new(BeaconState {
                pusher,
                previous_sequence: -1,
            }),
            packet_size,
        }
    }

    /// Size of the broadcast packet, fixed at construction.
    pub fn packet_size(&self) -> usize {
        self.packet_size
    }

    /// Fold one received frame into the advertised statistics.
    ///
    /// Called by the receiver after each drawn datagram. Gaps are computed
    /// in signed 64-bit space: a positive gap counts missed frames, while
    /// an out-of-order or restarted sequence just resets the baseline.
    /// The advertised update period is the measured handling time, floored
    /// at [`MIN_UPDATE_PERIOD_USEC`].
    pub fn record_frame(&self, seen_sequence: u32, elapsed_micros: u32) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let gap = i64::from(seen_sequence) - state.previous_sequence - 1;
        if gap > 0 {
            state.pusher.base.delta_sequence =
                state.pusher.base.delta_sequence.wrapping_add(gap as u32);
        }
        state.previous_sequence = i64::from(seen_sequence);
        state.pusher.base.update_period = elapsed_micros.max(MIN_UPDATE_PERIOD_USEC);
    }

    /// Serialize `header || base || ext` into `buf` and zero the gap
    /// counter, all under the lock, so the next beacon reports only
    /// subsequently accumulated gaps.
    pub(crate) fn assemble(&self, buf: &mut Vec<u8>) {
        buf.clear();
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        self.header.write_into(buf);
        state.pusher.write_into(buf);
        state.pusher.base.delta_sequence = 0;
    }

    /// Broadcast loop. Runs until `running` clears; wakes from its sleep
    /// once a second to notice.
    pub fn run(&self, socket: UdpSocket, running: &AtomicBool) {
        let mut send_buffer = Vec::with_capacity(self.packet_size);
        log::info!(
            "Discovery beacon broadcasting to port {} ({} byte packets)",
            DISCOVERY_PORT,
            self.packet_size
        );

        while running.load(Ordering::Relaxed) {
            self.assemble(&mut send_buffer);
            if let Err(e) = socket.send_to(&send_buffer, (Ipv4Addr::BROADCAST, DISCOVERY_PORT)) {
                log::warn!("Discovery broadcast failed: {}", e);
            }
            thread::sleep(BEACON_INTERVAL);
        }

        log::info!("Discovery beacon stopped");
    }
}
