//! Pixel frame receiver thread
//!
//! Ingests data datagrams from port 5078 and draws them into the output
//! device. Each datagram is classified (see [`crate::protocol::data`]),
//! then drawn either as a full frame or a partial update:
//!
//! - **Full frame** (record count equals the panel's strip count): drawn
//!   into the off-screen canvas and committed at the device's next vsync,
//!   so a frame is never shown half-updated.
//! - **Partial update**: drawn straight into the shown canvas. A partial
//!   update cannot tear a frame it never fully replaces, and waiting for
//!   vsync would only delay it.
//!
//! After every drawn datagram the handling time and sequence number are
//! folded into the beacon's statistics. Discarded datagrams never touch
//! the statistics.
//!
//! The socket carries a 500ms read timeout so the loop can observe the
//! shutdown flag; malformed traffic is logged and skipped, never fatal.

use crate::core::device::{Canvas, OutputDevice};
use crate::error::Result;
use crate::protocol::data::{classify, strip_record_size, DataPacket, FrameError};
use crate::server::beacon::Beacon;
use std::net::UdpSocket;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// How long a blocked receive waits before re-checking the shutdown flag.
const RECV_TIMEOUT: Duration = Duration::from_millis(500);

/// The receiver's two canvas handles. `on_screen` tracks the shown buffer
/// and is re-acquired after every swap.
struct FrameCanvases {
    on_screen: Box<dyn Canvas>,
    off_screen: Box<dyn Canvas>,
}

/// UDP frame receiver driving one output device.
pub struct FrameReceiver {
    device: Box<dyn OutputDevice>,
    beacon: Arc<Beacon>,
    running: Arc<AtomicBool>,
}

impl FrameReceiver {
    pub fn new(
        device: Box<dyn OutputDevice>,
        beacon: Arc<Beacon>,
        running: Arc<AtomicBool>,
    ) -> Self {
        Self {
            device,
            beacon,
            running,
        }
    }

    /// Receive loop. Exits when the running flag clears.
    pub fn run(&mut self, socket: UdpSocket) -> Result<()> {
        socket.set_read_timeout(Some(RECV_TIMEOUT))?;

        let mut recv_buffer = vec![0u8; crate::protocol::data::MAX_UDP_PACKET_SIZE];
        let record_size = strip_record_size(self.device.num_pixels_per_strip());
        let mut frame = FrameCanvases {
            off_screen: self.device.create_off_screen(),
            on_screen: self.device.on_screen(),
        };

        log::info!(
            "Listening for pixel data on port {} ({} strips x {} pixels)",
            socket.local_addr().map(|a| a.port()).unwrap_or_default(),
            self.device.num_strips(),
            self.device.num_pixels_per_strip()
        );

        while self.running.load(Ordering::Relaxed) {
            let len = match socket.recv_from(&mut recv_buffer) {
                Ok((len, _src)) => len,
                Err(e) if is_timeout(&e) => continue,
                Err(e) => {
                    log::error!("Receive failed: {}", e);
                    continue;
                }
            };
            let start = Instant::now();
            frame = self.handle_datagram(&recv_buffer[..len], record_size, frame, start);
        }

        log::info!("Pixel receiver stopped");
        Ok(())
    }

    /// Process one datagram: classify, draw, commit, report statistics.
    /// Takes the canvas pair by value so a full-frame commit can exchange
    /// the off-screen handle with the device.
    fn handle_datagram(
        &mut self,
        datagram: &[u8],
        record_size: usize,
        mut frame: FrameCanvases,
        start: Instant,
    ) -> FrameCanvases {
        match classify(datagram, record_size) {
            Err(e @ FrameError::TooShort { .. }) => log::warn!("Discarding datagram: {}", e),
            Err(e @ FrameError::Empty) => log::debug!("Discarding datagram: {}", e),
            Err(e @ FrameError::Misaligned { .. }) => log::warn!("Discarding datagram: {}", e),
            Ok(DataPacket::Command { sequence }) => {
                // Controllers occasionally address command frames at the
                // data port; they must not be interpreted as pixels.
                log::trace!("Ignoring pusher command datagram (sequence {})", sequence);
            }
            Ok(DataPacket::Strips { sequence, records }) => {
                let num_strips = self.device.num_strips();
                let full_frame = records.len() == num_strips;
                let target: &mut dyn Canvas = if full_frame {
                    frame.off_screen.as_mut()
                } else {
                    frame.on_screen.as_mut()
                };

                for record in records {
                    let y = record.index as usize;
                    if y >= num_strips {
                        log::debug!(
                            "Strip index {} out of range (panel has {} strips)",
                            record.index,
                            num_strips
                        );
                        continue;
                    }
                    for (x, (red, green, blue)) in record.pixels().enumerate() {
                        target.set_pixel(x, y, red, green, blue);
                    }
                }

                if full_frame {
                    frame.off_screen = self.device.swap_on_vsync(frame.off_screen);
                    frame.on_screen = self.device.on_screen();
                }

                let elapsed = start.elapsed().as_micros() as u32;
                self.beacon.record_frame(sequence, elapsed);
            }
        }
        frame
    }
}

/// OS timeout / would-block errors that just mean "check the flag again".
fn is_timeout(e: &std::io::Error) -> bool {
    matches!(
        e.kind(),
        std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
    )
}
