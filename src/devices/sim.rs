//! Simulated panel for hardware-free operation
//!
//! `SimPanel` is an in-memory double-buffered RGB panel. A dedicated
//! refresh thread ticks at the configured rate and hands out vsync ticks
//! over a bounded channel; `swap_on_vsync` waits for the next tick before
//! flipping the front-buffer index, so a swap has the same blocking shape
//! as a real panel's vsync rendezvous.
//!
//! # Thread Model
//!
//! ```text
//! ┌─────────────────┐  ticks   ┌──────────────────┐
//! │ Refresh thread  │─────────▶│ swap_on_vsync()  │
//! │  (sim-vsync)    │ bounded  │ (receiver thread)│
//! └─────────────────┘ channel  └──────────────────┘
//! ```
//!
//! Canvas handles are shared views onto the two framebuffers; the handle
//! for the shown buffer stays valid for direct drawing. The flip is a
//! single index store, so a frame is always shown whole.

use crate::core::device::{Canvas, OutputDevice};
use crate::error::{Error, Result};
use crossbeam_channel::{bounded, Receiver};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

struct PanelShared {
    rows: usize,
    cols: usize,
    /// Two RGB framebuffers, `rows * cols * 3` bytes each.
    buffers: Mutex<[Vec<u8>; 2]>,
    /// Index of the buffer currently shown.
    front: AtomicUsize,
}

/// Drawable view onto one of the panel's two framebuffers.
struct SimCanvas {
    shared: Arc<PanelShared>,
    slot: usize,
}

impl Canvas for SimCanvas {
    fn set_pixel(&mut self, x: usize, y: usize, red: u8, green: u8, blue: u8) {
        if x >= self.shared.cols || y >= self.shared.rows {
            return;
        }
        let mut buffers = self
            .shared
            .buffers
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        let offset = (y * self.shared.cols + x) * 3;
        let buffer = &mut buffers[self.slot];
        buffer[offset] = red;
        buffer[offset + 1] = green;
        buffer[offset + 2] = blue;
    }
}

/// In-memory double-buffered panel with a vsync thread.
pub struct SimPanel {
    shared: Arc<PanelShared>,
    vsync_rx: Receiver<()>,
    shutdown: Arc<AtomicBool>,
    refresh_handle: Option<JoinHandle<()>>,
}

impl SimPanel {
    /// Create a panel and start its refresh thread.
    pub fn new(rows: usize, cols: usize, refresh_hz: u32) -> Result<Self> {
        let size = rows * cols * 3;
        let shared = Arc::new(PanelShared {
            rows,
            cols,
            buffers: Mutex::new([vec![0; size], vec![0; size]]),
            front: AtomicUsize::new(0),
        });

        // Capacity 1: a tick nobody is waiting for is a missed vsync, not
        // a credit to spend later.
        let (vsync_tx, vsync_rx) = bounded(1);
        let shutdown = Arc::new(AtomicBool::new(false));
        let period = Duration::from_micros(1_000_000 / u64::from(refresh_hz.max(1)));

        let thread_shutdown = Arc::clone(&shutdown);
        let refresh_handle = thread::Builder::new()
            .name("sim-vsync".to_string())
            .spawn(move || {
                log::debug!("Sim panel refresh thread started ({} Hz)", refresh_hz);
                while !thread_shutdown.load(Ordering::Relaxed) {
                    thread::sleep(period);
                    let _ = vsync_tx.try_send(());
                }
                log::debug!("Sim panel refresh thread exiting");
            })
            .map_err(|e| Error::Other(format!("Failed to spawn refresh thread: {}", e)))?;

        Ok(Self {
            shared,
            vsync_rx,
            shutdown,
            refresh_handle: Some(refresh_handle),
        })
    }

    /// Block until the next refresh tick. Stale ticks from before the call
    /// are discarded so the wait spans a real frame boundary. If the
    /// refresh thread is gone (shutdown), returns immediately rather than
    /// deadlocking the swap.
    fn wait_vsync(&self) {
        while self.vsync_rx.try_recv().is_ok() {}
        let _ = self.vsync_rx.recv();
    }

    fn canvas(&self, slot: usize) -> Box<dyn Canvas> {
        Box::new(SimCanvas {
            shared: Arc::clone(&self.shared),
            slot,
        })
    }

    #[cfg(test)]
    fn front_pixel(&self, x: usize, y: usize) -> (u8, u8, u8) {
        let buffers = self
            .shared
            .buffers
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        let buffer = &buffers[self.shared.front.load(Ordering::Relaxed)];
        let offset = (y * self.shared.cols + x) * 3;
        (buffer[offset], buffer[offset + 1], buffer[offset + 2])
    }
}

impl OutputDevice for SimPanel {
    fn num_strips(&self) -> usize {
        self.shared.rows
    }

    fn num_pixels_per_strip(&self) -> usize {
        self.shared.cols
    }

    fn create_off_screen(&mut self) -> Box<dyn Canvas> {
        self.canvas(1 - self.shared.front.load(Ordering::Relaxed))
    }

    fn on_screen(&mut self) -> Box<dyn Canvas> {
        self.canvas(self.shared.front.load(Ordering::Relaxed))
    }

    fn swap_on_vsync(&mut self, back: Box<dyn Canvas>) -> Box<dyn Canvas> {
        self.wait_vsync();
        let shown = self.shared.front.load(Ordering::Relaxed);
        let hidden = 1 - shown;
        // Present the drawn back buffer; what was shown becomes the new
        // back buffer and its handle is returned.
        self.shared.front.store(hidden, Ordering::Relaxed);
        drop(back);
        self.canvas(shown)
    }
}

impl Drop for SimPanel {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(handle) = self.refresh_handle.take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Fast refresh so swap waits stay in the low milliseconds
    fn test_panel() -> SimPanel {
        SimPanel::new(2, 3, 500).unwrap()
    }

    #[test]
    fn test_reports_dimensions() {
        let panel = test_panel();
        assert_eq!(panel.num_strips(), 2);
        assert_eq!(panel.num_pixels_per_strip(), 3);
    }

    #[test]
    fn test_off_screen_writes_invisible_until_swap() {
        let mut panel = test_panel();
        let mut off = panel.create_off_screen();

        off.set_pixel(0, 0, 255, 0, 0);
        assert_eq!(panel.front_pixel(0, 0), (0, 0, 0));

        let _retired = panel.swap_on_vsync(off);
        assert_eq!(panel.front_pixel(0, 0), (255, 0, 0));
    }

    #[test]
    fn test_on_screen_writes_immediately_visible() {
        let mut panel = test_panel();
        let mut on = panel.on_screen();

        on.set_pixel(2, 1, 0, 255, 0);
        assert_eq!(panel.front_pixel(2, 1), (0, 255, 0));
    }

    #[test]
    fn test_swap_returns_the_retired_buffer() {
        let mut panel = test_panel();
        let mut off = panel.create_off_screen();
        off.set_pixel(1, 0, 10, 20, 30);

        let mut retired = panel.swap_on_vsync(off);
        // Writing through the retired handle must not disturb the shown frame.
        retired.set_pixel(1, 0, 99, 99, 99);
        assert_eq!(panel.front_pixel(1, 0), (10, 20, 30));
    }

    #[test]
    fn test_out_of_range_writes_ignored() {
        let mut panel = test_panel();
        let mut on = panel.on_screen();
        on.set_pixel(3, 0, 1, 2, 3);
        on.set_pixel(0, 2, 1, 2, 3);
        for y in 0..2 {
            for x in 0..3 {
                assert_eq!(panel.front_pixel(x, y), (0, 0, 0));
            }
        }
    }

    #[test]
    fn test_double_swap_restores_front_slot() {
        let mut panel = test_panel();
        let mut off = panel.create_off_screen();
        off.set_pixel(0, 0, 1, 1, 1);
        let mut off = panel.swap_on_vsync(off);
        off.set_pixel(0, 0, 2, 2, 2);
        let _off = panel.swap_on_vsync(off);
        assert_eq!(panel.front_pixel(0, 0), (2, 2, 2));
    }
}
