//! PixelPusher wire formats
//!
//! Two packet families, both UDP:
//!
//! - [`discovery`]: the once-per-second broadcast this endpoint emits on
//!   port 7331 so controllers can find it
//! - [`data`]: the pixel datagrams controllers push to port 5078

pub mod data;
pub mod discovery;

pub use data::{classify, strip_record_size, DataPacket, FrameError, StripRecords};
pub use discovery::{DiscoveryPacket, DiscoveryPacketHeader, PixelPusherBase, PixelPusherExt};
