//! Discovery packet wire format
//!
//! Every second the beacon broadcasts one discovery packet describing this
//! endpoint. The packet is the concatenation `header || base || ext`:
//!
//! ```text
//! ┌──────────────────┬─────────────────────────────┬──────────────┐
//! │ Header (24)      │ Base (30 + strips_attached) │ Ext (12)     │
//! └──────────────────┴─────────────────────────────┴──────────────┘
//! ```
//!
//! All multi-byte fields are little-endian on the wire, with one exception:
//! `ip_address` is the four network-byte-order octets as resolved from the
//! interface. Packets are assembled field by field into a byte buffer; an
//! in-memory struct image is never transmitted.
//!
//! Only two base fields change after startup: `update_period` and
//! `delta_sequence`, both maintained by the frame receiver through the
//! beacon (see [`crate::server::beacon`]).

/// Port the discovery beacon broadcasts to.
pub const DISCOVERY_PORT: u16 = 7331;

/// `device_type` value identifying a PixelPusher endpoint.
pub const DEVICE_TYPE_PIXELPUSHER: u8 = 2;

pub const PROTOCOL_VERSION: u8 = 1;
pub const VENDOR_ID: u16 = 3;
pub const PRODUCT_ID: u16 = 0;
pub const SW_REVISION: u16 = 122;

/// Advertised link speed in bits per second (10 MBit).
pub const LINK_SPEED_BPS: u32 = 10_000_000;

/// Strip flag: luminance correction is applied on this strip.
pub const SFLAG_LOGARITHMIC: u8 = 0x01;

/// Wire size of [`DiscoveryPacketHeader`].
pub const HEADER_SIZE: usize = 24;

/// Wire size of the fixed part of [`PixelPusherBase`], before the
/// per-strip flag bytes.
pub const BASE_FIXED_SIZE: usize = 30;

/// Wire size of [`PixelPusherExt`].
pub const EXT_SIZE: usize = 12;

/// Total discovery packet size for a given strip count. Computed once at
/// startup and constant thereafter.
pub fn discovery_packet_size(strips_attached: usize) -> usize {
    HEADER_SIZE + BASE_FIXED_SIZE + strips_attached + EXT_SIZE
}

/// Fixed identification header of the discovery packet.
///
/// Immutable after startup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiscoveryPacketHeader {
    pub mac_address: [u8; 6],
    /// Network byte order, unlike every other multi-byte field.
    pub ip_address: [u8; 4],
    pub device_type: u8,
    pub protocol_version: u8,
    pub vendor_id: u16,
    pub product_id: u16,
    pub hw_revision: u16,
    pub sw_revision: u16,
    /// Bits per second.
    pub link_speed: u32,
}

impl DiscoveryPacketHeader {
    pub fn write_into(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.mac_address);
        buf.extend_from_slice(&self.ip_address);
        buf.push(self.device_type);
        buf.push(self.protocol_version);
        buf.extend_from_slice(&self.vendor_id.to_le_bytes());
        buf.extend_from_slice(&self.product_id.to_le_bytes());
        buf.extend_from_slice(&self.hw_revision.to_le_bytes());
        buf.extend_from_slice(&self.sw_revision.to_le_bytes());
        buf.extend_from_slice(&self.link_speed.to_le_bytes());
    }

    pub fn parse(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < HEADER_SIZE {
            return None;
        }
        let mut mac_address = [0u8; 6];
        mac_address.copy_from_slice(&bytes[0..6]);
        let mut ip_address = [0u8; 4];
        ip_address.copy_from_slice(&bytes[6..10]);
        Some(Self {
            mac_address,
            ip_address,
            device_type: bytes[10],
            protocol_version: bytes[11],
            vendor_id: read_u16(bytes, 12),
            product_id: read_u16(bytes, 14),
            hw_revision: read_u16(bytes, 16),
            sw_revision: read_u16(bytes, 18),
            link_speed: read_u32(bytes, 20),
        })
    }
}

/// Variable-length pusher description.
///
/// `update_period` and `delta_sequence` are the live statistics fields; the
/// rest is fixed at startup. `strip_flags` holds one flag byte per strip.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PixelPusherBase {
    pub strips_attached: u8,
    pub max_strips_per_packet: u8,
    pub pixels_per_strip: u16,
    /// Advertised minimum inter-frame interval in microseconds.
    pub update_period: u32,
    /// In PWM units.
    pub power_total: u32,
    /// Count of sequence numbers missed since the last beacon.
    pub delta_sequence: u32,
    pub controller_ordinal: i32,
    pub group_ordinal: i32,
    pub artnet_universe: u16,
    pub artnet_channel: u16,
    /// The data port this endpoint listens on.
    pub my_port: u16,
    /// One flag byte per strip, `strips_attached` long.
    pub strip_flags: Vec<u8>,
}

impl PixelPusherBase {
    pub fn wire_size(&self) -> usize {
        BASE_FIXED_SIZE + self.strip_flags.len()
    }

    pub fn write_into(&self, buf: &mut Vec<u8>) {
        buf.push(self.strips_attached);
        buf.push(self.max_strips_per_packet);
        buf.extend_from_slice(&self.pixels_per_strip.to_le_bytes());
        buf.extend_from_slice(&self.update_period.to_le_bytes());
        buf.extend_from_slice(&self.power_total.to_le_bytes());
        buf.extend_from_slice(&self.delta_sequence.to_le_bytes());
        buf.extend_from_slice(&self.controller_ordinal.to_le_bytes());
        buf.extend_from_slice(&self.group_ordinal.to_le_bytes());
        buf.extend_from_slice(&self.artnet_universe.to_le_bytes());
        buf.extend_from_slice(&self.artnet_channel.to_le_bytes());
        buf.extend_from_slice(&self.my_port.to_le_bytes());
        buf.extend_from_slice(&self.strip_flags);
    }

    /// Parse a base whose length is implied by its own `strips_attached`
    /// byte. Returns the base and the number of bytes consumed.
    pub fn parse(bytes: &[u8]) -> Option<(Self, usize)> {
        if bytes.len() < BASE_FIXED_SIZE {
            return None;
        }
        let strips = bytes[0] as usize;
        let total = BASE_FIXED_SIZE + strips;
        if bytes.len() < total {
            return None;
        }
        let base = Self {
            strips_attached: bytes[0],
            max_strips_per_packet: bytes[1],
            pixels_per_strip: read_u16(bytes, 2),
            update_period: read_u32(bytes, 4),
            power_total: read_u32(bytes, 8),
            delta_sequence: read_u32(bytes, 12),
            controller_ordinal: read_i32(bytes, 16),
            group_ordinal: read_i32(bytes, 20),
            artnet_universe: read_u16(bytes, 24),
            artnet_channel: read_u16(bytes, 26),
            my_port: read_u16(bytes, 28),
            strip_flags: bytes[BASE_FIXED_SIZE..total].to_vec(),
        };
        Some((base, total))
    }
}

/// Fixed tail of the pusher description. All zero in this implementation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PixelPusherExt {
    pub pusher_flags: u32,
    pub segments: u32,
    pub power_domain: u32,
}

impl PixelPusherExt {
    pub fn write_into(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.pusher_flags.to_le_bytes());
        buf.extend_from_slice(&self.segments.to_le_bytes());
        buf.extend_from_slice(&self.power_domain.to_le_bytes());
    }

    pub fn parse(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < EXT_SIZE {
            return None;
        }
        Some(Self {
            pusher_flags: read_u32(bytes, 0),
            segments: read_u32(bytes, 4),
            power_domain: read_u32(bytes, 8),
        })
    }
}

/// Base + ext, created once at startup and owned by the beacon.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PixelPusherContainer {
    pub base: PixelPusherBase,
    pub ext: PixelPusherExt,
}

impl PixelPusherContainer {
    pub fn wire_size(&self) -> usize {
        self.base.wire_size() + EXT_SIZE
    }

    pub fn write_into(&self, buf: &mut Vec<u8>) {
        self.base.write_into(buf);
        self.ext.write_into(buf);
    }
}

/// A complete discovery packet as it travels on the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiscoveryPacket {
    pub header: DiscoveryPacketHeader,
    pub pusher: PixelPusherContainer,
}

impl DiscoveryPacket {
    pub fn wire_size(&self) -> usize {
        HEADER_SIZE + self.pusher.wire_size()
    }

    pub fn write_into(&self, buf: &mut Vec<u8>) {
        self.header.write_into(buf);
        self.pusher.write_into(buf);
    }

    pub fn parse(bytes: &[u8]) -> Option<Self> {
        let header = DiscoveryPacketHeader::parse(bytes)?;
        let (base, base_len) = PixelPusherBase::parse(&bytes[HEADER_SIZE..])?;
        let ext = PixelPusherExt::parse(&bytes[HEADER_SIZE + base_len..])?;
        Some(Self {
            header,
            pusher: PixelPusherContainer { base, ext },
        })
    }
}

#[inline]
fn read_u16(bytes: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([bytes[offset], bytes[offset + 1]])
}

#[inline]
fn read_u32(bytes: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        bytes[offset],
        bytes[offset + 1],
        bytes[offset + 2],
        bytes[offset + 3],
    ])
}

#[inline]
fn read_i32(bytes: &[u8], offset: usize) -> i32 {
    read_u32(bytes, offset) as i32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_header() -> DiscoveryPacketHeader {
        DiscoveryPacketHeader {
            mac_address: [0xDE, 0xAD, 0xBE, 0xEF, 0x00, 0x01],
            ip_address: [192, 168, 1, 42],
            device_type: DEVICE_TYPE_PIXELPUSHER,
            protocol_version: PROTOCOL_VERSION,
            vendor_id: VENDOR_ID,
            product_id: PRODUCT_ID,
            hw_revision: 0,
            sw_revision: SW_REVISION,
            link_speed: LINK_SPEED_BPS,
        }
    }

    fn sample_base(strips: usize) -> PixelPusherBase {
        PixelPusherBase {
            strips_attached: strips as u8,
            max_strips_per_packet: 7,
            pixels_per_strip: 64,
            update_period: 1851,
            power_total: 1,
            delta_sequence: 0,
            controller_ordinal: 0,
            group_ordinal: 0,
            artnet_universe: 0,
            artnet_channel: 0,
            my_port: 5078,
            strip_flags: vec![0; strips],
        }
    }

    #[test]
    fn test_header_layout() {
        let mut buf = Vec::new();
        sample_header().write_into(&mut buf);

        assert_eq!(buf.len(), HEADER_SIZE);
        // MAC at 0..6, IP octets (network order) at 6..10
        assert_eq!(&buf[0..6], &[0xDE, 0xAD, 0xBE, 0xEF, 0x00, 0x01]);
        assert_eq!(&buf[6..10], &[192, 168, 1, 42]);
        assert_eq!(buf[10], 2); // device_type
        assert_eq!(buf[11], 1); // protocol_version
        // vendor_id = 3, little-endian
        assert_eq!(&buf[12..14], &[3, 0]);
        // sw_revision = 122, little-endian
        assert_eq!(&buf[18..20], &[122, 0]);
        // link_speed = 10_000_000 = 0x00989680, little-endian
        assert_eq!(&buf[20..24], &[0x80, 0x96, 0x98, 0x00]);
    }

    #[test]
    fn test_base_layout() {
        let mut base = sample_base(4);
        base.update_period = 0x0102_0304;
        base.delta_sequence = 9;
        base.strip_flags = vec![SFLAG_LOGARITHMIC; 4];

        let mut buf = Vec::new();
        base.write_into(&mut buf);

        assert_eq!(buf.len(), BASE_FIXED_SIZE + 4);
        assert_eq!(buf[0], 4); // strips_attached
        assert_eq!(buf[1], 7); // max_strips_per_packet
        assert_eq!(&buf[2..4], &[64, 0]); // pixels_per_strip LE
        assert_eq!(&buf[4..8], &[0x04, 0x03, 0x02, 0x01]); // update_period LE
        assert_eq!(&buf[12..16], &[9, 0, 0, 0]); // delta_sequence LE
        assert_eq!(&buf[28..30], &[0xD6, 0x13]); // my_port = 5078 = 0x13D6 LE
        assert_eq!(&buf[30..34], &[0x01; 4]); // strip flags
    }

    #[test]
    fn test_negative_ordinals_round_trip() {
        let mut base = sample_base(2);
        base.controller_ordinal = -2;
        base.group_ordinal = -1;

        let mut buf = Vec::new();
        base.write_into(&mut buf);
        let (parsed, consumed) = PixelPusherBase::parse(&buf).unwrap();

        assert_eq!(consumed, buf.len());
        assert_eq!(parsed, base);
    }

    #[test]
    fn test_packet_size_formula() {
        for strips in [1usize, 2, 32, 255] {
            let packet = DiscoveryPacket {
                header: sample_header(),
                pusher: PixelPusherContainer {
                    base: sample_base(strips),
                    ext: PixelPusherExt::default(),
                },
            };
            let mut buf = Vec::new();
            packet.write_into(&mut buf);
            assert_eq!(buf.len(), discovery_packet_size(strips));
            assert_eq!(buf.len(), HEADER_SIZE + BASE_FIXED_SIZE + strips + EXT_SIZE);
            assert_eq!(packet.wire_size(), buf.len());
        }
    }

    #[test]
    fn test_full_packet_round_trip() {
        let packet = DiscoveryPacket {
            header: sample_header(),
            pusher: PixelPusherContainer {
                base: PixelPusherBase {
                    strips_attached: 3,
                    max_strips_per_packet: 3,
                    pixels_per_strip: 300,
                    update_period: 16_666,
                    power_total: 1,
                    delta_sequence: 77,
                    controller_ordinal: 5,
                    group_ordinal: 2,
                    artnet_universe: 4,
                    artnet_channel: 1,
                    my_port: 5078,
                    strip_flags: vec![SFLAG_LOGARITHMIC, 0, SFLAG_LOGARITHMIC],
                },
                ext: PixelPusherExt {
                    pusher_flags: 0xAABB_CCDD,
                    segments: 2,
                    power_domain: 1,
                },
            },
        };

        let mut buf = Vec::new();
        packet.write_into(&mut buf);
        let parsed = DiscoveryPacket::parse(&buf).unwrap();
        assert_eq!(parsed, packet);
    }

    #[test]
    fn test_parse_rejects_truncated_input() {
        let mut buf = Vec::new();
        DiscoveryPacket {
            header: sample_header(),
            pusher: PixelPusherContainer {
                base: sample_base(8),
                ext: PixelPusherExt::default(),
            },
        }
        .write_into(&mut buf);

        assert!(DiscoveryPacket::parse(&buf[..buf.len() - 1]).is_none());
        assert!(DiscoveryPacketHeader::parse(&buf[..HEADER_SIZE - 1]).is_none());
        assert!(PixelPusherBase::parse(&buf[HEADER_SIZE..HEADER_SIZE + 10]).is_none());
    }

    #[test]
    fn test_ext_offsets() {
        let ext = PixelPusherExt {
            pusher_flags: 1,
            segments: 2,
            power_domain: 3,
        };
        let mut buf = Vec::new();
        ext.write_into(&mut buf);
        assert_eq!(buf.len(), EXT_SIZE);
        assert_eq!(&buf[0..4], &[1, 0, 0, 0]);
        assert_eq!(&buf[4..8], &[2, 0, 0, 0]);
        assert_eq!(&buf[8..12], &[3, 0, 0, 0]);
    }
}
