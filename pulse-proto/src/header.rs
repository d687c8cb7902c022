use crate::crc::checksum;
use crate::error::{Result, WireError};

/// Fixed-size packet header: version(1) + reserved(1) + length(2) +
/// crc(4) + timestamp(8) = 16 octets, all big-endian.
pub const HEADER_LEN: usize = 16;

/// Highest protocol version this build understands.
pub const MAX_SUPPORTED_VERSION: u8 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub version: u8,
    /// Total length of the packet (header + records), in octets.
    pub length: u16,
    pub crc: u32,
    /// Sender wall-clock time, microseconds since the epoch.
    pub timestamp: u64,
}

impl Header {
    pub fn encode(&self, buf: &mut [u8]) -> Result<usize> {
        if buf.len() < HEADER_LEN {
            return Err(WireError::BufferTooSmall { need: HEADER_LEN, have: buf.len() });
        }
        buf[0] = self.version;
        buf[1] = 0; // reserved
        buf[2..4].copy_from_slice(&self.length.to_be_bytes());
        buf[4..8].copy_from_slice(&self.crc.to_be_bytes());
        buf[8..16].copy_from_slice(&self.timestamp.to_be_bytes());
        Ok(HEADER_LEN)
    }

    pub fn decode(buf: &[u8]) -> Result<Self> {
        if buf.len() < HEADER_LEN {
            return Err(WireError::BufferTooSmall { need: HEADER_LEN, have: buf.len() });
        }
        Ok(Header {
            version: buf[0],
            length: u16::from_be_bytes([buf[2], buf[3]]),
            crc: u32::from_be_bytes([buf[4], buf[5], buf[6], buf[7]]),
            timestamp: u64::from_be_bytes(buf[8..16].try_into().unwrap()),
        })
    }

    /// Validates a received packet in the same order the mux network loop
    /// applies its rejection rules: an oversized claim is caught before
    /// the (potentially expensive) CRC walk, and an unsupported version
    /// is only reported once the packet is known to be intact.
    pub fn validate(buf: &[u8], received_len: usize, max_version: u8) -> Result<Header> {
        let header = Header::decode(buf)?;
        let length = header.length as usize;
        if length > received_len {
            return Err(WireError::Oversized { length, max: received_len });
        }
        let mut scratch = buf[..length].to_vec();
        scratch[4..8].copy_from_slice(&0u32.to_be_bytes());
        if checksum(&scratch) != header.crc {
            return Err(WireError::BadCrc);
        }
        if header.version > max_version {
            return Err(WireError::UnsupportedVersion { version: header.version });
        }
        Ok(header)
    }

    /// Fills in `length` and `crc` for a packet already assembled in
    /// `buf[..total_len]` (header zeroed at the crc field), and writes
    /// the header bytes in place.
    pub fn finalize(buf: &mut [u8], total_len: usize, version: u8, timestamp: u64) -> Result<()> {
        if buf.len() < total_len || total_len < HEADER_LEN {
            return Err(WireError::BufferTooSmall { need: total_len, have: buf.len() });
        }
        let header = Header { version, length: total_len as u16, crc: 0, timestamp };
        header.encode(&mut buf[..HEADER_LEN])?;
        let crc = checksum(&buf[..total_len]);
        buf[4..8].copy_from_slice(&crc.to_be_bytes());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_decode_round_trip() {
        let h = Header { version: 2, length: 42, crc: 0xdeadbeef, timestamp: 123456789 };
        let mut buf = [0u8; HEADER_LEN];
        h.encode(&mut buf).unwrap();
        let back = Header::decode(&buf).unwrap();
        assert_eq!(h, back);
    }

    #[test]
    fn finalize_then_validate_succeeds() {
        let mut buf = [0u8; 32];
        buf[HEADER_LEN..HEADER_LEN + 4].copy_from_slice(&[1, 2, 3, 4]);
        Header::finalize(&mut buf, 32, 2, 999).unwrap();
        let h = Header::validate(&buf, 32, MAX_SUPPORTED_VERSION).unwrap();
        assert_eq!(h.version, 2);
        assert_eq!(h.timestamp, 999);
    }

    #[test]
    fn validate_rejects_tampered_payload() {
        let mut buf = [0u8; 32];
        Header::finalize(&mut buf, 32, 2, 1).unwrap();
        buf[20] ^= 0xff;
        assert_eq!(Header::validate(&buf, 32, MAX_SUPPORTED_VERSION), Err(WireError::BadCrc));
    }

    #[test]
    fn validate_rejects_oversized_claim() {
        let mut buf = [0u8; 32];
        Header::finalize(&mut buf, 32, 2, 1).unwrap();
        // received only the header, but length claims 32 bytes follow
        let err = Header::validate(&buf[..HEADER_LEN], HEADER_LEN, MAX_SUPPORTED_VERSION)
            .unwrap_err();
        assert_eq!(err, WireError::Oversized { length: 32, max: HEADER_LEN });
    }

    #[test]
    fn validate_rejects_unsupported_version_after_crc_passes() {
        let mut buf = [0u8; 32];
        Header::finalize(&mut buf, 32, 9, 1).unwrap();
        assert_eq!(
            Header::validate(&buf, 32, MAX_SUPPORTED_VERSION),
            Err(WireError::UnsupportedVersion { version: 9 })
        );
    }
}
