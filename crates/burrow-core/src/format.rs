//! On-disk format constants.
//!
//! Every value-log segment starts with a fixed header so that foreign or
//! future files are rejected instead of being misread.

/// Value-log segment magic: "BRVL" (BuRrow Value Log)
pub const VLOG_MAGIC: u32 = 0x4252_564C;

/// Value-log format version
pub const VLOG_FORMAT_VERSION: u16 = 1;

/// Size of the segment header: magic (u32 LE) + version (u16 LE)
pub const VLOG_HEADER_SIZE: usize = 6;

/// Encodes the segment header.
pub fn vlog_header() -> [u8; VLOG_HEADER_SIZE] {
    let mut header = [0u8; VLOG_HEADER_SIZE];
    header[..4].copy_from_slice(&VLOG_MAGIC.to_le_bytes());
    header[4..].copy_from_slice(&VLOG_FORMAT_VERSION.to_le_bytes());
    header
}

/// Validates a segment header, returning the format version it declares.
pub fn check_vlog_header(header: &[u8]) -> crate::Result<u16> {
    if header.len() < VLOG_HEADER_SIZE {
        return Err(crate::Error::Corrupted(format!(
            "segment header too short: {} bytes",
            header.len()
        )));
    }

    let magic = u32::from_le_bytes([header[0], header[1], header[2], header[3]]);
    if magic != VLOG_MAGIC {
        return Err(crate::Error::Corrupted(format!(
            "bad segment magic {:#010x}",
            magic
        )));
    }

    let version = u16::from_le_bytes([header[4], header[5]]);
    if version == 0 || version > VLOG_FORMAT_VERSION {
        return Err(crate::Error::Corrupted(format!(
            "unsupported value log version {}",
            version
        )));
    }

    Ok(version)
}
