//! Stream header
//!
//! ```text
//! [Magic: "TSRA"]
//! [Format version: u16 LE]
//! [Mode byte: 180 | 181 | 182]
//! [Root value]
//! ```
//!
//! Exactly one root value follows the header; trailing bytes are corruption.

use crate::error::WireError;
use crate::marker::ModeByte;
use crate::primitives::{ByteReader, ByteWriter};
use thiserror::Error;

/// Magic bytes at the start of every stream
pub const STREAM_MAGIC: &[u8; 4] = b"TSRA";

/// Current wire format version
pub const FORMAT_VERSION: u16 = 1;

/// Size of the fixed header in bytes
pub const HEADER_SIZE: usize = 7;

/// Header problems
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HeaderError {
    /// The stream is shorter than the header
    #[error("stream header truncated: {0}")]
    Truncated(WireError),

    /// Wrong magic bytes
    #[error("bad stream magic {0:02x?}")]
    BadMagic([u8; 4]),

    /// Version this build cannot read
    #[error("unsupported format version {found} (supported: {})", FORMAT_VERSION)]
    UnsupportedVersion {
        /// Version in the stream
        found: u16,
    },

    /// Third header field is not a mode byte
    #[error("invalid header mode byte {0}")]
    BadMode(u8),
}

/// Decoded header fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamHeader {
    /// Wire format version
    pub format_version: u16,
    /// Debug mode in effect for the root value
    pub debug: bool,
}

/// Write the header for a stream that starts in `debug` mode
pub fn write_header(out: &mut ByteWriter, debug: bool) {
    out.write_bytes(STREAM_MAGIC);
    out.write_u16(FORMAT_VERSION);
    let mode = if debug {
        ModeByte::EnterDebug
    } else {
        ModeByte::NoChange
    };
    out.write_u8(mode.to_byte());
}

/// Read and validate the header
pub fn read_header(r: &mut ByteReader<'_>) -> Result<StreamHeader, HeaderError> {
    let magic = r.read_bytes(4).map_err(HeaderError::Truncated)?;
    if magic != STREAM_MAGIC {
        let mut found = [0u8; 4];
        found.copy_from_slice(magic);
        return Err(HeaderError::BadMagic(found));
    }
    let format_version = r.read_u16().map_err(HeaderError::Truncated)?;
    if format_version != FORMAT_VERSION {
        return Err(HeaderError::UnsupportedVersion {
            found: format_version,
        });
    }
    let byte = r.read_u8().map_err(HeaderError::Truncated)?;
    let mode = ModeByte::from_byte(byte).ok_or(HeaderError::BadMode(byte))?;
    Ok(StreamHeader {
        format_version,
        debug: mode.apply(false),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_layout() {
        let mut w = ByteWriter::new();
        write_header(&mut w, true);
        let bytes = w.into_inner();
        assert_eq!(bytes.len(), HEADER_SIZE);
        assert_eq!(&bytes[..4], b"TSRA");
        assert_eq!(&bytes[4..6], &[1, 0]);
        assert_eq!(bytes[6], 182);

        let header = read_header(&mut ByteReader::new(&bytes)).unwrap();
        assert!(header.debug);
        assert_eq!(header.format_version, FORMAT_VERSION);
    }

    #[test]
    fn test_header_rejects_bad_magic() {
        let bytes = b"NOPE\x01\x00\xb4";
        assert!(matches!(
            read_header(&mut ByteReader::new(bytes)),
            Err(HeaderError::BadMagic(_))
        ));
    }

    #[test]
    fn test_header_rejects_future_version() {
        let bytes = b"TSRA\x02\x00\xb4";
        assert_eq!(
            read_header(&mut ByteReader::new(bytes)),
            Err(HeaderError::UnsupportedVersion { found: 2 })
        );
    }

    #[test]
    fn test_header_rejects_marker_as_mode() {
        let bytes = b"TSRA\x01\x00\x0e";
        assert_eq!(
            read_header(&mut ByteReader::new(bytes)),
            Err(HeaderError::BadMode(14))
        );
    }

    #[test]
    fn test_truncated_header() {
        assert!(matches!(
            read_header(&mut ByteReader::new(b"TS")),
            Err(HeaderError::Truncated(_))
        ));
    }
}
