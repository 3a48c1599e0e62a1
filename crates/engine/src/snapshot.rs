//! Snapshot file envelope
//!
//! ```text
//! [Magic: "TSNP"] [Version: u32] [Last txn: u64] [Timestamp micros: u64]
//! [Payload len: u64] [Payload: codec stream] [CRC32: u32]
//! ```
//!
//! All integers are little-endian. The checksum covers everything before
//! it. Files are written to a temp path, synced, then renamed over the
//! destination, so a crash leaves either the old file or the new one.

use crate::error::SnapshotFileError;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::fs::File;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Magic bytes at the start of a snapshot file
pub const SNAPSHOT_MAGIC: &[u8; 4] = b"TSNP";

/// Envelope version written by this build
pub const SNAPSHOT_VERSION: u32 = 1;

/// Header size: magic + version + last txn + timestamp + payload length
pub const SNAPSHOT_HEADER_SIZE: usize = 4 + 4 + 8 + 8 + 8;

/// Smallest valid file: header plus checksum
pub const MIN_SNAPSHOT_SIZE: usize = SNAPSHOT_HEADER_SIZE + 4;

/// Parsed snapshot file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotEnvelope {
    /// Envelope version
    pub version: u32,
    /// Last transaction reflected in the payload
    pub last_txn: u64,
    /// Write time, microseconds since the Unix epoch
    pub timestamp_micros: u64,
    /// Codec stream
    pub payload: Vec<u8>,
}

/// Where and what a snapshot write produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotInfo {
    /// Final path
    pub path: PathBuf,
    /// Last transaction reflected
    pub last_txn: u64,
    /// Write time, microseconds since the Unix epoch
    pub timestamp_micros: u64,
    /// File size
    pub size_bytes: u64,
}

impl SnapshotEnvelope {
    /// Envelope stamped with the current time
    pub fn new(last_txn: u64, payload: Vec<u8>) -> Self {
        SnapshotEnvelope {
            version: SNAPSHOT_VERSION,
            last_txn,
            timestamp_micros: chrono::Utc::now().timestamp_micros().max(0) as u64,
            payload,
        }
    }

    /// Serialize with the trailing checksum
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(MIN_SNAPSHOT_SIZE + self.payload.len());
        buf.extend_from_slice(SNAPSHOT_MAGIC);
        // Writes into a Vec cannot fail
        let _ = buf.write_u32::<LittleEndian>(self.version);
        let _ = buf.write_u64::<LittleEndian>(self.last_txn);
        let _ = buf.write_u64::<LittleEndian>(self.timestamp_micros);
        let _ = buf.write_u64::<LittleEndian>(self.payload.len() as u64);
        buf.extend_from_slice(&self.payload);
        let checksum = crc32fast::hash(&buf);
        let _ = buf.write_u32::<LittleEndian>(checksum);
        buf
    }

    /// Parse and verify a serialized envelope
    pub fn from_bytes(data: &[u8]) -> Result<Self, SnapshotFileError> {
        if data.len() < MIN_SNAPSHOT_SIZE {
            return Err(SnapshotFileError::TooShort {
                expected: MIN_SNAPSHOT_SIZE,
                actual: data.len(),
            });
        }
        if &data[0..4] != SNAPSHOT_MAGIC {
            return Err(SnapshotFileError::InvalidMagic {
                found: data[0..4].to_vec(),
            });
        }

        let (content, trailer) = data.split_at(data.len() - 4);
        let stored = Cursor::new(trailer).read_u32::<LittleEndian>()?;
        let computed = crc32fast::hash(content);
        if stored != computed {
            return Err(SnapshotFileError::ChecksumMismatch {
                expected: stored,
                actual: computed,
            });
        }

        let mut cursor = Cursor::new(&content[4..]);
        let version = cursor.read_u32::<LittleEndian>()?;
        if version != SNAPSHOT_VERSION {
            return Err(SnapshotFileError::UnsupportedVersion(version));
        }
        let last_txn = cursor.read_u64::<LittleEndian>()?;
        let timestamp_micros = cursor.read_u64::<LittleEndian>()?;
        let declared = cursor.read_u64::<LittleEndian>()?;
        let payload = &content[SNAPSHOT_HEADER_SIZE..];
        if declared != payload.len() as u64 {
            return Err(SnapshotFileError::LengthMismatch {
                declared,
                actual: payload.len() as u64,
            });
        }

        Ok(SnapshotEnvelope {
            version,
            last_txn,
            timestamp_micros,
            payload: payload.to_vec(),
        })
    }

    /// Read and verify a snapshot file
    pub fn read(path: &Path) -> Result<Self, SnapshotFileError> {
        let data = std::fs::read(path)?;
        debug!(target: "tessera::domain", path = %path.display(), bytes = data.len(), "Read snapshot file");
        Self::from_bytes(&data)
    }

    /// Write the envelope atomically (temp file, sync, rename)
    pub fn write_atomic(&self, path: &Path) -> Result<SnapshotInfo, SnapshotFileError> {
        let temp_path = path.with_extension("tsnp.tmp");
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }
        if temp_path.exists() {
            warn!(target: "tessera::domain", path = %temp_path.display(), "Removing stale temp file");
            let _ = std::fs::remove_file(&temp_path);
        }

        let bytes = self.to_bytes();
        let written = File::create(&temp_path).and_then(|mut file| {
            file.write_all(&bytes)?;
            file.sync_all()
        });
        if let Err(e) = written.and_then(|()| std::fs::rename(&temp_path, path)) {
            warn!(
                target: "tessera::domain",
                temp_path = %temp_path.display(),
                error = %e,
                "Snapshot write failed, cleaning up temp file"
            );
            let _ = std::fs::remove_file(&temp_path);
            return Err(SnapshotFileError::Io(e));
        }

        info!(
            target: "tessera::domain",
            path = %path.display(),
            last_txn = self.last_txn,
            size_bytes = bytes.len(),
            "Snapshot written"
        );
        Ok(SnapshotInfo {
            path: path.to_path_buf(),
            last_txn: self.last_txn,
            timestamp_micros: self.timestamp_micros,
            size_bytes: bytes.len() as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample() -> SnapshotEnvelope {
        SnapshotEnvelope {
            version: SNAPSHOT_VERSION,
            last_txn: 42,
            timestamp_micros: 1_700_000_000_000_000,
            payload: b"TSRA payload".to_vec(),
        }
    }

    #[test]
    fn test_layout() {
        let bytes = sample().to_bytes();
        assert_eq!(&bytes[0..4], b"TSNP");
        assert_eq!(bytes.len(), MIN_SNAPSHOT_SIZE + 12);
        assert_eq!(u64::from_le_bytes(bytes[8..16].try_into().unwrap()), 42);
        assert_eq!(SnapshotEnvelope::from_bytes(&bytes).unwrap(), sample());
    }

    #[test]
    fn test_flipped_payload_byte_fails_checksum() {
        let mut bytes = sample().to_bytes();
        bytes[SNAPSHOT_HEADER_SIZE + 2] ^= 0x40;
        assert!(matches!(
            SnapshotEnvelope::from_bytes(&bytes),
            Err(SnapshotFileError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn test_short_and_foreign_files() {
        assert!(matches!(
            SnapshotEnvelope::from_bytes(b"TSNP"),
            Err(SnapshotFileError::TooShort { .. })
        ));
        let mut bytes = sample().to_bytes();
        bytes[0] = b'X';
        assert!(matches!(
            SnapshotEnvelope::from_bytes(&bytes),
            Err(SnapshotFileError::InvalidMagic { .. })
        ));
    }

    #[test]
    fn test_unsupported_version() {
        let mut envelope = sample();
        envelope.version = 9;
        assert!(matches!(
            SnapshotEnvelope::from_bytes(&envelope.to_bytes()),
            Err(SnapshotFileError::UnsupportedVersion(9))
        ));
    }

    #[test]
    fn test_atomic_write_replaces_and_cleans_up() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("domain.tsnp");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path.with_extension("tsnp.tmp"), b"stale").unwrap();

        let info = sample().write_atomic(&path).unwrap();
        assert_eq!(info.last_txn, 42);
        assert!(!path.with_extension("tsnp.tmp").exists());
        assert_eq!(SnapshotEnvelope::read(&path).unwrap(), sample());

        let mut newer = sample();
        newer.last_txn = 43;
        newer.write_atomic(&path).unwrap();
        assert_eq!(SnapshotEnvelope::read(&path).unwrap().last_txn, 43);
    }
}
