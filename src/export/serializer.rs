//! Artifact serialization utilities
//!
//! Binary artifacts are bincode payloads wrapped in an envelope carrying a
//! magic tag, a format version, the artifact kind and an FNV-1a checksum.

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use crate::error::{NoiseMapError, Result};

/// Checksummed wrapper around a serialized artifact
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactEnvelope {
    /// Magic bytes for format detection
    pub magic: [u8; 4],
    pub format_version: u32,
    /// What the payload holds, e.g. `noise_level_model`
    pub kind: String,
    /// RFC 3339 creation time
    pub created_at: String,
    pub payload: Vec<u8>,
    pub checksum: u64,
}

impl ArtifactEnvelope {
    /// Magic bytes for NoiseMap artifact files
    pub const MAGIC: [u8; 4] = [b'N', b'M', b'A', b'P'];
    /// Current format version
    pub const VERSION: u32 = 1;

    pub fn new(kind: impl Into<String>, payload: Vec<u8>) -> Self {
        let checksum = Self::compute_checksum(&payload);
        Self {
            magic: Self::MAGIC,
            format_version: Self::VERSION,
            kind: kind.into(),
            created_at: Utc::now().to_rfc3339(),
            payload,
            checksum,
        }
    }

    /// FNV-1a hash of the payload
    fn compute_checksum(data: &[u8]) -> u64 {
        const FNV_OFFSET: u64 = 14695981039346656037;
        const FNV_PRIME: u64 = 1099511628211;

        data.iter().fold(FNV_OFFSET, |hash, &byte| (hash ^ byte as u64).wrapping_mul(FNV_PRIME))
    }

    pub fn verify_checksum(&self) -> bool {
        Self::compute_checksum(&self.payload) == self.checksum
    }

    /// Validated payload of an envelope expected to hold `kind`
    pub fn open(&self, kind: &str) -> Result<&[u8]> {
        if self.magic != Self::MAGIC {
            return Err(NoiseMapError::PersistenceError("Not a NoiseMap artifact".into()));
        }
        if self.format_version != Self::VERSION {
            return Err(NoiseMapError::PersistenceError(format!(
                "Unsupported artifact format version {} (expected {})",
                self.format_version,
                Self::VERSION
            )));
        }
        if self.kind != kind {
            return Err(NoiseMapError::PersistenceError(format!(
                "Expected a {} artifact, found {}",
                kind, self.kind
            )));
        }
        if !self.verify_checksum() {
            return Err(NoiseMapError::PersistenceError(format!("Checksum mismatch in {} artifact", kind)));
        }
        Ok(&self.payload)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        bincode::deserialize(bytes)
            .map_err(|e| NoiseMapError::PersistenceError(format!("Corrupt artifact envelope: {}", e)))
    }
}

/// Write already-serialized `payload` under `kind`
pub fn save_payload(payload: Vec<u8>, kind: &str, path: impl AsRef<Path>) -> Result<()> {
    let bytes = ArtifactEnvelope::new(kind, payload).to_bytes()?;
    let mut writer = BufWriter::new(File::create(path.as_ref())?);
    writer.write_all(&bytes)?;
    writer.flush()?;
    Ok(())
}

/// Read and validate the payload of a `kind` artifact
pub fn load_payload(kind: &str, path: impl AsRef<Path>) -> Result<Vec<u8>> {
    let path = path.as_ref();
    let mut bytes = Vec::new();
    BufReader::new(File::open(path)?).read_to_end(&mut bytes)?;
    let envelope = ArtifactEnvelope::from_bytes(&bytes)?;
    envelope
        .open(kind)
        .map(<[u8]>::to_vec)
        .map_err(|e| NoiseMapError::PersistenceError(format!("{}: {}", path.display(), e)))
}

/// Save a serde value as an enveloped bincode artifact
pub fn save_binary<T: Serialize>(value: &T, kind: &str, path: impl AsRef<Path>) -> Result<()> {
    save_payload(bincode::serialize(value)?, kind, path)
}

/// Load an enveloped bincode artifact
pub fn load_binary<T: DeserializeOwned>(kind: &str, path: impl AsRef<Path>) -> Result<T> {
    Ok(bincode::deserialize(&load_payload(kind, path)?)?)
}

/// Save a value as pretty-printed JSON
pub fn save_json<T: Serialize>(value: &T, path: impl AsRef<Path>) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path.as_ref())?);
    serde_json::to_writer_pretty(&mut writer, value)?;
    writer.flush()?;
    Ok(())
}

/// Load a JSON document
pub fn load_json<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T> {
    let reader = BufReader::new(File::open(path.as_ref())?);
    Ok(serde_json::from_reader(reader)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_envelope_checksum() {
        let envelope = ArtifactEnvelope::new("scaler", vec![1, 2, 3]);
        assert!(envelope.verify_checksum());
        assert_eq!(envelope.open("scaler").unwrap(), &[1, 2, 3]);
        assert!(envelope.open("model").is_err());

        let mut tampered = envelope.clone();
        tampered.payload[0] = 9;
        assert!(matches!(tampered.open("scaler"), Err(NoiseMapError::PersistenceError(_))));
    }

    #[test]
    fn test_binary_file_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("values.bin");
        save_binary(&vec![0.5f64, -1.25], "values", &path).unwrap();
        let loaded: Vec<f64> = load_binary("values", &path).unwrap();
        assert_eq!(loaded, vec![0.5, -1.25]);
        assert!(load_binary::<Vec<f64>>("other", &path).is_err());
    }

    #[test]
    fn test_garbage_file_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("garbage.bin");
        std::fs::write(&path, b"not an artifact").unwrap();
        assert!(load_binary::<Vec<f64>>("values", &path).is_err());
    }
}
