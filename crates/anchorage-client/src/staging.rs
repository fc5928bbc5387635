//! Scoped temporary staging.
//!
//! The transfer primitives operate against byte-addressable storage
//! rather than in-memory buffers, so payloads are staged into named
//! temporary files. The file is removed when the guard drops, on every
//! exit path including errors and cancellation.

use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

/// A payload staged on disk for the lifetime of one operation.
#[derive(Debug)]
pub struct StagedPayload {
    file: NamedTempFile,
}

impl StagedPayload {
    /// Stage `payload` into a fresh temporary file.
    pub fn write(payload: &[u8]) -> std::io::Result<Self> {
        let mut file = NamedTempFile::with_prefix("anchorage-upload-")?;
        file.write_all(payload)?;
        file.flush()?;
        Ok(Self { file })
    }

    /// Stage an empty destination for a download.
    pub fn empty() -> std::io::Result<Self> {
        let file = NamedTempFile::with_prefix("anchorage-download-")?;
        Ok(Self { file })
    }

    /// Path handed to the transfer primitives.
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Read the staged bytes back into memory.
    pub async fn read_back(&self) -> std::io::Result<Vec<u8>> {
        tokio::fs::read(self.file.path()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn staged_payload_round_trips() {
        let staged = StagedPayload::write(b"staged bytes").unwrap();
        assert_eq!(staged.read_back().await.unwrap(), b"staged bytes");
    }

    #[test]
    fn file_is_removed_on_drop() {
        let path = {
            let staged = StagedPayload::write(b"ephemeral").unwrap();
            staged.path().to_path_buf()
        };
        assert!(!path.exists());
    }
}
