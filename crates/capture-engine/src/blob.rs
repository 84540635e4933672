//! Encoded output: chunk accumulation, blobs and object URLs.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use vidfx_common::error::VidfxResult;

/// Encoded chunks in arrival order.
#[derive(Debug, Default)]
pub struct ChunkBuffer {
    chunks: Vec<Vec<u8>>,
    bytes: usize,
}

impl ChunkBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk. Empty chunks are ignored; returns whether it was kept.
    pub fn push(&mut self, chunk: Vec<u8>) -> bool {
        if chunk.is_empty() {
            return false;
        }
        self.bytes += chunk.len();
        self.chunks.push(chunk);
        true
    }

    /// Number of chunks held.
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Total bytes held.
    pub fn byte_len(&self) -> usize {
        self.bytes
    }

    pub fn clear(&mut self) {
        self.chunks.clear();
        self.bytes = 0;
    }

    /// Concatenate everything into a blob, leaving the buffer empty.
    pub fn take_blob(&mut self, mime_type: &str) -> Blob {
        let mut data = Vec::with_capacity(self.bytes);
        for chunk in self.chunks.drain(..) {
            data.extend_from_slice(&chunk);
        }
        self.bytes = 0;
        Blob::new(mime_type, data)
    }
}

/// Immutable bytes tagged with a MIME type. Clones share the data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blob {
    mime_type: String,
    data: Arc<[u8]>,
}

impl Blob {
    pub fn new(mime_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            mime_type: mime_type.into(),
            data: data.into(),
        }
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Write the blob to `path`, creating parent directories.
    pub fn write_to(&self, path: &Path) -> VidfxResult<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, &self.data)?;
        Ok(())
    }
}

/// Handle to a registered blob, e.g. `blob:vidfx/3`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectUrl(String);

impl ObjectUrl {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ObjectUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Session-lifetime registry of blob URLs.
#[derive(Debug, Default)]
pub struct ObjectUrlRegistry {
    next_id: u64,
    entries: HashMap<ObjectUrl, Blob>,
    current: Option<ObjectUrl>,
}

impl ObjectUrlRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a blob under a fresh URL.
    pub fn create(&mut self, blob: Blob) -> ObjectUrl {
        self.next_id += 1;
        let url = ObjectUrl(format!("blob:vidfx/{}", self.next_id));
        self.entries.insert(url.clone(), blob);
        url
    }

    /// Register the latest result, revoking the one it supersedes.
    pub fn publish(&mut self, blob: Blob) -> ObjectUrl {
        self.revoke_current();
        let url = self.create(blob);
        self.current = Some(url.clone());
        url
    }

    /// The most recently published URL, if still registered.
    pub fn current(&self) -> Option<&ObjectUrl> {
        self.current.as_ref()
    }

    pub fn resolve(&self, url: &ObjectUrl) -> Option<&Blob> {
        self.entries.get(url)
    }

    /// Release a URL. Returns whether it was registered; repeating is a no-op.
    pub fn revoke(&mut self, url: &ObjectUrl) -> bool {
        if self.current.as_ref() == Some(url) {
            self.current = None;
        }
        let removed = self.entries.remove(url).is_some();
        if removed {
            tracing::debug!(url = %url, "Revoked object URL");
        }
        removed
    }

    /// Release the current result, if any.
    pub fn revoke_current(&mut self) -> bool {
        match self.current.take() {
            Some(url) => self.revoke(&url),
            None => false,
        }
    }

    /// Number of live URLs.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunks_concatenate_in_order_skipping_empty() {
        let mut buffer = ChunkBuffer::new();
        assert!(buffer.push(vec![1, 2]));
        assert!(!buffer.push(Vec::new()));
        assert!(buffer.push(vec![3]));
        assert_eq!(buffer.len(), 2);
        assert_eq!(buffer.byte_len(), 3);

        let blob = buffer.take_blob("video/webm");
        assert_eq!(blob.bytes(), &[1, 2, 3]);
        assert_eq!(blob.mime_type(), "video/webm");
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_revoke_is_idempotent() {
        let mut registry = ObjectUrlRegistry::new();
        let url = registry.create(Blob::new("video/webm", vec![0]));
        assert!(registry.resolve(&url).is_some());
        assert!(registry.revoke(&url));
        assert!(!registry.revoke(&url));
        assert!(registry.resolve(&url).is_none());
    }

    #[test]
    fn test_publish_revokes_superseded_result() {
        let mut registry = ObjectUrlRegistry::new();
        let first = registry.publish(Blob::new("video/webm", vec![1]));
        let second = registry.publish(Blob::new("video/webm", vec![2]));
        assert_ne!(first, second);
        assert!(registry.resolve(&first).is_none());
        assert_eq!(registry.resolve(&second).unwrap().bytes(), &[2]);
        assert_eq!(registry.current(), Some(&second));
        assert_eq!(registry.len(), 1);
        assert!(second.as_str().starts_with("blob:vidfx/"));
    }

    #[test]
    fn test_write_blob() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("modified_a.webm");
        Blob::new("video/webm", vec![9, 8, 7]).write_to(&path).unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), vec![9, 8, 7]);
    }
}
