//! Registry of the encryption descriptors of sent attachments.

use std::{
    collections::HashMap,
    sync::{Mutex, PoisonError},
};

use log::debug;

use crate::timeline::{EncryptedFile, MediaRegistry};

/// In-memory [`MediaRegistry`] indexing encrypted attachments by content URI,
/// so their local copy can be decrypted for display.
#[derive(Default)]
pub struct EncryptedMediaCache {
    files: Mutex<HashMap<String, EncryptedFile>>,
}

impl EncryptedMediaCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Encryption descriptor registered for `url`.
    pub fn get(&self, url: &str) -> Option<EncryptedFile> {
        self.files
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(url)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.files
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl MediaRegistry for EncryptedMediaCache {
    fn add_encryption_info(&self, file: &EncryptedFile) {
        debug!("register encrypted media {}", file.url);

        self.files
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(file.url.to_string(), file.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timeline::create_encrypted_file;

    #[test]
    fn test_register_and_get() {
        let cache = EncryptedMediaCache::new();
        assert!(cache.is_empty());

        cache.add_encryption_info(&create_encrypted_file("mxc://example.com/a"));

        assert_eq!(
            cache
                .get("mxc://example.com/a")
                .map(|file| file.url.to_string()),
            Some("mxc://example.com/a".to_owned())
        );
        assert!(cache.get("mxc://example.com/b").is_none());
    }

    #[test]
    fn test_register_same_url_twice() {
        let cache = EncryptedMediaCache::new();

        cache.add_encryption_info(&create_encrypted_file("mxc://example.com/a"));
        cache.add_encryption_info(&create_encrypted_file("mxc://example.com/a"));

        assert_eq!(cache.len(), 1);
    }
}
