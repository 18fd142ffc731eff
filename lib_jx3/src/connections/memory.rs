//! In-memory subscriber directory.
//!
//! Backs unit tests and the pipeline dry-run binary; `replace` swaps the
//! whole record set so tests can flip toggles between events.

use std::sync::Mutex;

use async_trait::async_trait;

use crate::core::model::{DirectoryError, GroupBind};
use crate::core::router::SubscriberDirectory;

/// A mutex-held record set serving point-in-time snapshots.
#[derive(Default)]
pub struct MemoryDirectory {
    binds: Mutex<Vec<GroupBind>>,
}

impl MemoryDirectory {
    /// Creates a directory holding the given records.
    pub fn new(binds: Vec<GroupBind>) -> Self {
        Self {
            binds: Mutex::new(binds),
        }
    }

    /// Replaces the whole record set.
    pub fn replace(&self, binds: Vec<GroupBind>) {
        *self.binds.lock().expect("directory lock poisoned") = binds;
    }
}

#[async_trait]
impl SubscriberDirectory for MemoryDirectory {
    async fn get_all(&self) -> Result<Vec<GroupBind>, DirectoryError> {
        Ok(self.binds.lock().expect("directory lock poisoned").clone())
    }
}
