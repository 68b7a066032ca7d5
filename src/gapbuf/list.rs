//! The editor's open-buffer list
//!
//! An arena of gap buffers with an active index. Opening inserts after
//! the active buffer; removal selects the previous buffer, or the next
//! when the head is removed.

use super::GapBuffer;
use crate::error::Result;
use std::path::Path;

pub struct BufferList {
    bufs: Vec<GapBuffer>,
    active: usize,
}

impl BufferList {
    pub fn new(first: GapBuffer) -> Self {
        BufferList {
            bufs: vec![first],
            active: 0,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.bufs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bufs.is_empty()
    }

    #[must_use]
    pub fn active(&self) -> Option<&GapBuffer> {
        self.bufs.get(self.active)
    }

    pub fn active_mut(&mut self) -> Option<&mut GapBuffer> {
        self.bufs.get_mut(self.active)
    }

    /// Open a file in a new buffer inserted after the active one. The
    /// new buffer becomes active. A missing file opens empty.
    pub fn open(&mut self, path: &Path) -> Result<()> {
        let b = GapBuffer::from_file(path)?;
        let at = if self.bufs.is_empty() {
            0
        } else {
            self.active + 1
        };
        self.bufs.insert(at, b);
        self.active = at;
        Ok(())
    }

    /// Remove the active buffer, moving to the previous one, or the
    /// next when the head was removed. Returns false once no buffers
    /// remain.
    pub fn remove(&mut self) -> bool {
        if self.bufs.is_empty() {
            return false;
        }
        self.bufs.remove(self.active);
        if self.active > 0 {
            self.active -= 1;
        }
        !self.bufs.is_empty()
    }

    /// Move to the previous buffer in the list.
    pub fn prev(&mut self) -> bool {
        if self.active > 0 {
            self.active -= 1;
            true
        } else {
            false
        }
    }

    /// Move to the next buffer in the list.
    pub fn next(&mut self) -> bool {
        if self.active + 1 < self.bufs.len() {
            self.active += 1;
            true
        } else {
            false
        }
    }
}
