// id.rs — Stable identifiers for source units
//
// File IDs are allocated in sorted path order by the batch parser, so the
// same input set always produces the same numbering regardless of which
// worker parses which file.

use serde::Serialize;

/// Stable identifier for a source unit within one invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct FileId(pub u32);

/// Allocator for file IDs. Produces monotonically increasing IDs in
/// allocation order.
#[derive(Debug, Default)]
pub struct IdAllocator {
    next_file: u32,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alloc_file(&mut self) -> FileId {
        let id = FileId(self.next_file);
        self.next_file += 1;
        id
    }
}
