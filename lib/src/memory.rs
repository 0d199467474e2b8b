//! Heap-backed buffer implementation.
//!
//! Real deployments plug a GPU allocator into the bundle; this module
//! provides the software fallback used for CPU rendering, and doubles as
//! the reference implementation for tests and example programs. Each
//! buffer is a plain pixel array behind a mutex, 4 bytes per pixel.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use log::debug;

use crate::allocator::{Buffer, BufferAllocator, BufferId};
use crate::BufferProperties;

const BYTES_PER_PIXEL: usize = 4;

/// A buffer whose backing store is process memory.
pub struct MemoryBuffer {
    id: BufferId,
    properties: BufferProperties,
    data: Mutex<Vec<u8>>,
}

impl MemoryBuffer {
    /// Properties the buffer was allocated with.
    pub fn properties(&self) -> BufferProperties {
        self.properties
    }

    /// Size of the backing store in bytes.
    pub fn len(&self) -> usize {
        self.properties.size.width as usize * self.properties.size.height as usize * BYTES_PER_PIXEL
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Map the pixel contents for reading or writing. The mapping must not
    /// be held across an acquire or release call on the owning bundle.
    pub fn map(&self) -> MutexGuard<Vec<u8>> {
        self.data.lock().unwrap()
    }
}

impl Buffer for MemoryBuffer {
    fn id(&self) -> BufferId {
        self.id
    }
}

/// Allocates [`MemoryBuffer`]s with process-unique ids.
#[derive(Default)]
pub struct MemoryBufferAllocator {
    next_id: AtomicU64,
}

impl MemoryBufferAllocator {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BufferAllocator for MemoryBufferAllocator {
    type Buffer = MemoryBuffer;

    fn allocate(&self, properties: &BufferProperties) -> anyhow::Result<MemoryBuffer> {
        let id = BufferId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let size = properties.size.width as usize
            * properties.size.height as usize
            * BYTES_PER_PIXEL;

        debug!("allocated {} ({}, {} bytes)", id, properties.size, size);

        Ok(MemoryBuffer {
            id,
            properties: *properties,
            data: Mutex::new(vec![0; size]),
        })
    }
}
