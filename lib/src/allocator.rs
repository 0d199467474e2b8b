//! Traits for the buffer supply side of a swap bundle.
//!
//! The bundle does not know (or care) what a buffer actually is: GPU
//! texture, dumb DRM buffer, shared-memory segment... It only needs to be
//! able to obtain a fixed number of them at construction time and to tell
//! them apart afterwards. These two concerns are expressed by the
//! [`BufferAllocator`] and [`Buffer`] traits; everything else about the
//! buffer representation stays with the caller.

use std::fmt;

use crate::BufferProperties;

/// Identity of a buffer, unique within its allocator and stable for the
/// buffer's whole lifetime. Used to match `release` calls against
/// outstanding acquisitions and for logging; the swap algorithm itself
/// never interprets the value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BufferId(pub u64);

impl fmt::Display for BufferId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "buffer#{}", self.0)
    }
}

/// A handle to one frame buffer. Implementations are free to carry whatever
/// payload they want; the bundle only requires a stable identity.
pub trait Buffer: Send + Sync {
    fn id(&self) -> BufferId;
}

/// Source of buffers for a swap bundle.
///
/// [`allocate`](Self::allocate) is called exactly `buffer_count` times while
/// the bundle is constructed, all with the same properties. The first
/// failure aborts construction; the bundle performs no partial-allocation
/// recovery.
pub trait BufferAllocator {
    type Buffer: Buffer;

    fn allocate(&self, properties: &BufferProperties) -> anyhow::Result<Self::Buffer>;
}
