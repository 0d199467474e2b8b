use std::sync::Arc;

use crate::allocator::{Buffer, BufferId};

/// Exclusive role a pool slot is currently playing.
///
/// Reader-side ownership (compositors and snapshotters) is tracked by the
/// reference counts in [`Slot`] rather than by this tag, since several
/// readers may view the same slot concurrently while it also serves as the
/// re-display source.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(super) enum SlotRole {
    /// Not owned by the client and not awaiting composition.
    Free,
    /// Checked out by the client for rendering.
    Client,
    /// Submitted by the client, waiting in the ready queue.
    Ready,
}

/// One pool-resident buffer together with its ownership bookkeeping.
pub(super) struct Slot<B> {
    pub buffer: Arc<B>,
    pub role: SlotRole,
    /// Outstanding `compositor_acquire` calls for this slot.
    pub compositor_refs: usize,
    /// Outstanding `snapshot_acquire` calls, counted separately so a
    /// mismatched release pairing can be detected.
    pub snapshot_refs: usize,
}

impl<B: Buffer> Slot<B> {
    pub fn new(buffer: B) -> Self {
        Self {
            buffer: Arc::new(buffer),
            role: SlotRole::Free,
            compositor_refs: 0,
            snapshot_refs: 0,
        }
    }

    pub fn id(&self) -> BufferId {
        self.buffer.id()
    }

    /// True when no reader of any kind still holds the slot.
    pub fn is_idle(&self) -> bool {
        self.compositor_refs == 0 && self.snapshot_refs == 0
    }

    /// True when the slot could be handed to the client: no role, no
    /// readers. The bundle additionally keeps the current display slot
    /// away from the client.
    pub fn is_available(&self) -> bool {
        self.role == SlotRole::Free && self.is_idle()
    }
}
