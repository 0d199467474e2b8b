//! Swap bundle: arbitration of a fixed buffer pool between one rendering
//! client and any number of compositor and snapshot readers.
//!
//! The bundle owns `buffer_count` buffers allocated once at construction
//! and cycles each of them through the roles `free` -> `client` -> `ready`
//! -> displayed, under a single lock. Three acquire/release protocols are
//! exposed:
//!
//! * **client**: exclusive render target. May block when the pool is
//!   exhausted and framedropping is disabled (back-pressure), or recycle
//!   the unconsumed ready frame when it is enabled.
//! * **compositor**: never blocks. Consumes ready frames in submission
//!   order and re-displays the last composited frame when nothing newer
//!   has arrived. Reference counted, so overlapping outputs can hold the
//!   same or different frames concurrently.
//! * **snapshot**: like the compositor protocol but with its own reference
//!   count, and with no influence on which frame the next compositor
//!   acquire selects.
//!
//! One slot is always reserved as the display source (the last composited
//! frame, initially the first buffer) so compositors have something to
//! show even while the client owns everything else. Single-buffer bundles
//! are degenerate: the sole buffer is shared by all roles and nobody ever
//! blocks.

mod slot;

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex};

use log::debug;
use thiserror::Error;

use crate::allocator::{Buffer, BufferAllocator, BufferId};
use crate::BufferProperties;

use slot::{Slot, SlotRole};

#[derive(Debug, Error)]
pub enum CreateBundleError {
    #[error("a swap bundle requires at least one buffer")]
    InvalidBufferCount,
    #[error("buffer allocation failed")]
    AllocationFailed(#[source] anyhow::Error),
}

/// Protocol violation raised by the release half of an acquire/release
/// pair. These are programmer errors on the caller's side; the bundle's
/// state is left untouched by the failed call.
#[derive(Debug, Error)]
pub enum ReleaseError {
    #[error("{0} does not belong to this bundle")]
    UnknownBuffer(BufferId),
    #[error("{0} is not currently held in the claimed role")]
    NotHeld(BufferId),
    #[error("{0} released before an older client-held buffer")]
    OutOfOrder(BufferId),
}

struct State<B> {
    slots: Vec<Slot<B>>,
    /// Indices of `Ready` slots, oldest submission first.
    ready: VecDeque<usize>,
    /// Indices of client-held slots in acquisition order; releases must
    /// match the front.
    client_held: VecDeque<usize>,
    /// Slot of the most recently composited frame. Re-displayed by
    /// `compositor_acquire` when the ready queue is empty, and withheld
    /// from the client (except in single-buffer bundles).
    current: usize,
    framedropping: bool,
    /// Number of threads parked in `client_acquire`.
    waiting: usize,
    /// Wakeup budget granted by `force_requests_to_complete`: that many
    /// parked acquisitions may take a buffer that is not truly free.
    forced: usize,
}

impl<B: Buffer> State<B> {
    fn index_of(&self, buffer: &B) -> Option<usize> {
        let id = buffer.id();
        self.slots.iter().position(|slot| slot.id() == id)
    }

    /// First slot the client may take without displacing anyone, if any.
    fn available_slot(&self) -> Option<usize> {
        (0..self.slots.len())
            .find(|&index| index != self.current && self.slots[index].is_available())
    }

    fn grab_for_client(&mut self, index: usize) -> Arc<B> {
        self.slots[index].role = SlotRole::Client;
        self.client_held.push_back(index);
        Arc::clone(&self.slots[index].buffer)
    }
}

/// A fixed pool of identically-sized buffers swapped between one client
/// and multiple independent readers.
///
/// All methods take `&self`; the bundle is meant to be shared across
/// threads behind an [`Arc`].
///
/// # Examples
///
/// ```
/// use swapframe::bundle::SwapBundle;
/// use swapframe::memory::MemoryBufferAllocator;
/// use swapframe::{BufferProperties, BufferUsage, PixelFormat, Size};
///
/// let properties = BufferProperties::new(
///     Size::new(640, 480),
///     PixelFormat::from(b"XR24"),
///     BufferUsage::SOFTWARE,
/// );
/// let bundle = SwapBundle::new(3, &MemoryBufferAllocator::new(), properties)?;
///
/// // Client renders a frame...
/// let frame = bundle.client_acquire();
/// bundle.client_release(&frame)?;
///
/// // ...and the compositor picks it up.
/// let shown = bundle.compositor_acquire();
/// assert!(std::sync::Arc::ptr_eq(&frame, &shown));
/// bundle.compositor_release(&shown)?;
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct SwapBundle<B> {
    properties: BufferProperties,
    state: Mutex<State<B>>,
    /// Signaled whenever a slot may have become available to a parked
    /// `client_acquire`, and by `force_requests_to_complete`.
    recycled: Condvar,
}

impl<B: Buffer> SwapBundle<B> {
    /// Allocates `buffer_count` buffers from `allocator` and wraps them in
    /// a bundle. Fails before allocating anything if `buffer_count` is
    /// zero; an allocator failure is fatal to construction.
    pub fn new<A>(
        buffer_count: usize,
        allocator: &A,
        properties: BufferProperties,
    ) -> Result<Self, CreateBundleError>
    where
        A: BufferAllocator<Buffer = B>,
    {
        if buffer_count == 0 {
            return Err(CreateBundleError::InvalidBufferCount);
        }

        let mut slots = Vec::with_capacity(buffer_count);
        for _ in 0..buffer_count {
            let buffer = allocator
                .allocate(&properties)
                .map_err(CreateBundleError::AllocationFailed)?;
            slots.push(Slot::new(buffer));
        }

        debug!("created bundle of {} buffers ({})", buffer_count, properties.size);

        Ok(Self {
            properties,
            state: Mutex::new(State {
                slots,
                ready: VecDeque::new(),
                client_held: VecDeque::new(),
                current: 0,
                framedropping: false,
                waiting: 0,
                forced: 0,
            }),
            recycled: Condvar::new(),
        })
    }

    /// Checks out a buffer for the client to render into.
    ///
    /// Returns a free buffer when one exists. Otherwise, with framedropping
    /// disabled, blocks until a reader recycles one (this is what throttles
    /// the client to the compositor's pace); with framedropping enabled,
    /// reclaims the oldest unconsumed ready frame instead of blocking.
    ///
    /// Buffers checked out by this method must be returned through
    /// [`client_release`](Self::client_release) in acquisition order.
    pub fn client_acquire(&self) -> Arc<B> {
        let mut state = self.state.lock().unwrap();
        loop {
            // Degenerate single-buffer pool: every role shares the one
            // buffer and the client never waits.
            if state.slots.len() == 1 {
                return state.grab_for_client(0);
            }

            if let Some(index) = state.available_slot() {
                debug!("client takes free {}", state.slots[index].id());
                return state.grab_for_client(index);
            }

            if state.framedropping {
                if let Some(index) = state.ready.pop_front() {
                    debug!("client drops unconsumed {}", state.slots[index].id());
                    return state.grab_for_client(index);
                }
            }

            if state.forced > 0 {
                state.forced -= 1;
                let index = state.ready.pop_front().unwrap_or(state.current);
                debug!("forced completion hands out {}", state.slots[index].id());
                return state.grab_for_client(index);
            }

            state.waiting += 1;
            state = self.recycled.wait(state).unwrap();
            state.waiting -= 1;
        }
    }

    /// Submits a client-held buffer as the next frame to composite.
    ///
    /// The buffer joins the tail of the ready queue; with framedropping
    /// enabled any frame still waiting there is dropped first, so only the
    /// newest submission is ever pending.
    pub fn client_release(&self, buffer: &B) -> Result<(), ReleaseError> {
        let mut state = self.state.lock().unwrap();
        let index = state
            .index_of(buffer)
            .ok_or_else(|| ReleaseError::UnknownBuffer(buffer.id()))?;

        if state.client_held.front().copied() == Some(index) {
            state.client_held.pop_front();
        } else if state.client_held.contains(&index) {
            return Err(ReleaseError::OutOfOrder(buffer.id()));
        } else {
            return Err(ReleaseError::NotHeld(buffer.id()));
        }

        if state.framedropping {
            while let Some(stale) = state.ready.pop_front() {
                debug!("dropping stale frame {}", state.slots[stale].id());
                state.slots[stale].role = SlotRole::Free;
            }
        }

        state.slots[index].role = SlotRole::Ready;
        state.ready.push_back(index);
        debug!("client submits {}", state.slots[index].id());

        drop(state);
        self.recycled.notify_all();
        Ok(())
    }

    /// Checks out the next frame to display. Never blocks.
    ///
    /// Ready frames are delivered oldest first, preserving submission
    /// order; when none is pending the last composited frame is handed out
    /// again so an idle client keeps its content on screen. Each call must
    /// be matched by a [`compositor_release`](Self::compositor_release).
    pub fn compositor_acquire(&self) -> Arc<B> {
        let mut state = self.state.lock().unwrap();
        if let Some(index) = state.ready.pop_front() {
            state.slots[index].role = SlotRole::Free;
            let previous = state.current;
            state.current = index;
            state.slots[index].compositor_refs += 1;
            debug!("compositing {}", state.slots[index].id());
            let buffer = Arc::clone(&state.slots[index].buffer);

            // The displaced display slot may now be free for the client.
            if previous != index && state.slots[previous].is_available() {
                drop(state);
                self.recycled.notify_all();
            }
            buffer
        } else {
            let index = state.current;
            state.slots[index].compositor_refs += 1;
            Arc::clone(&state.slots[index].buffer)
        }
    }

    /// Returns a compositor-held buffer to the pool, recycling the slot
    /// once its last reader is gone and it is no longer the display
    /// source.
    pub fn compositor_release(&self, buffer: &B) -> Result<(), ReleaseError> {
        let mut state = self.state.lock().unwrap();
        let index = state
            .index_of(buffer)
            .ok_or_else(|| ReleaseError::UnknownBuffer(buffer.id()))?;

        if state.slots[index].compositor_refs == 0 {
            return Err(ReleaseError::NotHeld(buffer.id()));
        }
        state.slots[index].compositor_refs -= 1;

        if index != state.current && state.slots[index].is_available() {
            drop(state);
            self.recycled.notify_all();
        }
        Ok(())
    }

    /// Checks out the most recently composited frame for a non-disruptive
    /// copy (screenshot, thumbnail). Never blocks and never changes which
    /// frame the next [`compositor_acquire`](Self::compositor_acquire)
    /// selects.
    pub fn snapshot_acquire(&self) -> Arc<B> {
        let mut state = self.state.lock().unwrap();
        let index = state.current;
        state.slots[index].snapshot_refs += 1;
        Arc::clone(&state.slots[index].buffer)
    }

    /// Counterpart of [`snapshot_acquire`](Self::snapshot_acquire).
    /// Buffers acquired through the compositor or client protocols are
    /// rejected.
    pub fn snapshot_release(&self, buffer: &B) -> Result<(), ReleaseError> {
        let mut state = self.state.lock().unwrap();
        let index = state
            .index_of(buffer)
            .ok_or_else(|| ReleaseError::UnknownBuffer(buffer.id()))?;

        if state.slots[index].snapshot_refs == 0 {
            return Err(ReleaseError::NotHeld(buffer.id()));
        }
        state.slots[index].snapshot_refs -= 1;

        if index != state.current && state.slots[index].is_available() {
            drop(state);
            self.recycled.notify_all();
        }
        Ok(())
    }

    /// Switches between throttled (`false`, the default) and framedropping
    /// (`true`) delivery. The new policy applies from the next client
    /// acquire or submit; frames already queued are not evicted by the
    /// toggle itself.
    pub fn allow_framedropping(&self, allow: bool) {
        let mut state = self.state.lock().unwrap();
        if state.framedropping != allow {
            debug!("framedropping {}", if allow { "enabled" } else { "disabled" });
        }
        state.framedropping = allow;
        drop(state);
        // A parked client re-evaluates the policy on wakeup, so enabling
        // framedropping cannot leave it stuck behind absent readers.
        self.recycled.notify_all();
    }

    pub fn framedropping_allowed(&self) -> bool {
        self.state.lock().unwrap().framedropping
    }

    /// Unblocks every thread currently parked in
    /// [`client_acquire`](Self::client_acquire), handing each a buffer even
    /// if none is truly free (the oldest pending frame is dropped, or the
    /// display slot itself is surrendered as a last resort).
    ///
    /// This is a one-shot nudge for shutdown or VT switches, not a policy
    /// change: later acquisitions block again as usual and
    /// [`framedropping_allowed`](Self::framedropping_allowed) is
    /// unaffected.
    pub fn force_requests_to_complete(&self) {
        let mut state = self.state.lock().unwrap();
        if state.waiting > 0 {
            debug!("forcing {} pending client request(s) to complete", state.waiting);
        }
        state.forced = state.waiting;
        drop(state);
        self.recycled.notify_all();
    }

    /// The properties every buffer of this bundle was allocated with.
    pub fn properties(&self) -> BufferProperties {
        self.properties
    }

    /// Total number of buffers in the pool.
    pub fn buffer_count(&self) -> usize {
        self.state.lock().unwrap().slots.len()
    }

    /// Number of buffers the client could currently take without waiting
    /// or dropping. Diagnostic snapshot only.
    pub fn free_count(&self) -> usize {
        let state = self.state.lock().unwrap();
        state
            .slots
            .iter()
            .enumerate()
            .filter(|&(index, slot)| index != state.current && slot.is_available())
            .count()
    }

    /// Number of submitted frames not yet picked up by a compositor.
    /// Diagnostic snapshot only.
    pub fn ready_count(&self) -> usize {
        self.state.lock().unwrap().ready.len()
    }
}
