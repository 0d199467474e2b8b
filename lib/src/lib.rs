//! Buffer swap arbitration between a rendering client and its consumers.
//!
//! A compositor keeps a small pool of GPU-backed frame buffers per surface
//! and has to hand them out to parties with very different needs: the client
//! renders into one buffer at a time, each physical output wants the newest
//! finished frame without ever waiting for the client, and screenshot or
//! thumbnail code wants a peek at whatever is currently on screen. The
//! [`bundle::SwapBundle`] type implements that arbitration as a single
//! in-process state machine:
//!
//! * a synchronous (throttled) mode where the client blocks until a buffer
//!   is recycled, giving classic double/triple buffering, and
//! * a framedropping mode where the client never blocks and unconsumed
//!   frames are silently replaced by newer ones.
//!
//! The pool itself is obtained from an injected [`allocator::BufferAllocator`],
//! so the bundle works with any buffer representation that can report a
//! stable identity. The [`memory`] module provides a heap-backed allocator
//! suitable for tests and software rendering.

pub mod allocator;
pub mod bundle;
pub mod memory;

use std::fmt;

use bitflags::bitflags;

/// A fourcc pixel format code, e.g. `AR24` for 32-bit ARGB. It can be
/// converted back and forth from a 32-bit integer or a 4-bytes string.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct PixelFormat(u32);

impl PixelFormat {
    pub const fn from_fourcc(n: &[u8; 4]) -> Self {
        Self(n[0] as u32 | (n[1] as u32) << 8 | (n[2] as u32) << 16 | (n[3] as u32) << 24)
    }

    pub const fn to_fourcc(self) -> [u8; 4] {
        self.0.to_le_bytes()
    }
}

impl From<u32> for PixelFormat {
    fn from(i: u32) -> Self {
        Self(i)
    }
}

impl From<PixelFormat> for u32 {
    fn from(format: PixelFormat) -> Self {
        format.0
    }
}

impl From<&[u8; 4]> for PixelFormat {
    fn from(n: &[u8; 4]) -> Self {
        Self::from_fourcc(n)
    }
}

/// Produces a displayable form of this PixelFormat.
///
/// # Examples
///
/// ```
/// # use swapframe::PixelFormat;
/// let argb = PixelFormat::from(b"AR24");
/// assert_eq!(argb.to_string(), "AR24");
/// ```
impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for &b in self.to_fourcc().iter() {
            fmt::Write::write_char(f, b as char)?;
        }
        Ok(())
    }
}

/// Produces a debug string for this PixelFormat, including its hexadecimal
/// and string representation.
impl fmt::Debug for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_fmt(format_args!("0x{:08x} ({})", self.0, self))
    }
}

/// Dimensions of a buffer, in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

bitflags! {
    /// How a buffer is going to be used. Hardware buffers can be scanned out
    /// or texture-sampled by the GPU, software buffers are plain CPU-mapped
    /// memory.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
    pub struct BufferUsage: u32 {
        const HARDWARE = 1 << 0;
        const SOFTWARE = 1 << 1;
    }
}

impl Default for BufferUsage {
    fn default() -> Self {
        BufferUsage::HARDWARE
    }
}

/// Requested characteristics of the buffers of a swap bundle. Every buffer
/// of a bundle is allocated with the same properties, fixed at construction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct BufferProperties {
    pub size: Size,
    pub format: PixelFormat,
    pub usage: BufferUsage,
}

impl BufferProperties {
    pub const fn new(size: Size, format: PixelFormat, usage: BufferUsage) -> Self {
        Self {
            size,
            format,
            usage,
        }
    }
}
