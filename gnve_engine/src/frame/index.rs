//! Frame-slot and swapchain-image indices
//!
//! Submission is keyed by frame slot, presentation by swapchain image.
//! The two counts differ (2 slots vs. 3 images is typical), so they get
//! distinct types that cannot be mixed up.

use std::fmt;

/// Index of an in-flight frame slot, in `0..frames_in_flight`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct FrameSlotIndex(usize);

impl FrameSlotIndex {
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    pub const fn get(self) -> usize {
        self.0
    }

    /// Next slot, wrapping modulo `frames_in_flight`
    ///
    /// `frames_in_flight` of 0 is treated as 1.
    pub fn advance(self, frames_in_flight: usize) -> Self {
        Self((self.0 + 1) % frames_in_flight.max(1))
    }
}

impl fmt::Display for FrameSlotIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "slot {}", self.0)
    }
}

/// Index of a presentable image as returned by acquire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SwapImageIndex(u32);

impl SwapImageIndex {
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    pub const fn get(self) -> u32 {
        self.0
    }

    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for SwapImageIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "image {}", self.0)
    }
}
