//! Windowing collaborator boundary
//!
//! The core never talks to a windowing library directly. It reads the
//! framebuffer size through [`WindowPort`] and learns about resizes through a
//! shared [`ResizeSignal`] the event handler sets.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Framebuffer size in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Extent2D {
    pub width: u32,
    pub height: u32,
}

impl Extent2D {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// True when either dimension is zero (minimized window)
    pub const fn is_zero(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// width / height, 1.0 for a degenerate extent
    pub fn aspect_ratio(&self) -> f32 {
        if self.is_zero() {
            1.0
        } else {
            self.width as f32 / self.height as f32
        }
    }
}

/// What the frame loop needs from the window
pub trait WindowPort {
    /// Current framebuffer size in pixels (0x0 while minimized)
    fn framebuffer_size(&self) -> Extent2D;

    /// Whether the window is iconified
    fn is_minimized(&self) -> bool {
        self.framebuffer_size().is_zero()
    }

    /// Block until the windowing system has something new to report
    fn wait_events(&mut self);
}

/// "Rebuild the swapchain" flag shared with the window event handler
#[derive(Debug, Clone, Default)]
pub struct ResizeSignal {
    pending: Arc<AtomicBool>,
}

impl ResizeSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Called by the windowing collaborator on every resize event
    pub fn notify(&self) {
        self.pending.store(true, Ordering::Release);
    }

    /// Consume the pending flag
    pub fn take(&self) -> bool {
        self.pending.swap(false, Ordering::AcqRel)
    }

    pub fn is_pending(&self) -> bool {
        self.pending.load(Ordering::Acquire)
    }
}

/// Block until the window reports a non-zero framebuffer size
///
/// A minimized window must never produce a zero-extent swapchain, so this
/// keeps waiting on window events instead of spinning.
pub fn wait_for_nonzero_extent<W: WindowPort + ?Sized>(window: &mut W) -> Extent2D {
    loop {
        let extent = window.framebuffer_size();
        if !extent.is_zero() {
            return extent;
        }
        window.wait_events();
    }
}

#[cfg(test)]
#[path = "window_tests.rs"]
mod tests;
