//! Frame lifecycle: slot/image indices, the window boundary, per-frame
//! uniforms and the frame loop state machine.

pub mod frame_loop;
pub mod index;
pub mod stats;
pub mod uniforms;
pub mod window;

#[cfg(test)]
pub(crate) mod mock_backend;

pub use frame_loop::{AcquireOutcome, FrameBackend, FrameLoop, FrameState, PresentOutcome, TickOutcome};
pub use index::{FrameSlotIndex, SwapImageIndex};
pub use stats::FrameStats;
pub use uniforms::{Camera, FrameUniforms};
pub use window::{wait_for_nonzero_extent, Extent2D, ResizeSignal, WindowPort};
