//! Frame loop / synchronization core
//!
//! One tick runs `Idle -> Acquiring -> Recording -> Submitted -> Presenting -> Idle`
//! against a [`FrameBackend`]. The backend owns every GPU object; the loop owns
//! the ordering rules:
//!
//! - a slot's fence is waited on before anything of that slot is touched
//! - the fence is only reset once an image was actually acquired, so an
//!   out-of-date acquire leaves the slot reusable on the next tick
//! - a rebuild flagged during acquire skips present for the tick
//! - staleness on present, or a pending resize, triggers a full rebuild
//!
//! Staleness never surfaces as an error. Any `Err` from the backend is a
//! device error and is returned as-is for the caller to treat as fatal.

use std::time::Instant;

use crate::error::Result;
use crate::log::Log;
use crate::{engine_debug, engine_error, engine_info, engine_trace};

use super::index::{FrameSlotIndex, SwapImageIndex};
use super::stats::FrameStats;
use super::uniforms::FrameUniforms;
use super::window::{wait_for_nonzero_extent, Extent2D, ResizeSignal, WindowPort};

const SOURCE: &str = "gnve::frame";

/// Result of acquiring the next presentable image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireOutcome {
    /// Image acquired, swapchain matches the surface
    Success(SwapImageIndex),
    /// Image acquired, but the swapchain should be rebuilt
    Suboptimal(SwapImageIndex),
    /// No image acquired; the swapchain must be rebuilt
    OutOfDate,
}

/// Result of queueing an image for presentation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentOutcome {
    Presented,
    /// Suboptimal or out-of-date; the swapchain must be rebuilt
    Stale,
}

/// What happened during one tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// The frame was presented and the swapchain is current
    Presented,
    /// The frame was presented, then the swapchain was rebuilt
    PresentedAndRebuilt,
    /// The frame was submitted but not presented; the swapchain was rebuilt
    SkippedPresent,
    /// Acquire reported out-of-date; nothing was submitted
    OutOfDate,
}

/// Per-tick state, observable for diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameState {
    Idle,
    Acquiring,
    Recording,
    Submitted,
    Presenting,
}

/// GPU half of the frame loop
///
/// Every method is keyed by the index type it needs: slot-owned objects
/// (command buffer, acquire semaphore, fence, uniform buffer) by
/// [`FrameSlotIndex`], image-owned objects (render-finished semaphore,
/// image view) by [`SwapImageIndex`].
pub trait FrameBackend {
    /// Block until the slot's fence has signaled. Does not reset it.
    fn wait_frame_fence(&mut self, slot: FrameSlotIndex) -> Result<()>;

    /// Reset the slot's fence; called only once work will be submitted
    fn reset_frame_fence(&mut self, slot: FrameSlotIndex) -> Result<()>;

    /// Acquire the next image, signaling the slot's acquire semaphore
    fn acquire(&mut self, slot: FrameSlotIndex) -> Result<AcquireOutcome>;

    /// Write the slot's persistently mapped uniform buffer
    fn update_uniforms(&mut self, slot: FrameSlotIndex, uniforms: &FrameUniforms) -> Result<()>;

    /// Reset and record the slot's command buffer for `image`
    fn record(&mut self, slot: FrameSlotIndex, image: SwapImageIndex, stats: &FrameStats) -> Result<()>;

    /// Submit: wait on the slot's acquire semaphore, signal the image's
    /// render-finished semaphore and the slot's fence
    fn submit(&mut self, slot: FrameSlotIndex, image: SwapImageIndex) -> Result<()>;

    /// Present `image`, waiting on its render-finished semaphore
    fn present(&mut self, image: SwapImageIndex) -> Result<PresentOutcome>;

    /// Tear down and rebuild the swapchain at `extent`
    fn rebuild_swapchain(&mut self, extent: Extent2D) -> Result<()>;

    /// Extent of the live swapchain
    fn swapchain_extent(&self) -> Extent2D;
}

/// Drives a [`FrameBackend`] one frame at a time
pub struct FrameLoop {
    frames_in_flight: usize,
    current_slot: FrameSlotIndex,
    state: FrameState,
    resize: ResizeSignal,
    stats: FrameStats,
    last_present: Option<Instant>,
    log: Log,
}

impl FrameLoop {
    /// `frames_in_flight` of 0 is clamped to 1
    pub fn new(frames_in_flight: usize, log: Log) -> Self {
        Self {
            frames_in_flight: frames_in_flight.max(1),
            current_slot: FrameSlotIndex::new(0),
            state: FrameState::Idle,
            resize: ResizeSignal::new(),
            stats: FrameStats::default(),
            last_present: None,
            log,
        }
    }

    pub fn frames_in_flight(&self) -> usize {
        self.frames_in_flight
    }

    pub fn current_slot(&self) -> FrameSlotIndex {
        self.current_slot
    }

    pub fn state(&self) -> FrameState {
        self.state
    }

    pub fn stats(&self) -> &FrameStats {
        &self.stats
    }

    /// Handle for the window event handler to report resizes
    pub fn resize_signal(&self) -> ResizeSignal {
        self.resize.clone()
    }

    /// Run one acquire/record/submit/present cycle
    pub fn tick<B, W>(&mut self, backend: &mut B, window: &mut W, uniforms: &FrameUniforms) -> Result<TickOutcome>
    where
        B: FrameBackend + ?Sized,
        W: WindowPort + ?Sized,
    {
        let slot = self.current_slot;
        engine_trace!(self.log, SOURCE, "Tick on {}", slot);

        // 1. The slot's resources are only ours again once its fence signals
        self.state = FrameState::Acquiring;
        backend.wait_frame_fence(slot).inspect_err(|e| self.fatal("waiting for frame fence", e))?;

        // 2. Acquire
        let (image, rebuild_flagged) = match backend.acquire(slot).inspect_err(|e| self.fatal("acquiring image", e))? {
            AcquireOutcome::Success(image) => (image, false),
            AcquireOutcome::Suboptimal(image) => {
                engine_debug!(self.log, SOURCE, "Acquire suboptimal on {}, rebuild deferred", image);
                (image, true)
            }
            AcquireOutcome::OutOfDate => {
                engine_debug!(self.log, SOURCE, "Acquire out of date, rebuilding swapchain");
                self.state = FrameState::Idle;
                self.resize.take();
                self.rebuild(backend, window)?;
                return Ok(TickOutcome::OutOfDate);
            }
        };
        backend.reset_frame_fence(slot).inspect_err(|e| self.fatal("resetting frame fence", e))?;

        // 3-4. Uniforms through the persistent mapping, then record
        self.state = FrameState::Recording;
        backend.update_uniforms(slot, uniforms).inspect_err(|e| self.fatal("updating uniforms", e))?;
        backend.record(slot, image, &self.stats).inspect_err(|e| self.fatal("recording commands", e))?;

        // 5. Submit
        backend.submit(slot, image).inspect_err(|e| self.fatal("submitting frame", e))?;
        self.state = FrameState::Submitted;
        self.current_slot = slot.advance(self.frames_in_flight);

        // 6. Acquire already said the chain is stale: skip present, rebuild
        if rebuild_flagged {
            self.state = FrameState::Idle;
            self.resize.take();
            self.rebuild(backend, window)?;
            return Ok(TickOutcome::SkippedPresent);
        }

        // 7. Present
        self.state = FrameState::Presenting;
        let presented = backend.present(image).inspect_err(|e| self.fatal("presenting", e))?;
        self.record_present();

        let resize_pending = self.resize.take();
        self.state = FrameState::Idle;
        if presented == PresentOutcome::Stale || resize_pending {
            engine_debug!(
                self.log,
                SOURCE,
                "Rebuilding swapchain after present (stale: {}, resize: {})",
                presented == PresentOutcome::Stale,
                resize_pending
            );
            self.rebuild(backend, window)?;
            return Ok(TickOutcome::PresentedAndRebuilt);
        }

        Ok(TickOutcome::Presented)
    }

    /// Wait for a non-zero window size, then rebuild the swapchain
    pub fn rebuild<B, W>(&mut self, backend: &mut B, window: &mut W) -> Result<()>
    where
        B: FrameBackend + ?Sized,
        W: WindowPort + ?Sized,
    {
        let extent = wait_for_nonzero_extent(window);
        backend.rebuild_swapchain(extent).inspect_err(|e| self.fatal("rebuilding swapchain", e))?;
        self.stats.swapchain_rebuilds += 1;
        engine_info!(
            self.log,
            SOURCE,
            "Swapchain rebuilt at {}x{}",
            backend.swapchain_extent().width,
            backend.swapchain_extent().height
        );
        Ok(())
    }

    fn record_present(&mut self) {
        let now = Instant::now();
        if let Some(last) = self.last_present {
            self.stats.record_frame(now.duration_since(last));
        } else {
            self.stats.frame_count += 1;
        }
        self.last_present = Some(now);
    }

    fn fatal(&self, context: &str, error: &crate::Error) {
        engine_error!(self.log, SOURCE, "Frame loop failed while {}: {}", context, error);
    }
}

#[cfg(test)]
#[path = "frame_loop_tests.rs"]
mod tests;
