//! GPU-free stand-ins for the frame loop collaborators
//!
//! `MockFrameBackend` keeps a call journal and a simulated fence per slot so
//! tests can check ordering, and refuses to record into a slot whose fence was
//! not waited on since its last submit.

use std::collections::VecDeque;

use crate::error::{Error, Result};
use crate::frame::{
    AcquireOutcome, Extent2D, FrameBackend, FrameSlotIndex, FrameStats, FrameUniforms, PresentOutcome,
    SwapImageIndex, WindowPort,
};

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    WaitFence(usize),
    ResetFence(usize),
    Acquire(usize),
    UpdateUniforms(usize),
    Record { slot: usize, image: u32 },
    Submit { slot: usize, image: u32 },
    Present(u32),
    Rebuild(Extent2D),
}

pub struct MockFrameBackend {
    pub calls: Vec<Call>,
    pub acquire_script: VecDeque<AcquireOutcome>,
    pub present_script: VecDeque<PresentOutcome>,
    pub fail_submit: Option<i32>,
    image_count: u32,
    next_image: u32,
    extent: Extent2D,
    /// Slot has GPU work that nobody waited for yet
    in_flight: Vec<bool>,
    /// Fence state per slot (true = signaled)
    fence_signaled: Vec<bool>,
    pub last_uniforms: Option<FrameUniforms>,
}

impl MockFrameBackend {
    pub fn new(frames_in_flight: usize, image_count: u32) -> Self {
        Self {
            calls: Vec::new(),
            acquire_script: VecDeque::new(),
            present_script: VecDeque::new(),
            fail_submit: None,
            image_count,
            next_image: 0,
            extent: Extent2D::new(800, 600),
            in_flight: vec![false; frames_in_flight],
            fence_signaled: vec![true; frames_in_flight],
            last_uniforms: None,
        }
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls.iter().filter(|c| pred(c)).count()
    }

    fn next_image(&mut self) -> SwapImageIndex {
        let image = SwapImageIndex::new(self.next_image);
        self.next_image = (self.next_image + 1) % self.image_count;
        image
    }
}

impl FrameBackend for MockFrameBackend {
    fn wait_frame_fence(&mut self, slot: FrameSlotIndex) -> Result<()> {
        self.calls.push(Call::WaitFence(slot.get()));
        // The simulated GPU finishes whatever the slot had in flight
        self.in_flight[slot.get()] = false;
        self.fence_signaled[slot.get()] = true;
        Ok(())
    }

    fn reset_frame_fence(&mut self, slot: FrameSlotIndex) -> Result<()> {
        self.calls.push(Call::ResetFence(slot.get()));
        self.fence_signaled[slot.get()] = false;
        Ok(())
    }

    fn acquire(&mut self, slot: FrameSlotIndex) -> Result<AcquireOutcome> {
        self.calls.push(Call::Acquire(slot.get()));
        let outcome = match self.acquire_script.pop_front() {
            Some(AcquireOutcome::Success(_)) | None => AcquireOutcome::Success(self.next_image()),
            Some(AcquireOutcome::Suboptimal(_)) => AcquireOutcome::Suboptimal(self.next_image()),
            Some(AcquireOutcome::OutOfDate) => AcquireOutcome::OutOfDate,
        };
        Ok(outcome)
    }

    fn update_uniforms(&mut self, slot: FrameSlotIndex, uniforms: &FrameUniforms) -> Result<()> {
        if self.in_flight[slot.get()] {
            return Err(Error::InvalidResource(format!("uniforms of {} written while in flight", slot)));
        }
        self.calls.push(Call::UpdateUniforms(slot.get()));
        self.last_uniforms = Some(*uniforms);
        Ok(())
    }

    fn record(&mut self, slot: FrameSlotIndex, image: SwapImageIndex, _stats: &FrameStats) -> Result<()> {
        if self.in_flight[slot.get()] {
            return Err(Error::InvalidResource(format!("command buffer of {} reset while in flight", slot)));
        }
        self.calls.push(Call::Record { slot: slot.get(), image: image.get() });
        Ok(())
    }

    fn submit(&mut self, slot: FrameSlotIndex, image: SwapImageIndex) -> Result<()> {
        if let Some(code) = self.fail_submit {
            return Err(Error::Device { context: "submitting frame".to_string(), code });
        }
        if self.fence_signaled[slot.get()] {
            return Err(Error::InvalidResource(format!("submit on {} with a signaled fence", slot)));
        }
        self.calls.push(Call::Submit { slot: slot.get(), image: image.get() });
        self.in_flight[slot.get()] = true;
        Ok(())
    }

    fn present(&mut self, image: SwapImageIndex) -> Result<PresentOutcome> {
        self.calls.push(Call::Present(image.get()));
        Ok(self.present_script.pop_front().unwrap_or(PresentOutcome::Presented))
    }

    fn rebuild_swapchain(&mut self, extent: Extent2D) -> Result<()> {
        self.calls.push(Call::Rebuild(extent));
        self.extent = extent;
        self.next_image = 0;
        Ok(())
    }

    fn swapchain_extent(&self) -> Extent2D {
        self.extent
    }
}

/// Window whose framebuffer size follows a script, then stays at the last value
pub struct MockWindow {
    sizes: VecDeque<Extent2D>,
    current: Extent2D,
    pub waits: usize,
}

impl MockWindow {
    pub fn new(size: Extent2D) -> Self {
        Self { sizes: VecDeque::new(), current: size, waits: 0 }
    }

    /// Sizes reported after each successive `wait_events`
    pub fn scripted(initial: Extent2D, after_waits: &[Extent2D]) -> Self {
        Self { sizes: after_waits.iter().copied().collect(), current: initial, waits: 0 }
    }
}

impl WindowPort for MockWindow {
    fn framebuffer_size(&self) -> Extent2D {
        self.current
    }

    fn wait_events(&mut self) {
        self.waits += 1;
        if let Some(next) = self.sizes.pop_front() {
            self.current = next;
        }
    }
}
