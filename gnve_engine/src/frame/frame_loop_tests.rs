//! Unit tests for frame_loop.rs
//!
//! Drives the state machine against MockFrameBackend and checks call ordering.

use crate::error::Error;
use crate::frame::mock_backend::{Call, MockFrameBackend, MockWindow};
use crate::frame::{
    AcquireOutcome, Extent2D, FrameBackend, FrameLoop, FrameSlotIndex, FrameState, FrameUniforms, PresentOutcome,
    SwapImageIndex, TickOutcome,
};
use crate::log::Log;

fn setup(frames_in_flight: usize) -> (FrameLoop, MockFrameBackend, MockWindow) {
    (
        FrameLoop::new(frames_in_flight, Log::disabled()),
        MockFrameBackend::new(frames_in_flight, 3),
        MockWindow::new(Extent2D::new(800, 600)),
    )
}

// ============================================================================
// NORMAL FRAMES
// ============================================================================

#[test]
fn test_single_tick_call_order() {
    let (mut frames, mut backend, mut window) = setup(2);
    let outcome = frames.tick(&mut backend, &mut window, &FrameUniforms::default()).unwrap();

    assert_eq!(outcome, TickOutcome::Presented);
    assert_eq!(
        backend.calls,
        vec![
            Call::WaitFence(0),
            Call::Acquire(0),
            Call::ResetFence(0),
            Call::UpdateUniforms(0),
            Call::Record { slot: 0, image: 0 },
            Call::Submit { slot: 0, image: 0 },
            Call::Present(0),
        ]
    );
    assert_eq!(frames.state(), FrameState::Idle);
    assert_eq!(frames.stats().frame_count, 1);
}

#[test]
fn test_slot_advances_modulo_frames_in_flight() {
    for n in 1..=3 {
        let (mut frames, mut backend, mut window) = setup(n);
        for i in 0..7 {
            assert_eq!(frames.current_slot(), FrameSlotIndex::new(i % n));
            frames.tick(&mut backend, &mut window, &FrameUniforms::default()).unwrap();
        }
    }
}

#[test]
fn test_fence_waited_before_every_slot_reuse() {
    // The mock errors if a slot is recorded while its previous submit is unwaited
    for n in 1..=3 {
        let (mut frames, mut backend, mut window) = setup(n);
        for _ in 0..10 {
            frames.tick(&mut backend, &mut window, &FrameUniforms::default()).unwrap();
        }

        let mut waited = vec![true; n];
        for call in &backend.calls {
            match call {
                Call::WaitFence(s) => waited[*s] = true,
                Call::Record { slot, .. } => assert!(waited[*slot], "slot {} reused before its fence", slot),
                Call::Submit { slot, .. } => waited[*slot] = false,
                _ => {}
            }
        }
    }
}

#[test]
fn test_slot_and_image_indices_are_independent() {
    // 2 slots against 3 images: image index cycles 0,1,2 while slots cycle 0,1
    let (mut frames, mut backend, mut window) = setup(2);
    for _ in 0..3 {
        frames.tick(&mut backend, &mut window, &FrameUniforms::default()).unwrap();
    }
    let submits: Vec<(usize, u32)> = backend
        .calls
        .iter()
        .filter_map(|c| match c {
            Call::Submit { slot, image } => Some((*slot, *image)),
            _ => None,
        })
        .collect();
    assert_eq!(submits, vec![(0, 0), (1, 1), (0, 2)]);
}

#[test]
fn test_uniforms_reach_backend() {
    let (mut frames, mut backend, mut window) = setup(2);
    let mut uniforms = FrameUniforms::default();
    uniforms.model = glam::Mat4::from_scale(glam::Vec3::splat(2.0));
    frames.tick(&mut backend, &mut window, &uniforms).unwrap();
    assert_eq!(backend.last_uniforms, Some(uniforms));
}

// ============================================================================
// STALENESS AND RESIZE
// ============================================================================

#[test]
fn test_out_of_date_acquire_skips_submit_and_rebuilds() {
    let (mut frames, mut backend, mut window) = setup(2);
    backend.acquire_script.push_back(AcquireOutcome::OutOfDate);

    let outcome = frames.tick(&mut backend, &mut window, &FrameUniforms::default()).unwrap();

    assert_eq!(outcome, TickOutcome::OutOfDate);
    assert_eq!(backend.count(|c| matches!(c, Call::Submit { .. })), 0);
    assert_eq!(backend.count(|c| matches!(c, Call::ResetFence(_))), 0);
    assert_eq!(backend.calls.last(), Some(&Call::Rebuild(Extent2D::new(800, 600))));
    // Nothing was submitted, so the same slot is used again
    assert_eq!(frames.current_slot(), FrameSlotIndex::new(0));

    // The fence was never reset, so the retry does not deadlock
    let outcome = frames.tick(&mut backend, &mut window, &FrameUniforms::default()).unwrap();
    assert_eq!(outcome, TickOutcome::Presented);
}

#[test]
fn test_suboptimal_acquire_submits_but_skips_present() {
    let (mut frames, mut backend, mut window) = setup(2);
    backend.acquire_script.push_back(AcquireOutcome::Suboptimal(SwapImageIndex::new(0)));

    let outcome = frames.tick(&mut backend, &mut window, &FrameUniforms::default()).unwrap();

    assert_eq!(outcome, TickOutcome::SkippedPresent);
    assert_eq!(backend.count(|c| matches!(c, Call::Submit { .. })), 1);
    assert_eq!(backend.count(|c| matches!(c, Call::Present(_))), 0);
    assert_eq!(backend.count(|c| matches!(c, Call::Rebuild(_))), 1);
    assert_eq!(frames.current_slot(), FrameSlotIndex::new(1));
}

#[test]
fn test_stale_present_rebuilds() {
    let (mut frames, mut backend, mut window) = setup(2);
    backend.present_script.push_back(PresentOutcome::Stale);

    let outcome = frames.tick(&mut backend, &mut window, &FrameUniforms::default()).unwrap();

    assert_eq!(outcome, TickOutcome::PresentedAndRebuilt);
    assert_eq!(backend.calls.last(), Some(&Call::Rebuild(Extent2D::new(800, 600))));
    assert_eq!(frames.stats().swapchain_rebuilds, 1);
}

#[test]
fn test_resize_signal_triggers_rebuild_once() {
    let (mut frames, mut backend, mut window) = setup(2);
    frames.resize_signal().notify();

    assert_eq!(
        frames.tick(&mut backend, &mut window, &FrameUniforms::default()).unwrap(),
        TickOutcome::PresentedAndRebuilt
    );
    assert_eq!(
        frames.tick(&mut backend, &mut window, &FrameUniforms::default()).unwrap(),
        TickOutcome::Presented
    );
    assert_eq!(backend.count(|c| matches!(c, Call::Rebuild(_))), 1);
}

#[test]
fn test_minimized_window_blocks_until_nonzero_extent() {
    let mut frames = FrameLoop::new(2, Log::disabled());
    let mut backend = MockFrameBackend::new(2, 3);
    let mut window = MockWindow::scripted(
        Extent2D::new(0, 0),
        &[Extent2D::new(0, 0), Extent2D::new(1024, 768)],
    );
    backend.acquire_script.push_back(AcquireOutcome::OutOfDate);

    frames.tick(&mut backend, &mut window, &FrameUniforms::default()).unwrap();

    assert_eq!(window.waits, 2);
    assert_eq!(backend.count(|c| matches!(c, Call::Rebuild(e) if e.is_zero())), 0);
    assert_eq!(backend.swapchain_extent(), Extent2D::new(1024, 768));
}

#[test]
fn test_rebuild_twice_same_extent() {
    let (mut frames, mut backend, mut window) = setup(2);
    frames.rebuild(&mut backend, &mut window).unwrap();
    frames.rebuild(&mut backend, &mut window).unwrap();
    assert_eq!(
        backend.calls,
        vec![Call::Rebuild(Extent2D::new(800, 600)), Call::Rebuild(Extent2D::new(800, 600))]
    );
}

// ============================================================================
// FATAL ERRORS
// ============================================================================

#[test]
fn test_device_error_propagates_with_code() {
    let (mut frames, mut backend, mut window) = setup(2);
    backend.fail_submit = Some(-4);

    let err = frames.tick(&mut backend, &mut window, &FrameUniforms::default()).unwrap_err();

    assert!(matches!(err, Error::Device { code: -4, .. }));
    assert_eq!(backend.count(|c| matches!(c, Call::Present(_))), 0);
}

#[test]
fn test_zero_frames_in_flight_clamped() {
    let frames = FrameLoop::new(0, Log::disabled());
    assert_eq!(frames.frames_in_flight(), 1);
}
