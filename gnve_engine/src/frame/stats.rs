use std::time::Duration;

/// Frame timing counters handed to the overlay
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FrameStats {
    /// Frames presented so far
    pub frame_count: u64,

    /// Duration of the last frame in milliseconds
    pub last_frame_ms: f32,

    /// Exponentially smoothed frames per second
    pub fps: f32,

    /// Swapchain rebuilds performed so far
    pub swapchain_rebuilds: u32,
}

impl FrameStats {
    /// Weight of the newest sample in the FPS average
    const SMOOTHING: f32 = 0.1;

    pub fn record_frame(&mut self, frame_time: Duration) {
        self.frame_count += 1;
        let seconds = frame_time.as_secs_f32();
        self.last_frame_ms = seconds * 1000.0;
        if seconds <= 0.0 {
            return;
        }
        let instant_fps = 1.0 / seconds;
        self.fps = if self.fps == 0.0 {
            instant_fps
        } else {
            self.fps + (instant_fps - self.fps) * Self::SMOOTHING
        };
    }
}
