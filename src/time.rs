/// Relative deviation from the target frame rate that still counts as a match.
pub const FRAME_RATE_TOLERANCE: f64 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FrameRateMismatch {
    pub count: usize,
    /// Largest relative deviation seen, signed (`source / target - 1`).
    pub max_error: f64,
}

/// Maps the capture's per-frame delta times onto the output frame numbering.
///
/// Samples recorded during a source frame use the clock as it was when the frame
/// began; the frame's own delta only moves the clock once the frame ends.
#[derive(Debug, Clone)]
pub struct TimeConverter {
    fps: f64,
    clock: f64,
    pending: f64,
    mismatch: FrameRateMismatch,
}

impl TimeConverter {
    pub fn new(fps: f64) -> Self {
        Self {
            fps,
            clock: 0.0,
            pending: 0.0,
            mismatch: FrameRateMismatch::default(),
        }
    }

    pub fn fps(&self) -> f64 {
        self.fps
    }

    /// Non-finite or negative deltas are counted as mismatches and do not move the clock.
    pub fn advance_frame(&mut self, delta: f64) {
        self.clock += self.pending;

        if !(delta.is_finite() && delta >= 0.0) {
            log::debug!("Ignoring frame delta {}", delta);
            self.mismatch.count += 1;
            self.pending = 0.0;
            return;
        }
        self.pending = delta;

        if delta != 0.0 {
            let rate = 1.0 / delta;
            let error = rate / self.fps - 1.0;
            if error.abs() > FRAME_RATE_TOLERANCE {
                self.mismatch.count += 1;
                if error.abs() > self.mismatch.max_error.abs() {
                    self.mismatch.max_error = error;
                }
            }
        }
    }

    pub fn commit_frame_end(&mut self) {
        self.clock += self.pending;
        self.pending = 0.0;
    }

    // output frame 0 is reserved for the hidden state of freshly created entities.
    pub fn current_output_time(&self) -> f64 {
        1.0 + self.clock * self.fps
    }

    pub fn mismatch(&self) -> Option<FrameRateMismatch> {
        (self.mismatch.count > 0).then_some(self.mismatch)
    }
}
