//! Frame-stepped animation helpers.
//!
//! Everything here advances once per rendered frame instead of reading the
//! wall clock, so a test that renders N frames always observes the same
//! values regardless of how fast it runs.

/// Alpha the canvas starts at after power-up; values below zero keep the
/// screen dark for a while before the fade becomes visible.
pub const POWER_UP_ALPHA: f32 = -2.5;

/// Dimming applied to the whole picture while emulation is paused.
pub const PAUSED_ALPHA: f32 = 0.5;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FadeCurve {
    #[default]
    Linear,
    Smoothstep,
    EaseInOut,
}

impl FadeCurve {
    pub fn sample(self, t: f32) -> f32 {
        let clamped = t.clamp(0.0, 1.0);
        match self {
            FadeCurve::Linear => clamped,
            FadeCurve::Smoothstep => clamped * clamped * (3.0 - 2.0 * clamped),
            FadeCurve::EaseInOut => {
                if clamped < 0.5 {
                    2.0 * clamped * clamped
                } else {
                    -1.0 + (4.0 - 2.0 * clamped) * clamped
                }
            }
        }
    }
}

/// A value that walks linearly towards its target in a fixed number of steps.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AnimatedFloat {
    current: f32,
    target: f32,
    delta: f32,
}

impl AnimatedFloat {
    pub fn new(value: f32) -> Self {
        Self {
            current: value,
            target: value,
            delta: 0.0,
        }
    }

    pub fn current(&self) -> f32 {
        self.current
    }

    pub fn target(&self) -> f32 {
        self.target
    }

    /// Jumps straight to `value`.
    pub fn set(&mut self, value: f32) {
        *self = Self::new(value);
    }

    /// Starts moving towards `target`, arriving after `steps` calls to [`step`](Self::step).
    pub fn animate_to(&mut self, target: f32, steps: u32) {
        self.target = target;
        self.delta = (target - self.current) / steps.max(1) as f32;
    }

    pub fn animates(&self) -> bool {
        self.current != self.target
    }

    pub fn step(&mut self) {
        if (self.current - self.target).abs() <= self.delta.abs() {
            self.current = self.target;
        } else {
            self.current += self.delta;
        }
    }
}

/// Canvas alpha after power-up: from [`POWER_UP_ALPHA`] to fully opaque.
#[derive(Clone, Copy, Debug)]
pub struct PowerUpFade {
    alpha: AnimatedFloat,
    frames: u32,
    curve: FadeCurve,
}

impl PowerUpFade {
    pub fn new(frames: u32, curve: FadeCurve) -> Self {
        let mut fade = Self {
            alpha: AnimatedFloat::new(1.0),
            frames,
            curve,
        };
        fade.restart();
        fade
    }

    /// A fade that is already complete.
    pub fn finished() -> Self {
        Self {
            alpha: AnimatedFloat::new(1.0),
            frames: 0,
            curve: FadeCurve::Linear,
        }
    }

    pub fn restart(&mut self) {
        if self.frames == 0 {
            self.alpha.set(1.0);
            return;
        }
        self.alpha.set(POWER_UP_ALPHA);
        self.alpha.animate_to(1.0, self.frames);
    }

    /// Shaped alpha for the current frame, clamped to `0..=1`.
    pub fn value(&self) -> f32 {
        self.curve.sample(self.alpha.current())
    }

    pub fn animates(&self) -> bool {
        self.alpha.animates()
    }

    pub fn step(&mut self) {
        self.alpha.step();
    }
}

impl Default for PowerUpFade {
    fn default() -> Self {
        Self::finished()
    }
}
