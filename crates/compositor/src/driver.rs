//! Per-refresh orchestration of merge, stage chain and composite.

use tracing::debug;

use crate::backend::Backend;
use crate::compositor::{Compositor, ViewState};
use crate::dotmask::DotMaskCache;
use crate::merger::{FieldMerger, MergeOutcome};
use crate::source::FieldSource;
use crate::stages::{validate_order, StagePlan, STAGES};
use crate::textures::TextureId;
use crate::timeline::{FadeCurve, PowerUpFade};
use crate::types::ShaderOptions;

/// What happened during one [`FrameDriver::render_frame`] call.
#[derive(Clone, Debug, PartialEq)]
pub struct FrameReport {
    pub merge: MergeOutcome,
    pub plan: StagePlan,
    pub dot_mask_rebuilt: bool,
    pub bloom_cleared: bool,
    /// Alpha handed to the composite pass.
    pub alpha: f32,
}

pub struct FrameDriver<B: Backend> {
    backend: B,
    merger: FieldMerger,
    compositor: Compositor,
    dot_masks: DotMaskCache,
    fade: PowerUpFade,
    bloom_active: bool,
    was_powered_off: bool,
    frames: u64,
}

impl<B: Backend> FrameDriver<B> {
    pub fn new(backend: B) -> Self {
        debug_assert_eq!(validate_order(STAGES), Ok(()));
        let (width, height) = backend.layout().field_size();
        Self {
            backend,
            merger: FieldMerger::new(width, height),
            compositor: Compositor::new(),
            dot_masks: DotMaskCache::new(),
            fade: PowerUpFade::finished(),
            bloom_active: false,
            was_powered_off: false,
            frames: 0,
        }
    }

    /// Starts with a power-up fade of `frames` frames.
    pub fn with_fade(mut self, frames: u32, curve: FadeCurve) -> Self {
        self.fade = PowerUpFade::new(frames, curve);
        self
    }

    /// Replaces the noise generator seed; snapshots use this for stable output.
    pub fn with_noise_seed(mut self, seed: u64) -> Self {
        let (width, height) = self.backend.layout().field_size();
        self.merger = FieldMerger::with_seed(width, height, seed);
        self
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn merger(&self) -> &FieldMerger {
        &self.merger
    }

    pub fn dot_mask_rebuilds(&self) -> u64 {
        self.dot_masks.rebuilds()
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn restart_fade(&mut self) {
        self.fade.restart();
    }

    /// Renders one frame from the latest field in `source`.
    ///
    /// `options` is copied on entry so the caller may keep editing its record
    /// while the frame is in flight.
    pub fn render_frame(
        &mut self,
        source: &dyn FieldSource,
        options: &ShaderOptions,
        view: &ViewState,
    ) -> Result<FrameReport, B::Error> {
        let options = *options;

        let powered_off = source.is_powered_off();
        if self.was_powered_off && !powered_off {
            debug!("power restored, restarting fade");
            self.fade.restart();
        }
        self.was_powered_off = powered_off;

        let field = source.current_field();
        let merge = self
            .merger
            .merge(&mut self.backend, field.as_deref(), powered_off, &options);

        let dot_mask_rebuilt = match self
            .dot_masks
            .refresh(options.dot_mask, options.dot_mask_brightness)
        {
            Some(mask) => {
                self.backend.install_dot_mask(&mask);
                true
            }
            None => false,
        };

        let plan = StagePlan::for_options(&options);
        plan.execute(&mut self.backend, &options);

        let bloom_cleared = self.bloom_active && !options.bloom;
        if bloom_cleared {
            for id in TextureId::BLOOM {
                self.backend.clear(id);
            }
            debug!("bloom disabled, cleared bloom textures");
        }
        self.bloom_active = options.bloom;

        let frame = self.compositor.draw(
            &mut self.backend,
            &options,
            view,
            self.fade.value(),
            self.dot_masks.size(),
        )?;
        if !view.paused {
            self.fade.step();
        }
        self.frames += 1;

        Ok(FrameReport {
            merge,
            plan,
            dot_mask_rebuilt,
            bloom_cleared,
            alpha: frame.fragment.alpha,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::CpuBackend;
    use crate::merger::MergeMode;
    use crate::source::LatestField;
    use crate::textures::TextureLayout;
    use crate::types::ScreenField;

    fn driver() -> FrameDriver<CpuBackend> {
        FrameDriver::new(CpuBackend::native(TextureLayout::new(4, 2).expect("layout")))
    }

    #[test]
    fn empty_source_still_composites() {
        let mut driver = driver();
        let source = LatestField::new();
        let report = driver
            .render_frame(&source, &ShaderOptions::tft(), &ViewState::default())
            .expect("frame");
        assert_eq!(report.merge.mode, MergeMode::Unchanged);
        assert_eq!(report.alpha, 1.0);
        assert_eq!(driver.backend().draws(), 1);
        assert_eq!(driver.frames(), 1);
    }

    #[test]
    fn fade_restarts_when_power_returns() {
        let mut driver = driver().with_fade(7, FadeCurve::Linear);
        let source = LatestField::new();
        source.publish(ScreenField::solid(4, 2, 0, true));
        let options = ShaderOptions::tft();
        let view = ViewState::default();

        for _ in 0..7 {
            driver.render_frame(&source, &options, &view).expect("frame");
        }
        let report = driver.render_frame(&source, &options, &view).expect("frame");
        assert_eq!(report.alpha, 1.0);

        source.set_powered_off(true);
        driver.render_frame(&source, &options, &view).expect("frame");
        source.set_powered_off(false);
        let report = driver.render_frame(&source, &options, &view).expect("frame");
        assert_eq!(report.alpha, 0.0);
    }

    #[test]
    fn paused_frames_hold_the_fade() {
        let mut driver = driver().with_fade(7, FadeCurve::Linear);
        let source = LatestField::new();
        let paused = ViewState {
            paused: true,
            ..ViewState::default()
        };
        for _ in 0..10 {
            let report = driver
                .render_frame(&source, &ShaderOptions::tft(), &paused)
                .expect("frame");
            assert_eq!(report.alpha, crate::timeline::PAUSED_ALPHA);
        }
        let report = driver
            .render_frame(&source, &ShaderOptions::tft(), &ViewState::default())
            .expect("frame");
        assert_eq!(report.alpha, 0.0);
    }
}
