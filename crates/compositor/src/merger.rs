//! Turns the stream of long/short fields into one merged frame.

use tracing::{debug, trace};

use crate::backend::Backend;
use crate::noise::NoiseSource;
use crate::textures::TextureId;
use crate::types::{FieldId, ScreenField, ShaderOptions};
use crate::uniforms::MergeUniforms;

const NOISE_SEED: u64 = 0x5eed_f1e1d;

/// Interlace bookkeeping carried between frames.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct PhaseState {
    current_is_long: bool,
    previous_is_long: bool,
    flicker_counter: u8,
}

impl Default for PhaseState {
    fn default() -> Self {
        Self {
            current_is_long: true,
            previous_is_long: true,
            flicker_counter: 0,
        }
    }
}

impl PhaseState {
    fn advance(&mut self, is_long: bool) {
        self.previous_is_long = self.current_is_long;
        self.current_is_long = is_long;
    }

    fn is_transition(&self) -> bool {
        self.current_is_long != self.previous_is_long
    }

    /// Steps the flicker cycle and returns `(long_scale, short_scale)`.
    fn next_scales(&mut self, weight: f32) -> (f32, f32) {
        self.flicker_counter = (self.flicker_counter + 1) % 4;
        if self.flicker_counter >= 2 {
            (1.0, weight)
        } else {
            (weight, 1.0)
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum MergeMode {
    /// Opposite-parity fields blended into alternating rows.
    Interlaced { long_scale: f32, short_scale: f32 },
    /// Same parity as the previous field; copied without weighting.
    Bypass { source: TextureId },
    /// No new field; the textures from the last merge are reused.
    Unchanged,
    /// Machine is off; both fields hold snow.
    Noise,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MergeOutcome {
    pub mode: MergeMode,
    /// Field textures written this call.
    pub uploads: u32,
    /// Flicker cycle position after this call.
    pub flicker_counter: u8,
}

#[derive(Debug)]
pub struct FieldMerger {
    phase: PhaseState,
    last_field: Option<FieldId>,
    noise: NoiseSource,
}

impl FieldMerger {
    pub fn new(field_width: u32, field_height: u32) -> Self {
        Self::with_seed(field_width, field_height, NOISE_SEED)
    }

    pub fn with_seed(field_width: u32, field_height: u32, seed: u64) -> Self {
        Self {
            phase: PhaseState::default(),
            last_field: None,
            noise: NoiseSource::new(field_width, field_height, seed),
        }
    }

    pub fn flicker_counter(&self) -> u8 {
        self.phase.flicker_counter
    }

    /// Identity of the field most recently uploaded.
    pub fn last_field(&self) -> Option<FieldId> {
        self.last_field
    }

    /// Brings the field textures and `merged` up to date with `field`.
    pub fn merge<B: Backend>(
        &mut self,
        backend: &mut B,
        field: Option<&ScreenField>,
        powered_off: bool,
        options: &ShaderOptions,
    ) -> MergeOutcome {
        if powered_off {
            for target in [TextureId::LongField, TextureId::ShortField] {
                backend.upload(target, self.noise.next_field());
            }
            backend.merge_interlaced(MergeUniforms::new(1.0, 1.0));
            // Whatever field arrives after power-on must be uploaded.
            self.last_field = None;
            return self.outcome(MergeMode::Noise, 2);
        }

        let Some(field) = field else {
            trace!("no field published yet");
            return self.outcome(MergeMode::Unchanged, 0);
        };
        if self.last_field == Some(field.id()) {
            trace!(field = field.id().get(), "field unchanged");
            return self.outcome(MergeMode::Unchanged, 0);
        }

        let expected = backend.layout().field_size();
        debug_assert_eq!(
            (field.width(), field.height()),
            expected,
            "field size does not match the field textures"
        );
        if (field.width(), field.height()) != expected {
            debug!(
                width = field.width(),
                height = field.height(),
                "dropping field with mismatched size"
            );
            return self.outcome(MergeMode::Unchanged, 0);
        }

        self.last_field = Some(field.id());
        self.phase.advance(field.is_long());
        let target = if field.is_long() {
            TextureId::LongField
        } else {
            TextureId::ShortField
        };
        backend.upload(target, field.pixels());

        let mode = if self.phase.is_transition() {
            let (long_scale, short_scale) = self.phase.next_scales(options.flicker_scale());
            backend.merge_interlaced(MergeUniforms::new(long_scale, short_scale));
            MergeMode::Interlaced {
                long_scale,
                short_scale,
            }
        } else {
            backend.merge_bypass(target);
            MergeMode::Bypass { source: target }
        };
        trace!(
            field = field.id().get(),
            long = field.is_long(),
            counter = self.phase.flicker_counter,
            ?mode,
            "merged field"
        );
        self.outcome(mode, 1)
    }

    fn outcome(&self, mode: MergeMode, uploads: u32) -> MergeOutcome {
        MergeOutcome {
            mode,
            uploads,
            flicker_counter: self.phase.flicker_counter,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_starts_long_and_steady() {
        let phase = PhaseState::default();
        assert!(phase.current_is_long && phase.previous_is_long);
        assert!(!phase.is_transition());
    }

    #[test]
    fn counter_is_stepped_before_the_scales_are_chosen() {
        let mut phase = PhaseState::default();
        let scales: Vec<_> = (0..4).map(|_| phase.next_scales(0.5)).collect();
        assert_eq!(
            scales,
            vec![(0.5, 1.0), (1.0, 0.5), (1.0, 0.5), (0.5, 1.0)]
        );
        assert_eq!(phase.flicker_counter, 0);
    }

    #[test]
    fn advancing_records_the_previous_parity() {
        let mut phase = PhaseState::default();
        phase.advance(false);
        assert!(phase.is_transition());
        phase.advance(false);
        assert!(!phase.is_transition());
        assert!(!phase.previous_is_long);
    }
}
