//! The fixed post-processing chain between the merged frame and the composite.
//!
//! Stages are plain descriptors. Each names the textures it reads and writes
//! and carries a predicate deciding from the options snapshot whether it runs
//! this frame. [`validate_order`] checks that the list is a valid dataflow so
//! reordering a descriptor by mistake fails a test instead of producing a
//! frame built from last frame's textures.

use thiserror::Error;
use tracing::trace;

use crate::backend::Backend;
use crate::textures::TextureId;
use crate::types::ShaderOptions;
use crate::uniforms::FilterUniforms;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StageKind {
    Enhance,
    BloomSplit,
    BloomBlur,
    Upscale,
    Blur,
    Scanlines,
}

#[derive(Clone, Copy, Debug)]
pub struct StageDescriptor {
    pub kind: StageKind,
    pub name: &'static str,
    pub reads: &'static [TextureId],
    pub writes: &'static [TextureId],
    /// Bloom stages feed the composite only and never the main chain.
    pub bloom_branch: bool,
    pub enabled: fn(&ShaderOptions) -> bool,
}

impl StageDescriptor {
    pub fn is_enabled(&self, options: &ShaderOptions) -> bool {
        (self.enabled)(options)
    }
}

fn always(_: &ShaderOptions) -> bool {
    true
}

fn bloom_on(options: &ShaderOptions) -> bool {
    options.bloom
}

fn blur_on(options: &ShaderOptions) -> bool {
    options.blur
}

const BLOOM: &[TextureId] = &TextureId::BLOOM;

pub const STAGES: &[StageDescriptor] = &[
    StageDescriptor {
        kind: StageKind::Enhance,
        name: "enhance",
        reads: &[TextureId::Merged],
        writes: &[TextureId::Enhanced],
        bloom_branch: false,
        enabled: always,
    },
    StageDescriptor {
        kind: StageKind::BloomSplit,
        name: "bloom split",
        reads: &[TextureId::Merged],
        writes: BLOOM,
        bloom_branch: true,
        enabled: bloom_on,
    },
    StageDescriptor {
        kind: StageKind::BloomBlur,
        name: "bloom blur",
        reads: BLOOM,
        writes: BLOOM,
        bloom_branch: true,
        enabled: bloom_on,
    },
    StageDescriptor {
        kind: StageKind::Upscale,
        name: "upscale",
        reads: &[TextureId::Enhanced],
        writes: &[TextureId::Upscaled],
        bloom_branch: false,
        enabled: always,
    },
    StageDescriptor {
        kind: StageKind::Blur,
        name: "blur",
        reads: &[TextureId::Upscaled],
        writes: &[TextureId::Upscaled],
        bloom_branch: false,
        enabled: blur_on,
    },
    StageDescriptor {
        kind: StageKind::Scanlines,
        name: "scanlines",
        reads: &[TextureId::Upscaled],
        writes: &[TextureId::Scanlined],
        bloom_branch: false,
        enabled: always,
    },
];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum OrderError {
    #[error("stage `{stage}` reads {texture:?} before any stage produced it")]
    Unproduced {
        stage: &'static str,
        texture: TextureId,
    },
    #[error("stage `{stage}` overwrites {texture:?} after `{reader}` already consumed it")]
    Overwrites {
        stage: &'static str,
        texture: TextureId,
        reader: &'static str,
    },
    #[error("stage `{stage}` crosses the bloom branch boundary at {texture:?}")]
    BloomLeak {
        stage: &'static str,
        texture: TextureId,
    },
}

fn is_bloom(texture: TextureId) -> bool {
    TextureId::BLOOM.contains(&texture)
}

/// Checks that `stages` form a forward-only dataflow starting at `merged`.
pub fn validate_order(stages: &[StageDescriptor]) -> Result<(), OrderError> {
    let mut produced = vec![TextureId::Merged];
    let mut consumed: Vec<(TextureId, &'static str)> = Vec::new();

    for stage in stages {
        for &texture in stage.reads {
            if !produced.contains(&texture) {
                return Err(OrderError::Unproduced {
                    stage: stage.name,
                    texture,
                });
            }
            let leaks = if stage.bloom_branch {
                texture != TextureId::Merged && !is_bloom(texture)
            } else {
                is_bloom(texture)
            };
            if leaks {
                return Err(OrderError::BloomLeak {
                    stage: stage.name,
                    texture,
                });
            }
        }
        for &texture in stage.writes {
            if let Some(&(_, reader)) = consumed
                .iter()
                .find(|(read, reader)| *read == texture && *reader != stage.name)
            {
                return Err(OrderError::Overwrites {
                    stage: stage.name,
                    texture,
                    reader,
                });
            }
            if stage.bloom_branch != is_bloom(texture) {
                return Err(OrderError::BloomLeak {
                    stage: stage.name,
                    texture,
                });
            }
            if !produced.contains(&texture) {
                produced.push(texture);
            }
        }
        consumed.extend(stage.reads.iter().map(|&texture| (texture, stage.name)));
    }
    Ok(())
}

/// The stages that run this frame, in chain order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StagePlan {
    kinds: Vec<StageKind>,
}

impl StagePlan {
    pub fn for_options(options: &ShaderOptions) -> Self {
        let kinds = STAGES
            .iter()
            .filter(|stage| stage.is_enabled(options))
            .map(|stage| stage.kind)
            .collect();
        Self { kinds }
    }

    pub fn kinds(&self) -> &[StageKind] {
        &self.kinds
    }

    pub fn contains(&self, kind: StageKind) -> bool {
        self.kinds.contains(&kind)
    }

    /// Records every stage of the plan into `backend`.
    pub fn execute<B: Backend>(&self, backend: &mut B, options: &ShaderOptions) {
        for &kind in &self.kinds {
            trace!(?kind, "running stage");
            run_stage(kind, backend, options);
        }
    }
}

fn run_stage<B: Backend>(kind: StageKind, backend: &mut B, options: &ShaderOptions) {
    match kind {
        StageKind::Enhance => backend.enhance(options.enhancer),
        StageKind::BloomSplit => backend.split_bloom(options.bloom_brightness),
        StageKind::BloomBlur => {
            for id in TextureId::BLOOM {
                backend.blur(id, options.bloom_radius);
            }
        }
        StageKind::Upscale => backend.upscale(options.upscaler),
        StageKind::Blur => backend.blur(TextureId::Upscaled, options.blur_radius),
        StageKind::Scanlines => backend.apply_scanlines(FilterUniforms {
            brightness: options.scanline_brightness,
            weight: options.scanline_weight,
            mode: options.scanlines.code(),
            padding: 0.0,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shipped_chain_is_a_valid_dataflow() {
        assert_eq!(validate_order(STAGES), Ok(()));
    }

    #[test]
    fn upscaling_before_enhancing_is_rejected() {
        let swapped = [STAGES[3], STAGES[0]];
        assert_eq!(
            validate_order(&swapped),
            Err(OrderError::Unproduced {
                stage: "upscale",
                texture: TextureId::Enhanced
            })
        );
    }

    #[test]
    fn blurring_after_scanlines_is_rejected() {
        let stages = [STAGES[0], STAGES[3], STAGES[5], STAGES[4]];
        assert_eq!(
            validate_order(&stages),
            Err(OrderError::Overwrites {
                stage: "blur",
                texture: TextureId::Upscaled,
                reader: "scanlines"
            })
        );
    }

    #[test]
    fn bloom_may_not_read_the_main_chain() {
        let mut split = STAGES[1];
        split.reads = &[TextureId::Enhanced];
        let stages = [STAGES[0], split];
        assert!(matches!(
            validate_order(&stages),
            Err(OrderError::BloomLeak { stage: "bloom split", .. })
        ));
    }

    #[test]
    fn plan_follows_option_toggles() {
        let tft = StagePlan::for_options(&ShaderOptions::tft());
        assert_eq!(
            tft.kinds(),
            &[
                StageKind::Enhance,
                StageKind::Upscale,
                StageKind::Blur,
                StageKind::Scanlines
            ]
        );

        let crt = StagePlan::for_options(&ShaderOptions::crt());
        assert!(crt.contains(StageKind::BloomSplit));
        assert!(crt.contains(StageKind::BloomBlur));
        assert_eq!(crt.kinds().len(), STAGES.len());
    }
}
