use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use compositor::{CpuBackend, FrameDriver, LatestField, ShaderOptions, TextureLayout, ViewState};
use image::{ImageFormat, RgbaImage};

use crate::pattern::{self, PatternKind};

/// Noise seed for headless runs so powered-off snapshots are reproducible.
const SNAPSHOT_SEED: u64 = 0x5EED_C0DE;

pub struct SnapshotConfig {
    pub pattern: PatternKind,
    pub field_size: (u32, u32),
    pub fields: u32,
    pub options: ShaderOptions,
    pub powered_off: bool,
}

/// Runs `fields` pattern fields through the CPU pipeline and returns the last
/// composited frame.
pub fn render(config: &SnapshotConfig) -> Result<RgbaImage> {
    let (width, height) = config.field_size;
    let layout = TextureLayout::new(width, height).context("invalid field size")?;
    let mut driver = FrameDriver::new(CpuBackend::native(layout)).with_noise_seed(SNAPSHOT_SEED);
    let source = LatestField::new();
    source.set_powered_off(config.powered_off);
    let view = ViewState::default();

    for index in 0..config.fields.max(1) {
        source.publish(pattern::field(config.pattern, config.field_size, u64::from(index)));
        let report = driver
            .render_frame(&source, &config.options, &view)
            .unwrap_or_else(|never| match never {});
        tracing::trace!(index, mode = ?report.merge.mode, "snapshot frame");
    }

    let output = driver.backend().output();
    RgbaImage::from_raw(output.width, output.height, output.as_bytes().to_vec())
        .context("composited frame has an unexpected size")
}

pub fn write(config: &SnapshotConfig, path: &Path) -> Result<()> {
    let image = render(config)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    image
        .save_with_format(path, ImageFormat::Png)
        .with_context(|| format!("failed to write snapshot to {}", path.display()))?;
    tracing::info!(
        path = %path.display(),
        width = image.width(),
        height = image.height(),
        "snapshot written"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(options: ShaderOptions) -> SnapshotConfig {
        SnapshotConfig {
            pattern: PatternKind::Bars,
            field_size: (16, 4),
            fields: 2,
            options,
            powered_off: false,
        }
    }

    #[test]
    fn tft_snapshot_shows_the_pattern() {
        // Without flicker an interlaced pair reproduces the frame exactly.
        let options = ShaderOptions {
            flicker: false,
            ..ShaderOptions::tft()
        };
        let image = render(&config(options)).unwrap();
        assert_eq!(image.dimensions(), (32, 16));
        assert_eq!(image.get_pixel(0, 0).0, [235, 235, 235, 255]);
        assert_eq!(image.get_pixel(31, 15).0, [16, 16, 16, 255]);
    }

    #[test]
    fn overflowing_field_size_is_rejected() {
        let mut cfg = config(ShaderOptions::tft());
        cfg.field_size = (u32::MAX, 2);
        let err = render(&cfg).unwrap_err();
        assert!(format!("{err:#}").contains("overflows"));
    }

    #[test]
    fn powered_off_snapshot_is_noise() {
        let mut cfg = config(ShaderOptions::tft());
        cfg.powered_off = true;
        let image = render(&cfg).unwrap();
        assert!(image
            .pixels()
            .all(|p| p.0 == [0, 0, 0, 255] || p.0 == [255, 255, 255, 255]));
    }
}
