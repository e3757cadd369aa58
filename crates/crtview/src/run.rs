use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use monitorconfig::MonitorProfile;
use tracing_subscriber::EnvFilter;

use crate::cli::Args;
use crate::snapshot::{self, SnapshotConfig};
use crate::window::{self, WindowConfig};

/// Refresh rate assumed when converting the fade duration into frames.
const DISPLAY_HZ: f32 = 60.0;
const DEFAULT_WINDOW_SIZE: (u32, u32) = (1280, 800);

pub fn run(args: Args) -> Result<()> {
    initialise_tracing();

    let mut profile = load_profile(args.profile.as_deref())?;
    if let Some(preset) = args.preset {
        profile.preset = preset;
    }
    let options = profile.shader_options();
    tracing::debug!(?options, "resolved shader options");

    if let Some(path) = args.snapshot.as_deref() {
        let config = SnapshotConfig {
            pattern: args.pattern,
            field_size: args.field_size(),
            fields: args.frames,
            options,
            powered_off: args.powered_off,
        };
        return snapshot::write(&config, path);
    }

    window::run_window(WindowConfig {
        size: args.size.unwrap_or(DEFAULT_WINDOW_SIZE),
        field_size: args.field_size(),
        pattern: args.pattern,
        field_rate: args.field_rate,
        options,
        gpu: profile.gpu_settings(),
        fade_frames: profile.fade_frames(DISPLAY_HZ),
        fade_curve: profile.fade_curve(),
        powered_off: args.powered_off,
    })
}

fn initialise_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn load_profile(path: Option<&Path>) -> Result<MonitorProfile> {
    let Some(path) = path else {
        return Ok(MonitorProfile::default());
    };
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read monitor profile {}", path.display()))?;
    let profile = MonitorProfile::from_toml_str(&raw)
        .with_context(|| format!("invalid monitor profile {}", path.display()))?;
    tracing::info!(path = %path.display(), preset = ?profile.preset, "loaded monitor profile");
    Ok(profile)
}
