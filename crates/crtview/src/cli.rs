use std::path::PathBuf;

use clap::Parser;
use compositor::{DEFAULT_FIELD_HEIGHT, DEFAULT_FIELD_WIDTH};
use monitorconfig::Preset;

use crate::pattern::PatternKind;

#[derive(Parser, Debug)]
#[command(
    name = "crtview",
    author,
    version,
    about = "Preview the CRT compositor on synthetic test patterns"
)]
pub struct Args {
    /// Monitor profile (TOML). Without one the `--preset` defaults apply.
    #[arg(long, value_name = "PATH", env = "CRTVIEW_PROFILE")]
    pub profile: Option<PathBuf>,

    /// Preset to start from: `tft` or `crt`. Overrides the profile's preset.
    #[arg(long, value_name = "PRESET", value_parser = parse_preset)]
    pub preset: Option<Preset>,

    /// Test pattern fed to the compositor: `bars`, `checker` or `ramp`.
    #[arg(
        long,
        value_name = "PATTERN",
        value_parser = parse_pattern,
        default_value = "bars"
    )]
    pub pattern: PatternKind,

    /// Field resolution (e.g. `1024x320`).
    #[arg(long, value_name = "WIDTHxHEIGHT", value_parser = parse_size)]
    pub field_size: Option<(u32, u32)>,

    /// Fields per second published by the pattern thread.
    #[arg(long, value_name = "HZ", default_value_t = 50.0)]
    pub field_rate: f32,

    /// Initial window size (e.g. `1280x800`).
    #[arg(long, value_name = "WIDTHxHEIGHT", value_parser = parse_size)]
    pub size: Option<(u32, u32)>,

    /// Start with the machine switched off (noise until `P` is pressed).
    #[arg(long)]
    pub powered_off: bool,

    /// Render headless on the CPU and write the composited frame to PATH (PNG).
    #[arg(long, value_name = "PATH")]
    pub snapshot: Option<PathBuf>,

    /// Number of fields to run through the pipeline before a snapshot is taken.
    #[arg(long, value_name = "COUNT", default_value_t = 4)]
    pub frames: u32,
}

impl Args {
    pub fn field_size(&self) -> (u32, u32) {
        self.field_size
            .unwrap_or((DEFAULT_FIELD_WIDTH, DEFAULT_FIELD_HEIGHT))
    }
}

pub fn parse() -> Args {
    Args::parse()
}

pub fn parse_size(value: &str) -> Result<(u32, u32), String> {
    let trimmed = value.trim();
    let (width, height) = trimmed
        .split_once(['x', 'X', '×'])
        .ok_or_else(|| format!("expected WxH format, e.g. 1024x320; got '{trimmed}'"))?;

    let width: u32 = width
        .trim()
        .parse()
        .map_err(|_| format!("invalid width in size '{trimmed}'"))?;
    let height: u32 = height
        .trim()
        .parse()
        .map_err(|_| format!("invalid height in size '{trimmed}'"))?;

    if width == 0 || height == 0 {
        return Err("dimensions must be greater than zero".to_string());
    }

    Ok((width, height))
}

pub fn parse_preset(value: &str) -> Result<Preset, String> {
    match value.trim().to_ascii_lowercase().as_str() {
        "tft" | "lcd" | "flat" => Ok(Preset::Tft),
        "crt" | "tube" => Ok(Preset::Crt),
        other => Err(format!("unknown preset '{other}'; expected tft or crt")),
    }
}

pub fn parse_pattern(value: &str) -> Result<PatternKind, String> {
    match value.trim().to_ascii_lowercase().as_str() {
        "bars" | "colorbars" => Ok(PatternKind::Bars),
        "checker" | "checkerboard" => Ok(PatternKind::Checker),
        "ramp" | "gradient" => Ok(PatternKind::Ramp),
        other => Err(format!(
            "unknown pattern '{other}'; expected bars, checker or ramp"
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_sizes() {
        assert_eq!(parse_size("320x144"), Ok((320, 144)));
        assert_eq!(parse_size(" 64 X 32 "), Ok((64, 32)));
        assert!(parse_size("0x10").is_err());
        assert!(parse_size("wide").is_err());
    }

    #[test]
    fn parses_presets_and_patterns() {
        assert_eq!(parse_preset("CRT"), Ok(Preset::Crt));
        assert_eq!(parse_preset("lcd"), Ok(Preset::Tft));
        assert!(parse_preset("plasma").is_err());
        assert_eq!(parse_pattern("checkerboard"), Ok(PatternKind::Checker));
        assert!(parse_pattern("noise").is_err());
    }

    #[test]
    fn snapshot_flags_parse() {
        let args = Args::try_parse_from([
            "crtview",
            "--snapshot",
            "out.png",
            "--frames",
            "8",
            "--field-size",
            "64x32",
        ])
        .unwrap();
        assert_eq!(args.frames, 8);
        assert_eq!(args.field_size(), (64, 32));
        assert_eq!(args.pattern, PatternKind::Bars);
    }
}
