//! Monitor profiles.
//!
//! A profile picks a preset (`tft` or `crt`) and overrides individual effects
//! on top of it. Continuous settings use the 0–1000 slider scale of the
//! preferences panel and are mapped onto each option's float range when the
//! profile is resolved.

use std::fmt;
use std::time::Duration;

use compositor::{
    DotMaskStyle, Enhancer, FadeCurve, GpuPowerPreference, GpuSettings, ScanlineMode,
    ShaderOptions, Upscaler,
};
use serde::de::{self, Deserializer};
use serde::Deserialize;

pub const SLIDER_MAX: u32 = 1000;
const MAX_FADE: Duration = Duration::from_secs(10);

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Float range a 0–1000 slider maps onto.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SliderRange {
    pub min: f32,
    pub max: f32,
}

impl SliderRange {
    pub const fn new(min: f32, max: f32) -> Self {
        Self { min, max }
    }

    pub fn value(&self, slider: u32) -> f32 {
        let t = slider.min(SLIDER_MAX) as f32 / SLIDER_MAX as f32;
        self.min + (self.max - self.min) * t
    }

    pub fn slider(&self, value: f32) -> u32 {
        let t = (value - self.min) / (self.max - self.min);
        (t.clamp(0.0, 1.0) * SLIDER_MAX as f32).round() as u32
    }
}

pub const BLUR_RADIUS: SliderRange = SliderRange::new(0.0, 5.0);
pub const BLOOM_RADIUS: SliderRange = SliderRange::new(0.0, 5.0);
pub const BLOOM_BRIGHTNESS: SliderRange = SliderRange::new(0.0, 2.0);
pub const BLOOM_WEIGHT: SliderRange = SliderRange::new(0.0, 3.0);
pub const UNIT: SliderRange = SliderRange::new(0.0, 1.0);
pub const DISALIGNMENT: SliderRange = SliderRange::new(-0.004, 0.004);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Preset {
    #[default]
    Tft,
    Crt,
}

impl Preset {
    pub fn options(self) -> ShaderOptions {
        match self {
            Preset::Tft => ShaderOptions::tft(),
            Preset::Crt => ShaderOptions::crt(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MonitorProfile {
    pub version: u32,
    #[serde(default)]
    pub preset: Preset,
    #[serde(default)]
    pub fade: Fade,
    #[serde(default)]
    pub gpu: Gpu,
    #[serde(default)]
    pub effects: Effects,
}

impl Default for MonitorProfile {
    fn default() -> Self {
        Self {
            version: 1,
            preset: Preset::default(),
            fade: Fade::default(),
            gpu: Gpu::default(),
            effects: Effects::default(),
        }
    }
}

/// Power-up fade.
#[derive(Debug, Clone, Deserialize)]
pub struct Fade {
    #[serde(
        default = "default_fade_duration",
        deserialize_with = "deserialize_duration"
    )]
    pub duration: Duration,
    #[serde(default, deserialize_with = "deserialize_choice_opt")]
    pub curve: Option<FadeCurve>,
}

impl Default for Fade {
    fn default() -> Self {
        Self {
            duration: default_fade_duration(),
            curve: None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Gpu {
    #[serde(default, deserialize_with = "deserialize_choice_opt")]
    pub power: Option<GpuPowerPreference>,
    pub vsync: Option<bool>,
    pub frame_latency: Option<u32>,
}

/// Per-effect overrides; anything left out keeps the preset's value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Effects {
    #[serde(default, deserialize_with = "deserialize_choice_opt")]
    pub enhancer: Option<Enhancer>,
    #[serde(default, deserialize_with = "deserialize_choice_opt")]
    pub upscaler: Option<Upscaler>,

    pub blur: Option<bool>,
    pub blur_radius: Option<u32>,

    pub bloom: Option<bool>,
    pub bloom_radius: Option<u32>,
    pub bloom_brightness: Option<u32>,
    pub bloom_weight: Option<u32>,

    pub flicker: Option<bool>,
    pub flicker_weight: Option<u32>,

    #[serde(default, deserialize_with = "deserialize_choice_opt")]
    pub dot_mask: Option<DotMaskStyle>,
    pub dot_mask_brightness: Option<u32>,

    #[serde(default, deserialize_with = "deserialize_choice_opt")]
    pub scanlines: Option<ScanlineMode>,
    pub scanline_brightness: Option<u32>,
    pub scanline_weight: Option<u32>,

    pub disalignment: Option<bool>,
    pub disalignment_h: Option<u32>,
    pub disalignment_v: Option<u32>,
}

impl Effects {
    fn sliders(&self) -> [(&'static str, Option<u32>); 10] {
        [
            ("blur_radius", self.blur_radius),
            ("bloom_radius", self.bloom_radius),
            ("bloom_brightness", self.bloom_brightness),
            ("bloom_weight", self.bloom_weight),
            ("flicker_weight", self.flicker_weight),
            ("dot_mask_brightness", self.dot_mask_brightness),
            ("scanline_brightness", self.scanline_brightness),
            ("scanline_weight", self.scanline_weight),
            ("disalignment_h", self.disalignment_h),
            ("disalignment_v", self.disalignment_v),
        ]
    }
}

fn default_fade_duration() -> Duration {
    Duration::from_millis(500)
}

fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    struct Visitor;
    impl<'de> de::Visitor<'de> for Visitor {
        type Value = Duration;

        fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
            formatter.write_str("a duration as number of seconds or human-readable string")
        }

        fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            humantime::parse_duration(v)
                .map_err(|err| E::custom(format!("invalid duration '{v}': {err}")))
        }

        fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(Duration::from_secs(v))
        }

        fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if v < 0 {
                return Err(E::custom("duration must be non-negative"));
            }
            Ok(Duration::from_secs(v as u64))
        }

        fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if v.is_nan() || v.is_sign_negative() {
                return Err(E::custom("duration must be non-negative"));
            }
            Ok(Duration::from_secs_f64(v))
        }
    }

    deserializer.deserialize_any(Visitor)
}

/// A setting chosen from a fixed gallery, by name or by gallery index.
trait Choice: Sized {
    const KIND: &'static str;
    const NAMES: &'static [&'static str];

    fn from_index(index: usize) -> Option<Self>;
}

impl Choice for Enhancer {
    const KIND: &'static str = "enhancer";
    const NAMES: &'static [&'static str] = &["bypass", "epx", "xbr"];

    fn from_index(index: usize) -> Option<Self> {
        Enhancer::from_index(index)
    }
}

impl Choice for Upscaler {
    const KIND: &'static str = "upscaler";
    const NAMES: &'static [&'static str] = &["bypass", "epx", "xbr"];

    fn from_index(index: usize) -> Option<Self> {
        Upscaler::from_index(index)
    }
}

impl Choice for ScanlineMode {
    const KIND: &'static str = "scanline mode";
    const NAMES: &'static [&'static str] = &["off", "embedded", "effective"];

    fn from_index(index: usize) -> Option<Self> {
        ScanlineMode::from_index(index)
    }
}

impl Choice for DotMaskStyle {
    const KIND: &'static str = "dot mask";
    const NAMES: &'static [&'static str] = &[
        "none",
        "aperture-grille-3",
        "aperture-grille-4",
        "shadow-mask-3x9",
        "shadow-mask-4x8",
    ];

    fn from_index(index: usize) -> Option<Self> {
        DotMaskStyle::from_index(index)
    }
}

impl Choice for FadeCurve {
    const KIND: &'static str = "fade curve";
    const NAMES: &'static [&'static str] = &["linear", "smoothstep", "ease-in-out"];

    fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(FadeCurve::Linear),
            1 => Some(FadeCurve::Smoothstep),
            2 => Some(FadeCurve::EaseInOut),
            _ => None,
        }
    }
}

impl Choice for GpuPowerPreference {
    const KIND: &'static str = "power preference";
    const NAMES: &'static [&'static str] = &["low", "high"];

    fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(GpuPowerPreference::Low),
            1 => Some(GpuPowerPreference::High),
            _ => None,
        }
    }
}

fn parse_choice<T: Choice>(raw: &str) -> Result<T, String> {
    let normalized = raw.trim().to_ascii_lowercase().replace('_', "-");
    let index = match normalized.parse::<usize>() {
        Ok(index) => Some(index),
        Err(_) => T::NAMES.iter().position(|name| *name == normalized),
    };
    index.and_then(T::from_index).ok_or_else(|| {
        format!(
            "invalid {} '{raw}'; expected one of {} or an index below {}",
            T::KIND,
            T::NAMES.join(", "),
            T::NAMES.len()
        )
    })
}

fn deserialize_choice_opt<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Choice,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Helper {
        Str(String),
        Num(i64),
    }

    let helper: Option<Helper> = Option::deserialize(deserializer)?;
    let result = match helper {
        None => None,
        Some(Helper::Str(raw)) => Some(parse_choice(&raw).map_err(de::Error::custom)?),
        Some(Helper::Num(value)) => {
            if value < 0 {
                return Err(de::Error::custom(format!(
                    "{} index must be non-negative",
                    T::KIND
                )));
            }
            Some(parse_choice(&value.to_string()).map_err(de::Error::custom)?)
        }
    };
    Ok(result)
}

impl MonitorProfile {
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let raw: MonitorProfile = toml::from_str(input)?;
        raw.validate()?;
        Ok(raw)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version != 1 {
            return Err(ConfigError::Invalid(format!(
                "unsupported config version {}; expected 1",
                self.version
            )));
        }

        for (name, slider) in self.effects.sliders() {
            if let Some(value) = slider {
                if value > SLIDER_MAX {
                    return Err(ConfigError::Invalid(format!(
                        "effects.{name} must be between 0 and {SLIDER_MAX}, got {value}"
                    )));
                }
            }
        }

        if self.fade.duration > MAX_FADE {
            return Err(ConfigError::Invalid(format!(
                "fade.duration may be at most {}",
                humantime::format_duration(MAX_FADE)
            )));
        }

        if let Some(latency) = self.gpu.frame_latency {
            if !(1..=3).contains(&latency) {
                return Err(ConfigError::Invalid(
                    "gpu.frame_latency must be 1, 2 or 3".into(),
                ));
            }
        }

        Ok(())
    }

    /// Preset values with every override from `[effects]` applied.
    pub fn shader_options(&self) -> ShaderOptions {
        let effects = &self.effects;
        let mut options = self.preset.options();

        override_with(&mut options.enhancer, effects.enhancer);
        override_with(&mut options.upscaler, effects.upscaler);

        override_with(&mut options.blur, effects.blur);
        override_slider(&mut options.blur_radius, effects.blur_radius, BLUR_RADIUS);

        override_with(&mut options.bloom, effects.bloom);
        override_slider(&mut options.bloom_radius, effects.bloom_radius, BLOOM_RADIUS);
        override_slider(
            &mut options.bloom_brightness,
            effects.bloom_brightness,
            BLOOM_BRIGHTNESS,
        );
        override_slider(&mut options.bloom_weight, effects.bloom_weight, BLOOM_WEIGHT);

        override_with(&mut options.flicker, effects.flicker);
        override_slider(&mut options.flicker_weight, effects.flicker_weight, UNIT);

        override_with(&mut options.dot_mask, effects.dot_mask);
        override_slider(
            &mut options.dot_mask_brightness,
            effects.dot_mask_brightness,
            UNIT,
        );

        override_with(&mut options.scanlines, effects.scanlines);
        override_slider(
            &mut options.scanline_brightness,
            effects.scanline_brightness,
            UNIT,
        );
        override_slider(&mut options.scanline_weight, effects.scanline_weight, UNIT);

        override_with(&mut options.disalignment, effects.disalignment);
        override_slider(
            &mut options.disalignment_h,
            effects.disalignment_h,
            DISALIGNMENT,
        );
        override_slider(
            &mut options.disalignment_v,
            effects.disalignment_v,
            DISALIGNMENT,
        );

        options
    }

    pub fn gpu_settings(&self) -> GpuSettings {
        let defaults = GpuSettings::default();
        GpuSettings {
            power: self.gpu.power.unwrap_or(defaults.power),
            vsync: self.gpu.vsync.unwrap_or(defaults.vsync),
            frame_latency: self.gpu.frame_latency.unwrap_or(defaults.frame_latency),
        }
    }

    /// Length of the power-up fade in frames at `refresh_hz`.
    pub fn fade_frames(&self, refresh_hz: f32) -> u32 {
        (self.fade.duration.as_secs_f32() * refresh_hz.max(0.0)).round() as u32
    }

    pub fn fade_curve(&self) -> FadeCurve {
        self.fade.curve.unwrap_or_default()
    }
}

fn override_with<T: Copy>(target: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *target = value;
    }
}

fn override_slider(target: &mut f32, slider: Option<u32>, range: SliderRange) {
    if let Some(slider) = slider {
        *target = range.value(slider);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
version = 1
preset = "crt"

[fade]
duration = "1s 500ms"
curve = "smoothstep"

[gpu]
power = "high"
vsync = false
frame_latency = 1

[effects]
enhancer = "epx"
upscaler = 1
bloom_radius = 200
bloom_weight = 500
dot_mask = "shadow_mask_4x8"
dot_mask_brightness = 250
scanlines = "embedded"
disalignment = true
disalignment_h = 1000
disalignment_v = 500
"#;

    fn close(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-6
    }

    #[test]
    fn parses_sample_profile() {
        let profile = MonitorProfile::from_toml_str(SAMPLE).expect("parse profile");
        assert_eq!(profile.version, 1);
        assert_eq!(profile.preset, Preset::Crt);
        assert_eq!(profile.fade.duration, Duration::from_millis(1500));
        assert_eq!(profile.fade_curve(), FadeCurve::Smoothstep);
        assert_eq!(profile.effects.upscaler, Some(Upscaler::Epx));
        assert_eq!(profile.effects.dot_mask, Some(DotMaskStyle::ShadowMask4x8));
    }

    #[test]
    fn overrides_land_on_top_of_the_preset() {
        let profile = MonitorProfile::from_toml_str(SAMPLE).unwrap();
        let options = profile.shader_options();
        let crt = ShaderOptions::crt();

        assert_eq!(options.enhancer, Enhancer::Epx);
        assert_eq!(options.scanlines, ScanlineMode::Embedded);
        assert!(close(options.bloom_radius, 1.0));
        assert!(close(options.bloom_weight, 1.5));
        assert!(close(options.dot_mask_brightness, 0.25));
        assert!(close(options.disalignment_h, 0.004));
        assert!(close(options.disalignment_v, 0.0));
        // Untouched settings keep the preset's values.
        assert_eq!(options.bloom, crt.bloom);
        assert_eq!(options.blur_radius, crt.blur_radius);
        assert_eq!(options.flicker_weight, crt.flicker_weight);
    }

    #[test]
    fn empty_profile_is_the_tft_preset() {
        let profile = MonitorProfile::from_toml_str("version = 1").unwrap();
        assert_eq!(profile.shader_options(), ShaderOptions::tft());
        assert_eq!(profile.gpu_settings(), GpuSettings::default());
        assert_eq!(profile.fade.duration, Duration::from_millis(500));
        assert_eq!(profile.fade_frames(60.0), 30);
    }

    #[test]
    fn gpu_section_resolves() {
        let profile = MonitorProfile::from_toml_str(SAMPLE).unwrap();
        assert_eq!(
            profile.gpu_settings(),
            GpuSettings {
                power: GpuPowerPreference::High,
                vsync: false,
                frame_latency: 1,
            }
        );
        assert_eq!(profile.fade_frames(50.0), 75);
    }

    #[test]
    fn rejects_unsupported_version() {
        let err = MonitorProfile::from_toml_str("version = 2").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_slider_out_of_range() {
        let err = MonitorProfile::from_toml_str(
            r#"
version = 1

[effects]
scanline_weight = 1001
"#,
        )
        .unwrap_err();
        match err {
            ConfigError::Invalid(message) => assert!(message.contains("scanline_weight")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn rejects_unknown_gallery_entry() {
        let err = MonitorProfile::from_toml_str(
            r#"
version = 1

[effects]
dot_mask = 7
"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));

        let err = MonitorProfile::from_toml_str(
            r#"
version = 1

[effects]
enhancer = "hq2x"
"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));

        let err =
            MonitorProfile::from_toml_str("version = 1\n[effects]\nupscaler = 3\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn selects_xbr_by_name_or_index() {
        let profile = MonitorProfile::from_toml_str(
            r#"
version = 1

[effects]
enhancer = "XBR"
upscaler = 2
"#,
        )
        .expect("parse profile");
        let options = profile.shader_options();
        assert_eq!(options.enhancer, Enhancer::Xbr);
        assert_eq!(options.upscaler, Upscaler::Xbr);
    }

    #[test]
    fn rejects_long_fade_and_bad_latency() {
        let fade = MonitorProfile::from_toml_str("version = 1\n[fade]\nduration = 30\n");
        assert!(matches!(fade, Err(ConfigError::Invalid(_))));

        let latency = MonitorProfile::from_toml_str("version = 1\n[gpu]\nframe_latency = 0\n");
        assert!(matches!(latency, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn slider_ranges_map_both_ways() {
        assert!(close(BLOOM_BRIGHTNESS.value(0), 0.0));
        assert!(close(BLOOM_BRIGHTNESS.value(1000), 2.0));
        assert!(close(BLUR_RADIUS.value(300), 1.5));
        assert_eq!(BLUR_RADIUS.slider(1.5), 300);
        assert_eq!(DISALIGNMENT.slider(0.0), 500);
        assert!(close(UNIT.value(5000), 1.0));
    }
}
