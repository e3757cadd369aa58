use std::sync::atomic::{AtomicU64, Ordering};

/// Width of an emulator field in pixels when no explicit layout is requested.
pub const DEFAULT_FIELD_WIDTH: u32 = 1024;
/// Height of a single (long or short) field; the merged frame is twice as tall.
pub const DEFAULT_FIELD_HEIGHT: u32 = 320;

static NEXT_FIELD_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of a published field buffer.
///
/// Two fields compare equal only if they are the same publication; pixel
/// content is never inspected.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FieldId(u64);

impl FieldId {
    fn next() -> Self {
        Self(NEXT_FIELD_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

/// Packs an RGBA quadruple into the little-endian `u32` layout used by fields.
pub const fn pack_rgba(r: u8, g: u8, b: u8, a: u8) -> u32 {
    u32::from_le_bytes([r, g, b, a])
}

/// Splits a packed field sample back into its RGBA bytes.
pub const fn unpack_rgba(value: u32) -> [u8; 4] {
    value.to_le_bytes()
}

/// One half-frame (or full non-interlaced frame) produced by the video chip.
///
/// Fields are immutable once constructed. A producer that wants to publish
/// new pixels builds a new `ScreenField`, which receives a fresh [`FieldId`].
/// `ScreenField` is deliberately not `Clone` so a copy can never alias an
/// existing identity.
#[derive(Debug)]
pub struct ScreenField {
    id: FieldId,
    width: u32,
    height: u32,
    pixels: Vec<u32>,
    is_long: bool,
}

impl ScreenField {
    /// Wraps packed RGBA samples (see [`pack_rgba`]) in a new field.
    ///
    /// `pixels` must hold exactly `width * height` samples in row-major order.
    pub fn new(width: u32, height: u32, pixels: Vec<u32>, is_long: bool) -> Self {
        debug_assert_eq!(
            pixels.len(),
            width as usize * height as usize,
            "field pixel count does not match its dimensions"
        );
        Self {
            id: FieldId::next(),
            width,
            height,
            pixels,
            is_long,
        }
    }

    /// A field filled with a single colour.
    pub fn solid(width: u32, height: u32, rgba: u32, is_long: bool) -> Self {
        Self::new(
            width,
            height,
            vec![rgba; width as usize * height as usize],
            is_long,
        )
    }

    pub fn id(&self) -> FieldId {
        self.id
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn is_long(&self) -> bool {
        self.is_long
    }

    pub fn pixels(&self) -> &[u32] {
        &self.pixels
    }

    /// Raw RGBA8 bytes in upload order.
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.pixels)
    }
}

/// In-texture lowres enhancement applied to the merged frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Enhancer {
    #[default]
    Bypass,
    /// EPX applied to 2x2 blocks so lowres pixels gain smoothed diagonals.
    Epx,
    /// 2xBR edge blending on 2x2 blocks.
    Xbr,
}

impl Enhancer {
    pub const ALL: [Enhancer; 3] = [Enhancer::Bypass, Enhancer::Epx, Enhancer::Xbr];

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }
}

/// Second upscaling pass from the enhanced frame to output resolution.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Upscaler {
    /// Pixel replication (each sample becomes a 2x2 block).
    #[default]
    Bypass,
    /// EPX / Scale2x.
    Epx,
    /// 2xBR: corners facing a diagonal edge are blended with the edge colour.
    Xbr,
}

impl Upscaler {
    pub const ALL: [Upscaler; 3] = [Upscaler::Bypass, Upscaler::Epx, Upscaler::Xbr];

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }
}

/// Where (if anywhere) scanlines are emulated.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ScanlineMode {
    #[default]
    Off,
    /// Baked into the `scanlined` texture by the scanline stage.
    Embedded,
    /// Applied by the composite fragment shader at output resolution.
    Effective,
}

impl ScanlineMode {
    /// Integer code shared by the uniform blocks and kernels.
    pub fn code(self) -> i32 {
        match self {
            ScanlineMode::Off => 0,
            ScanlineMode::Embedded => 1,
            ScanlineMode::Effective => 2,
        }
    }

    pub fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(ScanlineMode::Off),
            1 => Some(ScanlineMode::Embedded),
            2 => Some(ScanlineMode::Effective),
            _ => None,
        }
    }
}

/// Phosphor pattern tiled over the output.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum DotMaskStyle {
    #[default]
    None,
    ApertureGrille3,
    ApertureGrille4,
    ShadowMask3x9,
    ShadowMask4x8,
}

impl DotMaskStyle {
    pub const ALL: [DotMaskStyle; 5] = [
        DotMaskStyle::None,
        DotMaskStyle::ApertureGrille3,
        DotMaskStyle::ApertureGrille4,
        DotMaskStyle::ShadowMask3x9,
        DotMaskStyle::ShadowMask4x8,
    ];

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn is_enabled(self) -> bool {
        self != DotMaskStyle::None
    }
}

/// Per-frame shader configuration.
///
/// The record is owned by whoever manages preferences; the frame driver copies
/// it once at the start of every frame so stages never observe a half-updated
/// set of values.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ShaderOptions {
    pub enhancer: Enhancer,
    pub upscaler: Upscaler,

    pub blur: bool,
    pub blur_radius: f32,

    pub bloom: bool,
    pub bloom_radius: f32,
    pub bloom_brightness: f32,
    pub bloom_weight: f32,

    pub flicker: bool,
    pub flicker_weight: f32,

    pub dot_mask: DotMaskStyle,
    pub dot_mask_brightness: f32,

    pub scanlines: ScanlineMode,
    pub scanline_brightness: f32,
    pub scanline_weight: f32,

    pub disalignment: bool,
    pub disalignment_h: f32,
    pub disalignment_v: f32,
}

impl ShaderOptions {
    /// Flat-panel look: every retro effect switched off.
    pub fn tft() -> Self {
        Self {
            enhancer: Enhancer::Bypass,
            upscaler: Upscaler::Bypass,
            blur: true,
            blur_radius: 0.0,
            bloom: false,
            bloom_radius: 1.0,
            bloom_brightness: 0.4,
            bloom_weight: 1.21,
            flicker: true,
            flicker_weight: 0.5,
            dot_mask: DotMaskStyle::None,
            dot_mask_brightness: 0.7,
            scanlines: ScanlineMode::Off,
            scanline_brightness: 0.55,
            scanline_weight: 0.11,
            disalignment: false,
            disalignment_h: 0.001,
            disalignment_v: 0.001,
        }
    }

    /// Tube look: bloom, blur, aperture grille and effective scanlines.
    pub fn crt() -> Self {
        Self {
            blur_radius: 1.5,
            bloom: true,
            dot_mask: DotMaskStyle::ApertureGrille3,
            dot_mask_brightness: 0.5,
            scanlines: ScanlineMode::Effective,
            ..Self::tft()
        }
    }

    /// Effective weight applied to the dimmed field of an interlace pair.
    pub fn flicker_scale(&self) -> f32 {
        if self.flicker {
            1.0 - self.flicker_weight
        } else {
            1.0
        }
    }
}

impl Default for ShaderOptions {
    fn default() -> Self {
        Self::tft()
    }
}

/// GPU adapter power preference.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum GpuPowerPreference {
    #[default]
    Low,
    High,
}

/// Construction-time knobs for the wgpu backend.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GpuSettings {
    pub power: GpuPowerPreference,
    pub vsync: bool,
    pub frame_latency: u32,
}

impl Default for GpuSettings {
    fn default() -> Self {
        Self {
            power: GpuPowerPreference::Low,
            vsync: true,
            frame_latency: 2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_field_gets_a_fresh_identity() {
        let a = ScreenField::solid(2, 2, 0, true);
        let b = ScreenField::solid(2, 2, 0, true);
        assert_ne!(a.id(), b.id());
        assert_eq!(a.pixels(), b.pixels());
    }

    #[test]
    fn packed_samples_round_trip_through_bytes() {
        let field = ScreenField::solid(1, 1, pack_rgba(10, 20, 30, 255), false);
        assert_eq!(field.as_bytes(), &[10, 20, 30, 255]);
        assert_eq!(unpack_rgba(field.pixels()[0]), [10, 20, 30, 255]);
    }

    #[test]
    fn flicker_scale_respects_toggle() {
        let mut options = ShaderOptions {
            flicker_weight: 0.25,
            ..ShaderOptions::default()
        };
        assert!((options.flicker_scale() - 0.75).abs() < f32::EPSILON);
        options.flicker = false;
        assert_eq!(options.flicker_scale(), 1.0);
    }

    #[test]
    fn gallery_indices_cover_every_algorithm() {
        assert_eq!(Enhancer::from_index(2), Some(Enhancer::Xbr));
        assert_eq!(Upscaler::from_index(2), Some(Upscaler::Xbr));
        assert_eq!(Upscaler::from_index(3), None);
    }

    #[test]
    fn crt_preset_turns_effects_on() {
        let crt = ShaderOptions::crt();
        assert!(crt.bloom);
        assert_eq!(crt.dot_mask, DotMaskStyle::ApertureGrille3);
        assert_eq!(crt.scanlines, ScanlineMode::Effective);
        assert!(!ShaderOptions::tft().bloom);
    }
}
