//! CPU-side synthesis of the phosphor mask tile.

use tracing::debug;

use crate::types::DotMaskStyle;

/// A small RGBA8 tile repeated across the output by the composite pass.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DotMask {
    pub style: DotMaskStyle,
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<[u8; 4]>,
}

impl DotMask {
    /// Builds the tile for `style`; `brightness` in `0..=1` lifts the dark phosphors.
    pub fn synthesize(style: DotMaskStyle, brightness: f32) -> Self {
        let b = brightness.clamp(0.0, 1.0);
        let max = (85.0 + b * 170.0) as u8;
        let base = ((1.0 - b) * 85.0) as u8;
        let none = (30.0 + (1.0 - b) * 55.0) as u8;

        let r = [max, base, base, 255];
        let g = [base, max, base, 255];
        let bl = [base, base, max, 255];
        let m = [max, base, max, 255];
        let w = [max, max, max, 255];
        let n = [none, none, none, 255];

        let (width, height, pixels) = match style {
            DotMaskStyle::None => (1, 1, vec![w]),
            DotMaskStyle::ApertureGrille3 => (3, 1, vec![m, g, n]),
            DotMaskStyle::ApertureGrille4 => (4, 1, vec![r, g, bl, n]),
            DotMaskStyle::ShadowMask3x9 => (
                3,
                9,
                vec![
                    m, g, n, //
                    m, g, n, //
                    n, n, n, //
                    n, m, g, //
                    n, m, g, //
                    n, n, n, //
                    g, n, m, //
                    g, n, m, //
                    n, n, n,
                ],
            ),
            DotMaskStyle::ShadowMask4x8 => (
                4,
                8,
                vec![
                    r, g, bl, n, //
                    r, g, bl, n, //
                    r, g, bl, n, //
                    n, n, n, n, //
                    bl, n, r, g, //
                    bl, n, r, g, //
                    bl, n, r, g, //
                    n, n, n, n,
                ],
            ),
        };

        Self {
            style,
            width,
            height,
            pixels,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.pixels)
    }

    /// Sample at output pixel `(x, y)` with wrap-around tiling.
    pub fn sample(&self, x: u32, y: u32) -> [u8; 4] {
        let index = (y % self.height) * self.width + (x % self.width);
        self.pixels[index as usize]
    }
}

/// Remembers which tile is installed so it is only rebuilt on change.
#[derive(Debug, Default)]
pub struct DotMaskCache {
    key: Option<(DotMaskStyle, u32)>,
    size: (u32, u32),
    rebuilds: u64,
}

impl DotMaskCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a freshly synthesised mask when the selection differs from the
    /// installed one, `None` otherwise.
    pub fn refresh(&mut self, style: DotMaskStyle, brightness: f32) -> Option<DotMask> {
        let key = (style, brightness.to_bits());
        if self.key == Some(key) {
            return None;
        }
        let mask = DotMask::synthesize(style, brightness);
        self.key = Some(key);
        self.size = (mask.width, mask.height);
        self.rebuilds += 1;
        debug!(?style, brightness, rebuilds = self.rebuilds, "rebuilt dot mask");
        Some(mask)
    }

    /// Number of times a mask has been synthesised.
    pub fn rebuilds(&self) -> u64 {
        self.rebuilds
    }

    /// Dimensions of the installed tile, `(0, 0)` before the first build.
    pub fn size(&self) -> (u32, u32) {
        self.size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tile_sizes_match_their_patterns() {
        let expected = [(1, 1), (3, 1), (4, 1), (3, 9), (4, 8)];
        for (style, (w, h)) in DotMaskStyle::ALL.into_iter().zip(expected) {
            let mask = DotMask::synthesize(style, 0.5);
            assert_eq!((mask.width, mask.height), (w, h), "{style:?}");
            assert_eq!(mask.pixels.len(), (w * h) as usize);
        }
    }

    #[test]
    fn full_brightness_lifts_everything() {
        let mask = DotMask::synthesize(DotMaskStyle::ApertureGrille3, 1.0);
        assert_eq!(mask.pixels[0], [255, 0, 255, 255]);
        assert_eq!(mask.pixels[2], [30, 30, 30, 255]);
        let plain = DotMask::synthesize(DotMaskStyle::None, 1.0);
        assert_eq!(plain.pixels, vec![[255, 255, 255, 255]]);
    }

    #[test]
    fn sampling_wraps_across_the_tile() {
        let mask = DotMask::synthesize(DotMaskStyle::ApertureGrille4, 1.0);
        assert_eq!(mask.sample(0, 0), mask.sample(4, 7));
        assert_eq!(mask.sample(1, 0), [0, 255, 0, 255]);
        assert_eq!(mask.sample(6, 3), [0, 0, 255, 255]);
    }

    #[test]
    fn cache_only_rebuilds_on_change() {
        let mut cache = DotMaskCache::new();
        assert!(cache.refresh(DotMaskStyle::ShadowMask3x9, 0.5).is_some());
        assert!(cache.refresh(DotMaskStyle::ShadowMask3x9, 0.5).is_none());
        assert_eq!(cache.rebuilds(), 1);
        assert_eq!(cache.size(), (3, 9));

        assert!(cache.refresh(DotMaskStyle::ShadowMask3x9, 0.6).is_some());
        assert!(cache.refresh(DotMaskStyle::None, 0.6).is_some());
        assert_eq!(cache.rebuilds(), 3);
        assert_eq!(cache.size(), (1, 1));
    }
}
