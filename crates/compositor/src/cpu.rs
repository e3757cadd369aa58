//! Software reference backend.
//!
//! Runs every stage on RGBA8 byte buffers. It is slow but deterministic and
//! needs no device, which makes it the backend used by the test suite and by
//! headless snapshots.

use std::convert::Infallible;

use tracing::warn;

use crate::backend::{blur_radius, Backend, CompositeFrame, DrawGeometry};
use crate::dotmask::DotMask;
use crate::textures::{TextureId, TextureLayout, TextureSet};
use crate::types::{unpack_rgba, DotMaskStyle, Enhancer, ScanlineMode, Upscaler};
use crate::uniforms::{FilterUniforms, FragmentUniforms, MergeUniforms};

pub type Rgba = [u8; 4];

const TRANSPARENT: Rgba = [0, 0, 0, 0];

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CpuTexture {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<Rgba>,
}

impl CpuTexture {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![TRANSPARENT; width as usize * height as usize],
        }
    }

    fn empty() -> Self {
        Self {
            width: 0,
            height: 0,
            pixels: Vec::new(),
        }
    }

    pub fn get(&self, x: u32, y: u32) -> Rgba {
        self.pixels[(y * self.width + x) as usize]
    }

    /// Clamp-to-edge fetch for signed coordinates.
    pub fn fetch(&self, x: i64, y: i64) -> Rgba {
        let x = x.clamp(0, self.width as i64 - 1) as u32;
        let y = y.clamp(0, self.height as i64 - 1) as u32;
        self.get(x, y)
    }

    /// Nearest-neighbour sample at normalised coordinates.
    pub fn sample(&self, u: f32, v: f32) -> Rgba {
        let x = (u * self.width as f32).floor() as i64;
        let y = (v * self.height as f32).floor() as i64;
        self.fetch(x, y)
    }

    pub fn set(&mut self, x: u32, y: u32, value: Rgba) {
        let index = (y * self.width + x) as usize;
        self.pixels[index] = value;
    }

    pub fn row(&self, y: u32) -> &[Rgba] {
        let start = (y * self.width) as usize;
        &self.pixels[start..start + self.width as usize]
    }

    /// Raw bytes suitable for encoding as an image.
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.pixels)
    }

    fn fill_with(&mut self, mut f: impl FnMut(u32, u32) -> Rgba) {
        let width = self.width;
        for (index, pixel) in self.pixels.iter_mut().enumerate() {
            let x = index as u32 % width;
            let y = index as u32 / width;
            *pixel = f(x, y);
        }
    }
}

/// What the last composite call drew.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DrawRecord {
    pub geometry: DrawGeometry,
    pub vertex_count: u32,
    pub fragment: FragmentUniforms,
}

#[derive(Debug)]
pub struct CpuBackend {
    layout: TextureLayout,
    textures: TextureSet<CpuTexture>,
    dot_mask: DotMask,
    output: CpuTexture,
    uploads: u64,
    draws: u64,
    last_draw: Option<DrawRecord>,
}

impl CpuBackend {
    pub fn new(layout: TextureLayout, output_width: u32, output_height: u32) -> Self {
        Self {
            layout,
            textures: TextureSet::build(&layout, |_, (w, h)| CpuTexture::new(w, h)),
            dot_mask: DotMask::synthesize(DotMaskStyle::None, 1.0),
            output: CpuTexture::new(output_width.max(1), output_height.max(1)),
            uploads: 0,
            draws: 0,
            last_draw: None,
        }
    }

    /// Output sized to the upscaled texture, i.e. one texel per pixel.
    pub fn native(layout: TextureLayout) -> Self {
        let (w, h) = layout.upscaled_size();
        Self::new(layout, w, h)
    }

    pub fn texture(&self, id: TextureId) -> &CpuTexture {
        &self.textures[id]
    }

    pub fn texture_mut(&mut self, id: TextureId) -> &mut CpuTexture {
        &mut self.textures[id]
    }

    pub fn output(&self) -> &CpuTexture {
        &self.output
    }

    pub fn dot_mask(&self) -> &DotMask {
        &self.dot_mask
    }

    /// Number of field uploads performed so far.
    pub fn uploads(&self) -> u64 {
        self.uploads
    }

    pub fn draws(&self) -> u64 {
        self.draws
    }

    pub fn last_draw(&self) -> Option<&DrawRecord> {
        self.last_draw.as_ref()
    }

    /// Runs `render` with `target` detached from the arena so the closure can
    /// read every other texture while writing this one.
    fn render_into(
        &mut self,
        target: TextureId,
        render: impl FnOnce(&TextureSet<CpuTexture>, &mut CpuTexture),
    ) {
        let mut texture = std::mem::replace(&mut self.textures[target], CpuTexture::empty());
        render(&self.textures, &mut texture);
        self.textures[target] = texture;
    }
}

impl Backend for CpuBackend {
    type Error = Infallible;

    fn layout(&self) -> TextureLayout {
        self.layout
    }

    fn output_size(&self) -> (u32, u32) {
        (self.output.width, self.output.height)
    }

    fn upload(&mut self, target: TextureId, pixels: &[u32]) {
        let texture = &mut self.textures[target];
        debug_assert_eq!(
            pixels.len(),
            texture.pixels.len(),
            "upload into {} does not match its size",
            target.label()
        );
        for (dst, &src) in texture.pixels.iter_mut().zip(pixels) {
            *dst = unpack_rgba(src);
        }
        self.uploads += 1;
    }

    fn merge_interlaced(&mut self, scales: MergeUniforms) {
        self.render_into(TextureId::Merged, |set, merged| {
            let long = &set[TextureId::LongField];
            let short = &set[TextureId::ShortField];
            merged.fill_with(|x, y| {
                if y % 2 == 0 {
                    scale_rgb(long.get(x, y / 2), scales.long_scale)
                } else {
                    scale_rgb(short.get(x, y / 2), scales.short_scale)
                }
            });
        });
    }

    fn merge_bypass(&mut self, source: TextureId) {
        self.render_into(TextureId::Merged, |set, merged| {
            let field = &set[source];
            merged.fill_with(|x, y| field.get(x, y / 2));
        });
    }

    fn enhance(&mut self, enhancer: Enhancer) {
        self.render_into(TextureId::Enhanced, |set, enhanced| {
            let merged = &set[TextureId::Merged];
            match enhancer {
                Enhancer::Bypass => enhanced.pixels.copy_from_slice(&merged.pixels),
                Enhancer::Epx => enhanced.fill_with(|x, y| {
                    let (bx, by) = ((x / 2 * 2) as i64, (y / 2 * 2) as i64);
                    epx(
                        merged.fetch(bx, by),
                        merged.fetch(bx, by - 2),
                        merged.fetch(bx + 2, by),
                        merged.fetch(bx - 2, by),
                        merged.fetch(bx, by + 2),
                        x % 2,
                        y % 2,
                    )
                }),
                Enhancer::Xbr => enhanced.fill_with(|x, y| {
                    let (bx, by) = ((x / 2 * 2) as i64, (y / 2 * 2) as i64);
                    xbr(
                        |dx, dy| merged.fetch(bx + 2 * dx, by + 2 * dy),
                        corner_direction(x),
                        corner_direction(y),
                    )
                }),
            }
        });
    }

    fn split_bloom(&mut self, brightness: f32) {
        for (channel, id) in TextureId::BLOOM.into_iter().enumerate() {
            self.render_into(id, |set, bloom| {
                let merged = &set[TextureId::Merged];
                for (dst, src) in bloom.pixels.iter_mut().zip(&merged.pixels) {
                    let mut out = [0, 0, 0, 255];
                    out[channel] = scale_channel(src[channel], brightness);
                    *dst = out;
                }
            });
        }
    }

    fn blur(&mut self, target: TextureId, sigma: f32) {
        let radius = blur_radius(sigma);
        let Some(scratch) = target.blur_scratch() else {
            warn!(texture = target.label(), "texture has no blur scratch; skipping blur");
            return;
        };
        if radius == 0 {
            return;
        }
        let kernel = gaussian_kernel_q16(radius, sigma);
        {
            let (src, tmp) = self.textures.pair_mut(target, scratch);
            convolve_q16(src, tmp, &kernel, (1, 0));
        }
        let (tmp, dst) = self.textures.pair_mut(scratch, target);
        convolve_q16(tmp, dst, &kernel, (0, 1));
    }

    fn upscale(&mut self, upscaler: Upscaler) {
        self.render_into(TextureId::Upscaled, |set, upscaled| {
            let enhanced = &set[TextureId::Enhanced];
            match upscaler {
                Upscaler::Bypass => upscaled.fill_with(|x, y| enhanced.get(x / 2, y / 2)),
                Upscaler::Epx => upscaled.fill_with(|x, y| {
                    let (sx, sy) = ((x / 2) as i64, (y / 2) as i64);
                    epx(
                        enhanced.fetch(sx, sy),
                        enhanced.fetch(sx, sy - 1),
                        enhanced.fetch(sx + 1, sy),
                        enhanced.fetch(sx - 1, sy),
                        enhanced.fetch(sx, sy + 1),
                        x % 2,
                        y % 2,
                    )
                }),
                Upscaler::Xbr => upscaled.fill_with(|x, y| {
                    let (sx, sy) = ((x / 2) as i64, (y / 2) as i64);
                    xbr(
                        |dx, dy| enhanced.fetch(sx + dx, sy + dy),
                        corner_direction(x),
                        corner_direction(y),
                    )
                }),
            }
        });
    }

    fn apply_scanlines(&mut self, params: FilterUniforms) {
        let embedded = params.mode == ScanlineMode::Embedded.code();
        self.render_into(TextureId::Scanlined, |set, scanlined| {
            let upscaled = &set[TextureId::Upscaled];
            scanlined.fill_with(|x, y| {
                let color = upscaled.get(x, y);
                if embedded && y % 2 == 1 {
                    scale_rgb(color, scanline_attenuation(color, &params))
                } else {
                    color
                }
            });
        });
    }

    fn clear(&mut self, target: TextureId) {
        self.textures[target].pixels.fill(TRANSPARENT);
    }

    fn install_dot_mask(&mut self, mask: &DotMask) {
        self.dot_mask = mask.clone();
    }

    fn composite(&mut self, frame: &CompositeFrame) -> Result<(), Self::Error> {
        let uniforms = frame.fragment;
        let scanlined = &self.textures[TextureId::Scanlined];
        let bloom = TextureId::BLOOM.map(|id| &self.textures[id]);
        let mask = &self.dot_mask;
        let (width, height) = (self.output.width, self.output.height);
        let alpha = uniforms.alpha.clamp(0.0, 1.0);
        let white = uniforms.white.clamp(0.0, 1.0);
        let [shift_u, shift_v] = uniforms.disalignment;

        // Every geometry is rasterised as the viewer-facing rectangle; the
        // resting cube's front face covers the viewport exactly.
        self.output.fill_with(|x, y| {
            let u = (x as f32 + 0.5) / width as f32;
            let v = (y as f32 + 0.5) / height as f32;
            let mut rgb = [
                scanlined.sample(u + shift_u, v + shift_v)[0] as f32,
                scanlined.sample(u, v)[1] as f32,
                scanlined.sample(u - shift_u, v - shift_v)[2] as f32,
            ];
            if uniforms.bloom_enabled != 0 {
                for (channel, texture) in bloom.iter().enumerate() {
                    rgb[channel] += uniforms.bloom_weight * texture.sample(u, v)[channel] as f32;
                }
            }
            if uniforms.scanline_mode == ScanlineMode::Effective.code()
                && uniforms.scanline_distance > 0
                && (y as i32 / uniforms.scanline_distance) % 2 == 1
            {
                rgb.iter_mut()
                    .for_each(|c| *c *= uniforms.scanline_brightness);
            }
            if uniforms.dot_mask_enabled != 0 {
                let texel = mask.sample(x, y);
                for (c, m) in rgb.iter_mut().zip(texel) {
                    *c *= m as f32 / 255.0;
                }
            }
            let out = rgb.map(|c| {
                let c = c.clamp(0.0, 255.0);
                ((c + (255.0 - c) * white) * alpha).round() as u8
            });
            [out[0], out[1], out[2], (alpha * 255.0).round() as u8]
        });

        let range = frame.geometry.vertex_range();
        self.draws += 1;
        self.last_draw = Some(DrawRecord {
            geometry: frame.geometry,
            vertex_count: range.end - range.start,
            fragment: uniforms,
        });
        Ok(())
    }
}

fn scale_channel(value: u8, scale: f32) -> u8 {
    (value as f32 * scale).round().clamp(0.0, 255.0) as u8
}

fn scale_rgb(pixel: Rgba, scale: f32) -> Rgba {
    [
        scale_channel(pixel[0], scale),
        scale_channel(pixel[1], scale),
        scale_channel(pixel[2], scale),
        pixel[3],
    ]
}

/// Brighter pixels bleed further into the gap between two scanlines.
fn scanline_attenuation(pixel: Rgba, params: &FilterUniforms) -> f32 {
    let luma =
        (0.299 * pixel[0] as f32 + 0.587 * pixel[1] as f32 + 0.114 * pixel[2] as f32) / 255.0;
    (params.brightness + params.weight * luma).clamp(0.0, 1.0)
}

/// EPX selection for sub-pixel `(sx, sy)` of centre `p` with neighbours
/// above `a`, right `b`, left `c` and below `d`.
fn epx(p: Rgba, a: Rgba, b: Rgba, c: Rgba, d: Rgba, sx: u32, sy: u32) -> Rgba {
    match (sx, sy) {
        (0, 0) if c == a && c != d && a != b => a,
        (1, 0) if a == b && a != c && b != d => b,
        (0, 1) if d == c && d != b && c != a => c,
        (1, 1) if b == d && b != a && d != c => d,
        _ => p,
    }
}

/// Sub-pixel `0` faces the lower neighbour, `1` the upper one.
fn corner_direction(coordinate: u32) -> i64 {
    if coordinate % 2 == 0 {
        -1
    } else {
        1
    }
}

/// Colour distance in YUV, weighted towards luma the way xBR compares pixels.
fn yuv_distance(a: Rgba, b: Rgba) -> f32 {
    let [r, g, bl] = [0, 1, 2].map(|c| a[c] as f32 - b[c] as f32);
    let y = 0.299 * r + 0.587 * g + 0.114 * bl;
    let u = -0.169 * r - 0.331 * g + 0.5 * bl;
    let v = 0.5 * r - 0.419 * g - 0.081 * bl;
    48.0 * y.abs() + 7.0 * u.abs() + 6.0 * v.abs()
}

/// 2xBR value for the corner of centre pixel `e` that faces `(dx, dy)`.
///
/// `at(ox, oy)` returns the source pixel at offset `(ox, oy)` from `e`. With
/// `f` the horizontal and `h` the vertical neighbour on the corner's side,
/// the corner is blended halfway towards the closer of the two when the
/// edge running through `f` and `h` is weaker than the one through `e`.
fn xbr(at: impl Fn(i64, i64) -> Rgba, dx: i64, dy: i64) -> Rgba {
    let e = at(0, 0);
    let f = at(dx, 0);
    let h = at(0, dy);
    if e == f || e == h {
        return e;
    }
    let b = at(0, -dy);
    let c = at(dx, -dy);
    let d = at(-dx, 0);
    let g = at(-dx, dy);
    let i = at(dx, dy);

    let across = yuv_distance(e, c) + yuv_distance(e, g) + 4.0 * yuv_distance(h, f);
    let along = yuv_distance(h, d) + yuv_distance(f, b) + 4.0 * yuv_distance(e, i);
    if across >= along {
        return e;
    }
    let edge = if yuv_distance(e, f) <= yuv_distance(e, h) {
        f
    } else {
        h
    };
    std::array::from_fn(|c| ((u16::from(e[c]) + u16::from(edge[c]) + 1) / 2) as u8)
}

fn gaussian_kernel_q16(radius: u32, sigma: f32) -> Vec<u32> {
    let r = radius as i32;
    let denom = 2.0 * sigma as f64 * sigma as f64;
    let weights_f: Vec<f64> = (-r..=r)
        .map(|i| (-(i as f64) * (i as f64) / denom).exp())
        .collect();
    let sum: f64 = weights_f.iter().sum();

    let mut weights: Vec<u32> = weights_f
        .iter()
        .map(|w| ((w / sum) * 65536.0).round().clamp(0.0, 65536.0) as u32)
        .collect();
    let acc: i64 = weights.iter().map(|&w| i64::from(w)).sum();
    let delta = 65536 - acc;
    if delta != 0 {
        let mid = weights.len() / 2;
        weights[mid] = (i64::from(weights[mid]) + delta).clamp(0, 65536) as u32;
    }
    weights
}

fn convolve_q16(src: &CpuTexture, dst: &mut CpuTexture, kernel: &[u32], step: (i64, i64)) {
    let radius = (kernel.len() / 2) as i64;
    dst.fill_with(|x, y| {
        let mut acc = [0u64; 4];
        for (ki, &kw) in kernel.iter().enumerate() {
            let offset = ki as i64 - radius;
            let texel = src.fetch(x as i64 + offset * step.0, y as i64 + offset * step.1);
            for c in 0..4 {
                acc[c] += u64::from(kw) * u64::from(texel[c]);
            }
        }
        acc.map(q16_to_u8)
    });
}

fn q16_to_u8(acc: u64) -> u8 {
    ((acc + 32768) >> 16).min(255) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::pack_rgba;

    fn layout() -> TextureLayout {
        TextureLayout::new(4, 2).expect("layout")
    }

    fn packed(width: u32, height: u32, f: impl Fn(u32, u32) -> Rgba) -> Vec<u32> {
        (0..height)
            .flat_map(|y| (0..width).map(move |x| (x, y)))
            .map(|(x, y)| {
                let [r, g, b, a] = f(x, y);
                pack_rgba(r, g, b, a)
            })
            .collect()
    }

    #[test]
    fn interlaced_merge_weights_alternate_rows() {
        let mut cpu = CpuBackend::native(layout());
        cpu.upload(TextureId::LongField, &packed(4, 2, |_, _| [200, 100, 40, 255]));
        cpu.upload(TextureId::ShortField, &packed(4, 2, |_, _| [80, 60, 20, 255]));
        cpu.merge_interlaced(MergeUniforms::new(0.5, 1.0));

        let merged = cpu.texture(TextureId::Merged);
        assert_eq!(merged.height, 4);
        assert_eq!(merged.get(0, 0), [100, 50, 20, 255]);
        assert_eq!(merged.get(3, 1), [80, 60, 20, 255]);
        assert_eq!(merged.get(2, 2), [100, 50, 20, 255]);
        assert_eq!(cpu.uploads(), 2);
    }

    #[test]
    fn bypass_merge_line_doubles() {
        let mut cpu = CpuBackend::native(layout());
        cpu.upload(TextureId::ShortField, &packed(4, 2, |x, y| [x as u8, y as u8, 0, 255]));
        cpu.merge_bypass(TextureId::ShortField);
        let merged = cpu.texture(TextureId::Merged);
        assert_eq!(merged.row(0), merged.row(1));
        assert_eq!(merged.get(3, 2), [3, 1, 0, 255]);
    }

    #[test]
    fn epx_rounds_a_diagonal_staircase() {
        let black = [0, 0, 0, 255];
        let white = [255, 255, 255, 255];
        // C == A (both white) while D and B are black: top-left takes A.
        assert_eq!(epx(black, white, black, white, black, 0, 0), white);
        assert_eq!(epx(black, white, black, white, black, 1, 1), black);
        // Flat areas stay flat.
        assert_eq!(epx(white, white, white, white, white, 1, 0), white);
    }

    #[test]
    fn bypass_upscale_replicates_pixels() {
        let mut cpu = CpuBackend::native(layout());
        cpu.upload(TextureId::LongField, &packed(4, 2, |x, _| [x as u8 * 10, 0, 0, 255]));
        cpu.merge_bypass(TextureId::LongField);
        cpu.enhance(Enhancer::Bypass);
        cpu.upscale(Upscaler::Bypass);
        let up = cpu.texture(TextureId::Upscaled);
        assert_eq!((up.width, up.height), (8, 8));
        assert_eq!(up.get(6, 0), [30, 0, 0, 255]);
        assert_eq!(up.get(7, 7), [30, 0, 0, 255]);
    }

    const WHITE: Rgba = [255, 255, 255, 255];
    const BLACK: Rgba = [0, 0, 0, 255];
    const GREY: Rgba = [128, 128, 128, 255];

    /// Enhanced texture (4x4) split along the anti-diagonal: white above it, black below.
    fn staircase(cpu: &mut CpuBackend) {
        let enhanced = cpu.texture_mut(TextureId::Enhanced);
        enhanced.fill_with(|x, y| if x + y < 3 { WHITE } else { BLACK });
    }

    #[test]
    fn xbr_upscale_blends_corners_along_a_diagonal_edge() {
        let mut cpu = CpuBackend::native(layout());
        staircase(&mut cpu);
        cpu.upscale(Upscaler::Xbr);
        let up = cpu.texture(TextureId::Upscaled);

        // White (1, 1): the corner facing the black region is blended.
        assert_eq!(up.get(3, 3), GREY);
        assert_eq!(up.get(2, 2), WHITE);
        assert_eq!(up.get(3, 2), WHITE);
        // Black (2, 1): the corner facing the white region is blended.
        assert_eq!(up.get(4, 2), GREY);
        assert_eq!(up.get(5, 3), BLACK);
        // Away from the edge nothing changes.
        assert_eq!(up.get(0, 0), WHITE);
        assert_eq!(up.get(7, 7), BLACK);

        // EPX snaps the same corner to black instead of blending it.
        cpu.upscale(Upscaler::Epx);
        assert_eq!(cpu.texture(TextureId::Upscaled).get(3, 3), BLACK);
    }

    #[test]
    fn xbr_keeps_straight_edges_sharp() {
        let mut cpu = CpuBackend::native(layout());
        cpu.texture_mut(TextureId::Enhanced)
            .fill_with(|x, _| if x < 2 { WHITE } else { BLACK });
        cpu.upscale(Upscaler::Xbr);
        let up = cpu.texture(TextureId::Upscaled);
        for y in 0..8 {
            assert_eq!(up.get(3, y), WHITE);
            assert_eq!(up.get(4, y), BLACK);
        }
    }

    #[test]
    fn xbr_enhancer_works_on_two_by_two_blocks() {
        let mut cpu = CpuBackend::native(layout());
        // One white block in the top-left corner of a black merged frame.
        cpu.texture_mut(TextureId::Merged)
            .fill_with(|x, y| if x < 2 && y < 2 { WHITE } else { BLACK });
        cpu.enhance(Enhancer::Xbr);
        let enhanced = cpu.texture(TextureId::Enhanced);
        assert_eq!(enhanced.get(1, 1), GREY);
        assert_eq!(enhanced.get(0, 0), WHITE);
        assert_eq!(enhanced.get(1, 0), WHITE);
        assert_eq!(enhanced.get(0, 1), WHITE);
        assert_eq!(enhanced.get(2, 2), BLACK);
    }

    #[test]
    fn kernel_weights_sum_to_one() {
        let kernel = gaussian_kernel_q16(5, 1.5);
        assert_eq!(kernel.len(), 11);
        assert_eq!(kernel.iter().map(|&w| w as u64).sum::<u64>(), 65536);
        assert!(kernel[5] > kernel[0]);
    }

    #[test]
    fn blur_preserves_flat_fields_and_spreads_spikes() {
        let mut cpu = CpuBackend::native(layout());
        cpu.texture_mut(TextureId::BloomR).pixels.fill([120, 0, 0, 255]);
        cpu.blur(TextureId::BloomR, 2.0);
        assert!(cpu
            .texture(TextureId::BloomR)
            .pixels
            .iter()
            .all(|&p| p == [120, 0, 0, 255]));

        let bloom = cpu.texture_mut(TextureId::BloomG);
        bloom.pixels.fill([0, 0, 0, 255]);
        bloom.set(2, 2, [0, 255, 0, 255]);
        cpu.blur(TextureId::BloomG, 1.0);
        let blurred = cpu.texture(TextureId::BloomG);
        assert!(blurred.get(2, 2)[1] < 255);
        assert!(blurred.get(1, 2)[1] > 0);
    }

    #[test]
    fn embedded_scanlines_darken_odd_rows() {
        let mut cpu = CpuBackend::native(layout());
        cpu.texture_mut(TextureId::Upscaled).pixels.fill([100, 100, 100, 255]);
        cpu.apply_scanlines(FilterUniforms {
            brightness: 0.5,
            weight: 0.0,
            mode: ScanlineMode::Embedded.code(),
            padding: 0.0,
        });
        let out = cpu.texture(TextureId::Scanlined);
        assert_eq!(out.get(0, 0), [100, 100, 100, 255]);
        assert_eq!(out.get(0, 1), [50, 50, 50, 255]);

        cpu.apply_scanlines(FilterUniforms {
            brightness: 0.5,
            weight: 0.0,
            mode: ScanlineMode::Effective.code(),
            padding: 0.0,
        });
        assert_eq!(cpu.texture(TextureId::Scanlined).get(0, 1), [100, 100, 100, 255]);
    }

    #[test]
    fn composite_applies_alpha_and_records_draw() {
        let mut cpu = CpuBackend::native(layout());
        cpu.texture_mut(TextureId::Scanlined).pixels.fill([200, 100, 50, 255]);
        let frame = CompositeFrame {
            geometry: DrawGeometry::CubeAll,
            vertex: Default::default(),
            fragment: FragmentUniforms {
                alpha: 0.5,
                ..FragmentUniforms::default()
            },
        };
        cpu.composite(&frame).expect("composite");
        assert_eq!(cpu.output().get(0, 0), [100, 50, 25, 128]);
        let record = cpu.last_draw().expect("draw");
        assert_eq!(record.vertex_count, 36);
        assert_eq!(cpu.draws(), 1);
    }

    #[test]
    fn composite_mixes_towards_white_before_alpha() {
        let mut cpu = CpuBackend::native(layout());
        cpu.texture_mut(TextureId::Scanlined).pixels.fill([200, 100, 50, 255]);
        let mut frame = CompositeFrame {
            geometry: DrawGeometry::Flat,
            vertex: Default::default(),
            fragment: FragmentUniforms {
                white: 0.5,
                ..FragmentUniforms::default()
            },
        };
        cpu.composite(&frame).expect("composite");
        assert_eq!(cpu.output().get(0, 0), [228, 178, 153, 255]);

        frame.fragment.white = 1.0;
        frame.fragment.alpha = 0.5;
        cpu.composite(&frame).expect("composite");
        assert_eq!(cpu.output().get(3, 5), [128, 128, 128, 128]);
    }
}
