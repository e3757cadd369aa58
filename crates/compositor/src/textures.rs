//! Fixed-size texture arena shared by every backend.
//!
//! All textures are sized from the field resolution once, at construction.
//! Stages address them through [`TextureId`] so there are no optional handles
//! to check on the hot path.

use std::ops::{Index, IndexMut};

use crate::types::{DEFAULT_FIELD_HEIGHT, DEFAULT_FIELD_WIDTH};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TextureId {
    LongField,
    ShortField,
    Merged,
    Enhanced,
    BloomR,
    BloomG,
    BloomB,
    Upscaled,
    Scanlined,
    /// Ping-pong target for separable blurs at merged resolution.
    ScratchMerged,
    /// Ping-pong target for separable blurs at output resolution.
    ScratchUpscaled,
}

impl TextureId {
    pub const ALL: [TextureId; 11] = [
        TextureId::LongField,
        TextureId::ShortField,
        TextureId::Merged,
        TextureId::Enhanced,
        TextureId::BloomR,
        TextureId::BloomG,
        TextureId::BloomB,
        TextureId::Upscaled,
        TextureId::Scanlined,
        TextureId::ScratchMerged,
        TextureId::ScratchUpscaled,
    ];

    pub const BLOOM: [TextureId; 3] = [TextureId::BloomR, TextureId::BloomG, TextureId::BloomB];

    fn slot(self) -> usize {
        self as usize
    }

    pub fn label(self) -> &'static str {
        match self {
            TextureId::LongField => "long field",
            TextureId::ShortField => "short field",
            TextureId::Merged => "merged",
            TextureId::Enhanced => "enhanced",
            TextureId::BloomR => "bloom r",
            TextureId::BloomG => "bloom g",
            TextureId::BloomB => "bloom b",
            TextureId::Upscaled => "upscaled",
            TextureId::Scanlined => "scanlined",
            TextureId::ScratchMerged => "scratch merged",
            TextureId::ScratchUpscaled => "scratch upscaled",
        }
    }

    /// Scratch texture of matching size used when blurring `self` in place.
    pub fn blur_scratch(self) -> Option<TextureId> {
        match self {
            TextureId::Merged
            | TextureId::Enhanced
            | TextureId::BloomR
            | TextureId::BloomG
            | TextureId::BloomB => Some(TextureId::ScratchMerged),
            TextureId::Upscaled | TextureId::Scanlined => Some(TextureId::ScratchUpscaled),
            _ => None,
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum LayoutError {
    #[error("field resolution must be non-zero, got {width}x{height}")]
    Empty { width: u32, height: u32 },
    #[error("{label} texture would be {width}x{height}, above the device limit of {limit}")]
    ExceedsLimit {
        label: &'static str,
        width: u32,
        height: u32,
        limit: u32,
    },
    #[error("field resolution {width}x{height} overflows the upscaled texture size")]
    Overflow { width: u32, height: u32 },
}

/// Texture dimensions derived from the field resolution.
///
/// Fields are `w x h`; the merged frame stacks both fields (`w x 2h`); the
/// upscaled frame doubles that again in both axes (`2w x 4h`).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TextureLayout {
    field_width: u32,
    field_height: u32,
}

impl TextureLayout {
    pub fn new(field_width: u32, field_height: u32) -> Result<Self, LayoutError> {
        if field_width == 0 || field_height == 0 {
            return Err(LayoutError::Empty {
                width: field_width,
                height: field_height,
            });
        }
        let overflow = || LayoutError::Overflow {
            width: field_width,
            height: field_height,
        };
        let upscaled_width = field_width.checked_mul(2).ok_or_else(overflow)?;
        let upscaled_height = field_height.checked_mul(4).ok_or_else(overflow)?;
        // Texel count of the largest texture must also be addressable.
        (upscaled_width as usize)
            .checked_mul(upscaled_height as usize)
            .ok_or_else(overflow)?;
        Ok(Self {
            field_width,
            field_height,
        })
    }

    pub fn field_size(&self) -> (u32, u32) {
        (self.field_width, self.field_height)
    }

    pub fn merged_size(&self) -> (u32, u32) {
        (self.field_width, self.field_height * 2)
    }

    pub fn upscaled_size(&self) -> (u32, u32) {
        (self.field_width * 2, self.field_height * 4)
    }

    pub fn extent(&self, id: TextureId) -> (u32, u32) {
        match id {
            TextureId::LongField | TextureId::ShortField => self.field_size(),
            TextureId::Merged
            | TextureId::Enhanced
            | TextureId::BloomR
            | TextureId::BloomG
            | TextureId::BloomB
            | TextureId::ScratchMerged => self.merged_size(),
            TextureId::Upscaled | TextureId::Scanlined | TextureId::ScratchUpscaled => {
                self.upscaled_size()
            }
        }
    }

    /// Rejects layouts whose largest texture would not fit on the device.
    pub fn check_limit(&self, max_dimension: u32) -> Result<(), LayoutError> {
        for id in TextureId::ALL {
            let (width, height) = self.extent(id);
            if width > max_dimension || height > max_dimension {
                return Err(LayoutError::ExceedsLimit {
                    label: id.label(),
                    width,
                    height,
                    limit: max_dimension,
                });
            }
        }
        Ok(())
    }
}

impl Default for TextureLayout {
    fn default() -> Self {
        Self {
            field_width: DEFAULT_FIELD_WIDTH,
            field_height: DEFAULT_FIELD_HEIGHT,
        }
    }
}

/// Arena holding one resource per [`TextureId`].
#[derive(Debug)]
pub struct TextureSet<T> {
    slots: Vec<T>,
}

impl<T> TextureSet<T> {
    /// Allocates every texture of `layout` through `create`.
    pub fn build(layout: &TextureLayout, mut create: impl FnMut(TextureId, (u32, u32)) -> T) -> Self {
        let slots = TextureId::ALL
            .iter()
            .map(|&id| create(id, layout.extent(id)))
            .collect();
        Self { slots }
    }

    pub fn iter(&self) -> impl Iterator<Item = (TextureId, &T)> {
        TextureId::ALL.iter().copied().zip(self.slots.iter())
    }

    /// Borrows two distinct slots at once, the first shared and the second mutable.
    pub fn pair_mut(&mut self, read: TextureId, write: TextureId) -> (&T, &mut T) {
        assert_ne!(read, write, "pair_mut requires distinct textures");
        let (r, w) = (read.slot(), write.slot());
        if r < w {
            let (head, tail) = self.slots.split_at_mut(w);
            (&head[r], &mut tail[0])
        } else {
            let (head, tail) = self.slots.split_at_mut(r);
            (&tail[0], &mut head[w])
        }
    }
}

impl<T> Index<TextureId> for TextureSet<T> {
    type Output = T;

    fn index(&self, id: TextureId) -> &T {
        &self.slots[id.slot()]
    }
}

impl<T> IndexMut<TextureId> for TextureSet<T> {
    fn index_mut(&mut self, id: TextureId) -> &mut T {
        &mut self.slots[id.slot()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_layout() {
        assert_eq!(
            TextureLayout::new(0, 10),
            Err(LayoutError::Empty {
                width: 0,
                height: 10
            })
        );
    }

    #[test]
    fn rejects_layouts_whose_upscaled_size_overflows() {
        assert_eq!(
            TextureLayout::new(u32::MAX, 2),
            Err(LayoutError::Overflow {
                width: u32::MAX,
                height: 2
            })
        );
        assert!(matches!(
            TextureLayout::new(2, u32::MAX / 2),
            Err(LayoutError::Overflow { .. })
        ));
        let widest = TextureLayout::new(u32::MAX / 2, 1).expect("largest width that doubles");
        assert_eq!(widest.upscaled_size(), (u32::MAX - 1, 4));
    }

    #[test]
    fn every_extent_is_a_multiple_of_the_field() {
        let layout = TextureLayout::new(12, 5).expect("layout");
        for id in TextureId::ALL {
            let (w, h) = layout.extent(id);
            assert_eq!(w % 12, 0, "{id:?} width");
            assert_eq!(h % 5, 0, "{id:?} height");
        }
        assert_eq!(layout.merged_size(), (12, 10));
        assert_eq!(layout.upscaled_size(), (24, 20));
    }

    #[test]
    fn default_layout_fits_common_devices() {
        let layout = TextureLayout::default();
        assert_eq!(layout.upscaled_size(), (2048, 1280));
        assert!(layout.check_limit(8192).is_ok());
        assert!(matches!(
            layout.check_limit(1024),
            Err(LayoutError::ExceedsLimit { .. })
        ));
    }

    #[test]
    fn arena_slots_follow_their_ids() {
        let layout = TextureLayout::new(4, 2).expect("layout");
        let mut set = TextureSet::build(&layout, |id, size| (id, size));
        assert_eq!(set[TextureId::Scanlined], (TextureId::Scanlined, (8, 8)));

        let (read, write) = set.pair_mut(TextureId::Upscaled, TextureId::Merged);
        assert_eq!(read.0, TextureId::Upscaled);
        write.1 = (0, 0);
        assert_eq!(set[TextureId::Merged].1, (0, 0));
    }

    #[test]
    fn blur_scratch_matches_size() {
        let layout = TextureLayout::default();
        for id in [TextureId::BloomG, TextureId::Upscaled] {
            let scratch = id.blur_scratch().expect("scratch");
            assert_eq!(layout.extent(id), layout.extent(scratch));
        }
        assert_eq!(TextureId::LongField.blur_scratch(), None);
    }
}
