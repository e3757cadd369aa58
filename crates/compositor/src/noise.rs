use rand::prelude::*;

use crate::types::pack_rgba;

const BLACK: u32 = pack_rgba(0, 0, 0, 255);
const WHITE: u32 = pack_rgba(255, 255, 255, 255);

/// Static "no signal" snow shown while the machine is powered off.
///
/// One buffer twice the size of a field is filled once; every request returns
/// a field-sized window at a random offset, which is enough to make the
/// pattern crawl without regenerating pixels.
#[derive(Debug)]
pub struct NoiseSource {
    buffer: Vec<u32>,
    field_len: usize,
    rng: StdRng,
}

impl NoiseSource {
    pub fn new(field_width: u32, field_height: u32, seed: u64) -> Self {
        let field_len = field_width as usize * field_height as usize;
        let mut rng = StdRng::seed_from_u64(seed);
        let buffer = (0..field_len * 2)
            .map(|_| if rng.gen::<bool>() { WHITE } else { BLACK })
            .collect();
        Self {
            buffer,
            field_len,
            rng,
        }
    }

    /// Next field-sized window of noise.
    pub fn next_field(&mut self) -> &[u32] {
        let offset = self.rng.gen_range(0..=self.field_len);
        &self.buffer[offset..offset + self.field_len]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn windows_are_field_sized_and_monochrome() {
        let mut noise = NoiseSource::new(8, 4, 7);
        for _ in 0..16 {
            let window = noise.next_field();
            assert_eq!(window.len(), 32);
            assert!(window.iter().all(|&p| p == BLACK || p == WHITE));
        }
    }

    #[test]
    fn same_seed_gives_same_sequence() {
        let mut a = NoiseSource::new(16, 16, 42);
        let mut b = NoiseSource::new(16, 16, 42);
        assert_eq!(a.next_field(), b.next_field());
        assert_eq!(a.next_field(), b.next_field());
    }

    #[test]
    fn buffer_contains_both_colours() {
        let mut noise = NoiseSource::new(32, 32, 1);
        let window = noise.next_field();
        assert!(window.contains(&BLACK));
        assert!(window.contains(&WHITE));
    }
}
