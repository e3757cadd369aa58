//! Synthetic field producer standing in for an emulation core.
//!
//! Patterns are defined on the full interlaced frame (twice the field height);
//! long fields carry the even lines and short fields the odd ones, so a merged
//! pair reconstructs the whole frame.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{Context, Result};
use compositor::{pack_rgba, LatestField, ScreenField};
use crossbeam_channel::{bounded, select, tick, Sender};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PatternKind {
    Bars,
    Checker,
    Ramp,
}

const BARS: [[u8; 3]; 8] = [
    [235, 235, 235],
    [235, 235, 16],
    [16, 235, 235],
    [16, 235, 16],
    [235, 16, 235],
    [235, 16, 16],
    [16, 16, 235],
    [16, 16, 16],
];

const CHECKER_CELL: u32 = 8;

impl PatternKind {
    /// Colour of frame pixel `(x, y)` in frame number `frame`.
    fn pixel(self, x: u32, y: u32, width: u32, frame_height: u32, frame: u64) -> [u8; 3] {
        match self {
            PatternKind::Bars => BARS[(x * BARS.len() as u32 / width.max(1)) as usize],
            PatternKind::Checker => {
                let shifted = x as u64 + frame / 2;
                let cell = shifted / CHECKER_CELL as u64 + (y / CHECKER_CELL) as u64;
                if cell % 2 == 0 {
                    [255, 255, 255]
                } else {
                    [0, 0, 0]
                }
            }
            PatternKind::Ramp => {
                let level = (x * 255 / width.saturating_sub(1).max(1)) as u8;
                let red = (y * 255 / frame_height.saturating_sub(1).max(1)) as u8;
                [red, level, level]
            }
        }
    }
}

/// Renders one field of `kind`; `index` counts fields since start-up.
pub fn field(kind: PatternKind, size: (u32, u32), index: u64) -> ScreenField {
    let (width, height) = size;
    let is_long = index % 2 == 0;
    let parity = u32::from(!is_long);
    let frame = index / 2;
    let pixels = (0..height)
        .flat_map(|row| {
            let y = row * 2 + parity;
            (0..width).map(move |x| {
                let [r, g, b] = kind.pixel(x, y, width, height * 2, frame);
                pack_rgba(r, g, b, 255)
            })
        })
        .collect();
    ScreenField::new(width, height, pixels, is_long)
}

/// Background thread publishing fields into a [`LatestField`] at a fixed rate.
pub struct PatternProducer {
    stop: Sender<()>,
    handle: Option<JoinHandle<()>>,
}

impl PatternProducer {
    pub fn spawn(
        source: Arc<LatestField>,
        kind: PatternKind,
        size: (u32, u32),
        rate: f32,
    ) -> Result<Self> {
        let (stop, stop_rx) = bounded::<()>(0);
        let period = Duration::from_secs_f32(1.0 / rate.clamp(1.0, 1000.0));
        let handle = thread::Builder::new()
            .name("crtview-pattern".into())
            .spawn(move || {
                let ticker = tick(period);
                let mut index = 0u64;
                loop {
                    select! {
                        recv(ticker) -> _ => {
                            source.publish(field(kind, size, index));
                            index += 1;
                        }
                        recv(stop_rx) -> _ => break,
                    }
                }
                tracing::debug!(fields = index, "pattern producer stopped");
            })
            .context("failed to spawn pattern thread")?;
        tracing::info!(?kind, width = size.0, height = size.1, rate, "pattern producer started");
        Ok(Self {
            stop,
            handle: Some(handle),
        })
    }
}

impl Drop for PatternProducer {
    fn drop(&mut self) {
        let _ = self.stop.send(());
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::warn!("pattern thread panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use compositor::{unpack_rgba, FieldSource};

    #[test]
    fn fields_alternate_parity() {
        let parities: Vec<bool> = (0..4)
            .map(|index| field(PatternKind::Bars, (16, 4), index).is_long())
            .collect();
        assert_eq!(parities, vec![true, false, true, false]);
    }

    #[test]
    fn bars_span_the_width() {
        let bars = field(PatternKind::Bars, (16, 2), 0);
        let first = unpack_rgba(bars.pixels()[0]);
        let last = unpack_rgba(bars.pixels()[15]);
        assert_eq!(first, [235, 235, 235, 255]);
        assert_eq!(last, [16, 16, 16, 255]);
    }

    #[test]
    fn long_and_short_fields_interleave_the_frame() {
        let long = field(PatternKind::Ramp, (4, 2), 0);
        let short = field(PatternKind::Ramp, (4, 2), 1);
        // Red follows the frame line: long rows are lines 0 and 2, short rows 1 and 3.
        let red = |f: &ScreenField, row: usize| unpack_rgba(f.pixels()[row * 4])[0];
        assert_eq!(red(&long, 0), 0);
        assert_eq!(red(&short, 0), 85);
        assert_eq!(red(&long, 1), 170);
        assert_eq!(red(&short, 1), 255);
    }

    #[test]
    fn producer_publishes_until_dropped() {
        let source = Arc::new(LatestField::new());
        let producer =
            PatternProducer::spawn(source.clone(), PatternKind::Checker, (8, 4), 500.0).unwrap();
        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while source.current_field().is_none() && std::time::Instant::now() < deadline {
            thread::sleep(Duration::from_millis(2));
        }
        drop(producer);
        let field = source.current_field().expect("a field was published");
        assert_eq!((field.width(), field.height()), (8, 4));
    }
}
