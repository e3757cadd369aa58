use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::types::ScreenField;

/// Contract of the emulation core as seen from the render thread.
pub trait FieldSource {
    /// Most recently completed field, or `None` before the first one exists.
    fn current_field(&self) -> Option<Arc<ScreenField>>;

    /// Gates the noise placeholder.
    fn is_powered_off(&self) -> bool;
}

impl<T: FieldSource + ?Sized> FieldSource for Arc<T> {
    fn current_field(&self) -> Option<Arc<ScreenField>> {
        (**self).current_field()
    }

    fn is_powered_off(&self) -> bool {
        (**self).is_powered_off()
    }
}

/// Single-slot handoff between a producer thread and the render thread.
///
/// Producers publish whole fields; a published field is never mutated, so the
/// render thread can hold its `Arc` for the duration of an upload while the
/// producer moves on to the next buffer.
#[derive(Debug, Default)]
pub struct LatestField {
    slot: Mutex<Option<Arc<ScreenField>>>,
    powered_off: AtomicBool,
}

impl LatestField {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the slot content with `field`.
    pub fn publish(&self, field: ScreenField) {
        let field = Arc::new(field);
        match self.slot.lock() {
            Ok(mut guard) => *guard = Some(field),
            Err(poisoned) => *poisoned.into_inner() = Some(field),
        }
    }

    pub fn set_powered_off(&self, powered_off: bool) {
        self.powered_off.store(powered_off, Ordering::Release);
    }
}

impl FieldSource for LatestField {
    fn current_field(&self) -> Option<Arc<ScreenField>> {
        match self.slot.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn is_powered_off(&self) -> bool {
        self.powered_off.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_slot_reports_no_field() {
        let slot = LatestField::new();
        assert!(slot.current_field().is_none());
        assert!(!slot.is_powered_off());
    }

    #[test]
    fn repeated_reads_return_the_same_publication() {
        let slot = LatestField::new();
        slot.publish(ScreenField::solid(2, 1, 0, true));
        let first = slot.current_field().expect("field");
        let second = slot.current_field().expect("field");
        assert_eq!(first.id(), second.id());

        slot.publish(ScreenField::solid(2, 1, 0, true));
        let third = slot.current_field().expect("field");
        assert_ne!(first.id(), third.id());
    }

    #[test]
    fn publishing_from_another_thread_is_visible() {
        let slot = Arc::new(LatestField::new());
        let producer = Arc::clone(&slot);
        std::thread::spawn(move || {
            producer.publish(ScreenField::solid(1, 1, 7, false));
            producer.set_powered_off(true);
        })
        .join()
        .expect("producer thread");
        let field = slot.current_field().expect("field");
        assert!(!field.is_long());
        assert!(slot.is_powered_off());
    }
}
