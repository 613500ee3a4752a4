use std::sync::{Arc, RwLock};

use crate::types::{ColorEstimate, GestureLabel};

#[derive(Clone, Debug)]
struct Signals {
    gesture: GestureLabel,
    color: ColorEstimate,
}

/// Latest-value holder bridging the analysis thread and subscriber tasks.
///
/// One writer (the analysis loop) replaces whole signal values; any number of
/// readers copy them out. The critical section is a clone of at most one
/// short string, so readers and the writer never hold each other up for
/// longer than that.
#[derive(Clone)]
pub struct SignalStore {
    inner: Arc<RwLock<Signals>>,
}

impl SignalStore {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(Signals {
                gesture: GestureLabel::Waiting,
                color: ColorEstimate::Unknown,
            })),
        }
    }

    /// Replaces the given fields under a single lock acquisition. A reader
    /// sees either the state before this call or after it, never a mix.
    pub fn set(&self, gesture: Option<GestureLabel>, color: Option<ColorEstimate>) {
        let mut signals = self.inner.write().expect("signal store poisoned");
        if let Some(gesture) = gesture {
            signals.gesture = gesture;
        }
        if let Some(color) = color {
            signals.color = color;
        }
    }

    pub fn gesture(&self) -> GestureLabel {
        self.inner.read().expect("signal store poisoned").gesture
    }

    pub fn color(&self) -> ColorEstimate {
        self.inner.read().expect("signal store poisoned").color.clone()
    }
}

impl Default for SignalStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_with_neutral_sentinels() {
        let store = SignalStore::new();
        assert_eq!(store.gesture(), GestureLabel::Waiting);
        assert_eq!(store.color(), ColorEstimate::Unknown);
    }

    #[test]
    fn set_replaces_both_fields() {
        let store = SignalStore::new();
        store.set(
            Some(GestureLabel::ThumbsUp),
            Some(ColorEstimate::Hex("#112233".into())),
        );
        assert_eq!(store.gesture(), GestureLabel::ThumbsUp);
        assert_eq!(store.color(), ColorEstimate::Hex("#112233".into()));
    }

    #[test]
    fn set_with_none_leaves_field_untouched() {
        let store = SignalStore::new();
        store.set(Some(GestureLabel::LeftHand), None);
        assert_eq!(store.gesture(), GestureLabel::LeftHand);
        assert_eq!(store.color(), ColorEstimate::Unknown);

        store.set(None, Some(ColorEstimate::Error));
        assert_eq!(store.gesture(), GestureLabel::LeftHand);
        assert_eq!(store.color(), ColorEstimate::Error);
    }

    #[test]
    fn clones_share_state() {
        let store = SignalStore::new();
        let reader = store.clone();
        store.set(Some(GestureLabel::RightHand), None);
        assert_eq!(reader.gesture(), GestureLabel::RightHand);
    }
}
