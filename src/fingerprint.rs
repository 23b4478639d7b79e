//! Change detection for filter refreshes.
//!
//! Each filter picks the smallest set of inputs whose equality guarantees an
//! unchanged output and stores it in a [`FingerprintCache`]. The cache is
//! updated *before* recomputing, so an input that fails to process is not
//! retried on every refresh; it stays failed until something in the
//! fingerprint changes or the cache is invalidated.

/// Last fingerprint a filter committed to.
#[derive(Debug, Clone)]
pub struct FingerprintCache<K> {
    cached: Option<K>,
}

impl<K> Default for FingerprintCache<K> {
    fn default() -> Self {
        Self { cached: None }
    }
}

impl<K: PartialEq> FingerprintCache<K> {
    /// Empty cache; the first update always reports a change.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `current` and reports whether it differs from the previous
    /// fingerprint. A `false` return means the caller must not recompute.
    pub fn update(&mut self, current: K) -> bool {
        if self.matches(&current) {
            return false;
        }
        self.cached = Some(current);
        true
    }

    /// True when `current` equals the committed fingerprint.
    pub fn matches(&self, current: &K) -> bool {
        self.cached.as_ref() == Some(current)
    }

    /// Forget the stored fingerprint so the next update always reports a
    /// change.
    pub fn invalidate(&mut self) {
        self.cached = None;
    }

    /// Committed fingerprint, if any.
    pub fn cached(&self) -> Option<&K> {
        self.cached.as_ref()
    }
}
