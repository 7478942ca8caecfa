//! Configuration types for broadcast hubs.

/// Capacity used when a hub is asked for zero slots.
pub const DEFAULT_CAPACITY: usize = 32;

/// Configuration for a [`BroadcastHub`](crate::BroadcastHub).
///
/// Use [`HubConfig::default()`] for sensible defaults, or customize as needed.
///
/// # Example
///
/// ```
/// use audio_broadcast::HubConfig;
///
/// let config = HubConfig {
///     capacity: 8,
///     ..Default::default()
/// };
/// assert_eq!(config.effective_capacity(), 8);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HubConfig {
    /// Name used in logs, events and listener task names.
    ///
    /// Default: `"hub"`
    pub name: String,

    /// Number of slots in the ring.
    ///
    /// This bounds how far a listener may fall behind before the oldest
    /// frames it has not read are overwritten. A value of 0 is replaced by
    /// [`DEFAULT_CAPACITY`].
    /// Default: 32
    pub capacity: usize,
}

impl HubConfig {
    /// Creates a configuration with the given name and capacity.
    pub fn new(name: impl Into<String>, capacity: usize) -> Self {
        Self {
            name: name.into(),
            capacity,
        }
    }

    /// Returns the capacity the ring is actually built with.
    #[must_use]
    pub fn effective_capacity(&self) -> usize {
        normalize_capacity(self.capacity)
    }
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            name: "hub".to_string(),
            capacity: DEFAULT_CAPACITY,
        }
    }
}

/// Coerces a requested capacity of 0 to [`DEFAULT_CAPACITY`].
pub(crate) fn normalize_capacity(capacity: usize) -> usize {
    if capacity == 0 {
        DEFAULT_CAPACITY
    } else {
        capacity
    }
}
