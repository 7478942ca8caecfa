//! Closure-backed listener.

use crate::listener::Listener;
use crate::ListenerError;

/// A listener that calls a closure for every frame.
///
/// Build one with [`listener_fn`].
pub struct FnListener<F> {
    name: String,
    f: F,
}

/// Creates a [`FnListener`] from a name and a closure.
///
/// # Example
///
/// ```
/// use audio_broadcast::{listener_fn, AudioFrame, Listener};
///
/// let meter = listener_fn("meter", |frame: &AudioFrame| {
///     let peak = frame
///         .channel(0)
///         .map_or(0.0, |s| s.iter().fold(0.0f32, |m, v| m.max(v.abs())));
///     println!("peak {peak}");
///     Ok(())
/// });
/// assert_eq!(Listener::<AudioFrame>::name(&meter), "meter");
/// ```
pub fn listener_fn<T, F>(name: impl Into<String>, f: F) -> FnListener<F>
where
    F: Fn(&T) -> Result<(), ListenerError> + Send + Sync,
{
    FnListener {
        name: name.into(),
        f,
    }
}

impl<T, F> Listener<T> for FnListener<F>
where
    F: Fn(&T) -> Result<(), ListenerError> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn consume(&self, item: &T) -> Result<(), ListenerError> {
        (self.f)(item)
    }
}
