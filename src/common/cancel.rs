//! Cooperative cancellation for long-running compiles.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// A cloneable cancellation token.
///
/// The compiler polls the token before each chunk read on an import stream;
/// once triggered, the compile aborts with [`Error::Cancelled`].
///
/// [`Error::Cancelled`]: crate::Error::Cancelled
///
/// # Examples
///
/// ```
/// use xmlsilo::Cancellable;
///
/// let cancel = Cancellable::new();
/// assert!(!cancel.is_cancelled());
/// cancel.cancel();
/// assert!(cancel.is_cancelled());
/// ```
#[derive(Clone, Debug, Default)]
pub struct Cancellable {
    flag: Arc<AtomicBool>,
}

impl Cancellable {
    /// Create a token in the not-cancelled state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Trigger the token. All clones observe the cancellation.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    /// Whether the token has been triggered.
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}
