use std::fmt::{Debug, Formatter};
use std::sync::{Arc, Weak};
use std::thread;
use std::time::Duration;

use crate::cancel::CancelState;
use crate::error::{ErrorInfo, ErrorKind, TaskResult};

/// Owner of one cancellation state.
///
/// `cancel` flips the shared state exactly once; minting tokens shares the
/// state rather than copying it. Dropping the source does NOT cancel, tokens
/// minted from it stay valid and observable.
///
/// # Examples
/// ```
/// use carousel::CancellationSource;
///
/// let source = CancellationSource::new();
/// let token = source.token();
/// assert!(!token.is_cancelled());
/// assert!(source.cancel());
/// assert!(token.is_cancelled());
/// assert!(!source.cancel()); // second cancel is a no-op
/// ```
pub struct CancellationSource {
    state: Arc<CancelState>,
}

impl CancellationSource {
    pub fn new() -> Self {
        Self { state: Arc::new(CancelState::new()) }
    }

    /// Mint a token observing this source's state.
    pub fn token(&self) -> CancellationToken {
        CancellationToken { state: Some(self.state.clone()) }
    }

    /// Request cancellation. Returns true only on the call that performed
    /// the transition.
    pub fn cancel(&self) -> bool {
        self.state.cancel()
    }

    pub fn is_cancelled(&self) -> bool {
        self.state.is_cancelled()
    }
}

impl Default for CancellationSource {
    fn default() -> Self { Self::new() }
}

impl Debug for CancellationSource {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "CancellationSource[cancelled: {}]", self.is_cancelled())
    }
}

/// Cheap read-only observer of a cancellation state.
///
/// A token may also be empty ([`none`](#method.none)), which is never
/// cancelled. Cancellation is cooperative: flipping the state is immediately
/// visible, but running tasks only act on it at their next check point.
#[derive(Clone, Default)]
pub struct CancellationToken {
    state: Option<Arc<CancelState>>,
}

impl CancellationToken {
    /// Token without backing state, never cancelled.
    pub fn none() -> Self {
        Self { state: None }
    }

    /// Token that is already cancelled at construction.
    pub fn cancelled() -> Self {
        let state = Arc::new(CancelState::new());
        state.cancel();
        Self { state: Some(state) }
    }

    /// Token that becomes cancelled after `after` has elapsed.
    ///
    /// A detached timer thread performs the transition, so the token keeps
    /// working even when no runtime is alive.
    pub fn timeout(after: Duration) -> Self {
        let state = Arc::new(CancelState::new());
        let shared = state.clone();
        let spawned = thread::Builder::new()
            .name("carousel-timeout".into())
            .spawn(move || {
                thread::sleep(after);
                shared.cancel();
            });
        if spawned.is_err() {
            log::warn!("failed to spawn timeout thread, token will never cancel");
        }
        Self { state: Some(state) }
    }

    /// True when this token has a backing state.
    pub fn is_valid(&self) -> bool {
        self.state.is_some()
    }

    pub fn is_cancelled(&self) -> bool {
        self.state.as_ref().map_or(false, |state| state.is_cancelled())
    }

    /// Cooperative check point, surfaces `Cancelled` once the state flips.
    pub fn check(&self) -> TaskResult<()> {
        if self.is_cancelled() {
            Err(ErrorInfo::cancelled())
        } else {
            Ok(())
        }
    }

    /// Register a callback fired on cancellation.
    ///
    /// Fires exactly once: on the false→true transition when registered
    /// before it, immediately when registered after it. Dropping the returned
    /// registration disarms the callback. On an empty token the callback can
    /// never fire and an inert registration is returned.
    pub fn register_callback<F>(&self, callback: F) -> TaskResult<CancellationRegistration>
        where F: FnOnce() + Send + 'static {
        let state = match &self.state {
            Some(state) => state,
            None => return Ok(CancellationRegistration { inner: None }),
        };
        match state.register(Box::new(callback)) {
            Ok(index) => Ok(CancellationRegistration {
                inner: Some((Arc::downgrade(state), index)),
            }),
            Err(()) => Err(crate::runtime_error!(
                ErrorKind::ResourceExhausted,
                "cancellation callback slots are full"
            )),
        }
    }
}

impl Debug for CancellationToken {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.state {
            Some(state) => write!(f, "CancellationToken[cancelled: {}]", state.is_cancelled()),
            None => write!(f, "CancellationToken[none]"),
        }
    }
}

/// Scope guard for one registered cancellation callback.
///
/// Move-only. Disarms the callback when dropped or explicitly
/// [`unregister`](#method.unregister)ed; both are idempotent. The guard holds
/// only a weak reference, it never keeps the state alive.
pub struct CancellationRegistration {
    inner: Option<(Weak<CancelState>, usize)>,
}

impl CancellationRegistration {
    /// Disarm the callback. Safe to call any number of times.
    pub fn unregister(&mut self) {
        if let Some((state, index)) = self.inner.take() {
            if let Some(state) = state.upgrade() {
                state.unregister(index);
            }
        }
    }

    /// True while the registration still points at a live state.
    pub fn is_valid(&self) -> bool {
        self.inner.as_ref().map_or(false, |(state, _)| state.strong_count() != 0)
    }
}

impl Drop for CancellationRegistration {
    fn drop(&mut self) {
        self.unregister();
    }
}

impl Debug for CancellationRegistration {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "CancellationRegistration[valid: {}]", self.is_valid())
    }
}

/// Token derived from N inputs that cancels as soon as any input cancels.
///
/// Built with [`combine_tokens`](fn.combine_tokens.html). Collapses to
/// cancelled right away when some input is already cancelled.
pub struct CombinedToken {
    state: Arc<CancelState>,
    _registrations: Vec<CancellationRegistration>,
}

impl CombinedToken {
    /// Mint a plain token observing the combined state.
    pub fn token(&self) -> CancellationToken {
        CancellationToken { state: Some(self.state.clone()) }
    }

    pub fn is_cancelled(&self) -> bool {
        self.state.is_cancelled()
    }
}

impl Debug for CombinedToken {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "CombinedToken[cancelled: {}]", self.is_cancelled())
    }
}

/// Combine any number of tokens into one that cancels when any input does.
///
/// Inputs without backing state are skipped. When an input's callback
/// registry is already full its cancellation cannot be forwarded, which is
/// logged and skipped.
///
/// # Examples
/// ```
/// use carousel::{combine_tokens, CancellationSource};
///
/// let first = CancellationSource::new();
/// let second = CancellationSource::new();
/// let combined = combine_tokens(&[first.token(), second.token()]);
/// assert!(!combined.is_cancelled());
/// second.cancel();
/// assert!(combined.is_cancelled());
/// ```
pub fn combine_tokens(tokens: &[CancellationToken]) -> CombinedToken {
    let state = Arc::new(CancelState::new());
    let mut registrations = Vec::with_capacity(tokens.len());
    for token in tokens {
        if !token.is_valid() {
            continue;
        }
        let forward = state.clone();
        match token.register_callback(move || { forward.cancel(); }) {
            Ok(registration) => registrations.push(registration),
            Err(err) => log::warn!("cannot forward cancellation from input token: {}", err),
        }
        if token.is_cancelled() {
            state.cancel();
            break;
        }
    }
    CombinedToken { state, _registrations: registrations }
}
