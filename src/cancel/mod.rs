//! Cooperative cancellation: sources mint shared state, tokens observe it,
//! registrations detach callbacks on scope exit.

mod state;
mod token;

pub(crate) use state::CancelState;
pub use token::{
    combine_tokens, CancellationRegistration, CancellationSource, CancellationToken, CombinedToken,
};
