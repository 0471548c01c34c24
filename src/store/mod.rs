//! The thread store and the pieces it is built from.

mod clock;
mod debounce;
mod state;
mod thread_store;

pub use clock::{Clock, SystemClock};
pub use debounce::Debouncer;
pub use state::StoreState;
pub use thread_store::ThreadStore;
