//! Per-credential session cache.
//!
//! Sessions are keyed by (username, password, selector), live for a fixed
//! lifespan, and are rebuilt lazily on the first lookup after they expire.
//! Construction is serialized per key so racing requests authenticate once.

mod key;
mod layer;

pub use key::SessionKey;
pub use layer::SessionCache;
