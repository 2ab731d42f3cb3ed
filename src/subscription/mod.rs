//! Cross-partition subscription routing.
//!
//! A business message is correlated to a workflow instance that may live on
//! another partition. The hash module decides which partition owns a
//! correlation key; the sender delivers the subscription protocol's
//! commands to that partition's current leader.

pub mod hash;
pub mod sender;

pub use hash::{partition_for_correlation_key, subscription_hash_code};
pub use sender::{Dispatch, SubscriptionCommandSender, SubscriptionError};
