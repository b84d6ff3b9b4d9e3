//! Realtime change feed over the Phoenix channel protocol.

mod channel;
mod protocol;

pub(crate) use channel::RealtimeSubscription;
