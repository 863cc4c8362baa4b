//! Domain layer: entities, the two lifecycle state machines, commission math and ports.
//!
//! Nothing in here performs I/O. State machines mutate a record only after every
//! precondition has been checked, so a rejected operation never leaves a partial change.

macro_rules! record_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord,
            serde::Serialize, serde::Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

pub mod booking;
pub mod commission;
pub mod money;
pub mod notification;
pub mod party;
pub mod ports;
pub mod request;
pub mod transaction;
