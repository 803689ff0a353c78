//! Classification policy and host contract.

pub mod classify;
pub mod contract;

pub use classify::classify;
pub use contract::HostContract;
