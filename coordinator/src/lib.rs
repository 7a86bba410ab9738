pub use dfs_common::dfs;

pub mod config;
pub mod coordinator;
pub mod error;
pub mod liveness;
pub mod port_allocator;
pub mod push;
pub mod registry;
pub mod remote;
