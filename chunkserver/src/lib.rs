pub use dfs_common::dfs;

pub mod chunkserver;
pub mod config;
pub mod error;
pub mod registration;
