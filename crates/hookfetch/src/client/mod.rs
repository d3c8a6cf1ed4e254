//! Client construction and the top-level request pipeline
//!
//! - `config`: serializable request defaults
//! - `builder`: [`ClientBuilder`] collecting plugins, transport and defaults
//! - `core`: [`Client`] and the three-phase execution

pub mod builder;
pub mod config;
pub mod core;

pub use builder::ClientBuilder;
pub use config::ClientConfig;
pub use self::core::Client;
