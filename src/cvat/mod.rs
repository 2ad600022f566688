pub mod client;
pub mod models;

pub use client::{ClientOptions, CvatClient, RemoteError};
pub use models::TaskSpec;
