pub mod client;
pub mod models;

pub use client::UcpClient;
pub use models::*;
