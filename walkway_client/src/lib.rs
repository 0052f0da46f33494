mod client;
mod error;
mod retry;


pub use client::*;
pub use error::ClientError;
