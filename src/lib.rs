//! JsonServices - stateful JSON-RPC over WebSocket
//!
//! This is the main convenience crate that re-exports all jsonservices
//! sub-crates. Use it if you want a single dependency for the client, the
//! message types and the derive macro.
//!
//! # Architecture
//!
//! jsonservices is organized into modular crates:
//!
//! - **jsonservices-core**: envelopes, codec, error handling, message trait, observability
//! - **jsonservices-client**: connection engine, authentication, subscriptions, reconnection
//! - **jsonservices-macros**: `#[derive(Message)]`
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use jsonservices::{ClientBuilder, Message};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Serialize, Message)]
//! #[message(name = "Calculator.Add", response = Sum)]
//! struct Add {
//!     a: i32,
//!     b: i32,
//! }
//!
//! #[derive(Deserialize)]
//! struct Sum {
//!     value: i32,
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = ClientBuilder::new("ws://localhost:8765").connect().await?;
//!
//!     let sum = client.call(&Add { a: 5, b: 3 }).await?;
//!     println!("Result: {}", sum.value);
//!
//!     client.disconnect().await;
//!     Ok(())
//! }
//! ```

// Re-export all public APIs from sub-crates
pub use jsonservices_client as client;
pub use jsonservices_core as core;
pub use jsonservices_macros as macros;

// Convenience re-exports of the most commonly used types
pub use jsonservices_client::{ClientBuilder, JsonClient};
pub use jsonservices_macros::Message;
