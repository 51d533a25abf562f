//! Link Module
//!
//! Carries encoded pose frames to the paired peer.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                   ConnectionManager                      │
//! │  (Owns the one outbound connection, driven by control)   │
//! └─────────────────────┬───────────────────────────────────┘
//!                       │
//!         ┌─────────────┼─────────────┐
//!         │             │             │
//!         ▼             ▼             ▼
//! ┌───────────┐  ┌────────────┐  ┌──────────┐
//! │ Discovery │  │ Connection │  │ Protocol │
//! │           │  │            │  │          │
//! │ - Pairing │  │ - TCP      │  │ - Frame  │
//! │   gate    │  │ - Local    │  │ - Byte   │
//! │           │  │   socket   │  │   order  │
//! └───────────┘  └────────────┘  └──────────┘
//! ```
//!
//! ## Modules
//!
//! - [`protocol`] - Wire frame layout and pose encoding
//! - [`discovery`] - Pairing gate consulted before connecting
//! - [`connection`] - Transports and the ready-tracked stream connection
//! - [`manager`] - Connection lifecycle coordinator

pub mod connection;
pub mod discovery;
pub mod manager;
pub mod protocol;

// Re-export main manager for convenience
pub use manager::ConnectionManager;
