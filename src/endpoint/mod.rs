//! Endpoint subsystem.
//!
//! # Data Flow
//! ```text
//! Startup:
//!     EndpointConfig[] (or code registration)
//!     → registry.rs (Endpoint + EndpointMethod + markers + handler)
//!     → frozen EndpointRegistry, shared via Arc
//!
//! Per request:
//!     /connect/{endpoint}/{method}
//!     → EndpointRegistry::lookup (public methods only)
//!     → MethodRef handed to the access checker
//! ```

pub mod registry;

pub use registry::{
    echo_handler, Endpoint, EndpointMethod, EndpointRegistry, MethodHandler, MethodRef, Visibility,
};
