//! Object store abstraction
//!
//! The platform's object store is an external collaborator. The engine talks
//! to it through [`ObjectStore`]; transformers only get the read half via
//! [`ReadonlyClient`]. [`InMemoryStore`] backs tests and the demo binary.

pub mod client;
pub mod memory;

pub use client::{DeleteOptions, LabelSelector, ObjectStore, ReadonlyClient, StoreError};
pub use memory::InMemoryStore;
