//! Domain Layer
//!
//! Entities, value objects, ports and pure services. Nothing here performs
//! I/O directly; adapters implement the ports.

pub mod entities;
pub mod ports;
pub mod services;
pub mod value_objects;
