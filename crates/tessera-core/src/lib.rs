//! Core types for Tessera worlds.
//!
//! This is the leaf crate with zero internal dependencies. It defines the
//! vocabulary shared by the allocator and value crates: the value type tags
//! and scalar payloads, value identities, the error taxonomy, the keyed
//! 64-bit hash used for identities, and the diagnostics surface through
//! which precondition violations are reported.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod diagnostics;
pub mod error;
pub mod hash;
pub mod id;
pub mod types;

pub use error::{AllocError, ConfigError, VmemError, WorldError};
pub use hash::{KeyedHash64, Secret, SECRET_BYTES};
pub use id::ValueId;
pub use types::{
    Extended80, Floating, FloatingWidth, Integer, IntegerWidth, Signedness, ValueType, WideChar,
};
