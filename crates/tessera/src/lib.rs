//! Tessera: dynamically typed values allocated from per-world arenas.
//!
//! This is the top-level facade crate that re-exports the public API from
//! the Tessera sub-crates. Most users only need this one dependency.
//!
//! # Quick start
//!
//! ```rust
//! use tessera::prelude::*;
//!
//! let world = World::new(&WorldConfig::arena(1 << 20)).unwrap();
//!
//! let mut greeting = Value::new_str(&world, "hello world").unwrap();
//! greeting
//!     .as_string_mut()
//!     .replace(wide("world"), wide("friend"))
//!     .unwrap();
//! assert_eq!(greeting.as_string().to_string(), "hello friend");
//!
//! let scores = Value::new_dictionary(
//!     &world,
//!     ValueType::String,
//!     ValueType::Integer,
//!     [Value::new_pair(
//!         &world,
//!         Value::new_str(&world, "x").unwrap(),
//!         Value::new_integer(&world, Integer::I64(1)).unwrap(),
//!     )
//!     .unwrap()],
//! )
//! .unwrap();
//! assert_eq!(scores.as_dictionary().len(), 1);
//!
//! drop((greeting, scores));
//! world.destroy().unwrap();
//! ```
//!
//! # Modules
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`types`] | `tessera-core` | Type tags, scalar payloads, ids, errors, hashing, diagnostics |
//! | [`alloc`] | `tessera-arena` | Arena, host allocator, virtual memory |
//! | [`value`] | `tessera-value` | Worlds and values |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// Type tags, scalar payloads, errors and diagnostics (`tessera-core`).
///
/// The [`types::precondition!`] and [`types::soft_assert!`] macros report
/// misuse through `tracing`.
pub use tessera_core as types;

/// Allocator backends (`tessera-arena`).
///
/// [`alloc::Arena`] reserves address space once and commits pages on
/// demand; [`alloc::SysAlloc`] wraps the host allocator. Both sit behind
/// [`alloc::Allocator`].
pub use tessera_arena as alloc;

/// Worlds and values (`tessera-value`).
///
/// A [`value::World`] owns an allocator and a secret; [`value::Value`]
/// handles borrow it.
pub use tessera_value as value;

/// Common imports for typical Tessera usage.
///
/// ```rust
/// use tessera::prelude::*;
/// ```
pub mod prelude {
    // Worlds and configuration
    pub use tessera_arena::{AllocatorConfig, AllocatorKind, ArenaConfig};
    pub use tessera_value::{ArenaUsage, World, WorldConfig};

    // Values
    pub use tessera_value::{wide, Dictionary, List, Pair, Removed, Value, WideString};

    // Payload types
    pub use tessera_core::{
        Extended80, Floating, FloatingWidth, Integer, IntegerWidth, Signedness, ValueId,
        ValueType, WideChar,
    };

    // Errors
    pub use tessera_core::{AllocError, ConfigError, VmemError, WorldError};
}
