//! Worlds and the tagged values rooted in them.
//!
//! A [`World`] owns one allocator and one hashing secret. Every [`Value`]
//! borrows its world and lives in memory taken from the world's allocator:
//!
//! ```text
//! World
//! ├── Allocator (auto or arena)
//! ├── Secret    (keys both value identities)
//! └── Value<'w> ── node: Payload
//!     ├── Boolean / Integer / Floating
//!     ├── String     WideString: zero-terminated code units
//!     ├── Pair       two owned children
//!     ├── List       owned children of one declared item type
//!     └── Dictionary List of Pair(hashed key, Pair(key, value))
//! ```
//!
//! Containers own their children exclusively. Dropping a value frees its
//! whole subtree. Operations that allocate return
//! `Result<_, AllocError>`; misuse such as an out-of-range index or a
//! child of the wrong type is a precondition violation reported through
//! [`tessera_core::diagnostics`].

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(unsafe_code)]

pub mod config;
pub mod dictionary;
pub mod list;
pub mod pair;
mod raw;
pub mod string;
pub mod value;
pub mod world;

pub use config::{parse_size, WorldConfig, ENV_ALLOCATOR, ENV_ARENA_CAPACITY, ENV_ARENA_PAGE_SIZE};
pub use dictionary::Dictionary;
pub use list::List;
pub use pair::Pair;
pub use raw::Removed;
pub use string::{wide, WideString};
pub use value::Value;
pub use world::{ArenaUsage, World};
