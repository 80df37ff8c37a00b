//! Utility Module
//!
//! - [`interner`]: String interning for property, piece and job names
//! - [`hash`]: Seeded 128-bit content hash used to deduplicate shader programs
//!
//! # String Interning
//!
//! ```rust,ignore
//! use hlms::utils::IdString;
//!
//! let a = IdString::new("num_thread_groups_x");
//! let b = IdString::new("num_thread_groups_x");
//! assert_eq!(a, b); // O(1) comparison
//! ```

pub mod hash;
pub mod interner;

pub use hash::{HASH_SEED, hash_128};
pub use interner::{IdString, Symbol};
