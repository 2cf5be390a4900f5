//! Purpose: Define the stable public Rust API boundary for fhandle.
//! Exports: Handle, paste report, path helper, and error types.
//! Role: Public, additive-only surface; hides internal module layout.
//! Invariants: This module is the only public path to core primitives.
//! Invariants: Internal modules remain private and are not directly exposed.

#[doc(hidden)]
pub use crate::core::error::to_exit_code;
pub use crate::core::error::{Error, ErrorKind};
pub use crate::core::handle::{EntryKind, FileHandle, HandleInfo};
pub use crate::core::paste::{PasteEntry, PasteOutcome, PasteReport};

pub mod path {
    pub use crate::core::path::{join, leaf_name, normalize_slashes, sibling, split_name};
}
