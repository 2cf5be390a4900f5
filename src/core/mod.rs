// Core modules implementing handles, copying, path semantics, and error modeling.
pub mod error;
pub mod handle;
pub mod paste;
pub mod path;
