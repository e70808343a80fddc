//! Reading watched files back after a change.
//!
//! The supervisor itself never parses anything; these helpers are for
//! subscribers that need the new content.

mod file;
mod reloading;

pub use file::{FileKind, FileSource};
pub use reloading::ReloadingFile;
