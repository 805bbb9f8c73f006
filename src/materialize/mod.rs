//! Directory and symlink materialization.

mod dir;
mod link;

pub use dir::ensure_dir;
pub use link::ensure_link;
