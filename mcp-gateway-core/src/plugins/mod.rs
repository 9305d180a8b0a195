//! # Reference Plugins
//!
//! Concrete `Plugin` implementors for the three in-process capability
//! sources named in the gateway's scope: a memory store, a version-control
//! facade, and a file editor facade. Only the interface contract is
//! meaningful here — none of these perform real persistence, VCS
//! operations, or file I/O, since that business logic is explicitly out of
//! scope.

mod editor;
mod memory;
mod vcs;

pub use editor::EditorPlugin;
pub use memory::MemoryPlugin;
pub use vcs::VcsPlugin;
