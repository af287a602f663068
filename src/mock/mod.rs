//! In-process toolkit double
//!
//! `MockToolkit` implements `JarToolkit` without a JDK. Files are opaque
//! byte strings:
//! - signing prefixes `SIGNED:`, unsigning strips it
//! - packing prefixes `PACK:`, unpacking strips it
//! - manifest updates copy the input
//!
//! Every call is recorded, and failures or delays can be injected per
//! operation and filename. `FailingMtime` rejects timestamp updates.

mod failure;
mod mtime;
mod toolkit;

pub use failure::{FailureConfig, FailureInjector};
pub use mtime::FailingMtime;
pub use toolkit::{MockToolkit, ToolCall, ToolOp, PACK_MARKER, SIGNED_MARKER};
