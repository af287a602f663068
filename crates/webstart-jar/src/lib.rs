//! Jar primitives for webstart-deps
//!
//! Everything here treats a jar as an opaque zip plus a manifest:
//! - signature-block detection and stripping
//! - manifest parsing and attribute merging
//! - the `JarToolkit` seam through which signing and pack200 are invoked
//!
//! The default toolkit shells out to the JDK tools (`jarsigner`, `keytool`,
//! `pack200`, `unpack200`); nothing in this crate reimplements them.

pub mod command;
pub mod error;
pub mod manifest;
pub mod signature;
pub mod toolkit;

pub use command::CommandToolkit;
pub use error::{ToolError, ToolResult};
pub use manifest::{Manifest, ManifestSection};
pub use signature::{is_signature_entry, is_signed, unsign};
pub use toolkit::{
    JarToolkit, KeystoreRequest, ManifestRequest, PackRequest, SignRequest, SigningIdentity,
    UnpackRequest, UnsignRequest,
};
