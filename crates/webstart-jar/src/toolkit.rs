//! The toolkit seam
//!
//! Every primitive takes a request object naming its input and output
//! files. Implementations must write `output` and leave `input` untouched.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::ToolResult;
use crate::signature;

/// Keystore identity used to sign jars
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SigningIdentity {
    /// Keystore file
    pub keystore: PathBuf,
    /// Key alias
    pub alias: String,
    /// Keystore password
    pub storepass: String,
    /// Key password (defaults to the store password in the JDK tools)
    pub keypass: Option<String>,
    /// Keystore type, e.g. `JKS` or `PKCS12`
    pub storetype: Option<String>,
    /// Timestamp authority URL
    pub tsa_url: Option<String>,
}

/// Strip signatures from `input`
#[derive(Debug, Clone)]
pub struct UnsignRequest {
    pub input: PathBuf,
    pub output: PathBuf,
}

/// Pack `input` (a jar) into `output` (`.pack` or `.pack.gz`)
#[derive(Debug, Clone)]
pub struct PackRequest {
    pub input: PathBuf,
    pub output: PathBuf,
    /// Gzip the packed stream
    pub gzip: bool,
    /// Glob patterns of jar entries to transmit unpacked
    pub pass_files: Vec<String>,
}

/// Unpack a `.pack`/`.pack.gz` `input` into the jar `output`
#[derive(Debug, Clone)]
pub struct UnpackRequest {
    pub input: PathBuf,
    pub output: PathBuf,
}

/// Merge attributes into the main manifest section
#[derive(Debug, Clone)]
pub struct ManifestRequest {
    pub input: PathBuf,
    pub output: PathBuf,
    pub entries: BTreeMap<String, String>,
    /// Replace attributes that already exist
    pub override_existing: bool,
}

/// Sign `input` into `output`
#[derive(Debug, Clone)]
pub struct SignRequest {
    pub input: PathBuf,
    pub output: PathBuf,
    pub identity: SigningIdentity,
    /// Verify the signed jar after signing
    pub verify: bool,
}

/// Generate a key pair into a keystore
#[derive(Debug, Clone)]
pub struct KeystoreRequest {
    pub identity: SigningIdentity,
    /// X.500 distinguished name, e.g. `CN=Example, O=Example Corp, C=US`
    pub dname: String,
    pub key_alg: String,
    pub key_size: u32,
    pub validity_days: u32,
    /// Remove an existing keystore first
    pub delete_existing: bool,
}

/// Jar-level primitives the pipeline orchestrates.
///
/// Implementations are shared between worker threads.
pub trait JarToolkit: Send + Sync {
    /// Whether the jar carries a signature block
    fn is_signed(&self, jar: &Path) -> ToolResult<bool> {
        signature::is_signed(jar)
    }

    /// Whether the jar contains the named entry
    fn contains_entry(&self, jar: &Path, entry: &str) -> ToolResult<bool> {
        signature::contains_entry(jar, entry)
    }

    fn unsign(&self, request: &UnsignRequest) -> ToolResult<()>;

    fn pack(&self, request: &PackRequest) -> ToolResult<()>;

    fn unpack(&self, request: &UnpackRequest) -> ToolResult<()>;

    fn update_manifest(&self, request: &ManifestRequest) -> ToolResult<()>;

    fn sign(&self, request: &SignRequest) -> ToolResult<()>;

    fn generate_keystore(&self, request: &KeystoreRequest) -> ToolResult<()>;
}
