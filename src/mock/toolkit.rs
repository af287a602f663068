//! Mock `JarToolkit`

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::thread;

use webstart_jar::{
    JarToolkit, KeystoreRequest, ManifestRequest, PackRequest, SignRequest, ToolError,
    ToolResult, UnpackRequest, UnsignRequest,
};

use super::{FailureConfig, FailureInjector};

/// Content prefix of a signed mock jar
pub const SIGNED_MARKER: &[u8] = b"SIGNED:";

/// Content prefix of a packed mock jar
pub const PACK_MARKER: &[u8] = b"PACK:";

/// Toolkit operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolOp {
    Unsign,
    Pack,
    Unpack,
    UpdateManifest,
    Sign,
    GenerateKeystore,
}

impl ToolOp {
    fn tool_name(&self) -> &'static str {
        match self {
            ToolOp::Unsign => "unsign",
            ToolOp::Pack => "pack200",
            ToolOp::Unpack => "unpack200",
            ToolOp::UpdateManifest => "manifest",
            ToolOp::Sign => "jarsigner",
            ToolOp::GenerateKeystore => "keytool",
        }
    }
}

/// One recorded toolkit invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCall {
    pub op: ToolOp,
    pub input: PathBuf,
    pub output: PathBuf,
}

/// Recording toolkit with failure injection
#[derive(Debug, Default)]
pub struct MockToolkit {
    calls: Mutex<Vec<ToolCall>>,
    failures: Mutex<FailureInjector>,
}

impl MockToolkit {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every `op` call whose input filename contains `pattern`
    pub fn fail_on(&self, op: ToolOp, pattern: &str) {
        self.inject(
            op,
            FailureConfig::error(format!("injected {} failure", op.tool_name())).for_file(pattern),
        );
    }

    /// Inject an arbitrary failure config
    pub fn inject(&self, op: ToolOp, config: FailureConfig) {
        if let Ok(mut failures) = self.failures.lock() {
            failures.inject(op, config);
        }
    }

    /// All calls, in the order they started
    pub fn calls(&self) -> Vec<ToolCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Calls of one operation
    pub fn calls_for(&self, op: ToolOp) -> Vec<ToolCall> {
        self.calls().into_iter().filter(|c| c.op == op).collect()
    }

    /// Operations applied to files named `filename`, in order
    pub fn ops_for_file(&self, filename: &str) -> Vec<ToolOp> {
        self.calls()
            .into_iter()
            .filter(|c| {
                c.input
                    .file_name()
                    .map(|n| n.to_string_lossy().starts_with(filename))
                    .unwrap_or(false)
            })
            .map(|c| c.op)
            .collect()
    }

    /// Whether a Sign call produced a file named `filename`
    pub fn is_signed_name(&self, filename: &str) -> bool {
        self.calls_for(ToolOp::Sign)
            .iter()
            .any(|c| c.output.file_name().map(|n| n == filename).unwrap_or(false))
    }

    /// Forget recorded calls
    pub fn reset_calls(&self) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.clear();
        }
    }

    fn record(&self, op: ToolOp, input: &Path, output: &Path) -> ToolResult<()> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(ToolCall {
                op,
                input: input.to_path_buf(),
                output: output.to_path_buf(),
            });
        }

        let injected = self
            .failures
            .lock()
            .ok()
            .and_then(|mut f| f.check(op, input));
        if let Some(config) = injected {
            if let Some(delay) = config.delay {
                thread::sleep(delay);
            }
            if let Some(message) = config.error_message {
                return Err(ToolError::Failed {
                    tool: op.tool_name().to_string(),
                    status: "exit status: 1".to_string(),
                    stderr: message,
                });
            }
        }
        Ok(())
    }
}

fn write_output(output: &Path, bytes: &[u8]) -> ToolResult<()> {
    if let Some(parent) = output.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(output, bytes)?;
    Ok(())
}

impl JarToolkit for MockToolkit {
    fn is_signed(&self, jar: &Path) -> ToolResult<bool> {
        Ok(fs::read(jar)?.starts_with(SIGNED_MARKER))
    }

    fn contains_entry(&self, jar: &Path, entry: &str) -> ToolResult<bool> {
        let bytes = fs::read(jar)?;
        Ok(String::from_utf8_lossy(&bytes).contains(entry))
    }

    fn unsign(&self, request: &UnsignRequest) -> ToolResult<()> {
        self.record(ToolOp::Unsign, &request.input, &request.output)?;
        let bytes = fs::read(&request.input)?;
        let stripped = bytes.strip_prefix(SIGNED_MARKER).unwrap_or(&bytes);
        write_output(&request.output, stripped)
    }

    fn pack(&self, request: &PackRequest) -> ToolResult<()> {
        self.record(ToolOp::Pack, &request.input, &request.output)?;
        let mut bytes = PACK_MARKER.to_vec();
        bytes.extend(fs::read(&request.input)?);
        write_output(&request.output, &bytes)
    }

    fn unpack(&self, request: &UnpackRequest) -> ToolResult<()> {
        self.record(ToolOp::Unpack, &request.input, &request.output)?;
        let bytes = fs::read(&request.input)?;
        let jar = bytes.strip_prefix(PACK_MARKER).ok_or_else(|| ToolError::Failed {
            tool: ToolOp::Unpack.tool_name().to_string(),
            status: "exit status: 1".to_string(),
            stderr: "not a pack200 archive".to_string(),
        })?;
        write_output(&request.output, jar)
    }

    fn update_manifest(&self, request: &ManifestRequest) -> ToolResult<()> {
        self.record(ToolOp::UpdateManifest, &request.input, &request.output)?;
        let bytes = fs::read(&request.input)?;
        write_output(&request.output, &bytes)
    }

    fn sign(&self, request: &SignRequest) -> ToolResult<()> {
        self.record(ToolOp::Sign, &request.input, &request.output)?;
        let bytes = fs::read(&request.input)?;
        let mut signed = SIGNED_MARKER.to_vec();
        signed.extend_from_slice(bytes.strip_prefix(SIGNED_MARKER).unwrap_or(&bytes));
        write_output(&request.output, &signed)
    }

    fn generate_keystore(&self, request: &KeystoreRequest) -> ToolResult<()> {
        let keystore = &request.identity.keystore;
        self.record(ToolOp::GenerateKeystore, keystore, keystore)?;
        if request.delete_existing && keystore.exists() {
            fs::remove_file(keystore)?;
        }
        write_output(keystore, request.dname.as_bytes())
    }
}
