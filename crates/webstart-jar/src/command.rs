//! JDK-backed toolkit
//!
//! Signing, key generation and pack200 run as child processes. Unsigning
//! and manifest edits are zip rewrites done in-process.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use globset::{Glob, GlobSetBuilder};

use crate::error::{ToolError, ToolResult};
use crate::manifest;
use crate::signature;
use crate::toolkit::{
    JarToolkit, KeystoreRequest, ManifestRequest, PackRequest, SignRequest, SigningIdentity,
    UnpackRequest, UnsignRequest,
};

/// Toolkit invoking `jarsigner`, `keytool`, `pack200` and `unpack200`
#[derive(Debug, Clone, Default)]
pub struct CommandToolkit {
    /// JDK home; tools are looked up on `PATH` when unset
    java_home: Option<PathBuf>,
}

impl CommandToolkit {
    /// Create a toolkit that resolves tools from `PATH`
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve tools from `<java_home>/bin`
    pub fn with_java_home(mut self, java_home: impl Into<PathBuf>) -> Self {
        self.java_home = Some(java_home.into());
        self
    }

    /// Resolve the executable for a tool name
    pub fn tool_path(&self, tool: &str) -> PathBuf {
        match &self.java_home {
            Some(home) => home.join("bin").join(tool),
            None => PathBuf::from(tool),
        }
    }

    fn run(&self, tool: &str, args: &[String]) -> ToolResult<()> {
        tracing::debug!(tool, args = ?redact(args), "running JDK tool");
        let output = Command::new(self.tool_path(tool))
            .args(args)
            .output()
            .map_err(|source| ToolError::Spawn {
                tool: tool.to_string(),
                source,
            })?;

        if !output.status.success() {
            return Err(ToolError::Failed {
                tool: tool.to_string(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(())
    }

    /// Expand pass-file globs against the jar's entries.
    ///
    /// pack200 only accepts literal entry names.
    fn pass_file_entries(jar: &Path, patterns: &[String]) -> ToolResult<Vec<String>> {
        if patterns.is_empty() {
            return Ok(Vec::new());
        }
        let mut builder = GlobSetBuilder::new();
        for pattern in patterns {
            builder.add(Glob::new(pattern)?);
        }
        let set = builder.build()?;

        Ok(signature::entry_names(jar)?
            .into_iter()
            .filter(|name| !name.ends_with('/') && set.is_match(name))
            .collect())
    }
}

fn identity_args(identity: &SigningIdentity) -> Vec<String> {
    let mut args = vec![
        "-keystore".to_string(),
        identity.keystore.display().to_string(),
        "-storepass".to_string(),
        identity.storepass.clone(),
    ];
    if let Some(keypass) = &identity.keypass {
        args.push("-keypass".to_string());
        args.push(keypass.clone());
    }
    if let Some(storetype) = &identity.storetype {
        args.push("-storetype".to_string());
        args.push(storetype.clone());
    }
    args
}

/// Hide password values when logging arguments
fn redact(args: &[String]) -> Vec<&str> {
    let mut out = Vec::with_capacity(args.len());
    let mut hide_next = false;
    for arg in args {
        if hide_next {
            out.push("***");
            hide_next = false;
        } else {
            hide_next = arg == "-storepass" || arg == "-keypass";
            out.push(arg.as_str());
        }
    }
    out
}

fn ensure_parent(path: &Path) -> ToolResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}

fn ensure_output(path: &Path) -> ToolResult<()> {
    if path.is_file() {
        Ok(())
    } else {
        Err(ToolError::MissingOutput(path.to_path_buf()))
    }
}

impl JarToolkit for CommandToolkit {
    fn unsign(&self, request: &UnsignRequest) -> ToolResult<()> {
        signature::unsign(&request.input, &request.output)?;
        Ok(())
    }

    fn pack(&self, request: &PackRequest) -> ToolResult<()> {
        ensure_parent(&request.output)?;
        let mut args = Vec::new();
        args.push(if request.gzip { "--gzip" } else { "--no-gzip" }.to_string());
        for entry in Self::pass_file_entries(&request.input, &request.pass_files)? {
            args.push(format!("--pass-file={entry}"));
        }
        args.push(request.output.display().to_string());
        args.push(request.input.display().to_string());

        self.run("pack200", &args)?;
        ensure_output(&request.output)
    }

    fn unpack(&self, request: &UnpackRequest) -> ToolResult<()> {
        ensure_parent(&request.output)?;
        let args = vec![
            request.input.display().to_string(),
            request.output.display().to_string(),
        ];
        self.run("unpack200", &args)?;
        ensure_output(&request.output)
    }

    fn update_manifest(&self, request: &ManifestRequest) -> ToolResult<()> {
        manifest::update_manifest(
            &request.input,
            &request.output,
            &request.entries,
            request.override_existing,
        )?;
        Ok(())
    }

    fn sign(&self, request: &SignRequest) -> ToolResult<()> {
        ensure_parent(&request.output)?;
        let identity = &request.identity;

        let mut args = identity_args(identity);
        if let Some(tsa) = &identity.tsa_url {
            args.push("-tsa".to_string());
            args.push(tsa.clone());
        }
        args.push("-signedjar".to_string());
        args.push(request.output.display().to_string());
        args.push(request.input.display().to_string());
        args.push(identity.alias.clone());

        self.run("jarsigner", &args)?;
        ensure_output(&request.output)?;

        if request.verify {
            let verify = vec!["-verify".to_string(), request.output.display().to_string()];
            self.run("jarsigner", &verify)
                .map_err(|_| ToolError::VerificationFailed(request.output.clone()))?;
        }
        Ok(())
    }

    fn generate_keystore(&self, request: &KeystoreRequest) -> ToolResult<()> {
        let identity = &request.identity;
        if request.delete_existing && identity.keystore.exists() {
            tracing::info!(keystore = %identity.keystore.display(), "deleting existing keystore");
            fs::remove_file(&identity.keystore)?;
        }
        ensure_parent(&identity.keystore)?;

        let mut args = vec![
            "-genkeypair".to_string(),
            "-alias".to_string(),
            identity.alias.clone(),
            "-keyalg".to_string(),
            request.key_alg.clone(),
            "-keysize".to_string(),
            request.key_size.to_string(),
            "-validity".to_string(),
            request.validity_days.to_string(),
            "-dname".to_string(),
            request.dname.clone(),
        ];
        args.extend(identity_args(identity));

        self.run("keytool", &args)?;
        ensure_output(&identity.keystore)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::TempDir;
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    #[test]
    fn test_tool_path_resolution() {
        assert_eq!(CommandToolkit::new().tool_path("jarsigner"), PathBuf::from("jarsigner"));
        assert_eq!(
            CommandToolkit::new()
                .with_java_home("/opt/jdk")
                .tool_path("pack200"),
            PathBuf::from("/opt/jdk/bin/pack200")
        );
    }

    #[test]
    fn test_redact_hides_passwords() {
        let args: Vec<String> = ["-keystore", "ks.jks", "-storepass", "secret", "-keypass", "other"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(
            redact(&args),
            vec!["-keystore", "ks.jks", "-storepass", "***", "-keypass", "***"]
        );
    }

    #[test]
    fn test_pass_file_entries_expand_globs() {
        let dir = TempDir::new().unwrap();
        let jar = dir.path().join("app.jar");
        let mut writer = ZipWriter::new(File::create(&jar).unwrap());
        for name in ["com/", "com/a.properties", "com/A.class", "b.properties"] {
            if name.ends_with('/') {
                writer.add_directory(name, SimpleFileOptions::default()).unwrap();
            } else {
                writer.start_file(name, SimpleFileOptions::default()).unwrap();
                writer.write_all(b"x").unwrap();
            }
        }
        writer.finish().unwrap();

        let entries =
            CommandToolkit::pass_file_entries(&jar, &["**/*.properties".to_string()]).unwrap();
        assert_eq!(entries, vec!["com/a.properties".to_string(), "b.properties".to_string()]);
    }

    #[test]
    fn test_missing_tool_is_spawn_error() {
        let dir = TempDir::new().unwrap();
        let toolkit = CommandToolkit::new().with_java_home(dir.path());
        let err = toolkit
            .unpack(&UnpackRequest {
                input: dir.path().join("a.jar.pack.gz"),
                output: dir.path().join("a.jar"),
            })
            .unwrap_err();
        assert!(matches!(err, ToolError::Spawn { .. }));
    }
}
