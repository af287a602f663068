//! Shared fixtures for pipeline integration tests

#![allow(dead_code)]

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use tempfile::TempDir;

use webstart_deps::config::SignConfig;
use webstart_deps::mock::MockToolkit;
use webstart_deps::retry::Sleeper;
use webstart_deps::{Artifact, GlobalConfig, Pipeline};

/// Sleeper that returns immediately
pub struct NoSleep;

impl Sleeper for NoSleep {
    fn sleep(&self, _duration: Duration) {}
}

/// Temporary repository, working and final directories
pub struct Workspace {
    pub dir: TempDir,
}

impl Workspace {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Defaults with working/final directories inside the workspace
    pub fn config(&self) -> GlobalConfig {
        let mut config = GlobalConfig::default();
        config.working_directory = self.path().join("work");
        config.final_directory = self.path().join("out");
        config
    }

    /// Config that signs and packs every jar
    pub fn signing_config(&self) -> GlobalConfig {
        let mut config = self.config();
        config.sign = Some(sign_config());
        config.pack200.enabled = true;
        config
    }

    /// A resolved jar whose file was last modified an hour ago
    pub fn artifact(&self, artifact_id: &str, version: &str, content: &[u8]) -> Artifact {
        let file = self
            .path()
            .join("repo")
            .join(format!("{artifact_id}-{version}.jar"));
        fs::create_dir_all(file.parent().unwrap()).unwrap();
        fs::write(&file, content).unwrap();
        set_mtime(&file, SystemTime::now() - Duration::from_secs(3600));
        Artifact::new("org.example", artifact_id, version, file)
    }

    pub fn out(&self, name: &str) -> PathBuf {
        self.path().join("out").join(name)
    }

    pub fn work(&self) -> PathBuf {
        self.path().join("work")
    }
}

pub fn sign_config() -> SignConfig {
    toml::from_str("keystore = \"keystore.jks\"\nalias = \"app\"\nstorepass = \"changeit\"")
        .unwrap()
}

pub fn set_mtime(path: &Path, time: SystemTime) {
    File::options()
        .write(true)
        .open(path)
        .unwrap()
        .set_modified(time)
        .unwrap();
}

pub fn pipeline(config: GlobalConfig, toolkit: &Arc<MockToolkit>) -> Pipeline {
    Pipeline::new(config, toolkit.clone())
        .unwrap()
        .with_sleeper(Arc::new(NoSleep))
}
