//! Startup configuration: YAML file loading, defaulting, and first-run
//! bootstrapping of the config/base-directory/pointer-file trio.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::Error;

/// Directory (relative to the working directory) holding the config file.
pub const CONFIG_DIR: &str = "config";
/// Config file name inside [`CONFIG_DIR`].
pub const CONFIG_FILE: &str = "config.yml";
/// Image filename seeded into a freshly created pointer file.
const PLACEHOLDER_IMAGE: &str = "default.png";

/// On-disk shape of the config file: a single `application` section.
/// Unknown keys are ignored, so hand-edited files with extra entries
/// still load.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub application: ApplicationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplicationConfig {
    /// Name of the pointer file inside the base directory.
    pub filename: String,
    /// `"true"`/`"false"`; anything unparseable falls back to windowed mode.
    pub fullscreen: String,
    /// Base directory, joined to the working directory at startup.
    pub relativepath: String,
    /// Poll cadence in whole seconds.
    pub refreshrate: u64,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            filename: "default.txt".to_owned(),
            fullscreen: "false".to_owned(),
            relativepath: "/resources/".to_owned(),
            refreshrate: 10,
        }
    }
}

impl ApplicationConfig {
    /// Turn the raw file values into the immutable runtime configuration.
    pub fn resolve(&self, workdir: &Path) -> Result<Configuration, Error> {
        if self.filename.is_empty() {
            return Err(Error::BadConfig("filename must not be empty".into()));
        }
        if self.refreshrate == 0 {
            return Err(Error::BadConfig(
                "refreshrate must be greater than zero".into(),
            ));
        }
        Ok(Configuration {
            pointer_filename: self.filename.clone(),
            fullscreen: self.fullscreen.parse().unwrap_or(false),
            base_directory: join_relative(workdir, &self.relativepath),
            refresh_interval: Duration::from_secs(self.refreshrate),
        })
    }
}

/// Immutable runtime configuration, owned for the process lifetime.
#[derive(Debug, Clone)]
pub struct Configuration {
    pub pointer_filename: String,
    pub fullscreen: bool,
    /// Absolute base directory that both the pointer file and the images
    /// it names live under.
    pub base_directory: PathBuf,
    pub refresh_interval: Duration,
}

impl Configuration {
    /// Absolute path of the pointer file.
    #[must_use]
    pub fn pointer_path(&self) -> PathBuf {
        self.base_directory.join(&self.pointer_filename)
    }
}

/// Load the configuration from `<workdir>/config/config.yml`, synthesizing
/// and persisting defaults on first run.
///
/// A missing file is recovered here (defaults written, base directory
/// created, pointer file seeded); a present-but-malformed file is fatal.
pub fn load_or_bootstrap(workdir: &Path) -> Result<Configuration, Error> {
    let config_path = workdir.join(CONFIG_DIR).join(CONFIG_FILE);
    let file = match fs::read_to_string(&config_path) {
        Ok(raw) => serde_yaml::from_str(&raw)?,
        Err(err) if err.kind() == ErrorKind::NotFound => bootstrap(workdir, &config_path)?,
        Err(err) => return Err(err.into()),
    };
    file.application.resolve(workdir)
}

fn bootstrap(workdir: &Path, config_path: &Path) -> Result<ConfigFile, Error> {
    let file = ConfigFile::default();
    let base = join_relative(workdir, &file.application.relativepath);

    fs::create_dir_all(workdir.join(CONFIG_DIR))?;
    fs::create_dir_all(&base)?;
    fs::write(config_path, serde_yaml::to_string(&file)?)?;
    fs::write(base.join(&file.application.filename), PLACEHOLDER_IMAGE)?;

    info!(
        config = %config_path.display(),
        base = %base.display(),
        "no config file found; wrote defaults and seeded pointer file"
    );
    Ok(file)
}

/// Join `rel` under `root`. A leading `/` still means "relative to the
/// working directory" in this config format, so it is stripped.
fn join_relative(root: &Path, rel: &str) -> PathBuf {
    root.join(rel.trim_start_matches('/'))
}
