//! Pointer-file indirection: a small text file in the base directory names
//! the image to display. External writers rewrite it to change the picture;
//! this module only ever reads it.

use std::fs;
use std::path::PathBuf;

use tracing::debug;

use crate::config::Configuration;

const UTF8_BOM: &str = "\u{feff}";

/// Outcome of one pointer-file resolution.
///
/// An unreadable pointer file yields the sentinel target (empty name, path
/// equal to the base directory); callers treat it as "no image available",
/// never as a fault.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PointerTarget {
    /// Raw pointer-file content with only the encoding wrapper removed.
    pub file_name: String,
    /// `base_directory` joined with `file_name`.
    pub path: PathBuf,
}

impl PointerTarget {
    /// Label shown alongside the image: the pointer content cut at the last
    /// dot of its base name. Dotfile-style content such as `.png` therefore
    /// labels as the empty string.
    #[must_use]
    pub fn display_label(&self) -> String {
        let base_start = self.file_name.rfind('/').map_or(0, |i| i + 1);
        match self.file_name[base_start..].rfind('.') {
            Some(dot) => self.file_name[..base_start + dot].to_owned(),
            None => self.file_name.clone(),
        }
    }
}

/// Read the pointer file and resolve its content against the base directory.
///
/// The content is taken literally (embedded whitespace included); only a
/// UTF-8 BOM is stripped. Idempotent: unchanged file content resolves to a
/// byte-identical target on every call.
#[must_use]
pub fn resolve(cfg: &Configuration) -> PointerTarget {
    let pointer = cfg.pointer_path();
    match fs::read_to_string(&pointer) {
        Ok(raw) => {
            let name = raw.strip_prefix(UTF8_BOM).unwrap_or(&raw).to_owned();
            let path = cfg.base_directory.join(&name);
            PointerTarget {
                file_name: name,
                path,
            }
        }
        Err(err) => {
            debug!(pointer = %pointer.display(), error = %err, "pointer file unreadable");
            PointerTarget {
                file_name: String::new(),
                path: cfg.base_directory.clone(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn cfg_for(base: PathBuf) -> Configuration {
        Configuration {
            pointer_filename: "default.txt".to_owned(),
            fullscreen: false,
            base_directory: base,
            refresh_interval: Duration::from_secs(10),
        }
    }

    #[test]
    fn resolves_content_against_base_directory() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = cfg_for(dir.path().to_path_buf());
        std::fs::write(cfg.pointer_path(), "foo.png").unwrap();

        let target = resolve(&cfg);
        assert_eq!(target.path, dir.path().join("foo.png"));
        assert_eq!(target.display_label(), "foo");
    }

    #[test]
    fn resolution_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = cfg_for(dir.path().to_path_buf());
        std::fs::write(cfg.pointer_path(), "bar.jpg").unwrap();

        assert_eq!(resolve(&cfg), resolve(&cfg));
    }

    #[test]
    fn strips_bom_but_keeps_whitespace() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = cfg_for(dir.path().to_path_buf());
        std::fs::write(cfg.pointer_path(), "\u{feff}my photo .png").unwrap();

        let target = resolve(&cfg);
        assert_eq!(target.file_name, "my photo .png");
        assert_eq!(target.path, dir.path().join("my photo .png"));
        assert_eq!(target.display_label(), "my photo ");
    }

    #[test]
    fn missing_pointer_file_yields_sentinel_target() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = cfg_for(dir.path().to_path_buf());

        let target = resolve(&cfg);
        assert_eq!(target.file_name, "");
        assert_eq!(target.path, dir.path());
    }

    #[test]
    fn label_of_extensionless_content_is_the_content() {
        let target = PointerTarget {
            file_name: "snapshot".to_owned(),
            path: PathBuf::from("/res/snapshot"),
        };
        assert_eq!(target.display_label(), "snapshot");
    }

    #[test]
    fn label_of_dotfile_content_is_empty() {
        let target = PointerTarget {
            file_name: ".png".to_owned(),
            path: PathBuf::from("/res/.png"),
        };
        assert_eq!(target.display_label(), "");
    }

    #[test]
    fn label_ignores_dots_in_directory_components() {
        let target = PointerTarget {
            file_name: "batch.v2/shot".to_owned(),
            path: PathBuf::from("/res/batch.v2/shot"),
        };
        assert_eq!(target.display_label(), "batch.v2/shot");
    }
}
