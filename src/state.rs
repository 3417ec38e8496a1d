//! The single mutable record of what is currently shown.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::loader::DecodedImage;

/// Owned exclusively by the refresh task; the viewer only ever sees
/// snapshots handed to it through [`crate::events::DisplayUpdate`].
///
/// Invariants: `current_image` is `None` iff the most recent load attempt
/// failed or nothing has loaded yet. `current_path` records the last
/// *attempted* resolved path even on failure, so a broken path is not
/// re-loaded on every tick.
#[derive(Debug, Default)]
pub struct DisplayState {
    current_path: Option<PathBuf>,
    current_image: Option<Arc<DecodedImage>>,
}

impl DisplayState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// True when `path` is exactly the path of the last attempt, successful
    /// or not. The steady-state no-op gate.
    #[must_use]
    pub fn is_current(&self, path: &Path) -> bool {
        self.current_path.as_deref() == Some(path)
    }

    /// Install a new image (or the no-image state) for `path`, releasing the
    /// previously held resource first. Success and failure branches both go
    /// through here, so no resource outlives its replacement.
    pub fn swap(&mut self, image: Option<Arc<DecodedImage>>, path: PathBuf) {
        let previous = self.current_image.take();
        drop(previous);
        self.current_image = image;
        self.current_path = Some(path);
    }

    #[must_use]
    pub fn current_image(&self) -> Option<&Arc<DecodedImage>> {
        self.current_image.as_ref()
    }

    #[must_use]
    pub fn current_path(&self) -> Option<&Path> {
        self.current_path.as_deref()
    }
}
