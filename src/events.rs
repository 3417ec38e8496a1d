use std::sync::Arc;

use crate::loader::DecodedImage;

/// Label shown whenever the current pointer target cannot be displayed.
pub const NO_IMAGE_LABEL: &str = "No image found";

/// One-way notification from the refresh task to the viewer: the latest
/// display snapshot. `image` is `None` when the last load attempt failed.
#[derive(Debug, Clone)]
pub struct DisplayUpdate {
    pub image: Option<Arc<DecodedImage>>,
    pub label: String,
}
