use std::path::Path;

use anyhow::Context as _;
use serde::{Deserialize, Serialize};

/// CSS selectors and the pagination query parameter for the target site.
///
/// The defaults target pixiv's novel pages. The generated class names there
/// rotate with frontend deploys, so the whole set can be overridden from a
/// YAML file instead of editing code.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SiteProfile {
    /// Series display name on the series landing page.
    pub series_title: String,
    /// Anchor elements linking to each chapter on a listing page.
    pub chapter_link: String,
    /// Container that holds the rendered chapter body.
    pub content_container: String,
    /// Chapter title on a chapter page.
    pub chapter_title: String,
    /// Paragraph elements of the chapter body, in document order.
    pub paragraph: String,
    /// Query parameter carrying the 1-based listing page number.
    pub page_param: String,
}

impl Default for SiteProfile {
    fn default() -> Self {
        Self {
            series_title: ".sc-vk2fvc-2".to_owned(),
            chapter_link: ".sc-1c4k3wn-12 a".to_owned(),
            content_container: ".sc-khIgEk".to_owned(),
            chapter_title: ".sc-1u8nu73-3".to_owned(),
            paragraph: ".sc-khIgEk p".to_owned(),
            page_param: "p".to_owned(),
        }
    }
}

impl SiteProfile {
    pub fn from_yaml_file(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("read site profile: {}", path.display()))?;
        serde_yaml::from_str(&raw)
            .with_context(|| format!("parse site profile: {}", path.display()))
    }

    /// Default profile, or one loaded from `path` when given.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(path) => Self::from_yaml_file(path),
            None => Ok(Self::default()),
        }
    }
}
