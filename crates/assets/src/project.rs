use crate::error::AssetError;
use scenecraft_common::Category;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Where a workspace finds its config documents and assets.
///
/// Relative paths are resolved against the project file's directory by
/// [`ProjectConfig::from_file`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ProjectConfig {
    /// Root for texture, model and scene source files.
    pub asset_root: PathBuf,
    pub texture_packs: Option<PathBuf>,
    pub materials: Option<PathBuf>,
    pub models: Option<PathBuf>,
    pub modifiers: Option<PathBuf>,
    pub nodes: Option<PathBuf>,
    /// Node added first to a fresh graph.
    pub central_node: Option<String>,
    /// Material key -> preview image for modifier UIs.
    pub material_previews: BTreeMap<String, String>,
}

impl ProjectConfig {
    pub fn from_yaml_str(source: &str) -> Result<Self, AssetError> {
        Ok(serde_yaml::from_str(source)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, AssetError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)?;
        let config = Self::from_yaml_str(&source)?;
        let base = path.parent().unwrap_or(Path::new(""));
        tracing::debug!(path = %path.display(), "project config loaded");
        Ok(config.resolved_against(base))
    }

    /// Make every relative path relative to `base`.
    pub fn resolved_against(mut self, base: &Path) -> Self {
        let resolve = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };
        resolve(&mut self.asset_root);
        for path in [
            &mut self.texture_packs,
            &mut self.materials,
            &mut self.models,
            &mut self.modifiers,
            &mut self.nodes,
        ]
        .into_iter()
        .flatten()
        {
            resolve(path);
        }
        self
    }

    pub fn config_path(&self, category: Category) -> Option<&Path> {
        match category {
            Category::TexturePacks => self.texture_packs.as_deref(),
            Category::Materials => self.materials.as_deref(),
            Category::Models => self.models.as_deref(),
            Category::Modifiers => self.modifiers.as_deref(),
            Category::Nodes => self.nodes.as_deref(),
        }
    }
}
