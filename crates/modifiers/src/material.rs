use crate::modifier::{ModifierError, ModifierState, SceneModifier};
use async_trait::async_trait;
use scenecraft_assets::{DependencyDictionary, ModifierConfig, Registry};
use scenecraft_common::Category;
use scenecraft_render::Material;
use scenecraft_render::material_utils::replace_material;
use scenecraft_scene::SceneNodeGraph;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MaterialOptions {
    #[serde(default)]
    material_options: Vec<String>,
    target_material_key: Option<String>,
}

/// Swaps the material of its target for one of a list of options.
///
/// With `targetMaterialKey` only meshes whose source material has that name
/// change; otherwise every mesh of the target does.
#[derive(Debug, Clone)]
pub struct MaterialModifier {
    state: ModifierState,
    options: Vec<String>,
    target_material_key: Option<String>,
}

impl MaterialModifier {
    pub fn from_config(config: &ModifierConfig) -> Result<Self, ModifierError> {
        let options: MaterialOptions = config.deserialize()?;
        Ok(Self {
            state: ModifierState::from_config(config),
            options: options.material_options,
            target_material_key: options.target_material_key,
        })
    }

    pub fn options(&self) -> &[String] {
        &self.options
    }

    pub fn target_material_key(&self) -> Option<&str> {
        self.target_material_key.as_deref()
    }
}

#[async_trait]
impl SceneModifier for MaterialModifier {
    fn kind(&self) -> &'static str {
        "material"
    }

    fn state(&self) -> &ModifierState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut ModifierState {
        &mut self.state
    }

    fn dependencies(&self) -> DependencyDictionary {
        DependencyDictionary::new().with_keys(Category::Materials, self.options.iter().cloned())
    }

    fn lazy_dependencies(&self, input: usize) -> DependencyDictionary {
        DependencyDictionary::new().with_keys(Category::Materials, self.options.get(input).cloned())
    }

    fn option_count(&self) -> usize {
        self.options.len()
    }

    async fn apply_input_internal(
        &mut self,
        graph: &mut SceneNodeGraph,
        registry: &Registry,
        input: usize,
    ) -> Result<(), ModifierError> {
        let Some(key) = self.options.get(input) else {
            tracing::debug!(modifier = %self.state.key, input, "input out of range");
            return Ok(());
        };
        let material = registry
            .loaded::<Material>(Category::Materials, key)
            .ok_or_else(|| ModifierError::MissingMaterial {
                key: self.state.key.clone(),
                material: key.clone(),
            })?;
        let target = self
            .state
            .target
            .clone()
            .ok_or_else(|| ModifierError::NoTarget {
                key: self.state.key.clone(),
                path: self.state.target_path.clone(),
            })?;
        for object in graph.target_objects_mut(&target) {
            replace_material(object, &material, self.target_material_key.as_deref());
        }
        tracing::debug!(modifier = %self.state.key, material = %key, "material applied");
        Ok(())
    }
}
