//! Config-driven asset databases.
//!
//! Each category (texture packs, materials, models, modifiers, nodes) has an
//! [`ObjectDatabase`] that holds raw YAML configs and lazily turns them into
//! shared objects through a [`ConfigLoader`]. Databases find each other
//! through a [`Registry`], so a material can pull in its texture packs and a
//! model its materials.
//!
//! # Invariants
//! - One object per key: concurrent loads of a key coalesce.
//! - A dependency dictionary resolves categories in [`Category`] order.
//! - Missing references degrade to `None` with a warning; invalid configs
//!   and backend failures are errors.

mod database;
mod dependencies;
mod error;
mod loader;
mod material;
mod model;
mod modifier;
pub mod path;
mod project;
mod registry;
mod texture_pack;

pub use database::ObjectDatabase;
pub use dependencies::DependencyDictionary;
pub use error::AssetError;
pub use loader::{ConfigLoader, LoadContext, LoaderConfig};
pub use material::{MaterialLoader, PropertyType, property_type, resolve_extends};
pub use model::ModelLoader;
pub use modifier::{ModifierConfig, ModifierLoader};
pub use project::ProjectConfig;
pub use registry::{
    Callback, DependencyProvider, LoadChain, LoadEvent, Registry, RegistryBuilder, Resource,
    ResourceFuture,
};
pub use texture_pack::{TexturePack, TexturePackLoader};

pub type TexturePackDatabase = ObjectDatabase<TexturePackLoader>;
pub type MaterialDatabase = ObjectDatabase<MaterialLoader>;
pub type ModelDatabase = ObjectDatabase<ModelLoader>;
pub type ModifierDatabase = ObjectDatabase<ModifierLoader>;

pub fn crate_info() -> &'static str {
    "scenecraft-assets v0.1.0"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crate_loads() {
        assert!(crate_info().contains("assets"));
    }
}
