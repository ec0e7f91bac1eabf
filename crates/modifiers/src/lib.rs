//! Scene modifiers and the glue that puts them in front of a user.
//!
//! A modifier is parsed from a validated [`ModifierConfig`], owned by the
//! node that declared it and bound to a target found by path from that node.
//! [`SceneUi`] follows graph events to build and drop modifier widgets.

mod material;
mod modifier;
mod ui;

pub use material::MaterialModifier;
pub use modifier::{ModifierError, ModifierEvent, ModifierState, SceneModifier};
pub use ui::{ModifierUi, SceneUi, TextUi, UiConnection, UiEvent};

use scenecraft_assets::ModifierConfig;

/// Build the modifier named by the config's `type` tag.
pub fn parse_modifier(config: &ModifierConfig) -> Result<Box<dyn SceneModifier>, ModifierError> {
    match config.kind() {
        "material" => Ok(Box::new(MaterialModifier::from_config(config)?)),
        other => Err(ModifierError::UnknownType(other.to_owned())),
    }
}

pub fn crate_info() -> &'static str {
    "scenecraft-modifiers v0.1.0"
}
