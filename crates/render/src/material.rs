use crate::texture::Texture;
use glam::{Vec2, Vec3};
use serde_yaml::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Shading model of a material.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MaterialKind {
    #[default]
    Standard,
    Physical,
    Basic,
    Phong,
}

impl MaterialKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MaterialKind::Standard => "standard",
            MaterialKind::Physical => "physical",
            MaterialKind::Basic => "basic",
            MaterialKind::Phong => "phong",
        }
    }
}

impl fmt::Display for MaterialKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MaterialKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "standard" => Ok(MaterialKind::Standard),
            "physical" => Ok(MaterialKind::Physical),
            "basic" => Ok(MaterialKind::Basic),
            "phong" => Ok(MaterialKind::Phong),
            other => Err(format!("unknown material type `{other}`")),
        }
    }
}

/// A processed material property.
#[derive(Debug, Clone, PartialEq)]
pub enum MaterialProperty {
    /// Linear RGB in `0..=1`.
    Color(Vec3),
    Texture(Arc<Texture>),
    Vector2(Vec2),
    Array(Vec<Value>),
    /// Passed to the engine untouched.
    Value(Value),
}

impl MaterialProperty {
    pub fn as_texture(&self) -> Option<&Arc<Texture>> {
        match self {
            MaterialProperty::Texture(t) => Some(t),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    pub name: String,
    pub kind: MaterialKind,
    pub properties: BTreeMap<String, MaterialProperty>,
}

impl Default for Material {
    fn default() -> Self {
        let mut properties = BTreeMap::new();
        properties.insert("color".into(), MaterialProperty::Color(Vec3::splat(0.8)));
        Self {
            name: "default".into(),
            kind: MaterialKind::Standard,
            properties,
        }
    }
}

impl Material {
    pub fn new(name: impl Into<String>, kind: MaterialKind) -> Self {
        Self {
            name: name.into(),
            kind,
            properties: BTreeMap::new(),
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: MaterialProperty) -> Self {
        self.properties.insert(key.into(), value);
        self
    }

    pub fn property(&self, key: &str) -> Option<&MaterialProperty> {
        self.properties.get(key)
    }

    pub fn color(&self) -> Option<Vec3> {
        match self.properties.get("color")? {
            MaterialProperty::Color(c) => Some(*c),
            _ => None,
        }
    }
}

/// Parse `#rrggbb`, `#rgb`, `0xrrggbb` or a packed integer into linear RGB.
pub fn parse_color(value: &Value) -> Option<Vec3> {
    match value {
        Value::Number(n) => n.as_u64().map(|packed| unpack_rgb(packed as u32)),
        Value::String(s) => {
            let hex = s
                .strip_prefix('#')
                .or_else(|| s.strip_prefix("0x"))
                .unwrap_or(s);
            match hex.len() {
                6 => u32::from_str_radix(hex, 16).ok().map(unpack_rgb),
                3 => {
                    let short = u32::from_str_radix(hex, 16).ok()?;
                    let (r, g, b) = ((short >> 8) & 0xf, (short >> 4) & 0xf, short & 0xf);
                    Some(unpack_rgb((r * 17) << 16 | (g * 17) << 8 | b * 17))
                }
                _ => None,
            }
        }
        Value::Sequence(items) if items.len() == 3 => {
            let mut rgb = [0.0f32; 3];
            for (slot, item) in rgb.iter_mut().zip(items) {
                *slot = item.as_f64()? as f32;
            }
            Some(Vec3::from_array(rgb))
        }
        _ => None,
    }
}

fn unpack_rgb(packed: u32) -> Vec3 {
    Vec3::new(
        ((packed >> 16) & 0xff) as f32 / 255.0,
        ((packed >> 8) & 0xff) as f32 / 255.0,
        (packed & 0xff) as f32 / 255.0,
    )
}

/// Parse `[x, y]` or `{x, y}`.
pub fn parse_vector2(value: &Value) -> Option<Vec2> {
    match value {
        Value::Sequence(items) if items.len() == 2 => {
            Some(Vec2::new(items[0].as_f64()? as f32, items[1].as_f64()? as f32))
        }
        Value::Mapping(map) => Some(Vec2::new(
            map.get("x")?.as_f64()? as f32,
            map.get("y")?.as_f64()? as f32,
        )),
        _ => None,
    }
}
