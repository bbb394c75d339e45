use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ParsingError;

pub const MEMORIZED: &str = "I have memorized this object.";
pub const UPDATED: &str = "I have updated the knowledge of this object.";
pub const UPDATE_FAILED: &str = "I have failed to update the knowledge of this object.";

/// Attribute names understood by [`ObjectKnowledge::apply`], in display order.
pub const OBJECT_ATTRIBUTES: &[&str] = &[
    "name",
    "color",
    "shape",
    "material",
    "width",
    "height",
    "length",
    "x",
    "y",
    "z",
    "support_surface",
    "contains",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Shape {
    Cylindrical,
    Spherical,
    Cuboidal,
    Conical,
    Complex,
}

impl Shape {
    pub const ALL: &'static [Self] =
        &[Self::Cylindrical, Self::Spherical, Self::Cuboidal, Self::Conical, Self::Complex];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cylindrical => "cylindrical",
            Self::Spherical => "spherical",
            Self::Cuboidal => "cuboidal",
            Self::Conical => "conical",
            Self::Complex => "complex",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|s| s.as_str().eq_ignore_ascii_case(value.trim()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Material {
    Wood,
    Metal,
    Plastic,
    Ceramic,
    Glass,
    Paper,
    Organic,
    Other,
}

impl Material {
    pub const ALL: &'static [Self] = &[
        Self::Wood,
        Self::Metal,
        Self::Plastic,
        Self::Ceramic,
        Self::Glass,
        Self::Paper,
        Self::Organic,
        Self::Other,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Wood => "wood",
            Self::Metal => "metal",
            Self::Plastic => "plastic",
            Self::Ceramic => "ceramic",
            Self::Glass => "glass",
            Self::Paper => "paper",
            Self::Organic => "organic",
            Self::Other => "other",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|m| m.as_str().eq_ignore_ascii_case(value.trim()))
    }
}

/// What the robot knows about one named object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectKnowledge {
    pub name: String,
    pub color: Option<String>,
    pub shape: Option<Shape>,
    pub material: Option<Material>,
    pub width: Option<f64>,
    pub height: Option<f64>,
    pub length: Option<f64>,
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub z: Option<f64>,
    pub support_surface: Option<String>,
    pub contains: Vec<String>,
    pub updated_at: DateTime<Utc>,
}

impl ObjectKnowledge {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            color: None,
            shape: None,
            material: None,
            width: None,
            height: None,
            length: None,
            x: None,
            y: None,
            z: None,
            support_surface: None,
            contains: Vec::new(),
            updated_at: Utc::now(),
        }
    }

    /// Overlay attributes from a structured-call payload. Nulls and unknown
    /// keys are skipped; the name is never changed.
    pub fn apply(&mut self, attrs: &Map<String, Value>) -> Result<(), ParsingError> {
        for (key, value) in attrs {
            if value.is_null() {
                continue;
            }
            match key.as_str() {
                "name" => {}
                "color" => self.color = Some(text(key, value)?),
                "support_surface" => self.support_surface = Some(text(key, value)?),
                "shape" => {
                    let raw = text(key, value)?;
                    self.shape = Some(Shape::parse(&raw).ok_or_else(|| invalid(key, &raw))?);
                }
                "material" => {
                    let raw = text(key, value)?;
                    self.material = Some(Material::parse(&raw).ok_or_else(|| invalid(key, &raw))?);
                }
                "width" => self.width = Some(number(key, value)?),
                "height" => self.height = Some(number(key, value)?),
                "length" => self.length = Some(number(key, value)?),
                "x" => self.x = Some(number(key, value)?),
                "y" => self.y = Some(number(key, value)?),
                "z" => self.z = Some(number(key, value)?),
                "contains" => self.contains = names(key, value)?,
                other => tracing::debug!(object = %self.name, attribute = other, "unknown object attribute skipped"),
            }
        }
        self.updated_at = Utc::now();
        Ok(())
    }

    /// One-line description restricted to `attributes` (all when empty).
    pub fn verbose_description(&self, attributes: &[String]) -> String {
        let mut description = format!("Object name: {}", self.name);
        let wanted = |attr: &str| attributes.is_empty() || attributes.iter().any(|a| a == attr);
        for &attr in &OBJECT_ATTRIBUTES[1..] {
            if !wanted(attr) {
                continue;
            }
            let value = match attr {
                "color" => self.color.as_ref().map(|c| format!("'{c}'")),
                "shape" => self.shape.map(|s| s.as_str().to_owned()),
                "material" => self.material.map(|m| m.as_str().to_owned()),
                "width" => self.width.map(|v| v.to_string()),
                "height" => self.height.map(|v| v.to_string()),
                "length" => self.length.map(|v| v.to_string()),
                "x" => self.x.map(|v| v.to_string()),
                "y" => self.y.map(|v| v.to_string()),
                "z" => self.z.map(|v| v.to_string()),
                "support_surface" => self.support_surface.as_ref().map(|s| format!("'{s}'")),
                "contains" if !self.contains.is_empty() => Some(self.contains.join(", ")),
                _ => None,
            };
            if let Some(value) = value {
                description.push_str(&format!(" | {attr} : {value}"));
            }
        }
        description
    }
}

fn invalid(field: &str, raw: &str) -> ParsingError {
    ParsingError::InvalidField { field: field.to_owned(), reason: format!("unrecognized value `{raw}`") }
}

fn text(field: &str, value: &Value) -> Result<String, ParsingError> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        _ => Err(ParsingError::InvalidField { field: field.to_owned(), reason: "expected a string".into() }),
    }
}

fn number(field: &str, value: &Value) -> Result<f64, ParsingError> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
    .ok_or_else(|| ParsingError::InvalidField { field: field.to_owned(), reason: "expected a number".into() })
}

fn names(field: &str, value: &Value) -> Result<Vec<String>, ParsingError> {
    match value {
        Value::Array(items) => items.iter().map(|item| text(field, item)).collect(),
        Value::String(s) => Ok(s.split(',').map(str::trim).filter(|s| !s.is_empty()).map(String::from).collect()),
        _ => Err(ParsingError::InvalidField { field: field.to_owned(), reason: "expected a list of names".into() }),
    }
}

fn required_name(attrs: &Map<String, Value>) -> Result<String, ParsingError> {
    attrs
        .get("name")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(String::from)
        .ok_or(ParsingError::MissingField("name"))
}

/// Name-keyed object knowledge. Entries are created or updated, never removed.
#[derive(Debug, Default)]
pub struct ObjectMemory {
    objects: Vec<ObjectKnowledge>,
}

impl ObjectMemory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store an object, merging into an existing entry with the same name.
    /// A malformed payload leaves memory untouched.
    pub fn memorize(&mut self, attrs: &Map<String, Value>) -> Result<&'static str, ParsingError> {
        let name = required_name(attrs)?;
        match self.position(&name) {
            Some(i) => {
                let mut merged = self.objects[i].clone();
                merged.apply(attrs)?;
                self.objects[i] = merged;
            }
            None => {
                let mut object = ObjectKnowledge::new(name);
                object.apply(attrs)?;
                self.objects.push(object);
            }
        }
        Ok(MEMORIZED)
    }

    /// Update an already-known object. Unknown names yield [`UPDATE_FAILED`].
    pub fn update(&mut self, attrs: &Map<String, Value>) -> Result<&'static str, ParsingError> {
        let name = required_name(attrs)?;
        let Some(i) = self.position(&name) else {
            return Ok(UPDATE_FAILED);
        };
        let mut merged = self.objects[i].clone();
        merged.apply(attrs)?;
        self.objects[i] = merged;
        Ok(UPDATED)
    }

    pub fn insert(&mut self, object: ObjectKnowledge) {
        match self.position(&object.name) {
            Some(i) => self.objects[i] = object,
            None => self.objects.push(object),
        }
    }

    pub fn get(&self, name: &str) -> Option<&ObjectKnowledge> {
        self.position(name).map(|i| &self.objects[i])
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.objects.iter().position(|o| o.name.eq_ignore_ascii_case(name.trim()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &ObjectKnowledge> {
        self.objects.iter()
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Object memory listing restricted to `attributes` (all when empty).
    pub fn describe(&self, attributes: &[String]) -> String {
        let mut memory = String::from("Object Memory\n");
        for object in &self.objects {
            memory.push_str(&object.verbose_description(attributes));
            memory.push('\n');
        }
        memory
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn attrs(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn memorize_creates_then_merges_by_name() {
        let mut memory = ObjectMemory::new();
        let msg = memory.memorize(&attrs(json!({"name": "tomato", "color": "red", "shape": "SPHERICAL"}))).unwrap();
        assert_eq!(msg, MEMORIZED);
        memory.memorize(&attrs(json!({"name": "Tomato", "support_surface": "table"}))).unwrap();

        assert_eq!(memory.len(), 1);
        let tomato = memory.get("tomato").unwrap();
        assert_eq!(tomato.color.as_deref(), Some("red"));
        assert_eq!(tomato.shape, Some(Shape::Spherical));
        assert_eq!(tomato.support_surface.as_deref(), Some("table"));
    }

    #[test]
    fn memorize_requires_a_name() {
        let mut memory = ObjectMemory::new();
        let err = memory.memorize(&attrs(json!({"color": "blue"}))).unwrap_err();
        assert!(matches!(err, ParsingError::MissingField("name")));
        assert!(memory.is_empty());
    }

    #[test]
    fn malformed_attribute_leaves_memory_untouched() {
        let mut memory = ObjectMemory::new();
        memory.memorize(&attrs(json!({"name": "cup", "width": 8}))).unwrap();
        let err = memory.update(&attrs(json!({"name": "cup", "color": "green", "width": "wide"}))).unwrap_err();
        assert!(matches!(err, ParsingError::InvalidField { .. }));
        let cup = memory.get("cup").unwrap();
        assert_eq!(cup.width, Some(8.0));
        assert!(cup.color.is_none());
    }

    #[test]
    fn update_unknown_object_reports_failure() {
        let mut memory = ObjectMemory::new();
        assert_eq!(memory.update(&attrs(json!({"name": "ghost"}))).unwrap(), UPDATE_FAILED);
        memory.memorize(&attrs(json!({"name": "bowl"}))).unwrap();
        assert_eq!(memory.update(&attrs(json!({"name": "bowl", "material": "ceramic"}))).unwrap(), UPDATED);
        assert_eq!(memory.get("bowl").unwrap().material, Some(Material::Ceramic));
    }

    #[test]
    fn describe_filters_attributes() {
        let mut memory = ObjectMemory::new();
        memory
            .memorize(&attrs(json!({"name": "fridge", "color": "white", "contains": ["milk", "eggs"], "x": 2.5})))
            .unwrap();
        assert_eq!(
            memory.describe(&[]),
            "Object Memory\nObject name: fridge | color : 'white' | x : 2.5 | contains : milk, eggs\n"
        );
        assert_eq!(
            memory.describe(&["contains".to_string()]),
            "Object Memory\nObject name: fridge | contains : milk, eggs\n"
        );
    }
}
