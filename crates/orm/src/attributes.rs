//! Attribute Registry - normalization of model attribute declarations
//!
//! Definitions declare attributes loosely: a bare type string (`"string"`), a
//! descriptor object (`{ "type": "json" }`, `{ "model": "user" }`), or `false`
//! to switch off one of the implicit timestamp columns. Normalization turns
//! every declaration into an [`Attribute`] with a tagged [`AttributeKind`]
//! once, when a registry is built; nothing downstream looks at the raw shape.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{ModelError, ModelResult};

pub const CREATED_AT: &str = "createdAt";
pub const UPDATED_AT: &str = "updatedAt";

/// Fallback primary key name when no attribute is flagged `primaryKey`
const DEFAULT_PRIMARY_KEY: &str = "uuid";

const DATETIME_TYPE: &str = "datetime";
const JSON_TYPE: &str = "json";

/// An attribute as written in a model definition file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawAttribute {
    /// `createdAt: false`
    Toggle(bool),
    /// `name: "string"`
    Shorthand(String),
    /// `owner: { model: "user" }`
    Descriptor(AttributeDescriptor),
}

impl From<&str> for RawAttribute {
    fn from(value: &str) -> Self {
        RawAttribute::Shorthand(value.to_string())
    }
}

impl From<bool> for RawAttribute {
    fn from(value: bool) -> Self {
        RawAttribute::Toggle(value)
    }
}

impl From<AttributeDescriptor> for RawAttribute {
    fn from(value: AttributeDescriptor) -> Self {
        RawAttribute::Descriptor(value)
    }
}

/// Descriptor object form of an attribute declaration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AttributeDescriptor {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collection: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub via: Option<String>,
    pub dominant: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column_name: Option<String>,
    /// Ignored on input; always replaced by the declaration key
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attr_name: Option<String>,
    #[serde(rename = "primaryKey", alias = "primary_key")]
    pub primary_key: bool,
}

impl AttributeDescriptor {
    pub fn scalar(kind: &str) -> Self {
        Self {
            kind: Some(kind.to_string()),
            ..Default::default()
        }
    }

    pub fn model(target: &str) -> Self {
        Self {
            model: Some(target.to_string()),
            ..Default::default()
        }
    }

    pub fn collection(target: &str, via: &str) -> Self {
        Self {
            collection: Some(target.to_string()),
            via: Some(via.to_string()),
            ..Default::default()
        }
    }

    pub fn dominant(mut self) -> Self {
        self.dominant = true;
        self
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    pub fn column(mut self, column_name: &str) -> Self {
        self.column_name = Some(column_name.to_string());
        self
    }
}

/// Whether a relation points at one row or many
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Multiplicity {
    Single,
    Collection,
}

/// Normalized attribute shape
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttributeKind {
    /// Plain column of the given type
    Scalar(String),
    /// Pointer at another model
    Relation {
        multiplicity: Multiplicity,
        target: String,
        via: Option<String>,
        dominant: bool,
    },
}

/// A fully normalized attribute
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    pub attr_name: String,
    pub column_name: String,
    pub kind: AttributeKind,
    pub primary_key: bool,
}

impl Attribute {
    pub fn is_relation(&self) -> bool {
        matches!(self.kind, AttributeKind::Relation { .. })
    }

    pub fn scalar_type(&self) -> Option<&str> {
        match &self.kind {
            AttributeKind::Scalar(kind) => Some(kind),
            AttributeKind::Relation { .. } => None,
        }
    }

    pub fn is_json(&self) -> bool {
        self.scalar_type() == Some(JSON_TYPE)
    }

    /// Target model key of a relation
    pub fn target(&self) -> Option<&str> {
        match &self.kind {
            AttributeKind::Relation { target, .. } => Some(target),
            AttributeKind::Scalar(_) => None,
        }
    }

    pub fn via(&self) -> Option<&str> {
        match &self.kind {
            AttributeKind::Relation { via, .. } => via.as_deref(),
            AttributeKind::Scalar(_) => None,
        }
    }

    pub fn multiplicity(&self) -> Option<Multiplicity> {
        match &self.kind {
            AttributeKind::Relation { multiplicity, .. } => Some(*multiplicity),
            AttributeKind::Scalar(_) => None,
        }
    }

    pub fn is_dominant(&self) -> bool {
        matches!(self.kind, AttributeKind::Relation { dominant: true, .. })
    }

    fn timestamp(name: &str) -> Self {
        Self {
            attr_name: name.to_string(),
            column_name: name.to_string(),
            kind: AttributeKind::Scalar(DATETIME_TYPE.to_string()),
            primary_key: false,
        }
    }

    fn from_descriptor(model: &str, name: &str, descriptor: AttributeDescriptor) -> ModelResult<Self> {
        let kind = match (descriptor.kind, descriptor.model, descriptor.collection) {
            // A scalar type wins over any relation marker
            (Some(kind), _, _) => AttributeKind::Scalar(kind),
            (None, Some(_), Some(_)) => {
                return Err(ModelError::definition(
                    model,
                    name,
                    "declares both `model` and `collection`",
                ))
            }
            (None, Some(target), None) => AttributeKind::Relation {
                multiplicity: Multiplicity::Single,
                target,
                via: descriptor.via,
                dominant: descriptor.dominant,
            },
            (None, None, Some(target)) => AttributeKind::Relation {
                multiplicity: Multiplicity::Collection,
                target,
                via: descriptor.via,
                dominant: descriptor.dominant,
            },
            (None, None, None) => {
                return Err(ModelError::definition(
                    model,
                    name,
                    "has neither a `type` nor a `model`/`collection` pointer",
                ))
            }
        };

        Ok(Self {
            attr_name: name.to_string(),
            column_name: descriptor.column_name.unwrap_or_else(|| name.to_string()),
            kind,
            primary_key: descriptor.primary_key,
        })
    }
}

/// The normalized attributes of one model plus its primary key
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttributeSet {
    attributes: BTreeMap<String, Attribute>,
    pk: Option<String>,
}

impl AttributeSet {
    /// Normalize raw declarations for the model registered under `model`.
    pub fn normalize(model: &str, raw: &BTreeMap<String, RawAttribute>) -> ModelResult<Self> {
        let mut attributes = BTreeMap::new();
        let mut flagged_pk: Option<String> = None;

        for (name, declaration) in raw {
            let attribute = match declaration {
                RawAttribute::Toggle(false) => continue,
                RawAttribute::Toggle(true) if is_timestamp(name) => Attribute::timestamp(name),
                RawAttribute::Toggle(true) => {
                    return Err(ModelError::definition(
                        model,
                        name,
                        "only timestamp attributes may be declared as a boolean",
                    ))
                }
                RawAttribute::Shorthand(kind) => {
                    Attribute::from_descriptor(model, name, AttributeDescriptor::scalar(kind))?
                }
                RawAttribute::Descriptor(descriptor) => {
                    Attribute::from_descriptor(model, name, descriptor.clone())?
                }
            };

            if attribute.primary_key {
                if let Some(existing) = &flagged_pk {
                    return Err(ModelError::definition(
                        model,
                        name,
                        format!("second primary key (already '{}')", existing),
                    ));
                }
                flagged_pk = Some(name.clone());
            }

            attributes.insert(name.clone(), attribute);
        }

        for name in [CREATED_AT, UPDATED_AT] {
            if !raw.contains_key(name) {
                attributes.insert(name.to_string(), Attribute::timestamp(name));
            }
        }

        let pk = flagged_pk.or_else(|| {
            attributes
                .contains_key(DEFAULT_PRIMARY_KEY)
                .then(|| DEFAULT_PRIMARY_KEY.to_string())
        });

        Ok(Self { attributes, pk })
    }

    pub fn pk(&self) -> Option<&str> {
        self.pk.as_deref()
    }

    pub fn get(&self, name: &str) -> Option<&Attribute> {
        self.attributes.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.attributes.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Attribute)> {
        self.attributes.iter()
    }

    pub fn relations(&self) -> impl Iterator<Item = &Attribute> {
        self.attributes.values().filter(|attr| attr.is_relation())
    }

    pub fn has_created_at(&self) -> bool {
        self.attributes.contains_key(CREATED_AT)
    }

    pub fn has_updated_at(&self) -> bool {
        self.attributes.contains_key(UPDATED_AT)
    }

    /// Column name for an attribute, or the name itself when undeclared
    pub fn column_for<'a>(&'a self, name: &'a str) -> &'a str {
        self.attributes
            .get(name)
            .map(|attr| attr.column_name.as_str())
            .unwrap_or(name)
    }
}

fn is_timestamp(name: &str) -> bool {
    name == CREATED_AT || name == UPDATED_AT
}
