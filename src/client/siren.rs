//! Siren hypermedia document model
//!
//! The settlement daemon describes swaps, orders and collections as siren
//! entities: `properties` for state, `actions` for the steps currently
//! executable, `entities`/`links` for navigation.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A siren entity as fetched from the daemon.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Document {
    #[serde(default)]
    pub class: Vec<String>,
    #[serde(default)]
    pub properties: Option<Value>,
    #[serde(default)]
    pub entities: Vec<SubEntity>,
    #[serde(default)]
    pub actions: Vec<Action>,
    #[serde(default)]
    pub links: Vec<Link>,
}

impl Document {
    /// The entity's `self` link, if present.
    pub fn self_link(&self) -> Option<&str> {
        self.links
            .iter()
            .find(|link| link.rel.iter().any(|rel| rel == "self"))
            .map(|link| link.href.as_str())
    }

    /// Deserialize the `properties` object into a typed representation.
    pub fn typed_properties<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        let value = self.properties.clone().unwrap_or(Value::Null);
        serde_json::from_value(value)
    }
}

/// An embedded sub-entity, typically a link to a collection member.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubEntity {
    #[serde(default)]
    pub class: Vec<String>,
    #[serde(default)]
    pub rel: Vec<String>,
    #[serde(default)]
    pub href: Option<String>,
    #[serde(default)]
    pub properties: Option<Value>,
}

/// A currently executable step advertised by the daemon.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Action {
    pub name: String,
    #[serde(default)]
    pub class: Vec<String>,
    #[serde(default = "default_method")]
    pub method: String,
    pub href: String,
    #[serde(default, rename = "type")]
    pub media_type: Option<String>,
    #[serde(default)]
    pub fields: Vec<Field>,
}

/// A field the action expects the caller to supply.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    #[serde(default)]
    pub class: Vec<String>,
    #[serde(default, rename = "type")]
    pub field_type: Option<String>,
    #[serde(default)]
    pub value: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Link {
    pub rel: Vec<String>,
    pub href: String,
}

fn default_method() -> String {
    "GET".to_string()
}
