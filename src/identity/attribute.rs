use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use super::error::PickerError;

pub type AttributeMap = BTreeMap<String, AttributeValue>;

/// Value of a subject, context or session attribute.
/// Booleans and nulls are not representable; they are rejected at the JSON boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Str(String),
    Number(serde_json::Number),
    List(Vec<AttributeValue>),
    Map(AttributeMap),
}

impl AttributeValue {
    pub fn kind(&self) -> &'static str {
        match self {
            AttributeValue::Str(_) => "string",
            AttributeValue::Number(_) => "number",
            AttributeValue::List(_) => "list",
            AttributeValue::Map(_) => "map",
        }
    }

    pub fn to_json(&self) -> JsonValue {
        match self {
            AttributeValue::Str(s) => JsonValue::String(s.clone()),
            AttributeValue::Number(n) => JsonValue::Number(n.clone()),
            AttributeValue::List(items) => JsonValue::Array(items.iter().map(|v| v.to_json()).collect()),
            AttributeValue::Map(map) => map_to_json(map),
        }
    }

    /// Compact JSON text.
    pub fn to_json_string(&self) -> String {
        self.to_json().to_string()
    }

    /// Form-property rendering: strings pass through, numbers are stringified and
    /// nested values become JSON text for the client to parse.
    pub fn to_form_value(&self) -> String {
        match self {
            AttributeValue::Str(s) => s.clone(),
            AttributeValue::Number(n) => n.to_string(),
            AttributeValue::List(_) | AttributeValue::Map(_) => self.to_json_string(),
        }
    }
}

fn map_to_json(map: &AttributeMap) -> JsonValue {
    JsonValue::Object(map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect())
}

impl From<&str> for AttributeValue {
    fn from(s: &str) -> Self { AttributeValue::Str(s.to_string()) }
}

impl From<String> for AttributeValue {
    fn from(s: String) -> Self { AttributeValue::Str(s) }
}

impl From<i64> for AttributeValue {
    fn from(n: i64) -> Self { AttributeValue::Number(n.into()) }
}

impl TryFrom<JsonValue> for AttributeValue {
    type Error = PickerError;

    fn try_from(value: JsonValue) -> Result<Self, Self::Error> {
        match value {
            JsonValue::String(s) => Ok(AttributeValue::Str(s)),
            JsonValue::Number(n) => Ok(AttributeValue::Number(n)),
            JsonValue::Array(items) => items
                .into_iter()
                .map(AttributeValue::try_from)
                .collect::<Result<Vec<_>, _>>()
                .map(AttributeValue::List),
            JsonValue::Object(map) => map
                .into_iter()
                .map(|(k, v)| Ok((k, AttributeValue::try_from(v)?)))
                .collect::<Result<AttributeMap, PickerError>>()
                .map(AttributeValue::Map),
            JsonValue::Null => Err(PickerError::Shape("null is not an attribute value".into())),
            JsonValue::Bool(b) => Err(PickerError::Shape(format!("boolean {} is not an attribute value", b))),
        }
    }
}

/// One selectable account: a map of named attributes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(AttributeMap);

impl Identity {
    pub fn new(attributes: AttributeMap) -> Self { Self(attributes) }

    pub fn get(&self, name: &str) -> Option<&AttributeValue> { self.0.get(name) }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &AttributeValue)> { self.0.iter() }

    pub fn into_attributes(self) -> AttributeMap { self.0 }

    pub fn to_json_string(&self) -> String { map_to_json(&self.0).to_string() }
}

impl TryFrom<AttributeValue> for Identity {
    type Error = PickerError;

    fn try_from(value: AttributeValue) -> Result<Self, Self::Error> {
        match value {
            AttributeValue::Map(map) => Ok(Identity(map)),
            other => Err(PickerError::Shape(format!("Identity could not be parsed as a map, found {}", other.kind()))),
        }
    }
}

impl From<Identity> for AttributeValue {
    fn from(identity: Identity) -> Self { AttributeValue::Map(identity.0) }
}

impl FromIterator<(String, AttributeValue)> for Identity {
    fn from_iter<T: IntoIterator<Item = (String, AttributeValue)>>(iter: T) -> Self {
        Identity(iter.into_iter().collect())
    }
}

/// Attributes produced by earlier pipeline steps for one authentication.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthenticationAttributes {
    pub subject: String,
    #[serde(default)]
    pub subject_attributes: AttributeMap,
    #[serde(default)]
    pub context_attributes: AttributeMap,
}

impl AuthenticationAttributes {
    pub fn subject_attribute(&self, name: &str) -> Option<&AttributeValue> {
        self.subject_attributes.get(name)
    }

    /// Replace the subject attributes with `identity`, keeping the subject and context attributes.
    pub fn with_subject_attributes(&self, identity: Identity) -> Self {
        Self {
            subject: self.subject.clone(),
            subject_attributes: identity.into_attributes(),
            context_attributes: self.context_attributes.clone(),
        }
    }
}

/// Decode a request body. Non-attribute values (booleans, nulls) anywhere in the
/// attribute maps surface as `Shape` errors rather than deserializer rejections.
impl TryFrom<JsonValue> for AuthenticationAttributes {
    type Error = PickerError;

    fn try_from(value: JsonValue) -> Result<Self, Self::Error> {
        let JsonValue::Object(mut body) = value else {
            return Err(PickerError::Shape("authentication attributes must be a JSON object".into()));
        };
        let subject = match body.remove("subject") {
            Some(JsonValue::String(s)) => s,
            _ => return Err(PickerError::Shape("subject must be a string".into())),
        };
        Ok(Self {
            subject,
            subject_attributes: attribute_map(body.remove("subject_attributes"), "subject_attributes")?,
            context_attributes: attribute_map(body.remove("context_attributes"), "context_attributes")?,
        })
    }
}

fn attribute_map(value: Option<JsonValue>, name: &str) -> Result<AttributeMap, PickerError> {
    match value {
        None => Ok(AttributeMap::new()),
        Some(v) => match AttributeValue::try_from(v)? {
            AttributeValue::Map(map) => Ok(map),
            other => Err(PickerError::Shape(format!("{} must be a map, found {}", name, other.kind()))),
        },
    }
}
