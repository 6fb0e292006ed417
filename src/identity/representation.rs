use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::attribute::{AttributeValue, Identity};
use super::candidates::CandidateSet;
use super::completion::SELECTED_IDENTITY_INDEX_KEY;

pub const AUTHENTICATION_STEP: &str = "authentication-step";
pub const SELECTOR_KIND: &str = "authenticator-selector";
pub const SELECT_ACCOUNT_KIND: &str = "select-account";
pub const MSG_TITLE: &str = "info.message";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Representation {
    #[serde(rename = "type")]
    pub kind: String,
    pub actions: Vec<SelectorAction>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectorAction {
    pub template: String,
    pub kind: String,
    pub title: String,
    pub options: Vec<FormAction>,
}

/// One selectable candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormAction {
    pub template: String,
    pub kind: String,
    pub title: String,
    pub href: String,
    pub method: String,
    pub fields: Vec<HiddenField>,
    /// Every attribute of the identity, flattened to strings.
    pub properties: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HiddenField {
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
    pub value: String,
}

impl HiddenField {
    fn new(name: &str, value: String) -> Self {
        Self { kind: "hidden".to_string(), name: name.to_string(), value }
    }
}

/// Build the picker step: one `select-account` form per candidate, in ordinal order.
pub fn build(candidates: &CandidateSet, action_url: &str, display_name_attribute: &str) -> Representation {
    let options = candidates
        .iter()
        .map(|(ordinal, identity)| FormAction {
            template: "form".to_string(),
            kind: SELECT_ACCOUNT_KIND.to_string(),
            title: display_name(identity, display_name_attribute),
            href: action_url.to_string(),
            method: "POST".to_string(),
            fields: vec![HiddenField::new(SELECTED_IDENTITY_INDEX_KEY, ordinal.to_string())],
            properties: identity.iter().map(|(name, value)| (name.clone(), value.to_form_value())).collect(),
        })
        .collect();

    Representation {
        kind: AUTHENTICATION_STEP.to_string(),
        actions: vec![SelectorAction {
            template: "selector".to_string(),
            kind: SELECTOR_KIND.to_string(),
            title: MSG_TITLE.to_string(),
            options,
        }],
    }
}

/// Label for a candidate; falls back to the whole identity as JSON when the attribute is absent.
pub fn display_name(identity: &Identity, display_name_attribute: &str) -> String {
    match identity.get(display_name_attribute) {
        Some(AttributeValue::Str(s)) => s.clone(),
        Some(AttributeValue::Number(n)) => n.to_string(),
        Some(nested @ (AttributeValue::Map(_) | AttributeValue::List(_))) => nested.to_json_string(),
        None => identity.to_json_string(),
    }
}
