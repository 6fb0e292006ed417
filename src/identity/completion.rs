//! Completion handler for a paused picker transaction.
//!
//! GET turns the parked identity list into an index-addressed candidate model, stores it in
//! session and hands it to the `index` template. POST dereferences the submitted index against
//! that model (consuming it) and stores the chosen identity for the action's next pass.

use std::collections::HashMap;

use serde_json::json;
use tracing::{debug, warn};

use crate::config::IdentityPickerConfig;

use super::attribute::{AttributeValue, Identity};
use super::candidates::CandidateSet;
use super::error::{PickerError, PickerResult};
use super::session::{SessionManager, IDENTITY_LIST_SESSION_KEY, IDENTITY_MODEL_SESSION_KEY, PICKED_IDENTITY_SESSION_KEY};

pub const IDENTITIES_TEMPLATE_KEY: &str = "_identities";
pub const DISPLAY_NAME_ATTRIBUTE_NAME: &str = "_displayNameAttribute";
pub const ACTION_URL_KEY: &str = "_actionUrl";
pub const SELECTED_IDENTITY_INDEX_KEY: &str = "identity-index";
pub const INDEX_TEMPLATE: &str = "index";

pub const NO_IDENTITIES_IN_SESSION: &str = "error.no.identities.in.session";
pub const NO_SELECTED_IDENTITY: &str = "error.no.selected.identity";
pub const NO_MATCHING_IDENTITY: &str = "No matching identity selected";
pub const NO_MODEL_IN_SESSION: &str = "Did not find model in session";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestMethod {
    Get,
    Post,
}

/// Incoming request to the completion endpoint.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub method: RequestMethod,
    pub form: HashMap<String, Vec<String>>,
}

impl CompletionRequest {
    pub fn get() -> Self {
        Self { method: RequestMethod::Get, form: HashMap::new() }
    }

    pub fn post<I, K, V>(fields: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut form: HashMap<String, Vec<String>> = HashMap::new();
        for (k, v) in fields {
            form.entry(k.into()).or_default().push(v.into());
        }
        Self { method: RequestMethod::Post, form }
    }

    /// First submitted value of a form parameter.
    pub fn form_value(&self, name: &str) -> Option<&str> {
        self.form.get(name).and_then(|values| values.first()).map(String::as_str)
    }
}

/// Validated input for one verb.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestModel {
    Get { identities: AttributeValue },
    Post { identity_index: String },
}

/// Template name plus the data the template (or representation builder) consumes.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedView {
    pub template: &'static str,
    pub candidates: CandidateSet,
    pub display_name_attribute: String,
}

impl RenderedView {
    pub fn view_data(&self, action_url: &str) -> serde_json::Value {
        json!({
            IDENTITIES_TEMPLATE_KEY: self.candidates.to_view_data(),
            DISPLAY_NAME_ATTRIBUTE_NAME: self.display_name_attribute,
            ACTION_URL_KEY: action_url,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CompletionOutcome {
    /// Show the picker.
    Render(RenderedView),
    /// A pick is stored; the pipeline should run the action again.
    Complete,
}

pub struct IdentityPickerRequestHandler {
    config: IdentityPickerConfig,
}

impl IdentityPickerRequestHandler {
    pub fn new(config: IdentityPickerConfig) -> Self { Self { config } }

    pub fn pre_process(&self, request: &CompletionRequest, session: &dyn SessionManager) -> PickerResult<RequestModel> {
        match request.method {
            RequestMethod::Get => {
                let identities = session.get(IDENTITY_LIST_SESSION_KEY).ok_or_else(|| {
                    warn!("completion GET without identities in session");
                    PickerError::FlowIntegrity(NO_IDENTITIES_IN_SESSION.to_string())
                })?;
                Ok(RequestModel::Get { identities })
            }
            RequestMethod::Post => match request.form_value(SELECTED_IDENTITY_INDEX_KEY) {
                Some(index) if !index.trim().is_empty() => Ok(RequestModel::Post { identity_index: index.to_string() }),
                _ => Err(PickerError::validation(SELECTED_IDENTITY_INDEX_KEY, NO_SELECTED_IDENTITY)),
            },
        }
    }

    pub fn handle(&self, model: RequestModel, session: &dyn SessionManager) -> PickerResult<CompletionOutcome> {
        match model {
            RequestModel::Get { identities } => self.render(identities, session).map(CompletionOutcome::Render),
            RequestModel::Post { identity_index } => {
                self.submit(&identity_index, session)?;
                Ok(CompletionOutcome::Complete)
            }
        }
    }

    /// Store the candidate model for the later POST. The pending list is left in place;
    /// it is not read again in this transaction.
    pub fn render(&self, identities: AttributeValue, session: &dyn SessionManager) -> PickerResult<RenderedView> {
        let candidates = CandidateSet::from_pending(identities)?;
        session.put(IDENTITY_MODEL_SESSION_KEY, AttributeValue::Map(candidates.to_index_map()));
        debug!(count = candidates.len(), "rendering identity picker");
        Ok(RenderedView {
            template: INDEX_TEMPLATE,
            candidates,
            display_name_attribute: self.config.display_name_attribute.clone(),
        })
    }

    pub fn submit(&self, identity_index: &str, session: &dyn SessionManager) -> PickerResult<Identity> {
        let candidates = take_model(session)?;
        let selected = candidates.resolve(identity_index).cloned().ok_or_else(|| {
            debug!(index = %identity_index, count = candidates.len(), "submitted index does not match a candidate");
            PickerError::validation(SELECTED_IDENTITY_INDEX_KEY, NO_MATCHING_IDENTITY)
        })?;
        debug!(index = %identity_index, "identity selected");
        session.put(PICKED_IDENTITY_SESSION_KEY, AttributeValue::from(selected.clone()));
        Ok(selected)
    }
}

fn take_model(session: &dyn SessionManager) -> PickerResult<CandidateSet> {
    match session.remove(IDENTITY_MODEL_SESSION_KEY) {
        Some(AttributeValue::Map(map)) => CandidateSet::from_index_map(map),
        Some(other) => Err(PickerError::Shape(format!("identity model was a {}, expected map", other.kind()))),
        None => {
            warn!("completion POST without a model in session");
            Err(PickerError::FlowIntegrity(NO_MODEL_IN_SESSION.to_string()))
        }
    }
}
