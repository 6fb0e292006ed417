use tracing::{debug, info};

use crate::config::IdentityPickerConfig;

use super::attribute::{AttributeValue, AuthenticationAttributes, Identity};
use super::error::PickerResult;
use super::session::{SessionManager, IDENTITY_LIST_SESSION_KEY, PICKED_IDENTITY_SESSION_KEY};

pub const NO_ACCOUNT_MESSAGE: &str = "No account available";

/// What the pipeline should do after the picker ran.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionResult {
    /// Continue with the subject attributes replaced by the chosen identity.
    Success(AuthenticationAttributes),
    /// Pause and route the transaction to the completion handler.
    Pending(Prompt),
    Failed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prompt {
    PromptUser,
}

/// Authentication action deciding whether the user has to choose among several identities.
pub struct IdentityPickerAction {
    config: IdentityPickerConfig,
}

impl IdentityPickerAction {
    pub fn new(config: IdentityPickerConfig) -> Self { Self { config } }

    pub fn apply(&self, attrs: &AuthenticationAttributes, session: &dyn SessionManager) -> PickerResult<ActionResult> {
        // A pick stored by the completion handler always wins over the subject's list
        if let Some(picked) = session.remove(PICKED_IDENTITY_SESSION_KEY) {
            debug!(subject = %attrs.subject, "resuming with identity picked by user");
            return pick_identity(attrs, picked);
        }

        let identities = match attrs.subject_attribute(&self.config.identity_list_attribute) {
            Some(AttributeValue::List(items)) => items,
            _ => {
                info!(
                    subject = %attrs.subject,
                    attribute = %self.config.identity_list_attribute,
                    "subject did not have a list of identities to choose from"
                );
                return Ok(ActionResult::Failed(NO_ACCOUNT_MESSAGE.to_string()));
            }
        };
        debug!(subject = %attrs.subject, count = identities.len(), "received list of identities");

        match identities.as_slice() {
            [] => {
                info!(subject = %attrs.subject, "identity list is empty");
                Ok(ActionResult::Failed(NO_ACCOUNT_MESSAGE.to_string()))
            }
            [only] => {
                debug!(subject = %attrs.subject, "choosing only available identity");
                pick_identity(attrs, only.clone())
            }
            _ => {
                session.put(IDENTITY_LIST_SESSION_KEY, AttributeValue::List(identities.clone()));
                Ok(ActionResult::Pending(Prompt::PromptUser))
            }
        }
    }
}

fn pick_identity(attrs: &AuthenticationAttributes, value: AttributeValue) -> PickerResult<ActionResult> {
    let identity = Identity::try_from(value)?;
    Ok(ActionResult::Success(attrs.with_subject_attributes(identity)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::{MemorySession, PickerError};
    use serde_json::json;

    fn attrs_with(identities: serde_json::Value) -> AuthenticationAttributes {
        let subject_attributes = match AttributeValue::try_from(json!({ "identities": identities })).unwrap() {
            AttributeValue::Map(m) => m,
            _ => unreachable!(),
        };
        AuthenticationAttributes {
            subject: "janedoe".into(),
            subject_attributes,
            context_attributes: [("auth_time".to_string(), AttributeValue::from(1700000000))].into_iter().collect(),
        }
    }

    fn action() -> IdentityPickerAction { IdentityPickerAction::new(IdentityPickerConfig::default()) }

    #[test]
    fn missing_or_malformed_list_fails_without_session_writes() {
        let session = MemorySession::new();
        let mut attrs = attrs_with(json!([]));
        attrs.subject_attributes.clear();
        assert_eq!(action().apply(&attrs, &session).unwrap(), ActionResult::Failed(NO_ACCOUNT_MESSAGE.into()));

        let attrs = attrs_with(json!("not a list"));
        assert_eq!(action().apply(&attrs, &session).unwrap(), ActionResult::Failed(NO_ACCOUNT_MESSAGE.into()));
        assert!(session.is_empty());
    }

    #[test]
    fn empty_list_fails_without_session_writes() {
        let session = MemorySession::new();
        let result = action().apply(&attrs_with(json!([])), &session).unwrap();
        assert_eq!(result, ActionResult::Failed(NO_ACCOUNT_MESSAGE.into()));
        assert!(session.is_empty());
    }

    #[test]
    fn single_identity_is_substituted_without_prompt() {
        let session = MemorySession::new();
        let attrs = attrs_with(json!([{"user_id": "only", "role": "admin"}]));
        let ActionResult::Success(out) = action().apply(&attrs, &session).unwrap() else { panic!("expected success") };
        assert_eq!(out.subject, "janedoe");
        assert_eq!(out.subject_attributes.get("user_id"), Some(&AttributeValue::from("only")));
        assert_eq!(out.subject_attributes.get("identities"), None);
        assert_eq!(out.context_attributes, attrs.context_attributes);
        assert!(session.is_empty());
    }

    #[test]
    fn single_non_map_identity_is_a_shape_error() {
        let session = MemorySession::new();
        let err = action().apply(&attrs_with(json!(["alice"])), &session).unwrap_err();
        assert!(matches!(err, PickerError::Shape(_)));
    }

    #[test]
    fn several_identities_prompt_and_park_the_list() {
        let session = MemorySession::new();
        let list = json!([{"user_id": "a"}, {"user_id": "b"}, {"user_id": "c"}]);
        let result = action().apply(&attrs_with(list.clone()), &session).unwrap();
        assert_eq!(result, ActionResult::Pending(Prompt::PromptUser));
        assert_eq!(session.keys(), vec![IDENTITY_LIST_SESSION_KEY.to_string()]);
        assert_eq!(session.get(IDENTITY_LIST_SESSION_KEY), Some(AttributeValue::try_from(list).unwrap()));
    }

    #[test]
    fn picked_identity_wins_and_is_consumed() {
        let session = MemorySession::new();
        let picked = AttributeValue::try_from(json!({"user_id": "b"})).unwrap();
        session.put(PICKED_IDENTITY_SESSION_KEY, picked);
        let attrs = attrs_with(json!([{"user_id": "a"}, {"user_id": "b"}]));

        let ActionResult::Success(out) = action().apply(&attrs, &session).unwrap() else { panic!("expected success") };
        assert_eq!(out.subject_attributes.get("user_id"), Some(&AttributeValue::from("b")));
        assert!(session.is_empty());

        // Consumed: the next pass evaluates the list again
        assert_eq!(action().apply(&attrs, &session).unwrap(), ActionResult::Pending(Prompt::PromptUser));
    }

    #[test]
    fn picked_identity_must_be_map_shaped() {
        let session = MemorySession::new();
        session.put(PICKED_IDENTITY_SESSION_KEY, AttributeValue::from("b"));
        let err = action().apply(&attrs_with(json!([])), &session).unwrap_err();
        assert!(matches!(err, PickerError::Shape(_)));
        assert!(session.is_empty());
    }

    #[test]
    fn custom_list_attribute() {
        let session = MemorySession::new();
        let picker = IdentityPickerAction::new(IdentityPickerConfig {
            identity_list_attribute: "accounts".into(),
            ..IdentityPickerConfig::default()
        });
        let mut attrs = attrs_with(json!([]));
        attrs.subject_attributes.insert(
            "accounts".into(),
            AttributeValue::try_from(json!([{"user_id": "x"}])).unwrap(),
        );
        assert!(matches!(picker.apply(&attrs, &session).unwrap(), ActionResult::Success(_)));
    }
}
