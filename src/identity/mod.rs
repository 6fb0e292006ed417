//! Identity selection for the authentication pipeline.
//! The action decides whether a choice is needed; the completion handler renders the choices
//! and records the user's pick in session for the action's next pass.

mod action;
mod attribute;
mod candidates;
mod completion;
mod error;
pub mod representation;
mod session;

pub use action::{ActionResult, IdentityPickerAction, Prompt, NO_ACCOUNT_MESSAGE};
pub use attribute::{AttributeMap, AttributeValue, AuthenticationAttributes, Identity};
pub use candidates::CandidateSet;
pub use completion::{
    CompletionOutcome, CompletionRequest, IdentityPickerRequestHandler, RenderedView, RequestMethod, RequestModel,
    IDENTITIES_TEMPLATE_KEY, NO_IDENTITIES_IN_SESSION, NO_MATCHING_IDENTITY, NO_MODEL_IN_SESSION,
    NO_SELECTED_IDENTITY, SELECTED_IDENTITY_INDEX_KEY,
};
pub use error::{PickerError, PickerResult};
pub use representation::Representation;
pub use session::{
    MemorySession, ScopedSession, SessionManager, SessionStore, TransactionId, IDENTITY_LIST_SESSION_KEY,
    IDENTITY_MODEL_SESSION_KEY, PICKED_IDENTITY_SESSION_KEY, PLUGIN_TYPE,
};
