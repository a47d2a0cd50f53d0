mod error;
mod functions;
mod traits;
mod types;
mod validation;

pub use error::AuthError;
pub use functions::{
    callback_url, email_to_name, enabled_providers, failure_path, generate_state,
    is_flow_expired, join_scopes, mount_path, normalize_scopes, DEFAULT_SCOPE,
};
pub use traits::{FlowStore, ProviderAdapter, Result};
pub use types::{AuthFlowState, Identity, ParseProviderError, ProfileHints, Provider, TokenSet};
pub use validation::{parse_base_url, validate_return_to};
