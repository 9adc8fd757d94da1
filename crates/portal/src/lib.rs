pub mod adapter;
pub mod banks;
pub mod credentials;
pub mod error;
pub mod forms;
pub mod machine;
pub mod operator;
pub mod predicate;
pub mod session;

pub use adapter::{ChallengeKind, PortalAdapter};
pub use credentials::{provider_for, Credential, CredentialError, CredentialProvider};
pub use error::{AuthError, TransportError};
pub use machine::{AuthChallenge, AuthState, Retriever};
pub use operator::{ConsoleOperator, Operator};
pub use session::{HttpSession, Session};

/// Download the export for `range` into `destination` with a live HTTP
/// session and terminal prompts.
pub fn download(
    adapter: &PortalAdapter,
    credential: &Credential,
    range: conto_core::DateRange,
    destination: &std::path::Path,
) -> Result<(), AuthError> {
    let session = HttpSession::new(adapter.user_agent)?;
    Retriever::new(adapter, session, ConsoleOperator).retrieve(credential, range, destination)
}
