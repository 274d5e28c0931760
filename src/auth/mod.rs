//! Authentication: password hashing, bearer sessions and extractors.

pub mod extract;
pub mod password;
pub mod session;

pub use extract::{AuthUser, AuthVoter};
pub use session::{IssuedSession, Principal, SessionStore};
