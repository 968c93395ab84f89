pub mod password;
pub mod session;
pub mod token;

pub use session::{AuthError, SessionManager};
pub use token::{TokenCodec, TokenError, TokenPair, TokenPayload, TokenType};
