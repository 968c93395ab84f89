pub mod session;

pub use session::check_token;
