// handlers/public/auth/mod.rs - Token acquisition endpoints (no authentication)

pub mod login;
pub mod refresh;
pub mod register;

pub use login::login;
pub use refresh::refresh_token;
pub use register::register;
