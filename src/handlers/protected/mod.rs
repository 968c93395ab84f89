// handlers/protected/mod.rs - Handlers behind the access-token gate

pub mod auth;
