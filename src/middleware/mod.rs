pub mod auth;

pub use auth::Owner;
