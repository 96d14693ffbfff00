mod auth;
mod case_insensitive_string_ext;
mod error;
mod password;
mod routes;
mod store;
mod token;
mod types;

pub use auth::*;
pub use error::*;
pub use password::*;
pub use routes::*;
pub use store::*;
pub use token::*;
pub use types::*;
