//! Authentication and authorization: password log-in, access and refresh
//! tokens, the middleware that resolves bearer tokens to users, and the guard
//! that protected handlers use.

mod account;
mod guard;
mod log_in;
mod middleware;
mod refresh_token;
mod register_user;
mod token;

pub use account::{change_password, get_me};
pub use guard::{CurrentUser, require_identity};
pub use log_in::{post_log_in, post_refresh};
pub use middleware::{Identity, resolve_identity};
pub use refresh_token::create_refresh_token_table;
pub use register_user::register_user;
pub use token::{Claims, TokenKind, TokenService};
