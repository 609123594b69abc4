pub mod accounts;
pub mod identity;
pub mod password;
pub mod policy;
pub mod session;

pub use identity::{Identity, Principal};
pub use session::Session;
