//! Domain logic shared by the CLI commands.

pub mod client;
pub mod clipboard;
pub mod compose;
pub mod envfile;
pub mod onepassword;
pub mod repo;
pub mod secrets;
pub mod session;
pub mod templates;
pub mod util;
