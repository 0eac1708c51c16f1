//! CLI command implementations

pub mod admin;
pub mod click;
pub mod login;
