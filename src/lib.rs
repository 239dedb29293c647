// ABOUTME: Library root for ecsdeploy - exposes the deploy core and its collaborators.
// ABOUTME: The main binary is in main.rs.

pub mod api;
pub mod config;
pub mod deploy;
pub mod error;
pub mod output;
pub mod types;
