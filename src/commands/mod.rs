// ABOUTME: Command module aggregator for the ecsdeploy CLI.
// ABOUTME: Re-exports the update and run command handlers.

mod connection;
mod scheduled_task;
mod service;
mod task;
mod task_definition;

pub use scheduled_task::update_scheduled_task;
pub use service::update_service;
pub use task::run_task;
pub use task_definition::update_task_definition;
