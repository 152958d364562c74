pub mod invite;
#[cfg(test)]
pub mod memory;
pub mod postgres;
pub mod service;
pub mod store;

pub use postgres::{PgTaskStore, PgWorkspaceStore};
pub use service::{WorkspaceError, WorkspaceService};
