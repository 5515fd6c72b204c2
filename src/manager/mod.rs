//! Lifecycle managers for repositories and their graph sets.

pub mod graphs;
pub mod repos;

pub use graphs::{GraphInfo, GraphManager};
pub use repos::{RepoManager, RepoStatus, RepositoryRecord};
