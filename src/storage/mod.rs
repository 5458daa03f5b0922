//! Durable storage collaborators: positions, task journal, performance rows.

pub mod journal;
pub mod memory;
pub mod repository;

pub use journal::{TaskAction, TaskLogEntry, TaskStatus};
pub use memory::{InMemoryJournal, InMemoryPerformanceStore, InMemoryPositionRepository};
pub use repository::{PerformanceStore, PositionRepository, TaskJournal};
