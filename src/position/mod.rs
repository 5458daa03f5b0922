//! Position lifecycle: model, state machine and manager.

pub mod lifecycle;
pub mod model;

pub use lifecycle::{LifecycleManager, NoSettlement, SettlementSource};
pub use model::{Position, PositionKey, PositionState};
