pub mod calculations;
pub mod db;
pub mod engine;
pub mod models;

pub use db::repository::{MedflowRepository, RepositoryError};
pub use engine::{EngineError, SettlementEngine};
pub use models::*;
