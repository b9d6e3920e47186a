//! A DataFusion-backed session that runs the stages of the tip regression pipeline.
//!
//! Every stage is a method on [`Session`] that takes [`Table`] handles and fails with
//! [`SessionError::SessionClosed`] once the session has been closed.

pub mod error;
mod extract;
mod loader;
mod package;
mod partition;
mod predict;
mod session;
mod table;
mod transform;

pub use loader::ReadOptions;
pub use package::PackageCoordinate;
pub use predict::PREDICTION_COLUMN;
pub use session::{Session, SessionOptions};
pub use table::Table;
