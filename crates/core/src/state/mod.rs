pub mod batch;
pub mod db;
pub mod documents;
pub mod insight;
pub mod store;

pub use db::AnalysisDb;

pub use batch::{AnalysisBatch, BatchManager, BatchStatus};
pub use documents::{DocumentManager, ProjectContext, ProjectDocument};
pub use insight::{Insight, InsightManager};
pub use store::{BatchStore, DataStore, ProjectDataSource, SqliteStore, StoreHandle};
