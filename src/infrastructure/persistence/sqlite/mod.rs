//! SQLite Persistence - SQLite 数据库持久化实现

mod database;
mod message_repo;
mod model_usage_repo;
mod profile_repo;
mod scenario_repo;

pub use database::{create_pool, run_migrations, DatabaseConfig, DbPool};
pub use message_repo::SqliteMessageRepository;
pub use model_usage_repo::SqliteModelUsageRepository;
pub use profile_repo::SqliteProfileRepository;
pub use scenario_repo::SqliteScenarioRepository;
