use std::time::Duration;

use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use sea_orm_migration::MigratorTrait;
use utils::assets::asset_dir;

pub mod entities;
pub mod models;

pub use sea_orm::{ConnectionTrait, DbErr};

pub type DbConn = DatabaseConnection;

#[derive(Clone)]
pub struct DBService {
    pub conn: DatabaseConnection,
}

impl DBService {
    /// Connects to the database named by `DATABASE_URL` (or the sqlite file in
    /// the asset directory) and brings the schema up to date.
    pub async fn new() -> Result<DBService, DbErr> {
        let database_url = std::env::var("DATABASE_URL").unwrap_or_else(|_| {
            format!(
                "sqlite://{}?mode=rwc",
                asset_dir().join("db.sqlite").to_string_lossy()
            )
        });

        let mut options = ConnectOptions::new(database_url);
        options
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(30))
            .sqlx_logging(false);

        let conn = Database::connect(options).await?;
        db_migration::Migrator::up(&conn, None).await?;
        Ok(DBService { conn })
    }
}
