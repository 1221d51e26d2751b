use sqlx::{Error, Pool, Postgres, postgres::PgPoolOptions};

pub mod models;
pub mod repositories;

#[derive(Clone)]
pub struct DBService {
    pub pool: Pool<Postgres>,
}

impl DBService {
    /// Connect to Postgres using a fully-formed DSN and run embedded migrations.
    pub async fn new(database_url: &str) -> Result<DBService, Error> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(DBService { pool })
    }

    /// Wrap an already-connected pool, skipping migrations (used by repository tests
    /// against a database migrated out-of-band).
    pub fn from_pool(pool: Pool<Postgres>) -> DBService {
        DBService { pool }
    }
}
