//! Postgres-backed repository implementations.

mod books;
mod util;

pub use util::{map_sqlx_error, map_sqlx_reference_error};

use std::sync::Arc;

use sqlx::{
    Postgres, QueryBuilder,
    postgres::{PgPool, PgPoolOptions},
    query,
};

use crate::domain::books::BookFilter;

#[derive(Clone)]
pub struct PostgresRepositories {
    pool: Arc<PgPool>,
}

impl PostgresRepositories {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn connect(url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
        PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
    }

    pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
        sqlx::migrate!("./migrations")
            .run(pool)
            .await
            .map_err(Into::into)
    }

    pub async fn health_check(&self) -> Result<(), sqlx::Error> {
        query("SELECT 1").execute(self.pool()).await.map(|_| ())
    }

    /// Appends ` AND <column> = $n` for every populated filter field.
    fn apply_book_filter<'q>(qb: &mut QueryBuilder<'q, Postgres>, filter: &'q BookFilter) {
        if let Some(author) = filter.author.as_ref() {
            qb.push(" AND b.author = ");
            qb.push_bind(author);
        }
        if let Some(year) = filter.publication_year {
            qb.push(" AND b.publication_year = ");
            qb.push_bind(year);
        }
        if let Some(genre) = filter.genre.as_ref() {
            qb.push(" AND b.genre = ");
            qb.push_bind(genre);
        }
    }
}
