//! PostgreSQL catalog repository.
//!
//! All queries use parameterized statements and record
//! `casting_db_query_duration_seconds` per operation.

use super::CatalogRepository;
use crate::errors::ApiError;
use crate::models::{
    CastMember, NewParticipation, NewPerformer, NewWork, Page, Performer, PerformerChanges, Work,
    WorkChanges,
};
use crate::observability::metrics;
use async_trait::async_trait;
use sqlx::PgPool;
use std::time::Instant;
use tracing::instrument;

/// Catalog repository backed by a `PgPool`.
#[derive(Clone)]
pub struct PgCatalogRepository {
    pool: PgPool,
}

impl PgCatalogRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Record the query outcome and convert the error.
fn observe<T>(
    operation: &'static str,
    start: Instant,
    result: Result<T, sqlx::Error>,
) -> Result<T, ApiError> {
    let status = if result.is_ok() { "success" } else { "error" };
    metrics::record_db_query(operation, status, start.elapsed());
    result.map_err(|e| {
        tracing::debug!(target: "casting.repository", operation, error = %e, "Query failed");
        ApiError::from(e)
    })
}

#[async_trait]
impl CatalogRepository for PgCatalogRepository {
    #[instrument(skip_all, name = "casting.repo.ping")]
    async fn ping(&self) -> Result<(), ApiError> {
        let start = Instant::now();
        let result = sqlx::query("SELECT 1").execute(&self.pool).await;
        observe("ping", start, result).map(|_| ())
    }

    #[instrument(skip_all, name = "casting.repo.list_performers")]
    async fn list_performers(&self, page: Page) -> Result<Vec<Performer>, ApiError> {
        let start = Instant::now();
        let result = sqlx::query_as::<_, Performer>(
            r#"
            SELECT id, name, age, gender
            FROM performers
            ORDER BY id
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(page.limit)
        .bind(page.offset)
        .fetch_all(&self.pool)
        .await;
        observe("list_performers", start, result)
    }

    #[instrument(skip_all, name = "casting.repo.get_performer")]
    async fn get_performer(&self, id: i64) -> Result<Option<Performer>, ApiError> {
        let start = Instant::now();
        let result = sqlx::query_as::<_, Performer>(
            "SELECT id, name, age, gender FROM performers WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await;
        observe("get_performer", start, result)
    }

    #[instrument(skip_all, name = "casting.repo.create_performer")]
    async fn create_performer(&self, performer: NewPerformer) -> Result<Performer, ApiError> {
        let start = Instant::now();
        let result = sqlx::query_as::<_, Performer>(
            r#"
            INSERT INTO performers (name, age, gender)
            VALUES ($1, $2, $3)
            RETURNING id, name, age, gender
            "#,
        )
        .bind(&performer.name)
        .bind(performer.age)
        .bind(&performer.gender)
        .fetch_one(&self.pool)
        .await;
        observe("create_performer", start, result)
    }

    #[instrument(skip_all, name = "casting.repo.update_performer")]
    async fn update_performer(
        &self,
        id: i64,
        changes: PerformerChanges,
    ) -> Result<Option<Performer>, ApiError> {
        let start = Instant::now();
        let result = sqlx::query_as::<_, Performer>(
            r#"
            UPDATE performers
            SET name = COALESCE($2, name),
                age = COALESCE($3, age),
                gender = COALESCE($4, gender)
            WHERE id = $1
            RETURNING id, name, age, gender
            "#,
        )
        .bind(id)
        .bind(changes.name)
        .bind(changes.age)
        .bind(changes.gender)
        .fetch_optional(&self.pool)
        .await;
        observe("update_performer", start, result)
    }

    #[instrument(skip_all, name = "casting.repo.delete_performer")]
    async fn delete_performer(&self, id: i64) -> Result<bool, ApiError> {
        let start = Instant::now();
        let result = sqlx::query("DELETE FROM performers WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await;
        observe("delete_performer", start, result).map(|done| done.rows_affected() > 0)
    }

    #[instrument(skip_all, name = "casting.repo.list_works")]
    async fn list_works(&self, page: Page) -> Result<Vec<Work>, ApiError> {
        let start = Instant::now();
        let result = sqlx::query_as::<_, Work>(
            r#"
            SELECT id, title, release_date
            FROM works
            ORDER BY id
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(page.limit)
        .bind(page.offset)
        .fetch_all(&self.pool)
        .await;
        observe("list_works", start, result)
    }

    #[instrument(skip_all, name = "casting.repo.get_work")]
    async fn get_work(&self, id: i64) -> Result<Option<Work>, ApiError> {
        let start = Instant::now();
        let result =
            sqlx::query_as::<_, Work>("SELECT id, title, release_date FROM works WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await;
        observe("get_work", start, result)
    }

    #[instrument(skip_all, name = "casting.repo.create_work")]
    async fn create_work(&self, work: NewWork) -> Result<Work, ApiError> {
        let start = Instant::now();
        let result = sqlx::query_as::<_, Work>(
            r#"
            INSERT INTO works (title, release_date)
            VALUES ($1, $2)
            RETURNING id, title, release_date
            "#,
        )
        .bind(&work.title)
        .bind(work.release_date)
        .fetch_one(&self.pool)
        .await;
        observe("create_work", start, result)
    }

    #[instrument(skip_all, name = "casting.repo.update_work")]
    async fn update_work(&self, id: i64, changes: WorkChanges) -> Result<Option<Work>, ApiError> {
        let start = Instant::now();
        let result = sqlx::query_as::<_, Work>(
            r#"
            UPDATE works
            SET title = COALESCE($2, title),
                release_date = COALESCE($3, release_date)
            WHERE id = $1
            RETURNING id, title, release_date
            "#,
        )
        .bind(id)
        .bind(changes.title)
        .bind(changes.release_date)
        .fetch_optional(&self.pool)
        .await;
        observe("update_work", start, result)
    }

    #[instrument(skip_all, name = "casting.repo.delete_work")]
    async fn delete_work(&self, id: i64) -> Result<bool, ApiError> {
        let start = Instant::now();
        let result = sqlx::query("DELETE FROM works WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await;
        observe("delete_work", start, result).map(|done| done.rows_affected() > 0)
    }

    #[instrument(skip_all, name = "casting.repo.list_cast")]
    async fn list_cast(&self, work_id: i64) -> Result<Vec<CastMember>, ApiError> {
        let start = Instant::now();
        let result = sqlx::query_as::<_, CastMember>(
            r#"
            SELECT c.work_id, c.performer_id, p.name AS performer_name, c.fee
            FROM participations c
            JOIN performers p ON p.id = c.performer_id
            WHERE c.work_id = $1
            ORDER BY c.performer_id
            "#,
        )
        .bind(work_id)
        .fetch_all(&self.pool)
        .await;
        observe("list_cast", start, result)
    }

    #[instrument(skip_all, name = "casting.repo.add_cast_member")]
    async fn add_cast_member(
        &self,
        participation: NewParticipation,
    ) -> Result<CastMember, ApiError> {
        let start = Instant::now();
        // Unique violation (23505) maps to Conflict, FK violation (23503) to NotFound
        let result = sqlx::query_as::<_, CastMember>(
            r#"
            WITH inserted AS (
                INSERT INTO participations (work_id, performer_id, fee)
                VALUES ($1, $2, $3)
                RETURNING work_id, performer_id, fee
            )
            SELECT i.work_id, i.performer_id, p.name AS performer_name, i.fee
            FROM inserted i
            JOIN performers p ON p.id = i.performer_id
            "#,
        )
        .bind(participation.work_id)
        .bind(participation.performer_id)
        .bind(participation.fee)
        .fetch_one(&self.pool)
        .await;
        observe("add_cast_member", start, result)
    }
}
