//! Catalog persistence.
//!
//! Handlers depend on the [`CatalogRepository`] trait only.
//! [`PgCatalogRepository`] is the production implementation;
//! [`InMemoryCatalogRepository`] backs tests and local runs without a database.

mod memory;
mod postgres;

pub use memory::InMemoryCatalogRepository;
pub use postgres::PgCatalogRepository;

use crate::errors::ApiError;
use crate::models::{
    CastMember, NewParticipation, NewPerformer, NewWork, Page, Performer, PerformerChanges, Work,
    WorkChanges,
};
use async_trait::async_trait;

/// Storage operations for performers, works and their participations.
///
/// `update_*` return `None` and `delete_*` return `false` when the id does
/// not exist. `add_cast_member` returns `ApiError::Conflict` for a duplicate
/// pair and `ApiError::NotFound` if either side is missing.
#[async_trait]
pub trait CatalogRepository: Send + Sync {
    /// Cheap connectivity check for readiness.
    async fn ping(&self) -> Result<(), ApiError>;

    async fn list_performers(&self, page: Page) -> Result<Vec<Performer>, ApiError>;
    async fn get_performer(&self, id: i64) -> Result<Option<Performer>, ApiError>;
    async fn create_performer(&self, performer: NewPerformer) -> Result<Performer, ApiError>;
    async fn update_performer(
        &self,
        id: i64,
        changes: PerformerChanges,
    ) -> Result<Option<Performer>, ApiError>;
    async fn delete_performer(&self, id: i64) -> Result<bool, ApiError>;

    async fn list_works(&self, page: Page) -> Result<Vec<Work>, ApiError>;
    async fn get_work(&self, id: i64) -> Result<Option<Work>, ApiError>;
    async fn create_work(&self, work: NewWork) -> Result<Work, ApiError>;
    async fn update_work(&self, id: i64, changes: WorkChanges) -> Result<Option<Work>, ApiError>;
    async fn delete_work(&self, id: i64) -> Result<bool, ApiError>;

    async fn list_cast(&self, work_id: i64) -> Result<Vec<CastMember>, ApiError>;
    async fn add_cast_member(&self, participation: NewParticipation)
        -> Result<CastMember, ApiError>;
}
