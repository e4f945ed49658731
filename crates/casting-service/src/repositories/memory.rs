//! In-memory catalog repository.
//!
//! Mirrors the PostgreSQL schema's behavior: ids are assigned sequentially,
//! listings are ordered by id, participation pairs are unique, and deleting a
//! performer or work removes its participations.

use super::CatalogRepository;
use crate::errors::ApiError;
use crate::models::{
    CastMember, NewParticipation, NewPerformer, NewWork, Page, Performer, PerformerChanges, Work,
    WorkChanges,
};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;

#[derive(Default)]
struct Catalog {
    last_performer_id: i64,
    last_work_id: i64,
    performers: BTreeMap<i64, Performer>,
    works: BTreeMap<i64, Work>,
    /// (work_id, performer_id) -> fee
    participations: BTreeMap<(i64, i64), f64>,
}

fn page_of<T: Clone>(rows: &BTreeMap<i64, T>, page: Page) -> Vec<T> {
    let skip = usize::try_from(page.offset).unwrap_or(usize::MAX);
    let take = usize::try_from(page.limit).unwrap_or(0);
    rows.values().skip(skip).take(take).cloned().collect()
}

/// Catalog repository held entirely in process memory.
pub struct InMemoryCatalogRepository {
    catalog: Mutex<Catalog>,
    available: AtomicBool,
}

impl Default for InMemoryCatalogRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryCatalogRepository {
    pub fn new() -> Self {
        Self {
            catalog: Mutex::new(Catalog::default()),
            available: AtomicBool::new(true),
        }
    }

    /// Make `ping` fail (or succeed again), to exercise readiness reporting.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }
}

#[async_trait]
impl CatalogRepository for InMemoryCatalogRepository {
    async fn ping(&self) -> Result<(), ApiError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(ApiError::Database("in-memory catalog marked unavailable".to_string()))
        }
    }

    async fn list_performers(&self, page: Page) -> Result<Vec<Performer>, ApiError> {
        let catalog = self.catalog.lock().await;
        Ok(page_of(&catalog.performers, page))
    }

    async fn get_performer(&self, id: i64) -> Result<Option<Performer>, ApiError> {
        let catalog = self.catalog.lock().await;
        Ok(catalog.performers.get(&id).cloned())
    }

    async fn create_performer(&self, performer: NewPerformer) -> Result<Performer, ApiError> {
        let mut catalog = self.catalog.lock().await;
        catalog.last_performer_id += 1;
        let row = Performer {
            id: catalog.last_performer_id,
            name: performer.name,
            age: performer.age,
            gender: performer.gender,
        };
        catalog.performers.insert(row.id, row.clone());
        Ok(row)
    }

    async fn update_performer(
        &self,
        id: i64,
        changes: PerformerChanges,
    ) -> Result<Option<Performer>, ApiError> {
        let mut catalog = self.catalog.lock().await;
        let Some(row) = catalog.performers.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(name) = changes.name {
            row.name = name;
        }
        if let Some(age) = changes.age {
            row.age = age;
        }
        if let Some(gender) = changes.gender {
            row.gender = gender;
        }
        Ok(Some(row.clone()))
    }

    async fn delete_performer(&self, id: i64) -> Result<bool, ApiError> {
        let mut catalog = self.catalog.lock().await;
        if catalog.performers.remove(&id).is_none() {
            return Ok(false);
        }
        catalog
            .participations
            .retain(|(_, performer_id), _| *performer_id != id);
        Ok(true)
    }

    async fn list_works(&self, page: Page) -> Result<Vec<Work>, ApiError> {
        let catalog = self.catalog.lock().await;
        Ok(page_of(&catalog.works, page))
    }

    async fn get_work(&self, id: i64) -> Result<Option<Work>, ApiError> {
        let catalog = self.catalog.lock().await;
        Ok(catalog.works.get(&id).cloned())
    }

    async fn create_work(&self, work: NewWork) -> Result<Work, ApiError> {
        let mut catalog = self.catalog.lock().await;
        catalog.last_work_id += 1;
        let row = Work {
            id: catalog.last_work_id,
            title: work.title,
            release_date: work.release_date,
        };
        catalog.works.insert(row.id, row.clone());
        Ok(row)
    }

    async fn update_work(&self, id: i64, changes: WorkChanges) -> Result<Option<Work>, ApiError> {
        let mut catalog = self.catalog.lock().await;
        let Some(row) = catalog.works.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(title) = changes.title {
            row.title = title;
        }
        if let Some(release_date) = changes.release_date {
            row.release_date = release_date;
        }
        Ok(Some(row.clone()))
    }

    async fn delete_work(&self, id: i64) -> Result<bool, ApiError> {
        let mut catalog = self.catalog.lock().await;
        if catalog.works.remove(&id).is_none() {
            return Ok(false);
        }
        catalog.participations.retain(|(work_id, _), _| *work_id != id);
        Ok(true)
    }

    async fn list_cast(&self, work_id: i64) -> Result<Vec<CastMember>, ApiError> {
        let catalog = self.catalog.lock().await;
        Ok(catalog
            .participations
            .range((work_id, i64::MIN)..=(work_id, i64::MAX))
            .filter_map(|(&(work_id, performer_id), &fee)| {
                catalog.performers.get(&performer_id).map(|p| CastMember {
                    work_id,
                    performer_id,
                    performer_name: p.name.clone(),
                    fee,
                })
            })
            .collect())
    }

    async fn add_cast_member(
        &self,
        participation: NewParticipation,
    ) -> Result<CastMember, ApiError> {
        let mut catalog = self.catalog.lock().await;
        if !catalog.works.contains_key(&participation.work_id) {
            return Err(ApiError::NotFound("Referenced resource not found".to_string()));
        }
        let performer_name = match catalog.performers.get(&participation.performer_id) {
            Some(performer) => performer.name.clone(),
            None => return Err(ApiError::NotFound("Referenced resource not found".to_string())),
        };

        let key = (participation.work_id, participation.performer_id);
        if catalog.participations.contains_key(&key) {
            return Err(ApiError::Conflict("Resource already exists".to_string()));
        }
        catalog.participations.insert(key, participation.fee);

        Ok(CastMember {
            work_id: participation.work_id,
            performer_id: participation.performer_id,
            performer_name,
            fee: participation.fee,
        })
    }
}
