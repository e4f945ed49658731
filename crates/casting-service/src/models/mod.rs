//! Catalog data models.
//!
//! Row types map 1:1 to the tables in `migrations/`; request types keep every
//! field optional so handlers can report missing fields as 422 instead of a
//! generic extractor rejection.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Gender stored when a performer is created without one.
pub const DEFAULT_GENDER: &str = "Other";

/// A performer row.
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct Performer {
    pub id: i64,
    pub name: String,
    pub age: i32,
    pub gender: String,
}

/// Validated input for a new performer.
#[derive(Debug, Clone, PartialEq)]
pub struct NewPerformer {
    pub name: String,
    pub age: i32,
    pub gender: String,
}

/// Validated partial update for a performer. `None` keeps the stored value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PerformerChanges {
    pub name: Option<String>,
    pub age: Option<i32>,
    pub gender: Option<String>,
}

/// A work row.
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct Work {
    pub id: i64,
    pub title: String,
    pub release_date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewWork {
    pub title: String,
    pub release_date: NaiveDate,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkChanges {
    pub title: Option<String>,
    pub release_date: Option<NaiveDate>,
}

/// A performer's participation in a work.
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct CastMember {
    pub work_id: i64,
    pub performer_id: i64,
    pub performer_name: String,
    pub fee: f64,
}

/// Validated input for adding a performer to a work.
#[derive(Debug, Clone, PartialEq)]
pub struct NewParticipation {
    pub work_id: i64,
    pub performer_id: i64,
    pub fee: f64,
}

/// One page of a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub limit: i64,
    pub offset: i64,
}

impl Page {
    /// Page `number` (1-based) of `size` rows. `None` if the offset overflows.
    pub fn new(number: i64, size: u32) -> Option<Self> {
        if number < 1 {
            return None;
        }
        let limit = i64::from(size);
        let offset = number.checked_sub(1)?.checked_mul(limit)?;
        Some(Self { limit, offset })
    }
}

// ============================================================================
// Request bodies
// ============================================================================

/// Query string for list endpoints.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<i64>,
}

/// Body of `POST /performers` and `PATCH /performers/:id`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PerformerRequest {
    pub name: Option<String>,
    pub age: Option<i32>,
    pub gender: Option<String>,
}

/// Body of `POST /works` and `PATCH /works/:id`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WorkRequest {
    pub title: Option<String>,
    pub release_date: Option<NaiveDate>,
}

/// Body of `POST /works/:id/cast`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CastMemberRequest {
    pub performer_id: Option<i64>,
    pub fee: Option<f64>,
}
