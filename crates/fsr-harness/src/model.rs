//! Sample field-sampling record
//!
//! A landing: a vessel's catch declared at a location, with a measurement
//! tab. Used by the simulator and the scenario tests.

use chrono::{DateTime, Utc};
use fsr_editor::Entity;
use serde::{Deserialize, Serialize};

/// Records the in-memory store can persist
pub trait Storable: Entity {
    /// Id for the `seq`-th created record
    fn id_from_seq(seq: u64) -> Self::Id;

    /// Set the persisted identity
    fn set_id(&mut self, id: Self::Id);

    /// Set the server version stamp
    fn set_update_date(&mut self, at: DateTime<Utc>);
}

/// Landing of a fishing trip
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Landing {
    /// Persisted id
    pub id: Option<i64>,
    /// Vessel registration code
    pub vessel: String,
    /// Landing location label
    pub location: String,
    /// Number of measured individuals
    pub measurements: u32,
    /// Free comments
    pub comments: Option<String>,
    /// Server version stamp
    pub update_date: Option<DateTime<Utc>>,
}

impl Landing {
    /// New, unsaved landing
    #[must_use]
    pub fn new(vessel: impl Into<String>, location: impl Into<String>) -> Self {
        Self {
            vessel: vessel.into(),
            location: location.into(),
            ..Self::default()
        }
    }
}

impl Entity for Landing {
    type Id = i64;

    fn id(&self) -> Option<i64> {
        self.id
    }

    fn update_date(&self) -> Option<DateTime<Utc>> {
        self.update_date
    }
}

impl Storable for Landing {
    fn id_from_seq(seq: u64) -> i64 {
        i64::try_from(seq).unwrap_or(i64::MAX)
    }

    fn set_id(&mut self, id: i64) {
        self.id = Some(id);
    }

    fn set_update_date(&mut self, at: DateTime<Utc>) {
        self.update_date = Some(at);
    }
}
