use std::path::Path;

use async_trait::async_trait;
use dashmap::{DashMap, DashSet};
use serde::Deserialize;
use ulid::Ulid;

use crate::model::SchedulableResource;

/// Registry of identities and the schedulable resources built on them.
#[async_trait]
pub trait ResourceDirectory: Send + Sync {
    async fn identity_exists(&self, identity_id: Ulid) -> bool;

    async fn find_schedulable(
        &self,
        facility_id: Ulid,
        identity_id: Ulid,
        resource_type: &str,
    ) -> Option<SchedulableResource>;
}

#[async_trait]
pub trait PatientDirectory: Send + Sync {
    async fn patient_exists(&self, patient_id: Ulid) -> bool;
}

/// Seed file layout for [`InMemoryDirectory::load_seed`].
#[derive(Debug, Default, Deserialize)]
struct DirectorySeed {
    #[serde(default)]
    identities: Vec<Ulid>,
    #[serde(default)]
    schedulables: Vec<SchedulableResource>,
    #[serde(default)]
    patients: Vec<Ulid>,
}

/// Process-local directory backing both registries.
#[derive(Default)]
pub struct InMemoryDirectory {
    identities: DashSet<Ulid>,
    schedulables: DashMap<Ulid, SchedulableResource>,
    patients: DashSet<Ulid>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load_seed(path: &Path) -> std::io::Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let seed: DirectorySeed = serde_json::from_str(&raw)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        let dir = Self::new();
        for id in seed.identities {
            dir.register_identity(id);
        }
        for resource in seed.schedulables {
            dir.register_schedulable(resource);
        }
        for id in seed.patients {
            dir.register_patient(id);
        }
        Ok(dir)
    }

    pub fn register_identity(&self, identity_id: Ulid) {
        self.identities.insert(identity_id);
    }

    pub fn register_schedulable(&self, resource: SchedulableResource) {
        self.schedulables.insert(resource.id, resource);
    }

    pub fn register_patient(&self, patient_id: Ulid) {
        self.patients.insert(patient_id);
    }
}

#[async_trait]
impl ResourceDirectory for InMemoryDirectory {
    async fn identity_exists(&self, identity_id: Ulid) -> bool {
        self.identities.contains(&identity_id)
    }

    async fn find_schedulable(
        &self,
        facility_id: Ulid,
        identity_id: Ulid,
        resource_type: &str,
    ) -> Option<SchedulableResource> {
        // Lowest id wins if the registry holds duplicates.
        self.schedulables
            .iter()
            .filter(|e| {
                let r = e.value();
                r.facility_id == facility_id
                    && r.identity_id == identity_id
                    && r.resource_type == resource_type
            })
            .map(|e| e.value().clone())
            .min_by_key(|r| r.id)
    }
}

#[async_trait]
impl PatientDirectory for InMemoryDirectory {
    async fn patient_exists(&self, patient_id: Ulid) -> bool {
        self.patients.contains(&patient_id)
    }
}
