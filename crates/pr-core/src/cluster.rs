//! Clusters, applications, environment-region bindings and users.

use serde::{Deserialize, Serialize};

use crate::{ApplicationId, ClusterId, UserId};

/// Deployment target a run belongs to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cluster {
    pub id: ClusterId,
    pub name: String,
    pub application_id: ApplicationId,
    /// Binding that selects the backend this cluster's runs live on
    pub environment_region_id: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Application {
    pub id: ApplicationId,
    pub name: String,
}

/// Pairing of an environment with a region.
///
/// `environment_name` is the lookup key into the backend registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentRegion {
    pub id: u64,
    pub environment_name: String,
    pub region_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
}
