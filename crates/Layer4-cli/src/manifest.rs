//! Service manifest - 콘솔에서 레지스트리에 올릴 서비스/액티베이터 목록
//!
//! ```json
//! {
//!   "services": [
//!     { "capability": "context.storage", "name": "sql", "rank": 100 },
//!     { "capability": "context.storage", "name": "memory" }
//!   ],
//!   "activators": [
//!     { "name": "housekeeping", "needs": ["context.storage"], "optional": ["audit"] }
//!   ]
//! }
//! ```

use locator_core::{Capability, CapabilityId, ServiceActivator, ServiceRegistryFacade};
use locator_foundation::{Error, JsonStore, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

// ============================================================================
// Manifest 파일 형식
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    #[serde(default)]
    pub services: Vec<ServiceSpec>,

    #[serde(default)]
    pub activators: Vec<ActivatorSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceSpec {
    pub capability: String,
    pub name: String,

    /// 생략하면 설정의 `defaultRank`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rank: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivatorSpec {
    pub name: String,

    #[serde(default)]
    pub needs: Vec<String>,

    #[serde(default)]
    pub optional: Vec<String>,
}

impl Manifest {
    /// 파일에서 로드 후 검증
    pub fn load(path: &Path) -> Result<Self> {
        let (store, filename) = JsonStore::for_file(path)?;
        let manifest: Manifest = store.load(&filename)?;
        manifest.validate()?;
        Ok(manifest)
    }

    pub fn validate(&self) -> Result<()> {
        for service in &self.services {
            if service.capability.trim().is_empty() || service.name.trim().is_empty() {
                return Err(Error::InvalidInput(format!(
                    "Service entry needs both capability and name: {:?}",
                    service
                )));
            }
        }

        let mut seen = std::collections::HashSet::new();
        for activator in &self.activators {
            if activator.name.trim().is_empty() {
                return Err(Error::InvalidInput("Activator name is empty".to_string()));
            }
            if !seen.insert(activator.name.as_str()) {
                return Err(Error::InvalidInput(format!(
                    "Duplicate activator: {}",
                    activator.name
                )));
            }
        }
        Ok(())
    }

    /// 등장 순서대로 중복 없는 capability 이름
    pub fn capability_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        let declared = self
            .services
            .iter()
            .map(|s| s.capability.as_str())
            .chain(self.activators.iter().flat_map(|a| {
                a.needs.iter().chain(a.optional.iter()).map(String::as_str)
            }));
        for name in declared {
            if !names.contains(&name) {
                names.push(name);
            }
        }
        names
    }

    /// 모든 서비스를 facade에 등록. 등록된 수를 반환.
    pub fn register_services(&self, facade: &ServiceRegistryFacade) -> usize {
        let default_rank = facade.config().default_rank;
        let mut registered = 0;

        for spec in &self.services {
            let capability = named_capability(&spec.capability);
            let rank = spec.rank.unwrap_or(default_rank);
            let instance = std::sync::Arc::new(NamedService {
                name: spec.name.clone(),
                capability: spec.capability.clone(),
            });

            if facade
                .register_labeled(&capability, instance, rank, spec.name.clone())
                .is_some()
            {
                registered += 1;
            }
        }

        debug!(registered, "Registered manifest services");
        registered
    }

    pub fn activators(&self) -> Vec<ManifestActivator> {
        self.activators.iter().map(ManifestActivator::from_spec).collect()
    }
}

// ============================================================================
// NamedService - 매니페스트로 등록되는 서비스
// ============================================================================

/// 이름만 가진 서비스 구현
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedService {
    pub name: String,
    pub capability: String,
}

/// 매니페스트의 capability 이름에 대응하는 키
pub fn named_capability(name: &str) -> Capability<NamedService> {
    Capability::new(name.to_string())
}

fn capability_ids(names: &[String]) -> Vec<CapabilityId> {
    names.iter().map(|n| named_capability(n).id().clone()).collect()
}

// ============================================================================
// ManifestActivator
// ============================================================================

/// 시작 시 필수 capability마다 해석된 구현을 로깅하는 액티베이터
pub struct ManifestActivator {
    name: String,
    needs: Vec<CapabilityId>,
    optional: Vec<CapabilityId>,
}

impl ManifestActivator {
    fn from_spec(spec: &ActivatorSpec) -> Self {
        Self {
            name: spec.name.clone(),
            needs: capability_ids(&spec.needs),
            optional: capability_ids(&spec.optional),
        }
    }
}

impl ServiceActivator for ManifestActivator {
    fn name(&self) -> &str {
        &self.name
    }

    fn needed_services(&self) -> Vec<CapabilityId> {
        self.needs.clone()
    }

    fn optional_services(&self) -> Vec<CapabilityId> {
        self.optional.clone()
    }

    fn start(&self, facade: &ServiceRegistryFacade) -> Result<()> {
        for id in &self.needs {
            let service = facade.get(&named_capability(id.name()))?;
            info!(activator = %self.name, capability = %id, service = %service.name, "Resolved dependency");
        }
        for id in &self.optional {
            match facade.get_optional(&named_capability(id.name())) {
                Some(service) => info!(activator = %self.name, capability = %id, service = %service.name, "Resolved optional dependency"),
                None => debug!(activator = %self.name, capability = %id, "Optional dependency absent"),
            }
        }
        Ok(())
    }
}
