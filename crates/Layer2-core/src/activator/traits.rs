//! Activator traits - 필요한 서비스가 갖춰지면 시작되는 기동 단위

use crate::registry::{CapabilityId, ServiceRegistryFacade};
use locator_foundation::Result;
use serde::Serialize;

// ============================================================================
// ActivatorState
// ============================================================================

/// 액티베이터 상태
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "reason", rename_all = "lowercase")]
pub enum ActivatorState {
    /// 필요한 서비스를 기다리는 중
    Waiting,

    /// start 성공
    Active,

    /// start 실패 (다음 refresh에서 재시도)
    Failed(String),

    /// 호스트 종료 또는 제거됨
    Stopped,
}

impl ActivatorState {
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active)
    }
}

impl std::fmt::Display for ActivatorState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Waiting => write!(f, "waiting"),
            Self::Active => write!(f, "active"),
            Self::Failed(reason) => write!(f, "failed ({})", reason),
            Self::Stopped => write!(f, "stopped"),
        }
    }
}

// ============================================================================
// ServiceActivator
// ============================================================================

/// 서비스 의존성을 선언하는 기동 단위
///
/// `needed_services`가 모두 바인딩되면 `start`, 그중 하나라도 사라지면 `stop`이
/// 호출된다. `optional_services`는 선언만 하고 기동 조건에는 들어가지 않는다.
pub trait ServiceActivator: Send + Sync {
    /// 액티베이터 이름 (호스트 안에서 유일)
    fn name(&self) -> &str;

    /// 필수 capability
    fn needed_services(&self) -> Vec<CapabilityId>;

    /// 선택 capability
    fn optional_services(&self) -> Vec<CapabilityId> {
        Vec::new()
    }

    /// 필수 서비스가 모두 갖춰졌을 때
    fn start(&self, facade: &ServiceRegistryFacade) -> Result<()>;

    /// 필수 서비스가 사라졌거나 호스트가 종료될 때
    fn stop(&self, _facade: &ServiceRegistryFacade) -> Result<()> {
        Ok(())
    }
}
