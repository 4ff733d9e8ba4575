//! locator-core: Core Runtime for Locator
//!
//! Layer2 - 서비스 레지스트리 런타임 레이어
//!
//! # 주요 모듈
//!
//! - `registry`: capability별 랭크 정렬 레지스트리, 이벤트 알리미, 트래커, facade
//! - `activator`: 필수 서비스 가용성에 따라 시작/정지되는 액티베이터 호스트
//!
//! # 사용 예시
//!
//! ```ignore
//! use locator_core::{ActivatorHost, Capability, Requirement, ServiceRegistryFacade};
//!
//! let facade = Arc::new(ServiceRegistryFacade::new(RegistryConfig::load()?));
//! let storage = Capability::<dyn ContextStorage>::new("context.storage");
//!
//! // 제공자
//! facade.register(&storage, Arc::new(SqlContextStorage::new(pool)), 100);
//!
//! // 소비자
//! facade.track(&storage, Requirement::Mandatory);
//! let best = facade.get(&storage)?;
//!
//! // 액티베이터
//! let host = Arc::new(ActivatorHost::new(Arc::clone(&facade)));
//! host.install(Arc::new(HousekeepingActivator::default()))?;
//! host.watch();
//! ```

pub mod activator;
pub mod registry;

// Re-exports: Registry
pub use registry::{
    Capability, CapabilityEvent, CapabilityId, CapabilityStats, DynamicServiceTracker, EntryHandle,
    FnListener, Insertion, ListenerId, RankedRegistry, RegistryStats, Requirement, ServiceEntry,
    ServiceEvent, ServiceEventKind, ServiceEventNotifier, ServiceListener, ServiceRegistryFacade,
    Snapshot, TrackerState,
};

// Re-exports: Activator
pub use activator::{ActivatorHost, ActivatorState, ServiceActivator};

// Re-exports: Foundation
pub use locator_foundation::{DuplicatePolicy, Error, RegistryConfig, Result};
