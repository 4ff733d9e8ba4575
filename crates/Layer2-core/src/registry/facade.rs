//! Service Registry Facade - capability별 트래커를 관리하는 진입점
//!
//! 프로세스 전체에서 하나를 만들어 `Arc`로 공유한다. 제공자는 `register`로
//! 구현을 올리고, 소비자는 `get`/`get_optional`/`current`로 조회한다.

use super::capability::{Capability, CapabilityId};
use super::entry::EntryHandle;
use super::snapshot::Snapshot;
use super::tracker::{DynamicServiceTracker, TrackerState};
use super::traits::CapabilityEvent;
use locator_foundation::{Error, RegistryConfig, Result};
use parking_lot::RwLock;
use serde::Serialize;
use std::any::Any;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

// ============================================================================
// Requirement
// ============================================================================

/// capability 의존 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Requirement {
    /// 없어도 동작 (조회 실패는 정상)
    Optional,

    /// 반드시 필요 (없으면 경고)
    Mandatory,
}

impl std::fmt::Display for Requirement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Optional => write!(f, "optional"),
            Self::Mandatory => write!(f, "mandatory"),
        }
    }
}

// ============================================================================
// TrackerHandle - 타입이 지워진 트래커
// ============================================================================

trait TrackerHandle: Send + Sync {
    fn capability(&self) -> &CapabilityId;
    fn len(&self) -> usize;
    fn state(&self) -> TrackerState;
    fn close(&self) -> usize;
    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

impl<T: ?Sized + Send + Sync + 'static> TrackerHandle for DynamicServiceTracker<T> {
    fn capability(&self) -> &CapabilityId {
        DynamicServiceTracker::capability(self)
    }

    fn len(&self) -> usize {
        DynamicServiceTracker::len(self)
    }

    fn state(&self) -> TrackerState {
        DynamicServiceTracker::state(self)
    }

    fn close(&self) -> usize {
        DynamicServiceTracker::close(self)
    }

    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

struct TrackerSlot {
    tracker: Arc<dyn TrackerHandle>,
    /// 생성 순서 (clear_registry 시 역순으로 닫음)
    created: u64,
}

impl TrackerSlot {
    fn typed<T: ?Sized + Send + Sync + 'static>(&self) -> Option<Arc<DynamicServiceTracker<T>>> {
        Arc::clone(&self.tracker).as_any().downcast().ok()
    }
}

// ============================================================================
// RegistryStats
// ============================================================================

/// capability 하나의 요약
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CapabilityStats {
    pub capability: String,
    pub service_type: &'static str,
    pub requirement: Requirement,
    pub state: TrackerState,
    pub entries: usize,
}

/// 레지스트리 전체 요약
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryStats {
    pub trackers: usize,
    pub mandatory: usize,
    pub unsatisfied_mandatory: usize,
    pub entries: usize,
    pub capabilities: Vec<CapabilityStats>,
}

// ============================================================================
// ServiceRegistryFacade
// ============================================================================

/// capability → 트래커 맵을 소유하는 레지스트리 진입점
///
/// 맵 잠금은 트래커를 찾거나 만드는 동안만 잡는다. 트래커 변경(추가/제거/닫기)은
/// 항상 맵 잠금을 놓은 뒤에 일어난다. 잠금 순서: trackers → requirements.
pub struct ServiceRegistryFacade {
    config: RegistryConfig,
    trackers: RwLock<HashMap<CapabilityId, TrackerSlot>>,
    /// 선언된 의존 종류 (트래커보다 먼저 선언될 수 있음)
    requirements: RwLock<HashMap<CapabilityId, Requirement>>,
    created_counter: AtomicU64,
    changes: broadcast::Sender<CapabilityEvent>,
}

impl ServiceRegistryFacade {
    pub fn new(config: RegistryConfig) -> Self {
        let (changes, _) = broadcast::channel(config.event_capacity.max(1));
        Self {
            config,
            trackers: RwLock::new(HashMap::new()),
            requirements: RwLock::new(HashMap::new()),
            created_counter: AtomicU64::new(0),
            changes,
        }
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    // ========================================================================
    // 트래커
    // ========================================================================

    /// 트래커 가져오기 (없거나 닫혔으면 새로 만들어 open)
    ///
    /// 어느 한 곳에서라도 `Mandatory`로 선언하면 그 capability는 필수가 된다.
    /// 소비자가 `close`한 트래커는 버리고 빈 트래커로 바꾼다.
    pub fn track<T>(&self, capability: &Capability<T>, requirement: Requirement) -> Arc<DynamicServiceTracker<T>>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        let requirement = self.declare(capability.id(), requirement);
        let mut trackers = self.trackers.write();

        if let Some(tracker) = trackers.get(capability.id()).and_then(TrackerSlot::typed::<T>) {
            if tracker.state() != TrackerState::Closed {
                return tracker;
            }
            debug!(capability = %capability, "Replacing closed tracker");
        }

        let tracker = Arc::new(
            DynamicServiceTracker::new(capability, &self.config).with_changes(self.changes.clone()),
        );
        tracker.open();

        let created = self.created_counter.fetch_add(1, Ordering::SeqCst);
        trackers.insert(
            capability.id().clone(),
            TrackerSlot {
                tracker: Arc::clone(&tracker) as Arc<dyn TrackerHandle>,
                created,
            },
        );

        info!(
            capability = %capability,
            service_type = capability.id().type_name(),
            requirement = %requirement,
            "Tracking capability"
        );

        tracker
    }

    /// 의존 종류 선언 (트래커 생성 없이). 반환값은 병합된 의존 종류.
    pub fn declare(&self, id: &CapabilityId, requirement: Requirement) -> Requirement {
        let mut requirements = self.requirements.write();
        let declared = requirements.entry(id.clone()).or_insert(requirement);
        if *declared < requirement {
            debug!(capability = %id, "Capability escalated to mandatory");
            *declared = requirement;
        }
        *declared
    }

    /// 이미 있는 트래커 조회 (닫힌 트래커는 없는 것으로 본다)
    pub fn tracker<T>(&self, capability: &Capability<T>) -> Option<Arc<DynamicServiceTracker<T>>>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.trackers
            .read()
            .get(capability.id())?
            .typed::<T>()
            .filter(|tracker| tracker.state() != TrackerState::Closed)
    }

    /// 선언된 의존 종류 (선언된 적 없으면 None)
    pub fn requirement(&self, id: &CapabilityId) -> Option<Requirement> {
        self.requirements.read().get(id).copied()
    }

    /// 추적 중인 capability 목록 (생성 순)
    pub fn capabilities(&self) -> Vec<CapabilityId> {
        let trackers = self.trackers.read();
        let mut slots: Vec<_> = trackers.values().collect();
        slots.sort_by_key(|slot| slot.created);
        slots.iter().map(|slot| slot.tracker.capability().clone()).collect()
    }

    // ========================================================================
    // 등록 / 해제
    // ========================================================================

    /// 구현 등록
    pub fn register<T>(&self, capability: &Capability<T>, instance: Arc<T>, rank: i32) -> Option<EntryHandle>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.track(capability, Requirement::Optional).added(instance, rank)
    }

    /// 라벨과 함께 구현 등록
    pub fn register_labeled<T>(
        &self,
        capability: &Capability<T>,
        instance: Arc<T>,
        rank: i32,
        label: impl Into<String>,
    ) -> Option<EntryHandle>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.track(capability, Requirement::Optional)
            .added_with_label(instance, rank, Some(label.into()))
    }

    /// 기본 랭크(`defaultRank`)로 구현 등록
    pub fn register_default<T>(&self, capability: &Capability<T>, instance: Arc<T>) -> Option<EntryHandle>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.register(capability, instance, self.config.default_rank)
    }

    /// 구현 해제
    pub fn unregister<T>(&self, capability: &Capability<T>, instance: &Arc<T>) -> bool
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.tracker(capability)
            .is_some_and(|tracker| tracker.removed(instance))
    }

    /// 등록 때 받은 핸들로 구현 해제
    pub fn unregister_handle<T>(&self, capability: &Capability<T>, handle: EntryHandle) -> bool
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.tracker(capability)
            .is_some_and(|tracker| tracker.remove_handle(handle))
    }

    // ========================================================================
    // 조회
    // ========================================================================

    /// 나열된 capability가 모두 하나 이상 바인딩되어 있는지
    pub fn require_all<'a>(&self, ids: impl IntoIterator<Item = &'a CapabilityId>) -> bool {
        let trackers = self.trackers.read();
        ids.into_iter()
            .all(|id| trackers.get(id).is_some_and(|slot| slot.tracker.len() > 0))
    }

    /// 바인딩되지 않은 capability 목록
    pub fn missing<'a>(&self, ids: impl IntoIterator<Item = &'a CapabilityId>) -> Vec<CapabilityId> {
        let trackers = self.trackers.read();
        ids.into_iter()
            .filter(|id| !trackers.get(*id).is_some_and(|slot| slot.tracker.len() > 0))
            .cloned()
            .collect()
    }

    /// 최우선 구현 조회 (없으면 ServiceUnavailable)
    pub fn get<T>(&self, capability: &Capability<T>) -> Result<Arc<T>>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        if let Some(instance) = self.get_optional(capability) {
            return Ok(instance);
        }

        if self.requirement(capability.id()) == Some(Requirement::Mandatory) {
            warn!(capability = %capability, "Mandatory service unavailable");
        }
        Err(Error::service_unavailable(capability))
    }

    /// 최우선 구현 조회 (없으면 None)
    pub fn get_optional<T>(&self, capability: &Capability<T>) -> Option<Arc<T>>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.tracker(capability)?.best_or_null()
    }

    /// 현재 구현 목록
    pub fn current<T>(&self, capability: &Capability<T>) -> Snapshot<T>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.tracker(capability)
            .map_or_else(Snapshot::empty, |tracker| tracker.current())
    }

    /// 타입 없는 변경 알림 스트림
    pub fn changes(&self) -> broadcast::Receiver<CapabilityEvent> {
        self.changes.subscribe()
    }

    // ========================================================================
    // 정리
    // ========================================================================

    /// 모든 트래커를 생성 역순으로 닫고 잊는다. 비워진 항목 수 반환.
    pub fn clear_registry(&self) -> usize {
        let mut slots: Vec<TrackerSlot> = {
            let mut trackers = self.trackers.write();
            self.requirements.write().clear();
            trackers.drain().map(|(_, slot)| slot).collect()
        };
        slots.sort_by(|a, b| b.created.cmp(&a.created));

        info!(trackers = slots.len(), "Clearing service registry");

        slots.iter().map(|slot| slot.tracker.close()).sum()
    }

    // ========================================================================
    // 통계
    // ========================================================================

    pub fn stats(&self) -> RegistryStats {
        let trackers = self.trackers.read();
        let requirements = self.requirements.read();
        let mut slots: Vec<_> = trackers.values().collect();
        slots.sort_by_key(|slot| slot.created);

        let capabilities: Vec<CapabilityStats> = slots
            .iter()
            .map(|slot| CapabilityStats {
                capability: slot.tracker.capability().name().to_string(),
                service_type: slot.tracker.capability().type_name(),
                requirement: requirements
                    .get(slot.tracker.capability())
                    .copied()
                    .unwrap_or(Requirement::Optional),
                state: slot.tracker.state(),
                entries: slot.tracker.len(),
            })
            .collect();

        RegistryStats {
            trackers: capabilities.len(),
            mandatory: capabilities
                .iter()
                .filter(|c| c.requirement == Requirement::Mandatory)
                .count(),
            unsatisfied_mandatory: capabilities
                .iter()
                .filter(|c| c.requirement == Requirement::Mandatory && c.entries == 0)
                .count(),
            entries: capabilities.iter().map(|c| c.entries).sum(),
            capabilities,
        }
    }
}

impl Default for ServiceRegistryFacade {
    fn default() -> Self {
        Self::new(RegistryConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    trait Clock: Send + Sync {
        fn now(&self) -> u64;
    }

    struct Fixed(u64);

    impl Clock for Fixed {
        fn now(&self) -> u64 {
            self.0
        }
    }

    fn clock_capability() -> Capability<dyn Clock> {
        Capability::new("clock")
    }

    #[test]
    fn test_track_returns_same_tracker() {
        let facade = ServiceRegistryFacade::default();
        let cap = clock_capability();

        let a = facade.track(&cap, Requirement::Optional);
        let b = facade.track(&cap, Requirement::Optional);
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.state(), TrackerState::Open);
    }

    #[test]
    fn test_mandatory_escalation_is_sticky() {
        let facade = ServiceRegistryFacade::default();
        let cap = clock_capability();

        facade.track(&cap, Requirement::Optional);
        facade.track(&cap, Requirement::Mandatory);
        facade.track(&cap, Requirement::Optional);

        assert_eq!(facade.requirement(cap.id()), Some(Requirement::Mandatory));
    }

    #[test]
    fn test_declare_before_track() {
        let facade = ServiceRegistryFacade::default();
        let cap = clock_capability();

        assert_eq!(facade.declare(cap.id(), Requirement::Mandatory), Requirement::Mandatory);
        assert!(facade.capabilities().is_empty());

        facade.register(&cap, Arc::new(Fixed(3)), 0);
        assert_eq!(facade.requirement(cap.id()), Some(Requirement::Mandatory));
        assert_eq!(facade.stats().mandatory, 1);
    }

    #[test]
    fn test_get_and_get_optional() {
        let facade = ServiceRegistryFacade::default();
        let cap = clock_capability();
        facade.track(&cap, Requirement::Mandatory);

        assert!(matches!(facade.get(&cap), Err(Error::ServiceUnavailable { .. })));
        assert!(facade.get_optional(&cap).is_none());

        facade.register(&cap, Arc::new(Fixed(7)), 0);
        assert_eq!(facade.get(&cap).unwrap().now(), 7);
    }

    #[test]
    fn test_untracked_capability_lookups() {
        let facade = ServiceRegistryFacade::default();
        let cap = clock_capability();

        assert!(facade.get_optional(&cap).is_none());
        assert!(facade.current(&cap).is_empty());
        assert!(!facade.unregister(&cap, &(Arc::new(Fixed(0)) as Arc<dyn Clock>)));
        assert!(!facade.require_all([cap.id()]));
    }

    #[test]
    fn test_require_all_and_missing() {
        let facade = ServiceRegistryFacade::default();
        let clock = clock_capability();
        let name = Capability::<str>::new("name");

        facade.register(&clock, Arc::new(Fixed(1)), 0);
        let ids = [clock.id().clone(), name.id().clone()];

        assert!(!facade.require_all(&ids));
        assert_eq!(facade.missing(&ids), vec![name.id().clone()]);

        facade.register(&name, Arc::from("locator"), 0);
        assert!(facade.require_all(&ids));
        assert!(facade.missing(&ids).is_empty());
    }

    #[test]
    fn test_register_default_uses_configured_rank() {
        let facade = ServiceRegistryFacade::new(RegistryConfig::default().default_rank(42));
        let cap = clock_capability();
        facade.register_default(&cap, Arc::new(Fixed(1)));

        assert_eq!(facade.current(&cap).entries()[0].rank(), 42);
    }

    #[test]
    fn test_stats() {
        let facade = ServiceRegistryFacade::default();
        let clock = clock_capability();
        let name = Capability::<str>::new("name");

        facade.track(&clock, Requirement::Mandatory);
        facade.register_labeled(&name, Arc::from("a"), 1, "first");
        facade.register(&name, Arc::from("b"), 2);

        let stats = facade.stats();
        assert_eq!(stats.trackers, 2);
        assert_eq!(stats.mandatory, 1);
        assert_eq!(stats.unsatisfied_mandatory, 1);
        assert_eq!(stats.entries, 2);
        assert_eq!(stats.capabilities[0].capability, "clock");
    }

    #[test]
    fn test_clear_registry_closes_trackers() {
        let facade = ServiceRegistryFacade::default();
        let cap = clock_capability();
        facade.register(&cap, Arc::new(Fixed(1)), 0);
        facade.register(&cap, Arc::new(Fixed(2)), 0);
        let tracker = facade.track(&cap, Requirement::Optional);

        assert_eq!(facade.clear_registry(), 2);
        assert_eq!(tracker.state(), TrackerState::Closed);
        assert!(facade.capabilities().is_empty());
        assert!(facade.get_optional(&cap).is_none());

        // 다시 추적하면 새 트래커
        let fresh = facade.track(&cap, Requirement::Optional);
        assert!(!Arc::ptr_eq(&tracker, &fresh));
        assert_eq!(fresh.state(), TrackerState::Open);
    }

    #[test]
    fn test_register_after_consumer_closed_tracker() {
        let facade = ServiceRegistryFacade::default();
        let cap = Capability::<str>::new("name");

        let closed = facade.track(&cap, Requirement::Optional);
        closed.close();
        assert!(facade.tracker(&cap).is_none());

        assert!(facade.register(&cap, Arc::from("impl"), 5).is_some());
        assert_eq!(&*facade.get(&cap).unwrap(), "impl");

        let fresh = facade.track(&cap, Requirement::Optional);
        assert!(!Arc::ptr_eq(&closed, &fresh));
        assert_eq!(fresh.state(), TrackerState::Open);
        assert_eq!(facade.capabilities().len(), 1);
    }

    #[test]
    fn test_unregister_by_handle() {
        let facade = ServiceRegistryFacade::default();
        let cap = clock_capability();
        let fast = facade.register(&cap, Arc::new(Fixed(1)), 10).unwrap();
        facade.register(&cap, Arc::new(Fixed(2)), 0);

        assert!(facade.unregister_handle(&cap, fast));
        assert!(!facade.unregister_handle(&cap, fast));
        assert_eq!(facade.get(&cap).unwrap().now(), 2);
    }

    #[test]
    fn test_changes_stream() {
        let facade = ServiceRegistryFacade::default();
        let mut changes = facade.changes();
        let cap = clock_capability();

        let clock: Arc<dyn Clock> = Arc::new(Fixed(1));
        facade.register(&cap, Arc::clone(&clock), 0);
        facade.unregister(&cap, &clock);

        let added = changes.try_recv().unwrap();
        assert_eq!(added.kind, crate::registry::ServiceEventKind::Added);
        assert_eq!(added.remaining, 1);

        let removed = changes.try_recv().unwrap();
        assert_eq!(removed.kind, crate::registry::ServiceEventKind::Removed);
        assert_eq!(removed.remaining, 0);
        assert_eq!(&removed.capability, cap.id());
    }
}
