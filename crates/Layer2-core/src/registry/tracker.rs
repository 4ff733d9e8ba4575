//! Dynamic Service Tracker - capability 하나에 대한 레지스트리 + 알리미 묶음

use super::capability::{Capability, CapabilityId};
use super::entry::{EntryHandle, Insertion, ServiceEntry};
use super::notifier::ServiceEventNotifier;
use super::ranked::RankedRegistry;
use super::snapshot::Snapshot;
use super::traits::{CapabilityEvent, ListenerId, ServiceEvent, ServiceEventKind, ServiceListener};
use locator_foundation::{Error, RegistryConfig, Result};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

// ============================================================================
// TrackerState
// ============================================================================

/// 트래커 상태: Unstarted → Open → Closed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackerState {
    Unstarted,
    Open,
    Closed,
}

impl std::fmt::Display for TrackerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unstarted => write!(f, "unstarted"),
            Self::Open => write!(f, "open"),
            Self::Closed => write!(f, "closed"),
        }
    }
}

// ============================================================================
// Outbox - 트래커별 알림 대기열
// ============================================================================

/// 잠금 아래에서 쌓인 알림 한 건
struct Pending<T: ?Sized> {
    kind: ServiceEventKind,
    instance: Arc<T>,
    handle: EntryHandle,
    rank: i32,
    /// 변경 직후 남은 항목 수
    remaining: usize,
}

/// 알림 대기열. `dispatching`이 true인 동안은 한 스레드만 전달한다.
struct Outbox<T: ?Sized> {
    queue: VecDeque<Pending<T>>,
    dispatching: bool,
}

// ============================================================================
// DynamicServiceTracker
// ============================================================================

/// 소비자가 붙잡고 있는 capability 단위 트래커
///
/// `Open` 상태에서만 `added`/`removed`가 상태를 바꾼다. 상태 확인과 변경,
/// 알림 대기열 적재는 `lifecycle` 잠금 아래에서 함께 일어난다
/// (잠금 순서: lifecycle → registry → outbox).
///
/// 리스너 알림은 잠금이 모두 풀린 뒤 한 번에 한 스레드가 대기열 순서대로 전달한다.
/// 그래서 리스너가 받는 이벤트 순서는 레지스트리가 바뀐 순서와 같다.
/// 리스너 안에서 같은 트래커를 바꾸면 그 알림은 대기열에 쌓였다가
/// 현재 리스너가 끝난 뒤 전달된다.
pub struct DynamicServiceTracker<T: ?Sized> {
    capability: CapabilityId,
    registry: RankedRegistry<T>,
    notifier: ServiceEventNotifier<T>,
    lifecycle: Mutex<TrackerState>,
    outbox: Mutex<Outbox<T>>,
    /// facade로 올려 보내는 타입 없는 변경 알림
    changes: Option<broadcast::Sender<CapabilityEvent>>,
}

impl<T: ?Sized + Send + Sync + 'static> DynamicServiceTracker<T> {
    /// 새 트래커 생성 (Unstarted)
    pub fn new(capability: &Capability<T>, config: &RegistryConfig) -> Self {
        let id = capability.id().clone();
        Self {
            registry: RankedRegistry::with_policy(config.duplicate_policy),
            notifier: ServiceEventNotifier::new(id.clone(), config.event_capacity)
                .with_debug_mode(config.debug_mode),
            capability: id,
            lifecycle: Mutex::new(TrackerState::Unstarted),
            outbox: Mutex::new(Outbox {
                queue: VecDeque::new(),
                dispatching: false,
            }),
            changes: None,
        }
    }

    pub(crate) fn with_changes(mut self, changes: broadcast::Sender<CapabilityEvent>) -> Self {
        self.changes = Some(changes);
        self
    }

    // ========================================================================
    // 생명주기
    // ========================================================================

    /// Unstarted → Open. 이미 Open이면 true, Closed면 false.
    pub fn open(&self) -> bool {
        let mut state = self.lifecycle.lock();
        match *state {
            TrackerState::Unstarted => {
                *state = TrackerState::Open;
                debug!(capability = %self.capability, "Tracker opened");
                true
            }
            TrackerState::Open => true,
            TrackerState::Closed => {
                debug!(capability = %self.capability, "Tracker already closed, cannot reopen");
                false
            }
        }
    }

    /// Open → Closed. 모든 항목을 등록 역순으로 비우고 항목마다 제거 알림을 보낸다.
    ///
    /// 반환값은 비워진 항목 수. 두 번째 호출부터는 0.
    pub fn close(&self) -> usize {
        let total = {
            let mut state = self.lifecycle.lock();
            if *state == TrackerState::Closed {
                return 0;
            }
            *state = TrackerState::Closed;

            let drained = self.registry.drain_lifo();
            let total = drained.len();
            for (i, entry) in drained.into_iter().enumerate() {
                self.enqueue_removed(entry, total - i - 1);
            }
            total
        };

        info!(capability = %self.capability, entries = total, "Closed tracker");
        self.dispatch();
        total
    }

    pub fn state(&self) -> TrackerState {
        *self.lifecycle.lock()
    }

    // ========================================================================
    // 추가 / 제거
    // ========================================================================

    /// 구현 추가. Open이 아니면 None.
    pub fn added(&self, instance: Arc<T>, rank: i32) -> Option<EntryHandle> {
        self.added_with_label(instance, rank, None)
    }

    /// 라벨과 함께 구현 추가
    pub fn added_with_label(&self, instance: Arc<T>, rank: i32, label: Option<String>) -> Option<EntryHandle> {
        let (handle, insertion) = {
            let state = self.lifecycle.lock();
            if *state != TrackerState::Open {
                debug!(capability = %self.capability, state = %*state, "Ignoring add on inactive tracker");
                return None;
            }
            let (handle, insertion) = self.registry.insert(Arc::clone(&instance), rank, label);
            let kind = match insertion {
                Insertion::Added => Some(ServiceEventKind::Added),
                Insertion::Reranked { .. } => Some(ServiceEventKind::Modified),
                Insertion::Unchanged => None,
            };
            if let Some(kind) = kind {
                self.enqueue(Pending {
                    kind,
                    instance,
                    handle,
                    rank,
                    remaining: self.registry.len(),
                });
            }
            (handle, insertion)
        };

        match insertion {
            Insertion::Added => {
                debug!(capability = %self.capability, handle = %handle, rank, "Service added");
            }
            Insertion::Reranked { previous } => {
                debug!(capability = %self.capability, handle = %handle, previous, rank, "Service re-ranked");
            }
            Insertion::Unchanged => {
                warn!(
                    capability = %self.capability,
                    handle = %handle,
                    policy = %self.registry.policy(),
                    "Service instance already registered, ignoring"
                );
            }
        }

        self.dispatch();
        Some(handle)
    }

    /// 인스턴스로 구현 제거. 실제로 제거되었으면 true.
    pub fn removed(&self, instance: &Arc<T>) -> bool {
        self.remove_with(|registry| registry.remove_instance(instance))
    }

    /// 핸들로 구현 제거. 실제로 제거되었으면 true.
    pub fn remove_handle(&self, handle: EntryHandle) -> bool {
        self.remove_with(|registry| registry.remove(handle))
    }

    fn remove_with(&self, remove: impl FnOnce(&RankedRegistry<T>) -> Option<ServiceEntry<T>>) -> bool {
        let removed = {
            let state = self.lifecycle.lock();
            if *state != TrackerState::Open {
                return false;
            }
            match remove(&self.registry) {
                Some(entry) => {
                    debug!(capability = %self.capability, handle = %entry.handle(), rank = entry.rank(), "Service removed");
                    self.enqueue_removed(entry, self.registry.len());
                    true
                }
                None => false,
            }
        };

        if removed {
            self.dispatch();
        }
        removed
    }

    // ========================================================================
    // 알림 전달
    // ========================================================================

    fn enqueue_removed(&self, entry: ServiceEntry<T>, remaining: usize) {
        self.enqueue(Pending {
            kind: ServiceEventKind::Removed,
            instance: Arc::clone(entry.instance()),
            handle: entry.handle(),
            rank: entry.rank(),
            remaining,
        });
    }

    /// lifecycle 잠금을 잡은 채로 호출
    fn enqueue(&self, pending: Pending<T>) {
        self.outbox.lock().queue.push_back(pending);
    }

    /// 대기열을 비울 때까지 전달. 다른 스레드가 이미 전달 중이면 바로 반환.
    fn dispatch(&self) {
        {
            let mut outbox = self.outbox.lock();
            if outbox.dispatching {
                return;
            }
            outbox.dispatching = true;
        }

        loop {
            let next = {
                let mut outbox = self.outbox.lock();
                match outbox.queue.pop_front() {
                    Some(next) => next,
                    None => {
                        outbox.dispatching = false;
                        return;
                    }
                }
            };
            self.deliver(next);
        }
    }

    fn deliver(&self, pending: Pending<T>) {
        let Pending {
            kind,
            instance,
            handle,
            rank,
            remaining,
        } = pending;

        match kind {
            ServiceEventKind::Added => self.notifier.publish_added(instance, handle, rank),
            ServiceEventKind::Removed => self.notifier.publish_removed(instance, handle, rank),
            ServiceEventKind::Modified => self.notifier.publish_modified(instance, handle, rank),
        }

        if let Some(changes) = &self.changes {
            let _ = changes.send(CapabilityEvent {
                capability: self.capability.clone(),
                kind,
                remaining,
            });
        }
    }

    // ========================================================================
    // 조회
    // ========================================================================

    /// 현재 구현 목록 (우선순위 순)
    pub fn current(&self) -> Snapshot<T> {
        self.registry.snapshot()
    }

    /// 최우선 구현 (없으면 None)
    pub fn best_or_null(&self) -> Option<Arc<T>> {
        self.registry.best()
    }

    /// 최우선 구현 (없으면 ServiceUnavailable)
    pub fn best_or_throw(&self) -> Result<Arc<T>> {
        self.registry
            .best()
            .ok_or_else(|| Error::service_unavailable(&self.capability))
    }

    pub fn capability(&self) -> &CapabilityId {
        &self.capability
    }

    /// 구현이 하나 이상 바인딩되어 있는지
    pub fn is_bound(&self) -> bool {
        !self.registry.is_empty()
    }

    pub fn len(&self) -> usize {
        self.registry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }

    // ========================================================================
    // 이벤트
    // ========================================================================

    pub fn subscribe(&self, listener: Arc<dyn ServiceListener<T>>) -> ListenerId {
        self.notifier.subscribe(listener)
    }

    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        self.notifier.unsubscribe(id)
    }

    pub fn receiver(&self) -> broadcast::Receiver<ServiceEvent<T>> {
        self.notifier.receiver()
    }

    /// 총 발행된 이벤트 수
    pub fn event_count(&self) -> u64 {
        self.notifier.event_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::traits::FnListener;
    use locator_foundation::DuplicatePolicy;

    trait Greeter: Send + Sync {
        fn greet(&self) -> String;
    }

    struct Named(&'static str);

    impl Greeter for Named {
        fn greet(&self) -> String {
            self.0.to_string()
        }
    }

    fn greeter(name: &'static str) -> Arc<dyn Greeter> {
        Arc::new(Named(name))
    }

    fn open_tracker(config: &RegistryConfig) -> DynamicServiceTracker<dyn Greeter> {
        let tracker = DynamicServiceTracker::new(&Capability::<dyn Greeter>::new("greeter"), config);
        assert!(tracker.open());
        tracker
    }

    #[test]
    fn test_unstarted_tracker_ignores_changes() {
        let tracker = DynamicServiceTracker::new(
            &Capability::<dyn Greeter>::new("greeter"),
            &RegistryConfig::default(),
        );
        assert_eq!(tracker.state(), TrackerState::Unstarted);
        assert!(tracker.added(greeter("a"), 1).is_none());
        assert!(tracker.is_empty());
    }

    #[test]
    fn test_best_or_throw_and_null() {
        let tracker = open_tracker(&RegistryConfig::default());
        assert!(tracker.best_or_null().is_none());
        assert!(matches!(tracker.best_or_throw(), Err(Error::ServiceUnavailable { .. })));

        tracker.added(greeter("low"), 1);
        tracker.added(greeter("high"), 10);
        assert_eq!(tracker.best_or_throw().unwrap().greet(), "high");
    }

    #[test]
    fn test_close_drains_lifo_and_notifies() {
        let tracker = open_tracker(&RegistryConfig::default());
        let removed = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&removed);
        tracker.subscribe(Arc::new(FnListener::new("sink", move |e: &ServiceEvent<dyn Greeter>| -> Result<()> {
            if e.kind == ServiceEventKind::Removed {
                sink.lock().push(e.instance.greet());
            }
            Ok(())
        })));

        tracker.added(greeter("a"), 1);
        tracker.added(greeter("b"), 100);
        tracker.added(greeter("c"), 50);

        assert_eq!(tracker.close(), 3);
        assert_eq!(*removed.lock(), vec!["c", "b", "a"]);
        assert_eq!(tracker.state(), TrackerState::Closed);

        // 닫힌 뒤에는 no-op
        assert!(tracker.added(greeter("d"), 1).is_none());
        assert_eq!(tracker.close(), 0);
        assert!(!tracker.open());
        assert!(tracker.is_empty());
    }

    #[test]
    fn test_removed_only_once() {
        let tracker = open_tracker(&RegistryConfig::default());
        let svc = greeter("only");
        tracker.added(Arc::clone(&svc), 0);

        assert!(tracker.removed(&svc));
        assert!(!tracker.removed(&svc));
        // added 1 + removed 1
        assert_eq!(tracker.event_count(), 2);
    }

    #[test]
    fn test_duplicate_publishes_nothing_under_reject() {
        let tracker = open_tracker(&RegistryConfig::default());
        let svc = greeter("dup");
        let first = tracker.added(Arc::clone(&svc), 1);
        let second = tracker.added(Arc::clone(&svc), 1);

        assert_eq!(first, second);
        assert_eq!(tracker.len(), 1);
        assert_eq!(tracker.event_count(), 1);
    }

    #[test]
    fn test_rerank_publishes_modified_under_replace() {
        let config = RegistryConfig::default().duplicate_policy(DuplicatePolicy::Replace);
        let tracker = open_tracker(&config);
        let mut rx = tracker.receiver();

        let svc = greeter("svc");
        tracker.added(Arc::clone(&svc), 1);
        tracker.added(Arc::clone(&svc), 7);

        assert_eq!(rx.try_recv().unwrap().kind, ServiceEventKind::Added);
        let modified = rx.try_recv().unwrap();
        assert_eq!(modified.kind, ServiceEventKind::Modified);
        assert_eq!(modified.rank, 7);
    }

    #[test]
    fn test_listener_can_reenter_tracker() {
        let tracker = Arc::new(open_tracker(&RegistryConfig::default()));
        let weak = Arc::downgrade(&tracker);
        let seen = Arc::new(Mutex::new(0usize));
        let seen_in = Arc::clone(&seen);

        tracker.subscribe(Arc::new(FnListener::new("reentrant", move |_: &ServiceEvent<dyn Greeter>| -> Result<()> {
            if let Some(tracker) = weak.upgrade() {
                *seen_in.lock() = tracker.current().len();
            }
            Ok(())
        })));

        tracker.added(greeter("a"), 0);
        assert_eq!(*seen.lock(), 1);
    }

    #[test]
    fn test_remove_by_handle() {
        let tracker = open_tracker(&RegistryConfig::default());
        let keep = tracker.added(greeter("keep"), 5).unwrap();
        let gone = tracker.added(greeter("gone"), 9).unwrap();

        assert!(tracker.remove_handle(gone));
        assert!(!tracker.remove_handle(gone));
        assert_eq!(tracker.best_or_throw().unwrap().greet(), "keep");
        assert_eq!(tracker.current().entries()[0].handle(), keep);
    }

    #[test]
    fn test_nested_change_delivered_after_current_listener() {
        let tracker = Arc::new(open_tracker(&RegistryConfig::default()));
        let weak = Arc::downgrade(&tracker);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);

        tracker.subscribe(Arc::new(FnListener::new("chain", move |e: &ServiceEvent<dyn Greeter>| -> Result<()> {
            let name = e.instance.greet();
            sink.lock().push(format!("begin:{}", name));
            if name == "first" {
                if let Some(tracker) = weak.upgrade() {
                    // 리스너 안에서 추가해도 바로 반영되고, 알림은 뒤로 밀린다
                    assert!(tracker.added(greeter("second"), 0).is_some());
                    assert_eq!(tracker.len(), 2);
                }
            }
            sink.lock().push(format!("end:{}", name));
            Ok(())
        })));

        tracker.added(greeter("first"), 1);

        assert_eq!(
            *seen.lock(),
            vec!["begin:first", "end:first", "begin:second", "end:second"]
        );
    }
}
