//! Service Event Notifier - 추가/제거 이벤트를 리스너에게 전달

use super::capability::CapabilityId;
use super::entry::EntryHandle;
use super::traits::{ListenerId, ServiceEvent, ServiceEventKind, ServiceListener};
use locator_foundation::Error;
use parking_lot::RwLock;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, error, trace};

/// 등록된 리스너 정보
struct RegisteredListener<T: ?Sized> {
    id: ListenerId,
    listener: Arc<dyn ServiceListener<T>>,
}

impl<T: ?Sized> Clone for RegisteredListener<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            listener: Arc::clone(&self.listener),
        }
    }
}

/// 서비스 이벤트 알리미
///
/// 리스너는 구독 순서대로 동기 호출된다. 호출 전에 리스너 목록을 복제하고
/// 잠금을 풀기 때문에, 리스너 안에서 구독/해제하거나 레지스트리를 다시
/// 호출해도 교착되지 않는다.
pub struct ServiceEventNotifier<T: ?Sized> {
    /// 이벤트가 속한 capability
    capability: CapabilityId,

    /// 등록된 리스너 (copy-on-write)
    listeners: RwLock<Arc<Vec<RegisteredListener<T>>>>,

    /// 리스너 ID 카운터
    listener_counter: AtomicU64,

    /// 브로드캐스트 채널 송신자
    sender: broadcast::Sender<ServiceEvent<T>>,

    /// 발행된 이벤트 수
    event_count: AtomicU64,

    /// 디버그 모드 (모든 이벤트 trace 로깅)
    debug_mode: bool,
}

impl<T: ?Sized + Send + Sync + 'static> ServiceEventNotifier<T> {
    pub fn new(capability: CapabilityId, channel_capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(channel_capacity.max(1));
        Self {
            capability,
            listeners: RwLock::new(Arc::new(Vec::new())),
            listener_counter: AtomicU64::new(0),
            sender,
            event_count: AtomicU64::new(0),
            debug_mode: false,
        }
    }

    pub fn with_debug_mode(mut self, debug_mode: bool) -> Self {
        self.debug_mode = debug_mode;
        self
    }

    // ========================================================================
    // 구독
    // ========================================================================

    /// 리스너 등록
    pub fn subscribe(&self, listener: Arc<dyn ServiceListener<T>>) -> ListenerId {
        let id = ListenerId::new(self.listener_counter.fetch_add(1, Ordering::SeqCst));

        debug!(
            capability = %self.capability,
            listener_name = listener.name(),
            listener_id = %id,
            "Registering service listener"
        );

        let mut listeners = self.listeners.write();
        Arc::make_mut(&mut *listeners).push(RegisteredListener { id, listener });

        id
    }

    /// 리스너 해제
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.write();
        let Some(pos) = listeners.iter().position(|l| l.id == id) else {
            return false;
        };
        Arc::make_mut(&mut *listeners).remove(pos);

        debug!(capability = %self.capability, listener_id = %id, "Unregistered service listener");
        true
    }

    /// 브로드캐스트 수신자 생성 (스트림 방식)
    pub fn receiver(&self) -> broadcast::Receiver<ServiceEvent<T>> {
        self.sender.subscribe()
    }

    // ========================================================================
    // 발행
    // ========================================================================

    pub fn publish_added(&self, instance: Arc<T>, handle: EntryHandle, rank: i32) {
        self.publish(self.event(ServiceEventKind::Added, instance, handle, rank));
    }

    pub fn publish_removed(&self, instance: Arc<T>, handle: EntryHandle, rank: i32) {
        self.publish(self.event(ServiceEventKind::Removed, instance, handle, rank));
    }

    pub fn publish_modified(&self, instance: Arc<T>, handle: EntryHandle, rank: i32) {
        self.publish(self.event(ServiceEventKind::Modified, instance, handle, rank));
    }

    fn event(&self, kind: ServiceEventKind, instance: Arc<T>, handle: EntryHandle, rank: i32) -> ServiceEvent<T> {
        ServiceEvent {
            kind,
            capability: self.capability.clone(),
            instance,
            handle,
            rank,
        }
    }

    /// 이벤트 발행
    ///
    /// 리스너 실패(에러 반환 또는 panic)는 여기서 잡아 로깅하고 다음 리스너로 넘어간다.
    pub fn publish(&self, event: ServiceEvent<T>) {
        let event_count = self.event_count.fetch_add(1, Ordering::SeqCst);

        if self.debug_mode {
            trace!(
                capability = %self.capability,
                kind = %event.kind,
                handle = %event.handle,
                rank = event.rank,
                "Publishing service event #{}", event_count + 1
            );
        }

        // 수신자가 없으면 Err - 무시
        let _ = self.sender.send(event.clone());

        let listeners = Arc::clone(&*self.listeners.read());
        for registered in listeners.iter() {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| registered.listener.on_event(&event)));

            let failure = match outcome {
                Ok(Ok(())) => continue,
                Ok(Err(e)) => Error::listener_failure(registered.listener.name(), e.to_string()),
                Err(payload) => {
                    Error::listener_failure(registered.listener.name(), panic_message(&*payload))
                }
            };

            error!(
                capability = %self.capability,
                listener_id = %registered.id,
                kind = %event.kind,
                "{}", failure
            );
        }
    }

    // ========================================================================
    // 통계
    // ========================================================================

    /// 등록된 리스너 수
    pub fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }

    /// 총 발행된 이벤트 수
    pub fn event_count(&self) -> u64 {
        self.event_count.load(Ordering::SeqCst)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panicked: {}", s)
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panicked: {}", s)
    } else {
        "panicked".to_string()
    }
}
