//! Registry Traits - 서비스 이벤트와 리스너 인터페이스

use super::capability::CapabilityId;
use super::entry::EntryHandle;
use locator_foundation::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

// ============================================================================
// ServiceEventKind
// ============================================================================

/// 서비스 이벤트 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceEventKind {
    /// 구현 추가됨
    Added,

    /// 이미 있던 구현의 랭크가 바뀜 (DuplicatePolicy::Replace)
    Modified,

    /// 구현 제거됨
    Removed,
}

impl std::fmt::Display for ServiceEventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Added => write!(f, "added"),
            Self::Modified => write!(f, "modified"),
            Self::Removed => write!(f, "removed"),
        }
    }
}

// ============================================================================
// ServiceEvent
// ============================================================================

/// 하나의 capability에서 발생한 서비스 이벤트
pub struct ServiceEvent<T: ?Sized> {
    pub kind: ServiceEventKind,
    pub capability: CapabilityId,
    pub instance: Arc<T>,
    pub handle: EntryHandle,
    pub rank: i32,
}

impl<T: ?Sized> Clone for ServiceEvent<T> {
    fn clone(&self) -> Self {
        Self {
            kind: self.kind,
            capability: self.capability.clone(),
            instance: Arc::clone(&self.instance),
            handle: self.handle,
            rank: self.rank,
        }
    }
}

impl<T: ?Sized> std::fmt::Debug for ServiceEvent<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceEvent")
            .field("kind", &self.kind)
            .field("capability", &self.capability)
            .field("handle", &self.handle)
            .field("rank", &self.rank)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// CapabilityEvent - 타입이 지워진 변경 알림
// ============================================================================

/// facade 단위 변경 알림 (인스턴스 없이 capability만)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapabilityEvent {
    pub capability: CapabilityId,
    pub kind: ServiceEventKind,
    /// 이벤트 직후 남아 있는 구현 수
    pub remaining: usize,
}

// ============================================================================
// ListenerId
// ============================================================================

/// 리스너 ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

impl ListenerId {
    pub(crate) fn new(id: u64) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for ListenerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "listener-{}", self.0)
    }
}

// ============================================================================
// ServiceListener
// ============================================================================

/// 서비스 이벤트 리스너
///
/// 변경을 일으킨 스레드에서 동기적으로, 레지스트리 잠금이 풀린 뒤 호출된다.
/// 에러를 반환하거나 panic해도 다른 리스너와 레지스트리 상태에는 영향이 없다.
pub trait ServiceListener<T: ?Sized>: Send + Sync {
    /// 리스너 이름 (로깅용)
    fn name(&self) -> &str;

    /// 이벤트 처리
    fn on_event(&self, event: &ServiceEvent<T>) -> Result<()>;
}

/// 클로저 기반 리스너
pub struct FnListener<F> {
    name: String,
    handler: F,
}

impl<F> FnListener<F> {
    pub fn new(name: impl Into<String>, handler: F) -> Self {
        Self {
            name: name.into(),
            handler,
        }
    }
}

impl<T, F> ServiceListener<T> for FnListener<F>
where
    T: ?Sized,
    F: Fn(&ServiceEvent<T>) -> Result<()> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn on_event(&self, event: &ServiceEvent<T>) -> Result<()> {
        (self.handler)(event)
    }
}
