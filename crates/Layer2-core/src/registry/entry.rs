//! Registry Entry - 등록된 서비스 구현 하나

use chrono::{DateTime, Utc};
use std::cmp::Reverse;
use std::sync::Arc;

// ============================================================================
// EntryHandle - 항목 식별자
// ============================================================================

/// 등록 시 발급되는 항목 핸들 (제거에 사용)
///
/// 내부 값은 레지스트리 안에서 단조 증가하는 등록 순서이다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntryHandle(u64);

impl EntryHandle {
    pub(crate) fn new(order: u64) -> Self {
        Self(order)
    }

    /// 등록 순서 (작을수록 먼저 등록됨)
    pub fn order(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for EntryHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "entry-{}", self.0)
    }
}

// ============================================================================
// Insertion - 등록 결과
// ============================================================================

/// `RankedRegistry::insert`의 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Insertion {
    /// 새 항목 추가
    Added,

    /// 이미 있던 인스턴스의 랭크 갱신
    Reranked { previous: i32 },

    /// 이미 있던 인스턴스, 변경 없음
    Unchanged,
}

// ============================================================================
// ServiceEntry
// ============================================================================

/// 서비스 구현 인스턴스 + 랭크 + 등록 정보
pub struct ServiceEntry<T: ?Sized> {
    instance: Arc<T>,
    rank: i32,
    handle: EntryHandle,
    registered_at: DateTime<Utc>,
    label: Option<String>,
}

impl<T: ?Sized> ServiceEntry<T> {
    pub(crate) fn new(instance: Arc<T>, rank: i32, handle: EntryHandle) -> Self {
        Self {
            instance,
            rank,
            handle,
            registered_at: Utc::now(),
            label: None,
        }
    }

    pub(crate) fn with_label(mut self, label: Option<String>) -> Self {
        self.label = label;
        self
    }

    pub(crate) fn set_rank(&mut self, rank: i32) {
        self.rank = rank;
    }

    pub fn instance(&self) -> &Arc<T> {
        &self.instance
    }

    pub fn rank(&self) -> i32 {
        self.rank
    }

    pub fn handle(&self) -> EntryHandle {
        self.handle
    }

    pub fn order(&self) -> u64 {
        self.handle.order()
    }

    pub fn registered_at(&self) -> DateTime<Utc> {
        self.registered_at
    }

    /// 사람이 읽을 수 있는 이름 (선택)
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// 같은 인스턴스인지 (포인터 동일성)
    pub fn is_same_instance(&self, other: &Arc<T>) -> bool {
        same_instance(&self.instance, other)
    }

    /// 정렬 키: (rank desc, order asc)
    pub(crate) fn sort_key(&self) -> (Reverse<i32>, u64) {
        (Reverse(self.rank), self.handle.order())
    }
}

impl<T: ?Sized> Clone for ServiceEntry<T> {
    fn clone(&self) -> Self {
        Self {
            instance: Arc::clone(&self.instance),
            rank: self.rank,
            handle: self.handle,
            registered_at: self.registered_at,
            label: self.label.clone(),
        }
    }
}

impl<T: ?Sized> std::fmt::Debug for ServiceEntry<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceEntry")
            .field("handle", &self.handle)
            .field("rank", &self.rank)
            .field("label", &self.label)
            .field("registered_at", &self.registered_at)
            .finish_non_exhaustive()
    }
}

/// 두 Arc가 같은 할당을 가리키는지 (vtable 메타데이터는 무시)
pub(crate) fn same_instance<T: ?Sized>(a: &Arc<T>, b: &Arc<T>) -> bool {
    Arc::as_ptr(a).cast::<()>() == Arc::as_ptr(b).cast::<()>()
}
