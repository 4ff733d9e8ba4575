//! Ranked Registry - 하나의 capability에 대한 랭크 정렬 항목 저장소

use super::entry::{EntryHandle, Insertion, ServiceEntry};
use super::snapshot::Snapshot;
use locator_foundation::DuplicatePolicy;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// 랭크 정렬 레지스트리
///
/// 항목은 항상 `(rank desc, order asc)` 순서로 유지된다.
/// 변경은 쓰기 잠금 아래에서 새 `Arc<Vec<_>>`로 교체(copy-on-write)되므로,
/// 읽기(`best`, `snapshot`)는 `Arc` 복제만큼만 잠금을 잡는다.
pub struct RankedRegistry<T: ?Sized> {
    entries: RwLock<Arc<Vec<ServiceEntry<T>>>>,
    next_order: AtomicU64,
    policy: DuplicatePolicy,
}

impl<T: ?Sized> RankedRegistry<T> {
    /// 기본 정책(Reject)으로 생성
    pub fn new() -> Self {
        Self::with_policy(DuplicatePolicy::default())
    }

    pub fn with_policy(policy: DuplicatePolicy) -> Self {
        Self {
            entries: RwLock::new(Arc::new(Vec::new())),
            next_order: AtomicU64::new(0),
            policy,
        }
    }

    pub fn policy(&self) -> DuplicatePolicy {
        self.policy
    }

    // ========================================================================
    // 등록 / 해제
    // ========================================================================

    /// 인스턴스 등록, 핸들 반환
    pub fn add(&self, instance: Arc<T>, rank: i32) -> EntryHandle {
        self.insert(instance, rank, None).0
    }

    /// 인스턴스 등록 (결과 포함)
    ///
    /// 이미 있는 인스턴스라면 정책에 따라 무시하거나 랭크만 갱신한다.
    pub fn insert(&self, instance: Arc<T>, rank: i32, label: Option<String>) -> (EntryHandle, Insertion) {
        let mut guard = self.entries.write();

        if let Some(pos) = guard.iter().position(|e| e.is_same_instance(&instance)) {
            let handle = guard[pos].handle();
            let previous = guard[pos].rank();

            if self.policy == DuplicatePolicy::Reject || previous == rank {
                return (handle, Insertion::Unchanged);
            }

            let entries = Arc::make_mut(&mut *guard);
            let mut entry = entries.remove(pos);
            entry.set_rank(rank);
            Self::insert_sorted(entries, entry);
            return (handle, Insertion::Reranked { previous });
        }

        let handle = EntryHandle::new(self.next_order.fetch_add(1, Ordering::SeqCst));
        let entry = ServiceEntry::new(instance, rank, handle).with_label(label);
        Self::insert_sorted(Arc::make_mut(&mut *guard), entry);

        (handle, Insertion::Added)
    }

    fn insert_sorted(entries: &mut Vec<ServiceEntry<T>>, entry: ServiceEntry<T>) {
        let key = entry.sort_key();
        let at = entries.partition_point(|e| e.sort_key() < key);
        entries.insert(at, entry);
    }

    /// 핸들로 제거 (이미 제거되었으면 None)
    pub fn remove(&self, handle: EntryHandle) -> Option<ServiceEntry<T>> {
        let mut guard = self.entries.write();
        let pos = guard.iter().position(|e| e.handle() == handle)?;
        Some(Arc::make_mut(&mut *guard).remove(pos))
    }

    /// 인스턴스로 제거
    pub fn remove_instance(&self, instance: &Arc<T>) -> Option<ServiceEntry<T>> {
        let mut guard = self.entries.write();
        let pos = guard.iter().position(|e| e.is_same_instance(instance))?;
        Some(Arc::make_mut(&mut *guard).remove(pos))
    }

    /// 전체 비우기 - 등록 역순(LIFO)으로 반환
    pub fn drain_lifo(&self) -> Vec<ServiceEntry<T>> {
        let taken = std::mem::take(&mut *self.entries.write());
        let mut drained = Arc::try_unwrap(taken).unwrap_or_else(|shared| shared.as_ref().clone());
        drained.sort_by(|a, b| b.order().cmp(&a.order()));
        drained
    }

    // ========================================================================
    // 조회
    // ========================================================================

    /// 가장 우선순위가 높은 인스턴스
    pub fn best(&self) -> Option<Arc<T>> {
        self.entries.read().first().map(|e| Arc::clone(e.instance()))
    }

    /// 현재 시점 스냅샷
    pub fn snapshot(&self) -> Snapshot<T> {
        Snapshot::new(Arc::clone(&*self.entries.read()))
    }

    pub fn contains(&self, instance: &Arc<T>) -> bool {
        self.entries.read().iter().any(|e| e.is_same_instance(instance))
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl<T: ?Sized> Default for RankedRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}
