//! Registry Snapshot - 특정 시점의 정렬된 항목 목록

use super::entry::ServiceEntry;
use std::sync::Arc;

/// 특정 시점의 항목 목록 (rank desc, order asc 순서)
///
/// 레지스트리가 변경될 때마다 새 목록으로 교체되므로 스냅샷 자체는
/// 이후 변경의 영향을 받지 않는다. 몇 번이든 다시 순회할 수 있다.
pub struct Snapshot<T: ?Sized> {
    entries: Arc<Vec<ServiceEntry<T>>>,
}

impl<T: ?Sized> Snapshot<T> {
    pub(crate) fn new(entries: Arc<Vec<ServiceEntry<T>>>) -> Self {
        Self { entries }
    }

    /// 빈 스냅샷
    pub fn empty() -> Self {
        Self {
            entries: Arc::new(Vec::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 가장 우선순위가 높은 인스턴스
    pub fn best(&self) -> Option<&Arc<T>> {
        self.entries.first().map(|e| e.instance())
    }

    /// 인스턴스 순회
    pub fn iter(&self) -> SnapshotIter<'_, T> {
        SnapshotIter {
            inner: self.entries.iter(),
        }
    }

    /// 항목 (랭크/핸들/라벨 포함)
    pub fn entries(&self) -> &[ServiceEntry<T>] {
        &self.entries
    }

    /// 인스턴스 목록으로 변환
    pub fn to_vec(&self) -> Vec<Arc<T>> {
        self.iter().cloned().collect()
    }
}

impl<T: ?Sized> Clone for Snapshot<T> {
    fn clone(&self) -> Self {
        Self {
            entries: Arc::clone(&self.entries),
        }
    }
}

impl<T: ?Sized> std::fmt::Debug for Snapshot<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.entries.iter()).finish()
    }
}

impl<'a, T: ?Sized> IntoIterator for &'a Snapshot<T> {
    type Item = &'a Arc<T>;
    type IntoIter = SnapshotIter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// 스냅샷 인스턴스 이터레이터
pub struct SnapshotIter<'a, T: ?Sized> {
    inner: std::slice::Iter<'a, ServiceEntry<T>>,
}

impl<'a, T: ?Sized> Iterator for SnapshotIter<'a, T> {
    type Item = &'a Arc<T>;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|e| e.instance())
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<T: ?Sized> DoubleEndedIterator for SnapshotIter<'_, T> {
    fn next_back(&mut self) -> Option<Self::Item> {
        self.inner.next_back().map(|e| e.instance())
    }
}

impl<T: ?Sized> ExactSizeIterator for SnapshotIter<'_, T> {}
