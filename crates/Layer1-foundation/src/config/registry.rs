//! Registry Config - 레지스트리 설정
//!
//! 글로벌(`<config_dir>/locator/registry.json`)과 프로젝트(`.locator/registry.json`)
//! 설정을 병합한다. 프로젝트 설정이 우선.

use crate::storage::JsonStore;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// 설정 파일명
pub const REGISTRY_CONFIG_FILE: &str = "registry.json";

// ============================================================================
// DuplicatePolicy
// ============================================================================

/// 이미 등록된 인스턴스를 다시 등록할 때의 정책
///
/// 같은 랭크의 서로 다른 인스턴스는 정책과 무관하게 항상 허용된다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DuplicatePolicy {
    /// 기존 항목 유지, 재등록은 무시
    #[default]
    Reject,

    /// 기존 항목의 랭크를 새 값으로 갱신 (등록 순서는 유지)
    Replace,
}

impl std::fmt::Display for DuplicatePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Reject => write!(f, "reject"),
            Self::Replace => write!(f, "replace"),
        }
    }
}

// ============================================================================
// RegistryConfig
// ============================================================================

/// 레지스트리 설정 (확정된 값)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryConfig {
    /// 버전 (마이그레이션용)
    pub version: u32,

    /// 중복 등록 정책
    pub duplicate_policy: DuplicatePolicy,

    /// 랭크를 지정하지 않은 등록에 쓰이는 기본 랭크
    pub default_rank: i32,

    /// 브로드캐스트 채널 용량
    pub event_capacity: usize,

    /// 디버그 모드 (발행되는 모든 이벤트를 trace 로깅)
    pub debug_mode: bool,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            version: 1,
            duplicate_policy: DuplicatePolicy::Reject,
            default_rank: 0,
            event_capacity: 256,
            debug_mode: false,
        }
    }
}

impl RegistryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // Load
    // ========================================================================

    /// 글로벌 + 프로젝트 병합 로드
    pub fn load() -> Result<Self> {
        let mut config = Self::new();

        // 1. 글로벌 설정
        if let Ok(global) = JsonStore::global() {
            if let Some(file) = global.load_optional::<RegistryConfigFile>(REGISTRY_CONFIG_FILE)? {
                config.merge(file);
            }
        }

        // 2. 프로젝트 설정
        if let Ok(project) = JsonStore::current_project() {
            if let Some(file) = project.load_optional::<RegistryConfigFile>(REGISTRY_CONFIG_FILE)? {
                config.merge(file);
            }
        }

        Ok(config)
    }

    /// 특정 파일에서 로드 (기본값 위에 병합)
    pub fn load_from(path: &Path) -> Result<Self> {
        let (store, filename) = JsonStore::for_file(path)?;
        let file: RegistryConfigFile = store.load(&filename)?;
        let mut config = Self::new();
        config.merge(file);
        Ok(config)
    }

    // ========================================================================
    // Merge
    // ========================================================================

    /// 파일 설정과 병합 (파일에 명시된 값이 우선)
    pub fn merge(&mut self, file: RegistryConfigFile) {
        if let Some(version) = file.version {
            self.version = version;
        }
        if let Some(policy) = file.duplicate_policy {
            self.duplicate_policy = policy;
        }
        if let Some(rank) = file.default_rank {
            self.default_rank = rank;
        }
        if let Some(capacity) = file.event_capacity {
            // 0 용량 채널은 생성할 수 없음
            self.event_capacity = capacity.max(1);
        }
        if let Some(debug) = file.debug_mode {
            self.debug_mode = debug;
        }
    }

    // ========================================================================
    // Builder
    // ========================================================================

    pub fn duplicate_policy(mut self, policy: DuplicatePolicy) -> Self {
        self.duplicate_policy = policy;
        self
    }

    pub fn default_rank(mut self, rank: i32) -> Self {
        self.default_rank = rank;
        self
    }

    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity.max(1);
        self
    }

    pub fn debug_mode(mut self, debug: bool) -> Self {
        self.debug_mode = debug;
        self
    }
}

/// 파일에 저장되는 형태 - 모든 필드가 선택적
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryConfigFile {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub duplicate_policy: Option<DuplicatePolicy>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_rank: Option<i32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_capacity: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug_mode: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RegistryConfig::default();
        assert_eq!(config.duplicate_policy, DuplicatePolicy::Reject);
        assert_eq!(config.default_rank, 0);
        assert_eq!(config.event_capacity, 256);
    }

    #[test]
    fn test_merge_only_overrides_present_fields() {
        let mut config = RegistryConfig::default().default_rank(5);
        let file: RegistryConfigFile =
            serde_json::from_str(r#"{ "duplicatePolicy": "replace" }"#).unwrap();

        config.merge(file);

        assert_eq!(config.duplicate_policy, DuplicatePolicy::Replace);
        assert_eq!(config.default_rank, 5);
    }

    #[test]
    fn test_zero_capacity_clamped() {
        let mut config = RegistryConfig::default();
        config.merge(RegistryConfigFile {
            event_capacity: Some(0),
            ..Default::default()
        });
        assert_eq!(config.event_capacity, 1);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(REGISTRY_CONFIG_FILE);
        std::fs::write(&path, r#"{ "defaultRank": 7, "debugMode": true }"#).unwrap();

        let config = RegistryConfig::load_from(&path).unwrap();
        assert_eq!(config.default_rank, 7);
        assert!(config.debug_mode);
        assert_eq!(config.duplicate_policy, DuplicatePolicy::Reject);
    }
}
