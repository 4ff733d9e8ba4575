//! # locator-foundation
//!
//! Foundation layer for Locator:
//! - Error: 레지스트리/액티베이터/설정 에러 타입
//! - Config: 레지스트리 설정 (RegistryConfig, DuplicatePolicy)
//! - Storage: JsonStore (설정/매니페스트 파일)

pub mod config;
pub mod error;
pub mod storage;

// ============================================================================
// Error
// ============================================================================
pub use error::{Error, Result};

// ============================================================================
// Config (설정)
// ============================================================================
pub use config::{DuplicatePolicy, RegistryConfig, RegistryConfigFile, REGISTRY_CONFIG_FILE};

// ============================================================================
// Storage (저장소)
// ============================================================================
pub use storage::JsonStore;
