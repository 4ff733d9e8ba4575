//! Config - 레지스트리 설정 관리
//!
//! - `registry.rs` - RegistryConfig (중복 정책, 기본 랭크, 이벤트 채널)

mod registry;

pub use registry::{DuplicatePolicy, RegistryConfig, RegistryConfigFile, REGISTRY_CONFIG_FILE};
