//! Storage module for Locator
//!
//! - `json`: JSON - 설정 파일 저장/로드 (`registry.json`, 매니페스트)

mod json;

pub use json::JsonStore;
