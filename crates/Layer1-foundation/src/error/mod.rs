//! Error types for Locator
//!
//! 레지스트리 전체의 에러를 중앙에서 관리.
//! 레지스트리 코어가 호출자에게 돌려주는 에러는 `ServiceUnavailable` 하나뿐이며,
//! 나머지는 리스너/액티베이터/설정 경계에서만 쓰인다.

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Locator 에러 타입
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // 레지스트리 관련
    // ========================================================================
    /// 필수 서비스가 현재 바인딩되어 있지 않음
    #[error("Service unavailable: {capability}")]
    ServiceUnavailable { capability: String },

    /// 리스너 실패 (알림 지점에서 잡아서 로깅, 전파하지 않음)
    #[error("Listener failure: {listener} - {message}")]
    ListenerFailure { listener: String, message: String },

    // ========================================================================
    // 액티베이터 관련
    // ========================================================================
    #[error("Activator error: {name} - {message}")]
    Activator { name: String, message: String },

    // ========================================================================
    // 설정 관련
    // ========================================================================
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // ========================================================================
    // 외부 에러 변환
    // ========================================================================
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// 나중에 재시도하면 해결될 수 있는 에러인지 확인
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::ServiceUnavailable { .. } | Error::Activator { .. }
        )
    }

    /// ServiceUnavailable 에러 생성 헬퍼
    pub fn service_unavailable(capability: impl std::fmt::Display) -> Self {
        Error::ServiceUnavailable {
            capability: capability.to_string(),
        }
    }

    /// 리스너 실패 에러 생성 헬퍼
    pub fn listener_failure(listener: impl Into<String>, message: impl Into<String>) -> Self {
        Error::ListenerFailure {
            listener: listener.into(),
            message: message.into(),
        }
    }

    /// 액티베이터 에러 생성 헬퍼
    pub fn activator(name: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Activator {
            name: name.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_unavailable_display() {
        let err = Error::service_unavailable("mail.transport");
        assert_eq!(err.to_string(), "Service unavailable: mail.transport");
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_config_error_not_recoverable() {
        let err = Error::Config("bad file".into());
        assert!(!err.is_recoverable());
    }
}
