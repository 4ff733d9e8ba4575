//! Capability - 서비스 종류를 식별하는 키

use std::any::{type_name, TypeId};
use std::borrow::Cow;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::sync::Arc;

// ============================================================================
// CapabilityId - 타입이 지워진 키
// ============================================================================

/// 타입이 지워진 capability 키
///
/// 이름과 서비스 타입의 `TypeId`를 함께 비교하므로, 같은 이름이라도
/// 서비스 타입이 다르면 서로 다른 capability다.
#[derive(Clone)]
pub struct CapabilityId {
    name: Cow<'static, str>,
    type_id: TypeId,
    type_name: &'static str,
}

impl CapabilityId {
    fn of<T: ?Sized + 'static>(name: Cow<'static, str>) -> Self {
        Self {
            name,
            type_id: TypeId::of::<T>(),
            type_name: type_name::<T>(),
        }
    }

    /// capability 이름
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 서비스 타입 이름 (디버깅용)
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }
}

impl PartialEq for CapabilityId {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id && self.name == other.name
    }
}

impl Eq for CapabilityId {}

impl Hash for CapabilityId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
        self.type_id.hash(state);
    }
}

impl fmt::Debug for CapabilityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CapabilityId({}: {})", self.name, self.type_name)
    }
}

impl fmt::Display for CapabilityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

// ============================================================================
// Capability<T> - 타입이 있는 키
// ============================================================================

/// 서비스 타입 `T`에 묶인 capability 키
///
/// ```ignore
/// trait MailTransport: Send + Sync { fn send(&self, to: &str); }
///
/// let transport = Capability::<dyn MailTransport>::new("mail.transport");
/// facade.register(&transport, Arc::new(SmtpTransport::default()), 10);
/// let best: Arc<dyn MailTransport> = facade.get(&transport)?;
/// ```
pub struct Capability<T: ?Sized> {
    id: CapabilityId,
    // Send/Sync는 T와 무관
    _marker: PhantomData<fn() -> Arc<T>>,
}

impl<T: ?Sized + 'static> Capability<T> {
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self {
            id: CapabilityId::of::<T>(name.into()),
            _marker: PhantomData,
        }
    }

    /// 타입이 지워진 키
    pub fn id(&self) -> &CapabilityId {
        &self.id
    }

    pub fn name(&self) -> &str {
        self.id.name()
    }
}

impl<T: ?Sized> Clone for Capability<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T: ?Sized> fmt::Debug for Capability<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Capability").field(&self.id).finish()
    }
}

impl<T: ?Sized> fmt::Display for Capability<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.id, f)
    }
}

impl<T: ?Sized> AsRef<CapabilityId> for Capability<T> {
    fn as_ref(&self) -> &CapabilityId {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    trait Greeter: Send + Sync {}

    #[test]
    fn test_same_name_same_type_is_equal() {
        let a = Capability::<dyn Greeter>::new("greeter");
        let b = Capability::<dyn Greeter>::new(String::from("greeter"));
        assert_eq!(a.id(), b.id());
    }

    #[test]
    fn test_same_name_different_type_is_distinct() {
        let a = Capability::<dyn Greeter>::new("greeter");
        let b = Capability::<String>::new("greeter");
        assert_ne!(a.id(), b.id());
        assert_eq!(a.to_string(), b.to_string());
    }
}
