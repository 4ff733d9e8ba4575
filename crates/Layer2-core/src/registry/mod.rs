//! # Ranked Service Registry
//!
//! 런타임에 나타나고 사라지는 서비스 구현을 capability별로 추적하는 레지스트리
//!
//! ## 개요
//!
//! 하나의 capability(예: `dyn MailTransport`)에 여러 구현이 랭크와 함께 등록된다.
//! 소비자는 항상 가장 높은 랭크의 구현을 받고, 같은 랭크라면 먼저 등록된 것이 이긴다.
//! 구현이 추가/제거될 때마다 리스너와 브로드캐스트 수신자에게 알린다.
//!
//! ## 아키텍처
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 ServiceRegistryFacade                        │
//! │  RwLock<HashMap<CapabilityId, TrackerSlot>>                  │
//! │        │                                                     │
//! │        ▼                                                     │
//! │  ┌───────────────────────────────────────────────────────┐  │
//! │  │ DynamicServiceTracker<T>   (Unstarted → Open → Closed) │  │
//! │  │  ┌─────────────────────┐  ┌─────────────────────────┐ │  │
//! │  │  │ RankedRegistry<T>   │  │ ServiceEventNotifier<T> │ │  │
//! │  │  │ (rank desc,         │  │ listeners + broadcast   │ │  │
//! │  │  │  order asc), COW    │  │                         │ │  │
//! │  │  └─────────────────────┘  └─────────────────────────┘ │  │
//! │  └───────────────────────────────────────────────────────┘  │
//! │        │ CapabilityEvent                                     │
//! │        ▼                                                     │
//! │  changes() ── ActivatorHost::watch                           │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## 사용 예시
//!
//! ```ignore
//! use locator_core::registry::{Capability, Requirement, ServiceRegistryFacade};
//!
//! let facade = ServiceRegistryFacade::default();
//! let transport = Capability::<dyn MailTransport>::new("mail.transport");
//!
//! facade.track(&transport, Requirement::Mandatory);
//! facade.register(&transport, Arc::new(SmtpTransport::default()), 10);
//!
//! let best = facade.get(&transport)?;
//!
//! // 변경 구독
//! let mut rx = facade.changes();
//! while let Ok(event) = rx.recv().await {
//!     println!("{} {} ({} left)", event.capability, event.kind, event.remaining);
//! }
//! ```

mod capability;
mod entry;
mod facade;
mod notifier;
mod ranked;
mod snapshot;
mod tracker;
mod traits;

pub use capability::{Capability, CapabilityId};
pub use entry::{EntryHandle, Insertion, ServiceEntry};
pub use facade::{CapabilityStats, RegistryStats, Requirement, ServiceRegistryFacade};
pub use notifier::ServiceEventNotifier;
pub use ranked::RankedRegistry;
pub use snapshot::{Snapshot, SnapshotIter};
pub use tracker::{DynamicServiceTracker, TrackerState};
pub use traits::{CapabilityEvent, FnListener, ListenerId, ServiceEvent, ServiceEventKind, ServiceListener};
