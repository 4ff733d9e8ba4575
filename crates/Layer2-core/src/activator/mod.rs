//! # Activator Host
//!
//! 필요한 서비스가 모두 바인딩되었을 때만 시작되는 기동 단위(액티베이터)를 관리한다.
//!
//! ```ignore
//! let host = Arc::new(ActivatorHost::new(Arc::clone(&facade)));
//! host.install(Arc::new(MailActivator::new()))?;
//! let watcher = host.watch();
//!
//! // 종료 시
//! host.shutdown();
//! ```

mod host;
mod traits;

pub use host::ActivatorHost;
pub use traits::{ActivatorState, ServiceActivator};
