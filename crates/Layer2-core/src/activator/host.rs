//! Activator Host - 서비스 가용성에 따라 액티베이터를 시작/정지

use super::traits::{ActivatorState, ServiceActivator};
use crate::registry::{CapabilityId, Requirement, ServiceRegistryFacade};
use locator_foundation::{Error, Result};
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast::error::RecvError, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// 설치된 액티베이터
struct Installed {
    activator: Arc<dyn ServiceActivator>,
    needed: Vec<CapabilityId>,
    state: ActivatorState,
}

/// 액티베이터 호스트
///
/// `refresh`는 한 번에 하나만 돈다. 진행 중에 들어온 요청은 `pending`으로 합쳐져
/// 한 바퀴만 더 돈다. 액티베이터의 `start`/`stop`은 상태 잠금 밖에서 호출되지만
/// refresh 잠금 안에서 호출되므로, 그 안에서 호스트를 다시 호출하면 안 된다.
pub struct ActivatorHost {
    facade: Arc<ServiceRegistryFacade>,
    activators: RwLock<Vec<Installed>>,
    refresh_lock: Mutex<()>,
    pending: AtomicBool,
    shutdown: watch::Sender<bool>,
}

impl ActivatorHost {
    pub fn new(facade: Arc<ServiceRegistryFacade>) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            facade,
            activators: RwLock::new(Vec::new()),
            refresh_lock: Mutex::new(()),
            pending: AtomicBool::new(false),
            shutdown,
        }
    }

    pub fn facade(&self) -> &Arc<ServiceRegistryFacade> {
        &self.facade
    }

    fn is_shut_down(&self) -> bool {
        *self.shutdown.borrow()
    }

    // ========================================================================
    // 설치 / 제거
    // ========================================================================

    /// 액티베이터 설치 후 즉시 refresh. 설치 직후 상태를 반환한다.
    pub fn install(&self, activator: Arc<dyn ServiceActivator>) -> Result<ActivatorState> {
        let name = activator.name().to_string();
        if self.is_shut_down() {
            return Err(Error::activator(name, "host is shut down"));
        }

        let needed = activator.needed_services();
        let optional = activator.optional_services();

        {
            let mut activators = self.activators.write();
            if activators.iter().any(|a| a.activator.name() == name) {
                return Err(Error::InvalidInput(format!("Activator {} is already installed", name)));
            }
            activators.push(Installed {
                activator,
                needed: needed.clone(),
                state: ActivatorState::Waiting,
            });
        }

        for id in &needed {
            self.facade.declare(id, Requirement::Mandatory);
        }
        for id in &optional {
            self.facade.declare(id, Requirement::Optional);
        }

        info!(
            activator = %name,
            needed = needed.len(),
            optional = optional.len(),
            "Installed activator"
        );

        self.refresh();
        Ok(self.state(&name).unwrap_or(ActivatorState::Waiting))
    }

    /// 액티베이터 제거 (활성 상태면 먼저 stop)
    pub fn uninstall(&self, name: &str) -> bool {
        let _guard = self.refresh_lock.lock();
        let removed = {
            let mut activators = self.activators.write();
            activators
                .iter()
                .position(|a| a.activator.name() == name)
                .map(|pos| activators.remove(pos))
        };

        match removed {
            Some(installed) => {
                if installed.state.is_active() {
                    self.stop_one(installed.activator.as_ref());
                }
                info!(activator = %name, "Uninstalled activator");
                true
            }
            None => false,
        }
    }

    // ========================================================================
    // Refresh
    // ========================================================================

    /// 필수 서비스가 모두 있는 대기/실패 액티베이터는 시작하고,
    /// 필수 서비스를 잃은 활성 액티베이터는 정지한다.
    ///
    /// 반환 시점에는 호출 이후에 시작된 패스가 끝나 있다.
    pub fn refresh(&self) -> Vec<(String, ActivatorState)> {
        self.pending.store(true, Ordering::SeqCst);

        {
            let _guard = self.refresh_lock.lock();
            if !self.pending.load(Ordering::SeqCst) {
                debug!("Refresh already covered by a concurrent pass");
            }
            while self.pending.swap(false, Ordering::SeqCst) {
                self.refresh_pass();
            }
        }

        self.states()
    }

    fn refresh_pass(&self) {
        if self.is_shut_down() {
            return;
        }

        let plan: Vec<(Arc<dyn ServiceActivator>, bool)> = {
            let activators = self.activators.read();
            activators
                .iter()
                .filter_map(|a| {
                    let satisfied = self.facade.require_all(&a.needed);
                    match (&a.state, satisfied) {
                        (ActivatorState::Waiting | ActivatorState::Failed(_), true) => {
                            Some((Arc::clone(&a.activator), true))
                        }
                        (ActivatorState::Active, false) => Some((Arc::clone(&a.activator), false)),
                        _ => None,
                    }
                })
                .collect()
        };

        for (activator, start) in plan {
            let next = if start {
                self.start_one(activator.as_ref())
            } else {
                self.stop_one(activator.as_ref());
                ActivatorState::Waiting
            };
            self.set_state(activator.name(), next);
        }
    }

    fn start_one(&self, activator: &dyn ServiceActivator) -> ActivatorState {
        match activator.start(&self.facade) {
            Ok(()) => {
                info!(activator = activator.name(), "Activator started");
                ActivatorState::Active
            }
            Err(e) => {
                error!(activator = activator.name(), error = %e, "Activator failed to start");
                ActivatorState::Failed(e.to_string())
            }
        }
    }

    fn stop_one(&self, activator: &dyn ServiceActivator) {
        match activator.stop(&self.facade) {
            Ok(()) => info!(activator = activator.name(), "Activator stopped"),
            Err(e) => warn!(activator = activator.name(), error = %e, "Activator failed to stop cleanly"),
        }
    }

    fn set_state(&self, name: &str, state: ActivatorState) {
        let mut activators = self.activators.write();
        if let Some(installed) = activators.iter_mut().find(|a| a.activator.name() == name) {
            installed.state = state;
        }
    }

    // ========================================================================
    // Watch
    // ========================================================================

    /// 레지스트리 변경마다 refresh하는 백그라운드 태스크
    ///
    /// `shutdown` 호출, 호스트 drop, 또는 facade drop 시 종료된다.
    pub fn watch(self: &Arc<Self>) -> JoinHandle<()> {
        let host = Arc::downgrade(self);
        let mut changes = self.facade.changes();
        let mut shutdown = self.shutdown.subscribe();

        tokio::spawn(async move {
            if *shutdown.borrow() {
                return;
            }

            loop {
                tokio::select! {
                    _ = shutdown.changed() => break,
                    event = changes.recv() => {
                        match event {
                            Ok(event) => debug!(
                                capability = %event.capability,
                                kind = %event.kind,
                                remaining = event.remaining,
                                "Registry changed"
                            ),
                            Err(RecvError::Lagged(skipped)) => {
                                warn!(skipped, "Activator watch lagged behind registry changes")
                            }
                            Err(RecvError::Closed) => break,
                        }

                        let Some(host) = host.upgrade() else { break };
                        // start/stop이 런타임 워커를 막지 않게 블로킹 풀에서 실행
                        if let Err(e) = tokio::task::spawn_blocking(move || host.refresh()).await {
                            error!(error = %e, "Activator refresh task failed");
                        }
                    }
                }
            }

            debug!("Activator watch stopped");
        })
    }

    // ========================================================================
    // 종료
    // ========================================================================

    /// 활성 액티베이터를 설치 역순으로 정지하고 레지스트리를 비운다.
    ///
    /// 반환값은 레지스트리에서 비워진 항목 수.
    pub fn shutdown(&self) -> usize {
        self.shutdown.send_replace(true);
        let _guard = self.refresh_lock.lock();

        let active: Vec<Arc<dyn ServiceActivator>> = {
            let mut activators = self.activators.write();
            let active = activators
                .iter()
                .filter(|a| a.state.is_active())
                .map(|a| Arc::clone(&a.activator))
                .collect();
            for installed in activators.iter_mut() {
                installed.state = ActivatorState::Stopped;
            }
            active
        };

        info!(active = active.len(), "Shutting down activator host");

        for activator in active.iter().rev() {
            self.stop_one(activator.as_ref());
        }

        self.facade.clear_registry()
    }

    // ========================================================================
    // 조회
    // ========================================================================

    /// 모든 액티베이터 상태 (설치 순)
    pub fn states(&self) -> Vec<(String, ActivatorState)> {
        self.activators
            .read()
            .iter()
            .map(|a| (a.activator.name().to_string(), a.state.clone()))
            .collect()
    }

    pub fn state(&self, name: &str) -> Option<ActivatorState> {
        self.activators
            .read()
            .iter()
            .find(|a| a.activator.name() == name)
            .map(|a| a.state.clone())
    }

    /// 아직 바인딩되지 않은 필수 capability
    pub fn missing_for(&self, name: &str) -> Option<Vec<CapabilityId>> {
        let needed = self
            .activators
            .read()
            .iter()
            .find(|a| a.activator.name() == name)
            .map(|a| a.needed.clone())?;
        Some(self.facade.missing(&needed))
    }
}

impl Drop for ActivatorHost {
    fn drop(&mut self) {
        self.shutdown.send_replace(true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Capability;
    use std::time::Duration;

    trait Store: Send + Sync {}

    struct MemoryStore;

    impl Store for MemoryStore {}

    struct Recording {
        name: &'static str,
        needs: Vec<CapabilityId>,
        log: Arc<Mutex<Vec<String>>>,
        fail_start: AtomicBool,
    }

    impl Recording {
        fn new(name: &'static str, needs: Vec<CapabilityId>, log: Arc<Mutex<Vec<String>>>) -> Self {
            Self {
                name,
                needs,
                log,
                fail_start: AtomicBool::new(false),
            }
        }
    }

    impl ServiceActivator for Recording {
        fn name(&self) -> &str {
            self.name
        }

        fn needed_services(&self) -> Vec<CapabilityId> {
            self.needs.clone()
        }

        fn start(&self, _facade: &ServiceRegistryFacade) -> Result<()> {
            if self.fail_start.load(Ordering::SeqCst) {
                return Err(Error::activator(self.name, "database not ready"));
            }
            self.log.lock().push(format!("start:{}", self.name));
            Ok(())
        }

        fn stop(&self, _facade: &ServiceRegistryFacade) -> Result<()> {
            self.log.lock().push(format!("stop:{}", self.name));
            Ok(())
        }
    }

    fn store_capability() -> Capability<dyn Store> {
        Capability::new("store")
    }

    #[test]
    fn test_starts_and_stops_with_availability() {
        let facade = Arc::new(ServiceRegistryFacade::default());
        let host = ActivatorHost::new(Arc::clone(&facade));
        let log = Arc::new(Mutex::new(Vec::new()));
        let cap = store_capability();

        let state = host
            .install(Arc::new(Recording::new("mail", vec![cap.id().clone()], Arc::clone(&log))))
            .unwrap();
        assert_eq!(state, ActivatorState::Waiting);
        assert_eq!(facade.requirement(cap.id()), Some(Requirement::Mandatory));
        assert_eq!(host.missing_for("mail"), Some(vec![cap.id().clone()]));

        let store: Arc<dyn Store> = Arc::new(MemoryStore);
        facade.register(&cap, Arc::clone(&store), 0);
        host.refresh();
        assert_eq!(host.state("mail"), Some(ActivatorState::Active));
        assert_eq!(host.missing_for("mail"), Some(vec![]));

        facade.unregister(&cap, &store);
        host.refresh();
        assert_eq!(host.state("mail"), Some(ActivatorState::Waiting));
        assert_eq!(*log.lock(), vec!["start:mail", "stop:mail"]);
    }

    #[test]
    fn test_activator_without_needs_starts_immediately() {
        let host = ActivatorHost::new(Arc::new(ServiceRegistryFacade::default()));
        let log = Arc::new(Mutex::new(Vec::new()));

        let state = host
            .install(Arc::new(Recording::new("housekeeping", vec![], Arc::clone(&log))))
            .unwrap();
        assert_eq!(state, ActivatorState::Active);
    }

    #[test]
    fn test_failed_start_is_retried() {
        let facade = Arc::new(ServiceRegistryFacade::default());
        let host = ActivatorHost::new(Arc::clone(&facade));
        let log = Arc::new(Mutex::new(Vec::new()));
        let activator = Arc::new(Recording::new("calendar", vec![], Arc::clone(&log)));
        activator.fail_start.store(true, Ordering::SeqCst);

        let state = host.install(Arc::clone(&activator) as Arc<dyn ServiceActivator>).unwrap();
        assert!(matches!(state, ActivatorState::Failed(_)));

        activator.fail_start.store(false, Ordering::SeqCst);
        host.refresh();
        assert_eq!(host.state("calendar"), Some(ActivatorState::Active));
    }

    #[test]
    fn test_duplicate_install_rejected() {
        let host = ActivatorHost::new(Arc::new(ServiceRegistryFacade::default()));
        let log = Arc::new(Mutex::new(Vec::new()));

        host.install(Arc::new(Recording::new("dup", vec![], Arc::clone(&log)))).unwrap();
        let second = host.install(Arc::new(Recording::new("dup", vec![], Arc::clone(&log))));
        assert!(matches!(second, Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_uninstall_stops_active() {
        let host = ActivatorHost::new(Arc::new(ServiceRegistryFacade::default()));
        let log = Arc::new(Mutex::new(Vec::new()));

        host.install(Arc::new(Recording::new("contacts", vec![], Arc::clone(&log)))).unwrap();
        assert!(host.uninstall("contacts"));
        assert!(!host.uninstall("contacts"));
        assert!(host.state("contacts").is_none());
        assert_eq!(*log.lock(), vec!["start:contacts", "stop:contacts"]);
    }

    #[test]
    fn test_shutdown_stops_in_reverse_install_order() {
        let facade = Arc::new(ServiceRegistryFacade::default());
        let host = ActivatorHost::new(Arc::clone(&facade));
        let log = Arc::new(Mutex::new(Vec::new()));
        let cap = store_capability();
        facade.register(&cap, Arc::new(MemoryStore), 0);

        host.install(Arc::new(Recording::new("first", vec![cap.id().clone()], Arc::clone(&log)))).unwrap();
        host.install(Arc::new(Recording::new("second", vec![], Arc::clone(&log)))).unwrap();

        assert_eq!(host.shutdown(), 1);
        assert_eq!(
            *log.lock(),
            vec!["start:first", "start:second", "stop:second", "stop:first"]
        );
        assert!(host.states().iter().all(|(_, s)| *s == ActivatorState::Stopped));
        assert!(facade.capabilities().is_empty());

        let late = host.install(Arc::new(Recording::new("late", vec![], Arc::clone(&log))));
        assert!(matches!(late, Err(Error::Activator { .. })));
    }

    #[tokio::test]
    async fn test_watch_reacts_to_registry_changes() {
        let facade = Arc::new(ServiceRegistryFacade::default());
        let host = Arc::new(ActivatorHost::new(Arc::clone(&facade)));
        let log = Arc::new(Mutex::new(Vec::new()));
        let cap = store_capability();

        host.install(Arc::new(Recording::new("mail", vec![cap.id().clone()], Arc::clone(&log))))
            .unwrap();
        let handle = host.watch();

        facade.register(&cap, Arc::new(MemoryStore), 0);

        let mut active = false;
        for _ in 0..100 {
            if host.state("mail") == Some(ActivatorState::Active) {
                active = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(active);

        host.shutdown();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
