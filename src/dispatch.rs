//! Concurrent multi-device task dispatch.
//!
//! [`Dispatcher::dispatch`] fans one logical operation out across the
//! resolved target host set under a bounded worker pool and aggregates a
//! keyed result map. Invariants:
//!
//! - the result's key set equals the resolved target set exactly, no matter
//!   how many hosts fail;
//! - one host's failure never cancels, delays, or alters a sibling's outcome;
//! - for `send_command`, the safety filter runs once before any per-host work
//!   and a blocked verdict aborts the whole dispatch;
//! - the pool width caps concurrent device sessions independently of the
//!   target set size.

use std::sync::Arc;
use std::time::Duration;

use indexmap::IndexMap;
use serde_json::{json, Value};
use tokio::sync::Semaphore;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::driver::{ConfigSource, DriverFactory, GetterKind, NetworkDriver, PingParams, TracerouteParams};
use crate::error::FleetError;
use crate::filter::{CommandFilter, Verdict};
use crate::inventory::{HostSelector, Inventory};

/// One logical operation to run on every targeted host.
#[derive(Debug, Clone)]
pub enum Operation {
    Getter(GetterKind),
    GetConfig { retrieve: ConfigSource },
    SendCommand { command: String },
    Ping(PingParams),
    Traceroute(TracerouteParams),
    IsAlive,
}

impl Operation {
    /// Short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Getter(kind) => kind.as_str(),
            Self::GetConfig { .. } => "get_config",
            Self::SendCommand { .. } => "send_command",
            Self::Ping(_) => "ping",
            Self::Traceroute(_) => "traceroute",
            Self::IsAlive => "is_alive",
        }
    }
}

/// One tool invocation's worth of work.
#[derive(Debug, Clone)]
pub struct DispatchRequest {
    pub target: HostSelector,
    pub operation: Operation,
}

/// Terminal state of one host's operation.
#[derive(Debug, Clone)]
pub enum HostOutcome {
    Success(Value),
    Failure { kind: &'static str, message: String },
}

impl HostOutcome {
    pub fn failure(err: &FleetError) -> Self {
        Self::Failure {
            kind: err.kind(),
            message: err.to_string(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub fn to_value(&self) -> Value {
        match self {
            Self::Success(payload) => json!({ "success": true, "result": payload }),
            Self::Failure { kind, message } => json!({
                "success": false,
                "error": { "kind": kind, "message": message },
            }),
        }
    }
}

/// Keyed per-host outcomes for one dispatch. Host identity, not completion
/// order, is the addressing key; iteration order follows the resolved set.
#[derive(Debug, Default)]
pub struct DispatchResult {
    pub outcomes: IndexMap<String, HostOutcome>,
}

impl DispatchResult {
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn get(&self, host: &str) -> Option<&HostOutcome> {
        self.outcomes.get(host)
    }

    pub fn to_value(&self) -> Value {
        let mut map = serde_json::Map::new();
        for (host, outcome) in &self.outcomes {
            map.insert(host.clone(), outcome.to_value());
        }
        Value::Object(map)
    }
}

/// Fans operations out to per-host drivers under a bounded worker pool.
pub struct Dispatcher {
    factory: Arc<dyn DriverFactory>,
    filter: Arc<CommandFilter>,
    num_workers: usize,
    host_timeout: Duration,
    deadline: Option<Duration>,
}

impl Dispatcher {
    pub fn new(
        factory: Arc<dyn DriverFactory>,
        filter: Arc<CommandFilter>,
        num_workers: usize,
        host_timeout: Duration,
        deadline: Option<Duration>,
    ) -> Self {
        Self {
            factory,
            filter,
            num_workers: num_workers.max(1),
            host_timeout,
            deadline,
        }
    }

    /// Run one operation against every host the selector resolves to.
    ///
    /// The inventory snapshot is pinned for the whole dispatch; a concurrent
    /// reload does not affect in-flight work.
    pub async fn dispatch(
        &self,
        inventory: Arc<Inventory>,
        request: DispatchRequest,
    ) -> Result<DispatchResult, FleetError> {
        let dispatch_id = Uuid::new_v4();

        let names = match inventory.resolve(&request.target) {
            Ok(names) => names,
            // A missing single host is that host's failure outcome, matching
            // the per-host error contract; group/all resolution errors are
            // dispatch-level.
            Err(err) => {
                if let HostSelector::Host(name) = &request.target {
                    warn!(%dispatch_id, host = %name, "target not in inventory");
                    let mut result = DispatchResult::default();
                    result
                        .outcomes
                        .insert(name.clone(), HostOutcome::failure(&err));
                    return Ok(result);
                }
                return Err(err);
            }
        };

        if let Operation::SendCommand { command } = &request.operation {
            if let Verdict::Blocked(reason) = self.filter.check(command) {
                info!(%dispatch_id, command = %command, "command blocked before dispatch");
                return Err(FleetError::BlockedCommand(reason.describe()));
            }
        }

        debug!(
            %dispatch_id,
            operation = request.operation.name(),
            hosts = names.len(),
            "dispatch starting"
        );

        if names.is_empty() {
            return Ok(DispatchResult::default());
        }

        let started = Instant::now();
        let deadline = self.deadline.map(|d| started + d);
        let semaphore = Arc::new(Semaphore::new(self.num_workers));
        let operation = Arc::new(request.operation);

        let mut handles = Vec::with_capacity(names.len());
        for name in &names {
            let semaphore = Arc::clone(&semaphore);
            let inventory = Arc::clone(&inventory);
            let factory = Arc::clone(&self.factory);
            let operation = Arc::clone(&operation);
            let name = name.clone();
            let host_timeout = self.host_timeout;

            handles.push((
                name.clone(),
                tokio::spawn(async move {
                    let _permit = semaphore
                        .acquire_owned()
                        .await
                        .expect("dispatch semaphore closed");
                    // A dispatch deadline skips hosts that never got a worker,
                    // reporting them instead of silently dropping them.
                    if deadline.is_some_and(|d| Instant::now() >= d) {
                        return HostOutcome::failure(&FleetError::Timeout(
                            "dispatch deadline expired before the operation started".to_string(),
                        ));
                    }
                    run_host(&inventory, factory.as_ref(), &name, &operation, host_timeout).await
                }),
            ));
        }

        // Await every scheduled host; no early return on success or failure.
        let mut result = DispatchResult::default();
        for (name, handle) in handles {
            let outcome = match handle.await {
                Ok(outcome) => outcome,
                Err(e) => HostOutcome::failure(&FleetError::Transport(format!(
                    "worker task failed: {e}"
                ))),
            };
            result.outcomes.insert(name, outcome);
        }

        info!(
            %dispatch_id,
            operation = operation.name(),
            hosts = result.len(),
            failed = result.outcomes.values().filter(|o| !o.is_success()).count(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "dispatch complete"
        );
        Ok(result)
    }
}

/// Resolve one host's profile, build its driver, and run the operation to a
/// terminal state. Every error becomes this host's failure outcome.
async fn run_host(
    inventory: &Inventory,
    factory: &dyn DriverFactory,
    name: &str,
    operation: &Operation,
    host_timeout: Duration,
) -> HostOutcome {
    let profile = match inventory.connection_profile(name) {
        Ok(profile) => profile,
        Err(err) => return HostOutcome::failure(&err),
    };
    let driver = match factory.driver_for(&profile) {
        Ok(driver) => driver,
        Err(err) => return HostOutcome::failure(&err),
    };

    match tokio::time::timeout(host_timeout, run_operation(driver.as_ref(), operation)).await {
        Ok(Ok(payload)) => HostOutcome::Success(payload),
        Ok(Err(err)) => HostOutcome::failure(&err),
        Err(_) => HostOutcome::failure(&FleetError::Timeout(format!(
            "operation exceeded {} ms",
            host_timeout.as_millis()
        ))),
    }
}

async fn run_operation(
    driver: &dyn NetworkDriver,
    operation: &Operation,
) -> Result<Value, FleetError> {
    match operation {
        Operation::Getter(kind) => kind.run(driver).await,
        Operation::GetConfig { retrieve } => driver.get_config(*retrieve).await,
        Operation::SendCommand { command } => driver.send_command(command).await,
        Operation::Ping(params) => driver.ping(params).await,
        Operation::Traceroute(params) => driver.traceroute(params).await,
        Operation::IsAlive => driver.is_alive().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{BlacklistRule, MatchKind};
    use crate::inventory::{DefaultsRecord, GroupRecord, HostRecord};
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Test double: records session construction and tracks concurrency.
    #[derive(Default)]
    struct MockFactory {
        fail_hosts: HashSet<String>,
        slow_hosts: HashSet<String>,
        drivers_built: Arc<AtomicUsize>,
        in_flight: Arc<AtomicUsize>,
        max_in_flight: Arc<AtomicUsize>,
    }

    impl MockFactory {
        fn failing(hosts: &[&str]) -> Self {
            Self {
                fail_hosts: hosts.iter().map(|h| (*h).to_string()).collect(),
                ..Self::default()
            }
        }
    }

    impl DriverFactory for MockFactory {
        fn driver_for(
            &self,
            profile: &crate::inventory::ResolvedConnectionProfile,
        ) -> Result<Box<dyn NetworkDriver>, FleetError> {
            self.drivers_built.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(MockDriver {
                host: profile.name.clone(),
                fail: self.fail_hosts.contains(&profile.name),
                slow: self.slow_hosts.contains(&profile.name),
                in_flight: Arc::clone(&self.in_flight),
                max_in_flight: Arc::clone(&self.max_in_flight),
            }))
        }
    }

    #[derive(Debug)]
    struct MockDriver {
        host: String,
        fail: bool,
        slow: bool,
        in_flight: Arc<AtomicUsize>,
        max_in_flight: Arc<AtomicUsize>,
    }

    impl MockDriver {
        async fn respond(&self) -> Result<Value, FleetError> {
            let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(current, Ordering::SeqCst);
            if self.slow {
                tokio::time::sleep(Duration::from_millis(200)).await;
            } else {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            if self.fail {
                Err(FleetError::Transport(format!(
                    "{}: connection refused",
                    self.host
                )))
            } else {
                Ok(json!({ "host": self.host }))
            }
        }
    }

    #[async_trait]
    impl NetworkDriver for MockDriver {
        fn platform(&self) -> &str {
            "mock"
        }

        async fn get_facts(&self) -> Result<Value, FleetError> {
            self.respond().await
        }

        async fn send_command(&self, _command: &str) -> Result<Value, FleetError> {
            self.respond().await
        }

        async fn is_alive(&self) -> Result<Value, FleetError> {
            self.respond().await
        }
    }

    fn inventory(hosts: &[(&str, &[&str])]) -> Arc<Inventory> {
        let mut host_map = IndexMap::new();
        let mut group_names = HashSet::new();
        for (name, groups) in hosts {
            for group in *groups {
                group_names.insert((*group).to_string());
            }
            host_map.insert(
                (*name).to_string(),
                HostRecord {
                    hostname: Some(format!("198.51.100.{}", host_map.len() + 1)),
                    groups: groups.iter().map(|g| (*g).to_string()).collect(),
                    ..HostRecord::default()
                },
            );
        }
        let mut groups = IndexMap::new();
        for name in group_names {
            groups.insert(name, GroupRecord::default());
        }
        // Declared-but-empty group for the empty-dispatch property.
        groups.insert("empty".to_string(), GroupRecord::default());
        let defaults = DefaultsRecord {
            platform: Some("mock".to_string()),
            username: Some("admin".to_string()),
            password: Some("pw".to_string()),
            ..DefaultsRecord::default()
        };
        Arc::new(Inventory::new(host_map, groups, defaults))
    }

    fn allow_all_filter() -> Arc<CommandFilter> {
        Arc::new(
            CommandFilter::new(&[BlacklistRule {
                pattern: "reload".to_string(),
                match_kind: MatchKind::Exact,
            }])
            .unwrap(),
        )
    }

    fn dispatcher(factory: MockFactory) -> Dispatcher {
        Dispatcher::new(
            Arc::new(factory),
            allow_all_filter(),
            4,
            Duration::from_millis(100),
            None,
        )
    }

    fn get_facts(target: HostSelector) -> DispatchRequest {
        DispatchRequest {
            target,
            operation: Operation::Getter(GetterKind::Facts),
        }
    }

    #[tokio::test]
    async fn result_keys_equal_resolved_host_set() {
        let inv = inventory(&[("r1", &["core"]), ("r2", &["core"]), ("r3", &["edge"])]);
        let d = dispatcher(MockFactory::default());
        let result = d.dispatch(inv, get_facts(HostSelector::All)).await.unwrap();
        let keys: Vec<&String> = result.outcomes.keys().collect();
        assert_eq!(keys, vec!["r1", "r2", "r3"]);
    }

    #[tokio::test]
    async fn group_selector_targets_members_only() {
        let inv = inventory(&[("r1", &["core"]), ("r2", &["edge"])]);
        let d = dispatcher(MockFactory::default());
        let result = d
            .dispatch(inv, get_facts(HostSelector::Group("core".to_string())))
            .await
            .unwrap();
        assert_eq!(result.len(), 1);
        assert!(result.get("r1").unwrap().is_success());
    }

    #[tokio::test]
    async fn empty_group_is_empty_success_not_error() {
        let inv = inventory(&[("r1", &["core"])]);
        let d = dispatcher(MockFactory::default());
        let result = d
            .dispatch(inv, get_facts(HostSelector::Group("empty".to_string())))
            .await
            .unwrap();
        assert!(result.is_empty());
    }

    #[tokio::test]
    async fn unknown_single_host_is_keyed_failure_outcome() {
        let inv = inventory(&[("r1", &[])]);
        let d = dispatcher(MockFactory::default());
        let result = d
            .dispatch(inv, get_facts(HostSelector::Host("r9".to_string())))
            .await
            .unwrap();
        assert_eq!(result.len(), 1);
        match result.get("r9").unwrap() {
            HostOutcome::Failure { kind, .. } => assert_eq!(*kind, "NotFoundError"),
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unknown_group_is_dispatch_level_not_found() {
        let inv = inventory(&[("r1", &[])]);
        let d = dispatcher(MockFactory::default());
        let err = d
            .dispatch(inv, get_facts(HostSelector::Group("ghost".to_string())))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "NotFoundError");
    }

    #[tokio::test]
    async fn one_host_failure_is_isolated_from_siblings() {
        let inv = inventory(&[("r1", &["core"]), ("r2", &["edge"])]);
        let d = dispatcher(MockFactory::failing(&["r1"]));
        let result = d.dispatch(inv, get_facts(HostSelector::All)).await.unwrap();
        match result.get("r1").unwrap() {
            HostOutcome::Failure { kind, message } => {
                assert_eq!(*kind, "TransportError");
                assert!(message.contains("connection refused"));
            }
            other => panic!("expected failure, got {other:?}"),
        }
        match result.get("r2").unwrap() {
            HostOutcome::Success(payload) => assert_eq!(payload["host"], json!("r2")),
            other => panic!("expected success, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn all_hosts_failing_still_reports_every_host() {
        let inv = inventory(&[("r1", &[]), ("r2", &[]), ("r3", &[])]);
        let d = dispatcher(MockFactory::failing(&["r1", "r2", "r3"]));
        let result = d.dispatch(inv, get_facts(HostSelector::All)).await.unwrap();
        assert_eq!(result.len(), 3);
        assert!(result.outcomes.values().all(|o| !o.is_success()));
    }

    #[tokio::test]
    async fn blocked_command_aborts_before_any_driver_is_built() {
        let inv = inventory(&[("r1", &[]), ("r2", &[])]);
        let factory = MockFactory::default();
        let built = Arc::clone(&factory.drivers_built);
        let d = Dispatcher::new(
            Arc::new(factory),
            allow_all_filter(),
            4,
            Duration::from_millis(100),
            None,
        );
        let err = d
            .dispatch(
                inv,
                DispatchRequest {
                    target: HostSelector::All,
                    operation: Operation::SendCommand {
                        command: "Reload".to_string(),
                    },
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "BlockedCommandError");
        // No session/driver construction happened for any host.
        assert_eq!(built.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn empty_rule_set_blocks_send_command_entirely() {
        let inv = inventory(&[("r1", &[])]);
        let d = Dispatcher::new(
            Arc::new(MockFactory::default()),
            Arc::new(CommandFilter::new(&[]).unwrap()),
            4,
            Duration::from_millis(100),
            None,
        );
        let err = d
            .dispatch(
                inv,
                DispatchRequest {
                    target: HostSelector::All,
                    operation: Operation::SendCommand {
                        command: "show version".to_string(),
                    },
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "BlockedCommandError");
        assert!(err.to_string().contains("no blacklist rules configured"));
    }

    #[tokio::test]
    async fn allowed_command_reaches_every_host() {
        let inv = inventory(&[("r1", &[]), ("r2", &[])]);
        let d = dispatcher(MockFactory::default());
        let result = d
            .dispatch(
                inv,
                DispatchRequest {
                    target: HostSelector::All,
                    operation: Operation::SendCommand {
                        command: "show version".to_string(),
                    },
                },
            )
            .await
            .unwrap();
        assert_eq!(result.len(), 2);
        assert!(result.outcomes.values().all(HostOutcome::is_success));
    }

    #[tokio::test]
    async fn per_host_timeout_becomes_timeout_outcome() {
        let inv = inventory(&[("r1", &[]), ("r2", &[])]);
        let factory = MockFactory {
            slow_hosts: ["r1".to_string()].into_iter().collect(),
            ..MockFactory::default()
        };
        let d = Dispatcher::new(
            Arc::new(factory),
            allow_all_filter(),
            4,
            Duration::from_millis(50),
            None,
        );
        let result = d.dispatch(inv, get_facts(HostSelector::All)).await.unwrap();
        match result.get("r1").unwrap() {
            HostOutcome::Failure { kind, .. } => assert_eq!(*kind, "TimeoutError"),
            other => panic!("expected timeout, got {other:?}"),
        }
        assert!(result.get("r2").unwrap().is_success());
    }

    #[tokio::test]
    async fn unsupported_capability_is_typed_per_host_failure() {
        let inv = inventory(&[("r1", &[])]);
        let d = dispatcher(MockFactory::default());
        // MockDriver leaves get_vlans at the trait default.
        let result = d
            .dispatch(
                inv,
                DispatchRequest {
                    target: HostSelector::All,
                    operation: Operation::Getter(GetterKind::Vlans),
                },
            )
            .await
            .unwrap();
        match result.get("r1").unwrap() {
            HostOutcome::Failure { kind, .. } => {
                assert_eq!(*kind, "UnsupportedOperationError");
            }
            other => panic!("expected unsupported, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn pool_width_bounds_concurrent_operations() {
        let hosts: Vec<String> = (0..12).map(|i| format!("h{i}")).collect();
        let host_refs: Vec<(&str, &[&str])> =
            hosts.iter().map(|h| (h.as_str(), &[][..])).collect();
        let inv = inventory(&host_refs);
        let factory = MockFactory::default();
        let max_in_flight = Arc::clone(&factory.max_in_flight);
        let d = Dispatcher::new(
            Arc::new(factory),
            allow_all_filter(),
            3,
            Duration::from_millis(500),
            None,
        );
        let result = d.dispatch(inv, get_facts(HostSelector::All)).await.unwrap();
        assert_eq!(result.len(), 12);
        assert!(max_in_flight.load(Ordering::SeqCst) <= 3);
    }

    #[tokio::test]
    async fn dispatch_deadline_reports_skipped_hosts_as_timeouts() {
        let hosts: Vec<String> = (0..6).map(|i| format!("h{i}")).collect();
        let host_refs: Vec<(&str, &[&str])> =
            hosts.iter().map(|h| (h.as_str(), &[][..])).collect();
        let inv = inventory(&host_refs);
        let factory = MockFactory {
            slow_hosts: hosts.iter().cloned().collect(),
            ..MockFactory::default()
        };
        // One worker, 200 ms per host, 250 ms deadline: later hosts are
        // skipped but still reported.
        let d = Dispatcher::new(
            Arc::new(factory),
            allow_all_filter(),
            1,
            Duration::from_millis(1000),
            Some(Duration::from_millis(250)),
        );
        let result = d.dispatch(inv, get_facts(HostSelector::All)).await.unwrap();
        assert_eq!(result.len(), 6);
        let timed_out = result
            .outcomes
            .values()
            .filter(|o| matches!(o, HostOutcome::Failure { kind, .. } if *kind == "TimeoutError"))
            .count();
        assert!(timed_out >= 1, "at least one host should be deadline-skipped");
        assert!(
            result.outcomes.values().any(HostOutcome::is_success),
            "hosts started before the deadline still complete"
        );
    }

    #[tokio::test]
    async fn outcome_serialization_shapes() {
        let ok = HostOutcome::Success(json!({"x": 1}));
        assert_eq!(
            ok.to_value(),
            json!({"success": true, "result": {"x": 1}})
        );
        let failed = HostOutcome::failure(&FleetError::Transport("boom".to_string()));
        let value = failed.to_value();
        assert_eq!(value["success"], json!(false));
        assert_eq!(value["error"]["kind"], json!("TransportError"));
    }
}
