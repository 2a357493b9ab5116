use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use crosscheck_core::{
    Orchestrator, OrchestratorConfig, OrchestratorError, RunReport, TestFamily, TestOutcome,
};
use crosscheck_endpoint::{
    DirectHardwareEndpoint, Endpoint, EndpointError, PeripheralConfig, PinMap, TransportFault,
    WireProtocolEndpoint,
};
use crosscheck_signal::{Signal, SignalVector};
use crosscheck_sim::{SimBench, SimFaults, SimLines, SimPeripheral};

type SimOrchestrator =
    Orchestrator<DirectHardwareEndpoint<SimLines>, WireProtocolEndpoint<SimPeripheral>>;

fn sim_orchestrator(bench: &SimBench) -> SimOrchestrator {
    let config = PeripheralConfig::default();
    Orchestrator::new(
        DirectHardwareEndpoint::new("hardware", bench.lines(), PinMap::default()),
        WireProtocolEndpoint::new("peer", bench.peripheral(&config), config),
        OrchestratorConfig::default(),
    )
}

fn failures(report: &RunReport) -> Vec<&crosscheck_core::TestEvent> {
    report
        .events
        .iter()
        .filter(|event| !event.outcome.is_pass())
        .collect()
}

#[tokio::test(start_paused = true)]
async fn test_sim_bench_passes_every_test() {
    let bench = SimBench::new(PinMap::default());
    let mut orchestrator = sim_orchestrator(&bench);

    let report = orchestrator.run().await.unwrap();

    assert!(report.passed(), "{:#?}", failures(&report));
    assert_eq!(report.family(TestFamily::BatchSignal).total(), 20);
    assert_eq!(report.family(TestFamily::ChannelEdge).total(), 16);
    assert_eq!(report.succeeded, 36);
    assert!(!bench.is_connected());
    assert!(bench.uploads().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_event_order_covers_both_directions() {
    let bench = SimBench::new(PinMap::default());
    let report = sim_orchestrator(&bench).run().await.unwrap();
    let events = &report.events;

    assert_eq!(events[0].driver, "hardware");
    assert_eq!(events[0].expected, "[0, 0, 0, 0]");
    assert_eq!(events[10].driver, "peer");
    assert_eq!(events[10].observer, "hardware");

    let edge = &events[20];
    assert_eq!(edge.family, TestFamily::ChannelEdge);
    assert_eq!((edge.driver.as_str(), edge.channel), ("hardware", Some(0)));
    assert_eq!(edge.expected, "1");
    assert_eq!(events[24].expected, "0");
    assert_eq!(events[28].driver, "peer");
}

#[tokio::test(start_paused = true)]
async fn test_muted_notifications_time_out_edge_reads() {
    let bench = SimBench::new(PinMap::default()).with_faults(SimFaults {
        mute_notifications: true,
        ..SimFaults::default()
    });

    let report = sim_orchestrator(&bench).run().await.unwrap();

    assert_eq!(report.total(), 36);
    assert_eq!(report.family(TestFamily::BatchSignal).failed, 0);
    let failed = failures(&report);
    assert_eq!(failed.len(), 8);
    for event in failed {
        assert_eq!(event.observer, "peer");
        assert_eq!(event.outcome, TestOutcome::TimedOut { waited_ms: 5_000 });
    }
}

#[tokio::test(start_paused = true)]
async fn test_stuck_channel_fails_only_its_tests() {
    let bench = SimBench::new(PinMap::default()).with_faults(SimFaults {
        stuck_output: Some(2),
        ..SimFaults::default()
    });

    let report = sim_orchestrator(&bench).run().await.unwrap();

    assert_eq!(report.total(), 36);
    // 0010, 0110, 0011, 1111 read back wrong, plus channel 2 driven High.
    assert_eq!(report.failed, 5);
    let failed = failures(&report);
    assert!(failed.iter().all(|event| event.driver == "peer"));
    assert!(failed
        .iter()
        .all(|event| event.outcome == TestOutcome::Mismatch));
    let edge = failed.last().unwrap();
    assert_eq!(edge.channel, Some(2));
    assert_eq!(edge.actual.as_deref(), Some("0"));
}

#[tokio::test]
async fn test_refused_connection_aborts_and_tears_down() {
    let bench = SimBench::new(PinMap::default()).with_faults(SimFaults {
        refuse_connection: true,
        ..SimFaults::default()
    });
    let mut orchestrator = sim_orchestrator(&bench);

    let err = orchestrator.run().await.unwrap_err();
    assert!(matches!(
        err,
        OrchestratorError::Init(EndpointError::Connection { .. })
    ));

    // The hardware side was released: its lines are no longer configured.
    let (mut hardware, _) = orchestrator.into_inner();
    assert!(hardware.get_inputs().await.is_err());
}

#[derive(Debug, Default)]
struct Calls {
    inits: u32,
    uninits: u32,
    reads: u32,
    cancels: u32,
}

/// Endpoint that always reads all-Low and can be told to misbehave.
struct FakeEndpoint {
    name: &'static str,
    calls: Arc<Mutex<Calls>>,
    refuse_init: bool,
    fail_writes: bool,
    fail_arm: bool,
}

impl FakeEndpoint {
    fn new(name: &'static str) -> (Self, Arc<Mutex<Calls>>) {
        let calls = Arc::new(Mutex::new(Calls::default()));
        let endpoint = Self {
            name,
            calls: Arc::clone(&calls),
            refuse_init: false,
            fail_writes: false,
            fail_arm: false,
        };
        (endpoint, calls)
    }

    fn write_result(&self) -> Result<(), EndpointError> {
        if self.fail_writes {
            return Err(EndpointError::Transport {
                endpoint: self.name.to_string(),
                source: TransportFault::new("write rejected"),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl Endpoint for FakeEndpoint {
    fn name(&self) -> &str {
        self.name
    }

    async fn init(&mut self) -> Result<(), EndpointError> {
        if self.refuse_init {
            return Err(EndpointError::Connection {
                endpoint: self.name.to_string(),
                source: TransportFault::new("unreachable"),
            });
        }
        self.calls.lock().unwrap().inits += 1;
        Ok(())
    }

    async fn uninit(&mut self) {
        self.calls.lock().unwrap().uninits += 1;
    }

    async fn set_outputs(&mut self, _outputs: &SignalVector) -> Result<(), EndpointError> {
        self.write_result()
    }

    async fn get_inputs(&mut self) -> Result<SignalVector, EndpointError> {
        Ok(SignalVector::uniform(Signal::Low, 4))
    }

    async fn set_output(&mut self, _index: usize, _value: Signal) -> Result<(), EndpointError> {
        self.write_result()
    }

    async fn before_get_input(&mut self, index: usize) -> Result<(), EndpointError> {
        if self.fail_arm {
            return Err(EndpointError::ProtocolViolation {
                endpoint: self.name.to_string(),
                detail: format!("channel {index} already armed"),
            });
        }
        Ok(())
    }

    async fn get_input(
        &mut self,
        _index: usize,
        _timeout: Duration,
    ) -> Result<Option<Signal>, EndpointError> {
        self.calls.lock().unwrap().reads += 1;
        Ok(Some(Signal::Low))
    }

    async fn cancel_get_input(&mut self, _index: usize) {
        self.calls.lock().unwrap().cancels += 1;
    }
}

#[tokio::test]
async fn test_transport_errors_do_not_stop_the_run() {
    let (mut a, a_calls) = FakeEndpoint::new("a");
    a.fail_writes = true;
    let (b, b_calls) = FakeEndpoint::new("b");
    let mut orchestrator = Orchestrator::new(a, b, OrchestratorConfig::default());

    let report = orchestrator.run().await.unwrap();

    assert_eq!(report.total(), 36);
    let errors = report
        .events
        .iter()
        .filter(|event| matches!(event.outcome, TestOutcome::Error { .. }))
        .count();
    assert_eq!(errors, 18);
    // b -> a: all-low batch vectors and Low edges match.
    assert_eq!(report.succeeded, 2 + 4);

    // Every edge read armed on b for a failed drive was withdrawn unread.
    let b_calls = b_calls.lock().unwrap();
    assert_eq!((b_calls.cancels, b_calls.reads), (8, 0));
    let a_calls = a_calls.lock().unwrap();
    assert_eq!((a_calls.cancels, a_calls.reads), (0, 8));
}

#[tokio::test]
async fn test_protocol_violation_aborts_with_teardown() {
    let (a, a_calls) = FakeEndpoint::new("a");
    let (mut b, b_calls) = FakeEndpoint::new("b");
    b.fail_arm = true;
    let mut orchestrator = Orchestrator::new(a, b, OrchestratorConfig::default());

    let err = orchestrator.run().await.unwrap_err();

    assert!(matches!(
        err,
        OrchestratorError::Aborted(EndpointError::ProtocolViolation { .. })
    ));
    assert_eq!(err.endpoint_error().endpoint(), "b");
    assert_eq!(a_calls.lock().unwrap().uninits, 1);
    assert_eq!(b_calls.lock().unwrap().uninits, 1);
}

#[tokio::test]
async fn test_init_failure_tears_down_only_initialized() {
    let (a, a_calls) = FakeEndpoint::new("a");
    let (mut b, b_calls) = FakeEndpoint::new("b");
    b.refuse_init = true;
    let mut orchestrator = Orchestrator::new(a, b, OrchestratorConfig::default());

    assert!(matches!(
        orchestrator.run().await,
        Err(OrchestratorError::Init(_))
    ));
    assert_eq!(a_calls.lock().unwrap().uninits, 1);
    let b_calls = b_calls.lock().unwrap();
    assert_eq!((b_calls.inits, b_calls.uninits), (0, 0));
}

#[tokio::test]
async fn test_first_init_failure_runs_nothing() {
    let (mut a, a_calls) = FakeEndpoint::new("a");
    a.refuse_init = true;
    let (b, b_calls) = FakeEndpoint::new("b");
    let mut orchestrator = Orchestrator::new(a, b, OrchestratorConfig::default());

    assert!(orchestrator.run().await.is_err());
    assert_eq!(a_calls.lock().unwrap().uninits, 0);
    assert_eq!(b_calls.lock().unwrap().inits, 0);
}
