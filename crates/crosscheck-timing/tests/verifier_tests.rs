use std::time::Duration;

use crosscheck_endpoint::{
    DirectHardwareEndpoint, Endpoint, EndpointError, PeripheralConfig, PinMap, ProgramUpload,
    WireProtocolEndpoint,
};
use crosscheck_signal::SignalVector;
use crosscheck_sim::{PeerProgram, SimBench, SimFaults, SimLines, SimPeripheral};
use crosscheck_timing::{
    await_state, AwaitError, ScriptStep, SteadyStateCheck, StepOutcome, TimingConfig,
    TimingScript, TimingVerifier, VerifierError,
};

type Verifier = TimingVerifier<
    DirectHardwareEndpoint<SimLines>,
    WireProtocolEndpoint<SimPeripheral>,
>;

fn v(text: &str) -> SignalVector {
    text.parse().unwrap()
}

/// The peer-side program that honours `script` exactly.
fn faithful_program(script: &TimingScript) -> PeerProgram {
    let mut program = PeerProgram::new();
    for step in &script.steps {
        program = program.sleep(step.nominal()).drive(step.expect.clone());
    }
    for check in &script.steady_states {
        program = program
            .await_inputs(check.trigger.clone())
            .drive(check.next.clone());
    }
    program
}

fn verifier(bench: &SimBench) -> Verifier {
    let config = PeripheralConfig::default();
    TimingVerifier::new(
        DirectHardwareEndpoint::new("hardware", bench.lines(), PinMap::default()),
        WireProtocolEndpoint::new("peer", bench.peripheral(&config), config),
        TimingConfig::default(),
    )
}

fn script(steps: Vec<ScriptStep>, steady_states: Vec<SteadyStateCheck>) -> TimingScript {
    TimingScript {
        channels: 4,
        steps,
        steady_states,
    }
}

#[tokio::test(start_paused = true)]
async fn test_reference_script_passes() {
    let script = TimingScript::reference();
    let bench = SimBench::new(PinMap::default()).with_program(faithful_program(&script));
    let mut verifier = verifier(&bench);

    let report = verifier.run(&script, &[0x10, 0x20, 0x30]).await.unwrap();

    assert!(report.passed(), "{report:#?}");
    // Nine steps, then confirm/hold/trigger for each terminal state.
    assert_eq!(report.records.len(), 15);
    assert_eq!(report.succeeded, 15);
    assert_eq!(bench.uploads(), vec![vec![0x10, 0x20, 0x30]]);
    assert!(!bench.is_connected());

    for record in &report.records[..9] {
        let elapsed = record.elapsed_ms.unwrap();
        assert!(record.min_ms <= elapsed && elapsed <= record.max_ms);
    }
    let trigger = &report.records[11];
    assert!(trigger.elapsed_ms.unwrap() < 5);
    assert_eq!(trigger.max_ms, 5);
}

#[tokio::test(start_paused = true)]
async fn test_early_transition_is_premature() {
    let script = script(vec![ScriptStep::new(v("1000"), 200)], vec![]);
    let program = PeerProgram::new()
        .sleep(Duration::from_millis(100))
        .drive(v("1000"));
    let bench = SimBench::new(PinMap::default()).with_program(program);

    let report = verifier(&bench).run(&script, &[]).await.unwrap();

    assert_eq!(report.failed, 1);
    let record = &report.records[0];
    assert_eq!(record.outcome, StepOutcome::Premature);
    assert_eq!((record.min_ms, record.max_ms), (180, 220));
    assert!(record.elapsed_ms.unwrap() < 180);
}

#[tokio::test(start_paused = true)]
async fn test_missing_transition_times_out() {
    let script = script(
        vec![
            ScriptStep::new(v("1000"), 200),
            ScriptStep::new(v("1100"), 200),
        ],
        vec![],
    );
    let program = PeerProgram::new()
        .sleep(Duration::from_millis(200))
        .drive(v("1000"));
    let bench = SimBench::new(PinMap::default()).with_program(program);

    let report = verifier(&bench).run(&script, &[]).await.unwrap();

    assert_eq!((report.succeeded, report.failed), (1, 1));
    let record = &report.records[1];
    assert_eq!(
        record.outcome,
        StepOutcome::TimedOut {
            last_observed: Some(v("1000"))
        }
    );
    assert!(record.elapsed_ms.unwrap() >= 220);
}

#[tokio::test(start_paused = true)]
async fn test_stuck_channel_times_out_every_dependent_step() {
    let script = TimingScript::reference();
    let bench = SimBench::new(PinMap::default())
        .with_program(faithful_program(&script))
        .with_faults(SimFaults {
            stuck_output: Some(3),
            ..SimFaults::default()
        });

    let report = verifier(&bench).run(&script, &[]).await.unwrap();

    assert!(!report.passed());
    assert!(report.records[0].outcome.is_pass());
    assert!(matches!(
        report.records[3].outcome,
        StepOutcome::TimedOut { .. }
    ));
}

#[tokio::test(start_paused = true)]
async fn test_untriggered_change_is_not_held() {
    let check = SteadyStateCheck {
        held: v("1111"),
        next: v("0000"),
        trigger: v("1111"),
    };
    let script = script(vec![ScriptStep::new(v("1111"), 50)], vec![check]);
    let program = PeerProgram::new()
        .sleep(Duration::from_millis(50))
        .drive(v("1111"))
        .sleep(Duration::from_millis(100))
        .drive(v("0000"));
    let bench = SimBench::new(PinMap::default()).with_program(program);

    let report = verifier(&bench).run(&script, &[]).await.unwrap();

    assert_eq!(report.records.len(), 4);
    assert_eq!(report.records[2].outcome, StepOutcome::NotHeld);
    assert!(report.records[3].outcome.is_pass());
    assert_eq!(report.failed, 1);
}

#[tokio::test(start_paused = true)]
async fn test_slow_trigger_response_times_out() {
    let check = SteadyStateCheck {
        held: v("0000"),
        next: v("1111"),
        trigger: v("1000"),
    };
    let script = script(vec![], vec![check]);
    let program = PeerProgram::new()
        .await_inputs(v("1000"))
        .sleep(Duration::from_millis(20))
        .drive(v("1111"));
    let bench = SimBench::new(PinMap::default()).with_program(program);

    let report = verifier(&bench).run(&script, &[]).await.unwrap();

    assert_eq!(report.records.len(), 3);
    assert!(report.records[1].outcome.is_pass());
    assert!(matches!(
        report.records[2].outcome,
        StepOutcome::TimedOut { .. }
    ));
}

#[tokio::test]
async fn test_refused_connection_aborts() {
    let bench = SimBench::new(PinMap::default()).with_faults(SimFaults {
        refuse_connection: true,
        ..SimFaults::default()
    });
    let mut verifier = verifier(&bench);

    let result = verifier.run(&TimingScript::reference(), &[]).await;

    assert!(matches!(
        result,
        Err(VerifierError::Aborted(EndpointError::Connection { .. }))
    ));
    assert!(bench.uploads().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_await_state_returns_elapsed() {
    let bench = SimBench::new(PinMap::default()).with_program(
        PeerProgram::new()
            .sleep(Duration::from_millis(40))
            .drive(v("0110")),
    );
    let config = PeripheralConfig::default();
    let mut hardware = DirectHardwareEndpoint::new("hardware", bench.lines(), PinMap::default());
    let mut peer = WireProtocolEndpoint::new("peer", bench.peripheral(&config), config);
    hardware.init().await.unwrap();
    peer.init().await.unwrap();
    peer.upload_program(&[]).await.unwrap();

    let elapsed = await_state(
        &mut hardware,
        &v("0110"),
        Duration::from_millis(100),
        Duration::from_millis(2),
    )
    .await
    .unwrap();
    assert!(elapsed >= Duration::from_millis(40));
    assert!(elapsed <= Duration::from_millis(42));

    let err = await_state(
        &mut hardware,
        &v("1111"),
        Duration::from_millis(30),
        Duration::from_millis(2),
    )
    .await
    .unwrap_err();
    match err {
        AwaitError::Timeout {
            last_observed,
            waited_ms,
            ..
        } => {
            assert_eq!(last_observed, Some(v("0110")));
            assert!(waited_ms >= 30);
        }
        other => panic!("unexpected {other:?}"),
    }
}
