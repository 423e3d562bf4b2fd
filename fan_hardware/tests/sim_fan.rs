use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use fan_hardware::{FanModel, SimulatedFan};
use fan_traits::{EdgeEvent, EdgeKind, EdgeSource, PwmOutput};
use rstest::rstest;

fn collect(events: &Arc<Mutex<Vec<EdgeEvent>>>) -> Vec<EdgeEvent> {
    events.lock().unwrap().clone()
}

#[rstest]
fn emits_rising_edges_while_driven() {
    let (mut tach, mut pwm) = SimulatedFan::new(FanModel::default());
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink_events = events.clone();
    tach.subscribe(Box::new(move |ev| sink_events.lock().unwrap().push(ev)))
        .unwrap();

    // Full duty: 3000 rpm, one edge every 20 ms.
    pwm.set_pwm(25_000, fan_traits::PWM_DUTY_RANGE).unwrap();
    thread::sleep(Duration::from_millis(200));

    let seen = collect(&events);
    let rising: Vec<_> = seen.iter().filter(|e| e.kind == EdgeKind::Rising).collect();
    assert!(rising.len() >= 3, "expected several edges, got {}", rising.len());
    for pair in rising.windows(2) {
        let diff = pair[1].tick.wrapping_sub(pair[0].tick);
        assert!(diff >= 15_000, "edges too close: {diff} us");
    }
}

#[rstest]
fn stopped_rotor_produces_watchdog_timeouts_only_when_armed() {
    let (mut tach, _pwm) = SimulatedFan::new(FanModel::default());
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink_events = events.clone();
    tach.subscribe(Box::new(move |ev| sink_events.lock().unwrap().push(ev)))
        .unwrap();

    thread::sleep(Duration::from_millis(80));
    assert!(collect(&events).is_empty(), "no watchdog armed yet");

    tach.arm_watchdog(20).unwrap();
    thread::sleep(Duration::from_millis(150));
    let seen = collect(&events);
    assert!(!seen.is_empty());
    assert!(seen.iter().all(|e| e.kind == EdgeKind::WatchdogTimeout));

    tach.disarm_watchdog().unwrap();
    thread::sleep(Duration::from_millis(30));
    let settled = collect(&events).len();
    thread::sleep(Duration::from_millis(100));
    assert_eq!(collect(&events).len(), settled, "disarmed watchdog kept firing");
}

#[rstest]
fn unsubscribe_stops_delivery() {
    let (mut tach, mut pwm) = SimulatedFan::new(FanModel::default());
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink_events = events.clone();
    tach.subscribe(Box::new(move |ev| sink_events.lock().unwrap().push(ev)))
        .unwrap();
    pwm.set_pwm(25_000, fan_traits::PWM_DUTY_RANGE).unwrap();
    thread::sleep(Duration::from_millis(60));

    tach.unsubscribe().unwrap();
    thread::sleep(Duration::from_millis(30));
    let after_unsub = collect(&events).len();
    thread::sleep(Duration::from_millis(100));
    assert_eq!(collect(&events).len(), after_unsub);
}

#[rstest]
fn drop_joins_thread_promptly() {
    let (tach, _pwm) = SimulatedFan::new(FanModel::default());
    thread::sleep(Duration::from_millis(30));
    let start = std::time::Instant::now();
    drop(tach);
    assert!(start.elapsed() < Duration::from_millis(200));
}
