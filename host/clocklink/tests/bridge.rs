use clocklink::port::{DeviceEnd, MemoryPort, Port};
use clocklink::{BridgeConfig, BridgeError, ClockBridge, Mode};
use clocklink_common::{AlarmIntent, ClockTime, Field, Frame};
use rand::Rng;
use std::io;
use std::thread;
use std::time::{Duration, Instant};

fn config() -> BridgeConfig {
    BridgeConfig {
        port: "mem".into(),
        poll_interval_ms: 1,
        settings_poll_interval_ms: 1,
        ..Default::default()
    }
}

fn connected() -> (ClockBridge, DeviceEnd) {
    let (port, device) = MemoryPort::pair();
    let mut bridge = ClockBridge::with_reference_year(config(), 2025);
    bridge.open_with(Box::new(port)).unwrap();
    (bridge, device)
}

/// Tick until `done` holds or two seconds pass.
fn tick_until(bridge: &mut ClockBridge, mut done: impl FnMut(&ClockBridge) -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        bridge.tick();
        if done(bridge) {
            return true;
        }
        thread::sleep(Duration::from_millis(2));
    }
    false
}

fn burst(month: u8, day: u8, hour: u8, minute: u8, second: u8) -> Vec<u8> {
    [
        Frame::new(Field::Second, second),
        Frame::new(Field::Minute, minute),
        Frame::new(Field::Hour, hour),
        Frame::new(Field::Day, day),
        Frame::new(Field::Month, month),
    ]
    .iter()
    .flat_map(|f| f.to_bytes())
    .collect()
}

#[test]
fn test_telemetry_reaches_state() {
    let (mut bridge, device) = connected();
    assert!(bridge.is_open());
    assert_eq!(bridge.status_text(), "Connected to mem @ 9600");
    assert_eq!(bridge.formatted().time_text, "--:--:--");

    device.send(&burst(3, 4, 5, 6, 7));
    assert!(tick_until(&mut bridge, |b| b.snapshot().month.is_some()));
    let f = bridge.formatted();
    assert_eq!(f.time_text, "05:06:07");
    assert_eq!(f.date_text, "March 04");
}

#[test]
fn test_garbage_does_not_desync() {
    let (mut bridge, device) = connected();
    let mut rng = rand::thread_rng();
    let mut bytes = vec![];
    for _ in 0..rng.gen_range(1..8) {
        // anything that isn't a type code
        let b = loop {
            let b: u8 = rng.gen();
            if Field::try_from(b).is_err() {
                break b;
            }
        };
        bytes.push(b);
    }
    bytes.extend(burst(12, 31, 23, 59, 58));
    device.send(&bytes);
    assert!(tick_until(&mut bridge, |b| b.snapshot().validated().is_some()));
    assert_eq!(
        bridge.snapshot().validated(),
        Some(ClockTime {
            month: 12,
            day: 31,
            hour: 23,
            minute: 59,
            second: 58
        })
    );
}

#[test]
fn test_set_clock_writes_command() {
    let (mut bridge, device) = connected();
    bridge
        .request_set_clock(ClockTime {
            month: 12,
            day: 31,
            hour: 23,
            minute: 59,
            second: 58,
        })
        .unwrap();
    assert_eq!(device.take_written(), [0xAA, 12, 31, 23, 59, 58]);
    assert_eq!(device.input_flushes(), 1);
    assert_eq!(bridge.mode(), Mode::Monitoring);
    assert_eq!(
        bridge.status_text(),
        "Clock set: December 31 | 23:59:58 sent to device."
    );
}

#[test]
fn test_invalid_clock_sends_nothing() {
    let (mut bridge, device) = connected();
    let e = bridge
        .request_set_clock(ClockTime {
            month: 2,
            day: 30,
            hour: 0,
            minute: 0,
            second: 0,
        })
        .unwrap_err();
    assert!(matches!(e, BridgeError::Validation(v) if v.field == "day"));
    assert!(device.take_written().is_empty());
    assert_eq!(device.input_flushes(), 0);
    assert_eq!(bridge.mode(), Mode::Monitoring);
}

#[test]
fn test_alarm_enabled_is_not_sent() {
    let (mut bridge, device) = connected();
    for enabled in [true, false] {
        bridge
            .request_set_alarm(AlarmIntent {
                hour: 7,
                minute: 15,
                enabled,
            })
            .unwrap();
        assert_eq!(device.take_written(), [0xBB, 7, 15]);
    }
    assert_eq!(
        bridge.status_text(),
        "Alarm set: 07:15 | Disabled sent to device."
    );
}

#[test]
fn test_write_failure_returns_to_monitoring() {
    let (mut bridge, device) = connected();
    device.fail_writes(true);
    let e = bridge
        .request_set_alarm(AlarmIntent {
            hour: 1,
            minute: 2,
            enabled: true,
        })
        .unwrap_err();
    assert!(matches!(e, BridgeError::WriteFailure(_)));
    assert_eq!(bridge.mode(), Mode::Monitoring);
    assert!(bridge.status_text().starts_with("Error sending data: "));
}

#[test]
fn test_settings_hides_telemetry() {
    let (mut bridge, device) = connected();
    bridge.enter_settings().unwrap();
    assert_eq!(bridge.mode(), Mode::Settings);
    assert_eq!(bridge.status_text(), "In Settings Mode: UART RX paused.");

    device.send(&burst(1, 2, 3, 4, 5));
    thread::sleep(Duration::from_millis(30));
    assert!(!bridge.tick());
    assert_eq!(bridge.snapshot().second, None);

    bridge.exit_settings();
    assert_eq!(bridge.status_text(), "Main Monitor: UART RX resumed.");
    // bytes that arrived while paused are read after resuming
    assert!(tick_until(&mut bridge, |b| b.snapshot().second == Some(5)));
}

#[test]
fn test_closed_bridge_refuses_commands() {
    let mut bridge = ClockBridge::with_reference_year(config(), 2025);
    assert!(!bridge.is_open());
    assert!(matches!(
        bridge.enter_settings(),
        Err(BridgeError::ModeTransitionRejected)
    ));
    assert!(matches!(
        bridge.request_set_alarm(AlarmIntent {
            hour: 1,
            minute: 2,
            enabled: false
        }),
        Err(BridgeError::PortClosed)
    ));
    assert!(!bridge.tick());
}

#[test]
fn test_close_is_idempotent() {
    let (mut bridge, _device) = connected();
    bridge.close();
    assert!(!bridge.is_open());
    assert_eq!(bridge.status_text(), "Disconnected from mem");
    bridge.close();
    assert!(!bridge.is_open());
    assert_eq!(bridge.status_text(), "Disconnected from mem");
}

/// A transport whose every read takes a quarter of a second.
struct Sluggish;
impl Port for Sluggish {
    fn read_available(&mut self, _buf: &mut Vec<u8>) -> io::Result<usize> {
        thread::sleep(Duration::from_millis(250));
        Ok(0)
    }

    fn write_all(&mut self, _bytes: &[u8]) -> io::Result<()> {
        Ok(())
    }

    fn clear_input(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[test]
fn test_close_with_reader_mid_read() {
    let mut bridge = ClockBridge::with_reference_year(
        BridgeConfig {
            shutdown_timeout_ms: 20,
            ..config()
        },
        2025,
    );
    bridge.open_with(Box::new(Sluggish)).unwrap();
    thread::sleep(Duration::from_millis(20));

    let start = Instant::now();
    bridge.close();
    assert!(!bridge.is_open());
    // waits out the read in progress, not a full shutdown
    assert!(start.elapsed() < Duration::from_secs(1));
    assert_eq!(bridge.status_text(), "Disconnected from mem");
    assert!(!bridge.tick());
}

#[test]
fn test_open_missing_port() {
    let mut bridge = ClockBridge::with_reference_year(
        BridgeConfig {
            port: "/dev/clocklink-missing".into(),
            ..Default::default()
        },
        2025,
    );
    assert!(matches!(
        bridge.open(),
        Err(BridgeError::PortUnavailable { .. })
    ));
    assert!(bridge
        .status_text()
        .starts_with("Error opening /dev/clocklink-missing: "));
}

#[test]
fn test_simulated_clock_end_to_end() {
    use chrono::{Datelike, NaiveDate};
    use clocklink::sim::SimulatedClock;

    let (port, device) = MemoryPort::pair();
    let mut bridge = ClockBridge::with_reference_year(config(), 2025);
    bridge.open_with(Box::new(port)).unwrap();
    let start = NaiveDate::from_ymd_opt(2025, 6, 1)
        .unwrap()
        .and_hms_opt(12, 0, 0)
        .unwrap();
    let (mut task, clock) = SimulatedClock::new(device, start)
        .with_garbage_every(2)
        .spawn(Duration::from_millis(5))
        .unwrap();

    assert!(tick_until(&mut bridge, |b| b.snapshot().month == Some(6)));
    bridge
        .request_set_clock(ClockTime {
            month: 1,
            day: 2,
            hour: 3,
            minute: 4,
            second: 5,
        })
        .unwrap();
    assert!(tick_until(&mut bridge, |b| b.snapshot().month == Some(1)));
    task.stop();
    assert_eq!(clock.lock().unwrap().now().day(), 2);
}
