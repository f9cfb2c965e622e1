//! Hardware integration tests through the OS MIDI service (midir).
//!
//! Uses virtual ports, so no physical device is needed, but a running MIDI
//! service is (ALSA sequencer on Linux, CoreMIDI on macOS).
//! All tests are `#[ignore]` so CI doesn't fail without one.
//!
//! Run with:
//!   cargo test -p rtport-io --test hardware -- --ignored --test-threads=1

#![cfg(all(feature = "midi-io", unix))]

use std::thread;
use std::time::Duration;

use crossbeam_channel::unbounded;
use rtport_io::{MidiMessage, MidiSystem, MidirBackend, PortInfo, ReadablePort, WritablePort};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

const SETTLE: Duration = Duration::from_millis(200);
const DELIVERY_TIMEOUT: Duration = Duration::from_millis(500);

fn system() -> MidiSystem {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    MidiSystem::builder()
        .backend(MidirBackend::new())
        .client_name("rtport-hardware-test")
        .build()
        .expect("Failed to build MidiSystem")
}

/// OS port names carry client and port numbers, so match on a substring.
fn find_port(ports: Vec<PortInfo>, name: &str) -> PortInfo {
    ports
        .into_iter()
        .find(|p| p.name().contains(name))
        .unwrap_or_else(|| panic!("No port containing '{}'", name))
}

fn connected_pair(midi: &MidiSystem, name: &str) -> (ReadablePort, WritablePort) {
    let mut input = ReadablePort::new(midi).unwrap();
    input.open_virtual(name).unwrap();
    thread::sleep(SETTLE);

    let info = find_port(midi.writable_ports().unwrap(), name);
    let mut output = WritablePort::builder(midi).info(info).build().unwrap();
    output.open("rtport-hardware-out").unwrap();
    thread::sleep(SETTLE);
    (input, output)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[test]
#[ignore]
fn test_round_trip_through_os() {
    let midi = system();
    let (mut input, mut output) = connected_pair(&midi, "rtport-rt-in");

    let (tx, rx) = unbounded();
    input
        .set_callback(move |msg: &MidiMessage, _: f64| {
            let _ = tx.send(msg.to_vec());
        })
        .unwrap();

    assert_eq!(output.send_message(&[0x90, 69, 100]).unwrap(), 3);
    assert_eq!(rx.recv_timeout(DELIVERY_TIMEOUT).unwrap(), vec![0x90, 69, 100]);
}

#[test]
#[ignore]
fn test_ignore_timing_through_os() {
    let midi = system();
    let (mut input, mut output) = connected_pair(&midi, "rtport-ignore-in");

    let (tx, rx) = unbounded();
    input
        .set_callback(move |msg: &MidiMessage, _: f64| {
            let _ = tx.send(msg.to_vec());
        })
        .unwrap();

    input.ignore_types(false, true, false).unwrap();
    output.send_message(&[0xF8]).unwrap();
    output.send_message(&[0xFA]).unwrap();
    assert_eq!(rx.recv_timeout(DELIVERY_TIMEOUT).unwrap(), vec![0xFA]);
}

#[test]
#[ignore]
fn test_close_and_reopen_through_os() {
    let midi = system();
    let (mut input, mut output) = connected_pair(&midi, "rtport-reopen-in");

    output.close().unwrap();
    input.close().unwrap();
    assert_eq!(input.generation(), 2);

    input.open_virtual("rtport-reopen-in").unwrap();
    thread::sleep(SETTLE);
    output.open("rtport-hardware-out").unwrap();
    thread::sleep(SETTLE);

    output.send_message(&[0xB0, 7, 64]).unwrap();
    let mut message = MidiMessage::new();
    let mut delta = None;
    for _ in 0..50 {
        delta = input.poll_message(&mut message).unwrap();
        if delta.is_some() {
            break;
        }
        thread::sleep(Duration::from_millis(10));
    }
    assert!(delta.is_some(), "No message polled after reopen");
    assert_eq!(message.as_bytes(), &[0xB0, 7, 64]);
}
