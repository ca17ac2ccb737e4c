use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use embedded_hal_async::delay::DelayNs;
use usb_serial::{
    CdcTransmit, RxRing, SerialConfig, SerialError, TransmitError, UsbSerial,
};

/// Host side of the port: records delivered buffers, fails on demand.
#[derive(Default)]
struct Host {
    sent: Mutex<Vec<Vec<u8>>>,
    attempts: AtomicUsize,
    /// Number of upcoming attempts that fail.
    failing: AtomicUsize,
}

impl Host {
    fn sent(&self) -> Vec<Vec<u8>> {
        self.sent.lock().unwrap().clone()
    }

    fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    fn fail(&self, attempts: usize) {
        self.failing.store(attempts, Ordering::SeqCst);
    }
}

struct MockPort(Arc<Host>);

impl CdcTransmit for MockPort {
    async fn transmit(&mut self, data: &[u8]) -> Result<(), TransmitError> {
        self.0.attempts.fetch_add(1, Ordering::SeqCst);
        let failing = self.0.failing.load(Ordering::SeqCst);
        if failing > 0 {
            self.0.failing.store(failing - 1, Ordering::SeqCst);
            return Err(TransmitError::Busy);
        }
        self.0.sent.lock().unwrap().push(data.to_vec());
        Ok(())
    }
}

struct MockDelay(Arc<AtomicU64>);

impl DelayNs for MockDelay {
    async fn delay_ns(&mut self, ns: u32) {
        self.0.fetch_add(u64::from(ns), Ordering::SeqCst);
    }
}

// holds RX - 1 bytes
const RX: usize = 9;
const TX: usize = 16;

type Serial<'r> = UsbSerial<'r, MockPort, MockDelay, TX>;

fn serial<'r>(
    ring: &'r mut RxRing<RX>,
    host: &Arc<Host>,
    delayed: &Arc<AtomicU64>,
) -> Serial<'r> {
    let (_, consumer) = ring.split();
    UsbSerial::new(
        consumer,
        MockPort(host.clone()),
        MockDelay(delayed.clone()),
        SerialConfig::default(),
    )
}

struct Rig {
    host: Arc<Host>,
    delayed: Arc<AtomicU64>,
}

impl Rig {
    fn new() -> Self {
        Self { host: Arc::default(), delayed: Arc::default() }
    }

    fn delayed_ms(&self) -> u64 {
        self.delayed.load(Ordering::SeqCst) / 1_000_000
    }
}

#[futures_test::test]
async fn newline_sends_the_line_once() {
    let rig = Rig::new();
    let mut ring = RxRing::new();
    let mut port = serial(&mut ring, &rig.host, &rig.delayed);

    assert_eq!(port.write_all(b"ok T:215").await, 8);
    assert!(rig.host.sent().is_empty());
    assert_eq!(port.write(b'\n').await, 1);

    assert_eq!(rig.host.sent(), vec![b"ok T:215\n".to_vec()]);
    assert_eq!(rig.host.attempts(), 1);
    assert_eq!(port.available_for_write(), TX);
}

#[futures_test::test]
async fn full_buffer_is_sent_when_it_fills() {
    let rig = Rig::new();
    let mut ring = RxRing::new();
    let mut port = serial(&mut ring, &rig.host, &rig.delayed);

    port.write_all(&[b'x'; TX - 1]).await;
    assert!(rig.host.sent().is_empty());
    port.write(b'y').await;

    let sent = rig.host.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].len(), TX);
    assert_eq!(sent[0][TX - 1], b'y');
}

#[futures_test::test]
async fn explicit_flush() {
    let rig = Rig::new();
    let mut ring = RxRing::new();
    let mut port = serial(&mut ring, &rig.host, &rig.delayed);

    assert_eq!(port.flush().await, Ok(()));
    assert_eq!(rig.host.attempts(), 0);

    port.write_all(b"M115").await;
    assert_eq!(port.available_for_write(), TX - 4);
    assert_eq!(port.flush().await, Ok(()));
    assert_eq!(rig.host.sent(), vec![b"M115".to_vec()]);
}

#[futures_test::test]
async fn transient_failures_are_retried() {
    let rig = Rig::new();
    let mut ring = RxRing::new();
    let mut port = serial(&mut ring, &rig.host, &rig.delayed);
    rig.host.fail(2);

    port.write_all(b"abc").await;
    assert_eq!(port.flush().await, Ok(()));

    assert_eq!(rig.host.attempts(), 3);
    assert_eq!(rig.delayed_ms(), 2);
    assert_eq!(rig.host.sent(), vec![b"abc".to_vec()]);
    assert_eq!(port.failures(), 0);
}

#[futures_test::test]
async fn failed_flush_drops_the_buffer() {
    let rig = Rig::new();
    let mut ring = RxRing::new();
    let mut port = serial(&mut ring, &rig.host, &rig.delayed);
    let retries = usize::from(port.config().retries);
    rig.host.fail(usize::MAX);

    port.write_all(b"lost").await;
    assert_eq!(
        port.flush().await,
        Err(SerialError::Transmit(TransmitError::Busy))
    );

    assert_eq!(rig.host.attempts(), retries);
    assert_eq!(port.failures(), 1);
    assert!(port.is_enabled());
    assert_eq!(port.available_for_write(), TX);
}

#[futures_test::test]
async fn repeated_failures_disable_output() {
    let rig = Rig::new();
    let mut ring = RxRing::new();
    let mut port = serial(&mut ring, &rig.host, &rig.delayed);
    let max_failures = port.config().max_failures;
    rig.host.fail(usize::MAX);

    for _ in 0..max_failures {
        port.write_all(b"line\n").await;
    }
    assert!(!port.is_enabled());
    assert_eq!(port.failures(), 0);

    let attempts = rig.host.attempts();
    port.write_all(b"more\n").await;
    port.write_all(b"tail").await;
    assert_eq!(port.flush().await, Err(SerialError::Disabled));
    assert_eq!(rig.host.attempts(), attempts);
    // nothing attempted, nothing dropped
    assert_eq!(port.available_for_write(), TX - 9);
}

#[futures_test::test]
async fn success_resets_the_failure_count() {
    let rig = Rig::new();
    let mut ring = RxRing::new();
    let mut port = serial(&mut ring, &rig.host, &rig.delayed);
    let retries = usize::from(port.config().retries);
    rig.host.fail(retries * 2);

    port.write_all(b"a\n").await;
    port.write_all(b"b\n").await;
    assert_eq!(port.failures(), 2);

    port.write_all(b"c\n").await;
    assert_eq!(port.failures(), 0);
    assert!(port.is_enabled());
    assert_eq!(rig.host.sent(), vec![b"c\n".to_vec()]);
}

#[futures_test::test]
async fn begin_switches_output_back_on() {
    let rig = Rig::new();
    let mut ring = RxRing::new();
    let mut port = serial(&mut ring, &rig.host, &rig.delayed);

    port.end();
    port.write_all(b"held\n").await;
    assert_eq!(rig.host.attempts(), 0);

    port.begin();
    port.write_all(b"back\n").await;
    assert_eq!(rig.host.sent(), vec![b"held\nback\n".to_vec()]);
}

#[futures_test::test]
async fn reads_drain_the_input_ring() {
    let rig = Rig::new();
    let mut ring = RxRing::<RX>::new();
    let (mut producer, consumer) = ring.split();
    let mut port: Serial<'_> = UsbSerial::new(
        consumer,
        MockPort(rig.host.clone()),
        MockDelay(rig.delayed.clone()),
        SerialConfig::default(),
    );

    assert_eq!(port.read(), None);
    assert!(producer.put_rx_data(b"G28\nM1"));
    assert_eq!(port.available(), 6);

    let mut line = [0u8; 8];
    assert_eq!(port.read_bytes_until(b'\n', &mut line), 4);
    assert_eq!(&line[..4], b"G28\n");

    assert_eq!(port.peek(), Some(b'M'));
    assert_eq!(port.read(), Some(b'M'));

    // wraps past the end of the ring
    assert!(producer.put_rx_data(b"05\n"));
    let mut rest = [0u8; 8];
    assert_eq!(port.read_bytes(&mut rest), 4);
    assert_eq!(&rest[..4], b"105\n");
    assert_eq!(port.available(), 0);
}

#[futures_test::test]
async fn read_until_respects_the_buffer() {
    let rig = Rig::new();
    let mut ring = RxRing::<RX>::new();
    let (mut producer, consumer) = ring.split();
    let mut port: Serial<'_> = UsbSerial::new(
        consumer,
        MockPort(rig.host.clone()),
        MockDelay(rig.delayed.clone()),
        SerialConfig::default(),
    );

    assert!(producer.put_rx_data(b"abcdef\n"));
    let mut small = [0u8; 3];
    assert_eq!(port.read_bytes_until(b'\n', &mut small), 3);
    assert_eq!(&small, b"abc");
    assert_eq!(port.available(), 4);
}

#[test]
fn oversized_chunk_leaves_input_unchanged() {
    let mut ring = RxRing::<RX>::new();
    let (mut producer, mut consumer) = ring.split();

    assert!(producer.put_rx_data(b"abcdef"));
    assert!(!producer.put_rx_data(b"xyz"));
    assert_eq!(consumer.len(), 6);
    assert_eq!(producer.free(), 2);

    let drained: Vec<u8> = std::iter::from_fn(|| consumer.pop()).collect();
    assert_eq!(drained, b"abcdef");
}
