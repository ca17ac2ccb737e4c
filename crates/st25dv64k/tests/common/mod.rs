#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use buddy_i2c::{
    BusFactory, BusManager, EngineConfig, ErrCode, Fatal, I2cEngine, I2cHal,
    MemAddress, NoMoveIsr, RawStatus,
};
use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use embedded_hal_async::delay::DelayNs;
use st25dv64k::{EepromConfig, Space, St25dv64k};

// ---------------------------------------------------------------------------
// Chip model
// ---------------------------------------------------------------------------

pub const USER_SIZE: usize = 0x2100;

/// Memory of a simulated ST25DV64K plus a log of what reached the wire.
pub struct Chip {
    pub user: Mutex<Vec<u8>>,
    pub regs: Mutex<[u8; 16]>,
    /// Outcomes of the next transfers; `Ok` once drained.
    pub script: Mutex<VecDeque<RawStatus>>,
    /// Raw frames sent to the registers address.
    pub frames: Mutex<Vec<Vec<u8>>>,
    /// (target, memory address, length) of every memory write.
    pub writes: Mutex<Vec<(u8, u16, usize)>>,
    /// Number of upcoming writes that land with the first byte flipped.
    pub corrupt_writes: AtomicUsize,
    pub transfers: AtomicUsize,
    pub reinits: AtomicUsize,
}

impl Chip {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            user: Mutex::new(vec![0; USER_SIZE]),
            regs: Mutex::new([0; 16]),
            script: Mutex::new(VecDeque::new()),
            frames: Mutex::new(Vec::new()),
            writes: Mutex::new(Vec::new()),
            corrupt_writes: AtomicUsize::new(0),
            transfers: AtomicUsize::new(0),
            reinits: AtomicUsize::new(0),
        })
    }

    pub fn script(&self, statuses: impl IntoIterator<Item = RawStatus>) {
        self.script.lock().unwrap().extend(statuses);
    }

    pub fn load(&self, address: usize, data: &[u8]) {
        self.user.lock().unwrap()[address..address + data.len()]
            .copy_from_slice(data);
    }

    pub fn user(&self, address: usize, len: usize) -> Vec<u8> {
        self.user.lock().unwrap()[address..address + len].to_vec()
    }

    pub fn reg(&self, register: u16) -> u8 {
        self.regs.lock().unwrap()[register as usize]
    }

    pub fn transfers(&self) -> usize {
        self.transfers.load(Ordering::SeqCst)
    }

    pub fn reinits(&self) -> usize {
        self.reinits.load(Ordering::SeqCst)
    }

    fn next(&self) -> RawStatus {
        self.transfers.fetch_add(1, Ordering::SeqCst);
        self.script.lock().unwrap().pop_front().unwrap_or(RawStatus::Ok)
    }

    fn offset(mem: MemAddress) -> usize {
        match mem {
            MemAddress::Bits8(a) => a as usize,
            MemAddress::Bits16(a) => a as usize,
        }
    }
}

pub struct ChipHal(Arc<Chip>);

impl I2cHal for ChipHal {
    async fn master_transmit(
        &mut self,
        address: u8,
        data: &[u8],
        _: u32,
    ) -> RawStatus {
        let status = self.0.next();
        if status == RawStatus::Ok && address == Space::Registers.address() {
            self.0.frames.lock().unwrap().push(data.to_vec());
        }
        status
    }

    async fn master_receive(
        &mut self,
        _: u8,
        _: &mut [u8],
        _: u32,
    ) -> RawStatus {
        self.0.next()
    }

    async fn mem_write(
        &mut self,
        address: u8,
        mem: MemAddress,
        data: &[u8],
        _: u32,
    ) -> RawStatus {
        let status = self.0.next();
        if status != RawStatus::Ok {
            return status;
        }
        let at = Chip::offset(mem);
        self.0.writes.lock().unwrap().push((address, at as u16, data.len()));
        if address == Space::Registers.address() {
            self.0.regs.lock().unwrap()[at..at + data.len()]
                .copy_from_slice(data);
            return status;
        }
        let mut user = self.0.user.lock().unwrap();
        user[at..at + data.len()].copy_from_slice(data);
        let corrupt = self.0.corrupt_writes.load(Ordering::SeqCst);
        if corrupt > 0 {
            self.0.corrupt_writes.store(corrupt - 1, Ordering::SeqCst);
            user[at] ^= 0xFF;
        }
        status
    }

    async fn mem_read(
        &mut self,
        address: u8,
        mem: MemAddress,
        buffer: &mut [u8],
        _: u32,
    ) -> RawStatus {
        let status = self.0.next();
        if status != RawStatus::Ok {
            return status;
        }
        let at = Chip::offset(mem);
        if address == Space::Registers.address() {
            let regs = self.0.regs.lock().unwrap();
            buffer.copy_from_slice(&regs[at..at + buffer.len()]);
        } else {
            let user = self.0.user.lock().unwrap();
            buffer.copy_from_slice(&user[at..at + buffer.len()]);
        }
        status
    }

    async fn is_device_ready(&mut self, _: u8, _: u32, _: u32) -> RawStatus {
        self.0.next()
    }

    fn reinit(&mut self) {
        self.0.reinits.fetch_add(1, Ordering::SeqCst);
    }
}

pub struct ChipFactory;

impl BusFactory<1> for ChipFactory {
    type Bus = ChipHal;
    type Resources = Arc<Chip>;
    type Error = ();

    fn create(
        chip: Self::Resources,
    ) -> Result<[Self::Bus; 1], ((), Self::Resources)> {
        Ok([ChipHal(chip)])
    }
}

// ---------------------------------------------------------------------------
// Collaborators
// ---------------------------------------------------------------------------

/// Adds up requested delays instead of sleeping.
pub struct MockDelay(pub Arc<AtomicU64>);

impl DelayNs for MockDelay {
    async fn delay_ns(&mut self, ns: u32) {
        self.0.fetch_add(u64::from(ns), Ordering::SeqCst);
    }

    async fn delay_ms(&mut self, ms: u32) {
        self.0.fetch_add(u64::from(ms) * 1_000_000, Ordering::SeqCst);
    }
}

/// Records the code, then unwinds.
#[derive(Default)]
pub struct PanicFatal {
    pub code: Mutex<Option<ErrCode>>,
}

impl Fatal for PanicFatal {
    fn fatal_error(&self, code: ErrCode) -> ! {
        *self.code.lock().unwrap() = Some(code);
        panic!("fatal error {code}");
    }
}

// ---------------------------------------------------------------------------
// Rig
// ---------------------------------------------------------------------------

pub type Manager = BusManager<NoopRawMutex, ChipFactory, 1>;
pub type Engine<'a> =
    I2cEngine<'a, NoopRawMutex, ChipFactory, NoMoveIsr, &'a PanicFatal, 1>;
pub type Eeprom<'a> =
    St25dv64k<'a, Engine<'a>, NoopRawMutex, MockDelay, &'a PanicFatal>;

pub struct Rig {
    pub manager: Manager,
    pub chip: Arc<Chip>,
    pub fatal: PanicFatal,
    pub delayed_ns: Arc<AtomicU64>,
}

impl Rig {
    pub fn new() -> Self {
        let chip = Chip::new();
        Self {
            manager: BusManager::new(chip.clone()),
            chip,
            fatal: PanicFatal::default(),
            delayed_ns: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn engine(&self) -> Engine<'_> {
        I2cEngine::new(
            &self.manager,
            NoMoveIsr,
            &self.fatal,
            EngineConfig::default(),
        )
    }

    pub fn eeprom<'a>(&'a self, engine: &'a Engine<'a>) -> Eeprom<'a> {
        St25dv64k::new(
            engine,
            MockDelay(self.delayed_ns.clone()),
            &self.fatal,
            EepromConfig::default(),
        )
    }

    pub fn delayed_ms(&self) -> u64 {
        self.delayed_ns.load(Ordering::SeqCst) / 1_000_000
    }

    pub fn fatal_code(&self) -> Option<ErrCode> {
        *self.fatal.code.lock().unwrap()
    }
}

/// Run `f` to completion, expecting it to end in a fatal error.
pub fn expect_fatal<F: std::future::Future>(rig: &Rig, f: F) -> ErrCode {
    let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        embassy_futures::block_on(f)
    }));
    assert!(outcome.is_err(), "operation should not have returned");
    rig.fatal_code().expect("no fatal code recorded")
}
