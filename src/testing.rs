//! Test doubles for the hardware-facing traits

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::io::{self, ErrorKind, Read};
use std::net::Ipv4Addr;
use std::rc::Rc;
use std::time::{Duration, Instant};

use crate::clock::Clock;
use crate::error::{Error, Result};
use crate::radio::{Radio, RadioRole};
use crate::status::StatusSink;
use crate::transport::LedTransport;

/// Clock that only moves when slept on or advanced
#[derive(Clone)]
pub struct ManualClock {
    base: Instant,
    offset: Rc<Cell<Duration>>,
}

impl ManualClock {
    pub fn new() -> Self {
        ManualClock {
            base: Instant::now(),
            offset: Rc::new(Cell::new(Duration::ZERO)),
        }
    }

    pub fn advance(&self, duration: Duration) {
        self.offset.set(self.offset.get() + duration);
    }

    pub fn elapsed(&self) -> Duration {
        self.offset.get()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.base + self.offset.get()
    }

    fn sleep(&self, duration: Duration) {
        self.advance(duration);
    }
}

#[derive(Default)]
struct RadioState {
    station_active: bool,
    ap_active: bool,
    join_requested: bool,
    connect_requests: u32,
    polls: u32,
    disconnects: u32,
}

/// Radio whose station associates on a chosen poll, or never
#[derive(Clone)]
pub struct ScriptedRadio {
    station_address: Ipv4Addr,
    ap_address: Ipv4Addr,
    succeed_on_poll: Option<u32>,
    state: Rc<RefCell<RadioState>>,
}

impl ScriptedRadio {
    pub fn new(station_address: Ipv4Addr, ap_address: Ipv4Addr, succeed_on_poll: Option<u32>) -> Self {
        ScriptedRadio {
            station_address,
            ap_address,
            succeed_on_poll,
            state: Rc::new(RefCell::new(RadioState::default())),
        }
    }

    pub fn connect_requests(&self) -> u32 {
        self.state.borrow().connect_requests
    }

    pub fn polls(&self) -> u32 {
        self.state.borrow().polls
    }

    pub fn disconnects(&self) -> u32 {
        self.state.borrow().disconnects
    }

    pub fn is_active(&self, role: RadioRole) -> bool {
        let state = self.state.borrow();
        match role {
            RadioRole::Station => state.station_active,
            RadioRole::AccessPoint => state.ap_active,
        }
    }

    fn associated(&self, state: &RadioState) -> bool {
        state.station_active
            && state.join_requested
            && self.succeed_on_poll.is_some_and(|n| state.polls >= n)
    }
}

impl Radio for ScriptedRadio {
    fn set_active(&mut self, role: RadioRole, active: bool) -> Result<()> {
        let mut state = self.state.borrow_mut();
        match role {
            RadioRole::Station => state.station_active = active,
            RadioRole::AccessPoint => state.ap_active = active,
        }
        Ok(())
    }

    fn connect(&mut self, _ssid: &str, _passwd: &str) -> Result<()> {
        let mut state = self.state.borrow_mut();
        state.connect_requests += 1;
        state.join_requested = true;
        Ok(())
    }

    fn is_connected(&mut self) -> bool {
        let mut state = self.state.borrow_mut();
        state.polls += 1;
        self.associated(&state)
    }

    fn disconnect(&mut self) {
        let mut state = self.state.borrow_mut();
        state.disconnects += 1;
        state.join_requested = false;
    }

    fn address(&self, role: RadioRole) -> Option<Ipv4Addr> {
        let state = self.state.borrow();
        match role {
            RadioRole::Station => self.associated(&state).then_some(self.station_address),
            RadioRole::AccessPoint => state.ap_active.then_some(self.ap_address),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisplayCall {
    Clear,
    Text(String, i32, i32),
    Pixel(i32, i32, bool),
    Present,
}

/// Status sink that records every call
#[derive(Clone)]
pub struct RecordingDisplay {
    calls: Rc<RefCell<Vec<DisplayCall>>>,
    fail: bool,
}

impl RecordingDisplay {
    pub fn new() -> Self {
        RecordingDisplay {
            calls: Rc::new(RefCell::new(Vec::new())),
            fail: false,
        }
    }

    /// A display whose every call fails without recording anything
    pub fn failing() -> Self {
        RecordingDisplay {
            fail: true,
            ..Self::new()
        }
    }

    pub fn calls(&self) -> Vec<DisplayCall> {
        self.calls.borrow().clone()
    }

    pub fn texts(&self) -> Vec<(String, i32, i32)> {
        self.calls
            .borrow()
            .iter()
            .filter_map(|call| match call {
                DisplayCall::Text(text, x, y) => Some((text.clone(), *x, *y)),
                _ => None,
            })
            .collect()
    }

    pub fn lit_pixels(&self) -> Vec<(i32, i32)> {
        self.calls
            .borrow()
            .iter()
            .filter_map(|call| match call {
                DisplayCall::Pixel(x, y, true) => Some((*x, *y)),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: DisplayCall) -> Result<()> {
        if self.fail {
            return Err(Error::Io(io::Error::new(ErrorKind::Other, "display unplugged")));
        }
        self.calls.borrow_mut().push(call);
        Ok(())
    }
}

impl StatusSink for RecordingDisplay {
    fn clear(&mut self) -> Result<()> {
        self.record(DisplayCall::Clear)
    }

    fn write_text(&mut self, text: &str, x: i32, y: i32) -> Result<()> {
        self.record(DisplayCall::Text(text.to_string(), x, y))
    }

    fn write_pixel(&mut self, x: i32, y: i32, on: bool) -> Result<()> {
        self.record(DisplayCall::Pixel(x, y, on))
    }

    fn present(&mut self) -> Result<()> {
        self.record(DisplayCall::Present)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportCall {
    Write(Vec<u8>),
    Show(Vec<u8>),
}

/// LED transport that records every call
#[derive(Clone)]
pub struct RecordingTransport {
    calls: Rc<RefCell<Vec<TransportCall>>>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        RecordingTransport {
            calls: Rc::new(RefCell::new(Vec::new())),
        }
    }

    pub fn calls(&self) -> Vec<TransportCall> {
        self.calls.borrow().clone()
    }
}

impl LedTransport for RecordingTransport {
    fn write(&mut self, bytes: &[u8]) -> Result<()> {
        self.calls.borrow_mut().push(TransportCall::Write(bytes.to_vec()));
        Ok(())
    }

    fn show(&mut self, frame: &[u8]) -> Result<()> {
        self.calls.borrow_mut().push(TransportCall::Show(frame.to_vec()));
        Ok(())
    }
}

pub enum ReadStep {
    Data(Vec<u8>),
    /// Read timeout with nothing received
    TimedOut,
    Error(ErrorKind),
}

/// Reader that replays a script, then reports end of stream
pub struct ScriptedReader {
    steps: VecDeque<ReadStep>,
    clock: ManualClock,
    per_read: Duration,
}

impl ScriptedReader {
    pub fn new(steps: Vec<ReadStep>, clock: ManualClock) -> Self {
        ScriptedReader {
            steps: steps.into(),
            clock,
            per_read: Duration::ZERO,
        }
    }

    /// Advance the clock by `per_read` on every read call
    pub fn advancing(mut self, per_read: Duration) -> Self {
        self.per_read = per_read;
        self
    }
}

impl Read for ScriptedReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.clock.advance(self.per_read);
        match self.steps.pop_front() {
            None => Ok(0),
            Some(ReadStep::Data(mut data)) => {
                let n = data.len().min(buf.len());
                buf[..n].copy_from_slice(&data[..n]);
                if n < data.len() {
                    self.steps.push_front(ReadStep::Data(data.split_off(n)));
                }
                Ok(n)
            }
            Some(ReadStep::TimedOut) => Err(io::Error::new(ErrorKind::WouldBlock, "timed out")),
            Some(ReadStep::Error(kind)) => Err(io::Error::new(kind, "scripted failure")),
        }
    }
}
