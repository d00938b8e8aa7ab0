// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Mock Implementations
//!
//! [`MockGateway`] stands in for a real device gateway. It keeps a register
//! image that reads are served from and writes land in, and records every
//! call so tests can check what reached the wire.
//!
//! - Scripted responses take precedence over the register image
//! - Read failures can be injected once or for every read
//! - Simulated latency makes overlap and staleness observable under a
//!   paused clock
//! - The outstanding-read high-water mark is tracked per connection
//! - A read hook runs inside every read, so tests can act on the session
//!   while its request is still in flight

use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use modtap_core::error::{ModtapError, ModtapResult, TransportError};
use modtap_core::gateway::{DeviceGateway, GatewayResult};
use modtap_core::transport::{RtuSettings, TcpSettings};
use modtap_core::types::{ConnectionHandle, ReadFunction, RegisterValue, Value};

/// Timeout reported by injected read failures.
pub const MOCK_TIMEOUT: Duration = Duration::from_millis(1000);

/// A recorded read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadCall {
    /// Connection read from.
    pub handle: ConnectionHandle,
    /// Primitive used.
    pub function: ReadFunction,
    /// First address.
    pub start_address: u16,
    /// Number of items.
    pub count: u16,
    /// Slave id.
    pub slave_id: u8,
}

/// A recorded write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteCall {
    /// Connection written to.
    pub handle: ConnectionHandle,
    /// Address.
    pub address: u16,
    /// Value sent.
    pub value: Value,
    /// Slave id.
    pub slave_id: u8,
}

/// Callback run inside a read, after any latency and before the read
/// resolves.
pub type ReadHook =
    Arc<dyn Fn(ReadCall) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

#[derive(Default)]
struct ReadHookSlot(Mutex<Option<ReadHook>>);

impl fmt::Debug for ReadHookSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ReadHookSlot")
            .field(&self.0.lock().is_some())
            .finish()
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct Outstanding {
    current: usize,
    max: usize,
}

/// A configurable in-memory [`DeviceGateway`].
#[derive(Debug)]
pub struct MockGateway {
    words: Mutex<HashMap<u16, u16>>,
    bits: Mutex<HashMap<u16, bool>>,
    scripted: Mutex<VecDeque<GatewayResult<Vec<RegisterValue>>>>,
    read_latency: Mutex<Duration>,
    read_hook: ReadHookSlot,

    fail_next_read: AtomicBool,
    fail_all_reads: AtomicBool,
    fail_writes: AtomicBool,
    connect_error: Mutex<Option<ModtapError>>,

    next_handle: AtomicU64,
    open: Mutex<HashSet<ConnectionHandle>>,
    outstanding: Mutex<HashMap<ConnectionHandle, Outstanding>>,

    read_count: AtomicU64,
    write_count: AtomicU64,
    connect_count: AtomicU64,
    close_count: AtomicU64,
    read_log: Mutex<Vec<ReadCall>>,
    write_history: Mutex<Vec<WriteCall>>,
}

impl Default for MockGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl MockGateway {
    /// Creates a mock with an all-zero register image and no latency.
    pub fn new() -> Self {
        Self {
            words: Mutex::new(HashMap::new()),
            bits: Mutex::new(HashMap::new()),
            scripted: Mutex::new(VecDeque::new()),
            read_latency: Mutex::new(Duration::ZERO),
            read_hook: ReadHookSlot::default(),
            fail_next_read: AtomicBool::new(false),
            fail_all_reads: AtomicBool::new(false),
            fail_writes: AtomicBool::new(false),
            connect_error: Mutex::new(None),
            next_handle: AtomicU64::new(1),
            open: Mutex::new(HashSet::new()),
            outstanding: Mutex::new(HashMap::new()),
            read_count: AtomicU64::new(0),
            write_count: AtomicU64::new(0),
            connect_count: AtomicU64::new(0),
            close_count: AtomicU64::new(0),
            read_log: Mutex::new(Vec::new()),
            write_history: Mutex::new(Vec::new()),
        }
    }

    // =========================================================================
    // Behaviour
    // =========================================================================

    /// Sets word registers starting at `start`.
    pub fn set_words(&self, start: u16, values: impl IntoIterator<Item = u16>) {
        let mut words = self.words.lock();
        for (address, value) in (start..=u16::MAX).zip(values) {
            words.insert(address, value);
        }
    }

    /// Sets bits starting at `start`.
    pub fn set_bits(&self, start: u16, values: impl IntoIterator<Item = bool>) {
        let mut bits = self.bits.lock();
        for (address, value) in (start..=u16::MAX).zip(values) {
            bits.insert(address, value);
        }
    }

    /// Queues a response for the next read, ahead of the register image.
    pub fn push_response(&self, response: GatewayResult<Vec<RegisterValue>>) {
        self.scripted.lock().push_back(response);
    }

    /// Sets how long each read takes.
    pub fn set_read_latency(&self, latency: Duration) {
        *self.read_latency.lock() = latency;
    }

    /// Runs `hook` inside every subsequent read until cleared.
    pub fn set_read_hook<F, Fut>(&self, hook: F)
    where
        F: Fn(ReadCall) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let hook: ReadHook = Arc::new(move |call| Box::pin(hook(call)));
        *self.read_hook.0.lock() = Some(hook);
    }

    /// Removes the read hook.
    pub fn clear_read_hook(&self) {
        self.read_hook.0.lock().take();
    }

    /// Makes the next read time out.
    pub fn fail_next_read(&self) {
        self.fail_next_read.store(true, Ordering::SeqCst);
    }

    /// Makes every read time out until switched off.
    pub fn fail_all_reads(&self, fail: bool) {
        self.fail_all_reads.store(fail, Ordering::SeqCst);
    }

    /// Makes every write fail until switched off.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Makes connects fail with `error`, or succeed again with `None`.
    pub fn fail_connect(&self, error: Option<ModtapError>) {
        *self.connect_error.lock() = error;
    }

    // =========================================================================
    // Inspection
    // =========================================================================

    /// Number of reads issued.
    pub fn read_count(&self) -> u64 {
        self.read_count.load(Ordering::SeqCst)
    }

    /// Number of writes issued.
    pub fn write_count(&self) -> u64 {
        self.write_count.load(Ordering::SeqCst)
    }

    /// Number of connect attempts.
    pub fn connect_count(&self) -> u64 {
        self.connect_count.load(Ordering::SeqCst)
    }

    /// Number of close calls.
    pub fn close_count(&self) -> u64 {
        self.close_count.load(Ordering::SeqCst)
    }

    /// Every read issued, in order.
    pub fn reads(&self) -> Vec<ReadCall> {
        self.read_log.lock().clone()
    }

    /// The most recent read.
    pub fn last_read(&self) -> Option<ReadCall> {
        self.read_log.lock().last().copied()
    }

    /// Every write issued, in order.
    pub fn write_history(&self) -> Vec<WriteCall> {
        self.write_history.lock().clone()
    }

    /// Highest number of reads ever in flight at once on `handle`.
    pub fn max_outstanding(&self, handle: ConnectionHandle) -> usize {
        self.outstanding
            .lock()
            .get(&handle)
            .map(|o| o.max)
            .unwrap_or(0)
    }

    /// Returns `true` while `handle` is open.
    pub fn is_open(&self, handle: ConnectionHandle) -> bool {
        self.open.lock().contains(&handle)
    }

    /// Number of open connections.
    pub fn open_count(&self) -> usize {
        self.open.lock().len()
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn connect(&self) -> ModtapResult<ConnectionHandle> {
        self.connect_count.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = self.connect_error.lock().clone() {
            return Err(error);
        }
        let handle = ConnectionHandle::new(self.next_handle.fetch_add(1, Ordering::SeqCst));
        self.open.lock().insert(handle);
        Ok(handle)
    }

    fn enter(&self, handle: ConnectionHandle) -> InFlight<'_> {
        let mut outstanding = self.outstanding.lock();
        let entry = outstanding.entry(handle).or_default();
        entry.current += 1;
        entry.max = entry.max.max(entry.current);
        InFlight { mock: self, handle }
    }

    fn image(&self, function: ReadFunction, start: u16, count: u16) -> Vec<RegisterValue> {
        let addresses = (start..=u16::MAX).take(usize::from(count));
        match function {
            ReadFunction::Coils | ReadFunction::DiscreteInputs => {
                let bits = self.bits.lock();
                addresses
                    .map(|a| RegisterValue::bit(a, bits.get(&a).copied().unwrap_or(false)))
                    .collect()
            }
            ReadFunction::HoldingRegisters | ReadFunction::InputRegisters => {
                let words = self.words.lock();
                addresses
                    .map(|a| RegisterValue::word(a, words.get(&a).copied().unwrap_or(0)))
                    .collect()
            }
        }
    }

    async fn serve_read(
        &self,
        function: ReadFunction,
        handle: ConnectionHandle,
        start_address: u16,
        count: u16,
        slave_id: u8,
    ) -> GatewayResult<Vec<RegisterValue>> {
        let call = ReadCall {
            handle,
            function,
            start_address,
            count,
            slave_id,
        };
        self.read_count.fetch_add(1, Ordering::SeqCst);
        self.read_log.lock().push(call);
        let _in_flight = self.enter(handle);

        let latency = *self.read_latency.lock();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        let hook = self.read_hook.0.lock().clone();
        if let Some(hook) = hook {
            hook(call).await;
        }

        if !self.is_open(handle) {
            return Err(TransportError::not_connected(handle));
        }
        if let Some(response) = self.scripted.lock().pop_front() {
            return response;
        }
        if self.fail_next_read.swap(false, Ordering::SeqCst)
            || self.fail_all_reads.load(Ordering::SeqCst)
        {
            return Err(TransportError::timeout(function.name(), MOCK_TIMEOUT));
        }
        Ok(self.image(function, start_address, count))
    }

    fn serve_write(
        &self,
        handle: ConnectionHandle,
        address: u16,
        value: Value,
        slave_id: u8,
    ) -> GatewayResult<()> {
        self.write_count.fetch_add(1, Ordering::SeqCst);
        self.write_history.lock().push(WriteCall {
            handle,
            address,
            value,
            slave_id,
        });
        if !self.is_open(handle) {
            return Err(TransportError::not_connected(handle));
        }
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(TransportError::exception("write", 0x02));
        }
        match value {
            Value::Bit(b) => {
                self.bits.lock().insert(address, b);
            }
            Value::Word(w) => {
                self.words.lock().insert(address, w);
            }
        }
        Ok(())
    }
}

struct InFlight<'a> {
    mock: &'a MockGateway,
    handle: ConnectionHandle,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if let Some(entry) = self.mock.outstanding.lock().get_mut(&self.handle) {
            entry.current -= 1;
        }
    }
}

#[async_trait]
impl DeviceGateway for MockGateway {
    async fn connect_tcp(&self, _settings: &TcpSettings) -> ModtapResult<ConnectionHandle> {
        self.connect()
    }

    async fn connect_rtu(&self, _settings: &RtuSettings) -> ModtapResult<ConnectionHandle> {
        self.connect()
    }

    async fn read_coils(
        &self,
        handle: ConnectionHandle,
        start_address: u16,
        count: u16,
        slave_id: u8,
    ) -> GatewayResult<Vec<RegisterValue>> {
        self.serve_read(ReadFunction::Coils, handle, start_address, count, slave_id)
            .await
    }

    async fn read_discrete_inputs(
        &self,
        handle: ConnectionHandle,
        start_address: u16,
        count: u16,
        slave_id: u8,
    ) -> GatewayResult<Vec<RegisterValue>> {
        self.serve_read(ReadFunction::DiscreteInputs, handle, start_address, count, slave_id)
            .await
    }

    async fn read_holding_registers(
        &self,
        handle: ConnectionHandle,
        start_address: u16,
        count: u16,
        slave_id: u8,
    ) -> GatewayResult<Vec<RegisterValue>> {
        self.serve_read(ReadFunction::HoldingRegisters, handle, start_address, count, slave_id)
            .await
    }

    async fn read_input_registers(
        &self,
        handle: ConnectionHandle,
        start_address: u16,
        count: u16,
        slave_id: u8,
    ) -> GatewayResult<Vec<RegisterValue>> {
        self.serve_read(ReadFunction::InputRegisters, handle, start_address, count, slave_id)
            .await
    }

    async fn write_single_coil(
        &self,
        handle: ConnectionHandle,
        address: u16,
        value: bool,
        slave_id: u8,
    ) -> GatewayResult<()> {
        self.serve_write(handle, address, Value::Bit(value), slave_id)
    }

    async fn write_single_register(
        &self,
        handle: ConnectionHandle,
        address: u16,
        value: u16,
        slave_id: u8,
    ) -> GatewayResult<()> {
        self.serve_write(handle, address, Value::Word(value), slave_id)
    }

    async fn close(&self, handle: ConnectionHandle) -> GatewayResult<()> {
        self.close_count.fetch_add(1, Ordering::SeqCst);
        self.open.lock().remove(&handle);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_image_and_writes() {
        let mock = MockGateway::new();
        let handle = mock.connect_tcp(&TcpSettings::new("plc", 502)).await.unwrap();
        mock.set_words(0, [10, 20]);

        let values = mock.read_holding_registers(handle, 0, 3, 1).await.unwrap();
        assert_eq!(values, RegisterValue::words(0, [10, 20, 0]));

        mock.write_single_register(handle, 2, 99, 1).await.unwrap();
        let values = mock.read_holding_registers(handle, 2, 1, 1).await.unwrap();
        assert_eq!(values, vec![RegisterValue::word(2, 99)]);
        assert_eq!(mock.write_count(), 1);
    }

    #[tokio::test]
    async fn test_scripted_and_injected_failures() {
        let mock = MockGateway::new();
        let handle = mock.connect_tcp(&TcpSettings::new("plc", 502)).await.unwrap();
        mock.push_response(Ok(RegisterValue::bits(5, [true])));
        mock.fail_next_read();

        assert_eq!(
            mock.read_coils(handle, 0, 1, 1).await.unwrap(),
            vec![RegisterValue::bit(5, true)]
        );
        assert!(matches!(
            mock.read_coils(handle, 0, 1, 1).await,
            Err(TransportError::Timeout { .. })
        ));
        assert!(mock.read_coils(handle, 0, 1, 1).await.is_ok());
    }

    #[tokio::test]
    async fn test_closed_handle_rejected() {
        let mock = MockGateway::new();
        let handle = mock.connect_tcp(&TcpSettings::new("plc", 502)).await.unwrap();
        mock.close(handle).await.unwrap();
        assert!(matches!(
            mock.read_coils(handle, 0, 1, 1).await,
            Err(TransportError::NotConnected { .. })
        ));
    }

    #[tokio::test]
    async fn test_read_hook_runs_inside_read() {
        let mock = Arc::new(MockGateway::new());
        let handle = mock.connect_tcp(&TcpSettings::new("plc", 502)).await.unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let hook_seen = seen.clone();
        let hook_mock = mock.clone();
        mock.set_read_hook(move |call| {
            let seen = hook_seen.clone();
            let mock = hook_mock.clone();
            async move {
                seen.lock().push((call.function, mock.max_outstanding(call.handle)));
                // closing mid-read fails the read in progress
                mock.close(call.handle).await.unwrap();
            }
        });

        assert!(matches!(
            mock.read_input_registers(handle, 4, 2, 1).await,
            Err(TransportError::NotConnected { .. })
        ));
        assert_eq!(*seen.lock(), vec![(ReadFunction::InputRegisters, 1)]);

        mock.clear_read_hook();
        let handle = mock.connect_tcp(&TcpSettings::new("plc", 502)).await.unwrap();
        assert!(mock.read_coils(handle, 0, 1, 1).await.is_ok());
        assert_eq!(seen.lock().len(), 1);
    }
}
