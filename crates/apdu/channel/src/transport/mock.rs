//! Scripted in-memory transport
//!
//! [`MockChannel`] replays queued responses and records every transmitted
//! command. Clones share state, so a test can hand one clone to an
//! [`ApduChannel`](crate::channel::ApduChannel) and inspect the traffic
//! through another.

use std::collections::VecDeque;
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;

use super::{CardChannel, ResetMode, TransportError};

#[derive(Debug)]
struct MockState {
    responses: VecDeque<Result<Bytes, TransportError>>,
    sent: Vec<Bytes>,
    atr: Bytes,
    open: bool,
    exclusive: bool,
    connected: bool,
    open_calls: usize,
    close_calls: usize,
    disconnect_calls: usize,
    resets: Vec<ResetMode>,
    fail_disconnect: bool,
}

/// Mock transport for testing
#[derive(Debug, Clone)]
pub struct MockChannel {
    state: Arc<Mutex<MockState>>,
}

impl Default for MockChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl MockChannel {
    /// Create a closed mock transport with an empty script
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState {
                responses: VecDeque::new(),
                sent: Vec::new(),
                atr: Bytes::from_static(&[0x3B, 0x80, 0x80, 0x01, 0x01]),
                open: false,
                exclusive: false,
                connected: false,
                open_calls: 0,
                close_calls: 0,
                disconnect_calls: 0,
                resets: Vec::new(),
                fail_disconnect: false,
            })),
        }
    }

    /// Create a mock transport whose script holds the given responses
    pub fn with_responses<I, B>(responses: I) -> Self
    where
        I: IntoIterator<Item = B>,
        B: Into<Bytes>,
    {
        let mock = Self::new();
        for response in responses {
            mock.push_response(response);
        }
        mock
    }

    /// Queue a response for the next transmit
    pub fn push_response(&self, response: impl Into<Bytes>) {
        self.state.lock().responses.push_back(Ok(response.into()));
    }

    /// Queue a transport failure for the next transmit
    pub fn push_failure(&self, error: TransportError) {
        self.state.lock().responses.push_back(Err(error));
    }

    /// Set the answer-to-reset returned by connect and reset
    pub fn set_atr(&self, atr: impl Into<Bytes>) {
        self.state.lock().atr = atr.into();
    }

    /// Mark the link as already opened by someone else
    pub fn set_open(&self, open: bool) {
        self.state.lock().open = open;
    }

    /// Make the next disconnects fail
    pub fn set_fail_disconnect(&self, fail: bool) {
        self.state.lock().fail_disconnect = fail;
    }

    /// Commands transmitted so far
    pub fn sent(&self) -> Vec<Bytes> {
        self.state.lock().sent.clone()
    }

    /// Number of queued responses not consumed yet
    pub fn pending_responses(&self) -> usize {
        self.state.lock().responses.len()
    }

    /// Whether the last open requested exclusive access
    pub fn opened_exclusive(&self) -> bool {
        self.state.lock().exclusive
    }

    /// Number of open calls
    pub fn open_calls(&self) -> usize {
        self.state.lock().open_calls
    }

    /// Number of close calls
    pub fn close_calls(&self) -> usize {
        self.state.lock().close_calls
    }

    /// Number of disconnect calls
    pub fn disconnect_calls(&self) -> usize {
        self.state.lock().disconnect_calls
    }

    /// Reset modes requested so far
    pub fn resets(&self) -> Vec<ResetMode> {
        self.state.lock().resets.clone()
    }
}

impl CardChannel for MockChannel {
    fn open(&mut self, exclusive: bool) -> Result<(), TransportError> {
        let mut state = self.state.lock();
        state.open = true;
        state.exclusive = exclusive;
        state.open_calls += 1;
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.state.lock().open
    }

    fn connect(&mut self, _params: Option<&[u8]>) -> Result<Bytes, TransportError> {
        let mut state = self.state.lock();
        if !state.open {
            return Err(TransportError::NotOpen);
        }
        state.connected = true;
        Ok(state.atr.clone())
    }

    fn reset(&mut self, mode: ResetMode) -> Result<Bytes, TransportError> {
        let mut state = self.state.lock();
        if !state.connected {
            return Err(TransportError::NoCard);
        }
        state.resets.push(mode);
        Ok(state.atr.clone())
    }

    fn disconnect(&mut self, _params: Option<&[u8]>) -> Result<(), TransportError> {
        let mut state = self.state.lock();
        state.disconnect_calls += 1;
        state.connected = false;
        if state.fail_disconnect {
            return Err(TransportError::Device);
        }
        Ok(())
    }

    fn close(&mut self) -> Result<(), TransportError> {
        let mut state = self.state.lock();
        state.open = false;
        state.connected = false;
        state.close_calls += 1;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.state.lock().connected
    }

    fn transmit(&mut self, command: &[u8]) -> Result<Bytes, TransportError> {
        let mut state = self.state.lock();
        state.sent.push(Bytes::copy_from_slice(command));
        state
            .responses
            .pop_front()
            .unwrap_or(Err(TransportError::Transmission))
    }
}
