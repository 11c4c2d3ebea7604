//! Scripted in-memory transport for unit tests

use std::collections::VecDeque;
use std::time::Duration;

use crate::error::TransportError;
use crate::protocol::{HEADER_RESPONSE_BYTE, RESPONSE_SIZE};
use crate::transport::{Endpoint, Transport};

/// One call observed by the mock, in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Write(Vec<u8>),
    ReadResponse,
    ReadStream(usize),
    ClearHalt(Endpoint),
    Delay(Duration),
}

/// Transport replaying queued responses and stream blocks
///
/// An exhausted queue behaves like a device that never answers.
#[derive(Debug, Default)]
pub struct MockTransport {
    pub events: Vec<Event>,
    pub responses: VecDeque<Result<Vec<u8>, TransportError>>,
    pub stream: VecDeque<Result<Vec<u8>, TransportError>>,
    /// When set, writes accept at most this many bytes
    pub write_limit: Option<usize>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a well-formed response carrying `payload` at `offset`
    pub fn respond(&mut self, offset: usize, payload: &[u8]) {
        let mut raw = vec![0u8; RESPONSE_SIZE];
        raw[0] = HEADER_RESPONSE_BYTE;
        raw[offset..offset + payload.len()].copy_from_slice(payload);
        self.responses.push_back(Ok(raw));
    }

    /// Queue an I2C/PIC/EEPROM read answer
    pub fn respond_i2c(&mut self, payload: &[u8]) {
        self.respond(4, payload);
    }

    /// Queue one data endpoint block
    pub fn push_stream(&mut self, block: Vec<u8>) {
        self.stream.push_back(Ok(block));
    }

    /// All command frames written, in order
    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.events
            .iter()
            .filter_map(|e| match e {
                Event::Write(data) => Some(data.clone()),
                _ => None,
            })
            .collect()
    }

    /// Requested lengths of all stream reads, in order
    pub fn stream_requests(&self) -> Vec<usize> {
        self.events
            .iter()
            .filter_map(|e| match e {
                Event::ReadStream(len) => Some(*len),
                _ => None,
            })
            .collect()
    }
}

impl Transport for MockTransport {
    fn write_command(&mut self, data: &[u8], _timeout: Duration) -> Result<usize, TransportError> {
        self.events.push(Event::Write(data.to_vec()));
        Ok(match self.write_limit {
            Some(limit) => data.len().min(limit),
            None => data.len(),
        })
    }

    fn read_response(&mut self, _timeout: Duration) -> Result<Vec<u8>, TransportError> {
        self.events.push(Event::ReadResponse);
        self.responses
            .pop_front()
            .unwrap_or(Err(TransportError::Timeout))
    }

    fn read_stream(
        &mut self,
        max_len: usize,
        _timeout: Duration,
    ) -> Result<Vec<u8>, TransportError> {
        self.events.push(Event::ReadStream(max_len));
        match self.stream.pop_front() {
            Some(Ok(mut block)) => {
                block.truncate(max_len);
                Ok(block)
            }
            Some(Err(e)) => Err(e),
            None => Err(TransportError::Timeout),
        }
    }

    fn clear_halt(&mut self, endpoint: Endpoint) -> Result<(), TransportError> {
        self.events.push(Event::ClearHalt(endpoint));
        Ok(())
    }

    fn delay(&mut self, duration: Duration) {
        self.events.push(Event::Delay(duration));
    }
}
