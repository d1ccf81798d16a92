//! Raw-data provider seam.

use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("transport unavailable: {0}")]
    Unavailable(String),
    #[error("malformed payload: {0}")]
    Malformed(String),
}

/// Supplies the raw payload for one load cycle: an array of plain records, or
/// a pre-grouped array of group objects when server grouping is active.
pub trait Transport {
    fn read(&mut self) -> Result<Value, TransportError>;
}

impl<F> Transport for F
where
    F: FnMut() -> Result<Value, TransportError>,
{
    fn read(&mut self) -> Result<Value, TransportError> {
        self()
    }
}

/// In-memory payload served on every read.
#[derive(Debug, Clone, Default)]
pub struct LocalTransport {
    data: Value,
}

impl LocalTransport {
    pub fn new(data: Value) -> Self {
        Self { data }
    }

    pub fn set_data(&mut self, data: Value) {
        self.data = data;
    }
}

impl Transport for LocalTransport {
    fn read(&mut self) -> Result<Value, TransportError> {
        Ok(self.data.clone())
    }
}
