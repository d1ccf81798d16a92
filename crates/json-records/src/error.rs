use thiserror::Error;

use crate::transport::TransportError;

#[derive(Debug, Error)]
pub enum DataSourceError {
    #[error("transport read failed: {0}")]
    Transport(#[from] TransportError),
    #[error("invalid data payload: {0}")]
    InvalidData(String),
    #[error("invalid group payload: {0}")]
    InvalidGroup(#[from] GroupError),
    #[error("invalid options: {0}")]
    Options(#[from] serde_json::Error),
    #[error("record set and grouping overlay disagree: {0}")]
    StructuralMismatch(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GroupError {
    #[error("group path {0:?} does not address a leaf group")]
    InvalidPath(Vec<usize>),
    #[error("malformed group: {0}")]
    Malformed(String),
}
