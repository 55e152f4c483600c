use std::io;

use super::model::ResponderChannel;

/// Errors returned by engine operations. None of them are fatal; the UI
/// stays interactive and the caller decides how to present them.
#[derive(thiserror::Error, Debug)]
pub enum DispatchError {
    #[error("no phone number configured for {0}")]
    MissingContact(ResponderChannel),
    #[error("dispatch already started and cannot be cancelled")]
    NotCancellable,
    #[error("no active dispatch session")]
    NoSession,
    #[error("no manual alert is open")]
    NoManualAlert,
    #[error("storage failure: {0}")]
    Storage(#[from] io::Error),
}

pub type DispatchResult<T> = Result<T, DispatchError>;
