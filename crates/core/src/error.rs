use thiserror::Error;

use crate::time_window::LocalDateTimeField;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TimeError {
    /// 数値でない、または形式が崩れた日時入力
    #[error("Malformed local date-time: {0:?}")]
    Malformed(String),

    #[error("Local date-time is out of the representable range: {0}")]
    OutOfRange(LocalDateTimeField),

    #[error("Invalid instant (expected RFC 3339): {0:?}")]
    InvalidInstant(String),
}

pub type Result<T> = std::result::Result<T, TimeError>;
