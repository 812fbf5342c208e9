//! ATT error codes and the protocol error type.

use thiserror::Error;

use super::constants::*;

/// ATT error codes as they appear on the wire in an Error Response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttErrorCode {
    InvalidHandle,
    WriteNotPermitted,
    InvalidPdu,
    RequestNotSupported,
    InvalidAttributeValueLength,
    Unlikely,
    /// Application-defined error, 0x80..=0x9F.
    ApplicationError(u8),
    Unknown(u8),
}

impl AttErrorCode {
    /// Wraps an application error code, clamping it into the legal
    /// 0x80..=0x9F range.
    pub fn application(code: u8) -> Self {
        AttErrorCode::ApplicationError(
            code.clamp(ATT_ERROR_APPLICATION_ERROR_START, ATT_ERROR_APPLICATION_ERROR_END),
        )
    }
}

impl From<u8> for AttErrorCode {
    fn from(code: u8) -> Self {
        match code {
            ATT_ERROR_INVALID_HANDLE => AttErrorCode::InvalidHandle,
            ATT_ERROR_WRITE_NOT_PERMITTED => AttErrorCode::WriteNotPermitted,
            ATT_ERROR_INVALID_PDU => AttErrorCode::InvalidPdu,
            ATT_ERROR_REQUEST_NOT_SUPPORTED => AttErrorCode::RequestNotSupported,
            ATT_ERROR_INVALID_ATTRIBUTE_VALUE_LENGTH => AttErrorCode::InvalidAttributeValueLength,
            ATT_ERROR_UNLIKELY => AttErrorCode::Unlikely,
            c if (ATT_ERROR_APPLICATION_ERROR_START..=ATT_ERROR_APPLICATION_ERROR_END)
                .contains(&c) =>
            {
                AttErrorCode::ApplicationError(c)
            }
            c => AttErrorCode::Unknown(c),
        }
    }
}

impl From<AttErrorCode> for u8 {
    fn from(code: AttErrorCode) -> Self {
        match code {
            AttErrorCode::InvalidHandle => ATT_ERROR_INVALID_HANDLE,
            AttErrorCode::WriteNotPermitted => ATT_ERROR_WRITE_NOT_PERMITTED,
            AttErrorCode::InvalidPdu => ATT_ERROR_INVALID_PDU,
            AttErrorCode::RequestNotSupported => ATT_ERROR_REQUEST_NOT_SUPPORTED,
            AttErrorCode::InvalidAttributeValueLength => ATT_ERROR_INVALID_ATTRIBUTE_VALUE_LENGTH,
            AttErrorCode::Unlikely => ATT_ERROR_UNLIKELY,
            AttErrorCode::ApplicationError(c) | AttErrorCode::Unknown(c) => c,
        }
    }
}

/// Protocol errors recovered locally as ATT error responses. The
/// connection stays open.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AttError {
    #[error("invalid or malformed PDU")]
    InvalidPdu,

    #[error("no attribute with handle 0x{0:04x}")]
    InvalidHandle(u16),

    #[error("attribute 0x{0:04x} is not writable")]
    WriteNotPermitted(u16),

    #[error("value length {len} exceeds limit {max} on handle 0x{handle:04x}")]
    InvalidValueLength { handle: u16, len: usize, max: usize },

    #[error("opcode 0x{0:02x} not supported")]
    RequestNotSupported(u8),

    #[error("application error 0x{code:02x} on handle 0x{handle:04x}")]
    Application { handle: u16, code: u8 },

    #[error("internal failure on handle 0x{0:04x}")]
    Unlikely(u16),
}

impl AttError {
    /// The wire error code for this error.
    pub fn to_error_code(&self) -> AttErrorCode {
        match self {
            AttError::InvalidPdu => AttErrorCode::InvalidPdu,
            AttError::InvalidHandle(_) => AttErrorCode::InvalidHandle,
            AttError::WriteNotPermitted(_) => AttErrorCode::WriteNotPermitted,
            AttError::InvalidValueLength { .. } => AttErrorCode::InvalidAttributeValueLength,
            AttError::RequestNotSupported(_) => AttErrorCode::RequestNotSupported,
            AttError::Application { code, .. } => AttErrorCode::application(*code),
            AttError::Unlikely(_) => AttErrorCode::Unlikely,
        }
    }

    /// The attribute handle to report in the error response, if any.
    pub fn handle(&self) -> Option<u16> {
        match self {
            AttError::InvalidHandle(handle)
            | AttError::WriteNotPermitted(handle)
            | AttError::InvalidValueLength { handle, .. }
            | AttError::Application { handle, .. }
            | AttError::Unlikely(handle) => Some(*handle),
            _ => None,
        }
    }
}

/// ATT result type.
pub type AttResult<T> = Result<T, AttError>;
