//! ATT PDU parsing and serialization.
//!
//! Only the PDUs the peripheral role serves: MTU exchange, writes and the
//! error response. All multi-byte fields are little-endian.

use std::io::Cursor;

use byteorder::{LittleEndian, ReadBytesExt};

use super::constants::*;
use super::error::{AttError, AttErrorCode, AttResult};

/// Common shape of an ATT packet.
pub trait AttPacket: Sized {
    /// Opcode for this packet.
    fn opcode() -> u8;

    /// Parse from raw bytes, opcode included.
    fn parse(data: &[u8]) -> AttResult<Self>;

    /// Serialize to raw bytes, opcode included.
    fn serialize(&self) -> Vec<u8>;
}

/// Error Response: rejects a request with a reason code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorResponse {
    /// Opcode of the request being rejected.
    pub request_opcode: u8,
    /// Attribute handle in error, 0 when none applies.
    pub handle: u16,
    pub error_code: AttErrorCode,
}

impl ErrorResponse {
    pub fn new(request_opcode: u8, handle: u16, error_code: AttErrorCode) -> Self {
        Self {
            request_opcode,
            handle,
            error_code,
        }
    }

    /// Builds the response for a dispatch-level [`AttError`].
    pub fn from_error(request_opcode: u8, error: &AttError) -> Self {
        Self {
            request_opcode,
            handle: error.handle().unwrap_or(0),
            error_code: error.to_error_code(),
        }
    }
}

impl AttPacket for ErrorResponse {
    fn opcode() -> u8 {
        ATT_ERROR_RSP
    }

    fn parse(data: &[u8]) -> AttResult<Self> {
        if data.len() < 5 || data[0] != Self::opcode() {
            return Err(AttError::InvalidPdu);
        }
        let request_opcode = data[1];
        let mut cursor = Cursor::new(&data[2..4]);
        let handle = cursor
            .read_u16::<LittleEndian>()
            .map_err(|_| AttError::InvalidPdu)?;
        Ok(Self {
            request_opcode,
            handle,
            error_code: data[4].into(),
        })
    }

    fn serialize(&self) -> Vec<u8> {
        let mut packet = Vec::with_capacity(5);
        packet.push(Self::opcode());
        packet.push(self.request_opcode);
        packet.extend_from_slice(&self.handle.to_le_bytes());
        packet.push(self.error_code.into());
        packet
    }
}

/// Exchange MTU Request: the client proposes its receive MTU.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeMtuRequest {
    pub client_mtu: u16,
}

impl AttPacket for ExchangeMtuRequest {
    fn opcode() -> u8 {
        ATT_EXCHANGE_MTU_REQ
    }

    fn parse(data: &[u8]) -> AttResult<Self> {
        if data.len() < 3 || data[0] != Self::opcode() {
            return Err(AttError::InvalidPdu);
        }
        let mut cursor = Cursor::new(&data[1..3]);
        let client_mtu = cursor
            .read_u16::<LittleEndian>()
            .map_err(|_| AttError::InvalidPdu)?;
        Ok(Self { client_mtu })
    }

    fn serialize(&self) -> Vec<u8> {
        let mut packet = Vec::with_capacity(3);
        packet.push(Self::opcode());
        packet.extend_from_slice(&self.client_mtu.to_le_bytes());
        packet
    }
}

/// Exchange MTU Response: our receive MTU.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeMtuResponse {
    pub server_mtu: u16,
}

impl AttPacket for ExchangeMtuResponse {
    fn opcode() -> u8 {
        ATT_EXCHANGE_MTU_RSP
    }

    fn parse(data: &[u8]) -> AttResult<Self> {
        if data.len() < 3 || data[0] != Self::opcode() {
            return Err(AttError::InvalidPdu);
        }
        let mut cursor = Cursor::new(&data[1..3]);
        let server_mtu = cursor
            .read_u16::<LittleEndian>()
            .map_err(|_| AttError::InvalidPdu)?;
        Ok(Self { server_mtu })
    }

    fn serialize(&self) -> Vec<u8> {
        let mut packet = Vec::with_capacity(3);
        packet.push(Self::opcode());
        packet.extend_from_slice(&self.server_mtu.to_le_bytes());
        packet
    }
}

/// Write Request: expects a Write Response or an Error Response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteRequest {
    pub handle: u16,
    pub value: Vec<u8>,
}

impl AttPacket for WriteRequest {
    fn opcode() -> u8 {
        ATT_WRITE_REQ
    }

    fn parse(data: &[u8]) -> AttResult<Self> {
        if data.len() < ATT_WRITE_HEADER_SIZE || data[0] != Self::opcode() {
            return Err(AttError::InvalidPdu);
        }
        let mut cursor = Cursor::new(&data[1..3]);
        let handle = cursor
            .read_u16::<LittleEndian>()
            .map_err(|_| AttError::InvalidPdu)?;
        Ok(Self {
            handle,
            value: data[ATT_WRITE_HEADER_SIZE..].to_vec(),
        })
    }

    fn serialize(&self) -> Vec<u8> {
        let mut packet = Vec::with_capacity(ATT_WRITE_HEADER_SIZE + self.value.len());
        packet.push(Self::opcode());
        packet.extend_from_slice(&self.handle.to_le_bytes());
        packet.extend_from_slice(&self.value);
        packet
    }
}

/// Write Response: bare acknowledgement of a Write Request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteResponse;

impl AttPacket for WriteResponse {
    fn opcode() -> u8 {
        ATT_WRITE_RSP
    }

    fn parse(data: &[u8]) -> AttResult<Self> {
        if data.len() != 1 || data[0] != Self::opcode() {
            return Err(AttError::InvalidPdu);
        }
        Ok(Self)
    }

    fn serialize(&self) -> Vec<u8> {
        vec![Self::opcode()]
    }
}

/// Write Command: fire-and-forget write, never answered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteCommand {
    pub handle: u16,
    pub value: Vec<u8>,
}

impl AttPacket for WriteCommand {
    fn opcode() -> u8 {
        ATT_WRITE_CMD
    }

    fn parse(data: &[u8]) -> AttResult<Self> {
        if data.len() < ATT_WRITE_HEADER_SIZE || data[0] != Self::opcode() {
            return Err(AttError::InvalidPdu);
        }
        let mut cursor = Cursor::new(&data[1..3]);
        let handle = cursor
            .read_u16::<LittleEndian>()
            .map_err(|_| AttError::InvalidPdu)?;
        Ok(Self {
            handle,
            value: data[ATT_WRITE_HEADER_SIZE..].to_vec(),
        })
    }

    fn serialize(&self) -> Vec<u8> {
        let mut packet = Vec::with_capacity(ATT_WRITE_HEADER_SIZE + self.value.len());
        packet.push(Self::opcode());
        packet.extend_from_slice(&self.handle.to_le_bytes());
        packet.extend_from_slice(&self.value);
        packet
    }
}
