//! ATT layer: PDU codecs and the request dispatcher for the peripheral
//! role.

pub mod constants;
pub mod dispatcher;
pub mod error;
pub mod pdu;


pub use constants::{ATT_DEFAULT_MTU, ATT_MAX_MTU};
pub use dispatcher::Dispatcher;
pub use error::{AttError, AttErrorCode, AttResult};
pub use pdu::{
    AttPacket, ErrorResponse, ExchangeMtuRequest, ExchangeMtuResponse, WriteCommand, WriteRequest,
    WriteResponse,
};
