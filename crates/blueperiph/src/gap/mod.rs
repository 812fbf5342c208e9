//! GAP layer: device addressing, advertising payloads and the advertising
//! state machine.

pub mod advertiser;
pub mod payload;
pub mod types;

pub use advertiser::{Advertiser, AdvertisingError};
pub use payload::AdvertisingData;
pub use types::{AdvertisingState, BdAddr};
