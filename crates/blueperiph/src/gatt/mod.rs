//! GATT layer: the read-only service table exposed to peers and the write
//! handler contract the application supplies.

pub mod table;
pub mod types;


pub use table::{GattError, RegisteredCharacteristic, ServiceTable};
pub use types::{
    CharacteristicDescriptor, CharacteristicProps, ServiceDescriptor, WriteHandler, WriteOutcome,
    WriteRequestEvent,
};
