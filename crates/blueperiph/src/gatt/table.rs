//! The GATT service table.
//!
//! Registered once at startup, read-only for the rest of the process
//! lifetime. Attribute handles follow the standard GATT layout: a service
//! declaration handle, then a declaration handle and a value handle per
//! characteristic, assigned sequentially from 0x0001 in declaration order.
//! Handles are never reassigned or reused, so handle caches held by peers
//! stay valid.

use std::collections::BTreeMap;
use std::sync::Arc;

use thiserror::Error;

use super::types::{
    CharacteristicProps, ServiceDescriptor, WriteHandler, WriteOutcome, WriteRequestEvent,
};
use crate::uuid::Uuid;

/// First handle assigned in a fresh table.
pub const HANDLE_BASE: u16 = 0x0001;

/// Errors from service registration.
#[derive(Error, Debug)]
pub enum GattError {
    #[error("service {0} has no characteristics")]
    EmptyService(Uuid),

    #[error("characteristic {0} is writable but has no write handler")]
    MissingWriteHandler(Uuid),

    #[error("characteristic {0} declared more than once")]
    DuplicateUuid(Uuid),
}

/// A characteristic after registration, with its assigned handles.
pub struct RegisteredCharacteristic {
    uuid: Uuid,
    props: CharacteristicProps,
    declaration_handle: u16,
    value_handle: u16,
    handler: Option<Arc<dyn WriteHandler>>,
}

impl RegisteredCharacteristic {
    pub fn uuid(&self) -> &Uuid {
        &self.uuid
    }

    pub fn props(&self) -> CharacteristicProps {
        self.props
    }

    pub fn declaration_handle(&self) -> u16 {
        self.declaration_handle
    }

    pub fn value_handle(&self) -> u16 {
        self.value_handle
    }

    /// Invokes the write handler. Returns `None` when no handler is
    /// registered (unreachable for writable characteristics; registration
    /// enforces the pairing).
    pub fn invoke_handler(&self, event: &WriteRequestEvent) -> Option<WriteOutcome> {
        self.handler.as_ref().map(|h| h.handle_write(event))
    }
}

impl std::fmt::Debug for RegisteredCharacteristic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredCharacteristic")
            .field("uuid", &self.uuid)
            .field("props", &self.props)
            .field("declaration_handle", &self.declaration_handle)
            .field("value_handle", &self.value_handle)
            .finish()
    }
}

/// The attribute-handle table for the single registered service.
pub struct ServiceTable {
    service_uuid: Uuid,
    service_handle: u16,
    end_handle: u16,
    characteristics: Vec<RegisteredCharacteristic>,
    by_value_handle: BTreeMap<u16, usize>,
}

impl ServiceTable {
    /// Registers the service and assigns handles. Consumes the descriptor;
    /// the table is immutable from here on.
    pub fn register(service: ServiceDescriptor) -> Result<Self, GattError> {
        if service.characteristics.is_empty() {
            return Err(GattError::EmptyService(service.uuid));
        }

        let mut next_handle = HANDLE_BASE;
        let service_handle = next_handle;
        next_handle += 1;

        let mut characteristics = Vec::with_capacity(service.characteristics.len());
        let mut by_value_handle = BTreeMap::new();

        for descriptor in service.characteristics {
            if descriptor.props.writable() && descriptor.handler.is_none() {
                return Err(GattError::MissingWriteHandler(descriptor.uuid));
            }
            if characteristics
                .iter()
                .any(|c: &RegisteredCharacteristic| c.uuid == descriptor.uuid)
            {
                return Err(GattError::DuplicateUuid(descriptor.uuid));
            }

            let declaration_handle = next_handle;
            let value_handle = next_handle + 1;
            next_handle += 2;

            by_value_handle.insert(value_handle, characteristics.len());
            characteristics.push(RegisteredCharacteristic {
                uuid: descriptor.uuid,
                props: descriptor.props,
                declaration_handle,
                value_handle,
                handler: descriptor.handler,
            });
        }

        Ok(Self {
            service_uuid: service.uuid,
            service_handle,
            end_handle: next_handle - 1,
            characteristics,
            by_value_handle,
        })
    }

    pub fn service_uuid(&self) -> &Uuid {
        &self.service_uuid
    }

    /// Handle of the service declaration attribute.
    pub fn service_handle(&self) -> u16 {
        self.service_handle
    }

    /// The inclusive handle range the service occupies.
    pub fn handle_range(&self) -> (u16, u16) {
        (self.service_handle, self.end_handle)
    }

    /// Looks up a characteristic by its value handle.
    pub fn characteristic_by_handle(&self, handle: u16) -> Option<&RegisteredCharacteristic> {
        self.by_value_handle
            .get(&handle)
            .map(|&index| &self.characteristics[index])
    }

    /// Looks up a characteristic by UUID.
    pub fn characteristic_by_uuid(&self, uuid: &Uuid) -> Option<&RegisteredCharacteristic> {
        self.characteristics.iter().find(|c| c.uuid == *uuid)
    }

    /// Characteristics in declaration order.
    pub fn characteristics(&self) -> &[RegisteredCharacteristic] {
        &self.characteristics
    }
}
