//! Descriptor types and the write handler contract.

use std::sync::Arc;

use bitflags::bitflags;

use crate::uuid::Uuid;

/// Hard ceiling on a characteristic value, per the ATT specification.
pub const ATT_VALUE_MAX: usize = 512;

bitflags! {
    /// Characteristic property bits, wire-encoded in the characteristic
    /// declaration.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct CharacteristicProps: u8 {
        const BROADCAST = 0x01;
        const READ = 0x02;
        const WRITE_WITHOUT_RESPONSE = 0x04;
        const WRITE = 0x08;
        const NOTIFY = 0x10;
        const INDICATE = 0x20;
    }
}

impl CharacteristicProps {
    pub fn can_write(&self) -> bool {
        self.contains(Self::WRITE)
    }

    pub fn can_write_without_response(&self) -> bool {
        self.contains(Self::WRITE_WITHOUT_RESPONSE)
    }

    /// True if either write path is allowed.
    pub fn writable(&self) -> bool {
        self.intersects(Self::WRITE | Self::WRITE_WITHOUT_RESPONSE)
    }
}

/// Outcome of a characteristic write handler invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The write was accepted.
    Success,
    /// The application rejected the write. The code is encoded into the ATT
    /// application error range (0x80..=0x9F); out-of-range codes are clamped
    /// at encode time.
    ApplicationError(u8),
}

/// A validated inbound write, constructed per PDU and handed to the
/// handler. Transient; never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteRequestEvent {
    /// Value handle of the target characteristic.
    pub handle: u16,
    /// The written bytes (0..=512).
    pub payload: Vec<u8>,
    /// Write offset. Always 0 here; prepared writes are not served.
    pub offset: u16,
    /// False for Write Commands (write without response).
    pub expects_response: bool,
}

/// Application-supplied write handler.
///
/// Invoked at most once per [`WriteRequestEvent`], synchronously from the
/// PDU-processing path. Handlers must return promptly; long-running work
/// belongs on a background task with the outcome reported as `Success`
/// (accepted for processing) up front.
pub trait WriteHandler: Send + Sync {
    fn handle_write(&self, event: &WriteRequestEvent) -> WriteOutcome;
}

impl<F> WriteHandler for F
where
    F: Fn(&WriteRequestEvent) -> WriteOutcome + Send + Sync,
{
    fn handle_write(&self, event: &WriteRequestEvent) -> WriteOutcome {
        self(event)
    }
}

/// A characteristic to be registered in the service table.
#[derive(Clone)]
pub struct CharacteristicDescriptor {
    pub uuid: Uuid,
    pub props: CharacteristicProps,
    /// Required whenever `props` allows any write path.
    pub handler: Option<Arc<dyn WriteHandler>>,
}

impl CharacteristicDescriptor {
    /// A write-only characteristic with the given handler, matching the
    /// common "command inbox" shape.
    pub fn writable(uuid: Uuid, handler: impl WriteHandler + 'static) -> Self {
        Self {
            uuid,
            props: CharacteristicProps::WRITE,
            handler: Some(Arc::new(handler)),
        }
    }

    /// A characteristic with explicit properties and no handler. Writable
    /// properties demand a handler before registration; see
    /// [`with_handler`](Self::with_handler).
    pub fn new(uuid: Uuid, props: CharacteristicProps) -> Self {
        Self {
            uuid,
            props,
            handler: None,
        }
    }

    pub fn with_handler(mut self, handler: impl WriteHandler + 'static) -> Self {
        self.handler = Some(Arc::new(handler));
        self
    }
}

impl std::fmt::Debug for CharacteristicDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CharacteristicDescriptor")
            .field("uuid", &self.uuid)
            .field("props", &self.props)
            .field("handler", &self.handler.is_some())
            .finish()
    }
}

/// A service to be registered: one UUID plus its characteristics in
/// declaration order. Immutable after registration.
#[derive(Debug, Clone)]
pub struct ServiceDescriptor {
    pub uuid: Uuid,
    pub characteristics: Vec<CharacteristicDescriptor>,
}

impl ServiceDescriptor {
    pub fn new(uuid: Uuid) -> Self {
        Self {
            uuid,
            characteristics: Vec::new(),
        }
    }

    pub fn characteristic(mut self, characteristic: CharacteristicDescriptor) -> Self {
        self.characteristics.push(characteristic);
        self
    }
}
