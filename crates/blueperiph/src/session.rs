//! Connection session management.
//!
//! A peripheral in this design serves one central at a time: the manager
//! owns at most one [`ConnectionSession`], and a second inbound connection
//! while one is open is rejected with [`SessionError::Busy`] so the host
//! can decline the link at the radio level. The existing session is never
//! silently overwritten.

use log::debug;
use thiserror::Error;

use crate::att::constants::{ATT_DEFAULT_MTU, ATT_MAX_MTU};
use crate::gap::BdAddr;
use crate::transport::ConnectionId;

/// Session lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Link is up, MTU not yet negotiated.
    Connecting,
    /// MTU negotiated, steady state.
    Active,
    /// Teardown in progress.
    Closing,
    /// Torn down; the slot has been released.
    Closed,
}

/// Errors from session lifecycle operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("connection 0x{conn:04x} rejected: session with {peer} already open")]
    Busy { conn: ConnectionId, peer: BdAddr },

    #[error("no session for connection 0x{0:04x}")]
    NotFound(ConnectionId),
}

/// State for the single active peer connection.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionSession {
    conn: ConnectionId,
    peer: BdAddr,
    mtu: u16,
    state: SessionState,
}

impl ConnectionSession {
    fn new(conn: ConnectionId, peer: BdAddr) -> Self {
        Self {
            conn,
            peer,
            mtu: ATT_DEFAULT_MTU,
            state: SessionState::Connecting,
        }
    }

    pub fn conn(&self) -> ConnectionId {
        self.conn
    }

    pub fn peer(&self) -> BdAddr {
        self.peer
    }

    /// The negotiated MTU; [`ATT_DEFAULT_MTU`] until an exchange happens.
    pub fn mtu(&self) -> u16 {
        self.mtu
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// True while the session can carry PDUs.
    pub fn is_open(&self) -> bool {
        matches!(self.state, SessionState::Connecting | SessionState::Active)
    }

    /// Applies the MTU min rule and activates the session. Proposals below
    /// the BLE floor of 23 are clamped up, per the ATT specification.
    pub fn negotiate_mtu(&mut self, proposed: u16, local_max: u16) -> u16 {
        let local_max = local_max.clamp(ATT_DEFAULT_MTU, ATT_MAX_MTU);
        self.mtu = proposed.min(local_max).max(ATT_DEFAULT_MTU);
        if self.state == SessionState::Connecting {
            self.state = SessionState::Active;
        }
        self.mtu
    }

    fn close(&mut self) {
        self.state = SessionState::Closing;
        debug!("session with {} state {:?}", self.peer, self.state);
        self.state = SessionState::Closed;
    }
}

/// Owner of the single session slot.
#[derive(Debug, Default)]
pub struct SessionManager {
    current: Option<ConnectionSession>,
}

impl SessionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a session for an inbound connection. Fails with `Busy` while
    /// another session is open; the caller declines the new link and the
    /// existing session is left untouched.
    pub fn open(
        &mut self,
        conn: ConnectionId,
        peer: BdAddr,
    ) -> Result<&ConnectionSession, SessionError> {
        if let Some(existing) = &self.current {
            if existing.is_open() {
                return Err(SessionError::Busy {
                    conn,
                    peer: existing.peer,
                });
            }
        }
        Ok(self.current.insert(ConnectionSession::new(conn, peer)))
    }

    /// Closes the session for `conn`, releasing the slot. Returns the
    /// closed session for logging.
    pub fn close(&mut self, conn: ConnectionId) -> Result<ConnectionSession, SessionError> {
        match self.current.take() {
            Some(mut session) if session.conn == conn => {
                session.close();
                Ok(session)
            }
            other => {
                self.current = other;
                Err(SessionError::NotFound(conn))
            }
        }
    }

    /// Closes whatever session exists, if any. Used on power-off.
    pub fn close_current(&mut self) -> Option<ConnectionSession> {
        self.current.take().map(|mut session| {
            session.close();
            session
        })
    }

    /// The open session for `conn`, if it exists.
    pub fn get_mut(&mut self, conn: ConnectionId) -> Option<&mut ConnectionSession> {
        self.current
            .as_mut()
            .filter(|s| s.conn == conn && s.is_open())
    }

    pub fn active(&self) -> Option<&ConnectionSession> {
        self.current.as_ref().filter(|s| s.is_open())
    }
}
