//! Pluggable consensus sealing.

use crate::core::block::Header;
use crate::crypto::key_pair::{PrivateKey, PublicKey};
use crate::types::address::Address;
use crate::types::encoding::{Decode, Encode};
use crate::types::signature::SerializableSignature;
use crate::utils::log::Logger;
use chainsync_derive::Error;
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread;
use std::time::Duration;

/// Reasons an engine rejects a request.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EngineError {
    #[error("unrecognized engine option `{0}`")]
    UnknownOption(String),
    #[error("invalid value for engine option `{0}`")]
    InvalidValue(String),
    #[error("engine options can only change while the engine is idle")]
    Busy,
}

/// Waiting on a seal handle gave up.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SealWaitError {
    #[error("timed out waiting for seal generation")]
    Timeout,
}

/// Single-slot notification cell: a value guarded by a mutex plus a condition
/// variable. A reader blocks until the slot no longer holds a given sentinel,
/// then consumes the value; a writer overwrites the slot and wakes waiters.
pub struct Notified<T> {
    slot: Mutex<T>,
    changed: Condvar,
}

impl<T: Clone + PartialEq> Notified<T> {
    pub fn new(value: T) -> Self {
        Self {
            slot: Mutex::new(value),
            changed: Condvar::new(),
        }
    }

    /// Overwrites the slot and wakes every waiter.
    pub fn set(&self, value: T) {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        *slot = value;
        self.changed.notify_all();
    }

    /// Blocks until the slot differs from `sentinel`, then returns the value,
    /// resetting the slot back to the sentinel.
    pub fn wait_not(&self, sentinel: T) -> T {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        while *slot == sentinel {
            slot = self
                .changed
                .wait(slot)
                .unwrap_or_else(PoisonError::into_inner);
        }
        std::mem::replace(&mut *slot, sentinel)
    }

    /// Bounded variant of [`wait_not`](Self::wait_not).
    pub fn wait_not_timeout(&self, sentinel: T, timeout: Duration) -> Result<T, SealWaitError> {
        let slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        let (mut slot, result) = self
            .changed
            .wait_timeout_while(slot, timeout, |value| *value == sentinel)
            .unwrap_or_else(PoisonError::into_inner);
        if result.timed_out() && *slot == sentinel {
            return Err(SealWaitError::Timeout);
        }
        Ok(std::mem::replace(&mut *slot, sentinel))
    }
}

/// Engine lifecycle. Options may only change while `Idle`; `generate_seal`
/// moves to `Sealing`, delivery to `SealDelivered`, and the handle's
/// consuming read back to `Idle`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EngineState {
    Idle,
    Sealing,
    SealDelivered,
}

/// Handle returned by [`SealEngine::generate_seal`].
///
/// Resolves exactly once with the produced seal bytes. Cloneable; every
/// clone observes the same delivery, but only one waiter consumes it.
#[derive(Clone)]
pub struct SealHandle {
    slot: Arc<Notified<Option<Vec<u8>>>>,
    engine_state: Arc<Mutex<EngineState>>,
}

impl SealHandle {
    fn new(engine_state: Arc<Mutex<EngineState>>) -> Self {
        Self {
            slot: Arc::new(Notified::new(None)),
            engine_state,
        }
    }

    fn deliver(&self, seal: Vec<u8>) {
        self.set_state(EngineState::SealDelivered);
        self.slot.set(Some(seal));
    }

    fn set_state(&self, state: EngineState) {
        *self
            .engine_state
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = state;
    }

    /// Blocks until the seal is produced.
    pub fn wait(&self) -> Vec<u8> {
        let seal = self.slot.wait_not(None).unwrap_or_default();
        self.set_state(EngineState::Idle);
        seal
    }

    /// Blocks until the seal is produced or the timeout elapses. The engine
    /// stays busy on timeout; a later wait can still consume the seal.
    pub fn wait_timeout(&self, timeout: Duration) -> Result<Vec<u8>, SealWaitError> {
        let seal = self.slot.wait_not_timeout(None, timeout)?.unwrap_or_default();
        self.set_state(EngineState::Idle);
        Ok(seal)
    }
}

/// Consensus sealing interface.
///
/// Chains hold engines behind `Arc<dyn SealEngine>`, so blocks produced by
/// any engine flow through the same import pipeline.
pub trait SealEngine: Send + Sync {
    /// Engine family name, for logs.
    fn name(&self) -> &'static str;

    /// Sets an engine option from raw encoded bytes. Only valid while the
    /// engine is idle.
    fn set_option(&self, key: &str, value: &[u8]) -> Result<(), EngineError>;

    /// Starts asynchronous seal production for `header` and returns
    /// immediately. The produced seal bytes resolve the handle exactly once.
    fn generate_seal(&self, header: &Header) -> SealHandle;

    /// Checks the seal carried by `header`.
    fn verify_seal(&self, header: &Header) -> bool;
}

/// Proof-of-authority engine.
///
/// The seal is the signer's public key plus a Schnorr signature over the
/// header's bare hash. Verification accepts any signer in the configured
/// authority set.
pub struct AuthorityEngine {
    signer: Mutex<Option<PrivateKey>>,
    authorities: Mutex<Vec<Address>>,
    state: Arc<Mutex<EngineState>>,
    log: Logger,
}

impl AuthorityEngine {
    /// Option key carrying the 32-byte signing key.
    pub const OPT_AUTHORITY: &'static str = "authority";
    /// Option key carrying the encoded list of accepted authority addresses.
    pub const OPT_AUTHORITIES: &'static str = "authorities";

    pub fn new(log: Logger) -> Self {
        Self {
            signer: Mutex::new(None),
            authorities: Mutex::new(Vec::new()),
            state: Arc::new(Mutex::new(EngineState::Idle)),
            log,
        }
    }

    pub fn state(&self) -> EngineState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn decode_seal(seal: &[u8]) -> Option<(PublicKey, SerializableSignature)> {
        <(PublicKey, SerializableSignature)>::from_bytes(seal).ok()
    }
}

impl SealEngine for AuthorityEngine {
    fn name(&self) -> &'static str {
        "authority"
    }

    fn set_option(&self, key: &str, value: &[u8]) -> Result<(), EngineError> {
        if self.state() != EngineState::Idle {
            return Err(EngineError::Busy);
        }
        match key {
            Self::OPT_AUTHORITY => {
                let bytes: [u8; 32] = value
                    .try_into()
                    .map_err(|_| EngineError::InvalidValue(key.to_string()))?;
                let signer = PrivateKey::from_bytes(&bytes)
                    .ok_or_else(|| EngineError::InvalidValue(key.to_string()))?;
                *self.signer.lock().unwrap_or_else(PoisonError::into_inner) = Some(signer);
                Ok(())
            }
            Self::OPT_AUTHORITIES => {
                let list = Vec::<Address>::from_bytes(value)
                    .map_err(|_| EngineError::InvalidValue(key.to_string()))?;
                *self
                    .authorities
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner) = list;
                Ok(())
            }
            _ => Err(EngineError::UnknownOption(key.to_string())),
        }
    }

    fn generate_seal(&self, header: &Header) -> SealHandle {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = EngineState::Sealing;

        let handle = SealHandle::new(Arc::clone(&self.state));
        let delivery = handle.clone();
        let signer = self
            .signer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        let bare_hash = header.bare_hash();
        let log = self.log.clone();

        thread::spawn(move || {
            let Some(signer) = signer else {
                log.warn("seal requested with no authority key configured");
                delivery.deliver(Vec::new());
                return;
            };
            let signature = signer.sign(bare_hash.as_slice());
            let seal = (signer.public_key(), signature).to_bytes();
            log.info(&format!("sealed header {bare_hash}"));
            delivery.deliver(seal);
        });

        handle
    }

    fn verify_seal(&self, header: &Header) -> bool {
        let Some((public, signature)) = Self::decode_seal(&header.seal) else {
            return false;
        };
        let authorized = self
            .authorities
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&public.address);
        authorized && public.verify(header.bare_hash().as_slice(), signature)
    }
}
