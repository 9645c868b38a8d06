// src/error.rs
//! Error handling for the native resource layer.
//!
//! - Lifecycle faults (`InvalidState`, `IdentityMismatch`, `NotRegistered`) mean an
//!   invariant was broken somewhere in the engine and are never swallowed.
//! - Caller faults (`TypeMismatch`, `NullValue`) are returned synchronously and leave
//!   no engine-wide state behind.
//! - Context chaining and `is_*` helpers work with `?` everywhere.

use thiserror::Error;

use crate::native::{DeviceId, NativeUid};
use crate::shader::VarType;

/// Main error type. Send + Sync + 'static.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// Registering a handle with no device id, registering it twice, or
    /// assigning a device id over a live one.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// Tracking entry and the object it points at disagree about the device id.
    #[error("identity mismatch for tracked object {uid}: registry holds {expected}, object reports {found}")]
    IdentityMismatch {
        uid: NativeUid,
        expected: DeviceId,
        found: DeviceId,
    },

    /// Deletion requested for an object this tracker never registered.
    #[error("native object {0} is not registered with this tracker")]
    NotRegistered(NativeUid),

    /// A uniform was written with a different type than it already holds.
    #[error("uniform '{name}': expected a {expected:?} value, got {found:?}")]
    TypeMismatch {
        name: String,
        expected: VarType,
        found: VarType,
    },

    /// A uniform was written with no value.
    #[error("uniform '{0}': value cannot be null")]
    NullValue(String),

    /// The value type has no serialized encoding.
    #[error("unsupported conversion for {0:?}")]
    UnsupportedConversion(VarType),

    /// A shader stage failed to compile on the device.
    #[error("compile error in '{name}': {log}")]
    Compile { name: String, log: String },

    /// A program failed to link on the device.
    #[error("program failed to link: {log}")]
    Link { log: String },

    /// Faults isolated during a reconciliation pass. The pass still processed
    /// every other entry.
    #[error("{} lifecycle fault(s) during reconciliation", .0.len())]
    Reconciliation(Vec<Error>),

    /// Configuration or snapshot parsing.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O while loading configuration.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Simple custom message.
    #[error("{0}")]
    Custom(String),

    /// Context chaining.
    #[error("{message}: {source}")]
    WithContext {
        message: String,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    #[inline]
    pub fn custom<S: Into<String>>(msg: S) -> Self {
        Self::Custom(msg.into())
    }

    #[inline]
    pub fn invalid_state<S: Into<String>>(msg: S) -> Self {
        Self::InvalidState(msg.into())
    }

    /// Add context to any error (chainable, like `.context()` in anyhow).
    #[inline]
    pub fn context<C: Into<String>>(self, context: C) -> Self {
        Self::WithContext {
            message: context.into(),
            source: Box::new(self),
        }
    }

    /// Strips `WithContext` layers.
    pub fn root(&self) -> &Error {
        match self {
            Error::WithContext { source, .. } => source.root(),
            other => other,
        }
    }

    // === Kind checks ===
    #[inline]
    pub fn is_lifecycle_fault(&self) -> bool {
        matches!(
            self.root(),
            Error::InvalidState(_) | Error::IdentityMismatch { .. } | Error::NotRegistered(_)
        )
    }

    #[inline]
    pub fn is_type_mismatch(&self) -> bool {
        matches!(self.root(), Error::TypeMismatch { .. })
    }

    #[inline]
    pub fn is_null_value(&self) -> bool {
        matches!(self.root(), Error::NullValue(_))
    }

    #[inline]
    pub fn is_device_failure(&self) -> bool {
        matches!(self.root(), Error::Compile { .. } | Error::Link { .. })
    }

    /// Individual faults carried by a `Reconciliation` error.
    pub fn faults(&self) -> &[Error] {
        match self.root() {
            Error::Reconciliation(faults) => faults,
            _ => &[],
        }
    }
}

/// Attach context to a `Result` without mapping by hand.
pub trait ResultExt<T> {
    fn context<C: Into<String>>(self, context: C) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    #[inline]
    fn context<C: Into<String>>(self, context: C) -> Result<T> {
        self.map_err(|e| e.context(context))
    }
}

/// Convenient `Result` alias: use `crate::Result<T>` everywhere.
pub type Result<T> = std::result::Result<T, Error>;
