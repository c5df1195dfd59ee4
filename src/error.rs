// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for the demand optimizer.
//!
//! Optimizers never surface device failures to their callers: a failed
//! command is logged and treated as "not applied". The types here cover the
//! places where an error is meaningful to the host: parsing values, settings
//! I/O, and gateway discovery/subscription.

use thiserror::Error;

/// The main error type for this library.
#[derive(Debug, Error)]
pub enum Error {
    /// A value could not be interpreted.
    #[error("value error: {0}")]
    Value(#[from] ValueError),

    /// Settings could not be loaded or persisted.
    #[error("settings error: {0}")]
    Settings(#[from] SettingsError),

    /// The gateway failed to answer a request.
    #[error("gateway error: {0}")]
    Gateway(#[from] GatewayError),

    /// Resubscription gave up after the configured number of attempts.
    #[error("event subscription abandoned after {attempts} attempts")]
    ResubscribeExhausted {
        /// Number of attempts made before giving up.
        attempts: u32,
    },
}

/// Errors raised while interpreting values received from the gateway or
/// read from the settings store.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValueError {
    /// Not one of the four grid states.
    #[error("invalid grid state: {0}")]
    InvalidGridState(String),

    /// Not one of the comfort levels.
    #[error("invalid comfort level: {0}")]
    InvalidComfortLevel(String),

    /// Text that should have been numeric.
    #[error("invalid number: {0}")]
    InvalidNumber(String),
}

/// Errors raised by the settings store.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// Reading or writing the backing file failed.
    #[error("settings I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// The backing file is not valid JSON, or not a JSON object.
    #[error("settings file is malformed: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors raised by a [`Gateway`](crate::gateway::Gateway) implementation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GatewayError {
    /// The gateway could not be reached.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// The gateway answered with something unusable.
    #[error("request failed: {0}")]
    RequestFailed(String),

    /// The event stream ended or could not be opened.
    #[error("event subscription closed")]
    SubscriptionClosed,
}

/// A specialized Result type for this library.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_error_display() {
        let err = ValueError::InvalidGridState("7".to_string());
        assert_eq!(err.to_string(), "invalid grid state: 7");
    }

    #[test]
    fn error_from_gateway_error() {
        let err: Error = GatewayError::SubscriptionClosed.into();
        assert!(matches!(
            err,
            Error::Gateway(GatewayError::SubscriptionClosed)
        ));
    }

    #[test]
    fn settings_error_wraps_json() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: Error = SettingsError::from(json_err).into();
        assert!(err.to_string().starts_with("settings error: settings file is malformed"));
    }

    #[test]
    fn exhausted_display() {
        let err = Error::ResubscribeExhausted { attempts: 3 };
        assert_eq!(
            err.to_string(),
            "event subscription abandoned after 3 attempts"
        );
    }
}
