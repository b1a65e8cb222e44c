//! Translation of dispatch failures into HTTP statuses.

use std::collections::HashMap;

use axum::http::StatusCode;

use crate::error::{DispatchError, DispatchErrorKind};

/// Result of classifying a dispatch failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Translation {
    /// Answer with this status and no body.
    Status(StatusCode),
    /// Fail the request with the original error.
    Propagate,
}

/// Table from failure kind to status.
///
/// `Unprocessed` wrappers are looked through, so a refused connection that never
/// carried the request classifies the same as a bare one.
#[derive(Debug, Clone)]
pub struct ExceptionTranslator {
    table: HashMap<DispatchErrorKind, StatusCode>,
}

impl ExceptionTranslator {
    /// Translator with no entries; every failure propagates.
    pub fn empty() -> Self {
        Self {
            table: HashMap::new(),
        }
    }

    /// Add or replace the status for `kind`.
    pub fn with(mut self, kind: DispatchErrorKind, status: StatusCode) -> Self {
        self.table.insert(kind, status);
        self
    }

    pub fn translate(&self, err: &DispatchError) -> Translation {
        match err {
            DispatchError::Unprocessed(cause) => self.translate(cause),
            other => self
                .table
                .get(&other.kind())
                .map_or(Translation::Propagate, |status| Translation::Status(*status)),
        }
    }
}

impl Default for ExceptionTranslator {
    fn default() -> Self {
        Self::empty()
            .with(DispatchErrorKind::UnknownHost, StatusCode::BAD_GATEWAY)
            .with(DispatchErrorKind::ConnectionRefused, StatusCode::SERVICE_UNAVAILABLE)
            .with(DispatchErrorKind::NoHealthyEndpoint, StatusCode::SERVICE_UNAVAILABLE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn refused() -> DispatchError {
        DispatchError::ConnectionRefused {
            authority: "127.0.0.1:1".into(),
        }
    }

    fn unknown_host() -> DispatchError {
        DispatchError::UnknownHost {
            host: "nowhere.invalid".into(),
            source: None,
        }
    }

    #[test]
    fn test_default_table() {
        let translator = ExceptionTranslator::default();
        assert_eq!(
            translator.translate(&refused()),
            Translation::Status(StatusCode::SERVICE_UNAVAILABLE)
        );
        assert_eq!(
            translator.translate(&unknown_host()),
            Translation::Status(StatusCode::BAD_GATEWAY)
        );
        assert_eq!(
            translator.translate(&DispatchError::NoHealthyEndpoint),
            Translation::Status(StatusCode::SERVICE_UNAVAILABLE)
        );
        assert_eq!(
            translator.translate(&DispatchError::Timeout(Duration::from_secs(1))),
            Translation::Propagate
        );
        assert_eq!(
            translator.translate(&DispatchError::Transport("reset".into())),
            Translation::Propagate
        );
    }

    #[test]
    fn test_unprocessed_is_unwrapped() {
        let translator = ExceptionTranslator::default();
        let wrapped = DispatchError::unprocessed(DispatchError::unprocessed(unknown_host()));
        assert_eq!(
            translator.translate(&wrapped),
            Translation::Status(StatusCode::BAD_GATEWAY)
        );
        let wrapped = DispatchError::unprocessed(DispatchError::Transport("tls".into()));
        assert_eq!(translator.translate(&wrapped), Translation::Propagate);
    }

    #[test]
    fn test_extension() {
        let translator = ExceptionTranslator::default()
            .with(DispatchErrorKind::Timeout, StatusCode::GATEWAY_TIMEOUT)
            .with(DispatchErrorKind::ConnectionRefused, StatusCode::BAD_GATEWAY);
        assert_eq!(
            translator.translate(&DispatchError::Timeout(Duration::from_millis(10))),
            Translation::Status(StatusCode::GATEWAY_TIMEOUT)
        );
        assert_eq!(
            translator.translate(&refused()),
            Translation::Status(StatusCode::BAD_GATEWAY)
        );
        assert_eq!(
            ExceptionTranslator::empty().translate(&refused()),
            Translation::Propagate
        );
    }
}
