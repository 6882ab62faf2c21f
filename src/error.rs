use std::backtrace::Backtrace;
use std::error::Error as StdError;
use std::fmt;

#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    /// A session is already running on this client
    AlreadyStarted,
    /// Opening the websocket for a pair failed, the whole dial pass was rolled back
    Dial,
    /// Sending a keepalive ping on a pair's websocket failed
    Write,
    /// Reading or decoding a message from a pair's websocket failed
    Read,
    /// Error related to invalid configuration
    Validation,
    /// Internal error from dependencies or the task runtime
    Internal,
}

#[derive(Debug)]
pub struct Error {
    kind: Kind,
    pair: Option<String>,
    source: Option<Box<dyn StdError + Send + Sync + 'static>>,
    backtrace: Backtrace,
}

impl Error {
    pub fn with_source<S: StdError + Send + Sync + 'static>(kind: Kind, source: S) -> Self {
        Self {
            kind,
            pair: None,
            source: Some(Box::new(source)),
            backtrace: Backtrace::capture(),
        }
    }

    /// An error attributed to the feed for `pair`.
    pub fn for_pair<P, S>(kind: Kind, pair: P, source: S) -> Self
    where
        P: Into<String>,
        S: StdError + Send + Sync + 'static,
    {
        Self {
            pair: Some(pair.into()),
            ..Self::with_source(kind, source)
        }
    }

    #[must_use]
    pub fn already_started() -> Self {
        Self {
            kind: Kind::AlreadyStarted,
            pair: None,
            source: None,
            backtrace: Backtrace::capture(),
        }
    }

    pub fn validation<S: Into<String>>(message: S) -> Self {
        Validation {
            reason: message.into(),
        }
        .into()
    }

    pub fn kind(&self) -> Kind {
        self.kind
    }

    /// The pair whose connection produced this error, if any.
    pub fn pair(&self) -> Option<&str> {
        self.pair.as_deref()
    }

    pub fn backtrace(&self) -> &Backtrace {
        &self.backtrace
    }

    pub fn inner(&self) -> Option<&(dyn StdError + Send + Sync + 'static)> {
        self.source.as_deref()
    }

    pub fn downcast_ref<E: StdError + 'static>(&self) -> Option<&E> {
        let e = self.source.as_deref()?;
        e.downcast_ref::<E>()
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            Kind::AlreadyStarted => write!(f, "already started")?,
            kind => write!(f, "{kind:?}")?,
        }
        if let Some(pair) = &self.pair {
            write!(f, " (pair: {pair})")?;
        }
        if let Some(src) = &self.source {
            write!(f, ": {src}")?;
        }
        Ok(())
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn StdError + 'static))
    }
}

#[non_exhaustive]
#[derive(Debug)]
pub struct Validation {
    pub reason: String,
}

impl fmt::Display for Validation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid: {}", self.reason)
    }
}

impl StdError for Validation {}

/// A worker task ended without producing a result.
#[non_exhaustive]
#[derive(Debug)]
pub struct TaskFailed {
    pub reason: String,
}

impl fmt::Display for TaskFailed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "worker task failed: {}", self.reason)
    }
}

impl StdError for TaskFailed {}

impl From<Validation> for Error {
    fn from(err: Validation) -> Self {
        Error::with_source(Kind::Validation, err)
    }
}

impl From<TaskFailed> for Error {
    fn from(err: TaskFailed) -> Self {
        Error::with_source(Kind::Internal, err)
    }
}

impl From<tokio::task::JoinError> for Error {
    fn from(e: tokio::task::JoinError) -> Self {
        TaskFailed {
            reason: e.to_string(),
        }
        .into()
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::with_source(Kind::Internal, e)
    }
}

impl From<url::ParseError> for Error {
    fn from(e: url::ParseError) -> Self {
        Error::with_source(Kind::Validation, e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn already_started_display_should_succeed() {
        let error = Error::already_started();

        assert_eq!(error.kind(), Kind::AlreadyStarted);
        assert_eq!(error.to_string(), "already started");
        assert!(error.pair().is_none());
    }

    #[test]
    fn pair_tag_is_part_of_display() {
        let error = Error::for_pair(
            Kind::Read,
            "btc_jpy",
            Validation {
                reason: "bad frame".to_owned(),
            },
        );

        assert_eq!(error.kind(), Kind::Read);
        assert_eq!(error.pair(), Some("btc_jpy"));
        assert_eq!(error.to_string(), "Read (pair: btc_jpy): invalid: bad frame");
    }

    #[test]
    fn validation_into_error_should_succeed() {
        let error = Error::validation("endpoint must use ws or wss");

        assert_eq!(error.kind(), Kind::Validation);
        assert!(error.downcast_ref::<Validation>().is_some());
        assert!(error.to_string().contains("ws or wss"));
    }
}
