use crate::adapter::{signal::SignalError, AdapterError, ResetConfigError};
use crate::transport::{swd::SwdError, TransportError};

/// The crate-level error type.
#[derive(Debug, thiserror::Error, docsplay::Display)]
pub enum Error {
    /// An error with the debug adapter occurred.
    Adapter(#[from] AdapterError),

    /// An error with the transport occurred.
    Transport(#[from] TransportError),

    /// An error on the SWD transport occurred.
    Swd(#[from] SwdError),

    /// The reset configuration was rejected.
    ResetConfig(#[from] ResetConfigError),

    /// An error with an adapter signal occurred.
    Signal(#[from] SignalError),

    /// No debug adapter has been selected, use the 'interface' command first.
    NoAdapter,

    /// The debug adapter driver '{0}' was not found.
    UnknownDriver(String),
}

impl Error {
    /// The messages of this error and all of its sources, outermost first.
    pub fn chain(&self) -> Vec<String> {
        let mut messages = vec![self.to_string()];
        let mut source = std::error::Error::source(self);
        while let Some(error) = source {
            messages.push(error.to_string());
            source = error.source();
        }
        messages
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn chain_lists_sources() {
        let error = Error::from(TransportError::from(SwdError::FaultResponse));

        assert_eq!(
            error.chain(),
            vec![
                "An error with the transport occurred.".to_string(),
                "SWD transport error.".to_string(),
                "Target device responded with a FAULT response to the request.".to_string(),
            ]
        );
    }
}
