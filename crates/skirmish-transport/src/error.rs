/// Errors that can occur in the transport layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Sending data failed.
    #[error("send failed: {0}")]
    SendFailed(#[source] std::io::Error),

    /// Receiving data failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(#[source] std::io::Error),

    /// Binding the listener failed.
    #[error("bind failed: {0}")]
    Bind(#[source] std::io::Error),

    /// The HTTP server stopped with an I/O error.
    #[error("serve failed: {0}")]
    Serve(#[source] std::io::Error),

    /// A configured route path cannot be served.
    #[error("invalid route path {0:?}")]
    InvalidRoute(String),

    /// A read or write exceeded its deadline.
    #[error("{0} timed out")]
    TimedOut(&'static str),
}
