use std::fmt;

/// Errors raised while invoking a paid tool.
///
/// User decisions (declining a call, cancelling a payment) are *not* errors —
/// they resolve as [`crate::HandshakeOutcome`] variants.
#[derive(Debug)]
pub enum PaymentError {
    /// 402 without a decodable payment requirement. Never retried.
    MalformedDemand(String),
    /// The tool answered with a non-success, non-402 status.
    Invocation(String),
    /// Transport-level failure reaching the tool.
    Http(String),
    /// The wallet signer refused or failed to produce a credential.
    Signer(String),
}

impl fmt::Display for PaymentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PaymentError::MalformedDemand(msg) => {
                write!(f, "malformed payment demand: {msg}")
            }
            PaymentError::Invocation(msg) => write!(f, "tool invocation failed: {msg}"),
            PaymentError::Http(msg) => write!(f, "http error: {msg}"),
            PaymentError::Signer(msg) => write!(f, "payment signing failed: {msg}"),
        }
    }
}

impl std::error::Error for PaymentError {}

/// Convert PaymentError to String for API error envelopes.
impl From<PaymentError> for String {
    fn from(err: PaymentError) -> Self {
        err.to_string()
    }
}

pub type Result<T> = std::result::Result<T, PaymentError>;
