/// Chain node access errors.
#[derive(Debug, thiserror::Error)]
pub enum ChainError {
    /// The node could not be reached or the request timed out.
    /// Transient; callers retry on the next tick. Never to be conflated
    /// with a zero balance.
    #[error("chain node unavailable: {0}")]
    NodeUnavailable(String),

    /// The node answered with a JSON-RPC error object.
    #[error("rpc error {code}: {message}")]
    Rpc { code: i64, message: String },

    /// The node answered with something that does not parse.
    #[error("invalid rpc response: {0}")]
    InvalidResponse(String),

    #[error("failed to construct http client: {0}")]
    ClientBuild(String),
}
