//! Error types for BlackTrace

use thiserror::Error;

/// Main error type for BlackTrace
#[derive(Error, Debug)]
pub enum BlackTraceError {
    // Network errors
    #[error("Network connection error: {0}")]
    NetworkConnection(String),

    #[error("Message routing error: {0}")]
    MessageRouting(String),

    #[error("Network partition detected: {0}")]
    NetworkPartition(String),

    #[error("Peer not found: {0}")]
    PeerNotFound(String),

    #[error("Peer timeout: {0}")]
    PeerTimeout(String),

    // Wire codec / envelope errors
    #[error("Envelope signature verification failed")]
    BadSignature,

    #[error("Peer key changed for peer {0}: suspected MITM")]
    PeerKeyChanged(String),

    // Cryptography errors
    #[error("Proof generation failed: {0}")]
    ProofGeneration(String),

    #[error("Proof verification failed: {0}")]
    ProofVerification(String),

    #[error("Encryption failed: {0}")]
    Encryption(String),

    #[error("Decryption failed: {0}")]
    Decryption(String),

    #[error("Invalid secret preimage")]
    InvalidSecret,

    #[error("Secret hash mismatch")]
    SecretHashMismatch,

    // Identity & session errors
    #[error("User already exists: {0}")]
    UserExists(String),

    #[error("Unknown user: {0}")]
    UnknownUser(String),

    #[error("Wrong password")]
    WrongPassword,

    #[error("No such session")]
    NoSession,

    #[error("Session expired")]
    Expired,

    // Order management errors
    #[error("Insufficient balance: required {required}, available {available}")]
    InsufficientBalance { required: u64, available: u64 },

    #[error("Order not found: {0}")]
    OrderNotFound(String),

    #[error("Unknown order: {0}")]
    UnknownOrder(String),

    #[error("Order already exists: {0}")]
    OrderAlreadyExists(String),

    #[error("Conflicting order id from a different peer: {0}")]
    ConflictingOrderID(String),

    #[error("Order expired: {0}")]
    OrderExpired(String),

    #[error("Nullifier already used: {0}")]
    NullifierReused(String),

    #[error("Invalid order state: {0}")]
    InvalidOrderState(String),

    #[error("Invalid price range")]
    InvalidPrice,

    #[error("Invalid amount")]
    InvalidAmount,

    // Negotiation errors
    #[error("Negotiation session not found: {0}")]
    SessionNotFound(String),

    #[error("Negotiation timeout: {0}")]
    NegotiationTimeout(String),

    #[error("Counterparty disconnected: {0}")]
    CounterpartyDisconnected(String),

    #[error("Invalid negotiation state transition: {0}")]
    InvalidStateTransition(String),

    #[error("Price proposal rejected: {0}")]
    ProposalRejected(String),

    #[error("Invalid proposal: {0}")]
    InvalidProposal(String),

    #[error("Price out of range")]
    PriceOutOfRange,

    #[error("Proposal already accepted")]
    AlreadyAccepted,

    #[error("Proposal expired")]
    ProposalExpired,

    // Settlement errors
    #[error("Transaction broadcast failed: {0}")]
    TransactionBroadcast(String),

    #[error("Transaction not found: {0}")]
    TransactionNotFound(String),

    #[error("Refund attempted before timeout")]
    TooEarly,

    #[error("Operation timed out")]
    TimedOut,

    #[error("Settlement already completed")]
    SettlementCompleted,

    #[error("Settlement failed: {0}")]
    SettlementFailed(String),

    #[error("Insufficient confirmations: {current}/{required}")]
    InsufficientConfirmations { current: u32, required: u32 },

    #[error("Chain RPC unavailable: {0}")]
    ChainRPCUnavailable(String),

    #[error("Lock transaction not yet confirmed")]
    LockNotConfirmed,

    #[error("Claim rejected: {0}")]
    ClaimRejected(String),

    #[error("Invariant violated: {0}")]
    InvariantViolated(String),

    // State persistence errors
    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("State corruption detected: {0}")]
    StateCorruption(String),

    #[error("Storage error: {0}")]
    Storage(#[from] sled::Error),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid configuration value: {0}")]
    InvalidConfig(String),

    #[error("Missing configuration field: {0}")]
    MissingConfig(String),

    // RPC errors
    #[error("RPC connection error: {0}")]
    RpcConnection(String),

    #[error("RPC call failed: {0}")]
    RpcCallFailed(String),

    #[error("Invalid RPC response: {0}")]
    InvalidRpcResponse(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    // General errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Hex decode error: {0}")]
    HexDecode(#[from] hex::FromHexError),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Not implemented: {0}")]
    NotImplemented(String),
}

/// Result type alias for BlackTrace operations
pub type Result<T> = std::result::Result<T, BlackTraceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = BlackTraceError::OrderNotFound("order_123".to_string());
        assert_eq!(err.to_string(), "Order not found: order_123");
    }

    #[test]
    fn test_result_type() {
        fn sample_function() -> Result<u64> {
            Ok(42)
        }

        let result = sample_function();
        assert!(result.is_ok());
        assert_eq!(result.unwrap(), 42);
    }

    #[test]
    fn test_error_conversion() {
        fn io_error_function() -> Result<()> {
            std::fs::read_to_string("/nonexistent/file")?;
            Ok(())
        }

        let result = io_error_function();
        assert!(result.is_err());
        assert!(matches!(result.unwrap_err(), BlackTraceError::Io(_)));
    }

    #[test]
    fn test_insufficient_balance_error() {
        let err = BlackTraceError::InsufficientBalance {
            required: 10000,
            available: 5000,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient balance: required 10000, available 5000"
        );
    }

    #[test]
    fn test_insufficient_confirmations_error() {
        let err = BlackTraceError::InsufficientConfirmations {
            current: 3,
            required: 6,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient confirmations: 3/6"
        );
    }

    #[test]
    fn test_peer_key_changed_error() {
        let err = BlackTraceError::PeerKeyChanged("peer_abc".to_string());
        assert_eq!(
            err.to_string(),
            "Peer key changed for peer peer_abc: suspected MITM"
        );
    }

    #[test]
    fn test_invariant_violated_error() {
        let err = BlackTraceError::InvariantViolated("source_timeout_abs <= dest_timeout_abs".to_string());
        assert!(err.to_string().starts_with("Invariant violated"));
    }
}
