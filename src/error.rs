use thiserror::Error;

// ─── Top-level error hierarchy ───────────────────────────────────────────────

/// Structured error hierarchy for `chainward`.
///
/// Each subsystem defines its own error variant. Library callers can match on
/// these to decide recovery strategy; internal code continues to use
/// `anyhow::Result` for ad-hoc context chains.
#[derive(Debug, Error)]
pub enum ChainwardError {
    // ── Config ───────────────────────────────────────────────────────────
    #[error("config: {0}")]
    Config(#[from] ConfigError),

    // ── Ledger ───────────────────────────────────────────────────────────
    #[error("ledger: {0}")]
    Ledger(#[from] LedgerError),

    // ── Startup ──────────────────────────────────────────────────────────
    #[error("startup: {0}")]
    Startup(#[from] StartupError),

    // ── Generic fallthrough (wraps anyhow for interop) ──────────────────
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// ─── Config errors ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load config: {0}")]
    Load(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

// ─── Ledger errors ───────────────────────────────────────────────────────────

/// Failures surfaced by a ledger client.
///
/// Callers classify by operation: errors from a detail fetch are partial and
/// recoverable, errors from an interact submission are reported to operators.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("rpc transport: {0}")]
    Transport(String),

    #[error("rpc error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("malformed rpc response: {0}")]
    Response(String),

    #[error("abi decode failed: {0}")]
    Decode(String),

    #[error("interact submission failed: {0}")]
    Submission(String),
}

// ─── Startup errors ──────────────────────────────────────────────────────────

/// Conditions that make the keeper unusable before its first tick.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("ledger unreachable, connectivity check failed")]
    Unreachable,

    #[error("target {owner} owns no claimed entities")]
    NoEligibleEntities { owner: String },

    #[error("ledger: {0}")]
    Ledger(#[from] LedgerError),
}

// ─── Convenience re-exports ─────────────────────────────────────────────────

/// Shorthand result type for the crate.
pub type Result<T> = std::result::Result<T, ChainwardError>;
