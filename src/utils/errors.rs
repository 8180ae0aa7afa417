use std::fmt;

/**
 * Crate wide error type. Fatal conditions only; recoverable conditions
 * (candidate enumeration overflow, empty windows) are modelled as Option
 * or empty collections at their call sites.
 */
#[derive(Debug, Clone, PartialEq)]
pub enum SkuaError {
    InvalidConfiguration(String),
    VcfParseError(String),
    InvalidInput(String),
    ExcessiveCoverage(String),
    MissingReference(String),
}

impl fmt::Display for SkuaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkuaError::InvalidConfiguration(msg) => write!(f, "Invalid configuration: {}", msg),
            SkuaError::VcfParseError(msg) => write!(f, "VCF parse error: {}", msg),
            SkuaError::InvalidInput(msg) => write!(f, "Invalid input: {}", msg),
            SkuaError::ExcessiveCoverage(msg) => write!(f, "Excessive coverage: {}", msg),
            SkuaError::MissingReference(msg) => write!(f, "Missing reference: {}", msg),
        }
    }
}

impl std::error::Error for SkuaError {}
