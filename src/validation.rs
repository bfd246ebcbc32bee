use chrono::{DateTime, Utc};
use thiserror::Error;

pub const ADDRESS_PREFIX: &str = "0x";

#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(String),

    #[error("Invalid Ethereum address format: {0}")]
    InvalidAddress(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}

/// Validate an address and return its lowercase form.
pub fn normalize_address(address: &str) -> Result<String, ValidationError> {
    let address = address.trim();
    if address.is_empty() {
        return Err(ValidationError::MissingParameter("address".to_string()));
    }

    let lower = address.to_lowercase();
    let Some(body) = lower.strip_prefix(ADDRESS_PREFIX) else {
        return Err(ValidationError::InvalidAddress(address.to_string()));
    };

    // Addresses are 20 bytes
    match hex::decode(body) {
        Ok(bytes) if bytes.len() == 20 => Ok(lower),
        _ => Err(ValidationError::InvalidAddress(address.to_string())),
    }
}

pub fn validate_timestamp(name: &str, value: &str) -> Result<DateTime<Utc>, ValidationError> {
    DateTime::parse_from_rfc3339(value.trim())
        .map(|t| t.with_timezone(&Utc))
        .map_err(|_| ValidationError::InvalidParameter(format!("{} must be an ISO 8601 timestamp", name)))
}

pub fn validate_count(name: &str, value: &str) -> Result<u64, ValidationError> {
    value
        .trim()
        .parse::<u64>()
        .map_err(|_| ValidationError::InvalidParameter(format!("{} must be a non-negative integer", name)))
}

/// Query flags are on when the value mentions `t` (`true`, `t`, `yes`, ...).
pub fn parse_flag(value: Option<&str>) -> bool {
    value.map(|v| v.to_lowercase().contains('t')).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_address() {
        let addr = "0x046c88317b23dc57F6945Bf4140140f73c8FC80F";
        assert_eq!(
            normalize_address(addr).unwrap(),
            "0x046c88317b23dc57f6945bf4140140f73c8fc80f"
        );
        assert!(matches!(normalize_address(""), Err(ValidationError::MissingParameter(_))));
        assert!(matches!(
            normalize_address("046c88317b23dc57F6945Bf4140140f73c8FC80F"),
            Err(ValidationError::InvalidAddress(_))
        ));
        assert!(matches!(normalize_address("0x1234"), Err(ValidationError::InvalidAddress(_))));
        assert!(matches!(
            normalize_address("0xZZ6c88317b23dc57F6945Bf4140140f73c8FC80F"),
            Err(ValidationError::InvalidAddress(_))
        ));
    }

    #[test]
    fn test_parse_flag() {
        assert!(parse_flag(Some("true")));
        assert!(parse_flag(Some("t")));
        assert!(!parse_flag(Some("false")));
        assert!(!parse_flag(Some("0")));
        assert!(!parse_flag(None));
    }

    #[test]
    fn test_validate_timestamp() {
        let t = validate_timestamp("since", "2024-01-02T03:04:05Z").unwrap();
        assert_eq!(t.timestamp(), 1704164645);
        assert!(validate_timestamp("since", "yesterday").is_err());
    }
}
