//! Recovery of the signer of a base64-wrapped message.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use ethers::types::{RecoveryMessage, Signature, H256};
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SignatureError {
    #[error("{0} is not base64-encoded ASCII")]
    Encoding(&'static str),

    #[error("Malformed signature: {0}")]
    Malformed(String),

    #[error("Signature was not made by {0}")]
    Mismatch(String),

    #[error("Address {0} has no activity on chain")]
    Unknown(String),
}

fn decode_ascii(field: &'static str, value: &str) -> Result<String, SignatureError> {
    let bytes = STANDARD
        .decode(value.trim())
        .map_err(|_| SignatureError::Encoding(field))?;
    if !bytes.is_ascii() {
        return Err(SignatureError::Encoding(field));
    }
    String::from_utf8(bytes).map_err(|_| SignatureError::Encoding(field))
}

/// A `0x`-prefixed 32-byte hex message is signed as a raw hash, anything else
/// as EIP-191 personal-message data.
fn recovery_message(message: String) -> RecoveryMessage {
    let hash = message
        .strip_prefix("0x")
        .and_then(|body| hex::decode(body).ok())
        .filter(|bytes| bytes.len() == 32);
    match hash {
        Some(bytes) => RecoveryMessage::Hash(H256::from_slice(&bytes)),
        None => RecoveryMessage::Data(message.into_bytes()),
    }
}

/// Lowercase `0x` address that produced `signature` over `message`, both base64.
pub fn recover_signer(signature: &str, message: &str) -> Result<String, SignatureError> {
    let signature = decode_ascii("signature", signature)?;
    let message = decode_ascii("message", message)?;

    let signature = Signature::from_str(signature.trim()).map_err(|e| SignatureError::Malformed(e.to_string()))?;
    let signer = signature
        .recover(recovery_message(message))
        .map_err(|e| SignatureError::Malformed(e.to_string()))?;

    Ok(format!("{:#x}", signer))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethers::signers::{LocalWallet, Signer};

    const KEY: &str = "0x0000000000000000000000000000000000000000000000000000000000000001";

    fn wallet() -> LocalWallet {
        KEY.parse().unwrap()
    }

    #[tokio::test]
    async fn test_recovers_personal_message_signer() {
        let wallet = wallet();
        let signature = wallet.sign_message("link my account").await.unwrap();

        let signer = recover_signer(
            &STANDARD.encode(signature.to_string()),
            &STANDARD.encode("link my account"),
        )
        .unwrap();
        assert_eq!(signer, format!("{:#x}", wallet.address()));
    }

    #[test]
    fn test_recovers_hash_signer() {
        let wallet = wallet();
        let hash = H256::repeat_byte(0x42);
        let signature = wallet.sign_hash(hash).unwrap();

        let signer = recover_signer(
            &STANDARD.encode(format!("0x{}", signature)),
            &STANDARD.encode(format!("{:#x}", hash)),
        )
        .unwrap();
        assert_eq!(signer, format!("{:#x}", wallet.address()));
    }

    #[test]
    fn test_rejects_bad_encoding() {
        assert!(matches!(
            recover_signer("not base64!", &STANDARD.encode("hi")),
            Err(SignatureError::Encoding("signature"))
        ));
        assert!(matches!(
            recover_signer(&STANDARD.encode("0x1234"), &STANDARD.encode("hi")),
            Err(SignatureError::Malformed(_))
        ));
    }
}
