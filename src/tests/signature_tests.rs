use super::*;
use crate::service::signature::SignatureError;
use crate::service::{AddressTracker, ServiceError};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use ethers::signers::{LocalWallet, Signer};
use std::sync::Arc;

const KEY: &str = "0x4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318";

struct Fixture {
    tracker: AddressTracker,
    wallet: LocalWallet,
    signer: String,
}

async fn fixture() -> Fixture {
    let store = setup_store().await;
    stage_chain(&store, 95, 110).await;

    let wallet: LocalWallet = KEY.parse().unwrap();
    let signer = format!("{:#x}", wallet.address());

    let chain = Arc::new(MockChain::with_head(117));
    chain.set_history(&signer, vec![transfer(100, &signer, BOB, 10, "0x100")]);
    chain.set_activity_only(CAROL);

    Fixture {
        tracker: AddressTracker::new(store, chain),
        wallet,
        signer,
    }
}

async fn signed(wallet: &LocalWallet, message: &str) -> (String, String) {
    let signature = wallet.sign_message(message).await.unwrap();
    (STANDARD.encode(signature.to_string()), STANDARD.encode(message))
}

#[tokio::test]
async fn test_signature_from_known_address_is_valid() {
    let f = fixture().await;
    let (signature, message) = signed(&f.wallet, "I control this account").await;

    f.tracker
        .verify_signature(&signature, &message, &f.signer.to_uppercase().replacen("0X", "0x", 1))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_signature_by_another_key_is_rejected() {
    let f = fixture().await;
    let (signature, message) = signed(&f.wallet, "I control this account").await;

    let result = f.tracker.verify_signature(&signature, &message, CAROL).await;
    assert!(matches!(
        result,
        Err(ServiceError::Signature(SignatureError::Mismatch(_)))
    ));
}

#[tokio::test]
async fn test_signature_for_unknown_address_is_rejected() {
    let f = fixture().await;
    let (signature, message) = signed(&f.wallet, "I control this account").await;

    let result = f.tracker.verify_signature(&signature, &message, ALICE).await;
    assert!(matches!(
        result,
        Err(ServiceError::Signature(SignatureError::Unknown(_)))
    ));
}

#[tokio::test]
async fn test_tampered_message_is_rejected() {
    let f = fixture().await;
    let (signature, _) = signed(&f.wallet, "I control this account").await;

    let result = f
        .tracker
        .verify_signature(&signature, &STANDARD.encode("I control that account"), &f.signer)
        .await;
    assert!(matches!(
        result,
        Err(ServiceError::Signature(SignatureError::Mismatch(_)))
    ));
}
