//! Integration tests for the ledgerlink-vault crate.
//!
//! These exercise the sealing contract end to end: round-trips across a
//! range of sizes, and fail-closed decryption for every single-bit mutation
//! of an envelope.

use ledgerlink_vault::crypto::{NONCE_LEN_BYTES, TAG_LEN};
use ledgerlink_vault::{CryptoVault, EncryptedSecret, VaultError, VaultKey};

fn test_vault() -> CryptoVault {
    CryptoVault::new(VaultKey::generate().unwrap())
}

// ═══════════════════════════════════════════════════════════════════════
//  Round-trips
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn roundtrip_across_sizes() {
    let vault = test_vault();
    for size in [0usize, 1, 15, 16, 17, 255, 4096, 64 * 1024] {
        let plaintext: Vec<u8> = (0..size).map(|i| (i % 251) as u8).collect();
        let sealed = vault.encrypt(&plaintext).unwrap();
        assert_eq!(vault.decrypt(&sealed).unwrap(), plaintext, "size {size}");
    }
}

#[test]
fn roundtrip_through_opaque_encoding() {
    let vault = test_vault();
    let stored = vault.encrypt(b"access-production-9f2c").unwrap().encode();
    assert!(!stored.contains("access"));
    assert_eq!(
        vault.decrypt_encoded(&stored).unwrap(),
        b"access-production-9f2c"
    );
}

#[test]
fn same_key_material_reopens_envelopes() {
    let key = VaultKey::generate().unwrap();
    let encoded = key.to_base64();

    let sealed = CryptoVault::new(key).encrypt(b"sec-42").unwrap();
    let reopened = CryptoVault::new(VaultKey::from_base64(&encoded).unwrap());
    assert_eq!(reopened.decrypt(&sealed).unwrap(), b"sec-42");
}

// ═══════════════════════════════════════════════════════════════════════
//  Tamper evidence
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn every_single_bit_flip_fails_closed() {
    let vault = test_vault();
    let sealed = vault.encrypt(b"sec-42").unwrap();
    let bytes = sealed.to_bytes();
    assert_eq!(bytes.len(), NONCE_LEN_BYTES + 6 + TAG_LEN);

    for index in 0..bytes.len() {
        for bit in 0..8 {
            let mut mutated = bytes.clone();
            mutated[index] ^= 1 << bit;
            let tampered = EncryptedSecret::from_bytes(&mutated).unwrap();
            let result = vault.decrypt(&tampered);
            assert!(
                matches!(result, Err(VaultError::Decryption { .. })),
                "byte {index} bit {bit} was accepted"
            );
        }
    }
}

#[test]
fn flipped_nonce_ciphertext_and_tag_regions_each_fail() {
    let vault = test_vault();
    let sealed = vault.encrypt(b"sec-42").unwrap();
    let bytes = sealed.to_bytes();

    let regions = [
        ("nonce", 0),
        ("ciphertext", NONCE_LEN_BYTES),
        ("tag", bytes.len() - 1),
    ];
    for (name, index) in regions {
        let mut mutated = bytes.clone();
        mutated[index] ^= 0x80;
        let tampered = EncryptedSecret::from_bytes(&mutated).unwrap();
        assert!(vault.decrypt(&tampered).is_err(), "{name} flip accepted");
    }
}

#[test]
fn truncated_encoding_is_decryption_error() {
    let vault = test_vault();
    let stored = vault.encrypt(b"sec-42").unwrap().encode();
    let truncated = &stored[..10];
    assert!(matches!(
        vault.decrypt_encoded(truncated),
        Err(VaultError::Decryption { .. })
    ));
}
