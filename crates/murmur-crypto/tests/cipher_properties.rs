//! Property tests for the message cipher.

use murmur_crypto::{Cipher, CryptoError, PreSharedKey};
use proptest::prelude::*;

proptest! {
    #[test]
    fn roundtrip_is_identity(plaintext in any::<String>()) {
        let cipher = Cipher::new(PreSharedKey::from_passphrase("change-me"));
        let token = cipher.encrypt(&plaintext).unwrap();
        prop_assert_eq!(cipher.decrypt(&token).unwrap(), plaintext);
    }

    #[test]
    fn roundtrip_with_control_characters(plaintext in "[\\x00-\\x1f\\x7f]{0,64}") {
        let cipher = Cipher::new(PreSharedKey::new(vec![0x5a; 32]));
        let token = cipher.encrypt(&plaintext).unwrap();
        prop_assert_eq!(cipher.decrypt(&token).unwrap(), plaintext);
    }

    #[test]
    fn wrong_key_is_an_error_not_a_panic(plaintext in ".{0,64}", other in "[a-z]{1,16}") {
        let cipher = Cipher::new(PreSharedKey::from_passphrase("change-me"));
        let wrong = Cipher::new(PreSharedKey::from_passphrase(&format!("{}-not", other)));
        let token = cipher.encrypt(&plaintext).unwrap();
        prop_assert_eq!(wrong.decrypt(&token), Err(CryptoError::Decrypt));
    }

    #[test]
    fn arbitrary_input_never_panics(token in ".{0,128}") {
        let cipher = Cipher::new(PreSharedKey::from_passphrase("change-me"));
        let _ = cipher.decrypt(&token);
    }
}

#[test]
fn empty_string_roundtrips() {
    let cipher = Cipher::new(PreSharedKey::from_passphrase("change-me"));
    let token = cipher.encrypt("").unwrap();
    assert_eq!(cipher.decrypt(&token).unwrap(), "");
}
