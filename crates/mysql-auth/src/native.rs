//! `mysql_native_password` challenge-response.
//!
//! ```text
//! stage1 = SHA1(password)
//! stage2 = SHA1(stage1)
//! result = stage1 XOR SHA1(challenge ++ stage2)
//! ```
//!
//! The server stores `stage2` and checks the response by recovering `stage1`
//! from it and hashing once more.

use sha1::{Digest, Sha1};

/// Length of a native password scramble (one SHA1 digest).
pub const SCRAMBLE_LEN: usize = 20;

fn sha1(parts: &[&[u8]]) -> [u8; SCRAMBLE_LEN] {
    let mut hasher = Sha1::new();
    for part in parts {
        hasher.update(part);
    }
    let mut out = [0u8; SCRAMBLE_LEN];
    out.copy_from_slice(&hasher.finalize());
    out
}

fn xor(a: &[u8; SCRAMBLE_LEN], b: &[u8; SCRAMBLE_LEN]) -> [u8; SCRAMBLE_LEN] {
    std::array::from_fn(|i| a[i] ^ b[i])
}

/// Scramble `password` with the server `challenge`.
///
/// An empty password produces an empty response, not 20 zero bytes.
#[must_use]
pub fn scramble(challenge: &[u8], password: &[u8]) -> Vec<u8> {
    if password.is_empty() {
        return Vec::new();
    }

    let stage1 = sha1(&[password]);
    let stage2 = sha1(&[&stage1[..]]);
    let mask = sha1(&[challenge, &stage2[..]]);
    xor(&stage1, &mask).to_vec()
}

/// Double SHA1 of a password, as the server stores it.
#[must_use]
pub fn password_hash(password: &[u8]) -> [u8; SCRAMBLE_LEN] {
    sha1(&[&sha1(&[password])[..]])
}

/// Check a scrambled response against a stored [`password_hash`].
#[must_use]
pub fn verify_scramble(challenge: &[u8], response: &[u8], stored: &[u8; SCRAMBLE_LEN]) -> bool {
    let Ok(response) = <&[u8; SCRAMBLE_LEN]>::try_from(response) else {
        return false;
    };
    let mask = sha1(&[challenge, &stored[..]]);
    let stage1 = xor(response, &mask);
    sha1(&[&stage1[..]]) == *stored
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const CHALLENGE: &[u8; 20] = b"4bo+$r4HO5X>j}Ur]Y)^";

    #[test]
    fn test_known_vector() {
        let expected: [u8; 20] = [
            0x50, 0xaf, 0xf1, 0x12, 0x2c, 0xe9, 0xad, 0xea, 0x7f, 0xa0, 0x0a, 0xcd, 0xa2, 0xb5,
            0x3c, 0x17, 0xa5, 0xc9, 0x4a, 0xd0,
        ];
        assert_eq!(scramble(CHALLENGE, b"password"), expected);
    }

    #[test]
    fn test_empty_password() {
        assert!(scramble(CHALLENGE, b"").is_empty());
    }

    #[test]
    fn test_password_hash() {
        // SHA1(SHA1("password")), the value MySQL stores for this password.
        let expected: [u8; 20] = [
            0x24, 0x70, 0xc0, 0xc0, 0x6d, 0xee, 0x42, 0xfd, 0x16, 0x18, 0xbb, 0x99, 0x00, 0x5a,
            0xdc, 0xa2, 0xec, 0x9d, 0x1e, 0x19,
        ];
        assert_eq!(password_hash(b"password"), expected);
    }

    #[test]
    fn test_verify_rejects_wrong_password() {
        let stored = password_hash(b"password");
        assert!(verify_scramble(CHALLENGE, &scramble(CHALLENGE, b"password"), &stored));
        assert!(!verify_scramble(CHALLENGE, &scramble(CHALLENGE, b"passw0rd"), &stored));
        assert!(!verify_scramble(CHALLENGE, &[], &stored));
    }

    proptest! {
        #[test]
        fn scramble_is_deterministic(
            challenge in proptest::array::uniform20(any::<u8>()),
            password in proptest::collection::vec(any::<u8>(), 1..64),
        ) {
            let a = scramble(&challenge, &password);
            let b = scramble(&challenge, &password);
            prop_assert_eq!(a.len(), SCRAMBLE_LEN);
            prop_assert_eq!(&a, &b);
            prop_assert!(verify_scramble(&challenge, &a, &password_hash(&password)));
        }
    }
}
