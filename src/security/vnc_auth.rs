// Copyright 2025 Dustin McAfee
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! VNC challenge/response authentication (RFB security type 2), grounded
//! on the `VncAuth::new`/`generate_challenge`/`verify_response` call
//! shape `client.rs` already assumes, extended to check a
//! newline-separated password file rather than a single in-memory
//! password (spec §6 "Persisted state").

use des::cipher::{BlockEncrypt, KeyInit};
use des::Des;
use rand::RngCore;
use std::path::Path;

/// 16-byte DES-encrypted challenge, per RFC 6143 §7.2.2.
const CHALLENGE_LEN: usize = 16;

/// Candidate passwords this server will accept, checked against a
/// client's DES response to a random challenge.
#[derive(Clone)]
pub struct VncAuth {
    candidates: Vec<String>,
}

impl VncAuth {
    /// Builds an authenticator accepting exactly one password (the
    /// teacher's single-password call shape).
    #[must_use]
    pub fn new(password: Option<String>) -> Self {
        Self {
            candidates: password.into_iter().collect(),
        }
    }

    /// Builds an authenticator accepting any password listed, one per
    /// line, in the file at `path`. Blank lines are skipped.
    ///
    /// # Errors
    ///
    /// Returns `Err` if `path` cannot be read.
    pub fn from_password_file(path: &Path) -> std::io::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let candidates = contents.lines().map(str::trim).filter(|l| !l.is_empty()).map(str::to_string).collect();
        Ok(Self { candidates })
    }

    /// Generates a fresh 16-byte random challenge to send to the client.
    #[must_use]
    pub fn generate_challenge(&self) -> [u8; CHALLENGE_LEN] {
        let mut challenge = [0u8; CHALLENGE_LEN];
        rand::thread_rng().fill_bytes(&mut challenge);
        challenge
    }

    /// Returns true if `response` is the DES encryption of `challenge`
    /// under any candidate password's derived key.
    #[must_use]
    pub fn verify_response(&self, response: &[u8], challenge: &[u8; CHALLENGE_LEN]) -> bool {
        if response.len() != CHALLENGE_LEN {
            return false;
        }
        self.candidates.iter().any(|password| {
            let expected = encrypt_challenge(challenge, password);
            expected == response
        })
    }
}

/// Encrypts `challenge` with the DES key derived from `password` per the
/// classic VNC quirk: the password is padded/truncated to 8 bytes and
/// each key byte has its bits reversed before use (VNC's DES key
/// schedule is bit-order-reversed relative to the standard).
fn encrypt_challenge(challenge: &[u8; CHALLENGE_LEN], password: &str) -> [u8; CHALLENGE_LEN] {
    let key = vnc_des_key(password);
    let cipher = Des::new_from_slice(&key).expect("DES key is always exactly 8 bytes");

    let mut out = [0u8; CHALLENGE_LEN];
    for (chunk_in, chunk_out) in challenge.chunks_exact(8).zip(out.chunks_exact_mut(8)) {
        let mut block = des::cipher::generic_array::GenericArray::clone_from_slice(chunk_in);
        cipher.encrypt_block(&mut block);
        chunk_out.copy_from_slice(&block);
    }
    out
}

/// Pads/truncates `password` to 8 bytes and reverses the bits of each byte.
fn vnc_des_key(password: &str) -> [u8; 8] {
    let mut key = [0u8; 8];
    for (i, b) in password.as_bytes().iter().take(8).enumerate() {
        key[i] = *b;
    }
    for byte in &mut key {
        *byte = byte.reverse_bits();
    }
    key
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn correct_password_verifies() {
        let auth = VncAuth::new(Some("secret".to_string()));
        let challenge = auth.generate_challenge();
        let response = encrypt_challenge(&challenge, "secret");
        assert!(auth.verify_response(&response, &challenge));
    }

    #[test]
    fn wrong_password_is_rejected() {
        let auth = VncAuth::new(Some("secret".to_string()));
        let challenge = auth.generate_challenge();
        let response = encrypt_challenge(&challenge, "nope");
        assert!(!auth.verify_response(&response, &challenge));
    }

    #[test]
    fn wrong_length_response_is_rejected() {
        let auth = VncAuth::new(Some("secret".to_string()));
        let challenge = auth.generate_challenge();
        assert!(!auth.verify_response(&[0u8; 4], &challenge));
    }

    #[test]
    fn password_file_accepts_any_listed_candidate() {
        let dir = std::env::temp_dir();
        let path = dir.join(format!("rustvnc-ltsm-test-passwd-{}", std::process::id()));
        std::fs::write(&path, "first\nsecond\n\nthird\n").unwrap();
        let auth = VncAuth::from_password_file(&path).unwrap();
        std::fs::remove_file(&path).ok();

        let challenge = auth.generate_challenge();
        let response = encrypt_challenge(&challenge, "second");
        assert!(auth.verify_response(&response, &challenge));
    }
}
