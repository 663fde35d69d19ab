//! Secret strength validation module
//!
//! Classifies the HS256 signing secret so startup can refuse (production) or
//! warn about (elsewhere) secrets that are short or low-entropy.

use anyhow::{anyhow, Result};
use ring::rand::{SecureRandom, SystemRandom};

const MIN_SECRET_LENGTH: usize = 32; // 256 bits, one HS256 block of key material
const RECOMMENDED_SECRET_LENGTH: usize = 64;

/// Secret strength classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretStrength {
    Weak,
    Acceptable,
    Strong,
}

impl SecretStrength {
    pub fn is_weak(&self) -> bool {
        matches!(self, SecretStrength::Weak)
    }
}

/// Classify an HS256 secret
///
/// Weak when shorter than 32 bytes, below 4 bits/byte of Shannon entropy, or
/// containing runs of four repeated or sequential bytes. Strong when at least
/// 64 bytes with 5 bits/byte or more.
pub fn validate_secret_strength(secret: &[u8]) -> SecretStrength {
    if secret.len() < MIN_SECRET_LENGTH {
        return SecretStrength::Weak;
    }

    let entropy = shannon_entropy(secret);
    if entropy < 4.0 || has_obvious_patterns(secret) {
        return SecretStrength::Weak;
    }

    if secret.len() >= RECOMMENDED_SECRET_LENGTH && entropy >= 5.0 {
        SecretStrength::Strong
    } else {
        SecretStrength::Acceptable
    }
}

/// Bits per byte (0-8)
fn shannon_entropy(data: &[u8]) -> f64 {
    let mut freq = [0u32; 256];
    for &byte in data {
        freq[byte as usize] += 1;
    }

    let len = data.len() as f64;
    freq.iter()
        .filter(|&&count| count > 0)
        .map(|&count| {
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

fn has_obvious_patterns(data: &[u8]) -> bool {
    let run_of_four = |step: i16| {
        data.windows(4).any(|w| {
            w.windows(2)
                .all(|pair| pair[1] as i16 - pair[0] as i16 == step)
        })
    };

    // "aaaa" / "1234"
    run_of_four(0) || run_of_four(1)
}

/// Generate a random base64 secret from `length` bytes of OS randomness
pub fn generate_secure_secret(length: usize) -> Result<String> {
    if length < MIN_SECRET_LENGTH {
        return Err(anyhow!(
            "Secret length must be at least {} bytes",
            MIN_SECRET_LENGTH
        ));
    }

    let rng = SystemRandom::new();
    let mut buffer = vec![0u8; length];
    rng.fill(&mut buffer)
        .map_err(|_| anyhow!("Failed to generate random bytes"))?;

    use base64::{engine::general_purpose::STANDARD, Engine};
    Ok(STANDARD.encode(&buffer))
}
