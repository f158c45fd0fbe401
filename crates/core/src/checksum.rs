//! Computing and verifying Cumulus object checksums.

use crate::refstr::Algorithm;
use sha1::Sha1;
use sha2::{Digest, Sha224, Sha256};

enum Hasher {
    Sha1(Sha1),
    Sha224(Sha224),
    Sha256(Sha256),
}

impl Hasher {
    fn new(algorithm: Algorithm) -> Self {
        match algorithm {
            Algorithm::Sha1 => Hasher::Sha1(Sha1::new()),
            Algorithm::Sha224 => Hasher::Sha224(Sha224::new()),
            Algorithm::Sha256 => Hasher::Sha256(Sha256::new()),
        }
    }

    fn update(&mut self, data: &[u8]) {
        match self {
            Hasher::Sha1(h) => h.update(data),
            Hasher::Sha224(h) => h.update(data),
            Hasher::Sha256(h) => h.update(data),
        }
    }

    fn hexdigest(self) -> String {
        match self {
            Hasher::Sha1(h) => hex::encode(h.finalize()),
            Hasher::Sha224(h) => hex::encode(h.finalize()),
            Hasher::Sha256(h) => hex::encode(h.finalize()),
        }
    }
}

/// Computes a checksum string (`ALGO=HEX`) over a stream of byte chunks.
pub struct ChecksumCreator {
    algorithm: Algorithm,
    hasher: Hasher,
}

impl ChecksumCreator {
    /// Create a checksum creator for the given algorithm.
    pub fn new(algorithm: Algorithm) -> Self {
        ChecksumCreator {
            algorithm,
            hasher: Hasher::new(algorithm),
        }
    }

    /// Feed more data into the running hash.
    pub fn update(&mut self, data: &[u8]) -> &mut Self {
        self.hasher.update(data);
        self
    }

    /// Finish and return the `ALGO=HEX` checksum string.
    pub fn compute(self) -> String {
        format!("{}={}", self.algorithm.name(), self.hasher.hexdigest())
    }
}

/// Verifies whether data matches an expected `ALGO=HEX` checksum string.
pub struct ChecksumVerifier {
    expected_hex: String,
    hasher: Hasher,
}

impl ChecksumVerifier {
    /// Create a verifier from a `ALGO=HEX` checksum string.
    pub fn new(checksum_str: &str) -> crate::error::Result<Self> {
        let checksum = crate::refstr::Checksum::parse(checksum_str)?;
        Ok(ChecksumVerifier {
            expected_hex: checksum.hex,
            hasher: Hasher::new(checksum.algorithm),
        })
    }

    /// Feed more data into the running hash.
    pub fn update(&mut self, data: &[u8]) {
        self.hasher.update(data);
    }

    /// Returns whether the accumulated hash matches the expected checksum.
    ///
    /// Consumes the verifier: once checked, it must not be fed more data.
    pub fn valid(self) -> bool {
        self.hasher.hexdigest() == self.expected_hex
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creator_and_verifier_agree() {
        let mut creator = ChecksumCreator::new(Algorithm::Sha1);
        creator.update(b"hello ").update(b"world");
        let checksum = creator.compute();

        let mut verifier = ChecksumVerifier::new(&checksum).unwrap();
        verifier.update(b"hello world");
        assert!(verifier.valid());
    }

    #[test]
    fn verifier_rejects_mismatched_data() {
        let mut creator = ChecksumCreator::new(Algorithm::Sha256);
        creator.update(b"original");
        let checksum = creator.compute();

        let mut verifier = ChecksumVerifier::new(&checksum).unwrap();
        verifier.update(b"tampered");
        assert!(!verifier.valid());
    }

    #[test]
    fn all_three_algorithms_round_trip() {
        for algo in [Algorithm::Sha1, Algorithm::Sha224, Algorithm::Sha256] {
            let mut creator = ChecksumCreator::new(algo);
            creator.update(b"data");
            let checksum = creator.compute();
            let mut verifier = ChecksumVerifier::new(&checksum).unwrap();
            verifier.update(b"data");
            assert!(verifier.valid());
        }
    }
}
