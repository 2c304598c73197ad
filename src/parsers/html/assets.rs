//! Subresource integrity
//!
//! `integrity="sha384-… sha256-…"` lists acceptable hashes of a subresource. Only the strongest
//! algorithm listed counts; the bytes pass if they match any hash given for that algorithm.
//! Metadata without any supported algorithm does not restrict anything.

use base64::{prelude::BASE64_STANDARD, Engine};
use sha2::{Digest, Sha256, Sha384, Sha512};

use super::utils::WHITESPACES;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
enum HashAlgorithm {
    Sha256,
    Sha384,
    Sha512,
}

impl HashAlgorithm {
    fn from_prefix(prefix: &str) -> Option<Self> {
        match prefix.to_ascii_lowercase().as_str() {
            "sha256" => Some(HashAlgorithm::Sha256),
            "sha384" => Some(HashAlgorithm::Sha384),
            "sha512" => Some(HashAlgorithm::Sha512),
            _ => None,
        }
    }

    fn digest(self, data: &[u8]) -> String {
        match self {
            HashAlgorithm::Sha256 => BASE64_STANDARD.encode(Sha256::digest(data)),
            HashAlgorithm::Sha384 => BASE64_STANDARD.encode(Sha384::digest(data)),
            HashAlgorithm::Sha512 => BASE64_STANDARD.encode(Sha512::digest(data)),
        }
    }
}

fn parse_metadata(integrity: &str) -> Vec<(HashAlgorithm, &str)> {
    integrity
        .split(WHITESPACES)
        .filter_map(|item| {
            let (algorithm, rest) = item.split_once('-')?;
            let hash = rest.split('?').next().unwrap_or_default();
            Some((HashAlgorithm::from_prefix(algorithm)?, hash))
        })
        .collect()
}

pub fn check_integrity(data: &[u8], integrity: &str) -> bool {
    let metadata = parse_metadata(integrity);
    let Some(strongest) = metadata.iter().map(|(algorithm, _)| *algorithm).max() else {
        return true;
    };

    let digest = strongest.digest(data);
    metadata
        .iter()
        .filter(|(algorithm, _)| *algorithm == strongest)
        .any(|(_, hash)| *hash == digest)
}
