//! Incremental, algorithm-tagged checksums.
//!
//! Streaming only: there is deliberately no "hash this whole buffer" entry
//! point. Drivers must feed the exact byte stream they transmit into
//! [`State::update`] as it goes out over the wire, not compute a second,
//! independent pass from disk (spec §9, "Running checksum coupled to
//! streamed bytes").

use md5::Md5;
use serde::{Deserialize, Serialize};
use sha1::Sha1;
use sha2::{Digest, Sha256, Sha512};

/// The checksum algorithms Dataverse's wire protocol understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Algorithm {
    #[serde(rename = "MD5")]
    Md5,
    #[serde(rename = "SHA-1")]
    Sha1,
    #[serde(rename = "SHA-256")]
    Sha256,
    #[serde(rename = "SHA-512")]
    Sha512,
}

impl Default for Algorithm {
    fn default() -> Self {
        Algorithm::Md5
    }
}

impl Algorithm {
    pub fn new_state(self) -> State {
        match self {
            Algorithm::Md5 => State::Md5(Md5::new()),
            Algorithm::Sha1 => State::Sha1(Sha1::new()),
            Algorithm::Sha256 => State::Sha256(Sha256::new()),
            Algorithm::Sha512 => State::Sha512(Sha512::new()),
        }
    }
}

/// Opaque running hasher state for one in-progress checksum.
pub enum State {
    Md5(Md5),
    Sha1(Sha1),
    Sha256(Sha256),
    Sha512(Sha512),
}

impl State {
    pub fn algorithm(&self) -> Algorithm {
        match self {
            State::Md5(_) => Algorithm::Md5,
            State::Sha1(_) => Algorithm::Sha1,
            State::Sha256(_) => Algorithm::Sha256,
            State::Sha512(_) => Algorithm::Sha512,
        }
    }

    /// Feed a chunk of bytes into the running hash.
    pub fn update(&mut self, chunk: &[u8]) {
        match self {
            State::Md5(h) => h.update(chunk),
            State::Sha1(h) => h.update(chunk),
            State::Sha256(h) => h.update(chunk),
            State::Sha512(h) => h.update(chunk),
        }
    }

    /// Finalize into a lowercase hex digest. Terminal: consumes the state.
    pub fn finalize(self) -> String {
        match self {
            State::Md5(h) => hex(&h.finalize()),
            State::Sha1(h) => hex(&h.finalize()),
            State::Sha256(h) => hex(&h.finalize()),
            State::Sha512(h) => hex(&h.finalize()),
        }
    }
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
