//! Packed hop-path encoding for multi-hop routers

use crate::error::{RunnerError, RunnerResult};

use ethers::types::{Address, Bytes};

const ADDRESS_LEN: usize = 20;

/// Concatenate the raw 20-byte hop addresses in traversal order
pub fn encode_path(path: &[Address]) -> RunnerResult<Bytes> {
    if path.len() < 2 {
        return Err(RunnerError::InvalidPath(format!(
            "need at least two tokens, got {}",
            path.len()
        )));
    }

    let mut encoded = Vec::with_capacity(path.len() * ADDRESS_LEN);
    for hop in path {
        encoded.extend_from_slice(hop.as_bytes());
    }
    Ok(Bytes::from(encoded))
}

/// Split a packed path back into hop addresses
pub fn decode_path(encoded: &[u8]) -> RunnerResult<Vec<Address>> {
    if encoded.len() % ADDRESS_LEN != 0 {
        return Err(RunnerError::InvalidPath(format!(
            "length {} is not a multiple of {}",
            encoded.len(),
            ADDRESS_LEN
        )));
    }
    if encoded.len() < 2 * ADDRESS_LEN {
        return Err(RunnerError::InvalidPath(format!(
            "length {} holds fewer than two tokens",
            encoded.len()
        )));
    }

    Ok(encoded
        .chunks_exact(ADDRESS_LEN)
        .map(Address::from_slice)
        .collect())
}
