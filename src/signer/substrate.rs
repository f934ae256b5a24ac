//! Substrate-family identity: sr25519 keys and SS58 addresses

use crate::error::{RunnerError, RunnerResult};

use blake2::digest::consts::U32;
use blake2::{Blake2b, Blake2b512, Digest};
use pbkdf2::pbkdf2_hmac;
use schnorrkel::{signing_context, ExpansionMode, Keypair, MiniSecretKey};
use sha2::Sha512;
use zeroize::Zeroizing;

type Blake2b256 = Blake2b<U32>;

/// PBKDF2 rounds for the mini secret, as in BIP-39
const PBKDF2_ROUNDS: u32 = 2048;

/// Salt for an empty password
const MINI_SECRET_SALT: &[u8] = b"mnemonic";

const SIGNING_CONTEXT: &[u8] = b"substrate";

const SS58_CHECKSUM_PREFIX: &[u8] = b"SS58PRE";

/// Largest SS58 network identifier (14 bits)
const MAX_SS58_FORMAT: u16 = 0b0011_1111_1111_1111;

/// Payloads longer than this are signed over their blake2b-256 hash
const MAX_UNHASHED_PAYLOAD: usize = 256;

/// Offline sr25519 signer
#[derive(Clone)]
pub struct SubstrateSigner {
    keypair: Keypair,
    address: String,
}

impl SubstrateSigner {
    /// Build from BIP-39 entropy using the Substrate mini-secret scheme
    pub fn from_entropy(entropy: &[u8], ss58_format: u16) -> RunnerResult<Self> {
        if entropy.len() < 16 || entropy.len() > 32 || entropy.len() % 4 != 0 {
            return Err(RunnerError::InvalidPhrase(format!(
                "unexpected entropy length {}",
                entropy.len()
            )));
        }

        let mut seed = Zeroizing::new([0u8; 64]);
        pbkdf2_hmac::<Sha512>(entropy, MINI_SECRET_SALT, PBKDF2_ROUNDS, &mut seed[..]);

        let mini = MiniSecretKey::from_bytes(&seed[..32])
            .map_err(|e| RunnerError::Wallet(format!("Invalid sr25519 mini secret: {}", e)))?;
        let keypair = mini.expand_to_keypair(ExpansionMode::Ed25519);
        let address = ss58_encode(&keypair.public.to_bytes(), ss58_format)?;

        Ok(Self { keypair, address })
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn public_key(&self) -> [u8; 32] {
        self.keypair.public.to_bytes()
    }

    /// Sign a signing payload as produced for an extrinsic
    pub fn sign(&self, payload: &[u8]) -> [u8; 64] {
        let context = signing_context(SIGNING_CONTEXT);
        let signature = if payload.len() > MAX_UNHASHED_PAYLOAD {
            self.keypair.sign(context.bytes(&Blake2b256::digest(payload)))
        } else {
            self.keypair.sign(context.bytes(payload))
        };
        signature.to_bytes()
    }
}

/// SS58-encode a 32-byte public key for the given network prefix
pub fn ss58_encode(public_key: &[u8; 32], ss58_format: u16) -> RunnerResult<String> {
    if ss58_format > MAX_SS58_FORMAT {
        return Err(RunnerError::Config(format!(
            "SS58 format {} exceeds {}",
            ss58_format, MAX_SS58_FORMAT
        )));
    }

    let mut bytes = match ss58_format {
        0..=63 => vec![ss58_format as u8],
        _ => {
            let first = ((ss58_format & 0b0000_0000_1111_1100) as u8) >> 2;
            let second =
                ((ss58_format >> 8) as u8) | (((ss58_format & 0b0000_0000_0000_0011) as u8) << 6);
            vec![first | 0b0100_0000, second]
        }
    };
    bytes.extend_from_slice(public_key);

    let checksum = ss58_checksum(&bytes);
    bytes.extend_from_slice(&checksum);

    Ok(bs58::encode(bytes).into_string())
}

fn ss58_checksum(data: &[u8]) -> [u8; 2] {
    let mut hasher = Blake2b512::new();
    hasher.update(SS58_CHECKSUM_PREFIX);
    hasher.update(data);
    let hash = hasher.finalize();
    [hash[0], hash[1]]
}
