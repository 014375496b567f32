use bitcoin::hashes::Hash;
use libsecp256k1::{Message, PublicKey, SecretKey, Signature};
use log::trace;
use pricefeed_tx::SigHash;

use crate::traits::SignatureVerifier;

/// secp256k1 ECDSA over the signature hash, with 64-byte `r || s` signatures
/// and SEC1 encoded public keys. High-s signatures do not verify.
#[derive(Debug, Clone, Copy, Default)]
pub struct Secp256k1Verifier;

impl SignatureVerifier for Secp256k1Verifier {
    fn verify(&self, pubkey: &[u8], message: &SigHash, signature: &[u8]) -> bool {
        let pubkey = match PublicKey::parse_slice(pubkey, None) {
            Ok(pubkey) => pubkey,
            Err(e) => {
                trace!(target: "pricefeed", "[verify] invalid public key: {:?}", e);
                return false;
            }
        };
        let signature = match Signature::parse_standard_slice(signature) {
            Ok(signature) => signature,
            Err(e) => {
                trace!(target: "pricefeed", "[verify] invalid signature: {:?}", e);
                return false;
            }
        };
        let msg = Message::parse(&message.to_byte_array());
        libsecp256k1::verify(&msg, &signature, &pubkey)
    }
}

/// Signs a signature hash with a raw 32-byte secret key.
pub fn sign(key: &[u8], message: &SigHash) -> Result<Vec<u8>, libsecp256k1::Error> {
    let secret_key = SecretKey::parse_slice(key)?;
    let msg = Message::parse(&message.to_byte_array());
    let (signature, _) = libsecp256k1::sign(&msg, &secret_key);
    Ok(signature.serialize().to_vec())
}

/// Compressed public key of a raw 32-byte secret key.
pub fn public_key(key: &[u8]) -> Result<Vec<u8>, libsecp256k1::Error> {
    let secret_key = SecretKey::parse_slice(key)?;
    Ok(PublicKey::from_secret_key(&secret_key)
        .serialize_compressed()
        .to_vec())
}
