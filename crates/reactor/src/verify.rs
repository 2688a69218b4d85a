//! Verification of foreign signed observations.

use crate::metrics::metrics;
use thiserror::Error;
use vigil_messages::SignedObservation;
use vigil_types::{Address, GuardianSet, Signature};

/// Reasons a signed observation fails verification.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerifyError {
    /// The signature is malformed or no public key could be recovered from
    /// it.
    #[error("failed to recover a public key from the signature")]
    InvalidSignature,
    /// The claimed address does not match the recovered signer.
    #[error("address {claimed} does not match recovered signer {recovered}")]
    PubkeyMismatch {
        /// Address the message claimed to be signed by.
        claimed: Address,
        /// Address derived from the recovered public key.
        recovered: Address,
    },
    /// The recovered signer is not a member of the guardian set.
    #[error("unknown guardian: {0}")]
    UnknownGuardian(Address),
}

impl VerifyError {
    /// Label value for the categorized failure counter.
    pub fn reason(&self) -> &'static str {
        match self {
            VerifyError::InvalidSignature => "invalid_signature",
            VerifyError::PubkeyMismatch { .. } => "pubkey_mismatch",
            VerifyError::UnknownGuardian(_) => "unknown_guardian",
        }
    }
}

/// Verify a foreign signed observation against a guardian-set snapshot.
///
/// Recovers the public key that produced the signature over the carried
/// digest, requires the derived address to match the claimed one, and
/// requires membership in the guardian set. Returns the verified address and
/// the parsed signature; failures are counted under the categorized failure
/// metric.
///
/// The digest itself is not compared against any expected value: the owner
/// of the reactor routes observations by digest, so a mismatched digest is a
/// routing concern, not a verification one.
pub fn verify_signed_observation(
    group: &str,
    m: &SignedObservation,
    gs: &GuardianSet,
) -> Result<(Address, Signature), VerifyError> {
    let result = check_observation(m, gs);
    if let Err(err) = &result {
        metrics()
            .observations_failed
            .with_label_values(&[group, err.reason()])
            .inc();
    }
    result
}

fn check_observation(
    m: &SignedObservation,
    gs: &GuardianSet,
) -> Result<(Address, Signature), VerifyError> {
    // Recover the public key that produced the signature over the digest.
    let signature =
        Signature::from_slice(&m.signature).map_err(|_| VerifyError::InvalidSignature)?;
    let public_key = signature
        .recover(&m.hash)
        .map_err(|_| VerifyError::InvalidSignature)?;

    // The claimed address must be the one derived from the recovered key.
    let recovered = public_key.address();
    if recovered != m.addr {
        return Err(VerifyError::PubkeyMismatch {
            claimed: m.addr,
            recovered,
        });
    }

    // The signer must be an active guardian. If it is us who hold an
    // outdated set, the message will be retransmitted eventually.
    if !gs.contains(&recovered) {
        return Err(VerifyError::UnknownGuardian(recovered));
    }

    Ok((recovered, signature))
}
