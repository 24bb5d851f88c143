//! Proof-post validation.

use std::sync::Arc;

use tracing::{info, warn, Instrument};

use paysnap_chain::{LedgerRpc, PostContent};
use paysnap_types::{AccountName, ProofRef};

use crate::config::NodeConfig;
use crate::tracing_spans::validate_span;

/// Checks that a proof post shares revenue with the operator.
///
/// Fails closed: a post that cannot be fetched, does not exist, was written
/// by someone other than the payer, or lacks the exact operator share is
/// invalid. Nothing is ever raised to the caller.
pub struct SnapValidator {
    rpc: Arc<dyn LedgerRpc>,
    operator: AccountName,
    required_weight: u32,
}

impl SnapValidator {
    pub fn new(rpc: Arc<dyn LedgerRpc>, operator: AccountName, required_weight: u32) -> Self {
        Self {
            rpc,
            operator,
            required_weight,
        }
    }

    pub fn from_config(rpc: Arc<dyn LedgerRpc>, config: &NodeConfig) -> Self {
        Self::new(
            rpc,
            config.operator_account.clone(),
            config.required_beneficiary_weight,
        )
    }

    pub async fn validate(&self, proof: &ProofRef, payer: &AccountName) -> bool {
        async {
            if proof.author != *payer {
                warn!(author = %proof.author, "proof post not written by payer");
                return false;
            }
            let content = match self.rpc.get_content(proof).await {
                Ok(Some(content)) => content,
                Ok(None) => {
                    info!("proof post not found");
                    return false;
                }
                Err(e) => {
                    warn!(error = %e, "could not fetch proof post");
                    return false;
                }
            };
            let valid = has_required_share(&content, &self.operator, self.required_weight);
            if valid {
                info!("proof post grants operator share");
            } else {
                info!(beneficiaries = ?content.beneficiaries, "proof post lacks operator share");
            }
            valid
        }
        .instrument(validate_span(payer, &proof.permlink))
        .await
    }
}

/// Whether `content` lists `operator` as a beneficiary with exactly `weight`.
pub fn has_required_share(content: &PostContent, operator: &AccountName, weight: u32) -> bool {
    content
        .beneficiaries
        .iter()
        .any(|b| *operator == b.account.as_str() && b.weight == weight)
}
