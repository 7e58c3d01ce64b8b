//! Submit-and-confirm for a single action request

use tracing::{debug, info};

use super::StepContext;
use crate::chain::{format_amount, ActionRequest, Receipt};
use crate::error::{Error, Result};

/// Submit `request` once and wait for its receipt.
///
/// A reverted receipt becomes `ConfirmationFailed`. Cancellation interrupts
/// the wait but never the submission itself.
pub async fn send_and_confirm(
    ctx: &StepContext<'_>,
    label: &str,
    request: ActionRequest,
) -> Result<Receipt> {
    if ctx.cancel.is_cancelled() {
        return Err(Error::Cancelled);
    }

    debug!(
        "{} {} -> {} value={} gas={}",
        ctx.tag(),
        label,
        request.to,
        format_amount(request.value, 18),
        request.gas_limit
    );

    let tx_hash = ctx.chain.submit(ctx.credential, &request).await?;
    info!(
        "{} {} sent: {}",
        ctx.tag(),
        label,
        ctx.chain.explorer_url(&tx_hash)
    );

    let receipt = tokio::select! {
        receipt = ctx.chain.confirm(tx_hash) => receipt?,
        _ = ctx.cancel.cancelled() => return Err(Error::Cancelled),
    };

    if !receipt.success {
        return Err(Error::ConfirmationFailed {
            tx_hash: tx_hash.to_string(),
        });
    }

    info!(
        "{} {} confirmed in block {}",
        ctx.tag(),
        label,
        receipt
            .block_number
            .map(|b| b.to_string())
            .unwrap_or_else(|| "?".to_string())
    );
    Ok(receipt)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{test_credential, ScriptedChain, TestHarness};
    use alloy::primitives::{Address, Bytes, U256};

    #[tokio::test]
    async fn test_submits_once_and_confirms() {
        let chain = ScriptedChain::new();
        let mut h = TestHarness::new();
        let cred = test_credential(1);
        let ctx = h.context(&cred, &chain);

        let receipt = send_and_confirm(
            &ctx,
            "wrap",
            ActionRequest::new(Address::ZERO, Bytes::new()).value(U256::from(5u64)),
        )
        .await
        .unwrap();

        assert!(receipt.success);
        assert_eq!(chain.submitted().len(), 1);
        assert_eq!(chain.submitted()[0].1.value, U256::from(5u64));
    }

    #[tokio::test]
    async fn test_revert_is_confirmation_failed() {
        let chain = ScriptedChain::new();
        chain.revert_all(true);
        let mut h = TestHarness::new();
        let cred = test_credential(1);
        let ctx = h.context(&cred, &chain);

        let err = send_and_confirm(&ctx, "wrap", ActionRequest::new(Address::ZERO, Bytes::new()))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ConfirmationFailed { .. }));
    }

    #[tokio::test]
    async fn test_cancelled_before_submit_sends_nothing() {
        let chain = ScriptedChain::new();
        let mut h = TestHarness::new();
        h.cancel.cancel();
        let cred = test_credential(1);
        let ctx = h.context(&cred, &chain);

        let err = send_and_confirm(&ctx, "wrap", ActionRequest::new(Address::ZERO, Bytes::new()))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Cancelled));
        assert!(chain.submitted().is_empty());
    }
}
