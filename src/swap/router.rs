//! Router contract binding and the swap executor

use super::{SwapOrder, SwapRequest};
use crate::error::{RunnerError, RunnerResult};
use crate::signer::SignerPair;
use crate::transfer::TxReference;

use chrono::Utc;
use ethers::prelude::*;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info, warn};

abigen!(
    SwapRouter,
    r#"[
        struct ExactInputParams { bytes path; address recipient; uint256 deadline; uint256 amountIn; uint256 amountOutMinimum; }
        function exactInput(ExactInputParams params) external payable returns (uint256 amountOut)
    ]"#
);

/// Submits exact-input swaps to a fixed router and waits for inclusion
pub struct SwapExecutor {
    router: Address,
    /// Name of the chain the router lives on
    chain: String,
}

impl SwapExecutor {
    pub fn new(router: Address, chain: impl Into<String>) -> Self {
        Self {
            router,
            chain: chain.into(),
        }
    }

    /// Build an order timed from now and submit it
    pub async fn execute<M: Middleware + 'static>(
        &self,
        signers: &SignerPair<M>,
        request: &SwapRequest,
    ) -> RunnerResult<TxReference> {
        let order = SwapOrder::new(request, signers.evm.address(), unix_now())?;
        self.submit(signers.evm.clone(), &order).await
    }

    /// Submit an order and block until it is mined or its deadline passes
    pub async fn submit<M: Middleware + 'static>(
        &self,
        client: Arc<SignerMiddleware<M, LocalWallet>>,
        order: &SwapOrder,
    ) -> RunnerResult<TxReference> {
        if order.deadline <= unix_now() {
            return Err(RunnerError::DeadlineExceeded {
                deadline: order.deadline,
            });
        }

        let hops = order.hops()?;
        info!(
            "Swapping {} base units for at least {} across {} tokens (deadline {})",
            order.amount_in,
            order.amount_out_minimum,
            hops.len(),
            order.deadline
        );
        debug!("Swap path: {:?}", hops);

        let router = SwapRouter::new(self.router, client);
        let call = router.exact_input(ExactInputParams {
            path: order.path.clone(),
            recipient: order.recipient,
            deadline: U256::from(order.deadline),
            amount_in: order.amount_in,
            amount_out_minimum: order.amount_out_minimum,
        });

        let pending = call
            .send()
            .await
            .map_err(|e| classify_contract_error(e, &self.chain, order.deadline))?;
        let tx_hash = pending.tx_hash();
        info!("Swap tx hash: {:?}", tx_hash);

        let remaining = Duration::from_secs(order.deadline.saturating_sub(unix_now()));
        let receipt = match timeout(remaining, pending.confirmations(1)).await {
            Err(_) => {
                warn!("Swap {:?} not included before deadline", tx_hash);
                return Err(RunnerError::DeadlineExceeded {
                    deadline: order.deadline,
                });
            }
            Ok(Err(e)) => {
                return Err(RunnerError::Network {
                    endpoint: self.chain.clone(),
                    message: e.to_string(),
                })
            }
            Ok(Ok(None)) => {
                return Err(RunnerError::Network {
                    endpoint: self.chain.clone(),
                    message: format!("swap {:?} dropped from mempool", tx_hash),
                })
            }
            Ok(Ok(Some(receipt))) => receipt,
        };

        check_receipt(call, &receipt, order.deadline).await?;

        info!(
            "Swap {:?} included in block {:?}",
            tx_hash, receipt.block_number
        );
        Ok(TxReference::from(tx_hash))
    }
}

fn unix_now() -> u64 {
    Utc::now().timestamp().max(0) as u64
}

/// Fail on a reverted receipt, replaying the call at its block to recover the reason
async fn check_receipt<M: Middleware>(
    call: ContractCall<M, U256>,
    receipt: &TransactionReceipt,
    deadline: u64,
) -> RunnerResult<()> {
    if receipt.status == Some(1.into()) {
        return Ok(());
    }

    let tx_hash = format!("{:?}", receipt.transaction_hash);
    let reason = match receipt.block_number {
        Some(block) => match call.block(block).call().await {
            Err(e) => e.decode_revert::<String>(),
            Ok(_) => None,
        },
        None => None,
    };

    match reason {
        Some(reason) => {
            warn!("Swap {} reverted on-chain: {}", tx_hash, reason);
            Err(classify_revert_reason(&reason, deadline)
                .unwrap_or(RunnerError::SwapReverted { tx_hash }))
        }
        None => Err(RunnerError::SwapReverted { tx_hash }),
    }
}

fn classify_contract_error<M: Middleware>(
    err: ContractError<M>,
    chain: &str,
    deadline: u64,
) -> RunnerError {
    let reason = err.decode_revert::<String>().unwrap_or_else(|| err.to_string());
    if let Some(classified) = classify_revert_reason(&reason, deadline) {
        return classified;
    }

    if err.is_revert() {
        return RunnerError::Contract(reason);
    }

    let lower = reason.to_lowercase();
    if ["connection", "websocket", "timed out", "timeout"]
        .iter()
        .any(|needle| lower.contains(needle))
    {
        RunnerError::Network {
            endpoint: chain.to_string(),
            message: reason,
        }
    } else {
        RunnerError::Contract(reason)
    }
}

/// Map router revert strings onto swap failures
fn classify_revert_reason(reason: &str, deadline: u64) -> Option<RunnerError> {
    let code = reason
        .rsplit("reverted: ")
        .next()
        .unwrap_or(reason)
        .trim();

    if reason.contains("Too little received") {
        return Some(RunnerError::SlippageExceeded(reason.to_string()));
    }
    if reason.contains("Transaction too old") {
        return Some(RunnerError::DeadlineExceeded { deadline });
    }
    // SPL: price limit reached, IIA: pool could not absorb input
    if matches!(code, "SPL" | "IIA") || reason.to_lowercase().contains("insufficient liquidity")
    {
        return Some(RunnerError::InsufficientLiquidity(reason.to_string()));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signer::tests::mocked_signers;
    use ethers::abi::{self, Token};
    use ethers::providers::{JsonRpcError, MockResponse};

    fn order(deadline: u64) -> SwapOrder {
        SwapOrder {
            amount_in: U256::from(15_000_000u64),
            amount_out_minimum: U256::from(20_000_000_000u64),
            path: crate::swap::encode_path(&[Address::repeat_byte(1), Address::repeat_byte(2)])
                .unwrap(),
            recipient: Address::repeat_byte(3),
            deadline,
        }
    }

    #[tokio::test]
    async fn test_expired_deadline_fails_before_broadcast() {
        // No responses queued: any RPC call would surface as a network error
        let (signers, _mock) = mocked_signers();
        let executor = SwapExecutor::new(Address::repeat_byte(9), "Moonbeam");

        let err = executor
            .submit(signers.evm.clone(), &order(unix_now() - 1))
            .await
            .unwrap_err();

        assert!(matches!(err, RunnerError::DeadlineExceeded { .. }));
    }

    #[tokio::test]
    async fn test_zero_window_is_already_expired() {
        let (signers, _mock) = mocked_signers();
        let executor = SwapExecutor::new(Address::repeat_byte(9), "Moonbeam");
        let request = SwapRequest {
            amount_in: U256::one(),
            min_output: U256::one(),
            path: vec![Address::repeat_byte(1), Address::repeat_byte(2)],
            deadline_secs: 0,
        };

        let err = executor.execute(&signers, &request).await.unwrap_err();
        assert!(matches!(err, RunnerError::DeadlineExceeded { .. }));
    }

    #[test]
    fn test_exact_input_calldata_layout() {
        let (signers, _mock) = mocked_signers();
        let router = SwapRouter::new(Address::repeat_byte(9), signers.evm.clone());
        let order = order(1_700_001_200);
        let call = router.exact_input(ExactInputParams {
            path: order.path.clone(),
            recipient: order.recipient,
            deadline: U256::from(order.deadline),
            amount_in: order.amount_in,
            amount_out_minimum: order.amount_out_minimum,
        });

        let data = call.calldata().unwrap();
        let selector = &ethers::utils::id("exactInput((bytes,address,uint256,uint256,uint256))")[..4];
        assert_eq!(&data[..4], selector);
        // the packed path appears verbatim in the tail of the encoding
        let packed = order.path.to_vec();
        assert!(data.windows(packed.len()).any(|window| window == packed.as_slice()));
    }

    fn exact_input_call<M: Middleware>(
        client: Arc<SignerMiddleware<M, LocalWallet>>,
    ) -> ContractCall<SignerMiddleware<M, LocalWallet>, U256> {
        let order = order(1_700_001_200);
        SwapRouter::new(Address::repeat_byte(9), client).exact_input(ExactInputParams {
            path: order.path,
            recipient: order.recipient,
            deadline: U256::from(order.deadline),
            amount_in: order.amount_in,
            amount_out_minimum: order.amount_out_minimum,
        })
    }

    fn receipt(status: u64) -> TransactionReceipt {
        TransactionReceipt {
            transaction_hash: H256::repeat_byte(7),
            block_number: Some(100u64.into()),
            status: Some(status.into()),
            ..Default::default()
        }
    }

    fn revert_response(reason: &str) -> MockResponse {
        let mut data = ethers::utils::id("Error(string)").to_vec();
        data.extend(abi::encode(&[Token::String(reason.to_string())]));
        MockResponse::Error(JsonRpcError {
            code: 3,
            message: format!("execution reverted: {}", reason),
            data: Some(serde_json::Value::String(format!("0x{}", hex::encode(data)))),
        })
    }

    #[tokio::test]
    async fn test_successful_receipt_needs_no_replay() {
        // nothing queued: a replay would fail
        let (signers, _mock) = mocked_signers();
        let call = exact_input_call(signers.evm.clone());

        assert!(check_receipt(call, &receipt(1), 10).await.is_ok());
    }

    #[tokio::test]
    async fn test_mined_revert_below_minimum_is_slippage() {
        let (signers, mock) = mocked_signers();
        mock.push_response(revert_response("Too little received"));
        let call = exact_input_call(signers.evm.clone());

        let err = check_receipt(call, &receipt(0), 10).await.unwrap_err();
        match err {
            RunnerError::SlippageExceeded(reason) => assert_eq!(reason, "Too little received"),
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_mined_revert_past_deadline() {
        let (signers, mock) = mocked_signers();
        mock.push_response(revert_response("Transaction too old"));
        let call = exact_input_call(signers.evm.clone());

        let err = check_receipt(call, &receipt(0), 10).await.unwrap_err();
        assert!(matches!(err, RunnerError::DeadlineExceeded { deadline: 10 }));
    }

    #[tokio::test]
    async fn test_mined_revert_without_reason_is_swap_reverted() {
        let (signers, _mock) = mocked_signers();
        let call = exact_input_call(signers.evm.clone());

        let err = check_receipt(call, &receipt(0), 10).await.unwrap_err();
        match err {
            RunnerError::SwapReverted { tx_hash } => {
                assert_eq!(tx_hash, format!("{:?}", H256::repeat_byte(7)))
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_mined_revert_with_unknown_reason_is_swap_reverted() {
        let (signers, mock) = mocked_signers();
        mock.push_response(revert_response("STF"));
        let call = exact_input_call(signers.evm.clone());

        let err = check_receipt(call, &receipt(0), 10).await.unwrap_err();
        assert!(matches!(err, RunnerError::SwapReverted { .. }));
    }

    #[test]
    fn test_connection_loss_names_router_chain() {
        let err: ContractError<SignerMiddleware<Provider<MockProvider>, LocalWallet>> =
            ContractError::ProviderError {
                e: ProviderError::CustomError("websocket connection closed".to_string()),
            };

        match classify_contract_error(err, "Moonbeam", 10) {
            RunnerError::Network { endpoint, .. } => assert_eq!(endpoint, "Moonbeam"),
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_classify_revert_reason() {
        assert!(matches!(
            classify_revert_reason("Too little received", 10),
            Some(RunnerError::SlippageExceeded(_))
        ));
        assert!(matches!(
            classify_revert_reason("execution reverted: Transaction too old", 10),
            Some(RunnerError::DeadlineExceeded { deadline: 10 })
        ));
        assert!(matches!(
            classify_revert_reason("execution reverted: SPL", 10),
            Some(RunnerError::InsufficientLiquidity(_))
        ));
        assert!(matches!(
            classify_revert_reason("IIA", 10),
            Some(RunnerError::InsufficientLiquidity(_))
        ));
        assert!(classify_revert_reason("STF", 10).is_none());
    }
}
