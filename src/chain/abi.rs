//! Contract bindings and calldata encoders
//!
//! Standard interfaces go through `sol!`. The two calls that are only known
//! by selector (Apriori claim, Kintsu unstake) are encoded by hand.

use alloy::primitives::{hex, Address, Bytes, U256};
use alloy::sol;
use alloy::sol_types::{SolCall, SolValue};

use crate::error::{Error, Result};

sol! {
    #[allow(missing_docs)]
    interface IERC20 {
        function balanceOf(address owner) external view returns (uint256);
        function allowance(address owner, address spender) external view returns (uint256);
        function approve(address spender, uint256 amount) external returns (bool);
    }

    #[allow(missing_docs)]
    interface IWMON {
        function deposit() external payable;
        function withdraw(uint256 amount) external;
    }

    #[allow(missing_docs)]
    interface IUniswapV2Router {
        function getAmountsOut(uint256 amountIn, address[] calldata path) external view returns (uint256[] memory amounts);
        function swapExactETHForTokens(uint256 amountOutMin, address[] calldata path, address to, uint256 deadline) external payable returns (uint256[] memory amounts);
        function swapExactTokensForETH(uint256 amountIn, uint256 amountOutMin, address[] calldata path, address to, uint256 deadline) external returns (uint256[] memory amounts);
        function swapExactTokensForTokens(uint256 amountIn, uint256 amountOutMin, address[] calldata path, address to, uint256 deadline) external returns (uint256[] memory amounts);
    }

    /// ERC-4626 deposit plus ERC-7540 async redeem
    #[allow(missing_docs)]
    interface IAprioriVault {
        function deposit(uint256 assets, address receiver) external payable returns (uint256 shares);
        function requestRedeem(uint256 shares, address controller, address owner) external returns (uint256 requestId);
    }

    #[allow(missing_docs)]
    interface IShMonad {
        function deposit(uint256 assets, address receiver) external payable returns (uint256);
        function redeem(uint256 shares, address receiver, address owner) external returns (uint256);
        function bond(uint64 policyID, address bondRecipient, uint256 amount) external;
    }

    #[allow(missing_docs)]
    interface IKintsu {
        function stake() external payable returns (uint96);
    }
}

/// Apriori `claimWithdrawal(uint256[],address)`
pub const APRIORI_CLAIM_SELECTOR: [u8; 4] = [0x49, 0x2e, 0x47, 0xd2];

/// Kintsu unstake, takes a single uint256
pub const KINTSU_UNSTAKE_SELECTOR: [u8; 4] = [0x30, 0xaf, 0x6b, 0x2e];

fn with_selector(selector: [u8; 4], params: Vec<u8>) -> Bytes {
    let mut data = Vec::with_capacity(4 + params.len());
    data.extend_from_slice(&selector);
    data.extend_from_slice(&params);
    data.into()
}

fn strip_selector<'a>(call: &str, selector: [u8; 4], data: &'a [u8]) -> Result<&'a [u8]> {
    if data.len() < 4 || data[..4] != selector {
        return Err(Error::Abi {
            call: call.to_string(),
            reason: format!("unexpected selector 0x{}", hex::encode(&data[..data.len().min(4)])),
        });
    }
    Ok(&data[4..])
}

fn abi_err(call: &str, e: impl std::fmt::Display) -> Error {
    Error::Abi {
        call: call.to_string(),
        reason: e.to_string(),
    }
}

pub fn balance_of(owner: Address) -> Bytes {
    IERC20::balanceOfCall { owner }.abi_encode().into()
}

pub fn allowance(owner: Address, spender: Address) -> Bytes {
    IERC20::allowanceCall { owner, spender }.abi_encode().into()
}

pub fn approve(spender: Address, amount: U256) -> Bytes {
    IERC20::approveCall { spender, amount }.abi_encode().into()
}

pub fn decode_uint(call: &str, data: &[u8]) -> Result<U256> {
    U256::abi_decode(data).map_err(|e| abi_err(call, e))
}

pub fn wrap() -> Bytes {
    IWMON::depositCall {}.abi_encode().into()
}

pub fn unwrap(amount: U256) -> Bytes {
    IWMON::withdrawCall { amount }.abi_encode().into()
}

pub fn get_amounts_out(amount_in: U256, path: Vec<Address>) -> Bytes {
    IUniswapV2Router::getAmountsOutCall {
        amountIn: amount_in,
        path,
    }
    .abi_encode()
    .into()
}

pub fn decode_amounts_out(data: &[u8]) -> Result<Vec<U256>> {
    IUniswapV2Router::getAmountsOutCall::abi_decode_returns(data)
        .map_err(|e| abi_err("getAmountsOut", e))
}

pub fn swap_exact_eth_for_tokens(
    amount_out_min: U256,
    path: Vec<Address>,
    to: Address,
    deadline: U256,
) -> Bytes {
    IUniswapV2Router::swapExactETHForTokensCall {
        amountOutMin: amount_out_min,
        path,
        to,
        deadline,
    }
    .abi_encode()
    .into()
}

pub fn swap_exact_tokens_for_eth(
    amount_in: U256,
    amount_out_min: U256,
    path: Vec<Address>,
    to: Address,
    deadline: U256,
) -> Bytes {
    IUniswapV2Router::swapExactTokensForETHCall {
        amountIn: amount_in,
        amountOutMin: amount_out_min,
        path,
        to,
        deadline,
    }
    .abi_encode()
    .into()
}

pub fn swap_exact_tokens_for_tokens(
    amount_in: U256,
    amount_out_min: U256,
    path: Vec<Address>,
    to: Address,
    deadline: U256,
) -> Bytes {
    IUniswapV2Router::swapExactTokensForTokensCall {
        amountIn: amount_in,
        amountOutMin: amount_out_min,
        path,
        to,
        deadline,
    }
    .abi_encode()
    .into()
}

pub fn apriori_deposit(assets: U256, receiver: Address) -> Bytes {
    IAprioriVault::depositCall { assets, receiver }
        .abi_encode()
        .into()
}

pub fn apriori_request_redeem(shares: U256, owner: Address) -> Bytes {
    IAprioriVault::requestRedeemCall {
        shares,
        controller: owner,
        owner,
    }
    .abi_encode()
    .into()
}

pub fn apriori_claim(ids: Vec<U256>, receiver: Address) -> Bytes {
    with_selector(APRIORI_CLAIM_SELECTOR, (ids, receiver).abi_encode_params())
}

pub fn decode_apriori_claim(data: &[u8]) -> Result<(Vec<U256>, Address)> {
    let params = strip_selector("claimWithdrawal", APRIORI_CLAIM_SELECTOR, data)?;
    <(Vec<U256>, Address)>::abi_decode_params(params).map_err(|e| abi_err("claimWithdrawal", e))
}

pub fn kintsu_stake() -> Bytes {
    IKintsu::stakeCall {}.abi_encode().into()
}

pub fn kintsu_unstake(token_id: U256) -> Bytes {
    with_selector(KINTSU_UNSTAKE_SELECTOR, token_id.abi_encode())
}

pub fn decode_kintsu_unstake(data: &[u8]) -> Result<U256> {
    let params = strip_selector("unstake", KINTSU_UNSTAKE_SELECTOR, data)?;
    decode_uint("unstake", params)
}

pub fn shmonad_deposit(assets: U256, receiver: Address) -> Bytes {
    IShMonad::depositCall { assets, receiver }.abi_encode().into()
}

pub fn shmonad_redeem(shares: U256, owner: Address) -> Bytes {
    IShMonad::redeemCall {
        shares,
        receiver: owner,
        owner,
    }
    .abi_encode()
    .into()
}

pub fn shmonad_bond(policy_id: u64, recipient: Address, amount: U256) -> Bytes {
    IShMonad::bondCall {
        policyID: policy_id,
        bondRecipient: recipient,
        amount,
    }
    .abi_encode()
    .into()
}
