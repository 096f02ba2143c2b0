use crate::err_custom_create;
use crate::error::ApprovalError;
use lazy_static::lazy_static;
use sha3::{Digest, Keccak256};
use web3::contract::tokens::Tokenize;
use web3::ethabi;
use web3::types::{Address, U256};

lazy_static! {
    pub static ref ERC20_CONTRACT_TEMPLATE: ethabi::Contract =
        prepare_contract_template(include_bytes!("../contracts/ierc20.json")).unwrap();
}

/// Signature of the only method this engine ever submits.
pub const ERC20_APPROVE_SIGNATURE: &str = "approve(address,uint256)";

pub const ERC20_APPROVE_PARAMETER_TYPES: [&str; 2] = ["address", "uint256"];

pub fn prepare_contract_template(json_abi: &[u8]) -> Result<ethabi::Contract, ApprovalError> {
    ethabi::Contract::load(json_abi)
        .map_err(|err| err_custom_create!("Failed to load contract template {err}"))
}

pub fn contract_encode<P>(
    contract: &ethabi::Contract,
    func: &str,
    params: P,
) -> Result<Vec<u8>, web3::ethabi::Error>
where
    P: Tokenize,
{
    contract
        .function(func)
        .and_then(|function| function.encode_input(&params.into_tokens()))
}

pub fn encode_erc20_approve(
    spender: Address,
    amount: U256,
) -> Result<Vec<u8>, web3::ethabi::Error> {
    contract_encode(&ERC20_CONTRACT_TEMPLATE, "approve", (spender, amount))
}

/// Keccak-256 derived 4-byte selector, `095ea7b3` for the approve signature.
pub fn erc20_approve_selector() -> [u8; 4] {
    let digest = Keccak256::digest(ERC20_APPROVE_SIGNATURE.as_bytes());
    let mut selector = [0u8; 4];
    selector.copy_from_slice(&digest[0..4]);
    selector
}
