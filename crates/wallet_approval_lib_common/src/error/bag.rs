use super::{CustomError, TransportError};
use rustc_hex::FromHexError;
use std::fmt::Display;
use web3::ethabi::ethereum_types::FromDecStrErr;

/// Enum gathering every error kind used across the engine
#[derive(Debug)]
pub enum ErrorBag {
    IoError(std::io::Error),
    CustomError(CustomError),
    Transport(TransportError),
    EthAbiError(web3::ethabi::Error),
    ReqwestError(reqwest::Error),
    FromDecStrErr(FromDecStrErr),
    FromHexError(FromHexError),
}

impl Display for ErrorBag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorBag::IoError(io_error) => write!(f, "{io_error}"),
            ErrorBag::CustomError(custom_error) => write!(f, "{custom_error}"),
            ErrorBag::Transport(transport_error) => write!(f, "{transport_error}"),
            ErrorBag::EthAbiError(eth_abi_error) => write!(f, "{eth_abi_error:?}"),
            ErrorBag::ReqwestError(reqwest_error) => write!(f, "{reqwest_error}"),
            ErrorBag::FromDecStrErr(from_dec_str_err) => write!(f, "{from_dec_str_err:?}"),
            ErrorBag::FromHexError(from_hex_error) => write!(f, "{from_hex_error:?}"),
        }
    }
}

impl std::error::Error for ErrorBag {}

impl From<std::io::Error> for ErrorBag {
    fn from(err: std::io::Error) -> Self {
        ErrorBag::IoError(err)
    }
}

impl From<CustomError> for ErrorBag {
    fn from(err: CustomError) -> Self {
        ErrorBag::CustomError(err)
    }
}

impl From<TransportError> for ErrorBag {
    fn from(err: TransportError) -> Self {
        ErrorBag::Transport(err)
    }
}

impl From<web3::ethabi::Error> for ErrorBag {
    fn from(err: web3::ethabi::Error) -> Self {
        ErrorBag::EthAbiError(err)
    }
}

impl From<reqwest::Error> for ErrorBag {
    fn from(err: reqwest::Error) -> Self {
        ErrorBag::ReqwestError(err)
    }
}

impl From<FromDecStrErr> for ErrorBag {
    fn from(err: FromDecStrErr) -> Self {
        ErrorBag::FromDecStrErr(err)
    }
}

impl From<FromHexError> for ErrorBag {
    fn from(err: FromHexError) -> Self {
        ErrorBag::FromHexError(err)
    }
}
