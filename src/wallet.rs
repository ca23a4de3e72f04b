//! The wallet: where the identity of the user comes from, and what pays for posts and comments.

use std::{
	sync::atomic::{AtomicU64, Ordering},
	time::Duration
};

use async_trait::async_trait;
use rust_decimal::{prelude::ToPrimitive, Decimal};
use serde::de::DeserializeOwned;
use serde_json::json;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
	common::{Address, AddressError},
	message::*
};



/// Number of base units (wei) in one token.
pub const WEI_PER_TOKEN: u64 = 1_000_000_000_000_000_000;
/// The gas limit given to payment transactions, 100000.
pub const PAYMENT_GAS_LIMIT: &str = "0x186a0";

/// Provides the identity of the user.
#[async_trait]
pub trait Wallet: Send + Sync {
	/// Asks the wallet for access to its accounts.
	async fn request_accounts( &self ) -> Result<Vec<Address>>;

	/// The kind of wallet, like `Rabby` or `MetaMask`.
	fn wallet_type( &self ) -> &str;
}

/// Transfers tokens before content is accepted.
#[async_trait]
pub trait PaymentGate: Send + Sync {
	/// Transfers `amount` tokens from `payer` to `recipient`.
	/// Returns whether the transfer went through; every kind of failure is `false`.
	async fn request_payment( &self, payer: &Address, recipient: &Address, amount: Decimal ) -> bool;
}

/// A wallet that is reached through its JSON-RPC interface.
pub struct RpcWallet {
	client: reqwest::Client,
	url: String,
	chain_id: String,
	wallet_type: String,
	confirmation_polls: u32,
	confirmation_interval: Duration,
	next_request_id: AtomicU64
}

#[derive(Debug, Error)]
pub enum Error {
	#[error("HTTP error: {0}")]
	Http( #[from] reqwest::Error ),
	#[error("wallet returned error {code}: {message}")]
	Rpc { code: i64, message: String },
	#[error("wallet answered request {actual} instead of {expected}")]
	MismatchedResponse { expected: u64, actual: u64 },
	#[error("wallet gave no result for {0}")]
	MissingResult( &'static str ),
	#[error("wallet is on chain {actual}, expected {expected}")]
	WrongChain { expected: String, actual: String },
	#[error("wallet has no accounts available")]
	NoAccounts,
	#[error("wallet returned an invalid account: {0}")]
	InvalidAccount( #[from] AddressError ),
	#[error("{0} is not a payable amount")]
	InvalidAmount( Decimal ),
	#[error("transaction {0} was reverted")]
	Reverted( String ),
	#[error("transaction {0} was not confirmed in time")]
	Unconfirmed( String )
}

pub type Result<T> = std::result::Result<T, Error>;



/// Converts a token amount to base units.
/// Fractions of a base unit are dropped.
pub fn to_wei( amount: Decimal ) -> Option<u128> {
	if amount.is_sign_negative() || amount.is_zero() { return None }

	amount.checked_mul( Decimal::from( WEI_PER_TOKEN ) )?
		.trunc()
		.to_u128()
}


/// Takes the result out of the response to request `id`.
fn read_response<T>( id: u64, response: RpcResponse<T> ) -> Result<Option<T>> {
	if let Some(e) = response.error {
		return Err( Error::Rpc { code: e.code, message: e.message } )
	}
	match response.id {
		Some(actual) if actual != id => Err( Error::MismatchedResponse { expected: id, actual } ),
		_ => Ok( response.result )
	}
}


impl RpcWallet {

	pub fn new( url: impl Into<String>, chain_id: impl Into<String>, wallet_type: impl Into<String>, confirmation_polls: u32, confirmation_interval: Duration ) -> Self {
		Self {
			client: reqwest::Client::new(),
			url: url.into(),
			chain_id: chain_id.into(),
			wallet_type: wallet_type.into(),
			confirmation_polls,
			confirmation_interval,
			next_request_id: AtomicU64::new( 1 )
		}
	}

	/// Performs one JSON-RPC call, and gives back its result.
	/// A `null` result is returned as `None`.
	async fn call<T>( &self, method: &'static str, params: serde_json::Value ) -> Result<Option<T>> where
		T: DeserializeOwned
	{
		let id = self.next_request_id.fetch_add( 1, Ordering::Relaxed );
		let request = RpcRequest::new( id, method, params );
		debug!(method, id, "calling wallet");

		let response: RpcResponse<T> = self.client.post( &self.url )
			.json( &request )
			.send().await?
			.error_for_status()?
			.json().await?;

		read_response( id, response )
	}

	async fn call_expect<T>( &self, method: &'static str, params: serde_json::Value ) -> Result<T> where
		T: DeserializeOwned
	{
		self.call( method, params ).await?
			.ok_or( Error::MissingResult( method ) )
	}

	async fn ensure_chain( &self ) -> Result<()> {
		let actual: String = self.call_expect( "eth_chainId", json!([]) ).await?;

		if !actual.eq_ignore_ascii_case( &self.chain_id ) {
			return Err( Error::WrongChain { expected: self.chain_id.clone(), actual } )
		}
		Ok(())
	}

	/// Sends the payment, and waits until it is included in a block.
	async fn pay( &self, payer: &Address, recipient: &Address, amount: Decimal ) -> Result<String> {
		let wei = to_wei( amount ).ok_or( Error::InvalidAmount( amount ) )?;
		self.ensure_chain().await?;

		let transaction = TransactionRequest {
			from: payer.to_string(),
			to: recipient.to_string(),
			value: format!("{:#x}", wei),
			gas: PAYMENT_GAS_LIMIT.to_owned()
		};
		let hash: String = self.call_expect( "eth_sendTransaction", json!([transaction]) ).await?;
		info!(%hash, %amount, "payment transaction sent, waiting for confirmation");

		for _ in 0..self.confirmation_polls {
			let receipt: Option<TransactionReceipt> = self.call( "eth_getTransactionReceipt", json!([hash]) ).await?;

			if let Some(receipt) = receipt {
				return match receipt.status.as_deref() {
					Some("0x1") => Ok( receipt.transaction_hash ),
					_ => Err( Error::Reverted( receipt.transaction_hash ) )
				}
			}
			actix_rt::time::sleep( self.confirmation_interval ).await;
		}

		Err( Error::Unconfirmed( hash ) )
	}
}



#[async_trait]
impl Wallet for RpcWallet {

	async fn request_accounts( &self ) -> Result<Vec<Address>> {
		let accounts: Vec<String> = self.call_expect( "eth_requestAccounts", json!([]) ).await?;
		if accounts.is_empty() { return Err( Error::NoAccounts ) }

		let addresses = accounts.iter()
			.map(|a| Address::parse( a ))
			.collect::<std::result::Result<Vec<_>, _>>()?;
		Ok( addresses )
	}

	fn wallet_type( &self ) -> &str {
		&self.wallet_type
	}
}

#[async_trait]
impl PaymentGate for RpcWallet {

	async fn request_payment( &self, payer: &Address, recipient: &Address, amount: Decimal ) -> bool {
		match self.pay( payer, recipient, amount ).await {
			Ok(hash) => {
				info!(%hash, payer = %payer, %amount, "payment confirmed");
				true
			},
			Err(e) => {
				warn!(payer = %payer, %amount, "payment failed: {}", e);
				false
			}
		}
	}
}



#[cfg(test)]
mod tests {
	use std::str::FromStr;

	use super::*;

	#[test]
	fn converts_token_amounts_to_wei() {
		assert_eq!( to_wei( Decimal::from_str("0.01").unwrap() ), Some( 10_000_000_000_000_000 ) );
		assert_eq!( to_wei( Decimal::from_str("0.005").unwrap() ), Some( 5_000_000_000_000_000 ) );
		assert_eq!( to_wei( Decimal::from(2) ), Some( 2_000_000_000_000_000_000 ) );
		assert_eq!( to_wei( Decimal::ZERO ), None );
		assert_eq!( to_wei( Decimal::from_str("-1").unwrap() ), None );
	}

	#[test]
	fn formats_wei_as_hex() {
		let wei = to_wei( Decimal::from_str("0.01").unwrap() ).unwrap();
		assert_eq!( format!("{:#x}", wei), "0x2386f26fc10000" );
	}

	#[test]
	fn responses_must_answer_the_request() {
		let answer = |id: Option<u64>| RpcResponse { id, result: Some( "0x4f6".to_owned() ), error: None };

		assert_eq!( read_response( 3, answer( Some(3) ) ).unwrap().as_deref(), Some("0x4f6") );
		assert_eq!( read_response( 3, answer( None ) ).unwrap().as_deref(), Some("0x4f6") );
		assert!( matches!( read_response( 3, answer( Some(4) ) ), Err( Error::MismatchedResponse { expected: 3, actual: 4 } ) ) );

		let rejected: RpcResponse<String> = RpcResponse {
			id: Some(3),
			result: None,
			error: Some( RpcError { code: 4001, message: "User rejected the request.".into() } )
		};
		assert!( matches!( read_response( 3, rejected ), Err( Error::Rpc { code: 4001, .. } ) ) );
	}

	#[actix_rt::test]
	async fn unreachable_wallets_decline_payments() {
		let wallet = RpcWallet::new( "http://127.0.0.1:9", "0x4f6", "Web3", 1, Duration::from_millis(1) );
		let payer = Address::parse("0xABC").unwrap();
		let recipient = Address::parse("0x601F9e84D3B5621131896dF22268B898729a259F").unwrap();

		assert!( !wallet.request_payment( &payer, &recipient, Decimal::from_str("0.01").unwrap() ).await );
		assert!( wallet.request_accounts().await.is_err() );
	}
}
