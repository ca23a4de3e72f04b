use std::{
	fmt::Display,
	path::PathBuf,
	str::FromStr,
	time::Duration
};

use rust_decimal::Decimal;
use thiserror::Error;

use crate::{
	common::Address,
	threads::Pricing
};



pub const DEFAULT_PAYMENT_RECIPIENT: &str = "0x601F9e84D3B5621131896dF22268B898729a259F";
/// 1270, the chain the payment tokens live on.
pub const DEFAULT_CHAIN_ID: &str = "0x4f6";

pub struct Config {
	/// Which messages we want to log
	pub log_level: String,

	/// Address the web interface is listening on
	pub server_ip_port: String,
	/// Pages that may submit forms to the web interface, as `scheme://host:port`
	pub allow_origins: Vec<String>,
	pub database_path: PathBuf,

	pub wallet_rpc_url: String,
	pub wallet_type: String,
	pub chain_id: String,
	pub confirmation_polls: u32,
	pub confirmation_interval: Duration,

	pub payment_recipient: Address,
	pub post_price: Decimal,
	pub comment_price: Decimal,

	/// Replication is disabled when this is not set.
	pub replication_url: Option<String>
}

#[derive(Debug, Error)]
#[error("invalid value {value:?} for {name}: {reason}")]
pub struct ConfigError {
	pub name: &'static str,
	pub value: String,
	pub reason: String
}



impl Config {

	/// Reads the configuration from the environment, and from a `.env` file if there is one.
	pub fn new() -> Result<Config, ConfigError> {
		dotenv::dotenv().ok();
		Self::from_lookup(|name| std::env::var( name ).ok())
	}

	pub fn from_lookup<L>( lookup: L ) -> Result<Config, ConfigError> where
		L: Fn(&str) -> Option<String>
	{
		let var = |name: &str, default: &str| lookup( name ).unwrap_or_else(|| default.to_owned());

		let post_price: Decimal = parse( "POST_PRICE", var("POST_PRICE", "0.01") )?;
		let comment_price: Decimal = parse( "COMMENT_PRICE", var("COMMENT_PRICE", "0.005") )?;
		for &(name, price) in &[("POST_PRICE", post_price), ("COMMENT_PRICE", comment_price)] {
			if price.is_sign_negative() || price.is_zero() {
				return Err( ConfigError {
					name,
					value: price.to_string(),
					reason: "a price must be positive".into()
				})
			}
		}

		let server_ip_port = var("SERVER_IP_PORT", "127.0.0.1:7777");
		let allow_origins = match lookup("ALLOW_ORIGINS") {
			Some(origins) => origins.split(',')
				.map(|o| o.trim().trim_end_matches('/').to_owned())
				.filter(|o| !o.is_empty())
				.collect(),
			None => default_origins( &server_ip_port )
		};

		let interval_ms: u64 = parse( "CONFIRMATION_INTERVAL_MS", var("CONFIRMATION_INTERVAL_MS", "2000") )?;

		Ok(Config {
			log_level: var("LOG_LEVEL", "warn"),
			server_ip_port,
			allow_origins,
			database_path: PathBuf::from( var("DATABASE_PATH", "threads.sqlite") ),
			wallet_rpc_url: var("WALLET_RPC_URL", "http://127.0.0.1:8545"),
			wallet_type: var("WALLET_TYPE", "Web3"),
			chain_id: var("CHAIN_ID", DEFAULT_CHAIN_ID),
			confirmation_polls: parse( "CONFIRMATION_POLLS", var("CONFIRMATION_POLLS", "60") )?,
			confirmation_interval: Duration::from_millis( interval_ms ),
			payment_recipient: parse( "PAYMENT_RECIPIENT", var("PAYMENT_RECIPIENT", DEFAULT_PAYMENT_RECIPIENT) )?,
			post_price,
			comment_price,
			replication_url: lookup("REPLICATION_URL").filter(|url| !url.trim().is_empty())
		})
	}

	pub fn pricing( &self ) -> Pricing {
		Pricing {
			recipient: self.payment_recipient.clone(),
			post_price: self.post_price,
			comment_price: self.comment_price
		}
	}
}

/// The origins the interface itself is served from.
/// A loopback address is also reachable as `localhost`.
fn default_origins( server_ip_port: &str ) -> Vec<String> {
	let mut origins = vec![format!("http://{}", server_ip_port)];
	if let Some(port) = server_ip_port.strip_prefix("127.0.0.1:") {
		origins.push( format!("http://localhost:{}", port) );
	}
	origins
}

fn parse<T>( name: &'static str, value: String ) -> Result<T, ConfigError> where
	T: FromStr,
	T::Err: Display
{
	value.trim().parse().map_err(|e: T::Err| ConfigError {
		name,
		reason: e.to_string(),
		value
	})
}
