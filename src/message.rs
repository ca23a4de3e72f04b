//! This module contains the messages exchanged with the wallet and the replication network.
//! So JSON-RPC requests and responses for the wallet, and uploads for the replication network.

use serde::*;
use serde_json::Value;



pub const JSON_RPC_VERSION: &str = "2.0";

#[derive(Clone, Debug, Serialize)]
pub struct RpcRequest<'a> {
	pub jsonrpc: &'static str,
	pub id: u64,
	pub method: &'a str,
	pub params: Value
}

#[derive(Clone, Debug, Deserialize)]
pub struct RpcResponse<T> {
	#[serde(default)]
	pub id: Option<u64>,
	/// Absent when `error` is given, `null` for calls that have no result yet.
	#[serde(default = "Option::default")]
	pub result: Option<T>,
	#[serde(default)]
	pub error: Option<RpcError>
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct RpcError {
	pub code: i64,
	pub message: String
}

/// The transaction the wallet is asked to sign and submit.
/// All quantities are hexadecimal, as the JSON-RPC interface expects.
#[derive(Clone, Debug, Serialize)]
pub struct TransactionRequest {
	pub from: String,
	pub to: String,
	pub value: String,
	pub gas: String
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionReceipt {
	pub transaction_hash: String,
	/// `0x1` for success, `0x0` for a reverted transaction.
	#[serde(default)]
	pub status: Option<String>
}

/// A name/value pair that describes an uploaded record.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct Tag {
	pub name: String,
	pub value: String
}

#[derive(Clone, Debug, Serialize)]
pub struct UploadRequest<'a> {
	/// The record, serialized as JSON.
	pub data: String,
	pub tags: &'a [Tag]
}

#[derive(Clone, Debug, Deserialize)]
pub struct UploadReceipt {
	pub id: String
}



impl<'a> RpcRequest<'a> {

	pub fn new( id: u64, method: &'a str, params: Value ) -> Self {
		Self {
			jsonrpc: JSON_RPC_VERSION,
			id,
			method,
			params
		}
	}
}

impl Tag {

	pub fn new( name: impl Into<String>, value: impl Into<String> ) -> Self {
		Self {
			name: name.into(),
			value: value.into()
		}
	}
}
