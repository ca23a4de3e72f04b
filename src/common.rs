use std::{
	fmt,
	str::FromStr,
	sync::atomic::{AtomicI64, Ordering}
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;



/// A wallet address, the identity of a user.
///
/// Only the shape `0x` followed by hexadecimal digits is checked.
/// Addresses are compared as exact strings, so `0xab` and `0xAB` are different users.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Address( String );

#[derive(Debug, Error, PartialEq)]
pub enum AddressError {
	#[error("wallet address is empty")]
	Empty,
	#[error("wallet address {0:?} does not start with 0x")]
	MissingPrefix( String ),
	#[error("wallet address {0:?} contains non-hexadecimal characters")]
	NotHex( String )
}



static LAST_ISSUED_ID: AtomicI64 = AtomicI64::new( 0 );



impl Address {

	pub fn parse( input: &str ) -> Result<Self, AddressError> {
		let input = input.trim();
		if input.is_empty() { return Err( AddressError::Empty ) }

		let digits = input.strip_prefix("0x")
			.or_else(|| input.strip_prefix("0X"))
			.ok_or_else(|| AddressError::MissingPrefix( input.to_owned() ))?;

		if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
			return Err( AddressError::NotHex( input.to_owned() ) )
		}

		Ok( Self( input.to_owned() ) )
	}

	/// For addresses that are known to be well-formed when the program is written.
	pub(crate) fn from_static( address: &'static str ) -> Self {
		debug_assert!( Self::parse( address ).is_ok(), "malformed address {}", address );
		Self( address.to_owned() )
	}

	pub fn as_str( &self ) -> &str {
		&self.0
	}
}

impl fmt::Display for Address {
	fn fmt( &self, f: &mut fmt::Formatter<'_> ) -> fmt::Result {
		f.write_str( &self.0 )
	}
}

impl FromStr for Address {
	type Err = AddressError;

	fn from_str( s: &str ) -> Result<Self, Self::Err> {
		Self::parse( s )
	}
}

impl<'de> Deserialize<'de> for Address {
	fn deserialize<D>( deserializer: D ) -> Result<Self, D::Error> where
		D: Deserializer<'de>
	{
		let raw = String::deserialize( deserializer )?;
		Self::parse( &raw ).map_err( serde::de::Error::custom )
	}
}



pub fn now() -> DateTime<Utc> {
	Utc::now()
}

/// Generates an identifier from the current time in milliseconds.
///
/// Two calls within the same millisecond get consecutive numbers, so identifiers issued by one process never collide.
pub fn time_derived_id() -> String {
	let now = Utc::now().timestamp_millis();
	let mut last = LAST_ISSUED_ID.load( Ordering::Relaxed );

	loop {
		let next = if now > last { now } else { last + 1 };
		match LAST_ISSUED_ID.compare_exchange_weak( last, next, Ordering::Relaxed, Ordering::Relaxed ) {
			Ok(_) => return next.to_string(),
			Err(current) => last = current
		}
	}
}

/// The form shown in the interface: the first two characters, an ellipsis, and the last five characters.
/// Addresses shorter than five characters are repeated whole after the ellipsis.
pub fn short_address( address: &str ) -> String {
	if address.is_empty() { return String::new() }

	let chars: Vec<char> = address.chars().collect();
	let prefix: String = chars.iter().take( 2 ).collect();
	let suffix: String = chars[chars.len().saturating_sub( 5 )..].iter().collect();

	format!("{}...{}", prefix, suffix)
}

/// Describes how long ago `then` was, relative to `now`.
pub fn time_ago( then: DateTime<Utc>, now: DateTime<Utc> ) -> String {
	let seconds = (now - then).num_milliseconds() as f64 / 1000.0;
	let seconds = seconds.round();
	let minutes = (seconds / 60.0).round();
	let hours = (minutes / 60.0).round();
	let days = (hours / 24.0).round();

	if seconds < 60.0 {
		format!("{} sec ago", seconds.max(0.0) as i64)
	}
	else if minutes < 60.0 {
		format!("{} min ago", minutes as i64)
	}
	else if hours < 24.0 {
		format!("{} h ago", hours as i64)
	}
	else if days < 30.0 {
		format!("{} d ago", days as i64)
	}
	else {
		then.format("%Y-%m-%d").to_string()
	}
}
