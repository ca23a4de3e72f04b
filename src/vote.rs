use std::{
	collections::BTreeMap,
	fmt
};

use serde::*;

use crate::int_enum;



int_enum! {
	/// A vote cast on a post.
	#[derive(Clone, Copy, Debug, PartialEq, Eq)]
	pub enum Vote: i8 {
		Up = 1,
		Down = -1
	}
}
struct VoteVisitor;

/// The votes an address has cast, keyed by post id.
/// This is the only place that remembers whether, and how, someone voted on a post.
pub type VoteRecord = BTreeMap<String, Vote>;



impl Vote {

	pub fn value( self ) -> i64 {
		i8::from( self ) as i64
	}
}



impl fmt::Display for Vote {
	fn fmt( &self, f: &mut fmt::Formatter<'_> ) -> fmt::Result {
		write!( f, "{:+}", self.value() )
	}
}

impl Serialize for Vote {
	fn serialize<S>( &self, serializer: S ) -> Result<S::Ok, S::Error> where
		S: Serializer
	{
		serializer.serialize_i8( (*self).into() )
	}
}

impl<'de> Deserialize<'de> for Vote {
	fn deserialize<D>( deserializer: D ) -> Result<Self, D::Error> where
		D: Deserializer<'de>
	{
		deserializer.deserialize_i64( VoteVisitor )
	}
}

impl<'de> de::Visitor<'de> for VoteVisitor {

	type Value = Vote;

	fn expecting( &self, formatter: &mut fmt::Formatter ) -> fmt::Result {
		formatter.write_str("a vote of 1 or -1")
	}

	fn visit_i64<E>( self, v: i64 ) -> Result<Self::Value, E> where
		E: de::Error
	{
		i8::try_from( v ).ok()
			.and_then(|v| Vote::try_from( v ).ok())
			.ok_or_else(|| E::invalid_value( de::Unexpected::Signed( v ), &self ))
	}

	fn visit_u64<E>( self, v: u64 ) -> Result<Self::Value, E> where
		E: de::Error
	{
		match i64::try_from( v ) {
			Ok(v) => self.visit_i64( v ),
			Err(_) => Err( E::invalid_value( de::Unexpected::Unsigned( v ), &self ) )
		}
	}
}
