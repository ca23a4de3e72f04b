use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Serialize, Deserialize};
use thiserror::Error;

use crate::common::Address;



/// The reasons user input can't be turned into a post or comment.
#[derive(Debug, Error, PartialEq)]
pub enum ContentError {
	#[error("the title of a post can't be empty")]
	EmptyTitle,
	#[error("the content of a post can't be empty")]
	EmptyContent,
	#[error("a comment can't be empty")]
	EmptyComment
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
	pub id: String,
	pub title: String,
	pub content: String,
	pub author: Address,
	pub created_at: DateTime<Utc>,
	/// The sum of all votes that are still active on this post.
	#[serde(default)]
	pub votes: i64,
	/// Everyone who likes this post, each at most once.
	#[serde(default)]
	pub likes: Vec<Address>,
	#[serde(default)]
	pub comments: Vec<Comment>,
	/// The identifier the post got on the replication network, if it was mirrored.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub replication_id: Option<String>
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
	pub id: String,
	pub post_id: String,
	pub author: Address,
	pub text: String,
	pub created_at: DateTime<Utc>,
	#[serde(default)]
	pub paid: bool,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub payment_amount: Option<Decimal>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub replication_id: Option<String>
}



impl Post {

	/// Composes a new post that has no votes, likes or comments yet.
	/// Title and content are trimmed, and must not end up empty.
	pub fn compose( id: String, author: Address, title: &str, content: &str, created_at: DateTime<Utc> ) -> Result<Self, ContentError> {
		let title = title.trim();
		let content = content.trim();

		if title.is_empty() { return Err( ContentError::EmptyTitle ) }
		if content.is_empty() { return Err( ContentError::EmptyContent ) }

		Ok( Self {
			id,
			title: title.to_owned(),
			content: content.to_owned(),
			author,
			created_at,
			votes: 0,
			likes: Vec::new(),
			comments: Vec::new(),
			replication_id: None
		})
	}

	pub fn is_liked_by( &self, address: &Address ) -> bool {
		self.likes.contains( address )
	}

	/// Adds `address` to the likes if it isn't there, removes it otherwise.
	/// Returns whether the address likes the post afterwards.
	pub fn toggle_like( &mut self, address: &Address ) -> bool {
		match self.likes.iter().position(|a| a == address) {
			None => {
				self.likes.push( address.clone() );
				true
			},
			Some(index) => {
				self.likes.remove( index );
				false
			}
		}
	}
}

impl Comment {

	/// Composes a comment for which `payment_amount` tokens were paid.
	pub fn compose( id: String, post_id: &str, author: Address, text: &str, payment_amount: Decimal, created_at: DateTime<Utc> ) -> Result<Self, ContentError> {
		let text = text.trim();
		if text.is_empty() { return Err( ContentError::EmptyComment ) }

		Ok( Self {
			id,
			post_id: post_id.to_owned(),
			author,
			text: text.to_owned(),
			created_at,
			paid: true,
			payment_amount: Some( payment_amount ),
			replication_id: None
		})
	}
}
