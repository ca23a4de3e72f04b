//! Best-effort mirroring of records to a content-addressed storage network.
//!
//! Replication never decides whether a change happens: records are stored locally first,
//!  and a failed upload only means the record stays local.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::{
	common::Address,
	message::*,
	post::{Comment, Post}
};



pub const APP_NAME: &str = "PayThreads";
pub const CONTENT_TYPE_JSON: &str = "application/json";

#[async_trait]
pub trait Replicator: Send + Sync {
	/// Uploads `payload` with the given `tags`.
	/// Returns the identifier of the upload, or `None` if the network was unavailable or the upload failed.
	async fn store( &self, payload: &Value, tags: Vec<Tag> ) -> Option<String>;
}

/// Used when no replication network is configured.
pub struct Disabled;

/// Uploads records to a gateway over HTTP.
pub struct HttpReplicator {
	client: reqwest::Client,
	url: String
}

#[derive(Debug, Error)]
pub enum Error {
	#[error("HTTP error: {0}")]
	Http( #[from] reqwest::Error ),
	#[error("unable to serialize the payload: {0}")]
	Serialization( #[from] serde_json::Error ),
	#[error("the gateway returned an empty identifier")]
	EmptyId
}



/// The tags every upload starts with.
pub fn base_tags() -> Vec<Tag> {
	vec![
		Tag::new( "App-Name", APP_NAME ),
		Tag::new( "Content-Type", CONTENT_TYPE_JSON ),
		Tag::new( "Unix-Time", Utc::now().timestamp_millis().to_string() )
	]
}

pub fn post_tags( post: &Post ) -> Vec<Tag> {
	vec![
		Tag::new( "Data-Type", "post" ),
		Tag::new( "Post-Title", post.title.clone() ),
		Tag::new( "Author", post.author.to_string() )
	]
}

pub fn comment_tags( comment: &Comment ) -> Vec<Tag> {
	vec![
		Tag::new( "Data-Type", "comment" ),
		Tag::new( "Post-ID", comment.post_id.clone() ),
		Tag::new( "Author", comment.author.to_string() )
	]
}

pub fn likes_update_tags( post: &Post ) -> Vec<Tag> {
	vec![
		Tag::new( "Data-Type", "post-update" ),
		Tag::new( "Post-ID", post.id.clone() ),
		Tag::new( "Update-Type", "likes" )
	]
}

pub fn new_profile_tags( address: &Address ) -> Vec<Tag> {
	vec![
		Tag::new( "Data-Type", "user-profile" ),
		Tag::new( "User-Address", address.to_string() )
	]
}

pub fn profile_update_tags( address: &Address ) -> Vec<Tag> {
	vec![
		Tag::new( "Data-Type", "user-profile-update" ),
		Tag::new( "User-Address", address.to_string() )
	]
}



impl HttpReplicator {

	/// `url` is the base address of the gateway; uploads go to `<url>/upload`.
	pub fn new( url: &str ) -> Self {
		Self {
			client: reqwest::Client::new(),
			url: format!("{}/upload", url.trim_end_matches('/'))
		}
	}

	async fn upload( &self, payload: &Value, tags: &[Tag] ) -> Result<String, Error> {
		let request = UploadRequest {
			data: serde_json::to_string( payload )?,
			tags
		};

		let receipt: UploadReceipt = self.client.post( &self.url )
			.json( &request )
			.send().await?
			.error_for_status()?
			.json().await?;

		if receipt.id.is_empty() { return Err( Error::EmptyId ) }
		Ok( receipt.id )
	}
}



#[async_trait]
impl Replicator for Disabled {

	async fn store( &self, _payload: &Value, _tags: Vec<Tag> ) -> Option<String> {
		debug!("replication is not configured, keeping the record local");
		None
	}
}

#[async_trait]
impl Replicator for HttpReplicator {

	async fn store( &self, payload: &Value, tags: Vec<Tag> ) -> Option<String> {
		let mut all_tags = base_tags();
		all_tags.extend( tags );

		match self.upload( payload, &all_tags ).await {
			Ok(id) => {
				debug!(%id, "record replicated");
				Some( id )
			},
			Err(e) => {
				warn!(url = %self.url, "replication failed, keeping the record local: {}", e);
				None
			}
		}
	}
}
