//! The actions a user can take on the board.
//!
//! Each action checks who is acting and what they submitted, asks for payment where posting costs tokens,
//!  changes the local store, and only then mirrors the result to the replication network.

use std::{
	collections::HashMap,
	sync::Arc
};

use actix_web::web;
use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
	common::{now, time_derived_id, Address},
	message::Tag,
	persistence,
	post::{Comment, ContentError, Post},
	profile::{Profile, ProfilePatch},
	replication::{self, Replicator},
	vote::Vote,
	wallet::{self, PaymentGate, Wallet}
};



/// What posting and commenting cost, and who gets paid.
#[derive(Clone, Debug)]
pub struct Pricing {
	pub recipient: Address,
	pub post_price: Decimal,
	pub comment_price: Decimal
}

pub struct Threads {
	store: persistence::Handle,
	wallet: Arc<dyn Wallet>,
	payments: Arc<dyn PaymentGate>,
	replicator: Arc<dyn Replicator>,
	pricing: Pricing
}

pub struct Feed {
	pub posts: Vec<Post>,
	pub viewer: Option<Address>,
	/// Display names of everyone who has set one.
	pub names: HashMap<Address, String>
}

pub struct ProfilePage {
	pub address: Address,
	/// `None` until the wallet is connected through this board for the first time.
	pub profile: Option<Profile>,
	pub posts: Vec<Post>
}

#[derive(Debug, Error)]
pub enum Error {
	#[error("connect your wallet first")]
	NotConnected,
	#[error("the payment of {amount} tokens did not go through")]
	PaymentDeclined { amount: Decimal },
	#[error("{0}")]
	Validation( #[from] ContentError ),
	#[error("the storage worker is unavailable")]
	StorageUnavailable,
	#[error("unable to connect the wallet: {0}")]
	Wallet( #[from] wallet::Error ),
	#[error(transparent)]
	Persistence( #[from] persistence::Error )
}

pub type Result<T> = std::result::Result<T, Error>;



impl Threads {

	pub fn new( store: persistence::Handle, wallet: Arc<dyn Wallet>, payments: Arc<dyn PaymentGate>, replicator: Arc<dyn Replicator>, pricing: Pricing ) -> Self {
		Self {
			store,
			wallet,
			payments,
			replicator,
			pricing
		}
	}

	pub fn store( &self ) -> &persistence::Handle {
		&self.store
	}

	pub fn pricing( &self ) -> &Pricing {
		&self.pricing
	}

	/// Runs `work` on the blocking thread pool, so a busy database never stalls the request workers.
	async fn storage<F, R>( &self, work: F ) -> Result<R> where
		F: FnOnce( &persistence::Handle ) -> persistence::Result<R> + Send + 'static,
		R: Send + 'static
	{
		let store = self.store.clone();
		let result = web::block( move || work( &store ) ).await
			.map_err(|_| Error::StorageUnavailable)?;

		Ok( result? )
	}

	async fn require_identity( &self ) -> Result<Address> {
		self.storage(|store| store.connected_address()).await?
			.ok_or( Error::NotConnected )
	}

	async fn charge( &self, payer: &Address, amount: Decimal ) -> Result<()> {
		debug!(payer = %payer, %amount, "requesting payment");

		if !self.payments.request_payment( payer, &self.pricing.recipient, amount ).await {
			info!(payer = %payer, %amount, "payment not completed, nothing was stored");
			return Err( Error::PaymentDeclined { amount } )
		}
		Ok(())
	}

	/// Mirrors `record`, returning its identifier on the replication network if that worked.
	async fn replicate<T>( &self, record: &T, tags: Vec<Tag> ) -> Option<String> where
		T: Serialize
	{
		let payload = match serde_json::to_value( record ) {
			Ok(payload) => payload,
			Err(e) => {
				warn!("unable to serialize record for replication: {}", e);
				return None
			}
		};

		self.replicator.store( &payload, tags ).await
	}

	/// Connects the wallet, and gives the address a profile if it doesn't have one yet.
	pub async fn connect_wallet( &self ) -> Result<Address> {
		let address = self.wallet.request_accounts().await?
			.into_iter().next()
			.ok_or( wallet::Error::NoAccounts )?;
		let wallet_type = self.wallet.wallet_type().to_owned();

		let connected = address.clone();
		let (profile, created) = self.storage( move |store| {
			store.connect( &connected, &wallet_type )?;
			store.ensure_profile( &connected )
		}).await?;

		if created {
			if let Some(id) = self.replicate( &profile, replication::new_profile_tags( &address ) ).await {
				let owner = address.clone();
				if let Err(e) = self.storage( move |store| store.set_profile_replication_id( &owner, &id ) ).await {
					warn!(address = %address, "unable to record replication id: {}", e);
				}
			}
		}

		Ok( address )
	}

	pub async fn disconnect_wallet( &self ) -> Result<()> {
		self.storage(|store| store.disconnect()).await
	}

	pub async fn feed( &self ) -> Result<Feed> {

		self.storage(|store| {
			let names = store.profiles()?
				.into_iter()
				.filter(|p| !p.display_name.is_empty())
				.map(|p| (p.address, p.display_name))
				.collect();

			Ok( Feed {
				posts: store.list_posts()?,
				viewer: store.connected_address()?,
				names
			})
		}).await
	}

	/// Publishes a post after the author has paid for it.
	/// Nothing is stored if the payment doesn't go through.
	pub async fn create_post( &self, title: &str, content: &str ) -> Result<Post> {
		let author = self.require_identity().await?;
		let mut post = Post::compose( time_derived_id(), author.clone(), title, content, now() )?;

		self.charge( &author, self.pricing.post_price ).await?;

		let stored = post.clone();
		self.storage( move |store| store.append_post( &stored ) ).await?;
		info!(post_id = %post.id, author = %author, "post published");

		if let Some(id) = self.replicate( &post, replication::post_tags( &post ) ).await {
			let (post_id, replication_id) = (post.id.clone(), id.clone());
			match self.storage( move |store| store.set_post_replication_id( &post_id, &replication_id ) ).await {
				Ok(_) => post.replication_id = Some( id ),
				Err(e) => warn!(post_id = %post.id, "unable to record replication id {}: {}", id, e)
			}
		}

		Ok( post )
	}

	/// Adds a paid comment to a post.
	/// Commenting on a post that doesn't exist does nothing, and costs nothing.
	pub async fn add_comment( &self, post_id: &str, text: &str ) -> Result<Option<Comment>> {
		let author = self.require_identity().await?;
		let amount = self.pricing.comment_price;
		let mut comment = Comment::compose( time_derived_id(), post_id, author.clone(), text, amount, now() )?;

		let target = post_id.to_owned();
		if self.storage( move |store| store.find_post_index( &target ) ).await?.is_none() {
			debug!(post_id, "post not found, comment dropped");
			return Ok( None )
		}

		self.charge( &author, amount ).await?;

		let (target, stored) = (post_id.to_owned(), comment.clone());
		if !self.storage( move |store| store.append_comment( &target, &stored ) ).await? {
			return Ok( None )
		}
		info!(post_id, comment_id = %comment.id, author = %author, "comment published");

		if let Some(id) = self.replicate( &comment, replication::comment_tags( &comment ) ).await {
			let (target, comment_id, replication_id) = (post_id.to_owned(), comment.id.clone(), id.clone());
			match self.storage( move |store| store.set_comment_replication_id( &target, &comment_id, &replication_id ) ).await {
				Ok(_) => comment.replication_id = Some( id ),
				Err(e) => warn!(comment_id = %comment.id, "unable to record replication id {}: {}", id, e)
			}
		}

		Ok( Some( comment ) )
	}

	/// Likes or unlikes a post.
	/// Returns whether the connected address likes the post afterwards, or `None` if there is no such post.
	pub async fn toggle_like( &self, post_id: &str ) -> Result<Option<bool>> {
		let address = self.require_identity().await?;

		let target = post_id.to_owned();
		let toggled = self.storage( move |store| {
			Ok( match store.toggle_like( &target, &address )? {
				None => None,
				Some(liked) => Some( (liked, store.find_post( &target )?) )
			})
		}).await?;

		let (liked, post) = match toggled {
			None => return Ok( None ),
			Some(toggled) => toggled
		};

		if let Some(post) = post.filter(|p| p.replication_id.is_some()) {
			self.replicate( &post, replication::likes_update_tags( &post ) ).await;
		}

		Ok( Some( liked ) )
	}

	/// Returns the new score of the post, or `None` if there is no such post.
	pub async fn vote( &self, post_id: &str, vote: Vote ) -> Result<Option<i64>> {
		let address = self.require_identity().await?;

		let target = post_id.to_owned();
		self.storage( move |store| store.apply_vote( &target, &address, vote ) ).await
	}

	pub async fn save_profile( &self, patch: ProfilePatch ) -> Result<Profile> {
		let address = self.require_identity().await?;

		let owner = address.clone();
		let profile = self.storage( move |store| store.upsert_profile( &owner, patch ) ).await?;
		info!(address = %address, "profile saved");

		self.replicate( &profile, replication::profile_update_tags( &address ) ).await;

		Ok( profile )
	}

	pub async fn profile( &self ) -> Result<ProfilePage> {
		let address = self.require_identity().await?;

		self.storage( move |store| Ok( ProfilePage {
			profile: store.load_profile( &address )?,
			posts: store.posts_by_author( &address )?,
			address
		})).await
	}
}
