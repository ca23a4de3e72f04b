use tracing::debug;

use crate::{
	common::Address,
	persistence::{
		post::{load_posts, position},
		votes_key,
		Handle,
		Result,
		POSTS_KEY
	},
	vote::{Vote, VoteRecord}
};



impl Handle {

	/// The votes `address` has cast that are still active.
	pub fn vote_record( &self, address: &Address ) -> Result<VoteRecord> {
		Ok( self.get( &votes_key( address ) )?.unwrap_or_default() )
	}

	/// Casts `vote` on the post on behalf of `address`.
	///
	/// Casting the same vote again retracts it.
	/// Casting the opposite vote replaces the earlier one, so the score moves by two.
	/// Returns the new score of the post, or `None` if the post doesn't exist.
	pub fn apply_vote( &self, post_id: &str, address: &Address, vote: Vote ) -> Result<Option<i64>> {
		let key = votes_key( address );

		self.transact(|batch| {
			let mut posts = load_posts( batch )?;
			let post = match position( &posts, post_id ) {
				None => return Ok( None ),
				Some(i) => &mut posts[i]
			};
			let mut record: VoteRecord = batch.get( &key )?.unwrap_or_default();

			match record.get( post_id ).copied() {
				Some(previous) if previous == vote => {
					post.votes -= vote.value();
					record.remove( post_id );
				},
				previous => {
					if let Some(previous) = previous {
						post.votes -= previous.value();
					}
					post.votes += vote.value();
					record.insert( post_id.to_owned(), vote );
				}
			}

			let score = post.votes;
			batch.set( POSTS_KEY, &posts )?;
			batch.set( &key, &record )?;
			debug!(post_id, voter = %address, %vote, score, "applied vote");

			Ok( Some( score ) )
		})
	}
}
