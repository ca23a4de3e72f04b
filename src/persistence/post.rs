//! The post collection: posts, their comments and likes.
//!
//! All posts live in one blob under [`POSTS_KEY`], newest first.

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info};

use crate::{
	common::{now, Address},
	persistence::{Batch, Handle, Result, POSTS_KEY},
	post::{Comment, Post}
};



const DEMO_AUTHOR: &str = "0x7890abcdef1234567890abcdef123456789012345";
const DEMO_COMMENTER: &str = "0x1234567890abcdef1234567890abcdef12345678";



impl Handle {

	/// Returns all posts, newest first.
	/// If there are none, the demonstration posts are stored and returned instead.
	pub fn list_posts( &self ) -> Result<Vec<Post>> {
		let posts: Vec<Post> = self.get( POSTS_KEY )?.unwrap_or_default();
		if !posts.is_empty() { return Ok( posts ) }

		// Another process may have seeded in the meantime.
		self.transact(|batch| {
			let posts = load_posts( batch )?;
			if !posts.is_empty() { return Ok( posts ) }

			let demo = demo_posts( now() );
			batch.set( POSTS_KEY, &demo )?;
			info!(count = demo.len(), "no posts found, seeded the demonstration posts");

			Ok( demo )
		})
	}

	/// Puts `post` in front of all other posts.
	pub fn append_post( &self, post: &Post ) -> Result<()> {

		self.transact(|batch| {
			let mut posts = load_posts( batch )?;
			posts.insert( 0, post.clone() );
			batch.set( POSTS_KEY, &posts )?;

			debug!(post_id = %post.id, author = %post.author, "stored post");
			Ok(())
		})
	}

	pub fn find_post_index( &self, post_id: &str ) -> Result<Option<usize>> {
		let posts: Vec<Post> = self.get( POSTS_KEY )?.unwrap_or_default();
		Ok( position( &posts, post_id ) )
	}

	pub fn find_post( &self, post_id: &str ) -> Result<Option<Post>> {
		let posts: Vec<Post> = self.get( POSTS_KEY )?.unwrap_or_default();
		Ok( posts.into_iter().find(|p| p.id == post_id) )
	}

	/// All posts written by `author`, newest first.
	pub fn posts_by_author( &self, author: &Address ) -> Result<Vec<Post>> {
		let posts: Vec<Post> = self.get( POSTS_KEY )?.unwrap_or_default();
		Ok( posts.into_iter().filter(|p| &p.author == author).collect() )
	}

	/// Changes the post with the given id through `change`, and stores the collection again.
	/// If no such post exists, nothing is written and `None` is returned.
	pub fn update_post<F, R>( &self, post_id: &str, change: F ) -> Result<Option<R>> where
		F: FnOnce( &mut Post ) -> R
	{
		self.transact(|batch| {
			let mut posts = load_posts( batch )?;
			let index = match position( &posts, post_id ) {
				None => {
					debug!(post_id, "post not found, nothing changed");
					return Ok( None )
				},
				Some(i) => i
			};

			let result = change( &mut posts[index] );
			batch.set( POSTS_KEY, &posts )?;

			Ok( Some( result ) )
		})
	}

	/// Appends `comment` to the comments of the post.
	/// Returns whether the post was found.
	pub fn append_comment( &self, post_id: &str, comment: &Comment ) -> Result<bool> {

		let found = self.update_post( post_id, |post| {
			post.comments.push( comment.clone() );
		})?;

		Ok( found.is_some() )
	}

	/// Adds or removes `address` from the likes of the post.
	/// Returns whether `address` likes the post afterwards, or `None` if the post doesn't exist.
	pub fn toggle_like( &self, post_id: &str, address: &Address ) -> Result<Option<bool>> {
		self.update_post( post_id, |post| post.toggle_like( address ) )
	}

	pub fn set_post_replication_id( &self, post_id: &str, replication_id: &str ) -> Result<bool> {

		let found = self.update_post( post_id, |post| {
			post.replication_id = Some( replication_id.to_owned() );
		})?;

		Ok( found.is_some() )
	}

	/// Returns whether both the post and the comment were found.
	pub fn set_comment_replication_id( &self, post_id: &str, comment_id: &str, replication_id: &str ) -> Result<bool> {

		let found = self.update_post( post_id, |post| {
			match post.comments.iter_mut().find(|c| c.id == comment_id) {
				None => false,
				Some(comment) => {
					comment.replication_id = Some( replication_id.to_owned() );
					true
				}
			}
		})?;

		Ok( found.unwrap_or(false) )
	}
}



pub(crate) fn load_posts( batch: &Batch<'_> ) -> Result<Vec<Post>> {
	Ok( batch.get( POSTS_KEY )?.unwrap_or_default() )
}

pub(crate) fn position( posts: &[Post], post_id: &str ) -> Option<usize> {
	posts.iter().position(|p| p.id == post_id)
}

/// The posts shown to someone who opens an empty board.
fn demo_posts( now: DateTime<Utc> ) -> Vec<Post> {
	let author = Address::from_static( DEMO_AUTHOR );
	let commenter = Address::from_static( DEMO_COMMENTER );

	vec![
		Post {
			id: "1000001".into(),
			title: "Welcome to PayThreads!".into(),
			content: "This is a demonstration board for discussions backed by a wallet. You can create posts, comment and vote on what others write. Posts and comments are mirrored to decentralized storage whenever it is available.".into(),
			author: author.clone(),
			created_at: now - Duration::days(2),
			votes: 15,
			likes: Vec::new(),
			comments: vec![
				Comment {
					id: "c1001".into(),
					post_id: "1000001".into(),
					author: commenter.clone(),
					text: "Great platform! I really like the idea of decentralized storage.".into(),
					created_at: now - Duration::hours(12),
					paid: false,
					payment_amount: None,
					replication_id: None
				}
			],
			replication_id: None
		},
		Post {
			id: "1000002".into(),
			title: "How to use a browser wallet".into(),
			content: "Install a wallet extension such as Rabby or MetaMask, create a new wallet or import an existing one, and connect it here. Posting and commenting cost a small amount of tokens.".into(),
			author,
			created_at: now - Duration::days(1),
			votes: 8,
			likes: Vec::new(),
			comments: Vec::new(),
			replication_id: None
		},
		Post {
			id: "1000003".into(),
			title: "What is content-addressed storage?".into(),
			content: "Content-addressed storage identifies data by what it contains instead of where it lives. Once uploaded, a record can't be changed without changing its identifier, which makes it a good fit for keeping a permanent copy of a discussion.".into(),
			author: commenter,
			created_at: now - Duration::days(2),
			votes: 12,
			likes: Vec::new(),
			comments: Vec::new(),
			replication_id: None
		}
	]
}
