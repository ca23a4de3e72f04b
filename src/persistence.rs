//! The local key-value store that holds the canonical copy of all posts, votes and profiles.
//!
//! Every value is a JSON blob stored under a named key, like a browser's local storage.
//! Mutations read a blob, change it in memory and write it back inside one immediate transaction,
//!  so two processes that share a database file take turns instead of overwriting each other.

use std::{
	ops::{Deref, DerefMut},
	path::Path,
	sync::{Arc, Mutex, MutexGuard},
	time::Duration
};

use fallible_iterator::FallibleIterator;
use rusqlite::{self, params, OptionalExtension, Params, TransactionBehavior};
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;
use tracing::trace;

use crate::common::Address;

pub mod post;
pub mod profile;
pub mod session;
pub mod vote;



pub const POSTS_KEY: &str = "posts";
pub const WALLET_ADDRESS_KEY: &str = "walletAddress";
pub const WALLET_TYPE_KEY: &str = "walletType";
pub const USER_KEY_PREFIX: &str = "user_";
pub const VOTES_KEY_PREFIX: &str = "votes_";

/// How long a writer waits for another process to finish its transaction.
const BUSY_TIMEOUT: Duration = Duration::from_secs( 5 );

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS kv (key TEXT PRIMARY KEY NOT NULL, value TEXT NOT NULL)";

pub struct Connection ( rusqlite::Connection );

#[derive(Clone)]
pub struct Handle {
	db: Arc<Mutex<Connection>>
}

/// A view on the store for the duration of one transaction.
pub struct Batch<'t> {
	con: &'t rusqlite::Connection
}

#[derive(Debug, Error)]
pub enum Error {
	/// A SQL error
	#[error("database error: {0}")]
	Database( #[from] rusqlite::Error ),
	/// The blob under `key` could not be (de)serialized.
	#[error("(de)serialization error for key {key:?}: {source}")]
	Serialization {
		key: String,
		source: serde_json::Error
	},
	/// Another thread panicked while it was using the database.
	#[error("database connection is poisoned")]
	Poisoned
}

pub type Result<T> = std::result::Result<T, Error>;



pub fn user_key( address: &Address ) -> String {
	format!("{}{}", USER_KEY_PREFIX, address)
}

pub fn votes_key( address: &Address ) -> String {
	format!("{}{}", VOTES_KEY_PREFIX, address)
}



impl Connection {

	pub fn query<P, F, R>( &self, sql: &'static str, params: P, on_result: F ) -> rusqlite::Result<R> where
		P: Params,
		F: FnOnce(rusqlite::Rows) -> rusqlite::Result<R>
	{
		let mut statement = self.0.prepare( sql )?;
		let result = statement.query(params)?;

		on_result(result)
	}
}

impl Handle {

	/// Opens (and if needed creates) the store in the given database file.
	pub fn open( path: impl AsRef<Path> ) -> Result<Self> {
		let con = rusqlite::Connection::open( path )?;
		Self::init( con )
	}

	/// Opens a store that only lives as long as the handle.
	pub fn open_in_memory() -> Result<Self> {
		Self::init( rusqlite::Connection::open_in_memory()? )
	}

	fn init( con: rusqlite::Connection ) -> Result<Self> {
		con.busy_timeout( BUSY_TIMEOUT )?;
		con.execute( SCHEMA, [] )?;

		Ok( Self {
			db: Arc::new( Mutex::new( Connection ( con ) ) )
		})
	}

	fn lock( &self ) -> Result<MutexGuard<'_, Connection>> {
		self.db.lock().map_err(|_| Error::Poisoned)
	}

	pub fn get<T>( &self, key: &str ) -> Result<Option<T>> where
		T: DeserializeOwned
	{
		let guard = self.lock()?;
		Batch { con: &guard }.get( key )
	}

	/// Returns the blob exactly as it is stored.
	pub fn get_raw( &self, key: &str ) -> Result<Option<String>> {
		let guard = self.lock()?;
		Batch { con: &guard }.get_raw( key )
	}

	pub fn set<T>( &self, key: &str, value: &T ) -> Result<()> where
		T: Serialize + ?Sized
	{
		let guard = self.lock()?;
		Batch { con: &guard }.set( key, value )
	}

	/// Stores `value` exactly as given, without encoding it.
	pub fn set_raw( &self, key: &str, value: &str ) -> Result<()> {
		let guard = self.lock()?;
		Batch { con: &guard }.set_raw( key, value )
	}

	pub fn remove( &self, key: &str ) -> Result<()> {
		let guard = self.lock()?;
		Batch { con: &guard }.remove( key )
	}

	/// Lists all keys that start with `prefix`, in ascending order.
	pub fn keys_with_prefix( &self, prefix: &str ) -> Result<Vec<String>> {
		let guard = self.lock()?;

		let keys = guard.query("SELECT key FROM kv WHERE substr(key, 1, length(?1)) = ?1 ORDER BY key",
			params![prefix],
			|rows| rows.map(|row| row.get(0)).collect()
		)?;

		Ok( keys )
	}

	/// Runs `work` in an immediate transaction.
	/// Everything `work` writes is committed together if it returns `Ok`, and discarded otherwise.
	pub fn transact<F, R>( &self, work: F ) -> Result<R> where
		F: FnOnce( &Batch<'_> ) -> Result<R>
	{
		let mut guard = self.lock()?;
		let tx = guard.transaction_with_behavior( TransactionBehavior::Immediate )?;

		let result = work( &Batch { con: &*tx } )?;
		tx.commit()?;

		Ok( result )
	}
}

impl<'t> Batch<'t> {

	pub fn get<T>( &self, key: &str ) -> Result<Option<T>> where
		T: DeserializeOwned
	{
		match self.get_raw( key )? {
			None => Ok( None ),
			Some(raw) => serde_json::from_str( &raw )
				.map( Some )
				.map_err(|source| Error::Serialization { key: key.to_owned(), source })
		}
	}

	pub fn get_raw( &self, key: &str ) -> Result<Option<String>> {
		Ok( self.con.query_row("SELECT value FROM kv WHERE key = ?1",
			params![key],
			|row| row.get(0)
		).optional()? )
	}

	/// Replaces the whole blob under `key`.
	pub fn set<T>( &self, key: &str, value: &T ) -> Result<()> where
		T: Serialize + ?Sized
	{
		let raw = serde_json::to_string( value )
			.map_err(|source| Error::Serialization { key: key.to_owned(), source })?;

		self.set_raw( key, &raw )
	}

	pub fn set_raw( &self, key: &str, value: &str ) -> Result<()> {
		self.con.execute("INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)", params![key, value])?;
		trace!(key, bytes = value.len(), "stored blob");

		Ok(())
	}

	pub fn remove( &self, key: &str ) -> Result<()> {
		self.con.execute("DELETE FROM kv WHERE key = ?1", params![key])?;
		Ok(())
	}
}



impl Deref for Connection {
	type Target = rusqlite::Connection;

	fn deref( &self ) -> &Self::Target {
		&self.0
	}
}

impl DerefMut for Connection {
	fn deref_mut( &mut self ) -> &mut Self::Target {
		&mut self.0
	}
}



#[cfg(test)]
mod tests {
	use std::collections::BTreeMap;

	use super::*;

	#[test]
	fn stores_and_removes_blobs() {
		let store = Handle::open_in_memory().unwrap();
		assert_eq!( store.get::<Vec<u32>>("numbers").unwrap(), None );

		store.set( "numbers", &vec![1u32, 2, 3] ).unwrap();
		assert_eq!( store.get::<Vec<u32>>("numbers").unwrap(), Some( vec![1, 2, 3] ) );
		assert_eq!( store.get_raw("numbers").unwrap().as_deref(), Some("[1,2,3]") );

		store.remove("numbers").unwrap();
		assert_eq!( store.get_raw("numbers").unwrap(), None );
	}

	#[test]
	fn malformed_blobs_are_errors() {
		let store = Handle::open_in_memory().unwrap();
		store.set( "posts", "not a list" ).unwrap();

		match store.get::<Vec<u32>>("posts") {
			Err( Error::Serialization { key, .. } ) => assert_eq!( key, "posts" ),
			other => panic!("expected a serialization error, got {:?}", other)
		}
	}

	#[test]
	fn lists_keys_by_prefix() {
		let store = Handle::open_in_memory().unwrap();
		for key in &["user_0xB", "user_0xA", "votes_0xA", "users"] {
			store.set( key, &BTreeMap::<String, i8>::new() ).unwrap();
		}

		assert_eq!( store.keys_with_prefix("user_").unwrap(), vec!["user_0xA", "user_0xB"] );
		assert!( store.keys_with_prefix("nothing_").unwrap().is_empty() );
	}

	#[test]
	fn failed_transactions_are_rolled_back() {
		let store = Handle::open_in_memory().unwrap();
		store.set( "a", &1 ).unwrap();

		let result: Result<()> = store.transact(|batch| {
			batch.set( "a", &2 )?;
			batch.set( "b", &3 )?;
			Err( Error::Poisoned )
		});

		assert!( result.is_err() );
		assert_eq!( store.get::<i32>("a").unwrap(), Some( 1 ) );
		assert_eq!( store.get::<i32>("b").unwrap(), None );
	}

	#[test]
	fn handles_on_one_file_see_each_others_writes() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("threads.sqlite");
		let first = Handle::open( &path ).unwrap();
		let second = Handle::open( &path ).unwrap();

		for _ in 0..10 {
			first.transact(|batch| {
				let n: i32 = batch.get("counter")?.unwrap_or(0);
				batch.set( "counter", &(n + 1) )
			}).unwrap();
			second.transact(|batch| {
				let n: i32 = batch.get("counter")?.unwrap_or(0);
				batch.set( "counter", &(n + 1) )
			}).unwrap();
		}

		assert_eq!( first.get::<i32>("counter").unwrap(), Some( 20 ) );
	}
}
