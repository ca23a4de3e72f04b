use tracing::{debug, warn};

use crate::{
	common::{now, Address},
	persistence::{user_key, Handle, Result, USER_KEY_PREFIX},
	profile::{Profile, ProfilePatch}
};



impl Handle {

	pub fn load_profile( &self, address: &Address ) -> Result<Option<Profile>> {
		self.get( &user_key( address ) )
	}

	/// Every stored profile, ordered by the key they are stored under.
	/// Blobs that can't be read as a profile are skipped.
	pub fn profiles( &self ) -> Result<Vec<Profile>> {
		let keys = self.keys_with_prefix( USER_KEY_PREFIX )?;
		let mut profiles = Vec::with_capacity( keys.len() );

		for key in keys {
			match self.get::<Profile>( &key ) {
				Ok(Some(profile)) => profiles.push( profile ),
				Ok(None) => {},
				Err(e) => warn!(%key, "skipping unreadable profile: {}", e)
			}
		}

		Ok( profiles )
	}

	/// Creates the default profile for `address` if it doesn't have one yet.
	/// Returns the profile and whether it was just created.
	pub fn ensure_profile( &self, address: &Address ) -> Result<(Profile, bool)> {
		let key = user_key( address );

		self.transact(|batch| {
			if let Some(existing) = batch.get::<Profile>( &key )? {
				return Ok( (existing, false) )
			}

			let profile = Profile::new( address.clone(), now() );
			batch.set( &key, &profile )?;
			debug!(address = %address, "created profile");

			Ok( (profile, true) )
		})
	}

	/// Merges `patch` into the profile of `address`, creating the profile first if needed.
	pub fn upsert_profile( &self, address: &Address, patch: ProfilePatch ) -> Result<Profile> {
		let key = user_key( address );

		self.transact(|batch| {
			let mut profile = batch.get::<Profile>( &key )?
				.unwrap_or_else(|| Profile::new( address.clone(), now() ));
			profile.apply( patch );
			batch.set( &key, &profile )?;

			Ok( profile )
		})
	}

	pub fn set_profile_replication_id( &self, address: &Address, replication_id: &str ) -> Result<bool> {
		let key = user_key( address );

		self.transact(|batch| {
			let mut profile = match batch.get::<Profile>( &key )? {
				None => return Ok( false ),
				Some(p) => p
			};
			profile.replication_id = Some( replication_id.to_owned() );
			batch.set( &key, &profile )?;

			Ok( true )
		})
	}
}
