use chrono::{DateTime, Utc};
use serde::{Serialize, Deserialize};
use thiserror::Error;

use crate::common::Address;



#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
	pub address: Address,
	pub join_date: DateTime<Utc>,
	#[serde(default)]
	pub display_name: String,
	#[serde(default)]
	pub bio: String,
	/// A data URI or link to the avatar image, or empty.
	#[serde(default)]
	pub avatar: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub replication_id: Option<String>
}

#[derive(Debug, Error, PartialEq)]
pub enum AvatarError {
	#[error("the avatar must be an image, not {0}")]
	NotAnImage( String )
}

/// The fields of a profile that the settings form can change.
/// Fields that are `None` are left as they are.
#[derive(Clone, Debug, Default)]
pub struct ProfilePatch {
	pub display_name: Option<String>,
	pub bio: Option<String>,
	pub avatar: Option<String>
}



impl Profile {

	/// The profile a wallet gets when it is connected for the first time.
	pub fn new( address: Address, join_date: DateTime<Utc> ) -> Self {
		Self {
			address,
			join_date,
			display_name: String::new(),
			bio: String::new(),
			avatar: String::new(),
			replication_id: None
		}
	}

	pub fn apply( &mut self, patch: ProfilePatch ) {
		if let Some(display_name) = patch.display_name {
			self.display_name = display_name.trim().to_owned();
		}
		if let Some(bio) = patch.bio {
			self.bio = bio.trim().to_owned();
		}
		if let Some(avatar) = patch.avatar {
			self.avatar = avatar.trim().to_owned();
		}
	}
}


/// Encodes an uploaded image as a data URI, so the avatar lives inside the profile itself.
pub fn avatar_data_uri( content_type: &str, data: &[u8] ) -> Result<String, AvatarError> {
	if !content_type.starts_with("image/") {
		return Err( AvatarError::NotAnImage( content_type.to_owned() ) )
	}
	Ok( format!("data:{};base64,{}", content_type, base64::encode( data )) )
}



#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn patch_only_touches_given_fields() {
		let mut profile = Profile::new( Address::parse("0xABC").unwrap(), Utc::now() );
		profile.bio = "old bio".into();

		profile.apply( ProfilePatch {
			display_name: Some("  Satoshi ".into()),
			..Default::default()
		});

		assert_eq!( profile.display_name, "Satoshi" );
		assert_eq!( profile.bio, "old bio" );
		assert_eq!( profile.avatar, "" );
	}

	#[test]
	fn avatars_become_data_uris() {
		assert_eq!( avatar_data_uri( "image/png", b"PNGDATA" ).unwrap(), "data:image/png;base64,UE5HREFUQQ==" );
		assert_eq!( avatar_data_uri( "text/html", b"<p>" ), Err( AvatarError::NotAnImage( "text/html".into() ) ) );
	}
}
