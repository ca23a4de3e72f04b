//! The identity of whoever is using this board right now.

use tracing::{info, warn};

use crate::{
	common::Address,
	persistence::{Handle, Result, WALLET_ADDRESS_KEY, WALLET_TYPE_KEY}
};



impl Handle {

	/// The address of the connected wallet, if any.
	/// A stored address that isn't well-formed counts as not connected.
	pub fn connected_address( &self ) -> Result<Option<Address>> {
		let raw = self.get_raw( WALLET_ADDRESS_KEY )?;

		Ok( raw.and_then(|raw| match Address::parse( &raw ) {
			Ok(address) => Some( address ),
			Err(e) => {
				warn!("ignoring stored wallet address: {}", e);
				None
			}
		}))
	}

	pub fn wallet_type( &self ) -> Result<Option<String>> {
		self.get_raw( WALLET_TYPE_KEY )
	}

	/// Both values are stored as plain strings, not JSON.
	pub fn connect( &self, address: &Address, wallet_type: &str ) -> Result<()> {

		self.transact(|batch| {
			batch.set_raw( WALLET_ADDRESS_KEY, address.as_str() )?;
			batch.set_raw( WALLET_TYPE_KEY, wallet_type )
		})?;

		info!(address = %address, wallet_type, "wallet connected");
		Ok(())
	}

	pub fn disconnect( &self ) -> Result<()> {

		self.transact(|batch| {
			batch.remove( WALLET_ADDRESS_KEY )?;
			batch.remove( WALLET_TYPE_KEY )
		})?;

		info!("wallet disconnected");
		Ok(())
	}
}



#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn remembers_the_connected_wallet() {
		let store = Handle::open_in_memory().unwrap();
		assert_eq!( store.connected_address().unwrap(), None );

		let address = Address::parse("0xABC").unwrap();
		store.connect( &address, "Rabby" ).unwrap();
		assert_eq!( store.connected_address().unwrap(), Some( address ) );
		assert_eq!( store.wallet_type().unwrap().as_deref(), Some("Rabby") );
		assert_eq!( store.get_raw( WALLET_ADDRESS_KEY ).unwrap().as_deref(), Some("0xABC") );
		assert_eq!( store.get_raw( WALLET_TYPE_KEY ).unwrap().as_deref(), Some("Rabby") );

		store.disconnect().unwrap();
		assert_eq!( store.connected_address().unwrap(), None );
		assert_eq!( store.wallet_type().unwrap(), None );
	}

	#[test]
	fn malformed_addresses_are_not_an_identity() {
		let store = Handle::open_in_memory().unwrap();
		store.set_raw( WALLET_ADDRESS_KEY, "someone" ).unwrap();

		assert_eq!( store.connected_address().unwrap(), None );
	}
}
