use actix_web::{App, HttpServer};
use tera::Tera;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use std::{
	process,
	sync::Arc
};



mod common;
mod config;
mod r#macro;
mod message;
mod persistence;
mod post;
mod profile;
mod replication;
mod threads;
mod vote;
mod wallet;
mod web;

use crate::{
	config::Config,
	replication::{HttpReplicator, Replicator},
	threads::Threads,
	wallet::RpcWallet
};



pub const RETURN_CODE_OK: i32 = 0;
pub const RETURN_CODE_UNEXPECTED: i32 = 1;



pub struct Globals {
	threads: Threads,
	tera: Tera,
	allow_origins: Vec<String>
}



fn main() {
	let config = match Config::new() {
		Err(e) => { eprintln!("Configuration error: {}", e); process::exit( RETURN_CODE_UNEXPECTED ) },
		Ok(config) => config
	};

	tracing_subscriber::registry()
		.with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| config.log_level.as_str().into()))
		.with(tracing_subscriber::fmt::layer())
		.init();

	let code = actix_web::rt::System::new().block_on( serve( config ) );
	process::exit( code )
}

async fn serve( config: Config ) -> i32 {

	let store = match persistence::Handle::open( &config.database_path ) {
		Err(e) => { error!("Unable to open database {}: {}", config.database_path.display(), e); return RETURN_CODE_UNEXPECTED },
		Ok(store) => store
	};
	let tera = match web::templates() {
		Err(e) => { error!("Unable to load templates: {}", e); return RETURN_CODE_UNEXPECTED },
		Ok(tera) => tera
	};

	let wallet = Arc::new( RpcWallet::new(
		config.wallet_rpc_url.clone(),
		config.chain_id.clone(),
		config.wallet_type.clone(),
		config.confirmation_polls,
		config.confirmation_interval
	));
	let replicator: Arc<dyn Replicator> = match &config.replication_url {
		Some(url) => {
			info!("Replicating to {}", url);
			Arc::new( HttpReplicator::new( url ) )
		},
		None => {
			info!("Replication disabled");
			Arc::new( replication::Disabled )
		}
	};

	let globals = Arc::new( Globals {
		threads: Threads::new( store, wallet.clone(), wallet, replicator, config.pricing() ),
		tera,
		allow_origins: config.allow_origins.clone()
	});

	let server = match HttpServer::new(move || {

		App::new()
			.app_data(actix_web::web::Data::new(globals.clone()))
			.configure(web::configure)
	}).bind(&config.server_ip_port) {
		Err(e) => { error!("Unable to start HTTP server on {}: {}", config.server_ip_port, e); return RETURN_CODE_UNEXPECTED },
		Ok(server) => server
	};
	info!("HTTP server listening on {}", config.server_ip_port);

	match server.run().await {
		Err(e) => { error!("HTTP server error: {}", e); RETURN_CODE_UNEXPECTED },
		Ok(()) => {
			info!("HTTP server stopped.");
			RETURN_CODE_OK
		}
	}
}
