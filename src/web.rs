use actix_multipart::form::{bytes::Bytes, text::Text, MultipartForm};
use actix_web::{dev::Payload, error, get, http::header, FromRequest, HttpRequest, HttpResponse, post, web};
use chrono::{DateTime, Utc};
use serde::*;
use tera::{self, Tera, Value};
use tracing::warn;

use std::{
	collections::HashMap,
	future::{ready, Ready},
	sync::Arc
};

use crate::{
	common,
	post::Post,
	profile::{avatar_data_uri, ProfilePatch},
	threads,
	vote::Vote,
	Globals
};



/// A post as the feed shows it to the connected wallet.
#[derive(Serialize)]
pub struct PostView {
	#[serde(flatten)]
	post: Post,
	liked: bool,
	author_name: Option<String>
}

#[derive(Deserialize)]
pub struct PostForm {
	title: String,
	content: String
}

#[derive(Deserialize)]
pub struct CommentForm {
	text: String
}

#[derive(Deserialize)]
pub struct VoteForm {
	value: i8
}

#[derive(Deserialize)]
pub struct PostParams {
	id: String
}

/// The settings form. A file input left empty keeps the current avatar.
#[derive(MultipartForm)]
pub struct ProfileForm {
	display_name: Option<Text<String>>,
	bio: Option<Text<String>>,
	avatar: Option<Bytes>
}

/// Proof that a request was submitted from one of the board's own pages.
///
/// The connected wallet pays for whatever is posted, so forms on other sites must not be able to post on its behalf.
pub struct SameOrigin;



/// Loads the page templates and registers the filters they use.
pub fn templates() -> tera::Result<Tera> {
	let mut tera = Tera::new(concat!(env!("CARGO_MANIFEST_DIR"), "/templates/**/*"))?;
	tera.register_filter("short_address", short_address_filter);
	tera.register_filter("time_ago", time_ago_filter);
	Ok( tera )
}

fn short_address_filter( value: &Value, _: &HashMap<String, Value> ) -> tera::Result<Value> {
	let address = value.as_str()
		.ok_or_else(|| tera::Error::msg("short_address expects a string"))?;
	Ok( Value::String( common::short_address( address ) ) )
}

fn time_ago_filter( value: &Value, _: &HashMap<String, Value> ) -> tera::Result<Value> {
	let timestamp = value.as_str()
		.ok_or_else(|| tera::Error::msg("time_ago expects a timestamp"))?;
	let then = DateTime::parse_from_rfc3339( timestamp )
		.map_err(|e| tera::Error::msg(format!("invalid timestamp \"{}\": {}", timestamp, e)))?;

	Ok( Value::String( common::time_ago( then.with_timezone( &Utc ), common::now() ) ) )
}

fn render( g: &Globals, template: &str, context: &tera::Context ) -> error::Result<HttpResponse> {
	let html = g.tera.render(template, context)
		.map_err(|e| { tracing::error!("Template error: {}", e); error::ErrorInternalServerError("Template error") } )?;
	Ok(HttpResponse::Ok().content_type("text/html").body(html))
}

fn redirect( location: &str ) -> HttpResponse {
	HttpResponse::Found().append_header((header::LOCATION, location)).finish()
}

/// The origin (`scheme://host:port`) a request says it was sent from.
/// `Origin` is preferred, the `Referer` is used for browsers that leave it out.
fn request_origin( req: &HttpRequest ) -> Option<String> {
	let headers = req.headers();

	if let Some(origin) = headers.get( header::ORIGIN ) {
		return origin.to_str().ok()
			.filter(|o| *o != "null")
			.map(|o| o.trim_end_matches('/').to_owned())
	}

	let referer = headers.get( header::REFERER )?.to_str().ok()?;
	let authority_start = referer.find("://")? + 3;
	let end = referer[authority_start..].find('/').map_or( referer.len(), |i| authority_start + i );
	Some( referer[..end].to_owned() )
}

impl FromRequest for SameOrigin {
	type Error = actix_web::Error;
	type Future = Ready<Result<Self, Self::Error>>;

	fn from_request( req: &HttpRequest, _: &mut Payload ) -> Self::Future {
		let allowed = req.app_data::<web::Data<Arc<Globals>>>()
			.map_or( &[][..], |g| g.allow_origins.as_slice() );

		ready( match request_origin( req ) {
			Some(origin) if allowed.iter().any(|a| a.eq_ignore_ascii_case( &origin )) => Ok( SameOrigin ),
			origin => {
				warn!(origin = ?origin, path = %req.path(), "refusing request from another site");
				Err( error::ErrorForbidden("Forms can only be submitted from this board.") )
			}
		})
	}
}



#[get("/")]
pub async fn feed(g: web::Data<Arc<Globals>>) -> error::Result<HttpResponse> {
	let threads::Feed { posts, viewer, names } = g.threads.feed().await?;

	let posts: Vec<PostView> = posts.into_iter().map(|post| PostView {
		liked: viewer.as_ref().map_or( false, |viewer| post.is_liked_by( viewer ) ),
		author_name: names.get( &post.author ).cloned(),
		post
	}).collect();

	let mut context = tera::Context::new();
	context.insert("posts", &posts);
	context.insert("viewer", &viewer);
	context.insert("viewer_name", &viewer.as_ref().and_then(|v| names.get( v )));
	context.insert("post_price", &g.threads.pricing().post_price);
	context.insert("comment_price", &g.threads.pricing().comment_price);

	render( &g, "feed.html", &context )
}

#[post("/wallet/connect")]
pub async fn wallet_connect(g: web::Data<Arc<Globals>>, _: SameOrigin) -> error::Result<HttpResponse> {
	g.threads.connect_wallet().await?;
	Ok( redirect("/") )
}

#[post("/wallet/disconnect")]
pub async fn wallet_disconnect(g: web::Data<Arc<Globals>>, _: SameOrigin) -> error::Result<HttpResponse> {
	g.threads.disconnect_wallet().await?;
	Ok( redirect("/") )
}

#[post("/posts")]
pub async fn post_new(g: web::Data<Arc<Globals>>, _: SameOrigin, form: web::Form<PostForm>) -> error::Result<HttpResponse> {
	g.threads.create_post( &form.title, &form.content ).await?;
	Ok( redirect("/") )
}

#[post("/posts/{id}/comments")]
pub async fn comment_new(g: web::Data<Arc<Globals>>, _: SameOrigin, p: web::Path<PostParams>, form: web::Form<CommentForm>) -> error::Result<HttpResponse> {
	g.threads.add_comment( &p.id, &form.text ).await?;
	Ok( redirect("/") )
}

#[post("/posts/{id}/like")]
pub async fn post_like(g: web::Data<Arc<Globals>>, _: SameOrigin, p: web::Path<PostParams>) -> error::Result<HttpResponse> {
	g.threads.toggle_like( &p.id ).await?;
	Ok( redirect("/") )
}

#[post("/posts/{id}/vote")]
pub async fn post_vote(g: web::Data<Arc<Globals>>, _: SameOrigin, p: web::Path<PostParams>, form: web::Form<VoteForm>) -> error::Result<HttpResponse> {
	let vote = Vote::try_from( form.value )
		.map_err(|value| error::ErrorBadRequest(format!("A vote is either 1 or -1, not {}.", value)))?;

	g.threads.vote( &p.id, vote ).await?;
	Ok( redirect("/") )
}

#[get("/profile")]
pub async fn profile(g: web::Data<Arc<Globals>>) -> error::Result<HttpResponse> {
	let page = match g.threads.profile().await {
		Err( threads::Error::NotConnected ) => return Ok( redirect("/") ),
		other => other?
	};

	let mut context = tera::Context::new();
	context.insert("viewer", &page.address);
	context.insert("viewer_name", &page.profile.as_ref().map(|p| &p.display_name).filter(|n| !n.is_empty()));
	context.insert("address", &page.address);
	context.insert("profile", &page.profile);
	context.insert("posts", &page.posts);

	render( &g, "profile.html", &context )
}

#[post("/profile")]
pub async fn profile_save(g: web::Data<Arc<Globals>>, _: SameOrigin, MultipartForm(form): MultipartForm<ProfileForm>) -> error::Result<HttpResponse> {
	let avatar = match form.avatar {
		Some(file) if !file.data.is_empty() => {
			let content_type = file.content_type.as_ref().map_or( "application/octet-stream", |m| m.essence_str() );
			let uri = avatar_data_uri( content_type, &file.data )
				.map_err(|e| error::ErrorBadRequest( e.to_string() ))?;
			Some( uri )
		},
		_ => None
	};

	g.threads.save_profile( ProfilePatch {
		display_name: form.display_name.map(|t| t.0),
		bio: form.bio.map(|t| t.0),
		avatar
	}).await?;
	Ok( redirect("/profile") )
}

pub fn configure( config: &mut web::ServiceConfig ) {
	config
		.service(feed)
		.service(wallet_connect)
		.service(wallet_disconnect)
		.service(post_new)
		.service(comment_new)
		.service(post_like)
		.service(post_vote)
		.service(profile)
		.service(profile_save);
}



impl From<threads::Error> for actix_web::Error {
	fn from( other: threads::Error ) -> Self {
		match other {
			threads::Error::NotConnected => error::ErrorUnauthorized( other.to_string() ),
			threads::Error::PaymentDeclined { .. } => error::ErrorPaymentRequired( other.to_string() ),
			threads::Error::Validation(_) => error::ErrorBadRequest( other.to_string() ),
			threads::Error::Wallet(e) => {
				warn!("Wallet error: {}", e);
				error::ErrorBadGateway("Unable to reach the wallet")
			},
			threads::Error::StorageUnavailable => {
				tracing::error!("Storage error: {}", other);
				error::ErrorInternalServerError("Internal server error occurred")
			},
			threads::Error::Persistence(e) => {
				tracing::error!("Persistence error: {}", e);
				error::ErrorInternalServerError("Internal server error occurred")
			}
		}
	}
}



#[cfg(test)]
mod tests {
	use actix_web::{http::StatusCode, test, App};

	use super::*;
	use crate::threads::tests::{threads_with, FakeWallet};

	const OWN_ORIGIN: &str = "http://127.0.0.1:7777";
	const BOUNDARY: &str = "paythreads-form-boundary";

	fn globals( approve: bool ) -> (Arc<Globals>, Arc<FakeWallet>) {
		let (threads, wallet, _) = threads_with( "0xABC", approve, None );
		let globals = Arc::new( Globals {
			threads,
			tera: templates().unwrap(),
			allow_origins: vec![OWN_ORIGIN.to_owned()]
		});
		(globals, wallet)
	}

	/// A form submission from one of the board's own pages.
	fn submit( uri: &str ) -> test::TestRequest {
		test::TestRequest::post().uri( uri ).insert_header( (header::ORIGIN, OWN_ORIGIN) )
	}

	/// A settings form, optionally with an avatar file of the given type.
	fn profile_form( display_name: &str, avatar: Option<(&str, &[u8])> ) -> test::TestRequest {
		let mut body = format!("--{b}\r\nContent-Disposition: form-data; name=\"display_name\"\r\n\r\n{}\r\n", display_name, b = BOUNDARY).into_bytes();

		let (content_type, data) = avatar.unwrap_or( ("application/octet-stream", &[]) );
		let file_name = if avatar.is_some() { "avatar.img" } else { "" };
		body.extend( format!("--{b}\r\nContent-Disposition: form-data; name=\"avatar\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n", file_name, content_type, b = BOUNDARY).into_bytes() );
		body.extend_from_slice( data );
		body.extend( format!("\r\n--{}--\r\n", BOUNDARY).into_bytes() );

		submit("/profile")
			.insert_header( (header::CONTENT_TYPE, format!("multipart/form-data; boundary={}", BOUNDARY)) )
			.set_payload( body )
	}

	macro_rules! app {
		($globals:expr) => {
			test::init_service( App::new().app_data( web::Data::new( $globals.clone() ) ).configure( configure ) ).await
		};
	}

	#[actix_rt::test]
	async fn feed_shows_the_demonstration_posts() {
		let (g, _) = globals( true );
		let app = app!( g );

		let body = test::call_and_read_body( &app, test::TestRequest::get().uri("/").to_request() ).await;
		let html = String::from_utf8( body.to_vec() ).unwrap();
		assert!( html.contains("Welcome to PayThreads!") );
		assert!( html.contains("Great platform!") );
		assert!( html.contains("0x...45678") );
	}

	#[actix_rt::test]
	async fn posting_requires_a_wallet() {
		let (g, _) = globals( true );
		let app = app!( g );

		let request = submit("/posts").set_form( &[("title", "T"), ("content", "B")] ).to_request();
		assert_eq!( test::call_service( &app, request ).await.status(), StatusCode::UNAUTHORIZED );
	}

	#[actix_rt::test]
	async fn posting_redirects_to_the_feed() {
		let (g, _) = globals( true );
		let app = app!( g );

		let connect = test::call_service( &app, submit("/wallet/connect").to_request() ).await;
		assert_eq!( connect.status(), StatusCode::FOUND );

		let request = submit("/posts").set_form( &[("title", "A fresh thread"), ("content", "B")] ).to_request();
		let response = test::call_service( &app, request ).await;
		assert_eq!( response.status(), StatusCode::FOUND );
		assert_eq!( response.headers().get( header::LOCATION ).unwrap(), "/" );

		let body = test::call_and_read_body( &app, test::TestRequest::get().uri("/").to_request() ).await;
		assert!( String::from_utf8( body.to_vec() ).unwrap().contains("A fresh thread") );
	}

	#[actix_rt::test]
	async fn foreign_pages_cannot_submit_forms() {
		let (g, wallet) = globals( true );
		let app = app!( g );
		test::call_service( &app, submit("/wallet/connect").to_request() ).await;

		let foreign = test::TestRequest::post().uri("/posts")
			.insert_header( (header::ORIGIN, "https://evil.example") )
			.set_form( &[("title", "T"), ("content", "B")] ).to_request();
		assert_eq!( test::call_service( &app, foreign ).await.status(), StatusCode::FORBIDDEN );

		let foreign_referer = test::TestRequest::post().uri("/posts/1000001/like")
			.insert_header( (header::REFERER, "https://evil.example/page") ).to_request();
		assert_eq!( test::call_service( &app, foreign_referer ).await.status(), StatusCode::FORBIDDEN );

		let anonymous = test::TestRequest::post().uri("/posts/1000001/comments").set_form( &[("text", "hi")] ).to_request();
		assert_eq!( test::call_service( &app, anonymous ).await.status(), StatusCode::FORBIDDEN );

		assert!( wallet.payments.lock().unwrap().is_empty() );
		assert!( g.threads.store().posts_by_author( &"0xABC".parse().unwrap() ).unwrap().is_empty() );

		let own_referer = test::TestRequest::post().uri("/posts")
			.insert_header( (header::REFERER, "http://127.0.0.1:7777/profile") )
			.set_form( &[("title", "T"), ("content", "B")] ).to_request();
		assert_eq!( test::call_service( &app, own_referer ).await.status(), StatusCode::FOUND );
		assert_eq!( wallet.payments.lock().unwrap().len(), 1 );
	}

	#[actix_rt::test]
	async fn errors_map_to_status_codes() {
		let (g, _) = globals( false );
		let app = app!( g );
		test::call_service( &app, submit("/wallet/connect").to_request() ).await;

		let declined = submit("/posts").set_form( &[("title", "T"), ("content", "B")] ).to_request();
		assert_eq!( test::call_service( &app, declined ).await.status(), StatusCode::PAYMENT_REQUIRED );

		let empty = submit("/posts").set_form( &[("title", " "), ("content", "B")] ).to_request();
		assert_eq!( test::call_service( &app, empty ).await.status(), StatusCode::BAD_REQUEST );

		let bad_vote = submit("/posts/1000001/vote").set_form( &[("value", "5")] ).to_request();
		assert_eq!( test::call_service( &app, bad_vote ).await.status(), StatusCode::BAD_REQUEST );
	}

	#[actix_rt::test]
	async fn voting_changes_the_score() {
		let (g, _) = globals( true );
		let app = app!( g );
		test::call_service( &app, submit("/wallet/connect").to_request() ).await;
		test::call_service( &app, test::TestRequest::get().uri("/").to_request() ).await;

		let request = submit("/posts/1000002/vote").set_form( &[("value", "-1")] ).to_request();
		assert_eq!( test::call_service( &app, request ).await.status(), StatusCode::FOUND );
		assert_eq!( g.threads.store().find_post("1000002").unwrap().unwrap().votes, 7 );
	}

	#[actix_rt::test]
	async fn profile_page_needs_a_wallet() {
		let (g, _) = globals( true );
		let app = app!( g );

		let response = test::call_service( &app, test::TestRequest::get().uri("/profile").to_request() ).await;
		assert_eq!( response.status(), StatusCode::FOUND );
		assert_eq!( response.headers().get( header::LOCATION ).unwrap(), "/" );
	}

	#[actix_rt::test]
	async fn saved_profile_is_shown() {
		let (g, _) = globals( true );
		let app = app!( g );
		test::call_service( &app, submit("/wallet/connect").to_request() ).await;

		let response = test::call_service( &app, profile_form( "Satoshi", None ).to_request() ).await;
		assert_eq!( response.status(), StatusCode::FOUND );
		assert_eq!( response.headers().get( header::LOCATION ).unwrap(), "/profile" );

		let body = test::call_and_read_body( &app, test::TestRequest::get().uri("/profile").to_request() ).await;
		assert!( String::from_utf8( body.to_vec() ).unwrap().contains("Satoshi") );

		let feed_body = test::call_and_read_body( &app, test::TestRequest::get().uri("/").to_request() ).await;
		assert!( String::from_utf8( feed_body.to_vec() ).unwrap().contains("Satoshi") );
	}

	#[actix_rt::test]
	async fn uploaded_avatars_are_stored_as_data_uris() {
		let (g, _) = globals( true );
		let app = app!( g );
		test::call_service( &app, submit("/wallet/connect").to_request() ).await;
		let address = "0xABC".parse().unwrap();

		let upload = profile_form( "Satoshi", Some( ("image/png", &b"PNGDATA"[..]) ) ).to_request();
		assert_eq!( test::call_service( &app, upload ).await.status(), StatusCode::FOUND );
		let stored = g.threads.store().load_profile( &address ).unwrap().unwrap();
		assert_eq!( stored.avatar, "data:image/png;base64,UE5HREFUQQ==" );

		let without_file = profile_form( "Nakamoto", None ).to_request();
		assert_eq!( test::call_service( &app, without_file ).await.status(), StatusCode::FOUND );
		let stored = g.threads.store().load_profile( &address ).unwrap().unwrap();
		assert_eq!( stored.display_name, "Nakamoto" );
		assert_eq!( stored.avatar, "data:image/png;base64,UE5HREFUQQ==" );

		let not_an_image = profile_form( "Satoshi", Some( ("text/html", &b"<script></script>"[..]) ) ).to_request();
		assert_eq!( test::call_service( &app, not_an_image ).await.status(), StatusCode::BAD_REQUEST );
	}
}
