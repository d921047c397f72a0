//!
//! Authenticated HTTP client for the ledger-indexing service.
//!
//! This module provides an async client for the account, client, blockchain and
//! transaction resources. Every call except account creation and login carries a bearer
//! token. Reads against the blockchain and transaction resources are retried with the
//! configured [`RetryPolicy`]; mutations are attempted exactly once.

use super::retry::{RetryPolicy, retry_transient};
use super::types::*;
use crate::config::IndexerConfig;
use reqwest::{Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::{debug, info, warn};

/// Endpoint and bearer token shared by every request of one client.
#[derive(Debug, Clone)]
pub struct Session {
	endpoint: String,
	token: Option<String>,
}

impl Session {
	pub fn new(endpoint: impl Into<String>, token: Option<String>) -> Self {
		let endpoint = endpoint.into().trim_end_matches('/').to_string();
		Self { endpoint, token }
	}

	pub fn endpoint(&self) -> &str {
		&self.endpoint
	}

	pub fn token(&self) -> Option<&str> {
		self.token.as_deref()
	}

	/// Replace the bearer token used by subsequent requests.
	pub fn use_token(&mut self, token: impl Into<String>) {
		self.token = Some(token.into());
	}

	fn url(&self, path: &str) -> String {
		format!("{}{}", self.endpoint, path)
	}

	/// Absolute hrefs are used as-is; anything else is taken relative to the endpoint.
	fn resolve(&self, href: &str) -> String {
		if href.starts_with("http://") || href.starts_with("https://") {
			href.to_string()
		} else if href.starts_with('/') {
			self.url(href)
		} else {
			format!("{}/{}", self.endpoint, href)
		}
	}
}

/// Ledger indexer client
#[derive(Debug, Clone)]
pub struct IndexerClient {
	/// The underlying HTTP client.
	http_client: Client,
	session: Session,
	/// Policy for reads against the blockchain and transaction resources.
	retry: RetryPolicy,
}

impl IndexerClient {
	/// Create a new indexer client from configuration.
	///
	/// # Errors
	/// Returns `IndexerError::Http` if the HTTP client cannot be built.
	pub fn new(config: &IndexerConfig) -> Result<Self, IndexerError> {
		let http_client = Client::builder().timeout(config.request_timeout).build()?;

		Ok(Self {
			http_client,
			session: Session::new(config.endpoint.clone(), config.token.clone()),
			retry: config.retry.clone(),
		})
	}

	pub fn session(&self) -> &Session {
		&self.session
	}

	pub fn use_token(&mut self, token: impl Into<String>) {
		self.session.use_token(token);
	}

	/// Create an account, or log in with the same credentials if creation fails for any
	/// reason. The returned token is stored in the session.
	pub async fn authenticate(
		&mut self,
		name: &str,
		email: &str,
		password: &str,
	) -> Result<Account, IndexerError> {
		let account = match self.create_account(name, email, password).await {
			Ok(account) => account,
			Err(e) => {
				info!("Account creation failed ({}), logging in instead", e);
				self.login(email, password).await?
			}
		};

		let token = account.token.clone().ok_or(IndexerError::NoData)?;
		self.session.use_token(token);
		info!("Authenticated account {}", account.account_id);
		Ok(account)
	}

	/// `POST /accounts`
	pub async fn create_account(
		&self,
		name: &str,
		email: &str,
		password: &str,
	) -> Result<Account, IndexerError> {
		let body = json!({ "name": name, "email": email, "password": password });
		let request = self
			.http_client
			.post(self.session.url("/accounts"))
			.header("accept", "application/json")
			.json(&body);
		parse(Self::execute(request).await?)
	}

	/// `POST /accounts/login`. Stores the returned token in the session.
	pub async fn login(&mut self, email: &str, password: &str) -> Result<Account, IndexerError> {
		let body = json!({ "email": email, "password": password });
		let request = self
			.http_client
			.post(self.session.url("/accounts/login"))
			.header("accept", "application/json")
			.json(&body);
		let account: Account = parse(Self::execute(request).await?)?;

		if let Some(token) = &account.token {
			self.session.use_token(token.clone());
		}
		Ok(account)
	}

	/// `GET /accounts/{id}`
	pub async fn get_account(
		&self,
		account_id: &str,
		token: Option<&str>,
	) -> Result<Account, IndexerError> {
		let path = format!("/accounts/{}", account_id);
		self.request(Method::GET, &path, &[], None, token).await
	}

	/// `GET /clients`
	pub async fn get_clients(&self, token: Option<&str>) -> Result<Vec<ClientRecord>, IndexerError> {
		let envelope: Embedded<ClientsEmbedded> =
			self.request(Method::GET, "/clients", &[], None, token).await?;
		Ok(envelope.embedded.map(|e| e.clients).unwrap_or_default())
	}

	/// `POST /clients`
	pub async fn create_client(
		&self,
		name: &str,
		token: Option<&str>,
	) -> Result<ClientRecord, IndexerError> {
		let body = json!({ "name": name });
		self.request(Method::POST, "/clients", &[], Some(&body), token)
			.await
	}

	/// `DELETE /clients/{id}`
	pub async fn delete_client(&self, client_id: &str, token: Option<&str>) -> Result<(), IndexerError> {
		let path = format!("/clients/{}", client_id);
		self.send(Method::DELETE, &path, &[], None, token)
			.await
			.map(|_| ())
	}

	/// `GET /blockchains?testnet={bool}`, retried.
	pub async fn get_blockchains(&self, testnet: bool) -> Result<Vec<Blockchain>, IndexerError> {
		let params = [("testnet", testnet.to_string())];
		let envelope: Embedded<BlockchainsEmbedded> =
			retry_transient(&self.retry, "get_blockchains", || {
				self.request(Method::GET, "/blockchains", &params, None, None)
			})
			.await?;
		Ok(envelope.embedded.map(|e| e.blockchains).unwrap_or_default())
	}

	/// `GET /blockchains/{id}`, retried.
	pub async fn get_blockchain(&self, blockchain_id: &str) -> Result<Blockchain, IndexerError> {
		let path = format!("/blockchains/{}", blockchain_id);
		retry_transient(&self.retry, "get_blockchain", || {
			self.request(Method::GET, &path, &[], None, None)
		})
		.await
	}

	/// `GET /transactions`, retried. Returns the first page.
	pub async fn get_transactions(
		&self,
		query: &TransactionQuery,
	) -> Result<TransactionPage, IndexerError> {
		let params = query.to_params();
		let envelope: Embedded<TransactionsEmbedded> =
			retry_transient(&self.retry, "get_transactions", || {
				self.request(Method::GET, "/transactions", &params, None, None)
			})
			.await?;
		Ok(envelope.into())
	}

	/// Follow a `_links.next` href returned by a previous transaction page, retried.
	/// Relative hrefs are resolved against the session endpoint.
	pub async fn get_transactions_page(&self, href: &str) -> Result<TransactionPage, IndexerError> {
		let url = self.session.resolve(href);
		let url = url.as_str();
		let envelope: Embedded<TransactionsEmbedded> =
			retry_transient(&self.retry, "get_transactions_page", || async move {
				let request = self.authorized(self.http_client.get(url), None)?;
				parse(Self::execute(request).await?)
			})
			.await?;
		Ok(envelope.into())
	}

	/// Issue one authenticated request and decode the JSON response.
	///
	/// `token` overrides the session token. Fails with `IndexerError::Auth` before any
	/// network traffic when neither is available.
	pub async fn request<T: DeserializeOwned>(
		&self,
		method: Method,
		path: &str,
		params: &[(&str, String)],
		body: Option<&Value>,
		token: Option<&str>,
	) -> Result<T, IndexerError> {
		let text = self.send(method, path, params, body, token).await?;
		parse(text)
	}

	async fn send(
		&self,
		method: Method,
		path: &str,
		params: &[(&str, String)],
		body: Option<&Value>,
		token: Option<&str>,
	) -> Result<String, IndexerError> {
		let mut request = self.http_client.request(method, self.session.url(path));
		if !params.is_empty() {
			request = request.query(params);
		}
		if let Some(body) = body {
			request = request.json(body);
		}
		let request = self.authorized(request, token)?;
		Self::execute(request).await
	}

	fn authorized(&self, request: RequestBuilder, token: Option<&str>) -> Result<RequestBuilder, IndexerError> {
		let token = token.or(self.session.token()).ok_or(IndexerError::Auth)?;
		Ok(request
			.bearer_auth(token)
			.header("accept", "application/json"))
	}

	async fn execute(request: RequestBuilder) -> Result<String, IndexerError> {
		let response = request.send().await?;
		let status = response.status();
		let url = response.url().clone();
		let body = response.text().await?;

		if status.as_u16() >= 400 {
			warn!("{} returned {}: {}", url.path(), status, body);
			return Err(IndexerError::Api {
				status: status.as_u16(),
				body,
			});
		}

		debug!("{} returned {} ({} bytes)", url.path(), status, body.len());
		Ok(body)
	}
}

fn parse<T: DeserializeOwned>(text: String) -> Result<T, IndexerError> {
	// Bodyless success responses (e.g. 204) decode as JSON null.
	let text = if text.trim().is_empty() { "null" } else { text.as_str() };
	Ok(serde_json::from_str(text)?)
}
