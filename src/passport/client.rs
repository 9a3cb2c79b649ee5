//! Passport service client.
//!
//! # Responsibilities
//! - Look up product item passports over mutual TLS
//! - Create commissioning passports over plain HTTP
//! - Validate response status and body shape
//!
//! Calls are stateless: the client only holds immutable endpoints and
//! connection pools, so one instance is shared by every interceptor.

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use std::time::Duration;
use url::Url;

use crate::config::PassportConfig;
use crate::net::tls::load_client_tls;
use crate::passport::types::{
    CommissioningCreateRequest, PassportError, PassportResult, ProductItemPassport,
};

/// Path of the product item lookup, relative to the configured base URL.
pub const PRODUCT_ITEM_PATH: &str = "/product_item/";

/// Upper bound on how much of an error body is kept in `UnexpectedStatus`.
const MAX_ERROR_BODY: usize = 512;

/// Operations the interceptors need from the passport service.
#[async_trait]
pub trait PassportClient: Send + Sync {
    /// `GET {base}/product_item/?uuid={uuid}`.
    async fn read_product_passport(&self, uuid: &str) -> PassportResult<ProductItemPassport>;

    /// `POST {commissioning_url}` with the JSON encoded request.
    async fn create_commissioning_record(
        &self,
        request: &CommissioningCreateRequest,
    ) -> PassportResult<()>;
}

/// A configured endpoint with the transport used to reach it.
#[derive(Debug, Clone)]
struct Endpoint {
    url: Url,
    http: reqwest::Client,
}

/// reqwest based [`PassportClient`].
#[derive(Debug, Clone)]
pub struct HttpPassportClient {
    product: Option<Endpoint>,
    commissioning: Option<Endpoint>,
}

impl HttpPassportClient {
    /// Build transports for every configured endpoint.
    ///
    /// `https` product lookups use the configured client identity and trust only
    /// the configured CA. Commissioning creates always use a plain transport.
    pub fn new(config: &PassportConfig) -> PassportResult<Self> {
        let timeout = config.request_timeout();

        let product = match config.product_base_url.as_deref() {
            Some(raw) => {
                let url = parse_url(raw)?;
                let http = product_transport(config, &url, timeout)?;
                Some(Endpoint { url, http })
            }
            None => None,
        };

        let commissioning = match config.commissioning_url.as_deref() {
            Some(raw) => Some(Endpoint {
                url: parse_url(raw)?,
                http: reqwest::Client::builder().timeout(timeout).build()?,
            }),
            None => None,
        };

        tracing::info!(
            product_base = ?config.product_base_url,
            commissioning_url = ?config.commissioning_url,
            timeout_secs = timeout.as_secs(),
            "Passport client initialized"
        );

        Ok(Self {
            product,
            commissioning,
        })
    }
}

#[async_trait]
impl PassportClient for HttpPassportClient {
    async fn read_product_passport(&self, uuid: &str) -> PassportResult<ProductItemPassport> {
        let endpoint = self
            .product
            .as_ref()
            .ok_or(PassportError::NotConfigured("product base URL"))?;
        let url = product_item_url(&endpoint.url, uuid);

        tracing::debug!(url = %url, "Fetching product item passport");
        let response = endpoint.http.get(url).send().await?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(unexpected_status(response).await);
        }

        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }

    async fn create_commissioning_record(
        &self,
        request: &CommissioningCreateRequest,
    ) -> PassportResult<()> {
        let endpoint = self
            .commissioning
            .as_ref()
            .ok_or(PassportError::NotConfigured("commissioning URL"))?;

        let body = serde_json::to_vec(request)?;
        tracing::debug!(
            url = %endpoint.url,
            controller_uuid = %request.controller_uuid,
            "Creating commissioning passport"
        );
        let response = endpoint
            .http
            .post(endpoint.url.clone())
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(unexpected_status(response).await);
        }
        Ok(())
    }
}

fn parse_url(raw: &str) -> PassportResult<Url> {
    Url::parse(raw).map_err(|source| PassportError::InvalidUrl {
        url: raw.to_string(),
        source,
    })
}

fn product_item_url(base: &Url, uuid: &str) -> Url {
    let mut url = base.clone();
    url.set_path(PRODUCT_ITEM_PATH);
    url.query_pairs_mut().clear().append_pair("uuid", uuid);
    url
}

fn product_transport(
    config: &PassportConfig,
    url: &Url,
    timeout: Duration,
) -> PassportResult<reqwest::Client> {
    let builder = reqwest::Client::builder().timeout(timeout);

    match (&config.ca_cert, &config.client_cert, &config.client_key) {
        (Some(ca), Some(cert), Some(key)) => {
            let material = load_client_tls(ca, cert, key).map_err(|e| PassportError::Tls {
                path: e.path,
                reason: e.reason,
            })?;
            Ok(builder
                .use_rustls_tls()
                .tls_built_in_root_certs(false)
                .add_root_certificate(material.root)
                .identity(material.identity)
                .build()?)
        }
        _ if url.scheme() == "https" => Err(PassportError::Tls {
            path: config.client_cert.clone().unwrap_or_default(),
            reason: "ca_cert, client_cert and client_key are required for https lookups"
                .to_string(),
        }),
        _ => {
            tracing::warn!(
                product_base = %url,
                "Product passport lookups configured without mutual TLS"
            );
            Ok(builder.build()?)
        }
    }
}

async fn unexpected_status(response: reqwest::Response) -> PassportError {
    let status = response.status().as_u16();
    let mut body = response.text().await.unwrap_or_default();
    if body.len() > MAX_ERROR_BODY {
        let mut cut = MAX_ERROR_BODY;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
    }
    PassportError::UnexpectedStatus { status, body }
}
