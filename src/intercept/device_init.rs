//! Device initialization (DI) interceptor.
//!
//! # Integration Points
//! - DI.AppStart request (type 10): look up the product item passport
//! - DI.SetCredentials response (type 11): log credential setup
//!
//! Lookups are additive enrichment: failures are logged and never reach the
//! relay, and a missing client or product id is a silent no-op.

use std::sync::Arc;

use async_trait::async_trait;
use axum::http::{Request, Response};
use bytes::Bytes;

use crate::intercept::classify::{request_message_type, response_message_type, MessageType};
use crate::intercept::payload::PayloadDecoder;
use crate::intercept::{CallContext, InterceptError, Interceptor};
use crate::observability::metrics;
use crate::passport::PassportClient;

pub struct DeviceInitInterceptor {
    client: Option<Arc<dyn PassportClient>>,
    enable_product_passport: bool,
    decoder: Arc<dyn PayloadDecoder>,
}

impl DeviceInitInterceptor {
    pub fn new(
        client: Option<Arc<dyn PassportClient>>,
        enable_product_passport: bool,
        decoder: Arc<dyn PayloadDecoder>,
    ) -> Self {
        Self {
            client,
            enable_product_passport,
            decoder,
        }
    }

    async fn handle_app_start(&self, ctx: &CallContext, body: &Bytes) {
        let client = match &self.client {
            Some(client) if self.enable_product_passport => client,
            _ => return,
        };

        let Some(product_id) = self.decoder.product_id(body) else {
            tracing::debug!(
                request_id = %ctx.request_id(),
                "No product id in DI.AppStart payload, skipping passport lookup"
            );
            return;
        };

        match ctx.run_cancellable(client.read_product_passport(&product_id)).await {
            Some(Ok(passport)) => {
                metrics::record_passport_call("read_product_passport", "ok");
                tracing::info!(
                    request_id = %ctx.request_id(),
                    uuid = %passport.uuid,
                    records = passport.records.len(),
                    "Retrieved product item passport"
                );
            }
            Some(Err(e)) => {
                metrics::record_passport_call("read_product_passport", e.kind());
                tracing::warn!(
                    request_id = %ctx.request_id(),
                    product_id = %product_id,
                    error = %e,
                    "Failed to get product passport"
                );
            }
            None => {
                metrics::record_passport_call("read_product_passport", "cancelled");
                tracing::debug!(
                    request_id = %ctx.request_id(),
                    product_id = %product_id,
                    "Relay cancelled, skipping product passport lookup"
                );
            }
        }
    }
}

#[async_trait]
impl Interceptor for DeviceInitInterceptor {
    fn name(&self) -> &'static str {
        "device_init"
    }

    async fn process_request(
        &self,
        ctx: &CallContext,
        request: &Request<Bytes>,
    ) -> Result<(), InterceptError> {
        if request_message_type(request.uri().path()) == Some(MessageType::DI_APP_START) {
            self.handle_app_start(ctx, request.body()).await;
        }
        Ok(())
    }

    async fn process_response(
        &self,
        ctx: &CallContext,
        response: &Response<Bytes>,
    ) -> Result<(), InterceptError> {
        if response_message_type(response.headers()) == Some(MessageType::DI_SET_CREDENTIALS) {
            tracing::info!(
                request_id = %ctx.request_id(),
                status = %response.status(),
                "DI.SetCredentials completed"
            );
        }
        Ok(())
    }
}
