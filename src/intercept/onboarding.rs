//! Transfer of ownership (TO2) interceptor.
//!
//! # Integration Points
//! - TO2.HelloDevice request (type 60): log onboarding start
//! - TO2.Done2 response (type 71): create a commissioning passport
//!
//! Commissioning records are fire-and-log: a failed create is a warning, and
//! the TO2.Done2 response reaches the device unchanged either way.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use axum::http::{Request, Response};
use bytes::Bytes;

use crate::intercept::classify::{request_message_type, response_message_type, MessageType};
use crate::intercept::payload::PayloadDecoder;
use crate::intercept::{CallContext, InterceptError, Interceptor};
use crate::observability::metrics;
use crate::passport::{CommissioningCreateRequest, PassportClient};

pub struct OnboardingInterceptor {
    client: Option<Arc<dyn PassportClient>>,
    owner_id: String,
    decoder: Arc<dyn PayloadDecoder>,
}

impl OnboardingInterceptor {
    pub fn new(
        client: Option<Arc<dyn PassportClient>>,
        owner_id: impl Into<String>,
        decoder: Arc<dyn PayloadDecoder>,
    ) -> Self {
        Self {
            client,
            owner_id: owner_id.into(),
            decoder,
        }
    }

    async fn handle_done2(&self, ctx: &CallContext, body: &Bytes) {
        let Some(client) = &self.client else {
            return;
        };

        let Some(device_guid) = self.decoder.device_guid(body) else {
            tracing::debug!(
                request_id = %ctx.request_id(),
                "No device GUID in TO2.Done2 payload, skipping commissioning passport"
            );
            return;
        };

        let request = CommissioningCreateRequest::new(device_guid, now_nanos());

        match ctx.run_cancellable(client.create_commissioning_record(&request)).await {
            Some(Ok(())) => {
                metrics::record_passport_call("create_commissioning_record", "ok");
                tracing::info!(
                    request_id = %ctx.request_id(),
                    controller_uuid = %request.controller_uuid,
                    owner_id = %self.owner_id,
                    "Created commissioning passport"
                );
            }
            Some(Err(e)) => {
                metrics::record_passport_call("create_commissioning_record", e.kind());
                tracing::warn!(
                    request_id = %ctx.request_id(),
                    controller_uuid = %request.controller_uuid,
                    error = %e,
                    "Failed to create commissioning passport"
                );
            }
            None => {
                metrics::record_passport_call("create_commissioning_record", "cancelled");
                tracing::debug!(
                    request_id = %ctx.request_id(),
                    controller_uuid = %request.controller_uuid,
                    "Relay cancelled, skipping commissioning passport"
                );
            }
        }
    }
}

#[async_trait]
impl Interceptor for OnboardingInterceptor {
    fn name(&self) -> &'static str {
        "onboarding"
    }

    async fn process_request(
        &self,
        ctx: &CallContext,
        request: &Request<Bytes>,
    ) -> Result<(), InterceptError> {
        if request_message_type(request.uri().path()) == Some(MessageType::TO2_HELLO_DEVICE) {
            tracing::info!(request_id = %ctx.request_id(), "TO2.HelloDevice request received");
        }
        Ok(())
    }

    async fn process_response(
        &self,
        ctx: &CallContext,
        response: &Response<Bytes>,
    ) -> Result<(), InterceptError> {
        if response_message_type(response.headers()) == Some(MessageType::TO2_DONE2) {
            self.handle_done2(ctx, response.body()).await;
        }
        Ok(())
    }
}

fn now_nanos() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default()
}
