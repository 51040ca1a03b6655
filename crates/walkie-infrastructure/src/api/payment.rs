//! Subscription and credit purchase endpoints.

use reqwest::Method;
use walkie_core::payment::SubscriptionOrder;

use super::client::ApiClient;
use super::dto::{
    ApiMessage, BuyCreditsRequest, BuySubscriptionRequest, PaymentStatusResponse,
    SubscriptionResponse,
};
use super::error::ApiError;

impl ApiClient {
    pub async fn buy_subscription(
        &self,
        request: &BuySubscriptionRequest,
        token: &str,
    ) -> Result<SubscriptionOrder, ApiError> {
        let response: SubscriptionResponse = self
            .call(Method::POST, "/buysubscription", Some(request), Some(token), None)
            .await?;
        Ok(response.details)
    }

    pub async fn payment_status(
        &self,
        order_id: &str,
        token: &str,
    ) -> Result<PaymentStatusResponse, ApiError> {
        let endpoint = format!("/payment/status/{}", order_id);
        self.call::<(), _>(Method::GET, &endpoint, None, Some(token), None)
            .await
    }

    pub async fn buy_credits(
        &self,
        request: &BuyCreditsRequest,
        token: &str,
    ) -> Result<ApiMessage, ApiError> {
        self.call(Method::POST, "/buycredits", Some(request), Some(token), None)
            .await
    }
}
