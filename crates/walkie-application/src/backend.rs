//! Backend seams used by the application services.
//!
//! `ApiClient` implements all of them; tests substitute in-memory fakes.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use walkie_core::account::UserProfile;
use walkie_core::conversation::Conversation;
use walkie_core::payment::SubscriptionOrder;
use walkie_infrastructure::api::dto::{
    BuySubscriptionRequest, ChangePasswordRequest, ChangeUsernameRequest, LoginRequest,
    LoginResponse, PaymentStatusResponse,
};
use walkie_infrastructure::api::{ApiError, UploadFile};
use walkie_infrastructure::ApiClient;

#[async_trait]
pub trait AccountBackend: Send + Sync {
    async fn login(&self, request: &LoginRequest) -> Result<LoginResponse, ApiError>;
    async fn profile(&self, token: &str) -> Result<UserProfile, ApiError>;

    async fn change_password(
        &self,
        request: &ChangePasswordRequest,
        token: &str,
    ) -> Result<(), ApiError>;

    async fn change_username(
        &self,
        request: &ChangeUsernameRequest,
        token: &str,
    ) -> Result<(), ApiError>;
}

#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn list_chats(
        &self,
        token: &str,
        cancel: Option<&CancellationToken>,
    ) -> Result<Vec<Conversation>, ApiError>;

    async fn get_chat(
        &self,
        chat_id: &str,
        token: &str,
        cancel: Option<&CancellationToken>,
    ) -> Result<Conversation, ApiError>;

    async fn create_chat(&self, name: &str, token: &str) -> Result<Conversation, ApiError>;

    async fn delete_chat(&self, chat_id: &str, token: &str) -> Result<(), ApiError>;

    /// Returns the remote URL of the stored file.
    async fn upload_file(
        &self,
        file: UploadFile,
        token: &str,
        cancel: Option<&CancellationToken>,
    ) -> Result<String, ApiError>;
}

#[async_trait]
pub trait PaymentBackend: Send + Sync {
    async fn buy_subscription(
        &self,
        request: &BuySubscriptionRequest,
        token: &str,
    ) -> Result<SubscriptionOrder, ApiError>;

    async fn payment_status(
        &self,
        order_id: &str,
        token: &str,
    ) -> Result<PaymentStatusResponse, ApiError>;
}

#[async_trait]
impl AccountBackend for ApiClient {
    async fn login(&self, request: &LoginRequest) -> Result<LoginResponse, ApiError> {
        ApiClient::login(self, request).await
    }

    async fn profile(&self, token: &str) -> Result<UserProfile, ApiError> {
        ApiClient::profile(self, token).await
    }

    async fn change_password(
        &self,
        request: &ChangePasswordRequest,
        token: &str,
    ) -> Result<(), ApiError> {
        ApiClient::change_password(self, request, token).await.map(|_| ())
    }

    async fn change_username(
        &self,
        request: &ChangeUsernameRequest,
        token: &str,
    ) -> Result<(), ApiError> {
        ApiClient::change_username(self, request, token).await.map(|_| ())
    }
}

#[async_trait]
impl ChatBackend for ApiClient {
    async fn list_chats(
        &self,
        token: &str,
        cancel: Option<&CancellationToken>,
    ) -> Result<Vec<Conversation>, ApiError> {
        ApiClient::list_chats(self, token, cancel).await
    }

    async fn get_chat(
        &self,
        chat_id: &str,
        token: &str,
        cancel: Option<&CancellationToken>,
    ) -> Result<Conversation, ApiError> {
        ApiClient::get_chat(self, chat_id, token, cancel).await
    }

    async fn create_chat(&self, name: &str, token: &str) -> Result<Conversation, ApiError> {
        ApiClient::create_chat(self, name, token).await
    }

    async fn delete_chat(&self, chat_id: &str, token: &str) -> Result<(), ApiError> {
        ApiClient::delete_chat(self, chat_id, token).await.map(|_| ())
    }

    async fn upload_file(
        &self,
        file: UploadFile,
        token: &str,
        cancel: Option<&CancellationToken>,
    ) -> Result<String, ApiError> {
        ApiClient::upload_file(self, file, token, cancel).await
    }
}

#[async_trait]
impl PaymentBackend for ApiClient {
    async fn buy_subscription(
        &self,
        request: &BuySubscriptionRequest,
        token: &str,
    ) -> Result<SubscriptionOrder, ApiError> {
        ApiClient::buy_subscription(self, request, token).await
    }

    async fn payment_status(
        &self,
        order_id: &str,
        token: &str,
    ) -> Result<PaymentStatusResponse, ApiError> {
        ApiClient::payment_status(self, order_id, token).await
    }
}
