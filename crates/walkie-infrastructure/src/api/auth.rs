//! Account endpoints.

use reqwest::Method;
use walkie_core::account::UserProfile;

use super::client::ApiClient;
use super::dto::{
    ApiMessage, ChangePasswordRequest, ChangeUsernameRequest, ConfirmResetRequest,
    EmailChallengeRequest, LoginRequest, LoginResponse, RegisterRequest, VerifyEmailRequest,
};
use super::error::ApiError;

impl ApiClient {
    pub async fn register(&self, request: &RegisterRequest) -> Result<ApiMessage, ApiError> {
        self.call(Method::POST, "/register", Some(request), None, None)
            .await
    }

    pub async fn login(&self, request: &LoginRequest) -> Result<LoginResponse, ApiError> {
        self.call(Method::POST, "/login", Some(request), None, None)
            .await
    }

    pub async fn verify_email(&self, token: &str) -> Result<ApiMessage, ApiError> {
        let request = VerifyEmailRequest {
            token: token.to_string(),
        };
        self.call(Method::POST, "/verify-email", Some(&request), None, None)
            .await
    }

    pub async fn resend_verification(
        &self,
        request: &EmailChallengeRequest,
    ) -> Result<ApiMessage, ApiError> {
        self.call(Method::POST, "/resend-verification", Some(request), None, None)
            .await
    }

    pub async fn reset_password(
        &self,
        request: &EmailChallengeRequest,
    ) -> Result<ApiMessage, ApiError> {
        self.call(Method::POST, "/resetpassword", Some(request), None, None)
            .await
    }

    pub async fn confirm_reset_password(
        &self,
        request: &ConfirmResetRequest,
    ) -> Result<ApiMessage, ApiError> {
        self.call(Method::POST, "/resetpassword/confirm", Some(request), None, None)
            .await
    }

    /// `/me`.
    pub async fn profile(&self, token: &str) -> Result<UserProfile, ApiError> {
        self.call::<(), _>(Method::GET, "/me", None, Some(token), None)
            .await
    }

    pub async fn change_password(
        &self,
        request: &ChangePasswordRequest,
        token: &str,
    ) -> Result<ApiMessage, ApiError> {
        self.call(Method::POST, "/change/password", Some(request), Some(token), None)
            .await
    }

    pub async fn change_username(
        &self,
        request: &ChangeUsernameRequest,
        token: &str,
    ) -> Result<ApiMessage, ApiError> {
        self.call(Method::POST, "/change/username", Some(request), Some(token), None)
            .await
    }
}
