//! Request and response bodies of the REST endpoints.

use serde::{Deserialize, Serialize};
use walkie_core::conversation::Conversation;
use walkie_core::payment::{BillingPeriod, PaymentStatus, SubscriptionOrder};

// ---- requests ----

#[derive(Debug, Clone, Serialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub hcaptcha: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
    pub hcaptcha: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct VerifyEmailRequest {
    pub token: String,
}

/// Body of both `/resend-verification` and `/resetpassword`.
#[derive(Debug, Clone, Serialize)]
pub struct EmailChallengeRequest {
    pub email: String,
    pub hcaptcha: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConfirmResetRequest {
    pub token: String,
    #[serde(rename = "newPassword")]
    pub new_password: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChangePasswordRequest {
    pub oldpassword: String,
    pub newpassword: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChangeUsernameRequest {
    pub username: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateChatRequest {
    pub chatname: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ImageGenerationRequest {
    pub model: String,
    pub prompt: String,
    pub safetychecker: bool,
    pub chatid: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct BuySubscriptionRequest {
    pub subscriptionid: i64,
    pub crypto: String,
    #[serde(rename = "type")]
    pub period: BillingPeriod,
}

#[derive(Debug, Clone, Serialize)]
pub struct BuyCreditsRequest {
    pub amount: u64,
    pub crypto: String,
}

// ---- responses ----

/// Minimal `{success, message}` envelope.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiMessage {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatListResponse {
    #[serde(default)]
    pub chats: Vec<Conversation>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatResponse {
    pub chat: Conversation,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UploadResponse {
    pub url: String,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ImageGenerationResponse {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default, alias = "image")]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubscriptionResponse {
    pub details: SubscriptionOrder,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaymentStatusResponse {
    pub status: PaymentStatus,
    #[serde(default)]
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_wire_names() {
        let body = serde_json::to_value(BuySubscriptionRequest {
            subscriptionid: 2,
            crypto: "btc".to_string(),
            period: BillingPeriod::Monthly,
        })
        .unwrap();
        assert_eq!(body["type"], "monthly");

        let body = serde_json::to_value(ConfirmResetRequest {
            token: "t".to_string(),
            new_password: "p".to_string(),
        })
        .unwrap();
        assert_eq!(body["newPassword"], "p");
    }

    #[test]
    fn test_chat_list_decodes_summaries() {
        let list: ChatListResponse = serde_json::from_str(
            r#"{"success":true,"chats":[{"chatid":"c1","chatname":"First"}]}"#,
        )
        .unwrap();
        assert_eq!(list.chats.len(), 1);
        assert!(list.chats[0].turns.is_none());
    }
}
