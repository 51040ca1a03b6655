//! Account model and the refresh seam used after usage is debited.

use serde::{Deserialize, Serialize};

/// The authenticated user's profile as returned by `/me`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub userid: i64,
    pub username: String,
    pub email: String,
    #[serde(default)]
    pub credits: i64,
    #[serde(default)]
    pub registerdate: i64,
    #[serde(rename = "messageCount", default)]
    pub message_count: i64,
    #[serde(rename = "messageLimit", default)]
    pub message_limit: i64,
    #[serde(default)]
    pub subscriptionid: i64,
    #[serde(default)]
    pub subscriptionexpiry: Option<i64>,
}

impl UserProfile {
    pub fn remaining_messages(&self) -> i64 {
        (self.message_limit - self.message_count).max(0)
    }
}

/// Re-fetches account/credit state.
///
/// The realtime controller calls this when a streamed turn finishes or fails,
/// since the backend may have debited usage.
#[async_trait::async_trait]
pub trait AccountRefresh: Send + Sync {
    async fn refresh_account(&self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_profile() {
        let json = r#"{
            "success": true,
            "userid": 7,
            "username": "ada",
            "email": "ada@example.com",
            "credits": 120,
            "registerdate": 1700000000,
            "messageCount": 3,
            "messageLimit": 50,
            "subscriptionid": 1,
            "subscriptionexpiry": null
        }"#;
        let profile: UserProfile = serde_json::from_str(json).unwrap();
        assert_eq!(profile.username, "ada");
        assert_eq!(profile.remaining_messages(), 47);
        assert!(profile.subscriptionexpiry.is_none());
    }
}
