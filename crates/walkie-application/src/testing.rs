//! In-memory backend used by the unit tests of this crate.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use walkie_core::account::UserProfile;
use walkie_core::conversation::Conversation;
use walkie_core::payment::{PaymentStatus, SubscriptionOrder};
use walkie_infrastructure::api::dto::{
    BuySubscriptionRequest, ChangePasswordRequest, ChangeUsernameRequest, LoginRequest,
    LoginResponse, PaymentStatusResponse,
};
use walkie_infrastructure::api::{ApiError, UploadFile};

use crate::backend::{AccountBackend, ChatBackend, PaymentBackend};

pub(crate) fn rejected(message: &str) -> ApiError {
    ApiError::Rejected {
        status: 400,
        message: message.to_string(),
    }
}

pub(crate) fn profile(username: &str) -> UserProfile {
    UserProfile {
        userid: 1,
        username: username.to_string(),
        email: format!("{username}@example.com"),
        credits: 10,
        registerdate: 1_700_000_000,
        message_count: 0,
        message_limit: 50,
        subscriptionid: 0,
        subscriptionexpiry: None,
    }
}

#[derive(Default)]
pub(crate) struct FakeBackend {
    pub login_result: Mutex<Option<Result<LoginResponse, ApiError>>>,
    pub profile_result: Mutex<Option<Result<UserProfile, ApiError>>>,
    pub profile_calls: AtomicUsize,
    /// Answer for both account changes; `None` accepts them.
    pub account_change_error: Mutex<Option<ApiError>>,
    pub account_changes: Mutex<Vec<String>>,

    pub chats: Mutex<Vec<Conversation>>,
    pub create_result: Mutex<Option<Result<Conversation, ApiError>>>,
    /// When set, `create_chat` waits for the sender before answering.
    pub create_hold: Mutex<Option<oneshot::Receiver<()>>>,
    pub delete_error: Mutex<Option<ApiError>>,
    pub upload_result: Mutex<Option<Result<String, ApiError>>>,
    pub uploads: Mutex<Vec<UploadFile>>,

    pub statuses: Mutex<VecDeque<PaymentStatus>>,
    pub status_calls: AtomicUsize,
}

impl FakeBackend {
    pub fn status_calls(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }

    pub fn profile_calls(&self) -> usize {
        self.profile_calls.load(Ordering::SeqCst)
    }

    fn account_change(&self, change: String) -> Result<(), ApiError> {
        self.account_changes.lock().unwrap().push(change);
        match self.account_change_error.lock().unwrap().clone() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl AccountBackend for FakeBackend {
    async fn login(&self, _request: &LoginRequest) -> Result<LoginResponse, ApiError> {
        self.login_result
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| Err(rejected("Invalid credentials")))
    }

    async fn profile(&self, _token: &str) -> Result<UserProfile, ApiError> {
        self.profile_calls.fetch_add(1, Ordering::SeqCst);
        self.profile_result
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| Ok(profile("ada")))
    }

    async fn change_password(
        &self,
        request: &ChangePasswordRequest,
        _token: &str,
    ) -> Result<(), ApiError> {
        self.account_change(format!("password:{}", request.newpassword))
    }

    async fn change_username(
        &self,
        request: &ChangeUsernameRequest,
        _token: &str,
    ) -> Result<(), ApiError> {
        self.account_change(format!("username:{}", request.username))
    }
}

#[async_trait]
impl ChatBackend for FakeBackend {
    async fn list_chats(
        &self,
        _token: &str,
        _cancel: Option<&CancellationToken>,
    ) -> Result<Vec<Conversation>, ApiError> {
        Ok(self.chats.lock().unwrap().clone())
    }

    async fn get_chat(
        &self,
        chat_id: &str,
        _token: &str,
        cancel: Option<&CancellationToken>,
    ) -> Result<Conversation, ApiError> {
        if cancel.is_some_and(CancellationToken::is_cancelled) {
            return Err(ApiError::Cancelled);
        }
        self.chats
            .lock()
            .unwrap()
            .iter()
            .find(|c| c.id == chat_id)
            .cloned()
            .ok_or_else(|| rejected("Chat not found"))
    }

    async fn create_chat(&self, name: &str, _token: &str) -> Result<Conversation, ApiError> {
        let hold = self.create_hold.lock().unwrap().take();
        if let Some(hold) = hold {
            let _ = hold.await;
        }
        self.create_result
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| Ok(Conversation::new("srv-1", name)))
    }

    async fn delete_chat(&self, _chat_id: &str, _token: &str) -> Result<(), ApiError> {
        match self.delete_error.lock().unwrap().clone() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    async fn upload_file(
        &self,
        file: UploadFile,
        _token: &str,
        _cancel: Option<&CancellationToken>,
    ) -> Result<String, ApiError> {
        let url = format!("https://cdn.example/{}", file.file_name);
        self.uploads.lock().unwrap().push(file);
        self.upload_result
            .lock()
            .unwrap()
            .clone()
            .unwrap_or(Ok(url))
    }
}

#[async_trait]
impl PaymentBackend for FakeBackend {
    async fn buy_subscription(
        &self,
        request: &BuySubscriptionRequest,
        _token: &str,
    ) -> Result<SubscriptionOrder, ApiError> {
        Ok(SubscriptionOrder {
            orderid: "order-1".to_string(),
            amount: "9.99".to_string(),
            address: "addr".to_string(),
            network: "mainnet".to_string(),
            crypto: request.crypto.clone(),
            qr: String::new(),
            subscription: request.subscriptionid.to_string(),
        })
    }

    async fn payment_status(
        &self,
        _order_id: &str,
        _token: &str,
    ) -> Result<PaymentStatusResponse, ApiError> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        let status = self
            .statuses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(PaymentStatus::Waiting);
        Ok(PaymentStatusResponse {
            status,
            message: format!("Payment {status}"),
        })
    }
}
