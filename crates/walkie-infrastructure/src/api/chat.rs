//! Conversation, upload and image endpoints.

use reqwest::Method;
use reqwest::multipart::{Form, Part};
use tokio_util::sync::CancellationToken;
use walkie_core::conversation::Conversation;

use super::client::ApiClient;
use super::dto::{
    ApiMessage, ChatListResponse, ChatResponse, CreateChatRequest, ImageGenerationRequest,
    ImageGenerationResponse, UploadResponse,
};
use super::error::ApiError;

/// A file ready to be sent to `/upload`.
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl ApiClient {
    pub async fn list_chats(
        &self,
        token: &str,
        cancel: Option<&CancellationToken>,
    ) -> Result<Vec<Conversation>, ApiError> {
        let response: ChatListResponse = self
            .call::<(), _>(Method::GET, "/chats", None, Some(token), cancel)
            .await?;
        Ok(response.chats)
    }

    pub async fn get_chat(
        &self,
        chat_id: &str,
        token: &str,
        cancel: Option<&CancellationToken>,
    ) -> Result<Conversation, ApiError> {
        let endpoint = format!("/chat/{}", chat_id);
        let response: ChatResponse = self
            .call::<(), _>(Method::GET, &endpoint, None, Some(token), cancel)
            .await?;
        Ok(response.chat)
    }

    pub async fn create_chat(&self, name: &str, token: &str) -> Result<Conversation, ApiError> {
        let request = CreateChatRequest {
            chatname: name.to_string(),
        };
        let response: ChatResponse = self
            .call(Method::POST, "/chat/create", Some(&request), Some(token), None)
            .await?;
        Ok(response.chat)
    }

    pub async fn delete_chat(&self, chat_id: &str, token: &str) -> Result<ApiMessage, ApiError> {
        let endpoint = format!("/chat/{}", chat_id);
        self.call::<(), _>(Method::DELETE, &endpoint, None, Some(token), None)
            .await
    }

    /// Multipart upload; returns the remote URL of the stored file.
    pub async fn upload_file(
        &self,
        file: UploadFile,
        token: &str,
        cancel: Option<&CancellationToken>,
    ) -> Result<String, ApiError> {
        let part = Part::bytes(file.bytes)
            .file_name(file.file_name)
            .mime_str(&file.mime_type)
            .map_err(|e| ApiError::InvalidRequest(e.to_string()))?;
        let form = Form::new().part("file", part);

        let builder = self.http_post("/upload").multipart(form);
        let response: UploadResponse = self
            .execute(Method::POST, "/upload", builder, Some(token), cancel)
            .await?;
        Ok(response.url)
    }

    pub async fn generate_image(
        &self,
        request: &ImageGenerationRequest,
        token: &str,
    ) -> Result<ImageGenerationResponse, ApiError> {
        self.call(Method::POST, "/image/generation", Some(request), Some(token), None)
            .await
    }
}
