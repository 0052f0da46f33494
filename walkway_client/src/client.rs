use std::{path::Path, time::Duration};

use reqwest::{
    multipart::{Form, Part},
    Client, Method, RequestBuilder, Response, Url,
};
use serde::{de::DeserializeOwned, Serialize};
use walkway_lib::walkway::{
    AllWalkwayParams, ApiErrorResponse, CourseImageResponse, CreateWalkway, MyWalkwaysParams, PageParams, UpdateWalkway,
    WalkwayDetail, WalkwayHistoryRequest, WalkwayHistoryResponse, WalkwayIdResponse, WalkwayListResponse,
    WalkwaySearchParams, WalkwaysResponse,
};

use crate::{retry::send_with_retry, ClientError};

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub access_token: Option<String>,
    pub timeout: Duration,
    /// Attempts for idempotent reads. Writes are sent once.
    pub max_attempts: u32,
    pub retry_base_delay: Duration,
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            access_token: None,
            timeout: Duration::from_secs(10),
            max_attempts: 3,
            retry_base_delay: Duration::from_secs(1),
        }
    }

    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }
}

/// Typed access to the walkway REST backend.
#[derive(Clone)]
pub struct WalkwayClient {
    http: Client,
    base_url: Url,
    config: ClientConfig,
}

impl WalkwayClient {
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        let base_url = Url::parse(config.base_url.trim_end_matches('/'))
            .map_err(|err| ClientError::InvalidUrl(format!("{}: {err}", config.base_url)))?;
        if base_url.cannot_be_a_base() {
            return Err(ClientError::InvalidUrl(config.base_url.clone()));
        }

        let http = Client::builder().timeout(config.timeout).build()?;

        Ok(Self { http, base_url, config })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn url(&self, path: &str) -> Url {
        let mut url = self.base_url.clone();
        let joined = format!("{}{}", url.path().trim_end_matches('/'), path);
        url.set_path(&joined);
        url
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self.http.request(method, self.url(path));
        match &self.config.access_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn get_json<Q, T>(&self, path: &str, query: Option<&Q>, context: &str) -> Result<T, ClientError>
    where
        Q: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        tracing::debug!("GET {path}");
        let response = send_with_retry(
            || {
                let builder = self.request(Method::GET, path);
                match query {
                    Some(query) => builder.query(query),
                    None => builder,
                }
            },
            self.config.max_attempts,
            self.config.retry_base_delay,
            context,
        )
        .await?;

        Ok(check(response).await?.json().await?)
    }

    async fn send_once(&self, builder: RequestBuilder, context: &str) -> Result<Response, ClientError> {
        let response = builder.send().await.inspect_err(|err| tracing::error!("{context}: {err}"))?;
        check(response).await.inspect_err(|err| tracing::error!("{context}: {err}"))
    }

    pub async fn search_walkways(&self, params: &WalkwaySearchParams) -> Result<WalkwaysResponse, ClientError> {
        self.get_json("/walkways", Some(params), "search walkways").await
    }

    pub async fn get_all_walkways(&self, params: &AllWalkwayParams) -> Result<WalkwaysResponse, ClientError> {
        self.get_json("/walkways/all", Some(params), "list all walkways").await
    }

    pub async fn get_walkway_detail(&self, walkway_id: i64) -> Result<WalkwayDetail, ClientError> {
        self.get_json::<(), _>(&format!("/walkways/{walkway_id}"), None, "walkway detail").await
    }

    /// Uploads a course image and returns its id for [`CreateWalkway::course_image_id`].
    pub async fn upload_course_image(&self, file_name: &str, bytes: Vec<u8>) -> Result<i64, ClientError> {
        let part = Part::bytes(bytes)
            .file_name(file_name.to_string())
            .mime_str(image_mime(file_name))?;
        let form = Form::new().part("courseImage", part);

        tracing::debug!("POST /walkways/image ({file_name})");
        let response = self
            .send_once(self.request(Method::POST, "/walkways/image").multipart(form), "upload course image")
            .await?;
        Ok(response.json::<CourseImageResponse>().await?.course_image_id)
    }

    pub async fn upload_course_image_file(&self, path: &Path) -> Result<i64, ClientError> {
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("course_image");
        self.upload_course_image(file_name, bytes).await
    }

    pub async fn create_walkway(&self, walkway: &CreateWalkway) -> Result<i64, ClientError> {
        tracing::debug!("POST /walkways");
        let response = self
            .send_once(self.request(Method::POST, "/walkways").json(walkway), "create walkway")
            .await?;
        Ok(response.json::<WalkwayIdResponse>().await?.walkway_id)
    }

    pub async fn update_walkway(&self, walkway_id: i64, walkway: &UpdateWalkway) -> Result<i64, ClientError> {
        let path = format!("/walkways/{walkway_id}");
        tracing::debug!("PUT {path}");
        let response = self
            .send_once(self.request(Method::PUT, &path).json(walkway), "update walkway")
            .await?;
        Ok(response.json::<i64>().await?)
    }

    pub async fn get_my_walkways(&self, params: MyWalkwaysParams) -> Result<WalkwayListResponse, ClientError> {
        self.get_json("/users/walkways/upload", Some(&PageParams::from(params)), "my walkways").await
    }

    pub async fn get_liked_walkways(&self, params: PageParams) -> Result<WalkwayListResponse, ClientError> {
        self.get_json("/users/walkways/like", Some(&params), "liked walkways").await
    }

    /// Removes the like when `is_liked`, adds it otherwise.
    pub async fn toggle_like(&self, walkway_id: i64, is_liked: bool) -> Result<(), ClientError> {
        let path = format!("/walkways/{walkway_id}/likes");
        let method = if is_liked { Method::DELETE } else { Method::POST };
        tracing::debug!("{method} {path}");
        self.send_once(self.request(method, &path), "toggle like").await?;
        Ok(())
    }

    pub async fn create_walkway_history(
        &self,
        walkway_id: i64,
        history: &WalkwayHistoryRequest,
    ) -> Result<WalkwayHistoryResponse, ClientError> {
        let path = format!("/walkways/{walkway_id}/history");
        tracing::debug!("POST {path} {history:?}");
        let response = self
            .send_once(self.request(Method::POST, &path).json(history), "create walkway history")
            .await?;
        Ok(response.json().await?)
    }

    pub async fn delete_walkway(&self, walkway_id: i64) -> Result<(), ClientError> {
        let path = format!("/walkways/{walkway_id}");
        tracing::debug!("DELETE {path}");
        self.send_once(self.request(Method::DELETE, &path), "delete walkway").await?;
        Ok(())
    }
}

/// Turns a non-success response into [`ClientError::Api`], keeping the
/// server's message when the body carries one.
async fn check(response: Response) -> Result<Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ApiErrorResponse>(&body)
        .ok()
        .and_then(|error| error.message);

    Err(ClientError::Api { status, message })
}

fn image_mime(file_name: &str) -> &'static str {
    let extension = file_name.rsplit_once('.').map(|(_, ext)| ext.to_ascii_lowercase());
    match extension.as_deref() {
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        _ => "application/octet-stream",
    }
}

#[test]
fn mime_from_extension() {
    assert_eq!(image_mime("course.PNG"), "image/png");
    assert_eq!(image_mime("course.jpeg"), "image/jpeg");
    assert_eq!(image_mime("course"), "application/octet-stream");
}

#[test]
fn paths_join_onto_base_path() {
    let client = WalkwayClient::new(ClientConfig::new("https://api.example.com/api/")).unwrap();
    assert_eq!(client.url("/walkways/3").as_str(), "https://api.example.com/api/walkways/3");

    let client = WalkwayClient::new(ClientConfig::new("https://api.example.com")).unwrap();
    assert_eq!(client.url("/walkways").as_str(), "https://api.example.com/walkways");
}

#[test]
fn rejects_invalid_base_url() {
    assert!(matches!(
        WalkwayClient::new(ClientConfig::new("not a url")),
        Err(ClientError::InvalidUrl(_))
    ));
}
