//! Dropbox HTTP API v2 client

use crate::protocol::{
    self, ListFolderArg, ListFolderContinueArg, ListFolderResult, PathArg,
};
use async_trait::async_trait;
use dropfetch_config::RemoteConfig;
use dropfetch_types::{ByteStream, Error, ListPage, RemoteStore, Result};
use futures::{StreamExt, TryStreamExt};
use reqwest::header::{HeaderValue, AUTHORIZATION};
use serde::{de::DeserializeOwned, Serialize};
use std::time::Duration;
use tracing::debug;

/// Header carrying the JSON argument of content endpoints
const API_ARG_HEADER: &str = "Dropbox-API-Arg";

/// Dropbox client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// OAuth2 access token
    pub access_token: String,
    /// Base URL of the RPC endpoints
    pub api_url: String,
    /// Base URL of the content endpoints
    pub content_url: String,
    /// Timeout for connecting and for each RPC call
    pub request_timeout: Duration,
    /// User agent sent with every request
    pub user_agent: String,
}

impl ClientConfig {
    /// Create a configuration for the public Dropbox endpoints
    pub fn new(access_token: impl Into<String>) -> Self {
        Self::from(&RemoteConfig {
            access_token: access_token.into(),
            ..RemoteConfig::default()
        })
    }

    /// Point both endpoint families at a single base URL
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        self.api_url = base_url.clone();
        self.content_url = base_url;
        self
    }
}

impl From<&RemoteConfig> for ClientConfig {
    fn from(remote: &RemoteConfig) -> Self {
        Self {
            access_token: remote.access_token.clone(),
            api_url: remote.api_url.trim_end_matches('/').to_string(),
            content_url: remote.content_url.trim_end_matches('/').to_string(),
            request_timeout: remote.request_timeout(),
            user_agent: remote.user_agent.clone(),
        }
    }
}

/// Dropbox client implementing [`RemoteStore`]
#[derive(Debug, Clone)]
pub struct DropboxClient {
    config: ClientConfig,
    bearer: HeaderValue,
    http: reqwest::Client,
}

impl DropboxClient {
    /// Create a new client
    ///
    /// Fails when the token cannot be used as a header value or the HTTP
    /// client cannot be initialised; both are setup errors for the run.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let mut bearer = HeaderValue::from_str(&format!("Bearer {}", config.access_token))
            .map_err(|_| Error::config("access token contains invalid characters"))?;
        bearer.set_sensitive(true);

        // Download bodies may stream for longer than any sensible request timeout,
        // so only the connection phase is bounded at the client level.
        let http = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .connect_timeout(config.request_timeout)
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            config,
            bearer,
            http,
        })
    }

    /// Client configuration
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    async fn rpc<A, R>(&self, operation: &str, route: &str, arg: &A) -> Result<R>
    where
        A: Serialize + Sync,
        R: DeserializeOwned,
    {
        let url = format!("{}/2/{}", self.config.api_url, route);
        debug!(%url, "dropbox rpc");

        let response = self
            .http
            .post(&url)
            .header(AUTHORIZATION, self.bearer.clone())
            .timeout(self.config.request_timeout)
            .json(arg)
            .send()
            .await
            .map_err(|e| Error::remote(operation, e.to_string()))?;

        let response = Self::check_status(operation, response).await?;
        response
            .json::<R>()
            .await
            .map_err(|e| Error::remote(operation, format!("invalid response body: {}", e)))
    }

    async fn check_status(operation: &str, response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(Error::remote(
            operation,
            protocol::error_message(status.as_u16(), &body),
        ))
    }
}

#[async_trait]
impl RemoteStore for DropboxClient {
    async fn list_folder(&self, path: &str) -> Result<ListPage> {
        let arg = ListFolderArg {
            path,
            recursive: false,
        };
        let result: ListFolderResult = self.rpc("list_folder", "files/list_folder", &arg).await?;
        Ok(result.into())
    }

    async fn list_folder_continue(&self, cursor: &str) -> Result<ListPage> {
        let arg = ListFolderContinueArg { cursor };
        let result: ListFolderResult = self
            .rpc("list_folder_continue", "files/list_folder/continue", &arg)
            .await?;
        Ok(result.into())
    }

    async fn download(&self, remote_path: &str) -> Result<ByteStream> {
        let url = format!("{}/2/files/download", self.config.content_url);
        let arg = protocol::header_arg(&PathArg { path: remote_path })
            .map_err(|e| Error::remote("download", e.to_string()))?;

        let response = self
            .http
            .post(&url)
            .header(AUTHORIZATION, self.bearer.clone())
            .header(API_ARG_HEADER, arg)
            .send()
            .await
            .map_err(|e| Error::remote("download", e.to_string()))?;

        let response = Self::check_status("download", response).await?;
        Ok(response
            .bytes_stream()
            .map_err(|e| Error::remote("download", e.to_string()))
            .boxed())
    }

    async fn delete(&self, remote_path: &str) -> Result<()> {
        let arg = PathArg { path: remote_path };
        let _: serde_json::Value = self.rpc("delete_v2", "files/delete_v2", &arg).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dropfetch_types::{ErrorKind, RemoteEntry};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    /// Serve exactly one canned HTTP response and hand back the raw request
    async fn one_shot_server(status: &'static str, body: &'static str) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                request.extend_from_slice(&buf[..n]);
                if n == 0 || request_complete(&request) {
                    break;
                }
            }

            let response = format!(
                "HTTP/1.1 {}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
            String::from_utf8_lossy(&request).into_owned()
        });

        (format!("http://{}", addr), handle)
    }

    fn request_complete(request: &[u8]) -> bool {
        let text = String::from_utf8_lossy(request);
        let Some(header_end) = text.find("\r\n\r\n") else {
            return false;
        };
        let content_length = text[..header_end]
            .lines()
            .find_map(|line| {
                let (name, value) = line.split_once(':')?;
                name.eq_ignore_ascii_case("content-length")
                    .then(|| value.trim().parse::<usize>().ok())
                    .flatten()
            })
            .unwrap_or(0);
        request.len() >= header_end + 4 + content_length
    }

    fn client_for(base_url: &str) -> DropboxClient {
        DropboxClient::new(ClientConfig::new("sl.test-token").with_base_url(base_url)).unwrap()
    }

    #[test]
    fn test_client_config_from_remote_config() {
        let remote = RemoteConfig {
            access_token: "sl.abc".to_string(),
            api_url: "https://api.example.com/".to_string(),
            ..RemoteConfig::default()
        };
        let config = ClientConfig::from(&remote);

        assert_eq!(config.api_url, "https://api.example.com");
        assert_eq!(config.content_url, "https://content.dropboxapi.com");
        assert_eq!(config.request_timeout, Duration::from_secs(300));
    }

    #[test]
    fn test_invalid_token_is_config_error() {
        let err = DropboxClient::new(ClientConfig::new("bad\ntoken")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
    }

    #[tokio::test]
    async fn test_list_folder_request_and_response() {
        let (base_url, server) = one_shot_server(
            "200 OK",
            r#"{"entries":[{".tag":"file","name":"A.txt","path_lower":"/inbox/a.txt","content_hash":"abc"}],"cursor":"c1","has_more":false}"#,
        )
        .await;

        let page = client_for(&base_url).list_folder("/Inbox").await.unwrap();
        let request = server.await.unwrap();

        assert!(request.starts_with("POST /2/files/list_folder HTTP/1.1"));
        assert!(request.contains("authorization: Bearer sl.test-token"));
        assert!(request.contains(r#""path":"/Inbox""#));
        assert!(!page.has_more);
        assert_eq!(page.cursor, "c1");
        assert!(matches!(&page.entries[0], RemoteEntry::File(f) if f.content_hash == "abc"));
    }

    #[tokio::test]
    async fn test_delete_conflict_maps_to_remote_error() {
        let (base_url, server) = one_shot_server(
            "409 Conflict",
            r#"{"error_summary":"path_lookup/not_found/.","error":{".tag":"path_lookup"}}"#,
        )
        .await;

        let err = client_for(&base_url).delete("/inbox/a.txt").await.unwrap_err();
        let request = server.await.unwrap();

        assert!(request.starts_with("POST /2/files/delete_v2 HTTP/1.1"));
        assert_eq!(err.kind(), ErrorKind::Remote);
        assert!(err.to_string().contains("path_lookup/not_found"));
    }

    #[tokio::test]
    async fn test_download_streams_body() {
        let (base_url, server) = one_shot_server("200 OK", "hello dropbox").await;

        let stream = client_for(&base_url).download("/inbox/a.txt").await.unwrap();
        let chunks: Vec<bytes::Bytes> = stream.try_collect().await.unwrap();
        let request = server.await.unwrap();

        assert!(request.starts_with("POST /2/files/download HTTP/1.1"));
        assert!(request.contains(r#"dropbox-api-arg: {"path":"/inbox/a.txt"}"#));
        assert_eq!(chunks.concat(), b"hello dropbox");
    }
}
