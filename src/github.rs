use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use bytes::Bytes;
use reqwest::{Client, RequestBuilder, StatusCode, Url};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::{
    config::RelayConfig,
    error::{RelayError, Result},
    store::RemoteStore,
    types::{DeleteResult, EntryType, Listing, RemoteEntry, RepoCoordinate, WriteResult},
};

pub(crate) const USER_AGENT: &str = "content-relay/0.1";

/// GitHub-backed destination store
///
/// Uses the REST contents API of a single repository and branch:
/// - `GET    /repos/{owner}/{repo}/contents/?ref={branch}` for listings
/// - `GET    /repos/{owner}/{repo}/contents/{path}?ref={branch}` for tokens
/// - `PUT    /repos/{owner}/{repo}/contents/{path}` to create or update
/// - `DELETE /repos/{owner}/{repo}/contents/{path}` to delete
#[derive(Clone)]
pub struct GitHubStore {
    client: Client,
    api_base: Url,
    coord: RepoCoordinate,
    token: String,
    timeout: Duration,
}

#[derive(Deserialize)]
struct GitHubApiEntry {
    name: String,
    sha: String,
    #[serde(rename = "type")]
    entry_type: String,
}

#[derive(Deserialize)]
struct GitHubContentMeta {
    sha: Option<String>,
}

#[derive(Serialize)]
struct PutContentRequest<'a> {
    message: &'a str,
    content: String,
    branch: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    sha: Option<String>,
}

#[derive(Serialize)]
struct DeleteContentRequest<'a> {
    message: &'a str,
    sha: &'a str,
    branch: &'a str,
}

impl GitHubStore {
    /// Create a store client for the destination configured in `config`
    pub fn new(config: &RelayConfig) -> Result<Self> {
        let client = Client::builder().user_agent(USER_AGENT).build()?;
        let api_base = Url::parse(&config.api_base).map_err(|e| RelayError::InvalidConfig {
            message: format!("api_base {}: {}", config.api_base, e),
        })?;
        if api_base.cannot_be_a_base() {
            return Err(RelayError::InvalidConfig {
                message: format!("api_base {} cannot carry a path", config.api_base),
            });
        }

        Ok(Self {
            client,
            api_base,
            coord: config.store.clone(),
            token: config.token.clone(),
            timeout: config.api_timeout(),
        })
    }

    /// Build the contents API URL for a path (empty path lists the root)
    ///
    /// Every segment is percent-encoded, so names holding `#`, `?` or
    /// spaces address the file rather than a fragment or query.
    fn contents_url(&self, path: &str) -> Result<Url> {
        let mut url = self.api_base.clone();
        {
            let mut segments = url.path_segments_mut().map_err(|_| RelayError::InvalidConfig {
                message: format!("api_base {} cannot carry a path", self.api_base),
            })?;
            segments.pop_if_empty().extend([
                "repos",
                self.coord.owner.as_str(),
                self.coord.repo.as_str(),
                "contents",
            ]);

            let parts: Vec<&str> = path.split('/').filter(|p| !p.is_empty()).collect();
            if parts.is_empty() {
                segments.push("");
            } else {
                segments.extend(parts);
            }
        }
        Ok(url)
    }

    /// Attach auth, accept header and timeout to a request
    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("Authorization", format!("token {}", self.token))
            .header("Accept", "application/vnd.github.v3+json")
            .timeout(self.timeout)
    }
}

#[async_trait]
impl RemoteStore for GitHubStore {
    async fn list_entries(&self) -> Result<Listing> {
        let url = self.contents_url("")?;
        tracing::debug!("GET {url}");

        let response = self
            .authorized(self.client.get(url))
            .query(&[("ref", &self.coord.branch)])
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => {
                let api_entries: Vec<GitHubApiEntry> = response.json().await?;

                let entries = api_entries
                    .into_iter()
                    .filter_map(|e| match EntryType::from_api(&e.entry_type) {
                        Some(entry_type) => Some(RemoteEntry {
                            name: e.name,
                            sha: e.sha,
                            entry_type,
                        }),
                        None => {
                            tracing::warn!("skipping {} with unknown type {}", e.name, e.entry_type);
                            None
                        }
                    })
                    .collect();

                Ok(entries)
            }
            status => Err(RelayError::RemoteListFailed {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            }),
        }
    }

    async fn get_sha(&self, path: &str) -> Option<String> {
        let url = match self.contents_url(path) {
            Ok(url) => url,
            Err(e) => {
                tracing::warn!("sha lookup for {path} failed: {e}");
                return None;
            }
        };
        tracing::debug!("GET {url}");

        let response = match self
            .authorized(self.client.get(url))
            .query(&[("ref", &self.coord.branch)])
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!("sha lookup for {path} failed: {e}");
                return None;
            }
        };

        match response.status() {
            StatusCode::OK => match response.json::<GitHubContentMeta>().await {
                Ok(meta) => meta.sha,
                Err(e) => {
                    tracing::warn!("sha lookup for {path} returned unreadable metadata: {e}");
                    None
                }
            },
            StatusCode::NOT_FOUND => None,
            status => {
                tracing::warn!("sha lookup for {path} returned {status}");
                None
            }
        }
    }

    async fn write_file(&self, path: &str, content: Bytes, message: &str) -> Result<WriteResult> {
        let sha = self.get_sha(path).await;
        let url = self.contents_url(path)?;
        tracing::debug!(
            "PUT {url} ({} bytes, {})",
            content.len(),
            if sha.is_some() { "update" } else { "create" }
        );

        let payload = PutContentRequest {
            message,
            content: STANDARD.encode(&content),
            branch: &self.coord.branch,
            sha,
        };

        let response = self
            .authorized(self.client.put(url))
            .json(&payload)
            .send()
            .await?;

        Ok(WriteResult {
            status: response.status().as_u16(),
            body: response.text().await.unwrap_or_default(),
        })
    }

    async fn delete_file(&self, path: &str, sha: &str, message: &str) -> Result<DeleteResult> {
        let url = self.contents_url(path)?;
        tracing::debug!("DELETE {url}");

        let payload = DeleteContentRequest {
            message,
            sha,
            branch: &self.coord.branch,
        };

        let response = self
            .authorized(self.client.delete(url))
            .json(&payload)
            .send()
            .await?;

        Ok(DeleteResult {
            status: response.status().as_u16(),
            body: response.text().await.unwrap_or_default(),
        })
    }

    fn identifier(&self) -> String {
        format!("github://{}", self.coord)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use serde_json::json;

    fn store_for(server: &mockito::ServerGuard) -> GitHubStore {
        let config = RelayConfig::new(RepoCoordinate::new("me", "vault", "main"), "t0k")
            .with_endpoints(&server.url(), &server.url());
        GitHubStore::new(&config).unwrap()
    }

    #[test]
    fn test_contents_url() {
        let config = RelayConfig::new(RepoCoordinate::new("me", "vault", "main"), "t0k");
        let store = GitHubStore::new(&config).unwrap();

        assert_eq!(
            store.contents_url("").unwrap().as_str(),
            "https://api.github.com/repos/me/vault/contents/"
        );
        assert_eq!(
            store.contents_url("/a.zip").unwrap().as_str(),
            "https://api.github.com/repos/me/vault/contents/a.zip"
        );
        assert_eq!(store.identifier(), "github://me/vault@main");
    }

    #[test]
    fn test_contents_url_encodes_segments() {
        let config = RelayConfig::new(RepoCoordinate::new("me", "vault", "main"), "t0k")
            .with_endpoints("http://127.0.0.1:9000/api/v3/", "http://127.0.0.1:9000");
        let store = GitHubStore::new(&config).unwrap();

        assert_eq!(
            store.contents_url("a#1.zip").unwrap().as_str(),
            "http://127.0.0.1:9000/api/v3/repos/me/vault/contents/a%231.zip"
        );
        assert_eq!(
            store.contents_url("what?.zip").unwrap().as_str(),
            "http://127.0.0.1:9000/api/v3/repos/me/vault/contents/what%3F.zip"
        );
        assert_eq!(
            store.contents_url("my file.zip").unwrap().as_str(),
            "http://127.0.0.1:9000/api/v3/repos/me/vault/contents/my%20file.zip"
        );
    }

    #[test]
    fn test_rejects_unusable_api_base() {
        let config = RelayConfig::new(RepoCoordinate::new("me", "vault", "main"), "t0k")
            .with_endpoints("not a url", "https://github.com");
        assert!(matches!(
            GitHubStore::new(&config),
            Err(RelayError::InvalidConfig { .. })
        ));
    }

    #[tokio::test]
    async fn test_delete_name_with_fragment_character() {
        let mut server = mockito::Server::new_async().await;
        let encoded = server
            .mock("DELETE", "/repos/me/vault/contents/a%231.zip")
            .match_body(Matcher::PartialJson(json!({"sha": "s1"})))
            .with_status(200)
            .with_body("{}")
            .create_async()
            .await;
        let truncated = server
            .mock("DELETE", "/repos/me/vault/contents/a")
            .expect(0)
            .create_async()
            .await;

        let result = store_for(&server)
            .delete_file("a#1.zip", "s1", "Delete a#1.zip")
            .await
            .unwrap();
        encoded.assert_async().await;
        truncated.assert_async().await;
        assert!(result.is_success());
    }

    #[tokio::test]
    async fn test_list_entries() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/repos/me/vault/contents/")
            .match_query(Matcher::UrlEncoded("ref".into(), "main".into()))
            .match_header("authorization", "token t0k")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!([
                    {"name": "a.zip", "path": "a.zip", "sha": "s1", "type": "file"},
                    {"name": "docs", "path": "docs", "sha": "s2", "type": "dir"}
                ])
                .to_string(),
            )
            .create_async()
            .await;

        let listing = store_for(&server).list_entries().await.unwrap();
        mock.assert_async().await;

        assert_eq!(listing.len(), 2);
        assert_eq!(listing[0].name, "a.zip");
        assert_eq!(listing[0].sha, "s1");
        assert_eq!(listing[0].entry_type, EntryType::File);
        assert_eq!(listing[1].entry_type, EntryType::Dir);
    }

    #[tokio::test]
    async fn test_list_failure_is_distinguishable_from_empty() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/repos/me/vault/contents/")
            .match_query(Matcher::Any)
            .with_status(401)
            .with_body(r#"{"message":"Bad credentials"}"#)
            .create_async()
            .await;

        match store_for(&server).list_entries().await {
            Err(RelayError::RemoteListFailed { status, body }) => {
                assert_eq!(status, 401);
                assert!(body.contains("Bad credentials"));
            }
            other => panic!("expected RemoteListFailed, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_get_sha() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/repos/me/vault/contents/a.zip")
            .match_query(Matcher::UrlEncoded("ref".into(), "main".into()))
            .with_status(200)
            .with_body(json!({"name": "a.zip", "sha": "abc123"}).to_string())
            .create_async()
            .await;
        server
            .mock("GET", "/repos/me/vault/contents/missing.zip")
            .match_query(Matcher::Any)
            .with_status(404)
            .with_body(r#"{"message":"Not Found"}"#)
            .create_async()
            .await;

        let store = store_for(&server);
        assert_eq!(store.get_sha("a.zip").await.as_deref(), Some("abc123"));
        assert_eq!(store.get_sha("missing.zip").await, None);
    }

    #[tokio::test]
    async fn test_write_creates_without_sha() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/repos/me/vault/contents/new.zip")
            .match_query(Matcher::Any)
            .with_status(404)
            .create_async()
            .await;
        let put = server
            .mock("PUT", "/repos/me/vault/contents/new.zip")
            .match_body(Matcher::Json(json!({
                "message": "Add or update new.zip",
                "content": STANDARD.encode(b"PK\x03\x04"),
                "branch": "main"
            })))
            .with_status(201)
            .with_body(r#"{"content":{"name":"new.zip"}}"#)
            .create_async()
            .await;

        let result = store_for(&server)
            .write_file("new.zip", Bytes::from_static(b"PK\x03\x04"), "Add or update new.zip")
            .await
            .unwrap();
        put.assert_async().await;

        assert!(result.is_success());
        assert_eq!(result.status, 201);
    }

    #[tokio::test]
    async fn test_write_updates_with_current_sha() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/repos/me/vault/contents/a.zip")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(json!({"sha": "old-sha"}).to_string())
            .create_async()
            .await;
        let put = server
            .mock("PUT", "/repos/me/vault/contents/a.zip")
            .match_body(Matcher::PartialJson(json!({"sha": "old-sha", "branch": "main"})))
            .with_status(200)
            .with_body("{}")
            .create_async()
            .await;

        let result = store_for(&server)
            .write_file("a.zip", Bytes::from_static(b"data"), "Add or update a.zip")
            .await
            .unwrap();
        put.assert_async().await;
        assert_eq!(result.status, 200);
    }

    #[tokio::test]
    async fn test_write_conflict_is_reported_verbatim() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/repos/me/vault/contents/a.zip")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(json!({"sha": "stale"}).to_string())
            .create_async()
            .await;
        server
            .mock("PUT", "/repos/me/vault/contents/a.zip")
            .with_status(409)
            .with_body(r#"{"message":"a.zip does not match stale"}"#)
            .create_async()
            .await;

        let result = store_for(&server)
            .write_file("a.zip", Bytes::from_static(b"data"), "Add or update a.zip")
            .await
            .unwrap();

        assert!(!result.is_success());
        assert_eq!(result.status, 409);
        assert!(result.body.contains("does not match"));
    }

    #[tokio::test]
    async fn test_delete_sends_sha_and_branch() {
        let mut server = mockito::Server::new_async().await;
        let delete = server
            .mock("DELETE", "/repos/me/vault/contents/a.zip")
            .match_body(Matcher::Json(json!({
                "message": "Delete a.zip",
                "sha": "s1",
                "branch": "main"
            })))
            .with_status(200)
            .with_body("{}")
            .create_async()
            .await;

        let result = store_for(&server)
            .delete_file("a.zip", "s1", "Delete a.zip")
            .await
            .unwrap();
        delete.assert_async().await;
        assert!(result.is_success());
    }
}
