use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    error::{RelayError, Result},
    relay::Relay,
    types::IndexedEntry,
};

/// An inbound request, as handed over by the transport layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Upload { source: String },
    List,
    Delete { index: i64 },
}

#[derive(Deserialize)]
struct UploadBody {
    gurl: Option<String>,
}

#[derive(Deserialize)]
struct DeleteBody {
    index: Option<Value>,
}

impl Command {
    /// Parse an upload body: JSON with a `gurl` field, otherwise the raw text
    pub fn upload_from_body(body: &[u8]) -> Result<Self> {
        let source = match serde_json::from_slice::<Value>(body) {
            Ok(Value::Object(map)) => serde_json::from_value::<UploadBody>(Value::Object(map))
                .ok()
                .and_then(|b| b.gurl),
            Ok(Value::String(source)) => Some(source),
            _ => Some(String::from_utf8_lossy(body).into_owned()),
        };

        match source.map(|s| s.trim().to_string()) {
            Some(source) if !source.is_empty() => Ok(Command::Upload { source }),
            _ => Err(RelayError::invalid_input("No GitHub URL provided")),
        }
    }

    /// Parse a delete body: JSON with an integer `index` field
    pub fn delete_from_body(body: &[u8]) -> Result<Self> {
        let index = serde_json::from_slice::<DeleteBody>(body)
            .ok()
            .and_then(|b| b.index)
            .and_then(|v| v.as_i64())
            .ok_or_else(|| RelayError::invalid_input("Index required"))?;

        Ok(Command::Delete { index })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Success,
    Error,
}

/// Body of a reply, in the shape clients of the relay expect
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReplyBody {
    pub status: Outcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub msg: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub files: Option<Vec<IndexedEntry>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
}

impl ReplyBody {
    fn new(status: Outcome) -> Self {
        Self {
            status,
            msg: None,
            files: None,
            index: None,
            filename: None,
        }
    }
}

/// A tagged outcome plus the HTTP-like status to answer with
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reply {
    #[serde(skip)]
    pub http_status: u16,
    #[serde(flatten)]
    pub body: ReplyBody,
}

impl Reply {
    pub fn is_success(&self) -> bool {
        self.body.status == Outcome::Success
    }

    fn success(body: ReplyBody) -> Self {
        Self {
            http_status: 200,
            body,
        }
    }

    /// Render an error, surfacing remote bodies verbatim
    pub fn from_error(err: &RelayError) -> Self {
        let msg = match err.remote_body() {
            Some(body) => serde_json::from_str(body).unwrap_or_else(|_| Value::String(body.to_string())),
            None => Value::String(err.to_string()),
        };

        let mut body = ReplyBody::new(Outcome::Error);
        body.msg = Some(msg);
        if let RelayError::RemoteDeleteFailed { index, path, .. } = err {
            body.index = Some(*index);
            body.filename = Some(path.clone());
        }

        Self {
            http_status: err.status_code(),
            body,
        }
    }
}

impl Relay {
    /// Run `command` and render the outcome; never fails
    pub async fn handle(&self, command: Command) -> Reply {
        let reply = match command {
            Command::Upload { source } => self.upload(&source).await.map(|receipt| {
                let mut body = ReplyBody::new(Outcome::Success);
                body.msg = Some(Value::String(format!(
                    "{} uploaded successfully as {}",
                    receipt.repo, receipt.stored_as
                )));
                Reply::success(body)
            }),
            Command::List => self.list().await.map(|files| {
                let mut body = ReplyBody::new(Outcome::Success);
                body.files = Some(files);
                Reply::success(body)
            }),
            Command::Delete { index } => self.delete(index).await.map(|deleted| {
                let mut body = ReplyBody::new(Outcome::Success);
                body.index = Some(deleted.index);
                body.filename = Some(deleted.filename);
                Reply::success(body)
            }),
        };

        reply.unwrap_or_else(|err| {
            tracing::warn!("request failed: {err}");
            Reply::from_error(&err)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::ArchiveSnapshot;
    use crate::memory::MemoryStore;
    use crate::source::SnapshotSource;
    use crate::store::RemoteStore;
    use crate::types::SourceRepo;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Arc;

    struct NoSnapshots;

    #[async_trait]
    impl SnapshotSource for NoSnapshots {
        async fn fetch_snapshot(&self, _: &SourceRepo, _: &[String]) -> Result<Option<ArchiveSnapshot>> {
            Ok(None)
        }
    }

    fn relay(store: &MemoryStore) -> Relay {
        Relay::new(Arc::new(store.clone()), Arc::new(NoSnapshots), vec!["main".to_string()])
    }

    #[test]
    fn test_upload_body_forms() {
        assert_eq!(
            Command::upload_from_body(br#"{"gurl": "https://github.com/acme/widgets"}"#).unwrap(),
            Command::Upload {
                source: "https://github.com/acme/widgets".to_string()
            }
        );
        assert_eq!(
            Command::upload_from_body(b"  acme/widgets\n").unwrap(),
            Command::Upload {
                source: "acme/widgets".to_string()
            }
        );
    }

    #[test]
    fn test_upload_body_missing_url() {
        for body in [&b""[..], b"   ", br#"{"other": 1}"#, br#"{"gurl": ""}"#, br#"{"gurl": 7}"#] {
            match Command::upload_from_body(body) {
                Err(RelayError::InvalidInput { message }) => assert_eq!(message, "No GitHub URL provided"),
                other => panic!("expected InvalidInput, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_delete_body() {
        assert_eq!(
            Command::delete_from_body(br#"{"index": 3}"#).unwrap(),
            Command::Delete { index: 3 }
        );
        for body in [&b""[..], br#"{}"#, br#"{"index": "3"}"#, br#"{"index": null}"#] {
            assert!(matches!(
                Command::delete_from_body(body),
                Err(RelayError::InvalidInput { .. })
            ));
        }
    }

    #[test]
    fn test_remote_failure_reply_keeps_remote_body() {
        let reply = Reply::from_error(&RelayError::RemoteWriteFailed {
            status: 422,
            body: r#"{"message":"Invalid request."}"#.to_string(),
        });

        assert_eq!(reply.http_status, 422);
        assert_eq!(
            serde_json::to_value(&reply).unwrap(),
            json!({"status": "error", "msg": {"message": "Invalid request."}})
        );
    }

    #[test]
    fn test_rejected_delete_reply_names_the_entry() {
        let reply = Reply::from_error(&RelayError::RemoteDeleteFailed {
            index: 2,
            path: "c.zip".to_string(),
            status: 409,
            body: r#"{"message":"c.zip does not match s3"}"#.to_string(),
        });

        assert_eq!(reply.http_status, 409);
        assert_eq!(
            serde_json::to_value(&reply).unwrap(),
            json!({
                "status": "error",
                "msg": {"message": "c.zip does not match s3"},
                "index": 2,
                "filename": "c.zip"
            })
        );
    }

    #[tokio::test]
    async fn test_handle_list_reply_shape() {
        let store = MemoryStore::new();
        store.insert_file("a.zip", b"a").await;
        store.insert_dir("docs").await;
        let sha = store.get_sha("a.zip").await.unwrap();

        let reply = relay(&store).handle(Command::List).await;
        assert_eq!(reply.http_status, 200);
        let value = serde_json::to_value(&reply).unwrap();
        assert_eq!(value["status"], "success");
        assert_eq!(value["files"][0], json!({"index": 0, "name": "a.zip", "sha": sha, "type": "file"}));
        assert_eq!(value["files"][1]["type"], "dir");
    }

    #[tokio::test]
    async fn test_handle_source_unavailable() {
        let reply = relay(&MemoryStore::new())
            .handle(Command::Upload {
                source: "acme/ghost".to_string(),
            })
            .await;

        assert!(!reply.is_success());
        assert_eq!(reply.http_status, 400);
        assert_eq!(
            reply.body.msg,
            Some(Value::String("Repository ghost is private or does not exist".to_string()))
        );
    }

    #[tokio::test]
    async fn test_handle_delete() {
        let store = MemoryStore::new();
        store.insert_file("a.zip", b"a").await;

        let reply = relay(&store).handle(Command::Delete { index: 0 }).await;
        assert_eq!(
            serde_json::to_value(&reply).unwrap(),
            json!({"status": "success", "index": 0, "filename": "a.zip"})
        );

        let reply = relay(&store).handle(Command::Delete { index: 0 }).await;
        assert_eq!(reply.http_status, 400);
        assert_eq!(reply.body.msg, Some(Value::String("Invalid index".to_string())));
    }
}
