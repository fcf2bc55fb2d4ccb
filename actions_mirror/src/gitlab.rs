use crate::conf;
use crate::status::TargetState;
use anyhow::Result;
use async_trait::async_trait;
use reqwest::{header, Client, StatusCode};
use serde::Serialize;
use std::time::Duration;

/// Represents the ways publishing a commit status can fail.
///
/// Publishing is best effort: the monitor logs these and carries on.
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum PublishError {
    #[error("could not connect to GitLab; {0}")]
    Connection(String),

    #[error("GitLab rejected status update with {status}: {body}")]
    Rejected { status: u16, body: String },
}

/// An external commit status as GitLab's statuses API expects it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommitStatus {
    /// The commit the status is attached to. Part of the URL rather than the body.
    ///
    /// Taken from the GitHub run's head commit, so the GitLab project has to mirror the same
    /// history. With a commit selector this is the configured SHA; with a branch selector it's
    /// whatever commit GitHub ran.
    #[serde(skip)]
    pub sha: String,
    pub state: TargetState,

    /// Statuses with the same context on the same commit replace each other.
    pub context: String,
    pub description: String,
    pub target_url: String,
}

/// The write side: where mirrored statuses end up.
///
/// Implementations must be idempotent; publishing the same status twice is the same as once.
#[async_trait]
pub trait StatusPublisher: Send + Sync {
    async fn publish(&self, status: &CommitStatus) -> Result<(), PublishError>;
}

/// Posts commit statuses to a GitLab project with a private token.
pub struct GitlabClient {
    client: Client,
    api_url: String,
    project_id: String,
}

impl GitlabClient {
    pub fn new(conf: &conf::Gitlab, request_timeout: Duration) -> Result<Self> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::HeaderName::from_static("private-token"),
            header::HeaderValue::from_str(conf.token.trim())?,
        );

        let client = Client::builder()
            .default_headers(headers)
            .timeout(request_timeout)
            .build()?;

        Ok(Self {
            client,
            api_url: conf.api_url.trim_end_matches('/').to_string(),
            project_id: conf.project_id.trim().to_string(),
        })
    }

    fn endpoint(&self, sha: &str) -> String {
        // Project paths like "group/project" have to be sent as a single URL-encoded segment.
        format!(
            "{}/projects/{}/statuses/{}",
            self.api_url,
            self.project_id.replace('/', "%2F"),
            sha
        )
    }
}

#[async_trait]
impl StatusPublisher for GitlabClient {
    async fn publish(&self, status: &CommitStatus) -> Result<(), PublishError> {
        let response = self
            .client
            .post(self.endpoint(&status.sha))
            .json(status)
            .send()
            .await
            .map_err(|e| PublishError::Connection(e.to_string()))?;

        let code = response.status();
        if code.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        check_response(code, body)
    }
}

/// Any 2xx is an accepted status; everything else is [`PublishError::Rejected`].
fn check_response(status: StatusCode, body: String) -> Result<(), PublishError> {
    if status.is_success() {
        return Ok(());
    }

    Err(PublishError::Rejected {
        status: status.as_u16(),
        body,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(project_id: &str) -> GitlabClient {
        let conf = conf::Gitlab {
            api_url: "https://gitlab.com/api/v4/".into(),
            token: "token".into(),
            project_id: project_id.into(),
            context: "GitHub Actions Deployment".into(),
        };
        GitlabClient::new(&conf, Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn endpoint_encodes_project_paths() {
        assert_eq!(
            client("1234").endpoint("abc"),
            "https://gitlab.com/api/v4/projects/1234/statuses/abc"
        );
        assert_eq!(
            client("acme/app").endpoint("abc"),
            "https://gitlab.com/api/v4/projects/acme%2Fapp/statuses/abc"
        );
    }

    #[test]
    fn non_success_responses_are_rejections() {
        assert_eq!(check_response(StatusCode::CREATED, String::new()), Ok(()));
        assert_eq!(
            check_response(StatusCode::UNAUTHORIZED, r#"{"message":"401 Unauthorized"}"#.into()),
            Err(PublishError::Rejected {
                status: 401,
                body: r#"{"message":"401 Unauthorized"}"#.into(),
            })
        );
        assert_eq!(
            check_response(StatusCode::BAD_REQUEST, "Cannot transition status".into()),
            Err(PublishError::Rejected {
                status: 400,
                body: "Cannot transition status".into(),
            })
        );
    }

    #[test]
    fn body_omits_sha() {
        let status = CommitStatus {
            sha: "abc".into(),
            state: TargetState::Running,
            context: "GitHub Actions Deployment (staging)".into(),
            description: "GitHub Actions: in_progress".into(),
            target_url: "https://github.com/acme/app/actions/runs/1".into(),
        };

        let body = serde_json::to_value(&status).unwrap();
        assert_eq!(
            body,
            serde_json::json!({
                "state": "running",
                "context": "GitHub Actions Deployment (staging)",
                "description": "GitHub Actions: in_progress",
                "target_url": "https://github.com/acme/app/actions/runs/1",
            })
        );
    }
}
