//! GitHub release host (REST API v3)
//!
//! Draft releases are invisible to `GET /releases/tags/{tag}`, so existing
//! releases are found by paging through `GET /releases`. Creation is
//! `POST /releases` followed by one upload per file to the release's
//! `upload_url`. If an upload fails, the draft created by this call is deleted
//! again; releases that existed before are never touched.

use super::{DraftRelease, ReleaseHandle, ReleaseHost};
use crate::core::credential::Credential;
use crate::core::error::{RailError, RailResult, ReleaseError};
use reqwest::StatusCode;
use reqwest::blocking::{Body, Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::time::Duration;

const API_VERSION: &str = "2022-11-28";
const PAGE_SIZE: usize = 100;
const MAX_PAGES: usize = 20;

pub struct GithubHost {
  client: Client,
  api_url: String,
  repository: String,
}

#[derive(Debug, Deserialize)]
struct ApiRelease {
  id: u64,
  tag_name: String,
  draft: bool,
  prerelease: bool,
  #[serde(default)]
  html_url: Option<String>,
  #[serde(default)]
  upload_url: Option<String>,
  #[serde(default)]
  assets: Vec<ApiAsset>,
}

#[derive(Debug, Deserialize)]
struct ApiAsset {
  name: String,
}

#[derive(Debug, Serialize)]
struct CreateRelease<'a> {
  tag_name: &'a str,
  name: &'a str,
  draft: bool,
  prerelease: bool,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
  #[serde(default)]
  message: String,
  #[serde(default)]
  errors: Vec<ApiErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
  #[serde(default)]
  code: String,
}

impl From<ApiRelease> for ReleaseHandle {
  fn from(release: ApiRelease) -> Self {
    ReleaseHandle {
      id: release.id.to_string(),
      tag: release.tag_name,
      draft: release.draft,
      prerelease: release.prerelease,
      url: release.html_url,
      assets: release.assets.into_iter().map(|a| a.name).collect(),
    }
  }
}

impl GithubHost {
  pub fn new(api_url: &str, repository: &str) -> RailResult<Self> {
    let client = Client::builder()
      .user_agent(concat!("draftrail/", env!("CARGO_PKG_VERSION")))
      .connect_timeout(Duration::from_secs(30))
      .timeout(Duration::from_secs(60 * 60))
      .build()
      .map_err(|e| RailError::message(format!("Failed to build HTTP client: {}", e)))?;

    Ok(Self {
      client,
      api_url: api_url.trim_end_matches('/').to_string(),
      repository: repository.to_string(),
    })
  }

  fn releases_url(&self) -> String {
    format!("{}/repos/{}/releases", self.api_url, self.repository)
  }

  fn authorized(&self, builder: RequestBuilder, credential: Option<&Credential>) -> Result<RequestBuilder, ReleaseError> {
    let credential = credential.ok_or_else(|| ReleaseError::Auth {
      reason: "no access token provided".to_string(),
    })?;
    Ok(
      builder
        .bearer_auth(credential.expose())
        .header("Accept", "application/vnd.github+json")
        .header("X-GitHub-Api-Version", API_VERSION),
    )
  }

  fn delete_release(&self, id: u64, credential: Option<&Credential>) {
    let url = format!("{}/{}", self.releases_url(), id);
    let result = self
      .authorized(self.client.delete(&url), credential)
      .and_then(|b| b.send().map_err(transport));
    match result {
      Ok(resp) if resp.status().is_success() => {
        tracing::info!(release_id = id, "deleted incomplete draft release");
      }
      Ok(resp) => tracing::warn!(release_id = id, status = %resp.status(), "could not delete incomplete draft release"),
      Err(e) => tracing::warn!(release_id = id, error = %e, "could not delete incomplete draft release"),
    }
  }

  fn upload_asset(
    &self,
    upload_url: &str,
    path: &std::path::Path,
    credential: Option<&Credential>,
  ) -> Result<String, ReleaseError> {
    let name = path
      .file_name()
      .map(|n| n.to_string_lossy().to_string())
      .ok_or_else(|| ReleaseError::NoFiles {
        pattern: path.display().to_string(),
      })?;
    let file = File::open(path).map_err(|e| ReleaseError::Transport {
      message: format!("cannot open {}: {}", path.display(), e),
    })?;
    let len = file.metadata().map(|m| m.len()).map_err(|e| ReleaseError::Transport {
      message: format!("cannot stat {}: {}", path.display(), e),
    })?;

    tracing::info!(asset = %name, bytes = len, "uploading release asset");
    let request = self
      .client
      .post(upload_url)
      .query(&[("name", name.as_str())])
      .header("Content-Type", "application/octet-stream")
      .body(Body::sized(file, len));
    let response = self.authorized(request, credential)?.send().map_err(transport)?;
    check(response)?;
    Ok(name)
  }
}

impl ReleaseHost for GithubHost {
  fn name(&self) -> &str {
    "github"
  }

  fn find_release(&self, tag: &str, credential: Option<&Credential>) -> Result<Option<ReleaseHandle>, ReleaseError> {
    for page in 1..=MAX_PAGES {
      let request = self
        .client
        .get(self.releases_url())
        .query(&[("per_page", PAGE_SIZE), ("page", page)]);
      let response = check(self.authorized(request, credential)?.send().map_err(transport)?)?;
      let releases: Vec<ApiRelease> = response.json().map_err(transport)?;
      let count = releases.len();

      if let Some(found) = releases.into_iter().find(|r| r.tag_name == tag) {
        return Ok(Some(found.into()));
      }
      if count < PAGE_SIZE {
        break;
      }
    }
    Ok(None)
  }

  fn create_draft_release(
    &self,
    request: &DraftRelease,
    credential: Option<&Credential>,
  ) -> Result<ReleaseHandle, ReleaseError> {
    let body = CreateRelease {
      tag_name: &request.tag,
      name: &request.name,
      draft: request.draft,
      prerelease: request.prerelease,
    };
    tracing::info!(repository = %self.repository, tag = %request.tag, "creating draft release");

    let builder = self.client.post(self.releases_url()).json(&body);
    let response = self.authorized(builder, credential)?.send().map_err(transport)?;
    let response = check(response).map_err(|e| match e {
      ReleaseError::Api { status: 422, message } if message.contains("already_exists") => ReleaseError::Conflict {
        tag: request.tag.clone(),
      },
      other => other,
    })?;
    let created: ApiRelease = response.json().map_err(transport)?;

    let upload_url = match created.upload_url.as_deref() {
      Some(url) => strip_uri_template(url),
      None => {
        self.delete_release(created.id, credential);
        return Err(ReleaseError::Api {
          status: 500,
          message: "release has no upload_url".to_string(),
        });
      }
    };

    let mut assets = Vec::with_capacity(request.files.len());
    for file in &request.files {
      match self.upload_asset(&upload_url, file, credential) {
        Ok(name) => assets.push(name),
        Err(e) => {
          self.delete_release(created.id, credential);
          return Err(e);
        }
      }
    }

    let mut handle: ReleaseHandle = created.into();
    handle.assets = assets;
    Ok(handle)
  }
}

/// `https://uploads.github.com/.../assets{?name,label}` -> `.../assets`
fn strip_uri_template(url: &str) -> String {
  match url.find('{') {
    Some(idx) => url[..idx].to_string(),
    None => url.to_string(),
  }
}

fn transport(err: reqwest::Error) -> ReleaseError {
  ReleaseError::Transport {
    message: err.to_string(),
  }
}

/// Map non-success statuses to release errors
fn check(response: Response) -> Result<Response, ReleaseError> {
  let status = response.status();
  if status.is_success() {
    return Ok(response);
  }

  let text = response.text().unwrap_or_default();
  Err(classify(status, &text))
}

fn classify(status: StatusCode, body: &str) -> ReleaseError {
  let parsed: Option<ApiErrorBody> = serde_json::from_str(body).ok();
  let message = parsed
    .as_ref()
    .map(|b| {
      let codes: Vec<&str> = b.errors.iter().map(|e| e.code.as_str()).filter(|c| !c.is_empty()).collect();
      if codes.is_empty() {
        b.message.clone()
      } else {
        format!("{} ({})", b.message, codes.join(", "))
      }
    })
    .unwrap_or_else(|| body.chars().take(200).collect());

  match status {
    StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ReleaseError::Auth {
      reason: format!("{}: {}", status, message),
    },
    _ => ReleaseError::Api {
      status: status.as_u16(),
      message,
    },
  }
}
