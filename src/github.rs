use anyhow::{Context, Result};
use base64::Engine as _;
use chrono::Utc;
use reqwest::{Client, Url};
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info, instrument};

use crate::constants;
use crate::extractor::CodeState;

const README_BODY: &str =
    "# Generated Code\n\nThis repository contains code generated using the AI Code Generator.";

#[derive(Deserialize, Debug)]
struct AccessTokenResponse {
    access_token: Option<String>,
    error: Option<String>,
}

#[derive(Deserialize, Debug)]
struct CreatedRepo {
    name: String,
    html_url: String,
    owner: RepoOwner,
}

#[derive(Deserialize, Debug)]
struct RepoOwner {
    login: String,
}

/// Client for the repository-hosting collaborator: the OAuth handshake and
/// repository creation. Endpoints are configurable so tests can aim it at a
/// mock server.
#[derive(Debug, Clone)]
pub struct GitHubClient {
    http: Client,
    api_url: String,
    oauth_url: String,
    client_id: String,
    client_secret: String,
    redirect_uri: String,
}

impl GitHubClient {
    pub fn new(
        api_url: String,
        oauth_url: String,
        client_id: String,
        client_secret: String,
        redirect_uri: String,
    ) -> Self {
        Self {
            http: Client::new(),
            api_url,
            oauth_url,
            client_id,
            client_secret,
            redirect_uri,
        }
    }

    pub fn from_env() -> Self {
        Self::new(
            constants::GITHUB_API_URL.clone(),
            constants::GITHUB_OAUTH_URL.clone(),
            constants::GITHUB_CLIENT_ID.clone(),
            constants::GITHUB_CLIENT_SECRET.clone(),
            constants::GITHUB_REDIRECT_URI.clone(),
        )
    }

    /// Whether an OAuth app is configured at all. The export UI is useless
    /// without it.
    pub fn is_configured(&self) -> bool {
        !self.client_id.is_empty() && !self.client_secret.is_empty()
    }

    /// The authorization URL the browser is redirected to, requesting the
    /// `repo` scope.
    pub fn authorize_url(&self) -> Result<String> {
        let url = Url::parse_with_params(
            &format!("{}/oauth/authorize", self.oauth_url),
            &[
                ("client_id", self.client_id.as_str()),
                ("redirect_uri", self.redirect_uri.as_str()),
                ("scope", "repo"),
            ],
        )
        .context("Failed to build GitHub authorize URL")?;
        Ok(url.into())
    }

    /// Exchange the callback `code` for an access token.
    #[instrument(skip(self, code))]
    pub async fn exchange_code(&self, code: &str) -> Result<String> {
        let response = self
            .http
            .post(format!("{}/oauth/access_token", self.oauth_url))
            .header(reqwest::header::ACCEPT, "application/json")
            .json(&json!({
                "client_id": self.client_id,
                "client_secret": self.client_secret,
                "code": code,
            }))
            .send()
            .await
            .context("Failed to send token exchange request to GitHub")?;

        if !response.status().is_success() {
            let status = response.status();
            error!(%status, "GitHub token exchange failed");
            return Err(anyhow::anyhow!(
                "GitHub token exchange failed with status {}",
                status
            ));
        }

        let token_response = response
            .json::<AccessTokenResponse>()
            .await
            .context("Failed to parse GitHub token response")?;

        if let Some(err) = token_response.error {
            return Err(anyhow::anyhow!("GitHub rejected the code: {}", err));
        }
        token_response
            .access_token
            .context("GitHub token response contained no access_token")
    }

    /// Create a fresh public repository and push the generated fragments as
    /// `index.html`, `styles.css`, `script.js` plus a README. Returns the
    /// repository's web URL.
    #[instrument(skip(self, token, code))]
    pub async fn create_repository(&self, token: &str, code: &CodeState) -> Result<String> {
        let repo_name = format!("ai-generated-code-{}", Utc::now().timestamp_millis());

        let response = self
            .http
            .post(format!("{}/user/repos", self.api_url))
            .bearer_auth(token)
            .header(reqwest::header::USER_AGENT, "pageforge")
            .header(reqwest::header::ACCEPT, "application/vnd.github+json")
            .json(&json!({
                "name": repo_name,
                "description": "Generated using AI Code Generator",
                "private": false,
                "auto_init": true,
            }))
            .send()
            .await
            .context("Failed to send repository creation request to GitHub")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error body".to_string());
            error!(%status, %error_body, "GitHub repository creation failed");
            return Err(anyhow::anyhow!(
                "GitHub repository creation failed with status {}: {}",
                status,
                error_body
            ));
        }

        let repo = response
            .json::<CreatedRepo>()
            .await
            .context("Failed to parse GitHub repository response")?;

        let files = [
            ("index.html", code.markup.as_str()),
            ("styles.css", code.stylesheet.as_str()),
            ("script.js", code.script.as_str()),
            ("README.md", README_BODY),
        ];
        for (filename, content) in files {
            self.upload_file(token, &repo.owner.login, &repo.name, filename, content)
                .await?;
        }

        info!(repo = %repo.html_url, "Created repository with generated code");
        Ok(repo.html_url)
    }

    async fn upload_file(
        &self,
        token: &str,
        owner: &str,
        repo: &str,
        filename: &str,
        content: &str,
    ) -> Result<()> {
        let encoded = base64::engine::general_purpose::STANDARD.encode(content);
        let response = self
            .http
            .put(format!(
                "{}/repos/{}/{}/contents/{}",
                self.api_url, owner, repo, filename
            ))
            .bearer_auth(token)
            .header(reqwest::header::USER_AGENT, "pageforge")
            .header(reqwest::header::ACCEPT, "application/vnd.github+json")
            .json(&json!({
                "message": format!("Add {}", filename),
                "content": encoded,
            }))
            .send()
            .await
            .with_context(|| format!("Failed to upload {} to GitHub", filename))?;

        if !response.status().is_success() {
            let status = response.status();
            error!(%status, filename, "GitHub file upload failed");
            return Err(anyhow::anyhow!(
                "GitHub upload of {} failed with status {}",
                filename,
                status
            ));
        }
        Ok(())
    }
}
