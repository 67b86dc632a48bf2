//! JSON-over-HTTP implementation of [`SkillRepository`].
//!
//! Endpoints, relative to the configured base URL:
//! - `POST   api/skills`        create
//! - `PATCH  api/skills/{id}`   update
//! - `GET    api/skills/{id}`   fetch
//! - `GET    api/skills?owned=&visibility=&cursor=&limit=`   list

use {
    async_trait::async_trait,
    reqwest::{Client, Method, RequestBuilder, Response, StatusCode},
    secrecy::{ExposeSecret, Secret},
    serde::de::DeserializeOwned,
    tracing::debug,
    url::Url,
};

use crate::{
    error::{RemoteError, Result},
    repository::SkillRepository,
    types::{ListFilter, RemoteSkill, SkillInput, SkillPage, SkillPatch},
};

const USER_AGENT: &str = concat!("skillport/", env!("CARGO_PKG_VERSION"));

pub struct HttpSkillRepository {
    client: Client,
    base: Url,
    token: Option<Secret<String>>,
    page_size: u32,
}

impl HttpSkillRepository {
    pub fn new(base_url: &str, token: Option<Secret<String>>) -> Result<Self> {
        let mut base = Url::parse(base_url)?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Ok(Self {
            client: Client::new(),
            base,
            token,
            page_size: 100,
        })
    }

    #[must_use]
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    fn request(&self, method: Method, path: &str) -> Result<RequestBuilder> {
        let url = self.base.join(path)?;
        let mut builder = self
            .client
            .request(method, url)
            .header(reqwest::header::USER_AGENT, USER_AGENT);
        if let Some(token) = &self.token {
            builder = builder.bearer_auth(token.expose_secret());
        }
        Ok(builder)
    }

    async fn decode<T: DeserializeOwned>(
        response: Response,
        id: Option<&str>,
        slug: Option<&str>,
    ) -> Result<T> {
        let status = response.status();
        if status.is_success() {
            let bytes = response.bytes().await?;
            return Ok(serde_json::from_slice(&bytes)?);
        }
        let body = response.text().await.unwrap_or_default();
        debug!(status = status.as_u16(), %body, "remote request failed");
        Err(match status {
            StatusCode::CONFLICT => RemoteError::SlugConflict {
                slug: slug.unwrap_or_default().to_string(),
            },
            StatusCode::NOT_FOUND => RemoteError::NotFound {
                id: id.unwrap_or_default().to_string(),
            },
            other => RemoteError::Http {
                status: other.as_u16(),
                body,
            },
        })
    }
}

#[async_trait]
impl SkillRepository for HttpSkillRepository {
    fn server_identity(&self) -> String {
        self.base.as_str().trim_end_matches('/').to_string()
    }

    async fn create(&self, input: SkillInput) -> Result<RemoteSkill> {
        let slug = input.slug.clone();
        let response = self
            .request(Method::POST, "api/skills")?
            .json(&input)
            .send()
            .await?;
        Self::decode(response, None, Some(&slug)).await
    }

    async fn update(&self, id: &str, patch: SkillPatch) -> Result<RemoteSkill> {
        let response = self
            .request(Method::PATCH, &format!("api/skills/{id}"))?
            .json(&patch)
            .send()
            .await?;
        Self::decode(response, Some(id), None).await
    }

    async fn get_by_id(&self, id: &str) -> Result<RemoteSkill> {
        let response = self
            .request(Method::GET, &format!("api/skills/{id}"))?
            .send()
            .await?;
        Self::decode(response, Some(id), None).await
    }

    async fn list(&self, filter: &ListFilter, cursor: Option<&str>) -> Result<SkillPage> {
        let mut query: Vec<(&str, String)> = vec![("limit", self.page_size.to_string())];
        if filter.owned_only {
            query.push(("owned", "true".into()));
        }
        if let Some(visibility) = filter.visibility {
            query.push(("visibility", visibility.to_string()));
        }
        if let Some(cursor) = cursor {
            query.push(("cursor", cursor.to_string()));
        }
        let response = self
            .request(Method::GET, "api/skills")?
            .query(&query)
            .send()
            .await?;
        Self::decode(response, None, None).await
    }
}
