//! Proxy to the SLO curriculum open-data API.

use log::{ error, info, warn };
use reqwest::header::ACCEPT;
use reqwest::Client as HttpClient;
use serde::Deserialize;
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use url::Url;

pub const DEFAULT_BASE_URL: &str = "https://opendata.slo.nl/curriculum/api/v1/";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CurriculumType {
    #[default]
    Kerndoelen,
    Domeinen,
    Subdomeinen,
}

impl CurriculumType {
    pub fn path_segment(&self) -> &'static str {
        match self {
            CurriculumType::Kerndoelen => "kerndoel/",
            CurriculumType::Domeinen => "kerndoeldomein/",
            CurriculumType::Subdomeinen => "examenprogrammasubdomein/",
        }
    }
}

impl fmt::Display for CurriculumType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CurriculumType::Kerndoelen => write!(f, "kerndoelen"),
            CurriculumType::Domeinen => write!(f, "domeinen"),
            CurriculumType::Subdomeinen => write!(f, "subdomeinen"),
        }
    }
}

impl FromStr for CurriculumType {
    type Err = SloError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "kerndoelen" => Ok(CurriculumType::Kerndoelen),
            "domeinen" => Ok(CurriculumType::Domeinen),
            "subdomeinen" => Ok(CurriculumType::Subdomeinen),
            other =>
                Err(
                    SloError::InvalidRequest(
                        format!(
                            "Unknown type '{}', expected kerndoelen, domeinen or subdomeinen",
                            other
                        )
                    )
                ),
        }
    }
}

/// Query string of `GET /api/slo`. Empty values count as absent.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SloQuery {
    pub subject: Option<String>,
    pub level: Option<String>,
    pub domain: Option<String>,
    pub subdomain: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

impl SloQuery {
    pub fn curriculum_type(&self) -> Result<CurriculumType, SloError> {
        match present(&self.kind) {
            Some(kind) => kind.parse(),
            None => Ok(CurriculumType::default()),
        }
    }

    /// Parameters renamed to the upstream vocabulary, in a fixed order.
    pub fn upstream_params(&self) -> Vec<(&'static str, &str)> {
        [
            ("vak", &self.subject),
            ("niveau", &self.level),
            ("domein", &self.domain),
            ("subdomein", &self.subdomain),
        ]
            .into_iter()
            .filter_map(|(name, value)| present(value).map(|v| (name, v)))
            .collect()
    }
}

#[derive(Debug, Error)]
pub enum SloError {
    #[error("{0}")]
    InvalidRequest(String),
    #[error("SLO API key not configured")]
    Misconfigured,
    #[error("SLO API error")]
    Upstream {
        status: u16,
        details: String,
        url: String,
    },
    #[error("Invalid SLO base URL: {0}")]
    BaseUrl(#[from] url::ParseError),
    #[error("{0}")]
    Http(#[from] reqwest::Error),
}

#[derive(Clone)]
pub struct SloClient {
    http: HttpClient,
    api_key: Option<String>,
    base_url: Url,
}

impl SloClient {
    pub fn new(api_key: Option<String>, base_url: Option<String>) -> Result<Self, SloError> {
        let mut raw = base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        if !raw.ends_with('/') {
            raw.push('/');
        }
        let base_url = Url::parse(&raw)?;
        let api_key = api_key.filter(|k| !k.trim().is_empty());
        if api_key.is_none() {
            warn!("WARNING: SLO API key not set; /api/slo will answer with an error");
        }

        Ok(Self {
            http: HttpClient::new(),
            api_key,
            base_url,
        })
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    pub fn build_url(&self, query: &SloQuery) -> Result<Url, SloError> {
        let kind = query.curriculum_type()?;
        let mut url = self.base_url.join(kind.path_segment())?;
        let params = query.upstream_params();
        if !params.is_empty() {
            url.query_pairs_mut().extend_pairs(params);
        }
        Ok(url)
    }

    pub async fn fetch(&self, query: &SloQuery) -> Result<Value, SloError> {
        let url = self.build_url(query)?;
        let api_key = self.api_key.as_ref().ok_or(SloError::Misconfigured)?;

        info!("Fetching from SLO API: {}", url);
        let resp = self.http
            .get(url.clone())
            .bearer_auth(api_key)
            .header(ACCEPT, "application/json")
            .send().await?;

        let status = resp.status();
        if !status.is_success() {
            let details = resp.text().await.unwrap_or_default();
            error!("SLO API error ({}): {}", status, details);
            return Err(SloError::Upstream {
                status: status.as_u16(),
                details,
                url: url.to_string(),
            });
        }

        Ok(resp.json::<Value>().await?)
    }
}
