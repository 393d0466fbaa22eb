// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use async_trait::async_trait;
use reqwest::header::{ACCEPT, WWW_AUTHENTICATE};
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, trace};

use super::{ImageInspector, ImageReference, InspectError, Platform};

const MANIFEST_MEDIA_TYPES: &str = "application/vnd.oci.image.index.v1+json, \
    application/vnd.docker.distribution.manifest.list.v2+json, \
    application/vnd.oci.image.manifest.v1+json, \
    application/vnd.docker.distribution.manifest.v2+json";

/// Resolves image platforms through the Docker Registry HTTP API v2.
///
/// Multi-platform images are answered from the index. Single-platform images
/// need a second request for the config blob, which carries `os` and
/// `architecture`. Anonymous bearer tokens are fetched on a 401 challenge.
#[derive(Debug, Clone)]
pub struct RegistryImageInspector {
    client: Client,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct BearerChallenge {
    pub realm: String,
    pub service: Option<String>,
    pub scope: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: Option<String>,
    access_token: Option<String>,
}

#[derive(Debug, PartialEq)]
pub(crate) enum Manifest {
    Index(Vec<Platform>),
    Image { config_digest: String },
}

impl RegistryImageInspector {
    pub fn new(timeout: Duration) -> Result<Self, InspectError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("fabstir-compute-node/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }

    async fn fetch(&self, reference: &ImageReference, url: &str, accept: &str) -> Result<Value, InspectError> {
        let response = self.client.get(url).header(ACCEPT, accept).send().await?;

        let response = if response.status() == StatusCode::UNAUTHORIZED {
            let challenge = response
                .headers()
                .get(WWW_AUTHENTICATE)
                .and_then(|h| h.to_str().ok())
                .and_then(parse_bearer_challenge)
                .ok_or_else(|| InspectError::Unauthorized(format!("no bearer challenge from {}", reference.registry)))?;
            let token = self.fetch_token(reference, &challenge).await?;
            self.client
                .get(url)
                .header(ACCEPT, accept)
                .bearer_auth(token)
                .send()
                .await?
        } else {
            response
        };

        Self::check_status(reference, response).await?.json().await.map_err(Into::into)
    }

    async fn fetch_token(&self, reference: &ImageReference, challenge: &BearerChallenge) -> Result<String, InspectError> {
        let scope = challenge
            .scope
            .clone()
            .unwrap_or_else(|| format!("repository:{}:pull", reference.repository));
        let mut query = vec![("scope", scope)];
        if let Some(service) = &challenge.service {
            query.push(("service", service.clone()));
        }

        trace!("Requesting registry token from {}", challenge.realm);
        let response = self.client.get(&challenge.realm).query(&query).send().await?;
        if !response.status().is_success() {
            return Err(InspectError::Unauthorized(format!(
                "token endpoint returned {}",
                response.status()
            )));
        }
        let body: TokenResponse = response.json().await?;
        body.token
            .or(body.access_token)
            .ok_or_else(|| InspectError::Unauthorized("token response without a token".to_string()))
    }

    async fn check_status(reference: &ImageReference, response: Response) -> Result<Response, InspectError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        if status == StatusCode::NOT_FOUND {
            return Err(InspectError::NotFound(reference.to_string()));
        }
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(InspectError::Unauthorized(reference.to_string()));
        }
        let message = response.text().await.unwrap_or_default();
        Err(InspectError::Registry {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl ImageInspector for RegistryImageInspector {
    async fn platforms(&self, image: &str) -> Result<Vec<Platform>, InspectError> {
        let reference = ImageReference::parse(image)?;
        let url = reference.manifest_url(reference.manifest_reference());
        debug!("Inspecting image {} via {}", image, url);

        let manifest = self.fetch(&reference, &url, MANIFEST_MEDIA_TYPES).await?;
        match parse_manifest(&manifest)? {
            Manifest::Index(platforms) => Ok(platforms),
            Manifest::Image { config_digest } => {
                let config = self
                    .fetch(&reference, &reference.blob_url(&config_digest), "application/json")
                    .await?;
                let platform: Platform = serde_json::from_value(config).map_err(|e| {
                    InspectError::UnsupportedManifest(format!("image config without platform: {}", e))
                })?;
                Ok(vec![platform])
            }
        }
    }
}

/// Parses `Bearer realm="...",service="...",scope="..."`.
pub(crate) fn parse_bearer_challenge(header: &str) -> Option<BearerChallenge> {
    let params = header.trim().strip_prefix("Bearer ")?;
    let mut realm = None;
    let mut service = None;
    let mut scope = None;

    // Scope values may contain commas, so split on `",` rather than `,`.
    for part in params.split("\",") {
        let (key, value) = part.split_once('=')?;
        let value = value.trim().trim_matches('"').to_string();
        match key.trim() {
            "realm" => realm = Some(value),
            "service" => service = Some(value),
            "scope" => scope = Some(value),
            _ => {}
        }
    }

    Some(BearerChallenge {
        realm: realm?,
        service,
        scope,
    })
}

pub(crate) fn parse_manifest(manifest: &Value) -> Result<Manifest, InspectError> {
    if let Some(entries) = manifest.get("manifests").and_then(Value::as_array) {
        let platforms: Vec<Platform> = entries
            .iter()
            .filter_map(|entry| entry.get("platform"))
            .filter_map(|p| serde_json::from_value::<Platform>(p.clone()).ok())
            .filter(|p| !p.is_unknown())
            .collect();
        if platforms.is_empty() {
            return Err(InspectError::UnsupportedManifest(
                "index declares no platforms".to_string(),
            ));
        }
        return Ok(Manifest::Index(platforms));
    }

    if let Some(digest) = manifest
        .get("config")
        .and_then(|c| c.get("digest"))
        .and_then(Value::as_str)
    {
        return Ok(Manifest::Image {
            config_digest: digest.to_string(),
        });
    }

    let media_type = manifest
        .get("mediaType")
        .and_then(Value::as_str)
        .unwrap_or("unknown");
    Err(InspectError::UnsupportedManifest(media_type.to_string()))
}
