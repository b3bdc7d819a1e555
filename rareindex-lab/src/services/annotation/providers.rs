//! External annotation providers
//!
//! All three providers only understand single-nucleotide variants; any other
//! variant type yields `Ok(None)` without a request.

use super::{AnnotationError, AnnotationProvider};
use async_trait::async_trait;
use rareindex_common::config::AnnotationConfig;
use rareindex_common::models::{bare_chromosome, Variant};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

const USER_AGENT: &str = concat!("RareIndex/", env!("CARGO_PKG_VERSION"));

/// Shared HTTP client for all providers
pub fn http_client(timeout_secs: u64) -> Result<reqwest::Client, AnnotationError> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| AnnotationError::Network(e.to_string()))
}

/// Providers switched on in `config`, in query order (VEP, MyVariant, GeneBe)
pub fn from_config(config: &AnnotationConfig) -> Result<Vec<Arc<dyn AnnotationProvider>>, AnnotationError> {
    let client = http_client(config.timeout_secs)?;
    let mut providers: Vec<Arc<dyn AnnotationProvider>> = Vec::new();
    if config.vep {
        providers.push(Arc::new(VepClient::new(client.clone(), &config.vep_url)));
    }
    if config.myvariant {
        providers.push(Arc::new(MyVariantClient::new(client.clone(), &config.myvariant_url)));
    }
    if config.genebe {
        providers.push(Arc::new(GeneBeClient::new(client, &config.genebe_url)));
    }
    Ok(providers)
}

async fn read_json(response: reqwest::Response) -> Result<Value, AnnotationError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(AnnotationError::Api(status.as_u16(), body));
    }
    response
        .json()
        .await
        .map_err(|e| AnnotationError::Parse(e.to_string()))
}

/// Ensembl VEP region endpoint
pub struct VepClient {
    http_client: reqwest::Client,
    base_url: String,
}

impl VepClient {
    pub fn new(http_client: reqwest::Client, base_url: &str) -> Self {
        Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// `"{chrom} {start} {end} {ref}/{alt} 1"`, chromosome without prefix
    pub fn region_string(variant: &Variant) -> Option<String> {
        let (reference, alternate) = variant.alleles()?;
        Some(format!(
            "{} {} {} {}/{} 1",
            bare_chromosome(&variant.chromosome),
            variant.start,
            variant.end,
            reference,
            alternate
        ))
    }
}

#[async_trait]
impl AnnotationProvider for VepClient {
    fn source(&self) -> &'static str {
        "vep"
    }

    async fn fetch(&self, variant: &Variant) -> Result<Option<Value>, AnnotationError> {
        let Some(region) = Self::region_string(variant) else {
            return Ok(None);
        };
        let url = format!("{}/vep/human/region", self.base_url);
        debug!(variant_id = variant.id, %url, %region, "Querying VEP");

        let response = self
            .http_client
            .post(&url)
            .header("Accept", "application/json")
            .json(&json!({ "variants": [region], "assembly_name": "GRCh38" }))
            .send()
            .await
            .map_err(|e| AnnotationError::Network(e.to_string()))?;

        read_json(response).await.map(Some)
    }
}

/// MyVariant.info HGVS lookup
pub struct MyVariantClient {
    http_client: reqwest::Client,
    base_url: String,
}

impl MyVariantClient {
    pub fn new(http_client: reqwest::Client, base_url: &str) -> Self {
        Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// `chr1:g.100A>T`
    pub fn hgvs_id(variant: &Variant) -> Option<String> {
        let (reference, alternate) = variant.alleles()?;
        Some(format!("{}:g.{}{}>{}", variant.chromosome, variant.start, reference, alternate))
    }
}

#[async_trait]
impl AnnotationProvider for MyVariantClient {
    fn source(&self) -> &'static str {
        "myvariant"
    }

    async fn fetch(&self, variant: &Variant) -> Result<Option<Value>, AnnotationError> {
        let Some(hgvs) = Self::hgvs_id(variant) else {
            return Ok(None);
        };
        let url = format!("{}/v1/variant/{}", self.base_url, hgvs);
        debug!(variant_id = variant.id, %url, "Querying MyVariant.info");

        let response = self
            .http_client
            .get(&url)
            .query(&[("assembly", "hg38")])
            .send()
            .await
            .map_err(|e| AnnotationError::Network(e.to_string()))?;

        read_json(response).await.map(Some)
    }
}

/// GeneBe public variant API
pub struct GeneBeClient {
    http_client: reqwest::Client,
    base_url: String,
}

impl GeneBeClient {
    pub fn new(http_client: reqwest::Client, base_url: &str) -> Self {
        Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// `1-100-A-T`
    pub fn variant_key(variant: &Variant) -> Option<String> {
        let (reference, alternate) = variant.alleles()?;
        Some(format!(
            "{}-{}-{}-{}",
            bare_chromosome(&variant.chromosome),
            variant.start,
            reference,
            alternate
        ))
    }
}

#[async_trait]
impl AnnotationProvider for GeneBeClient {
    fn source(&self) -> &'static str {
        "genebe"
    }

    async fn fetch(&self, variant: &Variant) -> Result<Option<Value>, AnnotationError> {
        let Some(key) = Self::variant_key(variant) else {
            return Ok(None);
        };
        let url = format!("{}/cloud/api-public/v1/variants/{}", self.base_url, key);
        debug!(variant_id = variant.id, %url, "Querying GeneBe");

        let response = self
            .http_client
            .get(&url)
            .query(&[("genome", "hg38")])
            .send()
            .await
            .map_err(|e| AnnotationError::Network(e.to_string()))?;

        read_json(response).await.map(Some)
    }
}
