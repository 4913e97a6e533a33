//! Reverse geocoding for diagnosing where a coordinate lands.

use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tokio::sync::OnceCell;
use tracing::debug;

/// Public Nominatim instance.
pub const NOMINATIM_URL: &str = "https://nominatim.openstreetmap.org";

/// Resolves a coordinate to a human-readable address.
#[async_trait]
pub trait Geolocator: Send + Sync {
    /// Address at a point, or `None` when nothing is there (open ocean).
    async fn reverse(&self, latitude: f64, longitude: f64) -> Result<Option<String>>;
}

#[derive(Debug, Deserialize)]
struct ReverseResponse {
    display_name: Option<String>,
    error: Option<String>,
}

/// [`Geolocator`] backed by a Nominatim server.
pub struct NominatimGeolocator {
    client: Client,
    base_url: String,
}

impl NominatimGeolocator {
    pub fn new(base_url: impl Into<String>, user_agent: &str) -> Result<Self> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    fn reverse_url(&self) -> String {
        format!("{}/reverse", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl Geolocator for NominatimGeolocator {
    async fn reverse(&self, latitude: f64, longitude: f64) -> Result<Option<String>> {
        let response = self
            .client
            .get(self.reverse_url())
            .query(&[
                ("format", "jsonv2".to_string()),
                ("lat", latitude.to_string()),
                ("lon", longitude.to_string()),
            ])
            .send()
            .await
            .context("Reverse geocoding request failed")?;

        if !response.status().is_success() {
            return Err(anyhow!("Reverse geocoding HTTP error: {}", response.status()));
        }
        let body: ReverseResponse = response
            .json()
            .await
            .context("Invalid reverse geocoding response")?;
        if let Some(error) = body.error {
            debug!(latitude, longitude, error = %error, "No address");
            return Ok(None);
        }
        Ok(body.display_name)
    }
}

type Factory = Box<dyn Fn() -> Result<Box<dyn Geolocator>> + Send + Sync>;

/// Builds its geolocator on first use and keeps it for its own lifetime.
///
/// Owners decide how long the client lives; nothing is cached globally.
pub struct LazyGeolocator {
    cell: OnceCell<Box<dyn Geolocator>>,
    factory: Factory,
}

impl LazyGeolocator {
    pub fn new<F>(factory: F) -> Self
    where
        F: Fn() -> Result<Box<dyn Geolocator>> + Send + Sync + 'static,
    {
        Self {
            cell: OnceCell::new(),
            factory: Box::new(factory),
        }
    }

    /// Lazy Nominatim client.
    pub fn nominatim(base_url: impl Into<String>, user_agent: impl Into<String>) -> Self {
        let base_url = base_url.into();
        let user_agent = user_agent.into();
        Self::new(move || {
            Ok(Box::new(NominatimGeolocator::new(base_url.clone(), &user_agent)?) as Box<dyn Geolocator>)
        })
    }

    pub fn is_initialized(&self) -> bool {
        self.cell.initialized()
    }

    pub async fn get(&self) -> Result<&dyn Geolocator> {
        let geolocator = self
            .cell
            .get_or_try_init(|| async { (self.factory)() })
            .await?;
        Ok(geolocator.as_ref())
    }

    pub async fn reverse(&self, latitude: f64, longitude: f64) -> Result<Option<String>> {
        self.get().await?.reverse(latitude, longitude).await
    }
}
