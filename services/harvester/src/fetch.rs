use crate::error::HarvestError;

/// Fetch a routing-configuration document at a `file://` or `http(s)://` URI.
pub async fn fetch_document(client: &reqwest::Client, uri: &str) -> Result<String, HarvestError> {
    if let Some(path) = uri.strip_prefix("file://") {
        return tokio::fs::read_to_string(path)
            .await
            .map_err(HarvestError::Io);
    }

    let response = client
        .get(uri)
        .send()
        .await
        .map_err(|e| HarvestError::Fetch(e.to_string()))?;
    if !response.status().is_success() {
        return Err(HarvestError::Fetch(format!("{uri}: HTTP {}", response.status())));
    }
    response.text().await.map_err(|e| HarvestError::Fetch(e.to_string()))
}

/// Fetch the FDSN station inventory for `url` (already carrying `level=channel`
/// and the route's codes as query parameters).
pub async fn fetch_station_inventory(client: &reqwest::Client, url: &str) -> Result<String, HarvestError> {
    let response = client.get(url).send().await?;
    if response.status() == reqwest::StatusCode::NO_CONTENT || response.status() == reqwest::StatusCode::NOT_FOUND {
        return Ok(String::new());
    }
    Ok(response.text().await?)
}
