// src/utils/http.rs

//! HTTP client utilities.

use std::time::Duration;

use crate::error::Result;
use crate::models::HttpConfig;

/// Create a configured asynchronous HTTP client.
///
/// The client keeps a cookie store so a login carries over to later
/// requests made through the same client.
pub fn create_async_client(config: &HttpConfig) -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .user_agent(&config.user_agent)
        .timeout(Duration::from_secs(config.timeout_secs))
        .cookie_store(true)
        .build()?;
    Ok(client)
}

/// Fetch a page asynchronously and return its body, failing on error statuses.
pub async fn fetch_text(client: &reqwest::Client, url: &str) -> Result<String> {
    let text = client
        .get(url)
        .send()
        .await?
        .error_for_status()?
        .text()
        .await?;
    Ok(text)
}

/// POST a urlencoded form and return the response body, failing on error statuses.
pub async fn post_form<T: serde::Serialize + ?Sized>(
    client: &reqwest::Client,
    url: &str,
    form: &T,
) -> Result<String> {
    let text = client
        .post(url)
        .form(form)
        .send()
        .await?
        .error_for_status()?
        .text()
        .await?;
    Ok(text)
}
