use std::time::Duration;

use once_cell::sync::Lazy;
use serde::Serialize;

static CLIENT: Lazy<reqwest::Client> = Lazy::new(|| {
    reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(5))
        .timeout(Duration::from_secs(30))
        .build()
        .expect("Failed to build reqwest client")
});

/// GET with HTTP Basic auth, used for the client-credentials token grant.
pub async fn get_basic_auth(
    url: &str,
    username: &str,
    password: &str,
) -> Result<reqwest::Response, reqwest::Error> {
    CLIENT
        .get(url)
        .basic_auth(username, Some(password))
        .send()
        .await
}

/// POST a JSON payload with a bearer token.
pub async fn post_json_bearer<T: Serialize>(
    url: &str,
    token: &str,
    payload: &T,
) -> Result<reqwest::Response, reqwest::Error> {
    CLIENT
        .post(url)
        .bearer_auth(token)
        .json(payload)
        .send()
        .await
}
