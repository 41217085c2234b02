//! Seedream image generation on BytePlus ModelArk.

use reqwest::Method;
use serde_json::Value;

use super::{join_url, UpstreamClient, UpstreamError, UpstreamResponse};
use crate::config::SeedreamSettings;

const GENERATIONS_PATH: &str = "/images/generations";

pub struct SeedreamClient {
    http: UpstreamClient,
    api_key: String,
    base_url: String,
}

impl SeedreamClient {
    pub fn from_settings(
        http: UpstreamClient,
        settings: &SeedreamSettings,
    ) -> Result<Self, UpstreamError> {
        let api_key = settings
            .api_key
            .clone()
            .ok_or(UpstreamError::NotConfigured("Seedream API key"))?;
        Ok(Self {
            http,
            api_key,
            base_url: settings.api_url.clone(),
        })
    }

    /// Forward a generation body verbatim.
    pub async fn generate(&self, body: &Value) -> Result<UpstreamResponse, UpstreamError> {
        let url = join_url(&self.base_url, GENERATIONS_PATH);
        self.http
            .send_json(Method::POST, &url, &self.api_key, Some(body))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_missing_key_not_configured() {
        let http = UpstreamClient::new(&Settings::default()).unwrap();
        let settings = SeedreamSettings {
            api_key: None,
            api_url: "http://localhost".into(),
        };
        assert!(matches!(
            SeedreamClient::from_settings(http, &settings),
            Err(UpstreamError::NotConfigured(_))
        ));
    }

    #[tokio::test]
    async fn test_generate_forwards_body_verbatim() {
        let server = MockServer::start().await;
        let body = json!({"model": "seedream-4-0", "prompt": "a lighthouse", "size": "2K"});
        Mock::given(method("POST"))
            .and(path("/api/v3/images/generations"))
            .and(header("authorization", "Bearer ark-key"))
            .and(body_json(body.clone()))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"data": [{"url": "https://cdn/x.jpeg"}]})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let settings = SeedreamSettings {
            api_key: Some("ark-key".into()),
            api_url: format!("{}/api/v3", server.uri()),
        };
        let http = UpstreamClient::new(&Settings::default()).unwrap();
        let client = SeedreamClient::from_settings(http, &settings).unwrap();
        let resp = client.generate(&body).await.unwrap();
        assert!(resp.is_success());
        assert_eq!(resp.body["data"][0]["url"], "https://cdn/x.jpeg");
    }
}
