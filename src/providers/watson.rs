//! IBM Watson Text to Speech, authenticated with short-lived IAM bearer tokens.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{header, Client};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use super::{classify_status, transport_error, Synthesizer};
use crate::config::WatsonConfig;
use crate::error::AppError;
use crate::narration::Voice;

const SERVICE: &str = "Watson TTS";
const IAM_SERVICE: &str = "IBM IAM";
const IAM_GRANT_TYPE: &str = "urn:ibm:params:oauth:grant-type:apikey";
const IAM_TIMEOUT: Duration = Duration::from_secs(30);
const SYNTHESIS_TIMEOUT: Duration = Duration::from_secs(120);
const DEFAULT_TOKEN_LIFETIME_SECS: u64 = 3600;
const TOKEN_REFRESH_MARGIN_SECS: u64 = 60;

pub struct WatsonSynthesizer {
    config: WatsonConfig,
    client: Client,
    token: RwLock<Option<CachedToken>>,
}

#[derive(Debug, Clone)]
struct CachedToken {
    value: String,
    refresh_at: Instant,
}

impl CachedToken {
    fn new(value: String, expires_in: Option<u64>, now: Instant) -> Self {
        let lifetime = expires_in
            .unwrap_or(DEFAULT_TOKEN_LIFETIME_SECS)
            .saturating_sub(TOKEN_REFRESH_MARGIN_SECS);
        Self {
            value,
            refresh_at: now + Duration::from_secs(lifetime),
        }
    }

    fn is_fresh(&self, now: Instant) -> bool {
        now < self.refresh_at
    }
}

#[derive(Debug, Deserialize)]
struct IamTokenResponse {
    access_token: Option<String>,
    expires_in: Option<u64>,
}

#[derive(Debug, Serialize)]
struct SynthesizeRequest<'a> {
    text: &'a str,
}

impl WatsonSynthesizer {
    pub fn new(config: WatsonConfig) -> Self {
        Self {
            config,
            client: Client::new(),
            token: RwLock::new(None),
        }
    }

    async fn access_token(&self) -> Result<String, AppError> {
        {
            let cached = self.token.read().await;
            if let Some(token) = cached.as_ref().filter(|t| t.is_fresh(Instant::now())) {
                return Ok(token.value.clone());
            }
        }

        let mut cached = self.token.write().await;
        // Another request may have refreshed while we waited for the lock.
        if let Some(token) = cached.as_ref().filter(|t| t.is_fresh(Instant::now())) {
            return Ok(token.value.clone());
        }

        let token = self.fetch_token().await?;
        let value = token.value.clone();
        tracing::info!(
            refresh_in_secs = token.refresh_at.saturating_duration_since(Instant::now()).as_secs(),
            "Refreshed IBM IAM token"
        );
        *cached = Some(token);
        Ok(value)
    }

    async fn fetch_token(&self) -> Result<CachedToken, AppError> {
        let api_key = self
            .config
            .api_key
            .as_ref()
            .ok_or_else(|| AppError::credentials(SERVICE, "IBM_API_KEY is not configured"))?;

        let response = self
            .client
            .post(&self.config.iam_url)
            .form(&[
                ("grant_type", IAM_GRANT_TYPE),
                ("apikey", api_key.expose_secret().as_str()),
            ])
            .timeout(IAM_TIMEOUT)
            .send()
            .await
            .map_err(|e| transport_error(IAM_SERVICE, e))?;

        let status = response.status();
        if status.is_client_error() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::credentials(
                IAM_SERVICE,
                format!("token request refused with HTTP {}: {}", status.as_u16(), body.trim()),
            ));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(IAM_SERVICE, status, &body));
        }

        let body: IamTokenResponse = response
            .json()
            .await
            .map_err(|e| AppError::upstream(IAM_SERVICE, format!("invalid token response: {}", e)))?;

        let access_token = body
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AppError::credentials(IAM_SERVICE, "no access_token in response"))?;

        Ok(CachedToken::new(access_token, body.expires_in, Instant::now()))
    }
}

#[async_trait]
impl Synthesizer for WatsonSynthesizer {
    fn name(&self) -> &'static str {
        SERVICE
    }

    fn is_configured(&self) -> bool {
        self.config.api_key.is_some() && self.config.tts_url.is_some()
    }

    #[tracing::instrument(skip(self, text), fields(voice_id = voice.id()))]
    async fn synthesize(&self, text: &str, voice: Voice) -> Result<Vec<u8>, AppError> {
        let base_url = self
            .config
            .tts_url
            .as_deref()
            .ok_or_else(|| AppError::credentials(SERVICE, "IBM_TTS_URL is not configured"))?;

        let token = self.access_token().await?;

        let response = self
            .client
            .post(format!("{}/v1/synthesize", base_url))
            .query(&[("voice", voice.id())])
            .bearer_auth(token)
            .header(header::ACCEPT, "audio/mp3")
            .json(&SynthesizeRequest { text })
            .timeout(SYNTHESIS_TIMEOUT)
            .send()
            .await
            .map_err(|e| transport_error(SERVICE, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(SERVICE, status, &body));
        }

        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let body = response
            .bytes()
            .await
            .map_err(|e| transport_error(SERVICE, e))?;

        let audio = check_audio(content_type.as_deref(), body.to_vec())?;
        tracing::debug!(bytes = audio.len(), "Synthesis complete");
        Ok(audio)
    }
}

/// Watson can answer 200 with a JSON error document instead of audio.
fn check_audio(content_type: Option<&str>, body: Vec<u8>) -> Result<Vec<u8>, AppError> {
    if content_type.is_some_and(|ct| ct.contains("application/json")) {
        let text = String::from_utf8_lossy(&body);
        let shown: String = text.trim().chars().take(200).collect();
        return Err(AppError::upstream(SERVICE, format!("error payload: {}", shown)));
    }

    if body.is_empty() {
        return Err(AppError::upstream(SERVICE, "returned no audio"));
    }

    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{
        bearer_token, body_json, body_string_contains, header, method, path, query_param,
    };
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(api_key: Option<&str>, tts_url: Option<&str>) -> WatsonConfig {
        WatsonConfig {
            api_key: api_key.map(|k| secrecy::Secret::new(k.to_string())),
            tts_url: tts_url.map(str::to_string),
            iam_url: "http://127.0.0.1:9/identity/token".to_string(),
        }
    }

    #[test]
    fn token_refreshes_a_minute_early() {
        let now = Instant::now();
        let token = CachedToken::new("t".into(), Some(3600), now);
        assert!(token.is_fresh(now + Duration::from_secs(3539)));
        assert!(!token.is_fresh(now + Duration::from_secs(3540)));
    }

    #[test]
    fn token_without_expiry_uses_default_lifetime() {
        let now = Instant::now();
        let token = CachedToken::new("t".into(), None, now);
        assert_eq!(token.refresh_at, now + Duration::from_secs(3540));
    }

    #[test]
    fn very_short_lived_token_is_immediately_stale() {
        let now = Instant::now();
        let token = CachedToken::new("t".into(), Some(30), now);
        assert!(!token.is_fresh(now));
    }

    #[test]
    fn json_payload_is_rejected_as_audio() {
        let err = check_audio(
            Some("application/json; charset=utf-8"),
            br#"{"error":"Model not found","code":404}"#.to_vec(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("Model not found"));
    }

    #[test]
    fn mp3_body_passes_through() {
        let audio = check_audio(Some("audio/mp3"), vec![0x49, 0x44, 0x33]).unwrap();
        assert_eq!(audio, vec![0x49, 0x44, 0x33]);
    }

    #[test]
    fn empty_body_is_rejected() {
        assert!(check_audio(Some("audio/mp3"), Vec::new()).is_err());
    }

    #[test]
    fn configured_only_with_key_and_url() {
        assert!(WatsonSynthesizer::new(config(Some("k"), Some("https://tts"))).is_configured());
        assert!(!WatsonSynthesizer::new(config(Some("k"), None)).is_configured());
        assert!(!WatsonSynthesizer::new(config(None, Some("https://tts"))).is_configured());
    }

    #[tokio::test]
    async fn missing_url_is_credentials_error() {
        let synth = WatsonSynthesizer::new(config(Some("k"), None));
        let err = synth.synthesize("hi", Voice::Lisa).await.unwrap_err();
        assert!(matches!(err, AppError::Credentials { .. }));
    }

    #[tokio::test]
    async fn missing_key_is_credentials_error() {
        let synth = WatsonSynthesizer::new(config(None, Some("http://127.0.0.1:9")));
        let err = synth.synthesize("hi", Voice::Lisa).await.unwrap_err();
        assert!(matches!(err, AppError::Credentials { .. }));
    }

    const MP3: &[u8] = &[0x49, 0x44, 0x33, 0x04, 0x00];

    fn mock_config(server: &MockServer) -> WatsonConfig {
        WatsonConfig {
            api_key: Some(secrecy::Secret::new("ibm-key".to_string())),
            tts_url: Some(server.uri()),
            iam_url: format!("{}/identity/token", server.uri()),
        }
    }

    async fn mount_iam(server: &MockServer, expires_in: u64, calls: u64) {
        Mock::given(method("POST"))
            .and(path("/identity/token"))
            .and(body_string_contains("apikey=ibm-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "iam-token",
                "token_type": "Bearer",
                "expires_in": expires_in,
            })))
            .expect(calls)
            .mount(server)
            .await;
    }

    async fn mount_synthesize(server: &MockServer, calls: u64) {
        Mock::given(method("POST"))
            .and(path("/v1/synthesize"))
            .and(bearer_token("iam-token"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(MP3, "audio/mp3"))
            .expect(calls)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn synthesize_sends_voice_accept_and_text() {
        let server = MockServer::start().await;
        mount_iam(&server, 3600, 1).await;
        Mock::given(method("POST"))
            .and(path("/v1/synthesize"))
            .and(query_param("voice", "en-GB_KateV3Voice"))
            .and(header("accept", "audio/mp3"))
            .and(bearer_token("iam-token"))
            .and(body_json(json!({ "text": "Good evening." })))
            .respond_with(ResponseTemplate::new(200).set_body_raw(MP3, "audio/mp3"))
            .expect(1)
            .mount(&server)
            .await;

        let synth = WatsonSynthesizer::new(mock_config(&server));
        let audio = synth.synthesize("Good evening.", Voice::Kate).await.unwrap();
        assert_eq!(audio, MP3);
        server.verify().await;
    }

    #[tokio::test]
    async fn token_is_fetched_once_while_fresh() {
        let server = MockServer::start().await;
        mount_iam(&server, 3600, 1).await;
        mount_synthesize(&server, 4).await;

        let synth = WatsonSynthesizer::new(mock_config(&server));
        synth.synthesize("one", Voice::Allison).await.unwrap();
        synth.synthesize("two", Voice::Lisa).await.unwrap();
        let (a, b) = tokio::join!(
            synth.synthesize("three", Voice::Michael),
            synth.synthesize("four", Voice::Kate),
        );
        a.unwrap();
        b.unwrap();
        server.verify().await;
    }

    #[tokio::test]
    async fn stale_token_is_fetched_again() {
        let server = MockServer::start().await;
        mount_iam(&server, 30, 2).await;
        mount_synthesize(&server, 2).await;

        let synth = WatsonSynthesizer::new(mock_config(&server));
        synth.synthesize("one", Voice::Allison).await.unwrap();
        synth.synthesize("two", Voice::Allison).await.unwrap();
        server.verify().await;
    }

    #[tokio::test]
    async fn rejected_api_key_is_iam_credentials_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/identity/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "errorCode": "BXNIM0415E",
                "errorMessage": "Provided API key could not be found.",
            })))
            .expect(1)
            .mount(&server)
            .await;
        mount_synthesize(&server, 0).await;

        let synth = WatsonSynthesizer::new(mock_config(&server));
        let err = synth.synthesize("hi", Voice::Allison).await.unwrap_err();
        match err {
            AppError::Credentials { service, message } => {
                assert_eq!(service, IAM_SERVICE);
                assert!(message.contains("HTTP 400"));
            }
            other => panic!("expected credentials error, got {:?}", other),
        }
        server.verify().await;
    }

    #[tokio::test]
    async fn token_response_without_access_token_is_credentials_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/identity/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "expires_in": 3600 })))
            .mount(&server)
            .await;

        let synth = WatsonSynthesizer::new(mock_config(&server));
        let err = synth.synthesize("hi", Voice::Allison).await.unwrap_err();
        assert!(matches!(err, AppError::Credentials { service: IAM_SERVICE, .. }));
    }

    #[tokio::test]
    async fn json_error_with_ok_status_is_upstream_error() {
        let server = MockServer::start().await;
        mount_iam(&server, 3600, 1).await;
        Mock::given(method("POST"))
            .and(path("/v1/synthesize"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "error": "Model not found", "code": 404 })),
            )
            .mount(&server)
            .await;

        let synth = WatsonSynthesizer::new(mock_config(&server));
        let err = synth.synthesize("hi", Voice::Allison).await.unwrap_err();
        assert!(matches!(err, AppError::UpstreamUnavailable { .. }));
        assert!(err.to_string().contains("Model not found"));
    }

    #[tokio::test]
    async fn unauthorized_synthesis_is_credentials_error() {
        let server = MockServer::start().await;
        mount_iam(&server, 3600, 1).await;
        Mock::given(method("POST"))
            .and(path("/v1/synthesize"))
            .respond_with(ResponseTemplate::new(401).set_body_string("Unauthorized"))
            .mount(&server)
            .await;

        let synth = WatsonSynthesizer::new(mock_config(&server));
        let err = synth.synthesize("hi", Voice::Allison).await.unwrap_err();
        assert!(matches!(err, AppError::Credentials { service: SERVICE, .. }));
    }
}
