use crate::auth::{Credential, SCOPE_DRIVE, SCOPE_SPREADSHEETS};
use anyhow::{Context, Result};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::{DateTime, Duration, Utc};
use openssl::hash::MessageDigest;
use openssl::pkey::PKey;
use openssl::sign::Signer;
use serde::{Deserialize, Serialize};

const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: i64 = 3600;

/// Exchanges a service-account key for OAuth bearer tokens, caching one token per process.
#[derive(Debug)]
pub struct ServiceAccountAuth {
    http: reqwest::Client,
    credential: Credential,
    scopes: Vec<&'static str>,
    token_cache: tokio::sync::Mutex<Option<AccessToken>>,
}

#[derive(Debug, Clone)]
struct AccessToken {
    token: String,
    expires_at: DateTime<Utc>,
}

impl AccessToken {
    fn is_expired_or_stale(&self, now: DateTime<Utc>) -> bool {
        // Refresh a bit early so an in-flight request never carries a dead token.
        now + Duration::minutes(2) >= self.expires_at
    }
}

impl ServiceAccountAuth {
    pub fn new(http: reqwest::Client, credential: Credential) -> Self {
        Self {
            http,
            credential,
            scopes: vec![SCOPE_SPREADSHEETS, SCOPE_DRIVE],
            token_cache: tokio::sync::Mutex::new(None),
        }
    }

    pub fn client_email(&self) -> &str {
        self.credential.client_email()
    }

    pub async fn access_token(&self) -> Result<String> {
        let mut guard = self.token_cache.lock().await;
        if let Some(cached) = guard.as_ref() {
            if !cached.is_expired_or_stale(Utc::now()) {
                return Ok(cached.token.clone());
            }
        }

        let token = self.fetch_access_token().await?;
        tracing::debug!(
            client_email = %self.client_email(),
            expires_at = %token.expires_at,
            "issued spreadsheet access token"
        );
        let out = token.token.clone();
        *guard = Some(token);
        Ok(out)
    }

    async fn fetch_access_token(&self) -> Result<AccessToken> {
        let issued_at = Utc::now();
        let assertion = build_assertion(&self.credential, &self.scopes, issued_at)?;
        let token_uri = &self.credential.key().token_uri;

        let res = self
            .http
            .post(token_uri.as_str())
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await
            .context("token request failed")?;

        let status = res.status();
        let text = res
            .text()
            .await
            .context("failed to read token response")?;
        if !status.is_success() {
            anyhow::bail!("token endpoint HTTP {status}: {text}");
        }

        let parsed = serde_json::from_str::<TokenResponse>(&text)
            .context("failed to parse token response")?;
        anyhow::ensure!(
            !parsed.access_token.is_empty(),
            "token response has empty access_token"
        );

        let lifetime = if parsed.expires_in > 0 {
            parsed.expires_in as i64
        } else {
            ASSERTION_LIFETIME_SECS
        };

        Ok(AccessToken {
            token: parsed.access_token,
            expires_at: issued_at + Duration::seconds(lifetime),
        })
    }
}

#[derive(Debug, Serialize)]
struct JwtHeader<'a> {
    alg: &'static str,
    typ: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    kid: Option<&'a str>,
}

#[derive(Debug, Serialize, Deserialize)]
struct JwtClaims {
    iss: String,
    scope: String,
    aud: String,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: u64,
}

fn build_assertion(
    credential: &Credential,
    scopes: &[&str],
    issued_at: DateTime<Utc>,
) -> Result<String> {
    let key = credential.key();

    let header = JwtHeader {
        alg: "RS256",
        typ: "JWT",
        kid: key.private_key_id.as_deref(),
    };
    let iat = issued_at.timestamp();
    let claims = JwtClaims {
        iss: key.client_email.clone(),
        scope: scopes.join(" "),
        aud: key.token_uri.clone(),
        iat,
        exp: iat + ASSERTION_LIFETIME_SECS,
    };

    let header_b64 = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&header)?);
    let claims_b64 = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims)?);
    let signing_input = format!("{header_b64}.{claims_b64}");

    let pkey = PKey::private_key_from_pem(key.private_key.as_bytes())
        .context("failed to load service account private key")?;
    let mut signer =
        Signer::new(MessageDigest::sha256(), &pkey).context("failed to create RS256 signer")?;
    signer.update(signing_input.as_bytes())?;
    let signature = signer.sign_to_vec().context("failed to sign JWT assertion")?;

    Ok(format!("{signing_input}.{}", URL_SAFE_NO_PAD.encode(signature)))
}
