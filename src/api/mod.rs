mod auth;
mod bookmarks;
mod error;

pub(crate) use auth::OAuthProvider;
pub(crate) use error::{ApiError, ApiErrorKind, ApiResult};

use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Clone, Debug)]
pub(crate) struct EnvConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
}

impl EnvConfig {
    pub fn new() -> Self {
        let mut cfg = Self {
            supabase_url: "http://localhost:54321".to_string(),
            supabase_anon_key: String::new(),
        };

        // Deployments inject `window.ENV` before the wasm bundle loads. Both the
        // upper-case (documented) and lower-case spellings are accepted.
        if let Some(env) = web_sys::window().and_then(|w| w.get("ENV")) {
            if !env.is_undefined() && env.is_object() {
                if let Some(url) = read_env(&env, &["SUPABASE_URL", "supabase_url"]) {
                    cfg.supabase_url = url;
                }
                if let Some(key) = read_env(&env, &["SUPABASE_ANON_KEY", "supabase_anon_key"]) {
                    cfg.supabase_anon_key = key;
                }
            }
        }

        cfg
    }
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self::new()
    }
}

fn read_env(env: &js_sys::Object, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|k| {
        js_sys::Reflect::get(env, &(*k).into())
            .ok()
            .and_then(|v| v.as_string())
    })
}

/// Handle to the hosted backend: auth, the `bookmarks` table and realtime.
///
/// Cheap to clone. The session itself lives in localStorage, so every clone
/// sees the same signed-in user.
#[derive(Clone, Debug)]
pub(crate) struct SupabaseClient {
    pub(crate) base_url: String,
    pub(crate) anon_key: String,
}

impl SupabaseClient {
    pub fn new(base_url: impl Into<String>, anon_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            anon_key: anon_key.into(),
        }
    }

    pub fn from_env() -> Self {
        let cfg = EnvConfig::new();
        Self::new(cfg.supabase_url, cfg.supabase_anon_key)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Requests without a user token run as the anonymous role.
    fn with_auth_headers(
        &self,
        req: reqwest::RequestBuilder,
        access_token: Option<&str>,
    ) -> reqwest::RequestBuilder {
        let bearer = access_token.unwrap_or(&self.anon_key);
        req.header("apikey", self.anon_key.as_str())
            .header("Authorization", format!("Bearer {bearer}"))
    }

    async fn send(&self, req: reqwest::RequestBuilder) -> ApiResult<reqwest::Response> {
        let res = req.send().await.map_err(ApiError::network)?;
        if res.status().is_success() {
            Ok(res)
        } else {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            Err(ApiError::http(status, &body))
        }
    }

    async fn send_json<T: serde::de::DeserializeOwned>(
        &self,
        req: reqwest::RequestBuilder,
    ) -> ApiResult<T> {
        self.send(req).await?.json().await.map_err(ApiError::parse)
    }

    /// `wss://<host>/realtime/v1/websocket?apikey=...&vsn=1.0.0`
    pub(crate) fn realtime_url(&self) -> String {
        let ws_base = if let Some(rest) = self.base_url.strip_prefix("https://") {
            format!("wss://{rest}")
        } else if let Some(rest) = self.base_url.strip_prefix("http://") {
            format!("ws://{rest}")
        } else {
            self.base_url.clone()
        };
        format!(
            "{ws_base}/realtime/v1/websocket?apikey={}&vsn=1.0.0",
            urlencoding::encode(&self.anon_key)
        )
    }
}
