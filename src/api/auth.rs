use super::{ApiError, ApiErrorKind, ApiResult, SupabaseClient};
use crate::models::{Principal, Session};
use crate::storage::{
    clear_session_storage, load_session_from_storage, save_code_verifier,
    save_session_to_storage, take_code_verifier,
};
use crate::util::{now_secs, random_code_verifier};
use leptos::logging::{error, warn};
use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, strum::Display, strum::AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub(crate) enum OAuthProvider {
    Google,
}

#[derive(Serialize, Clone, Debug)]
struct PkceExchangeRequest<'a> {
    auth_code: &'a str,
    code_verifier: &'a str,
}

#[derive(Serialize, Clone, Debug)]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

impl SupabaseClient {
    /// GoTrue authorize URL for the PKCE flow. The `plain` challenge method
    /// sends the verifier itself as the challenge.
    pub(crate) fn authorize_url(
        &self,
        provider: OAuthProvider,
        redirect_to: &str,
        code_verifier: &str,
    ) -> String {
        format!(
            "{}?provider={}&redirect_to={}&code_challenge={}&code_challenge_method=plain",
            self.url("/auth/v1/authorize"),
            provider,
            urlencoding::encode(redirect_to),
            urlencoding::encode(code_verifier),
        )
    }

    /// Start the redirect-based OAuth flow. The browser leaves the app; the
    /// flow resumes at `redirect_to` with a `code` query parameter.
    pub fn sign_in(&self, provider: OAuthProvider, redirect_to: &str) -> ApiResult<()> {
        let verifier = random_code_verifier().map_err(|e| ApiError::invalid(e.to_string()))?;
        save_code_verifier(&verifier);

        let url = self.authorize_url(provider, redirect_to, &verifier);
        web_sys::window()
            .ok_or_else(|| ApiError::invalid("No browser window"))?
            .location()
            .set_href(&url)
            .map_err(|_| ApiError::invalid("Unable to start sign-in"))
    }

    /// Finish the OAuth flow on the callback route.
    pub async fn exchange_code(&self, code: &str) -> ApiResult<Session> {
        let verifier = take_code_verifier()
            .ok_or_else(|| ApiError::invalid("Sign-in was not started from this browser"))?;

        let req = self
            .with_auth_headers(
                reqwest::Client::new().post(self.url("/auth/v1/token?grant_type=pkce")),
                None,
            )
            .json(&PkceExchangeRequest {
                auth_code: code,
                code_verifier: &verifier,
            });

        let session: Session = self.send_json(req).await?;
        let session = session.with_issued_at(now_secs());
        save_session_to_storage(&session);
        Ok(session)
    }

    async fn refresh_session(&self, refresh_token: &str) -> ApiResult<Session> {
        let req = self
            .with_auth_headers(
                reqwest::Client::new().post(self.url("/auth/v1/token?grant_type=refresh_token")),
                None,
            )
            .json(&RefreshRequest { refresh_token });

        let session: Session = self.send_json(req).await?;
        Ok(session.with_issued_at(now_secs()))
    }

    /// The stored session, refreshed if it has expired.
    ///
    /// A refresh the server rejects signs the user out (`Ok(None)`); only a
    /// transport failure is reported as an error.
    pub(crate) async fn load_session(&self) -> ApiResult<Option<Session>> {
        let Some(session) = load_session_from_storage() else {
            return Ok(None);
        };

        if !session.is_expired(now_secs()) {
            return Ok(Some(session));
        }

        if session.refresh_token.is_empty() {
            clear_session_storage();
            return Ok(None);
        }

        match self.refresh_session(&session.refresh_token).await {
            Ok(fresh) => {
                save_session_to_storage(&fresh);
                Ok(Some(fresh))
            }
            Err(e) if e.kind == ApiErrorKind::Network => Err(e),
            Err(e) => {
                warn!("Session refresh rejected: {e}");
                clear_session_storage();
                Ok(None)
            }
        }
    }

    /// Access token for table calls, or `Unauthorized`.
    pub(crate) async fn access_token(&self) -> ApiResult<String> {
        self.load_session()
            .await?
            .map(|s| s.access_token)
            .ok_or_else(ApiError::unauthorized)
    }

    /// Ask GoTrue who the token belongs to. A token it no longer accepts
    /// means nobody is signed in.
    pub(crate) async fn fetch_user(&self) -> ApiResult<Option<Principal>> {
        let Some(session) = self.load_session().await? else {
            return Ok(None);
        };

        let req = self.with_auth_headers(
            reqwest::Client::new().get(self.url("/auth/v1/user")),
            Some(session.access_token.as_str()),
        );

        match self.send_json::<Principal>(req).await {
            Ok(user) => Ok(Some(user)),
            Err(e) if e.is_unauthorized() => {
                clear_session_storage();
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Revoke the session remotely (best effort) and forget it locally.
    pub async fn sign_out(&self) {
        if let Some(session) = load_session_from_storage() {
            let req = self.with_auth_headers(
                reqwest::Client::new().post(self.url("/auth/v1/logout")),
                Some(session.access_token.as_str()),
            );
            if let Err(e) = self.send(req).await {
                error!("Logout error: {e}");
            }
        }
        clear_session_storage();
    }
}
