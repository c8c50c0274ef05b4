// src/services/session.rs

//! Authenticated session against the lending backend.
//!
//! The backend has no API. Every action is a form POST whose outcome is
//! read from markers embedded in the returned page. All requests share one
//! cookie store, so a login carries over to the rent/reserve call that
//! follows it.

use async_trait::async_trait;
use reqwest::Client;
use scraper::Html;
use tokio::sync::Mutex;
use url::Url;

use crate::error::{AppError, FailureKind, Result};
use crate::models::{Credentials, Media};
use crate::utils::{http, parse_selector, resolve_url};

/// Text of the error badge shown after a rejected login.
pub const LOGIN_ERROR_MARKER: &str = "danger:";

/// Headline shown on the account page after a successful login.
pub const LOGIN_SUCCESS_MARKER: &str = "Ihr Benutzerkonto";

/// Message the backend renders when a rent or reserve request failed.
pub const ACTION_ERROR_MESSAGE: &str =
    "Ein unerwarteter Fehler ist aufgetreten! Bitte versuchen Sie es später noch einmal.";

const USERNAME_FIELD: &str = "userName";
const PASSWORD_FIELD: &str = "password";

/// Outcome of a session action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutcome {
    Success,
    Failed { kind: FailureKind, message: String },
}

impl ActionOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ActionOutcome::Success)
    }

    /// Convert an action result, logging failures with their kind.
    fn from_result(action: &str, result: Result<()>) -> Self {
        match result {
            Ok(()) => {
                log::info!("{} succeeded", action);
                ActionOutcome::Success
            }
            Err(e) => {
                let kind = e.kind();
                log::error!("{} failed ({} failure): {}", action, kind, e);
                ActionOutcome::Failed {
                    kind,
                    message: e.to_string(),
                }
            }
        }
    }
}

/// Stateful actions on the lending backend.
///
/// Implementations never return errors: transport and backend failures are
/// logged and reported as [`ActionOutcome::Failed`].
#[async_trait]
pub trait LendingService: Send + Sync {
    /// Perform a full login handshake.
    async fn login(&self) -> ActionOutcome;

    /// Rent `media` for `lend_period_days`, logging in first if requested.
    async fn rent_media(
        &self,
        media: &Media,
        lend_period_days: u32,
        require_login: bool,
    ) -> ActionOutcome;

    /// Reserve `media`, optionally asking the backend to mail `notify_email`.
    async fn reserve_media(
        &self,
        media: &Media,
        notify_email: Option<&str>,
        require_login: bool,
    ) -> ActionOutcome;
}

/// Cookie-backed session for one library account.
pub struct LibrarySession {
    client: Client,
    base_url: String,
    credentials: Credentials,
    /// Serializes actions so two rent/reserve flows never interleave.
    action_lock: Mutex<()>,
}

impl LibrarySession {
    /// Create a session. `client` must have a cookie store enabled.
    pub fn new(client: Client, base_url: &str, credentials: Credentials) -> Result<Self> {
        Url::parse(base_url)?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            credentials,
            action_lock: Mutex::new(()),
        })
    }

    fn frontend_url(&self, page: &str) -> String {
        format!(
            "{}/{}/frontend/{}",
            self.base_url, self.credentials.library, page
        )
    }

    pub fn login_url(&self) -> String {
        format!(
            "{}?libraryId={}",
            self.frontend_url("login,0-0-0-800-0-0-0-0-0-0-0.html"),
            self.credentials.library_id
        )
    }

    pub fn rent_url(&self, media: &Media) -> String {
        self.frontend_url(&format!(
            "mediaLend,0-0-{}-303-0-0-0-0-0-0-0.html",
            media.id()
        ))
    }

    pub fn reserve_url(&self, media: &Media) -> String {
        self.frontend_url(&format!(
            "mediaReserve,0-0-{}-303-0-0-0-0-0-0-0.html",
            media.id()
        ))
    }

    /// Log in, returning the account page on success.
    pub async fn try_login(&self) -> Result<String> {
        let login_url = self.login_url();
        let page = http::fetch_text(&self.client, &login_url).await?;

        let form = LoginForm::parse(&page, &login_url)?;
        let fields = form.with_credentials(
            &self.credentials.username,
            &self.credentials.password,
        );

        log::debug!("Submitting login form to {}", form.action);
        let response = http::post_form(&self.client, &form.action, &fields).await?;
        check_login_response(&response)?;

        Ok(response)
    }

    /// Rent `media`; absence of the backend error message counts as success.
    pub async fn try_rent(
        &self,
        media: &Media,
        lend_period_days: u32,
        require_login: bool,
    ) -> Result<String> {
        if require_login {
            self.try_login().await?;
        }

        let id = media.id().to_string();
        let lend_period = lend_period_days.to_string();
        let form = [("pVersionId", id.as_str()), ("pLendPeriod", lend_period.as_str())];

        let response = http::post_form(&self.client, &self.rent_url(media), &form).await?;
        if has_action_error(&response)? {
            return Err(AppError::Rent(format!(
                "backend reported an unexpected error renting '{}'",
                media.title
            )));
        }
        Ok(response)
    }

    /// Reserve `media`; absence of the backend error message counts as success.
    pub async fn try_reserve(
        &self,
        media: &Media,
        notify_email: Option<&str>,
        require_login: bool,
    ) -> Result<String> {
        if require_login {
            self.try_login().await?;
        }

        let form = reserve_form(media, notify_email);
        let response = http::post_form(&self.client, &self.reserve_url(media), &form).await?;
        if has_action_error(&response)? {
            return Err(AppError::Reserve(format!(
                "backend reported an unexpected error reserving '{}'",
                media.title
            )));
        }
        Ok(response)
    }
}

#[async_trait]
impl LendingService for LibrarySession {
    async fn login(&self) -> ActionOutcome {
        let _guard = self.action_lock.lock().await;
        let result = self.try_login().await.map(|_| ());
        ActionOutcome::from_result("Login", result)
    }

    async fn rent_media(
        &self,
        media: &Media,
        lend_period_days: u32,
        require_login: bool,
    ) -> ActionOutcome {
        let _guard = self.action_lock.lock().await;
        let result = self
            .try_rent(media, lend_period_days, require_login)
            .await
            .map(|_| ());
        ActionOutcome::from_result(&format!("Renting '{}'", media.title), result)
    }

    async fn reserve_media(
        &self,
        media: &Media,
        notify_email: Option<&str>,
        require_login: bool,
    ) -> ActionOutcome {
        let _guard = self.action_lock.lock().await;
        let result = self
            .try_reserve(media, notify_email, require_login)
            .await
            .map(|_| ());
        ActionOutcome::from_result(&format!("Reserving '{}'", media.title), result)
    }
}

/// The login form as found on the login page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginForm {
    /// Absolute submit URL.
    pub action: String,
    /// Every named input, in document order.
    pub fields: Vec<(String, String)>,
}

impl LoginForm {
    /// Locate `form#loginForm` and collect its named inputs.
    pub fn parse(html: &str, page_url: &str) -> Result<Self> {
        let document = Html::parse_document(html);
        let form_sel = parse_selector("form#loginForm")?;
        let input_sel = parse_selector("input[name]")?;

        let form = document
            .select(&form_sel)
            .next()
            .ok_or_else(|| AppError::Login("Login form could not be found.".into()))?;

        let raw_action = form
            .value()
            .attr("action")
            .ok_or_else(|| AppError::Login("Login form has no action.".into()))?;
        let action = resolve_url(&Url::parse(page_url)?, raw_action);

        let fields = form
            .select(&input_sel)
            .filter_map(|input| {
                let name = input.value().attr("name")?;
                let value = input.value().attr("value").unwrap_or("");
                Some((name.to_string(), value.to_string()))
            })
            .collect();

        Ok(Self { action, fields })
    }

    /// Form payload with the credential fields overwritten.
    pub fn with_credentials(&self, username: &str, password: &str) -> Vec<(String, String)> {
        let mut fields = self.fields.clone();
        set_field(&mut fields, USERNAME_FIELD, username);
        set_field(&mut fields, PASSWORD_FIELD, password);
        fields
    }
}

/// Overwrite every input called `name`, appending one if the form has none.
fn set_field(fields: &mut Vec<(String, String)>, name: &str, value: &str) {
    let mut found = false;
    for (_, existing) in fields.iter_mut().filter(|(key, _)| key == name) {
        *existing = value.to_string();
        found = true;
    }
    if !found {
        fields.push((name.to_string(), value.to_string()));
    }
}

/// Both markers are checked: an error badge fails the login, and so does a
/// page that lacks the account headline.
pub fn check_login_response(html: &str) -> Result<()> {
    let document = Html::parse_document(html);
    let span_sel = parse_selector("span")?;
    let headline_sel = parse_selector("h3.headline.my-4")?;

    let has_error = document
        .select(&span_sel)
        .any(|el| el.text().collect::<String>().trim() == LOGIN_ERROR_MARKER);
    if has_error {
        return Err(AppError::Login(
            "The login attempt was unsuccessful. Please check your login details and try again."
                .into(),
        ));
    }

    let has_greeting = document
        .select(&headline_sel)
        .any(|el| el.text().collect::<String>().trim() == LOGIN_SUCCESS_MARKER);
    if !has_greeting {
        return Err(AppError::Login(
            "Unable to determine if the login was successful.".into(),
        ));
    }

    Ok(())
}

/// True when the page carries the backend's generic action error.
pub fn has_action_error(html: &str) -> Result<bool> {
    let document = Html::parse_document(html);
    let message_sel = parse_selector("p.text-center.mb-0")?;
    Ok(document
        .select(&message_sel)
        .any(|el| el.text().collect::<String>().trim() == ACTION_ERROR_MESSAGE))
}

fn reserve_form(media: &Media, notify_email: Option<&str>) -> Vec<(&'static str, String)> {
    let mut form = vec![("pMediaId", media.id().to_string())];
    if let Some(email) = notify_email {
        form.push(("pRecipient", email.to_string()));
        form.push(("pConfirmedRecipient", email.to_string()));
    }
    form
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Availability;

    const LOGIN_PAGE: &str = r#"
        <html><body>
          <form id="searchForm" action="/search"><input name="q" value=""></form>
          <form id="loginForm" method="post" action="login-submit,0-0-0-800.html">
            <input type="hidden" name="cardId" value="abc">
            <input type="hidden" name="token">
            <input type="text" name="userName" value="">
            <input type="password" name="password">
            <input type="submit" value="Anmelden">
          </form>
        </body></html>"#;

    fn magazine() -> Media {
        Media::magazine(
            "mediaInfo,0-0-555-400-0.html",
            "Stadtmagazin",
            "berlin",
            Availability::now(),
        )
        .unwrap()
    }

    #[test]
    fn test_login_form_collects_inputs() {
        let form = LoginForm::parse(
            LOGIN_PAGE,
            "https://www.onleihe.de/berlin/frontend/login,0-0-0-800-0-0-0-0-0-0-0.html?libraryId=1",
        )
        .unwrap();
        assert_eq!(
            form.action,
            "https://www.onleihe.de/berlin/frontend/login-submit,0-0-0-800.html"
        );
        assert_eq!(
            form.fields,
            vec![
                ("cardId".to_string(), "abc".to_string()),
                ("token".to_string(), String::new()),
                ("userName".to_string(), String::new()),
                ("password".to_string(), String::new()),
            ]
        );

        let payload = form.with_credentials("reader", "secret");
        assert!(payload.contains(&("userName".to_string(), "reader".to_string())));
        assert!(payload.contains(&("password".to_string(), "secret".to_string())));
        assert_eq!(payload.len(), 4);
    }

    #[test]
    fn test_repeated_credential_inputs_all_overwritten() {
        let html = r#"<form id="loginForm" action="/login-submit.html">
            <input type="hidden" name="userName" value="stale">
            <input type="text" name="userName" value="">
            <input type="password" name="password" value="placeholder">
            <input type="hidden" name="password" value="placeholder">
        </form>"#;
        let form = LoginForm::parse(html, "https://www.onleihe.de/berlin/frontend/login.html")
            .unwrap();

        let payload = form.with_credentials("reader", "secret");
        assert_eq!(payload.len(), 4);
        assert!(
            payload
                .iter()
                .filter(|(k, _)| k == "userName")
                .all(|(_, v)| v == "reader")
        );
        assert!(
            payload
                .iter()
                .filter(|(k, _)| k == "password")
                .all(|(_, v)| v == "secret")
        );
    }

    #[test]
    fn test_missing_login_form() {
        let err = LoginForm::parse("<html></html>", "https://example.com/").unwrap_err();
        assert!(matches!(err, AppError::Login(_)));
    }

    #[test]
    fn test_login_response_markers() {
        let ok = r#"<h3 class="headline my-4">Ihr Benutzerkonto</h3>"#;
        assert!(check_login_response(ok).is_ok());

        let rejected = r#"<span>danger: </span><h3 class="headline my-4">Ihr Benutzerkonto</h3>"#;
        assert!(check_login_response(rejected).is_err());

        let inconclusive = "<html><body><p>Willkommen</p></body></html>";
        let err = check_login_response(inconclusive).unwrap_err();
        assert!(err.to_string().contains("Unable to determine"));
    }

    #[test]
    fn test_action_error_detection() {
        let page = format!(r#"<p class="text-center mb-0">{ACTION_ERROR_MESSAGE}</p>"#);
        assert!(has_action_error(&page).unwrap());
        assert!(!has_action_error("<p class=\"text-center mb-0\">Danke!</p>").unwrap());
    }

    #[test]
    fn test_reserve_form_repeats_email() {
        let media = magazine();
        let form = reserve_form(&media, Some("me@example.com"));
        assert_eq!(
            form,
            vec![
                ("pMediaId", "555".to_string()),
                ("pRecipient", "me@example.com".to_string()),
                ("pConfirmedRecipient", "me@example.com".to_string()),
            ]
        );
        assert_eq!(reserve_form(&media, None).len(), 1);
    }

    #[test]
    fn test_action_urls() {
        let credentials = Credentials {
            username: "reader".into(),
            password: "secret".into(),
            library: "berlin".into(),
            library_id: 42,
        };
        let session =
            LibrarySession::new(Client::new(), "https://www.onleihe.de/", credentials).unwrap();
        assert_eq!(
            session.login_url(),
            "https://www.onleihe.de/berlin/frontend/login,0-0-0-800-0-0-0-0-0-0-0.html?libraryId=42"
        );
        assert_eq!(
            session.rent_url(&magazine()),
            "https://www.onleihe.de/berlin/frontend/mediaLend,0-0-555-303-0-0-0-0-0-0-0.html"
        );
    }
}
