//! Platform Access Ports
//! Injected interfaces standing in for browser globals (location, storage,
//! session), so the machines stay testable without a real browser

use std::cell::RefCell;
use std::rc::Rc;

use url::Url;

use crate::cache::{SharedCache, UNSAVED_KEY};
use crate::record::Timestamp;


/// Canonical path of the visualizer page. Anything else carrying an `id`
/// query parameter is a legacy form that gets redirected client-side.
pub const CANONICAL_VIZ_PATH: &str = "/viz";

/// Runtime capabilities resolved once at construction from the embedding
/// context, instead of branching on an "embedded" flag at every call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    /// Forward edit events to the auxiliary cache-writer and
    /// leave-confirmation collaborators
    pub forward_edits: bool,
    /// Allow canvas panning
    pub pan_enabled: bool,
}

impl Capabilities {
    /// The full-page visualizer.
    pub fn standalone() -> Self {
        Self {
            forward_edits: true,
            pan_enabled: true,
        }
    }

    /// A restricted embedded display context: no auxiliary collaborators,
    /// panning only when the embedder allows it.
    pub fn embedded(pan_enabled: bool) -> Self {
        Self {
            forward_edits: false,
            pan_enabled,
        }
    }
}

// ============================================================================
// ROUTER
// ============================================================================

/// Source-identifying query parameters of the current URL
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    pub id: Option<String>,
    pub gist: Option<String>,
}

/// Access to the current location.
pub trait Router {
    fn query_params(&self) -> QueryParams;

    /// Whether the current path is a deprecated form of the visualizer URL.
    fn is_legacy_path(&self) -> bool;

    /// Replace the current URL without a page reload.
    fn replace_url(&mut self, path_and_query: &str);

    /// Best-effort removal of the named query parameters, keeping the rest
    /// of the URL intact.
    fn strip_query_params(&mut self, keys: &[&str]);
}

/// Router over an owned [`Url`], the stand-in for `window.location`.
#[derive(Debug, Clone)]
pub struct UrlRouter {
    url: Url,
}

impl UrlRouter {
    pub fn new(url: Url) -> Self {
        Self { url }
    }

    pub fn parse(url: &str) -> Result<Self, url::ParseError> {
        Ok(Self::new(Url::parse(url)?))
    }

    pub fn current(&self) -> &Url {
        &self.url
    }
}

impl Router for UrlRouter {
    fn query_params(&self) -> QueryParams {
        let mut params = QueryParams::default();
        for (key, value) in self.url.query_pairs() {
            match key.as_ref() {
                "id" => params.id = Some(value.into_owned()),
                "gist" => params.gist = Some(value.into_owned()),
                _ => {}
            }
        }
        params
    }

    fn is_legacy_path(&self) -> bool {
        self.url.path() != CANONICAL_VIZ_PATH
    }

    fn replace_url(&mut self, path_and_query: &str) {
        match self.url.join(path_and_query) {
            Ok(url) => {
                log::debug!("replace url: {url}");
                self.url = url;
            }
            Err(e) => log::warn!("refusing invalid url {path_and_query:?}: {e}"),
        }
    }

    fn strip_query_params(&mut self, keys: &[&str]) {
        let kept: Vec<(String, String)> = self
            .url
            .query_pairs()
            .filter(|(key, _)| !keys.contains(&key.as_ref()))
            .map(|(key, value)| (key.into_owned(), value.into_owned()))
            .collect();
        if kept.is_empty() {
            self.url.set_query(None);
        } else {
            self.url
                .query_pairs_mut()
                .clear()
                .extend_pairs(kept)
                .finish();
        }
    }
}

// ============================================================================
// AUTH
// ============================================================================

/// Read-only view of the authenticated session, owned and refreshed by the
/// external auth provider.
pub trait Auth {
    fn is_authenticated(&self) -> bool {
        self.current_user_id().is_some()
    }

    fn current_user_id(&self) -> Option<String>;

    fn access_token(&self) -> Option<String>;
}

/// Fixed session snapshot; enough for tests and anonymous contexts.
#[derive(Debug, Clone, Default)]
pub struct StaticAuth {
    pub user_id: Option<String>,
    pub token: Option<String>,
}

impl StaticAuth {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn logged_in(user_id: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
            token: Some(token.into()),
        }
    }
}

impl Auth for StaticAuth {
    fn current_user_id(&self) -> Option<String> {
        self.user_id.clone()
    }

    fn access_token(&self) -> Option<String> {
        self.token.clone()
    }
}

// ============================================================================
// EDIT FORWARDING
// ============================================================================

/// A forwarded edit event: the new text plus the cache coordinates it
/// should be persisted under.
#[derive(Debug, Clone, Copy)]
pub struct EditNotice<'a> {
    pub cache_key: &'a str,
    pub text: &'a str,
    pub updated_at: Option<Timestamp>,
}

/// Receiver of forwarded edit events. Wired only outside embedded mode.
pub trait EditSink {
    fn code_updated(&mut self, notice: EditNotice<'_>);
}

pub type SharedEditSink = Rc<RefCell<dyn EditSink>>;

/// Auxiliary collaborator persisting every edit to the local cache.
/// Debouncing is left to the shell's event loop, which already coalesces
/// editor change events.
pub struct CacheWriter {
    cache: SharedCache,
}

impl CacheWriter {
    pub fn new(cache: SharedCache) -> Self {
        Self { cache }
    }

    pub fn shared(cache: SharedCache) -> SharedEditSink {
        Rc::new(RefCell::new(Self::new(cache)))
    }
}

impl EditSink for CacheWriter {
    fn code_updated(&mut self, notice: EditNotice<'_>) {
        self.cache
            .borrow_mut()
            .set(notice.cache_key, notice.text, notice.updated_at);
    }
}

/// Auxiliary collaborator tracking whether leaving the page should prompt
/// the user. Cleared by the shell once a save completes or the prompt is
/// acknowledged.
#[derive(Debug, Default)]
pub struct LeaveConfirmation {
    dirty: bool,
}

impl LeaveConfirmation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> Rc<RefCell<Self>> {
        Rc::new(RefCell::new(Self::new()))
    }

    pub fn should_confirm_leave(&self) -> bool {
        self.dirty
    }

    pub fn reset(&mut self) {
        self.dirty = false;
    }
}

impl EditSink for LeaveConfirmation {
    fn code_updated(&mut self, _notice: EditNotice<'_>) {
        self.dirty = true;
    }
}

/// Cache key for the record's current identity.
pub fn cache_key(id: Option<&crate::record::SourceId>) -> String {
    match id {
        Some(id) => id.as_str().to_string(),
        None => UNSAVED_KEY.to_string(),
    }
}
