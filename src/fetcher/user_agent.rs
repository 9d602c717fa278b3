//! User-Agent selection.
//!
//! Resource downloads identify as docsweep unless configured otherwise.
//! Search engines get a desktop Chrome agent, since they serve a different
//! (or no) result page to unknown clients.

/// Default agent for resource downloads.
pub const USER_AGENT: &str = concat!("docsweep/", env!("CARGO_PKG_VERSION"));

/// Desktop Chrome agent used towards search engines.
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

/// Setting value that selects [`BROWSER_USER_AGENT`].
const BROWSER_SETTING: &str = "browser";

/// Agent for a `user_agent` setting: unset or blank gives [`USER_AGENT`],
/// `"browser"` gives [`BROWSER_USER_AGENT`], anything else is sent as is.
pub fn resolve_user_agent(setting: Option<&str>) -> &str {
    match setting.map(str::trim) {
        None | Some("") => USER_AGENT,
        Some(value) if value.eq_ignore_ascii_case(BROWSER_SETTING) => BROWSER_USER_AGENT,
        Some(value) => value,
    }
}
