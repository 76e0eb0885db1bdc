//! Course Team page operations: sign-in, readiness, and the four roster
//! gestures, each confirmed by polling the DOM rather than trusting the click.
//!
//! Every selector this tool knows about lives in [`sel`]. History says this
//! is the part that gets rewritten whenever edX ships a Studio redesign, so
//! nothing outside this module mentions the page's markup.

use std::time::Instant;

use chromiumoxide::Page;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::browser::{self, PageError};
use crate::config::Config;
use crate::credentials::Credentials;
use crate::retry::{self, RetryPolicy};

/// Selectors for the sign-in page and the Course Team page.
pub mod sel {
    pub const USERNAME_INPUT: &str = "#emailOrUsername";
    pub const PASSWORD_INPUT: &str = "#password";
    pub const LOGIN_BUTTON: &str = ".login-button-width";
    pub const DASHBOARD_COURSES: &str = "#my-courses";

    pub const NEW_MEMBER_BUTTON: &str = "a.create-user-button";
    pub const NEW_MEMBER_EMAIL_INPUT: &str = "input#user-email-input";
    pub const ADD_MEMBER_CONFIRM: &str = "div.actions button.action-primary";
    pub const UNKNOWN_EMAIL_DISMISS: &str = "#prompt-error.is-shown button.action-primary";
    pub const REMOVE_CONFIRM: &str = "#prompt-warning.is-shown button.action-primary";

    /// The roster entry for one member. `data-email` values are lowercase
    /// on the page regardless of how the spreadsheet spells them.
    pub fn member_li(email: &str) -> String {
        format!("li[data-email='{}']", email.to_lowercase())
    }

    pub fn remove_link(email: &str) -> String {
        format!("{} a.remove-user", member_li(email))
    }

    pub fn promote_link(email: &str) -> String {
        format!(
            "{} a.make-instructor.admin-role.add-admin-role",
            member_li(email)
        )
    }

    pub fn demote_link(email: &str) -> String {
        format!(
            "{} a.make-staff.admin-role.remove-admin-role",
            member_li(email)
        )
    }
}

/// How one roster gesture for one address ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpOutcome {
    /// The page confirmed the change.
    Applied,
    /// Nothing to do: the page was already in the requested state.
    AlreadySatisfied,
    /// edX has no account for the address; the error dialog was dismissed.
    UnknownAddress,
    /// Role change requested for someone who is not on the team.
    NotMember,
}

/// One scraped team member.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Member {
    pub email: String,
    pub admin: bool,
}

const LIST_MEMBERS_JS: &str = r#"
    Array.from(document.querySelectorAll('li[data-email]')).map(li => ({
        email: li.getAttribute('data-email') || '',
        admin: !!li.querySelector('a.remove-admin-role')
    }))
"#;

/// Driver for one signed-in browser page working through course team pages.
pub struct TeamPage<'a> {
    page: &'a Page,
    page_timeout: std::time::Duration,
    gesture_timeout: std::time::Duration,
    policy: RetryPolicy,
}

impl<'a> TeamPage<'a> {
    pub fn new(page: &'a Page, config: &Config) -> Self {
        Self {
            page,
            page_timeout: config.page_timeout(),
            gesture_timeout: config.gesture_timeout(),
            policy: RetryPolicy::from_config(&config.retry),
        }
    }

    async fn goto(&self, url: &str) -> Result<(), PageError> {
        self.page
            .goto(url)
            .await
            .map(|_| ())
            .map_err(|e| PageError::Transport(e.to_string()))
    }

    async fn click(&self, selector: &str) -> Result<(), PageError> {
        let element = browser::wait_for(self.page, selector, self.gesture_timeout).await?;
        element
            .click()
            .await
            .map(|_| ())
            .map_err(|e| PageError::rejected("click", selector, e))
    }

    async fn type_into(&self, selector: &str, text: &str) -> Result<(), PageError> {
        let element = browser::wait_for(self.page, selector, self.gesture_timeout).await?;
        element
            .click()
            .await
            .map_err(|e| PageError::rejected("focus", selector, e))?;
        element
            .type_str(text)
            .await
            .map(|_| ())
            .map_err(|e| PageError::rejected("type", selector, e))
    }

    // ── Sign-in ─────────────────────────────────────────────────────────────

    /// Sign in once for the whole run. Terminal on failure: nothing
    /// downstream works unauthenticated.
    pub async fn sign_in(&self, login_url: &str, creds: &Credentials) -> Result<(), PageError> {
        debug!(login_url, "opening sign-in page");
        self.goto(login_url).await?;

        self.type_into(sel::USERNAME_INPUT, &creds.username).await?;
        self.type_into(sel::PASSWORD_INPUT, &creds.password).await?;
        self.click(sel::LOGIN_BUTTON).await?;

        // The dashboard's course list is the strong signal; the title is the
        // fallback for layouts that render it late.
        if browser::wait_for(self.page, sel::DASHBOARD_COURSES, self.page_timeout)
            .await
            .is_ok()
        {
            return Ok(());
        }

        let title = browser::title(self.page).await;
        if title.contains("Dashboard") {
            return Ok(());
        }
        if title.contains("Forbidden") {
            return Err(PageError::SignIn("403 Forbidden".to_string()));
        }
        if title.contains("Login") || title.contains("Sign in") {
            return Err(PageError::SignIn(
                "still on the login page; wrong credentials or a timeout".to_string(),
            ));
        }
        Err(PageError::SignIn(format!(
            "unexpected page after sign-in (title {title:?})"
        )))
    }

    // ── Course pages ────────────────────────────────────────────────────────

    /// Open a course's team page and wait for it to be operable: the
    /// add-member control exists and no stale add form is showing.
    pub async fn open_course(&self, url: &str) -> Result<(), PageError> {
        self.goto(url).await?;

        let ready = self.wait_until_operable().await;
        if ready.is_ok() {
            return Ok(());
        }

        // Decode the usual failure modes for the log before giving up.
        let title = browser::title(self.page).await;
        if title.contains("Forbidden") {
            return Err(PageError::Forbidden);
        }
        if title.contains("Dashboard") {
            // Bounced back to the dashboard: bad URL or no role in the course.
            return Err(PageError::NotReady {
                waited_secs: self.page_timeout.as_secs(),
            });
        }
        ready
    }

    async fn wait_until_operable(&self) -> Result<(), PageError> {
        browser::wait_for(self.page, sel::NEW_MEMBER_BUTTON, self.page_timeout).await?;
        browser::wait_for_hidden(self.page, sel::NEW_MEMBER_EMAIL_INPUT, self.page_timeout)
            .await
            .map_err(|_| PageError::NotReady {
                waited_secs: self.page_timeout.as_secs(),
            })
    }

    /// Whether `email` currently appears on the course team.
    pub async fn is_member(&self, email: &str) -> bool {
        browser::is_present(self.page, &sel::member_li(email)).await
    }

    // ── Roster operations ───────────────────────────────────────────────────

    /// Add `email` to the course team.
    pub async fn add_member(&self, email: &str) -> Result<OpOutcome, PageError> {
        if self.is_member(email).await {
            info!(email, "already on the course team");
            return Ok(OpOutcome::AlreadySatisfied);
        }

        retry::retry_with_backoff(
            &self.policy,
            |_attempt| self.try_add_once(email),
            retry::classify_page_result,
            |info| {
                warn!(
                    email,
                    attempt = info.attempt,
                    reason = info.reason.as_str(),
                    delay_ms = info.delay.as_millis() as u64,
                    "add did not stick, retrying"
                );
            },
        )
        .await
    }

    async fn try_add_once(&self, email: &str) -> Result<OpOutcome, PageError> {
        // A leftover error dialog blocks every control on the page.
        if browser::is_present(self.page, sel::UNKNOWN_EMAIL_DISMISS).await {
            return self.dismiss_unknown_address(email).await;
        }

        self.click(sel::NEW_MEMBER_BUTTON).await?;
        self.type_into(sel::NEW_MEMBER_EMAIL_INPUT, email).await?;
        self.click(sel::ADD_MEMBER_CONFIRM).await?;

        // Either the member row shows up or the unknown-address dialog does.
        let start = Instant::now();
        let mut interval = std::time::Duration::from_millis(100);
        while start.elapsed() < self.gesture_timeout {
            if self.is_member(email).await {
                return Ok(OpOutcome::Applied);
            }
            if browser::is_present(self.page, sel::UNKNOWN_EMAIL_DISMISS).await {
                return self.dismiss_unknown_address(email).await;
            }
            tokio::time::sleep(interval).await;
            interval = (interval * 2).min(std::time::Duration::from_millis(500));
        }
        Err(PageError::Unconfirmed(format!(
            "{email} shows up on the team"
        )))
    }

    async fn dismiss_unknown_address(&self, email: &str) -> Result<OpOutcome, PageError> {
        warn!(email, "edX has no account for this address");
        self.click(sel::UNKNOWN_EMAIL_DISMISS).await?;
        browser::wait_for_hidden(self.page, sel::UNKNOWN_EMAIL_DISMISS, self.gesture_timeout)
            .await?;
        Ok(OpOutcome::UnknownAddress)
    }

    /// Promote `email` to Admin.
    pub async fn promote_member(&self, email: &str) -> Result<OpOutcome, PageError> {
        self.change_role(email, true).await
    }

    /// Demote `email` back to Staff.
    pub async fn demote_member(&self, email: &str) -> Result<OpOutcome, PageError> {
        self.change_role(email, false).await
    }

    async fn change_role(&self, email: &str, promote: bool) -> Result<OpOutcome, PageError> {
        let op = if promote { "promote" } else { "demote" };
        if !self.is_member(email).await {
            warn!(email, op, "not on the course team");
            return Ok(OpOutcome::NotMember);
        }

        retry::retry_with_backoff(
            &self.policy,
            |_attempt| self.try_role_change_once(email, promote),
            retry::classify_page_result,
            |info| {
                warn!(
                    email,
                    op,
                    attempt = info.attempt,
                    reason = info.reason.as_str(),
                    delay_ms = info.delay.as_millis() as u64,
                    "role change did not stick, retrying"
                );
            },
        )
        .await
    }

    async fn try_role_change_once(
        &self,
        email: &str,
        promote: bool,
    ) -> Result<OpOutcome, PageError> {
        let (link, opposite) = if promote {
            (sel::promote_link(email), sel::demote_link(email))
        } else {
            (sel::demote_link(email), sel::promote_link(email))
        };

        // Role links come in opposite pairs; only the reverse link being
        // present means the member already holds the requested role.
        if !browser::is_present(self.page, &link).await
            && browser::is_present(self.page, &opposite).await
        {
            return Ok(OpOutcome::AlreadySatisfied);
        }

        self.click(&link).await?;

        // There is no confirm dialog for role changes; the row re-renders
        // with the reverse link once the change lands.
        browser::wait_for(self.page, &opposite, self.gesture_timeout)
            .await
            .map_err(|_| PageError::Unconfirmed(format!("{email} changed role")))?;
        Ok(OpOutcome::Applied)
    }

    /// Remove `email` from the course team.
    pub async fn remove_member(&self, email: &str) -> Result<OpOutcome, PageError> {
        if !self.is_member(email).await {
            info!(email, "was already not in this course");
            return Ok(OpOutcome::AlreadySatisfied);
        }

        retry::retry_with_backoff(
            &self.policy,
            |_attempt| self.try_remove_once(email),
            retry::classify_page_result,
            |info| {
                warn!(
                    email,
                    attempt = info.attempt,
                    reason = info.reason.as_str(),
                    delay_ms = info.delay.as_millis() as u64,
                    "removal did not stick, retrying"
                );
            },
        )
        .await
    }

    async fn try_remove_once(&self, email: &str) -> Result<OpOutcome, PageError> {
        self.click(&sel::remove_link(email)).await?;
        self.click(sel::REMOVE_CONFIRM).await?;
        browser::wait_for_gone(self.page, &sel::member_li(email), self.gesture_timeout).await?;
        Ok(OpOutcome::Applied)
    }

    /// Scrape the current team: every member's address and whether they
    /// hold Admin.
    pub async fn list_members(&self) -> Result<Vec<Member>, PageError> {
        self.page
            .evaluate(LIST_MEMBERS_JS)
            .await
            .map_err(|e| PageError::Transport(e.to_string()))?
            .into_value::<Vec<Member>>()
            .map_err(|e| PageError::Transport(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn member_selectors_lowercase_the_address() {
        assert_eq!(
            sel::member_li("Jane.Doe@X.EDU"),
            "li[data-email='jane.doe@x.edu']"
        );
        assert!(sel::remove_link("A@B.C").starts_with("li[data-email='a@b.c']"));
    }

    #[test]
    fn role_links_point_in_opposite_directions() {
        let promote = sel::promote_link("a@b.c");
        let demote = sel::demote_link("a@b.c");
        assert!(promote.contains("add-admin-role"));
        assert!(demote.contains("remove-admin-role"));
        assert_ne!(promote, demote);
    }

    #[test]
    fn member_scrape_script_reads_the_roster_list() {
        assert!(LIST_MEMBERS_JS.contains("li[data-email]"));
        assert!(LIST_MEMBERS_JS.contains("remove-admin-role"));
    }
}
