//! Failure explanations.
//!
//! Every way the run can end badly is turned into a [`Failure`]: one line
//! saying what happened and, when there is something the user can do about
//! it, the steps to take.

use std::{fmt, io};

use layer_login::InvocationError;

const APPS_URL: &str = "https://my.telegram.org/apps";

/// A human-readable failure with optional remediation steps.
#[derive(Clone, Debug, PartialEq)]
pub struct Failure {
    pub message: String,
    pub fix:     Option<String>,
}

impl Failure {
    pub fn new(message: impl Into<String>, fix: impl Into<String>) -> Self {
        Self { message: message.into(), fix: Some(fix.into()) }
    }

    pub fn bare(message: impl Into<String>) -> Self {
        Self { message: message.into(), fix: None }
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for Failure {}

impl From<io::Error> for Failure {
    fn from(e: io::Error) -> Self {
        Self::bare(format!("Could not read from the terminal.\n     Detail: {e}"))
    }
}

/// Which network step failed. The same error reads differently depending
/// on what the user was doing at the time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    Connect,
    RequestCode,
    Resend,
    ForceSms,
    SignIn,
    Password,
}

/// Minutes to tell the user to wait for a flood wait of `secs` seconds.
pub fn wait_minutes(secs: u64) -> u64 {
    secs / 60 + 1
}

fn detail(err: &InvocationError) -> String {
    format!("     Detail: {err}")
}

fn rpc_name(err: &InvocationError) -> &str {
    err.rpc().map(|e| e.name.as_str()).unwrap_or("")
}

/// Explain `err`, raised while doing `stage`.
pub fn remedy(stage: Stage, err: &InvocationError) -> Failure {
    match stage {
        Stage::Connect     => connect(err),
        Stage::RequestCode => request_code(err),
        Stage::Resend      => resend(err),
        Stage::ForceSms    => force_sms(err),
        Stage::SignIn      => sign_in(err),
        Stage::Password    => password(err),
    }
}

/// The number has no account and needs one created in an official app.
pub fn sign_up_required() -> Failure {
    Failure::new(
        "There is no Telegram account registered to this phone number.",
        "Install the Telegram app, create an account with this number, then re-run.",
    )
}

fn connect(err: &InvocationError) -> Failure {
    // initConnection already carries the api_id, so Telegram may refuse it here.
    if err.rpc().is_some() {
        return request_code(err);
    }
    Failure::new(
        format!("Could not connect to Telegram.\n{}", detail(err)),
        "Things to try:\n\
         \x20 • Check you have an internet connection\n\
         \x20 • If you use a VPN or proxy, try turning it off\n\
         \x20 • Wait a minute and try again",
    )
}

fn request_code(err: &InvocationError) -> Failure {
    if let Some(e) = err.rpc() {
        if e.is("FLOOD_PREMIUM_WAIT") {
            let secs = u64::from(e.value.unwrap_or(0));
            return Failure::new(
                format!("Telegram Premium flood wait: {secs}s."),
                format!("Wait {} minutes, then re-run.", wait_minutes(secs)),
            );
        }
    }
    if let Some(secs) = err.flood_wait_seconds() {
        let mins = wait_minutes(secs);
        return Failure::new(
            format!("Too many code requests. Telegram is blocking you for {secs}s ({mins} min)."),
            format!("Wait {mins} minutes, then re-run the script."),
        );
    }

    match rpc_name(err) {
        "PHONE_NUMBER_INVALID" => Failure::new(
            "Telegram says the phone number is invalid.",
            "Re-run and enter a valid number with the + and country code.\n\
             Example: +447712345678",
        ),
        "PHONE_NUMBER_BANNED" => Failure::new(
            "This phone number has been banned by Telegram.",
            "You'll need to use a different phone number.",
        ),
        "PHONE_NUMBER_UNOCCUPIED" => sign_up_required(),
        "PHONE_NUMBER_FLOOD" => Failure::new(
            "This phone number has been used too many times for code requests today.",
            "Wait 24 hours before trying again with this number.",
        ),
        "API_ID_INVALID" => Failure::new(
            "Your API ID or Hash was rejected by Telegram as invalid.",
            format!("Go back to {APPS_URL}, copy them again carefully, and re-run."),
        ),
        "API_ID_PUBLISHED_FLOOD" => Failure::new(
            "This API ID has been flagged by Telegram (too many users or publicly leaked).",
            format!("Create a new app at {APPS_URL} and use the new API ID and Hash."),
        ),
        "AUTH_RESTART" => Failure::new(
            "Telegram asked for an auth restart: the login state is broken.",
            "Re-run the script from scratch.",
        ),
        "NETWORK_MIGRATE" | "PHONE_MIGRATE" | "USER_MIGRATE" => Failure::new(
            format!(
                "Telegram redirected the request to a different data centre.\n{}",
                detail(err),
            ),
            "Re-run the script. The redirect is normally followed on the next attempt.",
        ),
        "AUTH_KEY_UNREGISTERED" | "AUTH_KEY_INVALID" => Failure::new(
            "The auth key is invalid or unregistered: the session is corrupt.",
            "Re-run the script. A fresh session will be created.",
        ),
        "SESSION_EXPIRED" => Failure::new(
            "The session has expired.",
            "Re-run the script. A fresh session will be created.",
        ),
        "SESSION_REVOKED" => Failure::new(
            "The session was revoked.",
            "Re-run the script. A fresh session will be created.",
        ),
        _ => Failure::new(
            format!("Unexpected error requesting the code.\n{}", detail(err)),
            "Check your API ID and Hash are correct, then re-run.",
        ),
    }
}

fn resend(err: &InvocationError) -> Failure {
    match err.flood_wait_seconds() {
        Some(secs) => Failure::new(
            format!("Telegram is rate-limiting resend. Wait {secs}s."),
            format!("Re-run the script in {} minutes.", wait_minutes(secs)),
        ),
        None => Failure::new(
            format!("Resend failed.\n{}", detail(err)),
            "Re-run the script and try again.",
        ),
    }
}

fn force_sms(err: &InvocationError) -> Failure {
    match err.flood_wait_seconds() {
        Some(secs) => Failure::new(
            format!("Rate limited. Wait {secs}s."),
            format!("Re-run the script in {} minutes.", wait_minutes(secs)),
        ),
        None => Failure::new(
            format!("Force SMS request failed.\n{}", detail(err)),
            "Telegram may not support SMS for this number.\n\
             Try logging into https://my.telegram.org in a browser to get a code there instead.",
        ),
    }
}

fn sign_in(err: &InvocationError) -> Failure {
    if let Some(secs) = err.flood_wait_seconds() {
        return Failure::new(
            format!("Rate limited. Telegram says wait {secs}s."),
            format!("Re-run the script in {} minutes.", wait_minutes(secs)),
        );
    }

    match rpc_name(err) {
        "PHONE_CODE_INVALID" => Failure::new(
            "That code is wrong.",
            "Re-run the script and type the code exactly: no spaces, no dots.",
        ),
        "PHONE_CODE_EXPIRED" => Failure::new(
            "That code has expired.",
            "Re-run the script and enter the code as soon as it arrives.",
        ),
        "PHONE_CODE_EMPTY" => Failure::new(
            "You submitted an empty code.",
            "Re-run and type the digits from your Telegram app.",
        ),
        "PHONE_CODE_HASH_EMPTY" => Failure::new(
            "Internal error: phone code hash is missing.",
            "Re-run the script from scratch.",
        ),
        "AUTH_RESTART" => Failure::new(
            "Telegram requested an auth restart during sign-in.",
            "Re-run the script from scratch.",
        ),
        name @ ("AUTH_KEY_UNREGISTERED" | "AUTH_KEY_INVALID") => Failure::new(
            format!("Auth key error during sign-in: {name}"),
            "Re-run the script. A new session will be created.",
        ),
        _ => Failure::new(
            format!("Sign-in failed.\n{}", detail(err)),
            "Re-run the script. If it keeps failing, double-check your API ID and Hash.",
        ),
    }
}

fn password(err: &InvocationError) -> Failure {
    if let Some(secs) = err.flood_wait_seconds() {
        return Failure::new(
            format!("Too many 2FA attempts. Wait {secs}s."),
            format!("Re-run the script in {} minutes.", wait_minutes(secs)),
        );
    }

    match rpc_name(err) {
        "PASSWORD_HASH_INVALID" => Failure::new(
            "Wrong 2FA password.",
            "Re-run and enter the correct password.\n\
             If you've forgotten it: Telegram → Settings → Privacy and Security → \
             Two-Step Verification → Forgot password",
        ),
        _ => Failure::new(
            format!("2FA sign-in failed.\n{}", detail(err)),
            "Check your password and try again.",
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use layer_login::RpcError;

    fn rpc(code: i32, msg: &str) -> InvocationError {
        InvocationError::Rpc(RpcError::from_telegram(code, msg))
    }

    #[test]
    fn connect_failures_suggest_network_checks() {
        let f = remedy(Stage::Connect, &InvocationError::Transport(-404));
        assert!(f.message.starts_with("Could not connect to Telegram."));
        assert!(f.message.contains("transport error -404"));
        assert!(f.fix.unwrap().contains("internet connection"));
    }

    #[test]
    fn rpc_errors_while_connecting_use_the_code_table() {
        let f = remedy(Stage::Connect, &rpc(400, "API_ID_INVALID"));
        assert_eq!(f.message, "Your API ID or Hash was rejected by Telegram as invalid.");
    }

    #[test]
    fn request_code_table() {
        let cases = [
            ("PHONE_NUMBER_INVALID",    "phone number is invalid"),
            ("PHONE_NUMBER_BANNED",     "banned by Telegram"),
            ("PHONE_NUMBER_UNOCCUPIED", "no Telegram account registered"),
            ("PHONE_NUMBER_FLOOD",      "too many times for code requests today"),
            ("API_ID_INVALID",          "rejected by Telegram as invalid"),
            ("API_ID_PUBLISHED_FLOOD",  "flagged by Telegram"),
            ("AUTH_RESTART",            "auth restart"),
            ("AUTH_KEY_UNREGISTERED",   "invalid or unregistered"),
            ("AUTH_KEY_INVALID",        "invalid or unregistered"),
            ("SESSION_EXPIRED",         "has expired"),
            ("SESSION_REVOKED",         "was revoked"),
        ];
        for (name, expect) in cases {
            let f = remedy(Stage::RequestCode, &rpc(400, name));
            assert!(f.message.contains(expect), "{name}: {}", f.message);
            assert!(f.fix.is_some(), "{name} has no fix");
        }
    }

    #[test]
    fn migrate_errors_mention_data_centre() {
        let f = remedy(Stage::RequestCode, &rpc(303, "PHONE_MIGRATE_5"));
        assert!(f.message.contains("different data centre"));
        assert!(f.message.contains("PHONE_MIGRATE"));
    }

    #[test]
    fn flood_wait_reports_seconds_and_minutes() {
        let f = remedy(Stage::RequestCode, &rpc(420, "FLOOD_WAIT_125"));
        assert_eq!(
            f.message,
            "Too many code requests. Telegram is blocking you for 125s (3 min).",
        );
        assert_eq!(f.fix.as_deref(), Some("Wait 3 minutes, then re-run the script."));

        let f = remedy(Stage::RequestCode, &rpc(420, "FLOOD_PREMIUM_WAIT_30"));
        assert_eq!(f.message, "Telegram Premium flood wait: 30s.");
        assert_eq!(f.fix.as_deref(), Some("Wait 1 minutes, then re-run."));
    }

    #[test]
    fn flood_wait_per_stage() {
        let e = rpc(420, "FLOOD_WAIT_60");
        assert_eq!(remedy(Stage::Resend, &e).message, "Telegram is rate-limiting resend. Wait 60s.");
        assert_eq!(remedy(Stage::ForceSms, &e).message, "Rate limited. Wait 60s.");
        assert_eq!(remedy(Stage::SignIn, &e).message, "Rate limited. Telegram says wait 60s.");
        assert_eq!(remedy(Stage::Password, &e).message, "Too many 2FA attempts. Wait 60s.");
        assert_eq!(
            remedy(Stage::Password, &e).fix.as_deref(),
            Some("Re-run the script in 2 minutes."),
        );
    }

    #[test]
    fn sign_in_code_errors() {
        assert_eq!(remedy(Stage::SignIn, &rpc(400, "PHONE_CODE_INVALID")).message, "That code is wrong.");
        assert_eq!(remedy(Stage::SignIn, &rpc(400, "PHONE_CODE_EXPIRED")).message, "That code has expired.");
        assert_eq!(remedy(Stage::SignIn, &rpc(400, "PHONE_CODE_EMPTY")).message, "You submitted an empty code.");
        assert!(remedy(Stage::SignIn, &rpc(400, "PHONE_CODE_HASH_EMPTY")).message.contains("hash is missing"));
        assert_eq!(
            remedy(Stage::SignIn, &rpc(401, "AUTH_KEY_UNREGISTERED")).message,
            "Auth key error during sign-in: AUTH_KEY_UNREGISTERED",
        );
    }

    #[test]
    fn wrong_password_points_at_recovery() {
        let f = remedy(Stage::Password, &rpc(400, "PASSWORD_HASH_INVALID"));
        assert_eq!(f.message, "Wrong 2FA password.");
        assert!(f.fix.unwrap().contains("Forgot password"));
    }

    #[test]
    fn unknown_errors_carry_detail() {
        let e = rpc(500, "INTERNAL_SERVER_ERROR");
        let f = remedy(Stage::RequestCode, &e);
        assert!(f.message.starts_with("Unexpected error requesting the code."));
        assert!(f.message.contains("INTERNAL_SERVER_ERROR"));

        assert!(remedy(Stage::Resend, &e).message.starts_with("Resend failed."));
        assert!(remedy(Stage::ForceSms, &e).message.starts_with("Force SMS request failed."));
        assert!(remedy(Stage::SignIn, &e).message.starts_with("Sign-in failed."));
        assert!(remedy(Stage::Password, &e).message.starts_with("2FA sign-in failed."));
    }

    #[test]
    fn wait_minutes_rounds_up_past_the_minute() {
        assert_eq!(wait_minutes(0), 1);
        assert_eq!(wait_minutes(59), 1);
        assert_eq!(wait_minutes(60), 2);
    }
}
