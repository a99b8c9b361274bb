//! The interactive login walk-through.

use crossterm::style::Stylize;
use layer_login::{Client, Config, LoginToken, SignInError, Socks5Config, StringSession, dc};

use crate::Args;
use crate::console::{self, Console};
use crate::credentials::{parse_api_hash, parse_api_id, parse_phone};
use crate::delivery;
use crate::remedy::{Failure, Stage, remedy, sign_up_required};

/// What a successful run hands to the result screen.
pub struct Outcome {
    pub api_id:   i32,
    pub api_hash: String,
    pub session:  StringSession,
}

/// Walk the user from credentials to a session string.
pub async fn run(args: &Args, out: &Console) -> Result<Outcome, Failure> {
    out.banner();
    check_client(out);
    let (api_id, api_hash) = credentials(args, out).await?;
    let phone = phone(args, out).await?;

    out.step(3, "Generating your session string");
    let config = client_config(args, api_id, &api_hash)?;
    log::debug!("connect: dc={:?} socks5={} ipv6={}", config.dc_addr, config.socks5.is_some(), config.allow_ipv6);

    out.info("Connecting to Telegram …");
    let client = Client::connect(config)
        .await
        .map_err(|e| remedy(Stage::Connect, &e))?;
    out.ok(format!("Connected to Telegram (DC{})", client.home_dc().await));

    let result = login(&client, &phone, out).await;
    client.disconnect().await;
    let session = result?;

    Ok(Outcome { api_id, api_hash, session })
}

// ─── Step 0 ───────────────────────────────────────────────────────────────────

fn check_client(out: &Console) {
    out.step(0, "Checking the login client");
    out.ok(format!(
        "layer-login {} (Telegram API layer {})",
        env!("CARGO_PKG_VERSION"),
        layer_login::LAYER,
    ));
    if console::interactive() {
        out.ok("Interactive terminal detected");
    } else {
        out.warn("stdin is not a terminal: the 2FA password will be read as plain text");
    }
}

// ─── Step 1 ───────────────────────────────────────────────────────────────────

async fn credentials(args: &Args, out: &Console) -> Result<(i32, String), Failure> {
    out.step(1, "API Credentials");

    if args.api_id.is_none() || args.api_hash.is_none() {
        println!();
        println!("  {}", "You need your Telegram API ID and Hash.".white().bold());
        println!("  {}", "These are free and tied to your Telegram account. They are not a bot token.".dim());
        println!();
        println!("  How to get them ({}):", "takes about 2 minutes".yellow().bold());
        println!();
        println!("    1. Open  {}  in your browser", "https://my.telegram.org/apps".yellow().bold());
        println!("    2. Log in with your phone number (Telegram sends you a code)");
        println!("    3. If you see \"Create application\", click it and fill in anything");
        println!("    4. You'll see {} (a short number) and {} (a long code)",
            "App api_id".yellow().bold(), "App api_hash".yellow().bold());
        println!("    5. Copy both, come back here, and paste them below");
        println!();
        out.pause("Press Enter when you have them ready…").await?;
    }

    let raw_id = match &args.api_id {
        Some(v) => v.clone(),
        None    => out.prompt("App api_id   (numbers only):").await?,
    };
    let raw_hash = match &args.api_hash {
        Some(v) => v.clone(),
        None    => out.prompt("App api_hash (32 characters):").await?,
    };

    let (api_id, api_hash) = check_credentials(&raw_id, &raw_hash)?;

    out.ok(format!("API ID:    {api_id}"));
    out.ok(format!("API Hash:  {api_hash}"));
    Ok((api_id, api_hash))
}

/// Typed and prefilled values go through the same checks.
fn check_credentials(raw_id: &str, raw_hash: &str) -> Result<(i32, String), Failure> {
    Ok((parse_api_id(raw_id)?, parse_api_hash(raw_hash)?))
}

// ─── Step 2 ───────────────────────────────────────────────────────────────────

async fn phone(args: &Args, out: &Console) -> Result<String, Failure> {
    out.step(2, "Your phone number");
    out.info("Must include your country code");
    out.info("UK example:  +447712345678    US example:  +12025550123");

    let raw = match &args.phone {
        Some(p) => p.clone(),
        None    => {
            println!();
            out.prompt("Phone number:").await?
        }
    };
    parse_phone(&raw)
}

// ─── Step 3 ───────────────────────────────────────────────────────────────────

fn client_config(args: &Args, api_id: i32, api_hash: &str) -> Result<Config, Failure> {
    let dc_addr = match args.dc {
        None     => None,
        Some(id) => {
            let addr = dc::default_dc_addresses().remove(&id).ok_or_else(|| Failure::new(
                format!("There is no data centre {id}."),
                "Telegram's data centres are numbered 1 to 5. Leave --dc out to use the default.",
            ))?;
            Some((id, addr))
        }
    };

    let socks5 = args.socks5.as_ref().map(|proxy| match (&args.socks5_user, &args.socks5_pass) {
        (Some(user), Some(pass)) => Socks5Config::with_auth(proxy.clone(), user.clone(), pass.clone()),
        _                        => Socks5Config::new(proxy.clone()),
    });

    Ok(Config {
        api_id,
        api_hash: api_hash.to_string(),
        dc_addr,
        socks5,
        allow_ipv6: args.ipv6,
        ..Config::default()
    })
}

async fn login(client: &Client, phone: &str, out: &Console) -> Result<StringSession, Failure> {
    out.info(format!("Requesting sign-in code for {phone} …"));
    let mut token = client
        .request_login_code(phone)
        .await
        .map_err(|e| remedy(Stage::RequestCode, &e))?;
    log::debug!("code requested on DC{}", client.home_dc().await);

    dump(&token);
    println!("  {}\n", "Where your code was sent:".white().bold());
    println!("     {}\n", delivery::describe(token.delivery(), phone));

    match token.timeout() {
        Some(secs) if secs > 0 => out.warn(format!(
            "Code expires in {}. Enter it quickly!",
            delivery::expiry_text(secs, chrono::Local::now()),
        )),
        _ => out.warn("Enter the code quickly. Codes expire after a few minutes."),
    }

    println!();
    match token.next_delivery() {
        Some(next) => out.note(format!(
            "If it doesn't arrive, you can request a resend via: {}",
            delivery::next_label(next),
        )),
        None => out.note("No alternative delivery method available for this number."),
    }

    println!();
    println!("    {}  I have the code. Let me enter it now", "[1]".green().bold());
    println!("    {}  It didn't arrive. Resend via a different method", "[2]".green().bold());
    println!("    {}  {}: skip app delivery, send the code as a text message instead",
        "[3]".green().bold(), "Force SMS".yellow().bold());
    println!();

    let input = out.prompt("Enter 1, 2 or 3 (default 1):").await?;
    match choose(&input, token.next_delivery().is_some()) {
        Choice::Enter    => {}
        Choice::Resend   => token = resend(client, &token, phone, out).await?,
        Choice::ForceSms => token = force_sms(client, phone, out).await?,
        Choice::NoResend => {
            println!();
            out.warn("No standard resend available. Try option 3 to force SMS instead.");
        }
    }

    println!();
    let code = out.prompt("Enter the code:").await?;

    match client.sign_in(&token, &code).await {
        Ok(name) => log::info!("signed in as {name}"),
        Err(SignInError::PasswordRequired(pw_token)) => {
            println!();
            out.ok("This account has Two-Factor Authentication (2FA) enabled.");
            out.info("Enter the cloud password you set in Telegram → Settings → Privacy → Two-Step Verification.");
            if let Some(hint) = pw_token.hint() {
                out.info(format!("Password hint: {hint}"));
            }
            if pw_token.has_recovery() {
                out.info("A recovery email is set, so the password can be reset from an official app.");
            }
            println!();
            let password = out.secret("2FA password:").await?;
            client
                .check_password(pw_token, password.as_bytes())
                .await
                .map_err(|e| remedy(Stage::Password, &e))?;
            out.ok("2FA verified");
        }
        Err(SignInError::SignUpRequired) => return Err(sign_up_required()),
        Err(SignInError::InvalidCode(e)) => return Err(remedy(Stage::SignIn, &e.into())),
        Err(SignInError::Other(e)) => return Err(remedy(Stage::SignIn, &e)),
    }

    out.ok("Signed in successfully!");
    client
        .export_session()
        .await
        .map_err(|e| Failure::bare(format!("Could not export the session.\n     Detail: {e}")))
}

/// What the user picked from the delivery menu.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Choice {
    Enter,
    Resend,
    ForceSms,
    /// Asked for a resend Telegram does not offer; the current code stands.
    NoResend,
}

fn choose(input: &str, has_next: bool) -> Choice {
    match input.trim() {
        "2" if has_next => Choice::Resend,
        "2"             => Choice::NoResend,
        "3"             => Choice::ForceSms,
        _               => Choice::Enter,
    }
}

async fn resend(client: &Client, token: &LoginToken, phone: &str, out: &Console) -> Result<LoginToken, Failure> {
    out.info("Requesting resend …");
    let token = client
        .resend_code(token)
        .await
        .map_err(|e| remedy(Stage::Resend, &e))?;
    println!();
    out.ok(format!("Code resent.  New method: {}", token.delivery().name()));
    println!("\n     {}\n", delivery::describe(token.delivery(), phone));
    dump(&token);
    Ok(token)
}

async fn force_sms(client: &Client, phone: &str, out: &Console) -> Result<LoginToken, Failure> {
    out.info("Requesting code via forced SMS (bypassing app notification) …");
    let token = client
        .request_sms_code(phone)
        .await
        .map_err(|e| remedy(Stage::ForceSms, &e))?;
    println!();
    out.ok(format!("Request sent.  Delivery method: {}", token.delivery().name()));
    println!("\n     {}\n", delivery::describe(token.delivery(), phone));
    dump(&token);
    Ok(token)
}

/// Print every field Telegram returned with the code.
fn dump(token: &LoginToken) {
    println!("\n  {}", "── Telegram response (full debug dump) ──────────────────".cyan().bold());
    let rows = delivery::dump_rows(
        token.phone_code_hash(),
        token.timeout(),
        token.delivery(),
        token.next_delivery(),
    );
    for (label, value) in rows {
        println!("  {}  {value}", format!("{label:<20}:").dim());
    }
    println!("  {}\n", "─────────────────────────────────────────────────────────".cyan().bold());
}

// ─── Result ───────────────────────────────────────────────────────────────────

pub fn print_result(out: &Console, outcome: &Outcome) {
    out.clear();
    let rule = "════════════════════════════════════════════════════════════════════════════";
    println!();
    println!("{}", "╔══════════════════════════════════════════════════════════════════════════╗".green().bold());
    println!("{}", "║                     ALL DONE: copy these somewhere safe                  ║".green().bold());
    println!("{}", "╚══════════════════════════════════════════════════════════════════════════╝".green().bold());
    println!();
    println!("  {}", "API ID".yellow().bold());
    println!("  {}", outcome.api_id.to_string().white().bold());
    println!();
    println!("  {}", "API Hash".yellow().bold());
    println!("  {}", outcome.api_hash.as_str().white().bold());
    println!();
    println!("  {}", "Session String  ← copy this entire line, it may be very long".yellow().bold());
    println!("  {}", outcome.session.encode().green().bold());
    println!();
    println!("{}", "  ▲  Keep these private. They give full access to your Telegram account.".red().bold());
    println!("{}", "  ▲  Do not share them in a chat, email, or document others can see.".red().bold());
    println!();
    println!("{}", rule.green().bold());
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    const HASH: &str = "0123456789abcdef0123456789abcdef";

    fn args(extra: &[&str]) -> Args {
        let mut argv = vec!["layer-session"];
        argv.extend_from_slice(extra);
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn unknown_dc_is_refused() {
        let Err(f) = client_config(&args(&["--dc", "9"]), 1, HASH) else {
            panic!("dc 9 accepted");
        };
        assert_eq!(f.message, "There is no data centre 9.");
        assert!(f.fix.unwrap().contains("1 to 5"));
    }

    #[test]
    fn known_dc_uses_its_address() {
        let cfg = client_config(&args(&["--dc", "4"]), 1, HASH).ok().unwrap();
        assert_eq!(cfg.dc_addr, Some((4, "149.154.167.91:443".to_string())));
        assert_eq!(cfg.api_hash, HASH);

        let cfg = client_config(&args(&[]), 1, HASH).ok().unwrap();
        assert_eq!(cfg.dc_addr, None);
    }

    #[test]
    fn socks5_credentials_need_both_halves() {
        let cfg = client_config(
            &args(&["--socks5", "127.0.0.1:1080", "--socks5-user", "u", "--socks5-pass", "p"]),
            1,
            HASH,
        )
        .ok()
        .unwrap();
        let proxy = cfg.socks5.unwrap();
        assert_eq!(proxy.proxy_addr, "127.0.0.1:1080");
        assert_eq!(proxy.auth, Some(("u".to_string(), "p".to_string())));

        let cfg = client_config(&args(&["--socks5", "127.0.0.1:1080"]), 1, HASH).ok().unwrap();
        assert_eq!(cfg.socks5.unwrap().auth, None);

        let cfg = client_config(
            &args(&["--socks5", "127.0.0.1:1080", "--socks5-user", "u"]),
            1,
            HASH,
        )
        .ok()
        .unwrap();
        assert_eq!(cfg.socks5.unwrap().auth, None);
    }

    #[test]
    fn socks5_user_without_proxy_is_a_usage_error() {
        assert!(Args::try_parse_from(["layer-session", "--socks5-user", "u"]).is_err());
        assert!(Args::try_parse_from(["layer-session", "--socks5", "h:1", "--socks5-pass", "p"]).is_err());
    }

    #[test]
    fn prefilled_api_id_is_validated() {
        let a = args(&["--api-id", "12a", "--api-hash", HASH]);
        let err = check_credentials(a.api_id.as_deref().unwrap(), a.api_hash.as_deref().unwrap())
            .unwrap_err();
        assert_eq!(err.message, "API ID should be all numbers. You entered: '12a'");

        let a = args(&["--api-id", " 12345 ", "--api-hash", HASH]);
        let ok = check_credentials(a.api_id.as_deref().unwrap(), a.api_hash.as_deref().unwrap());
        assert_eq!(ok.unwrap(), (12345, HASH.to_string()));
    }

    #[test]
    fn menu_choices() {
        assert_eq!(choose("", true), Choice::Enter);
        assert_eq!(choose("1", false), Choice::Enter);
        assert_eq!(choose("x", true), Choice::Enter);
        assert_eq!(choose("2", true), Choice::Resend);
        assert_eq!(choose(" 2 ", true), Choice::Resend);
        assert_eq!(choose("3", false), Choice::ForceSms);
    }

    #[test]
    fn resend_without_next_type_keeps_current_code() {
        assert_eq!(choose("2", false), Choice::NoResend);
    }
}
