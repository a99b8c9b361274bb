//! "Where did my code go?"
//!
//! Turns the delivery information in a [`LoginToken`](layer_login::LoginToken) into text a person
//! can act on.

use std::fmt;

use chrono::{DateTime, Duration, TimeZone};
use crossterm::style::Stylize;
use layer_login::{CodeDelivery, NextDelivery};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Shade {
    Bright,
    Dim,
    Plain,
}

/// Headline plus follow-up lines describing one delivery method.
#[derive(Clone, Debug, PartialEq)]
pub struct Description {
    /// The method needs the user to act before a code can arrive.
    pub attention: bool,
    pub title:     String,
    /// Text after the title on the same line (recipient, code length).
    pub detail:    String,
    pub notes:     Vec<(Shade, String)>,
}

impl Description {
    fn new(title: impl Into<String>, detail: impl Into<String>) -> Self {
        Self { attention: false, title: title.into(), detail: detail.into(), notes: Vec::new() }
    }

    fn note(mut self, shade: Shade, text: impl Into<String>) -> Self {
        self.notes.push((shade, text.into()));
        self
    }

    fn attention(mut self) -> Self {
        self.attention = true;
        self
    }
}

impl fmt::Display for Description {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.attention {
            write!(f, "{}", self.title.as_str().yellow().bold())?;
        } else {
            write!(f, "{}", self.title.as_str().green().bold())?;
        }
        if !self.detail.is_empty() {
            write!(f, "  {}", self.detail)?;
        }
        for (shade, text) in &self.notes {
            match shade {
                Shade::Bright => write!(f, "\n     {}", text.as_str().white().bold())?,
                Shade::Dim    => write!(f, "\n     {}", text.as_str().dim())?,
                Shade::Plain  => write!(f, "\n     {text}")?,
            }
        }
        Ok(())
    }
}

fn digits(length: i32) -> String {
    format!("(code is {length} digits)")
}

/// Describe where a code sent via `delivery` will show up for `phone`.
pub fn describe(delivery: &CodeDelivery, phone: &str) -> Description {
    match delivery {
        CodeDelivery::App { length } => {
            Description::new("Telegram APP notification", digits(*length))
                .note(Shade::Bright, "Look for a message from the official 'Telegram' account inside the app")
                .note(Shade::Dim, "This goes to every device where you're logged into Telegram: phone, tablet, desktop, web.")
                .note(Shade::Dim, "It does NOT come as an SMS.")
        }
        CodeDelivery::Sms { length } => {
            Description::new("SMS text message", format!("to {phone}  {}", digits(*length)))
                .note(Shade::Dim, "Check your phone's messages app.")
        }
        CodeDelivery::Call { length } => {
            Description::new("Voice call", format!("to {phone}  {}", digits(*length)))
                .note(Shade::Dim, "Answer the call. A robot will read the digits aloud.")
        }
        CodeDelivery::FlashCall { pattern } => {
            Description::new("Flash call", format!("to {phone}  (pattern: {pattern})"))
                .note(Shade::Dim, "Telegram calls your number briefly. You don't need to answer.")
                .note(Shade::Dim, "The code is derived from the calling number pattern.")
        }
        CodeDelivery::MissedCall { prefix, length } => {
            let d = Description::new("Missed call", format!("to {phone}"))
                .note(Shade::Dim, format!(
                    "Telegram will ring and hang up. The last {length} digits of the calling number are your code.",
                ));
            if prefix.is_empty() {
                d
            } else {
                d.note(Shade::Dim, format!("The calling number starts with {prefix}."))
            }
        }
        CodeDelivery::EmailCode { email_pattern, length } => {
            Description::new("Email code", format!("to {email_pattern}  {}", digits(*length)))
                .note(Shade::Dim, "Check your inbox (and spam folder).")
        }
        CodeDelivery::SetUpEmailRequired => {
            Description::new("Email setup required", "")
                .attention()
                .note(Shade::Dim, "Telegram wants you to add an email address before it will send codes.")
                .note(Shade::Plain, "Open Telegram → Settings → Privacy and Security → Email and add one.")
        }
        CodeDelivery::FragmentSms { url, length } => {
            Description::new("Fragment SMS", digits(*length))
                .note(Shade::Dim, format!("This number is anonymous. The code appears at: {url}"))
        }
        CodeDelivery::FirebaseSms { length } => {
            Description::new("Firebase SMS", format!("to {phone}  {}", digits(*length)))
                .note(Shade::Dim, "Check your phone's messages app.")
        }
        CodeDelivery::SmsWord { beginning } => {
            Description::new("SMS with a code word", format!("to {phone}"))
                .note(Shade::Dim, match beginning {
                    Some(b) => format!("The code is a single word starting with \"{b}\"."),
                    None    => "The code is a single word.".to_string(),
                })
        }
        CodeDelivery::SmsPhrase { beginning } => {
            Description::new("SMS with a code phrase", format!("to {phone}"))
                .note(Shade::Dim, match beginning {
                    Some(b) => format!("The code is a short phrase starting with \"{b}\"."),
                    None    => "The code is a short phrase.".to_string(),
                })
        }
        CodeDelivery::Unknown { raw } => {
            Description::new("Unknown delivery method", "")
                .attention()
                .note(Shade::Plain, format!("Raw data: {raw}"))
        }
    }
}

/// Short label for a resend method.
pub fn next_label(next: &NextDelivery) -> &str {
    match next {
        NextDelivery::Sms         => "SMS",
        NextDelivery::Call        => "voice call",
        NextDelivery::FlashCall   => "flash call",
        NextDelivery::MissedCall  => "missed call",
        NextDelivery::FragmentSms => "Fragment SMS",
        NextDelivery::Unknown { raw } => raw.as_str(),
    }
}

/// `"N seconds (Xm Ys), until about HH:MM:SS"` for a code valid for `secs`
/// seconds from `now`.
pub fn expiry_text<Tz>(secs: u32, now: DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: fmt::Display,
{
    let until = now + Duration::seconds(i64::from(secs));
    format!(
        "{secs} seconds ({}m {}s), until about {}",
        secs / 60,
        secs % 60,
        until.format("%H:%M:%S"),
    )
}

/// Rows of the full `auth.sentCode` dump as `(label, value)`, one per
/// attribute of `type` and `next_type`.
pub fn dump_rows(
    phone_code_hash: &str,
    timeout: Option<u32>,
    delivery: &CodeDelivery,
    next: Option<&NextDelivery>,
) -> Vec<(String, String)> {
    let mut rows = vec![("phone_code_hash".to_string(), phone_code_hash.to_string())];
    rows.push(("timeout".to_string(), match timeout {
        Some(t) => format!("{t}s  ({}m {}s)", t / 60, t % 60),
        None    => "not provided".to_string(),
    }));
    rows.push(("type".to_string(), delivery.tl_name().to_string()));
    for (name, value) in delivery.fields() {
        rows.push((format!("type.{name}"), value));
    }
    rows.push(("next_type".to_string(), match next {
        Some(n) => n.tl_name().to_string(),
        None    => "none (no fallback delivery available)".to_string(),
    }));
    rows
}
