//! Decoding of `auth.SentCode` replies.
//!
//! Telegram tells the client *how* it delivered the login code. The
//! generated TL enums are flattened here into owned, display-ready values
//! so callers never have to match on raw constructors.

use layer_tl_types as tl;

use crate::errors::{InvocationError, LoginToken};

/// Where the login code was sent (`auth.SentCodeType`).
#[derive(Clone, Debug, PartialEq)]
pub enum CodeDelivery {
    /// In-app message from the official "Telegram" account.
    App { length: i32 },
    /// Plain SMS.
    Sms { length: i32 },
    /// Voice call reading the digits aloud.
    Call { length: i32 },
    /// A flash call; the code is derived from the caller number `pattern`.
    FlashCall { pattern: String },
    /// A missed call; the last `length` digits of the caller number are the code.
    MissedCall { prefix: String, length: i32 },
    /// Email to the address matching `email_pattern`.
    EmailCode { email_pattern: String, length: i32 },
    /// Telegram wants a login email configured before it sends codes.
    SetUpEmailRequired,
    /// Anonymous number; the code is shown on fragment.com.
    FragmentSms { url: String, length: i32 },
    /// SMS verified through Firebase.
    FirebaseSms { length: i32 },
    /// SMS containing a single word; `beginning` is its first letter(s).
    SmsWord { beginning: Option<String> },
    /// SMS containing a phrase; `beginning` is its first word(s).
    SmsPhrase { beginning: Option<String> },
    /// A constructor this build does not know how to describe.
    Unknown { raw: String },
}

impl CodeDelivery {
    /// Short name of the delivery tag, e.g. `"App"` or `"FragmentSms"`.
    pub fn name(&self) -> &'static str {
        match self {
            Self::App { .. }           => "App",
            Self::Sms { .. }           => "Sms",
            Self::Call { .. }          => "Call",
            Self::FlashCall { .. }     => "FlashCall",
            Self::MissedCall { .. }    => "MissedCall",
            Self::EmailCode { .. }     => "EmailCode",
            Self::SetUpEmailRequired   => "SetUpEmailRequired",
            Self::FragmentSms { .. }   => "FragmentSms",
            Self::FirebaseSms { .. }   => "FirebaseSms",
            Self::SmsWord { .. }       => "SmsWord",
            Self::SmsPhrase { .. }     => "SmsPhrase",
            Self::Unknown { .. }       => "Unknown",
        }
    }

    /// TL constructor name, e.g. `"auth.sentCodeTypeApp"`.
    pub fn tl_name(&self) -> &'static str {
        match self {
            Self::App { .. }           => "auth.sentCodeTypeApp",
            Self::Sms { .. }           => "auth.sentCodeTypeSms",
            Self::Call { .. }          => "auth.sentCodeTypeCall",
            Self::FlashCall { .. }     => "auth.sentCodeTypeFlashCall",
            Self::MissedCall { .. }    => "auth.sentCodeTypeMissedCall",
            Self::EmailCode { .. }     => "auth.sentCodeTypeEmailCode",
            Self::SetUpEmailRequired   => "auth.sentCodeTypeSetUpEmailRequired",
            Self::FragmentSms { .. }   => "auth.sentCodeTypeFragmentSms",
            Self::FirebaseSms { .. }   => "auth.sentCodeTypeFirebaseSms",
            Self::SmsWord { .. }       => "auth.sentCodeTypeSmsWord",
            Self::SmsPhrase { .. }     => "auth.sentCodeTypeSmsPhrase",
            Self::Unknown { .. }       => "(unknown)",
        }
    }

    /// Every attribute of the constructor as `(name, value)`.
    ///
    /// Optional attributes Telegram left out read `"(not set)"`.
    pub fn fields(&self) -> Vec<(&'static str, String)> {
        fn opt(v: &Option<String>) -> String {
            v.clone().unwrap_or_else(|| "(not set)".to_string())
        }
        match self {
            Self::App { length } | Self::Sms { length } | Self::Call { length }
            | Self::FirebaseSms { length } => vec![("length", length.to_string())],
            Self::FlashCall { pattern } => vec![("pattern", pattern.clone())],
            Self::MissedCall { prefix, length } => vec![
                ("prefix", prefix.clone()),
                ("length", length.to_string()),
            ],
            Self::EmailCode { email_pattern, length } => vec![
                ("email_pattern", email_pattern.clone()),
                ("length", length.to_string()),
            ],
            Self::SetUpEmailRequired => Vec::new(),
            Self::FragmentSms { url, length } => vec![
                ("url", url.clone()),
                ("length", length.to_string()),
            ],
            Self::SmsWord { beginning } | Self::SmsPhrase { beginning } => {
                vec![("beginning", opt(beginning))]
            }
            Self::Unknown { raw } => vec![("raw", raw.clone())],
        }
    }
}

impl From<&tl::enums::auth::SentCodeType> for CodeDelivery {
    fn from(t: &tl::enums::auth::SentCodeType) -> Self {
        use tl::enums::auth::SentCodeType as T;
        match t {
            T::App(a)         => Self::App { length: a.length },
            T::Sms(s)         => Self::Sms { length: s.length },
            T::Call(c)        => Self::Call { length: c.length },
            T::FlashCall(f)   => Self::FlashCall { pattern: f.pattern.clone() },
            T::MissedCall(m)  => Self::MissedCall { prefix: m.prefix.clone(), length: m.length },
            T::EmailCode(e)   => Self::EmailCode {
                email_pattern: e.email_pattern.clone(),
                length:        e.length,
            },
            T::SetUpEmailRequired(_) => Self::SetUpEmailRequired,
            T::FragmentSms(f) => Self::FragmentSms { url: f.url.clone(), length: f.length },
            T::FirebaseSms(f) => Self::FirebaseSms { length: f.length },
            T::SmsWord(w)     => Self::SmsWord { beginning: w.beginning.clone() },
            T::SmsPhrase(p)   => Self::SmsPhrase { beginning: p.beginning.clone() },
            #[allow(unreachable_patterns)]
            other             => Self::Unknown { raw: format!("{other:?}") },
        }
    }
}

/// How a resend would be delivered (`auth.CodeType`).
#[derive(Clone, Debug, PartialEq)]
pub enum NextDelivery {
    Sms,
    Call,
    FlashCall,
    MissedCall,
    FragmentSms,
    Unknown { raw: String },
}

impl NextDelivery {
    pub fn name(&self) -> &str {
        match self {
            Self::Sms          => "Sms",
            Self::Call         => "Call",
            Self::FlashCall    => "FlashCall",
            Self::MissedCall   => "MissedCall",
            Self::FragmentSms  => "FragmentSms",
            Self::Unknown { raw } => raw.as_str(),
        }
    }

    /// TL constructor name, e.g. `"auth.codeTypeSms"`; the raw form for unknowns.
    pub fn tl_name(&self) -> &str {
        match self {
            Self::Sms          => "auth.codeTypeSms",
            Self::Call         => "auth.codeTypeCall",
            Self::FlashCall    => "auth.codeTypeFlashCall",
            Self::MissedCall   => "auth.codeTypeMissedCall",
            Self::FragmentSms  => "auth.codeTypeFragmentSms",
            Self::Unknown { raw } => raw.as_str(),
        }
    }
}

impl From<&tl::enums::auth::CodeType> for NextDelivery {
    fn from(t: &tl::enums::auth::CodeType) -> Self {
        use tl::enums::auth::CodeType as T;
        match t {
            T::Sms         => Self::Sms,
            T::Call        => Self::Call,
            T::FlashCall   => Self::FlashCall,
            T::MissedCall  => Self::MissedCall,
            T::FragmentSms => Self::FragmentSms,
            #[allow(unreachable_patterns)]
            other          => Self::Unknown { raw: format!("{other:?}") },
        }
    }
}

/// Turn an `auth.SentCode` reply into a [`LoginToken`] for `phone`.
pub(crate) fn login_token(
    phone: &str,
    sent:  tl::enums::auth::SentCode,
) -> Result<LoginToken, InvocationError> {
    use tl::enums::auth::SentCode;

    let s = match sent {
        SentCode::SentCode(s) => s,
        SentCode::Success(_) => {
            return Err(InvocationError::Unexpected("already authorized (sentCodeSuccess)".into()));
        }
        SentCode::PaymentRequired(_) => {
            return Err(InvocationError::Unexpected("payment required to send code".into()));
        }
    };

    Ok(LoginToken {
        phone:           phone.to_string(),
        delivery:        CodeDelivery::from(&s.r#type),
        next:            s.next_type.as_ref().map(NextDelivery::from),
        timeout:         s.timeout.and_then(|t| u32::try_from(t).ok()),
        phone_code_hash: s.phone_code_hash,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sent(ty: tl::enums::auth::SentCodeType, next: Option<tl::enums::auth::CodeType>, timeout: Option<i32>)
        -> tl::enums::auth::SentCode
    {
        tl::enums::auth::SentCode::SentCode(tl::types::auth::SentCode {
            r#type:          ty,
            phone_code_hash: "abc123".into(),
            next_type:       next,
            timeout,
        })
    }

    #[test]
    fn app_delivery_with_sms_fallback() {
        let ty = tl::enums::auth::SentCodeType::App(tl::types::auth::SentCodeTypeApp { length: 5 });
        let tok = login_token("+447712345678", sent(ty, Some(tl::enums::auth::CodeType::Sms), Some(120)))
            .unwrap();

        assert_eq!(tok.phone(), "+447712345678");
        assert_eq!(tok.phone_code_hash(), "abc123");
        assert_eq!(tok.delivery(), &CodeDelivery::App { length: 5 });
        assert_eq!(tok.next_delivery(), Some(&NextDelivery::Sms));
        assert_eq!(tok.timeout(), Some(120));
        assert_eq!(tok.delivery().tl_name(), "auth.sentCodeTypeApp");
        assert_eq!(tok.next_delivery().map(NextDelivery::tl_name), Some("auth.codeTypeSms"));
    }

    #[test]
    fn missing_next_type_and_timeout() {
        let ty = tl::enums::auth::SentCodeType::FlashCall(
            tl::types::auth::SentCodeTypeFlashCall { pattern: "+44*".into() },
        );
        let tok = login_token("+44", sent(ty, None, None)).unwrap();
        assert_eq!(tok.delivery(), &CodeDelivery::FlashCall { pattern: "+44*".into() });
        assert!(tok.next_delivery().is_none());
        assert_eq!(tok.timeout(), None);
    }

    #[test]
    fn negative_timeout_is_dropped() {
        let ty = tl::enums::auth::SentCodeType::Sms(tl::types::auth::SentCodeTypeSms { length: 6 });
        let tok = login_token("+1", sent(ty, None, Some(-1))).unwrap();
        assert_eq!(tok.timeout(), None);
    }

    #[test]
    fn delivery_names() {
        assert_eq!(CodeDelivery::SetUpEmailRequired.name(), "SetUpEmailRequired");
        assert_eq!(CodeDelivery::Call { length: 5 }.name(), "Call");
        assert_eq!(NextDelivery::MissedCall.name(), "MissedCall");
        assert_eq!(NextDelivery::Unknown { raw: "Foo".into() }.name(), "Foo");
    }

    #[test]
    fn every_attribute_is_listed() {
        let d = CodeDelivery::MissedCall { prefix: "+4420".into(), length: 4 };
        assert_eq!(d.fields(), vec![("prefix", "+4420".to_string()), ("length", "4".to_string())]);

        let d = CodeDelivery::FragmentSms { url: "https://fragment.com/x".into(), length: 5 };
        assert_eq!(d.tl_name(), "auth.sentCodeTypeFragmentSms");
        assert_eq!(d.fields().len(), 2);

        assert!(CodeDelivery::SetUpEmailRequired.fields().is_empty());
        assert_eq!(
            CodeDelivery::SmsWord { beginning: None }.fields(),
            vec![("beginning", "(not set)".to_string())],
        );
    }
}
