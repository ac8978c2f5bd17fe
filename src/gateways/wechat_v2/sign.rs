//! Canonical request signing for the legacy XML protocol.

use crate::config::SignType;
use ring::hmac;
use std::collections::BTreeMap;

pub const SIGN_FIELD: &str = "sign";

/// `k1=v1&k2=v2&key=<secret>` over the non-empty fields other than `sign`,
/// in ascending key order.
pub fn canonical_string(fields: &BTreeMap<String, String>, secret: &str) -> String {
    let mut out = String::new();
    for (name, value) in fields {
        if name == SIGN_FIELD || value.is_empty() {
            continue;
        }
        out.push_str(name);
        out.push('=');
        out.push_str(value);
        out.push('&');
    }
    out.push_str("key=");
    out.push_str(secret);
    out
}

pub fn sign(fields: &BTreeMap<String, String>, secret: &str, sign_type: SignType) -> String {
    let message = canonical_string(fields, secret);
    match sign_type {
        SignType::Md5 => hex::encode_upper(md5::compute(message.as_bytes()).0),
        SignType::HmacSha256 => {
            let key = hmac::Key::new(hmac::HMAC_SHA256, secret.as_bytes());
            hex::encode_upper(hmac::sign(&key, message.as_bytes()).as_ref())
        }
    }
}

/// Computes the signature and inserts it as the `sign` field.
pub fn attach(fields: &mut BTreeMap<String, String>, secret: &str, sign_type: SignType) {
    let signature = sign(fields, secret, sign_type);
    fields.insert(SIGN_FIELD.to_string(), signature);
}

/// `None` when the payload carries no signature at all.
pub fn verify(
    fields: &BTreeMap<String, String>,
    secret: &str,
    sign_type: SignType,
) -> Option<bool> {
    let received = fields.get(SIGN_FIELD)?;
    Some(received.eq_ignore_ascii_case(&sign(fields, secret, sign_type)))
}
