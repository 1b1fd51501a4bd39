// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Provisioning text parser.
//!
//! Operators paste free-form provisioning text (typically what a hosting
//! provider sends after a purchase). The parser turns it into structured
//! access fields plus an extras bag and never fails: anything it cannot map
//! to a structured field but still recognises is kept in the extras bag.
//!
//! Each normalized line is offered to the rules in [`RULES`] in order; the
//! first rule that consumes the line wins and later rules never see it.
//!
//! | Order | Rule | Consumes when | Effect |
//! |-------|------|---------------|--------|
//! | 1 | address | line contains an IPv4 literal | every literal appended to `addresses` |
//! | 2 | key/value | line contains `:` | port / username / secret, else extras[key] |
//! | 3 | hardware | line mentions a hardware keyword | extras[`config_<n>`] = whole line |
//!
//! Lines matching no rule are dropped.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

static IPV4_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:\d{1,3}\.){3}\d{1,3}\b").expect("IPv4 pattern is valid")
});

static DIGITS_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+").expect("digits pattern is valid"));

/// Key fragments marking the port line.
pub const PORT_MARKERS: &[&str] = &["端口"];
/// Key fragments marking the account line.
pub const USER_MARKERS: &[&str] = &["账号", "帐号", "user"];
/// Key fragments marking the password line.
pub const SECRET_MARKERS: &[&str] = &["密码"];
/// Words that identify a free-standing hardware/system description line.
pub const HARDWARE_KEYWORDS: &[&str] = &["gb", "cpu", "ddr", "ssd", "system", "系统"];

/// Prefix of synthetic extras keys holding hardware lines.
pub const CONFIG_KEY_PREFIX: &str = "config_";

/// Parser output not mapped to a structured field, keyed by lower-cased key.
pub type ExtraFields = BTreeMap<String, String>;

/// Access fields extracted from provisioning text.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuredFields {
    /// IPv4 addresses in encounter order, duplicates kept.
    pub addresses: Vec<String>,
    /// First run of digits on the port line.
    pub port: Option<String>,
    /// Login name.
    pub username: Option<String>,
    /// Login password.
    #[serde(skip_serializing)]
    pub secret: Option<String>,
}

impl StructuredFields {
    /// Addresses as the persisted JSON array.
    pub fn addresses_json(&self) -> String {
        serde_json::Value::from(self.addresses.clone()).to_string()
    }
}

impl fmt::Debug for StructuredFields {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StructuredFields")
            .field("addresses", &self.addresses)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("secret", &self.secret.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Result of parsing one provisioning text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedLease {
    /// Structured access fields.
    pub fields: StructuredFields,
    /// Everything else that was recognised.
    pub extras: ExtraFields,
}

/// A classification rule: returns `true` when it consumed the line.
pub type Rule = fn(&str, &mut ParsedLease) -> bool;

/// Rules in priority order.
pub const RULES: &[(&str, Rule)] = &[
    ("address", address_rule),
    ("key_value", key_value_rule),
    ("hardware", hardware_rule),
];

/// Parse provisioning text.
pub fn parse_lease_text(text: &str) -> ParsedLease {
    let mut parsed = ParsedLease::default();
    let mut dropped = 0usize;

    for line in normalize(text) {
        let consumed = RULES.iter().any(|(_, rule)| rule(&line, &mut parsed));
        if !consumed {
            dropped += 1;
        }
    }

    debug!(
        addresses = parsed.fields.addresses.len(),
        has_port = parsed.fields.port.is_some(),
        has_username = parsed.fields.username.is_some(),
        has_secret = parsed.fields.secret.is_some(),
        extras = parsed.extras.len(),
        dropped,
        "Parsed provisioning text"
    );

    parsed
}

/// Trim, unify full-width colons, collapse space runs and split into non-empty lines.
pub fn normalize(text: &str) -> Vec<String> {
    text.trim()
        .replace('：', ":")
        .lines()
        .map(|line| collapse_spaces(line.trim()))
        .filter(|line| !line.is_empty())
        .collect()
}

fn collapse_spaces(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut previous_space = false;
    for c in line.chars() {
        if c == ' ' {
            if !previous_space {
                out.push(c);
            }
            previous_space = true;
        } else {
            out.push(c);
            previous_space = false;
        }
    }
    out
}

/// Collect every IPv4 literal on the line.
pub fn address_rule(line: &str, parsed: &mut ParsedLease) -> bool {
    let before = parsed.fields.addresses.len();
    parsed.fields.addresses.extend(
        IPV4_PATTERN
            .find_iter(line)
            .map(|m| m.as_str().to_string()),
    );
    parsed.fields.addresses.len() > before
}

/// Split on the first colon and route the value by key.
pub fn key_value_rule(line: &str, parsed: &mut ParsedLease) -> bool {
    let Some((key, value)) = line.split_once(':') else {
        return false;
    };
    let key = key.trim().to_lowercase();
    let value = value.trim();

    if contains_any(&key, PORT_MARKERS) {
        if let Some(port) = DIGITS_PATTERN.find(value) {
            parsed.fields.port = Some(port.as_str().to_string());
        }
    } else if contains_any(&key, USER_MARKERS) {
        parsed.fields.username = Some(value.to_string());
    } else if contains_any(&key, SECRET_MARKERS) {
        parsed.fields.secret = Some(value.to_string());
    } else {
        parsed.extras.insert(key, value.to_string());
    }
    true
}

/// Keep hardware/system description lines under a synthetic `config_<n>` key.
pub fn hardware_rule(line: &str, parsed: &mut ParsedLease) -> bool {
    if !contains_any(&line.to_lowercase(), HARDWARE_KEYWORDS) {
        return false;
    }
    let key = format!("{}{}", CONFIG_KEY_PREFIX, parsed.extras.len());
    parsed.extras.insert(key, line.to_string());
    true
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|needle| haystack.contains(needle))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_provisioning_text() {
        let parsed = parse_lease_text("端口:22\n账号:root\n密码:abc\n1.2.3.4\n系统:centos7");

        assert_eq!(parsed.fields.addresses, vec!["1.2.3.4"]);
        assert_eq!(parsed.fields.port.as_deref(), Some("22"));
        assert_eq!(parsed.fields.username.as_deref(), Some("root"));
        assert_eq!(parsed.fields.secret.as_deref(), Some("abc"));
        assert_eq!(parsed.extras.get("系统").map(String::as_str), Some("centos7"));
        assert_eq!(parsed.extras.len(), 1);
    }

    #[test]
    fn test_full_width_colon_and_spacing() {
        let parsed = parse_lease_text("  远程端口：  3389  \n\n远程账号： Administrator ");
        assert_eq!(parsed.fields.port.as_deref(), Some("3389"));
        assert_eq!(parsed.fields.username.as_deref(), Some("Administrator"));
    }

    #[test]
    fn test_every_address_on_a_line_kept_in_order() {
        let parsed = parse_lease_text("IP: 10.0.0.1 / 10.0.0.2\n10.0.0.1");
        assert_eq!(
            parsed.fields.addresses,
            vec!["10.0.0.1", "10.0.0.2", "10.0.0.1"]
        );
        assert_eq!(
            parsed.fields.addresses_json(),
            r#"["10.0.0.1","10.0.0.2","10.0.0.1"]"#
        );
    }

    #[test]
    fn test_address_line_is_fully_consumed() {
        // Contains a colon, but the address rule wins.
        let parsed = parse_lease_text("主IP:8.8.8.8");
        assert_eq!(parsed.fields.addresses, vec!["8.8.8.8"]);
        assert!(parsed.extras.is_empty());
    }

    #[test]
    fn test_port_without_digits_is_ignored_but_consumed() {
        let parsed = parse_lease_text("端口:默认");
        assert!(parsed.fields.port.is_none());
        assert!(parsed.extras.is_empty());
    }

    #[test]
    fn test_port_takes_first_digit_run() {
        let parsed = parse_lease_text("SSH端口: 22 (备用 2222)");
        assert_eq!(parsed.fields.port.as_deref(), Some("22"));
    }

    #[test]
    fn test_user_marker_is_case_insensitive() {
        let parsed = parse_lease_text("UserName: Admin");
        assert_eq!(parsed.fields.username.as_deref(), Some("Admin"));
    }

    #[test]
    fn test_value_splits_on_first_colon_only() {
        let parsed = parse_lease_text("密码:a:b:c\n面板:http://panel");
        assert_eq!(parsed.fields.secret.as_deref(), Some("a:b:c"));
        assert_eq!(
            parsed.extras.get("面板").map(String::as_str),
            Some("http://panel")
        );
    }

    #[test]
    fn test_unrecognised_keys_lowercased_into_extras() {
        let parsed = parse_lease_text("Region: HK\nBandwidth: 100M");
        assert_eq!(parsed.extras.get("region").map(String::as_str), Some("HK"));
        assert_eq!(
            parsed.extras.get("bandwidth").map(String::as_str),
            Some("100M")
        );
    }

    #[test]
    fn test_hardware_lines_numbered_by_current_extras_size() {
        let parsed = parse_lease_text("机房:香港\n8核 CPU\n16GB DDR4\n500G SSD");
        assert_eq!(parsed.extras.get("机房").map(String::as_str), Some("香港"));
        assert_eq!(parsed.extras.get("config_1").map(String::as_str), Some("8核 CPU"));
        assert_eq!(
            parsed.extras.get("config_2").map(String::as_str),
            Some("16GB DDR4")
        );
        assert_eq!(
            parsed.extras.get("config_3").map(String::as_str),
            Some("500G SSD")
        );
    }

    #[test]
    fn test_unmatched_lines_dropped() {
        let parsed = parse_lease_text("感谢您的购买\nhello world\n1.2.3.4");
        assert_eq!(parsed.fields.addresses, vec!["1.2.3.4"]);
        assert!(parsed.extras.is_empty());
        assert!(parsed.fields.username.is_none());
    }

    #[test]
    fn test_recognised_lines_land_in_exactly_one_place() {
        let text = "产品类型:100M+10M\n系统:centos7\n4GB 内存\n机器信息:\n1.1.1.1\n2.2.2.2\n远程账号:root\n密码:pw\n远程端口:22\n谢谢";
        let parsed = parse_lease_text(text);

        assert_eq!(parsed.fields.addresses, vec!["1.1.1.1", "2.2.2.2"]);
        assert_eq!(parsed.fields.username.as_deref(), Some("root"));
        assert_eq!(parsed.fields.secret.as_deref(), Some("pw"));
        assert_eq!(parsed.fields.port.as_deref(), Some("22"));

        let extras: Vec<(&str, &str)> = parsed
            .extras
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        assert_eq!(
            extras,
            vec![
                ("config_2", "4GB 内存"),
                ("产品类型", "100M+10M"),
                ("机器信息", ""),
                ("系统", "centos7"),
            ]
        );
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(parse_lease_text(""), ParsedLease::default());
        assert_eq!(parse_lease_text("  \n \r\n  "), ParsedLease::default());
    }

    #[test]
    fn test_rules_are_independent() {
        let mut parsed = ParsedLease::default();
        assert!(!address_rule("no address here", &mut parsed));
        assert!(!key_value_rule("no colon here", &mut parsed));
        assert!(!hardware_rule("nothing relevant", &mut parsed));
        assert!(hardware_rule("Intel CPU", &mut parsed));
        assert_eq!(parsed.extras.get("config_0").map(String::as_str), Some("Intel CPU"));
    }

    #[test]
    fn test_normalize() {
        assert_eq!(
            normalize(" a：b \n\n  c   d  \r\n"),
            vec!["a:b".to_string(), "c d".to_string()]
        );
    }

    #[test]
    fn test_debug_redacts_secret() {
        let parsed = parse_lease_text("密码:hunter2");
        let rendered = format!("{:?}", parsed);
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("<redacted>"));
    }
}
