// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Turning operator input into stored leases.
//!
//! Input arrives either as a structured [`ProvisionRequest`] or as free text
//! that goes through the parser first. Either way the lease starts now (or at
//! an explicit instant), expires one month later and is classified before it
//! is written.

use std::sync::Arc;

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::clock::Clock;
use crate::error::{LeaseError, Result};
use crate::expiry::compute_expiry;
use crate::parser::{CONFIG_KEY_PREFIX, ExtraFields, ParsedLease, parse_lease_text};
use crate::persistence::LeaseStore;
use crate::records::{LeaseRecord, NewLease};
use crate::status::classify;

/// Extras key holding the product line.
pub const PRODUCT_TYPE_KEY: &str = "产品类型";
/// Extras key holding the operating system.
pub const OPERATING_SYSTEM_KEY: &str = "系统";
/// Header line preceding the address block in rendered text.
pub const MACHINE_INFO_HEADER: &str = "机器信息";

/// Structured provisioning input.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisionRequest {
    /// Product line.
    #[serde(default)]
    pub product_type: String,
    /// Operating system image.
    #[serde(default)]
    pub operating_system: String,
    /// Hardware/configuration lines, in order.
    #[serde(default)]
    pub configs: Vec<String>,
    /// IPv4 addresses.
    pub addresses: Vec<String>,
    /// Remote access port.
    pub port: String,
    /// Remote access username.
    pub username: String,
    /// Remote access password.
    #[serde(skip_serializing)]
    pub secret: String,
    /// Start of the first term; now if absent.
    #[serde(default)]
    pub start_at: Option<DateTime<Utc>>,
    /// Anything else worth keeping.
    #[serde(default)]
    pub extras: ExtraFields,
}

impl std::fmt::Debug for ProvisionRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProvisionRequest")
            .field("product_type", &self.product_type)
            .field("operating_system", &self.operating_system)
            .field("configs", &self.configs)
            .field("addresses", &self.addresses)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("secret", &"<redacted>")
            .field("start_at", &self.start_at)
            .field("extras", &self.extras)
            .finish()
    }
}

impl ProvisionRequest {
    /// Lift parser output into a request.
    ///
    /// Product type and operating system are taken out of the extras, as are
    /// the `config_<n>` lines (kept in parse order). Username, secret and port
    /// are required.
    pub fn from_parsed(parsed: ParsedLease) -> Result<Self> {
        let ParsedLease { fields, mut extras } = parsed;

        let username = fields
            .username
            .ok_or_else(|| LeaseError::validation("username", "no account line found"))?;
        let secret = fields
            .secret
            .ok_or_else(|| LeaseError::validation("secret", "no password line found"))?;
        let port = fields
            .port
            .ok_or_else(|| LeaseError::validation("port", "no port line found"))?;

        let product_type = extras.remove(PRODUCT_TYPE_KEY).unwrap_or_default();
        let operating_system = extras.remove(OPERATING_SYSTEM_KEY).unwrap_or_default();
        if extras.get(MACHINE_INFO_HEADER).is_some_and(|v| v.is_empty()) {
            extras.remove(MACHINE_INFO_HEADER);
        }

        let mut numbered: Vec<(usize, String)> = Vec::new();
        extras.retain(|key, value| match config_index(key) {
            Some(index) => {
                numbered.push((index, std::mem::take(value)));
                false
            }
            None => true,
        });
        numbered.sort_by_key(|(index, _)| *index);

        Ok(Self {
            product_type,
            operating_system,
            configs: numbered.into_iter().map(|(_, line)| line).collect(),
            addresses: fields.addresses,
            port,
            username,
            secret,
            start_at: None,
            extras,
        })
    }
}

fn config_index(key: &str) -> Option<usize> {
    key.strip_prefix(CONFIG_KEY_PREFIX)?.parse().ok()
}

/// Canonical provisioning text for `request`, as stored with the lease.
pub fn render_raw_content(request: &ProvisionRequest) -> String {
    let mut lines = Vec::with_capacity(request.configs.len() + request.addresses.len() + 6);
    lines.push(format!("{}:{}", PRODUCT_TYPE_KEY, request.product_type));
    lines.push(format!("{}:{}", OPERATING_SYSTEM_KEY, request.operating_system));
    lines.extend(request.configs.iter().cloned());
    lines.push(format!("{}:", MACHINE_INFO_HEADER));
    lines.extend(request.addresses.iter().cloned());
    lines.push(format!("远程账号:{}", request.username));
    lines.push(format!("密码:{}", request.secret));
    lines.push(format!("远程端口:{}", request.port));
    lines.join("\n")
}

/// Writes new leases.
pub struct Provisioner {
    store: Arc<dyn LeaseStore>,
    clock: Arc<dyn Clock>,
}

impl Provisioner {
    /// Create a provisioner.
    pub fn new(store: Arc<dyn LeaseStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Store a lease for `owner_id`.
    pub async fn provision(&self, owner_id: &str, request: ProvisionRequest) -> Result<LeaseRecord> {
        let now = self.clock.now();
        let start_at = request.start_at.unwrap_or(now).trunc_subsecs(0);
        let expire_at = compute_expiry(start_at);
        let status = classify(expire_at, now);
        let raw_content = render_raw_content(&request);

        let lease = NewLease {
            owner_id: owner_id.to_string(),
            raw_content,
            addresses: request.addresses,
            port: request.port,
            username: request.username,
            secret: request.secret,
            product_type: request.product_type,
            operating_system: request.operating_system,
            configs: request.configs,
            extras: request.extras,
            start_at,
            expire_at,
            status,
        };

        let record = self.store.create(lease).await?;
        info!(
            lease_id = %record.id,
            owner_id = %record.owner_id,
            addresses = record.addresses.len(),
            expire_at = %record.expire_at,
            status = %record.status,
            "Lease provisioned"
        );
        Ok(record)
    }

    /// Parse `text` and store the result for `owner_id`.
    pub async fn provision_text(
        &self,
        owner_id: &str,
        text: &str,
        start_at: Option<DateTime<Utc>>,
    ) -> Result<LeaseRecord> {
        let mut request = ProvisionRequest::from_parsed(parse_lease_text(text))?;
        request.start_at = start_at;
        self.provision(owner_id, request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEXT: &str = "产品类型:100M+10M\n系统:centos7\n8GB DDR4\n2 CPU cores\n机器信息:\n\
                        10.0.0.1\n10.0.0.2\n远程账号:root\n密码:abc\n远程端口:22\n带宽:100M";

    #[test]
    fn test_from_parsed_splits_classification_attributes() {
        let request = ProvisionRequest::from_parsed(parse_lease_text(TEXT)).unwrap();

        assert_eq!(request.product_type, "100M+10M");
        assert_eq!(request.operating_system, "centos7");
        assert_eq!(request.configs, vec!["8GB DDR4", "2 CPU cores"]);
        assert_eq!(request.addresses, vec!["10.0.0.1", "10.0.0.2"]);
        assert_eq!(request.port, "22");
        assert_eq!(request.username, "root");
        assert_eq!(request.secret, "abc");
        assert_eq!(request.extras.len(), 1);
        assert_eq!(request.extras.get("带宽").map(String::as_str), Some("100M"));
    }

    #[test]
    fn test_from_parsed_requires_credentials() {
        let err = ProvisionRequest::from_parsed(parse_lease_text("1.2.3.4\n端口:22\n密码:x"))
            .unwrap_err();
        assert!(matches!(err, LeaseError::ValidationError { ref field, .. } if field == "username"));

        let err = ProvisionRequest::from_parsed(parse_lease_text("1.2.3.4\n账号:root\n端口:22"))
            .unwrap_err();
        assert!(matches!(err, LeaseError::ValidationError { ref field, .. } if field == "secret"));

        let err = ProvisionRequest::from_parsed(parse_lease_text("1.2.3.4\n账号:root\n密码:x"))
            .unwrap_err();
        assert!(matches!(err, LeaseError::ValidationError { ref field, .. } if field == "port"));
    }

    #[test]
    fn test_render_raw_content_layout() {
        let request = ProvisionRequest {
            product_type: "100M+10M".to_string(),
            operating_system: "debian12".to_string(),
            configs: vec!["16GB DDR4".to_string()],
            addresses: vec!["10.0.0.1".to_string()],
            port: "2222".to_string(),
            username: "admin".to_string(),
            secret: "pw".to_string(),
            ..Default::default()
        };

        assert_eq!(
            render_raw_content(&request),
            "产品类型:100M+10M\n系统:debian12\n16GB DDR4\n机器信息:\n10.0.0.1\n\
             远程账号:admin\n密码:pw\n远程端口:2222"
        );
    }

    #[test]
    fn test_rendered_text_parses_back() {
        let request = ProvisionRequest::from_parsed(parse_lease_text(TEXT)).unwrap();
        let again =
            ProvisionRequest::from_parsed(parse_lease_text(&render_raw_content(&request))).unwrap();

        assert_eq!(again.product_type, request.product_type);
        assert_eq!(again.configs, request.configs);
        assert_eq!(again.addresses, request.addresses);
        assert!(again.extras.is_empty());
    }

    #[test]
    fn test_debug_hides_secret() {
        let request = ProvisionRequest::from_parsed(parse_lease_text(TEXT)).unwrap();
        assert!(!format!("{:?}", request).contains("abc"));
    }
}
