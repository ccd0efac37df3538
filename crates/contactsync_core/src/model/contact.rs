//! Contact domain model.
//!
//! # Responsibility
//! - Define the account-scoped contact record.
//! - Derive the print name and eligibility used by reconciliation.
//! - Build replication payloads that are safe to write to another account.
//!
//! # Invariants
//! - Contacts without a print name or without memberships are never
//!   reconciled.
//! - Replicas never carry the source account's resource identifier,
//!   concurrency token, photo, or externally sourced values.

use crate::model::uid::UidTags;
use serde::{Deserialize, Serialize};

/// Fields of a contact that an update call may change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContactField {
    Names,
    Organizations,
    EmailAddresses,
    PhoneNumbers,
    Addresses,
    Biographies,
    Memberships,
    UidTags,
}

/// Fields overwritten when an edit is replicated to another account.
pub const REPLICATED_FIELDS: &[ContactField] = &[
    ContactField::Names,
    ContactField::Organizations,
    ContactField::EmailAddresses,
    ContactField::PhoneNumbers,
    ContactField::Addresses,
    ContactField::Biographies,
    ContactField::Memberships,
];

/// Origin of a multi-valued entry.
///
/// Only `Contact`-sourced values belong to the record itself; the others are
/// merged in by the service from profiles or domain directories and are
/// rejected when written back.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueSource {
    #[default]
    Contact,
    Profile,
    Domain,
}

/// One labeled entry such as an email address or phone number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactValue {
    #[serde(default)]
    pub label: String,
    pub value: String,
    #[serde(default)]
    pub source: ValueSource,
}

impl ContactValue {
    pub fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
            source: ValueSource::Contact,
        }
    }

    /// Whether the store accepts this entry on write.
    pub fn is_writable(&self) -> bool {
        self.source == ValueSource::Contact
    }
}

/// One contact as stored in one account.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    /// UID tags stored on the remote record.
    #[serde(default)]
    pub uid_tags: UidTags,
    /// Account-local identifier. `None` before creation.
    #[serde(default)]
    pub resource_id: Option<String>,
    /// Concurrency token required by updates.
    #[serde(default)]
    pub etag: Option<String>,
    /// Primary name field.
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub organization: Option<String>,
    #[serde(default)]
    pub emails: Vec<ContactValue>,
    #[serde(default)]
    pub phones: Vec<ContactValue>,
    #[serde(default)]
    pub addresses: Vec<ContactValue>,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub photo_url: Option<String>,
    /// Group resource identifiers in this contact's own account.
    #[serde(default)]
    pub memberships: Vec<String>,
    /// Last modification marker.
    #[serde(default)]
    pub updated: Option<String>,
}

impl Contact {
    /// Creates an untagged, unsaved contact with a primary name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    /// Cross-account identity, if assigned.
    pub fn uid(&self) -> Option<&str> {
        self.uid_tags.primary()
    }

    /// Display name: primary name, else organization, else none.
    pub fn print_name(&self) -> Option<&str> {
        non_blank(self.name.as_deref()).or_else(|| non_blank(self.organization.as_deref()))
    }

    /// Whether reconciliation may see this contact at all.
    pub fn is_eligible(&self) -> bool {
        self.print_name().is_some() && !self.memberships.is_empty()
    }

    /// Builds a copy suitable for creation in another account.
    ///
    /// `memberships` must already be remapped to the target account.
    pub fn replica(&self, memberships: Vec<String>) -> Contact {
        Contact {
            uid_tags: self.uid_tags.clone(),
            resource_id: None,
            etag: None,
            name: self.name.clone(),
            organization: self.organization.clone(),
            emails: writable(&self.emails),
            phones: writable(&self.phones),
            addresses: writable(&self.addresses),
            note: self.note.clone(),
            photo_url: None,
            memberships,
            updated: None,
        }
    }

    /// Copies replicated fields from `source` onto this record.
    ///
    /// Keeps this record's identity, resource identifier, concurrency token
    /// and photo. Returns whether anything changed.
    pub fn overwrite_from(&mut self, source: &Contact, memberships: Vec<String>) -> bool {
        let replica = source.replica(memberships);
        if self.same_payload(&replica) {
            return false;
        }
        self.name = replica.name;
        self.organization = replica.organization;
        self.emails = replica.emails;
        self.phones = replica.phones;
        self.addresses = replica.addresses;
        self.note = replica.note;
        self.memberships = replica.memberships;
        true
    }

    /// Compares the fields covered by `REPLICATED_FIELDS`.
    pub fn same_payload(&self, other: &Contact) -> bool {
        self.name == other.name
            && self.organization == other.organization
            && writable(&self.emails) == writable(&other.emails)
            && writable(&self.phones) == writable(&other.phones)
            && writable(&self.addresses) == writable(&other.addresses)
            && self.note == other.note
            && self.memberships == other.memberships
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

fn writable(values: &[ContactValue]) -> Vec<ContactValue> {
    values
        .iter()
        .filter(|value| value.is_writable())
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{Contact, ContactValue, ValueSource};
    use crate::model::uid::UidTags;

    #[test]
    fn print_name_falls_back_to_organization() {
        let mut contact = Contact::default();
        assert_eq!(contact.print_name(), None);

        contact.organization = Some("Acme".to_string());
        assert_eq!(contact.print_name(), Some("Acme"));

        contact.name = Some("  ".to_string());
        assert_eq!(contact.print_name(), Some("Acme"));

        contact.name = Some("Jane Doe".to_string());
        assert_eq!(contact.print_name(), Some("Jane Doe"));
    }

    #[test]
    fn eligibility_requires_name_and_membership() {
        let mut contact = Contact::named("Jane Doe");
        assert!(!contact.is_eligible());

        contact.memberships.push("contactGroups/1".to_string());
        assert!(contact.is_eligible());

        contact.name = None;
        assert!(!contact.is_eligible());
    }

    #[test]
    fn replica_strips_account_local_and_external_fields() {
        let mut source = Contact::named("Jane Doe");
        source.uid_tags = UidTags::single("c1");
        source.resource_id = Some("people/7".to_string());
        source.etag = Some("etag-7".to_string());
        source.photo_url = Some("https://example.invalid/p.jpg".to_string());
        source.updated = Some("2024-01-01T00:00:00Z".to_string());
        source.emails.push(ContactValue::new("home", "jane@example.com"));
        source.emails.push(ContactValue {
            label: "work".to_string(),
            value: "jane@corp.example".to_string(),
            source: ValueSource::Domain,
        });

        let replica = source.replica(vec!["contactGroups/9".to_string()]);
        assert_eq!(replica.uid(), Some("c1"));
        assert_eq!(replica.resource_id, None);
        assert_eq!(replica.etag, None);
        assert_eq!(replica.photo_url, None);
        assert_eq!(replica.updated, None);
        assert_eq!(replica.emails.len(), 1);
        assert_eq!(replica.memberships, vec!["contactGroups/9".to_string()]);
    }

    #[test]
    fn overwrite_keeps_target_identity_and_reports_changes() {
        let mut source = Contact::named("Jane Roe");
        source.uid_tags = UidTags::single("c1");
        source.resource_id = Some("people/1".to_string());

        let mut target = Contact::named("Jane Doe");
        target.uid_tags = UidTags::single("c1");
        target.resource_id = Some("people/55".to_string());
        target.etag = Some("etag-55".to_string());
        target.photo_url = Some("photo".to_string());

        let memberships = vec!["contactGroups/3".to_string()];
        assert!(target.overwrite_from(&source, memberships.clone()));
        assert_eq!(target.name.as_deref(), Some("Jane Roe"));
        assert_eq!(target.resource_id.as_deref(), Some("people/55"));
        assert_eq!(target.etag.as_deref(), Some("etag-55"));
        assert_eq!(target.photo_url.as_deref(), Some("photo"));

        assert!(!target.overwrite_from(&source, memberships));
    }
}
