//! The tag registry.
//!
//! Single source of truth for which inline tags exist, whether they carry
//! a value, and how that value is typed. The parser drops tokens whose
//! name is not registered; the processor validates values against the
//! declared kind.

use once_cell::sync::Lazy;
use std::collections::HashMap;

/// How a tag's value is typed and validated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagValueKind {
    /// Free text (work-item titles).
    Text,
    /// A `@username` reference; `@none` or empty means unassign.
    Username,
    /// ISO-8601 calendar date; empty clears the date.
    Date,
    /// Member of the priority enumeration.
    Priority,
    /// Member of the severity enumeration (bugs only).
    Severity,
    /// Member of the status workflow of the chat's current kind.
    Status,
}

/// Declaration of one inline tag.
#[derive(Debug, Clone, Copy)]
pub struct TagSpec {
    pub key: &'static str,
    /// Whether an empty value is a validation error. Tags with optional
    /// values give an empty value "unset" semantics instead.
    pub requires_value: bool,
    pub kind: TagValueKind,
}

static REGISTRY: Lazy<HashMap<&'static str, TagSpec>> = Lazy::new(|| {
    let specs = [
        TagSpec { key: "task", requires_value: true, kind: TagValueKind::Text },
        TagSpec { key: "bug", requires_value: true, kind: TagValueKind::Text },
        TagSpec { key: "epic", requires_value: true, kind: TagValueKind::Text },
        TagSpec { key: "status", requires_value: true, kind: TagValueKind::Status },
        TagSpec { key: "assignee", requires_value: false, kind: TagValueKind::Username },
        TagSpec { key: "priority", requires_value: true, kind: TagValueKind::Priority },
        TagSpec { key: "due", requires_value: false, kind: TagValueKind::Date },
        TagSpec { key: "title", requires_value: true, kind: TagValueKind::Text },
        TagSpec { key: "severity", requires_value: true, kind: TagValueKind::Severity },
    ];
    specs.into_iter().map(|spec| (spec.key, spec)).collect()
});

/// Looks up the spec for a tag name.
pub fn lookup(key: &str) -> Option<&'static TagSpec> {
    REGISTRY.get(key)
}

/// Whether the tag name is registered.
pub fn is_registered(key: &str) -> bool {
    REGISTRY.contains_key(key)
}

/// Tag names that create a work item out of a Discussion.
pub fn is_creation_tag(key: &str) -> bool {
    matches!(key, "task" | "bug" | "epic")
}
