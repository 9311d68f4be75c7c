//! Source Record Data Structures
//! Core types for the unit of persisted work: the user's machine source
//! text plus its persistence metadata

use std::fmt;

use serde::{Deserialize, Serialize};

#[cfg(test)]
mod tests;

/// Millisecond epoch timestamp as reported by the registry.
pub type Timestamp = u64;

/// Suffix appended to the desired name when saving somebody else's source.
pub const FORK_SUFFIX: &str = " (forked)";

/// Opaque identifier for a persisted source (registry primary key or gist id).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceId(String);

impl SourceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where a persisted source lives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceProvider {
    /// The backend catalog of saved, named sources with ownership
    Registry,
    /// An external, read-only, unauthenticated source of machine text
    Gist,
}

/// Server-side fields known only once a registry source has been fetched
/// or saved at least once
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryMeta {
    /// Identifier of the user that owns the registry entry
    pub owner_id: String,
    /// Last server-side modification time
    pub updated_at: Timestamp,
}

/// A full registry record as returned by the source gateway
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrySource {
    pub id: SourceId,
    pub name: String,
    pub owner_id: String,
    pub updated_at: Timestamp,
    pub text: String,
}

impl RegistrySource {
    pub fn meta(&self) -> RegistryMeta {
        RegistryMeta {
            owner_id: self.owner_id.clone(),
            updated_at: self.updated_at,
        }
    }
}

/// Whether the current user owns the loaded source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ownership {
    /// Not derivable yet (no authenticated identity)
    Unknown,
    Owner,
    NotOwner,
}

/// The unit of persisted work: source text plus persistence metadata.
///
/// Created empty at machine start and populated from server-side initial
/// data, URL query parameters, the local cache, or a fetched gist. Lives
/// for the whole page session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceRecord {
    /// Registry primary key or gist id; `None` until resolved
    pub id: Option<SourceId>,
    /// `None` means unsaved/local-only
    pub provider: Option<SourceProvider>,
    /// Current text content, the source of truth shown in the editor
    pub raw_content: String,
    /// Present only for fetched/saved registry sources
    pub registry: Option<RegistryMeta>,
    /// User-chosen name, required before first creation/fork
    pub desired_name: String,
}

impl SourceRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a record from a fetched or server-supplied registry source.
    pub fn from_registry(source: &RegistrySource) -> Self {
        Self {
            id: Some(source.id.clone()),
            provider: Some(SourceProvider::Registry),
            raw_content: source.text.clone(),
            registry: Some(source.meta()),
            desired_name: source.name.clone(),
        }
    }

    /// Replace this record wholesale with a server-returned registry source.
    /// Used on create/fork/update completion.
    pub fn adopt(&mut self, source: &RegistrySource) {
        *self = Self::from_registry(source);
    }

    /// Derive ownership from registry metadata and the authenticated user.
    ///
    /// Gist and unsaved sources are never owned: saving them goes through
    /// the create/fork path. Without an authenticated identity ownership
    /// stays `Unknown`.
    pub fn ownership(&self, user_id: Option<&str>) -> Ownership {
        let Some(user_id) = user_id else {
            return Ownership::Unknown;
        };
        match &self.registry {
            Some(meta) if meta.owner_id == user_id => Ownership::Owner,
            _ => Ownership::NotOwner,
        }
    }

    /// Append the fork suffix to the desired name. Idempotent: repeating a
    /// fork never stacks suffixes.
    pub fn mark_forked(&mut self) {
        if !self.desired_name.ends_with(FORK_SUFFIX) {
            self.desired_name.push_str(FORK_SUFFIX);
        }
    }

    /// Validate the record's internal invariants
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.registry.is_some() && self.provider != Some(SourceProvider::Registry) {
            errors.push("registry metadata present on a non-registry source".to_string());
        }

        if self.provider.is_some() && self.id.is_none() {
            errors.push("provider resolved without a source id".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
