//! Persisted device-group definitions.
//!
//! The store owns the id -> group mapping and persists it as one JSON
//! document, rewritten wholesale on every mutation (temp file + atomic
//! rename). A reader always observes either the pre- or post-mutation
//! mapping, never an intermediate state. Mutations are serialized by a
//! store-wide lock; reads go through a separate RwLock and never block on
//! disk I/O.
//!
//! Membership uniqueness across groups is deliberately NOT enforced here -
//! that is a dashboard convention, checked by the caller if at all.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{MarqueeError, MarqueeResult};
use crate::registry::Device;
use crate::utils::now_millis;

// ─────────────────────────────────────────────────────────────────────────────
// Types
// ─────────────────────────────────────────────────────────────────────────────

/// A named, user-defined set of devices controlled as one unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    /// Store-assigned unique id (`group_<uuid>`).
    pub id: String,
    /// User-chosen display name.
    pub name: String,
    /// Member devices. The coordinator reads this as a snapshot.
    pub devices: Vec<Device>,
    /// Creation time (Unix millis).
    pub created_at: u64,
}

/// Partial fields for a group update. `None` leaves the field unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GroupUpdate {
    pub name: Option<String>,
    pub devices: Option<Vec<Device>>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Store
// ─────────────────────────────────────────────────────────────────────────────

/// Durable store for group definitions.
pub struct GroupStore {
    path: PathBuf,
    groups: RwLock<BTreeMap<String, Group>>,
    /// Serializes load-modify-persist-swap sequences across mutations.
    write_lock: Mutex<()>,
}

impl GroupStore {
    /// Opens the store, loading any existing document.
    ///
    /// A missing file yields an empty mapping. A corrupt file is logged and
    /// treated as empty rather than refusing to start.
    pub fn open(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let groups = match std::fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(groups) => groups,
                Err(e) => {
                    log::error!(
                        "[GroupStore] Corrupt group document at {}: {} (starting empty)",
                        path.display(),
                        e
                    );
                    BTreeMap::new()
                }
            },
            Err(_) => BTreeMap::new(),
        };

        log::info!(
            "[GroupStore] Loaded {} group(s) from {}",
            groups.len(),
            path.display()
        );

        Self {
            path,
            groups: RwLock::new(groups),
            write_lock: Mutex::new(()),
        }
    }

    /// Returns the full id -> group mapping.
    #[must_use]
    pub fn list(&self) -> BTreeMap<String, Group> {
        self.groups.read().clone()
    }

    /// Looks up a single group by id.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<Group> {
        self.groups.read().get(id).cloned()
    }

    /// Creates a new group with a generated unique id.
    ///
    /// # Errors
    /// `Validation` if `name` is empty or `devices` is empty - surfaced
    /// before any persistence attempt.
    pub fn create(&self, name: &str, devices: Vec<Device>) -> MarqueeResult<Group> {
        validate_fields(name, &devices)?;

        let group = Group {
            id: format!("group_{}", Uuid::new_v4().simple()),
            name: name.to_string(),
            devices,
            created_at: now_millis(),
        };

        let _guard = self.write_lock.lock();
        let mut groups = self.groups.read().clone();
        groups.insert(group.id.clone(), group.clone());
        self.persist(&groups)?;
        *self.groups.write() = groups;

        log::info!(
            "[GroupStore] Created group {} ({}) with {} device(s)",
            group.id,
            group.name,
            group.devices.len()
        );

        Ok(group)
    }

    /// Applies a partial update to an existing group.
    ///
    /// # Errors
    /// `GroupNotFound` if the id is unknown; `Validation` if the update
    /// would leave an empty name or an empty member set.
    pub fn update(&self, id: &str, update: GroupUpdate) -> MarqueeResult<Group> {
        let _guard = self.write_lock.lock();
        let mut groups = self.groups.read().clone();

        let group = groups
            .get_mut(id)
            .ok_or_else(|| MarqueeError::GroupNotFound(id.to_string()))?;

        if let Some(name) = update.name {
            group.name = name;
        }
        if let Some(devices) = update.devices {
            group.devices = devices;
        }
        validate_fields(&group.name, &group.devices)?;

        let updated = group.clone();
        self.persist(&groups)?;
        *self.groups.write() = groups;

        log::info!("[GroupStore] Updated group {}", id);

        Ok(updated)
    }

    /// Deletes a group.
    ///
    /// # Errors
    /// `GroupNotFound` if the id is unknown.
    pub fn delete(&self, id: &str) -> MarqueeResult<()> {
        let _guard = self.write_lock.lock();
        let mut groups = self.groups.read().clone();

        if groups.remove(id).is_none() {
            return Err(MarqueeError::GroupNotFound(id.to_string()));
        }

        self.persist(&groups)?;
        *self.groups.write() = groups;

        log::info!("[GroupStore] Deleted group {}", id);

        Ok(())
    }

    /// Returns true if any group lists the given host as a member.
    ///
    /// Linear scan over groups x members - fleets are tens of devices, not
    /// millions.
    #[must_use]
    pub fn is_member_of_any_group(&self, host: &str) -> bool {
        self.groups
            .read()
            .values()
            .any(|g| g.devices.iter().any(|d| d.host == host))
    }

    /// Writes the full mapping to disk via temp file + atomic rename.
    fn persist(&self, groups: &BTreeMap<String, Group>) -> MarqueeResult<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| MarqueeError::Storage(e.to_string()))?;
        }

        let contents = serde_json::to_string_pretty(groups)
            .map_err(|e| MarqueeError::Storage(e.to_string()))?;

        let temp_path = self.path.with_extension("json.tmp");
        std::fs::write(&temp_path, contents).map_err(|e| MarqueeError::Storage(e.to_string()))?;
        std::fs::rename(&temp_path, &self.path).map_err(|e| MarqueeError::Storage(e.to_string()))
    }
}

/// Rejects empty names and empty member sets before anything touches disk.
fn validate_fields(name: &str, devices: &[Device]) -> MarqueeResult<()> {
    if name.trim().is_empty() {
        return Err(MarqueeError::Validation("group name must not be empty".into()));
    }
    if devices.is_empty() {
        return Err(MarqueeError::Validation(
            "group must contain at least one device".into(),
        ));
    }
    Ok(())
}
