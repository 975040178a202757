//! Ordered set of open archives with search-path precedence

use std::fmt;

use tracing::{debug, info, warn};

use super::archive::{Archive, FileHandle, OpenOptions};
use super::error::{MpqError, MpqResult};
use super::provider::FileProvider;

/// Stable identifier of a registered archive
///
/// Identifiers of removed archives are reused by later registrations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ArchiveId(u32);

impl ArchiveId {
    /// Slot index
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ArchiveId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug)]
struct Registered {
    name: String,
    archive: Archive,
}

/// Archives searched in registration order
#[derive(Debug, Default)]
pub struct ArchiveRegistry {
    slots: Vec<Option<Registered>>,
    free: Vec<u32>,
    order: Vec<ArchiveId>,
}

impl ArchiveRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an open archive under `name`
    ///
    /// The archive is searched after every archive registered before it.
    pub fn add_search_path(&mut self, name: impl Into<String>, archive: Archive) -> ArchiveId {
        let entry = Registered {
            name: name.into(),
            archive,
        };

        let id = if let Some(index) = self.free.pop() {
            self.slots[index as usize] = Some(entry);
            ArchiveId(index)
        } else {
            self.slots.push(Some(entry));
            ArchiveId(self.slots.len() as u32 - 1)
        };
        self.order.push(id);

        debug!(
            "Registered archive {} as {} ({} in search order)",
            self.name(id).unwrap_or_default(),
            id,
            self.order.len()
        );
        id
    }

    /// Open `path` through `provider` and register it
    pub fn open(
        &mut self,
        provider: &dyn FileProvider,
        name: &str,
        path: &str,
    ) -> MpqResult<ArchiveId> {
        self.open_with(&OpenOptions::default(), provider, name, path)
    }

    /// Open with explicit options and register
    pub fn open_with(
        &mut self,
        options: &OpenOptions,
        provider: &dyn FileProvider,
        name: &str,
        path: &str,
    ) -> MpqResult<ArchiveId> {
        let archive = options.open(provider, path)?;
        Ok(self.add_search_path(name, archive))
    }

    /// Resolve `name` in the first archive that has it
    ///
    /// With a filter, only the archive registered under that name (ignoring
    /// case) is searched. Archives that fail for reasons other than a
    /// missing file are logged and skipped.
    pub fn find_file(&mut self, name: &str, filter: Option<&str>) -> MpqResult<(ArchiveId, FileHandle)> {
        for &id in &self.order {
            let Some(entry) = self.slots[id.index()].as_mut() else {
                continue;
            };
            if filter.is_some_and(|wanted| !entry.name.eq_ignore_ascii_case(wanted)) {
                continue;
            }

            match entry.archive.resolve(name) {
                Ok(handle) => return Ok((id, handle)),
                Err(err) if err.is_not_found() => {}
                Err(err) => warn!("Skipping archive {} while looking up {}: {}", entry.name, name, err),
            }
        }

        debug!("{} not found in {} archives", name, self.order.len());
        Err(MpqError::FileNotFound(name.to_string()))
    }

    /// Find and read a file
    pub fn read_file(&mut self, name: &str, filter: Option<&str>) -> MpqResult<Vec<u8>> {
        let (id, handle) = self.find_file(name, filter)?;
        let archive = self.archive_mut(id).ok_or_else(|| {
            MpqError::InvalidHandle(format!("archive {id} disappeared during lookup"))
        })?;
        archive.read_file(&handle)
    }

    /// Registered archive
    pub fn archive(&self, id: ArchiveId) -> Option<&Archive> {
        self.slot(id).map(|entry| &entry.archive)
    }

    /// Registered archive, mutably
    pub fn archive_mut(&mut self, id: ArchiveId) -> Option<&mut Archive> {
        self.slots
            .get_mut(id.index())
            .and_then(Option::as_mut)
            .map(|entry| &mut entry.archive)
    }

    /// Name an archive was registered under
    pub fn name(&self, id: ArchiveId) -> Option<&str> {
        self.slot(id).map(|entry| entry.name.as_str())
    }

    /// Close and unregister an archive, freeing its identifier
    ///
    /// Returns false when `id` is not registered.
    pub fn remove(&mut self, id: ArchiveId) -> bool {
        let Some(mut entry) = self.slots.get_mut(id.index()).and_then(Option::take) else {
            return false;
        };

        entry.archive.close();
        self.order.retain(|&other| other != id);
        self.free.push(id.0);
        info!("Removed archive {} ({})", entry.name, id);
        true
    }

    /// Number of registered archives
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// No archives registered
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Archives in search order
    pub fn iter(&self) -> impl Iterator<Item = (ArchiveId, &str, &Archive)> {
        self.order.iter().filter_map(|&id| {
            self.slot(id)
                .map(|entry| (id, entry.name.as_str(), &entry.archive))
        })
    }

    fn slot(&self, id: ArchiveId) -> Option<&Registered> {
        self.slots.get(id.index()).and_then(Option::as_ref)
    }
}
