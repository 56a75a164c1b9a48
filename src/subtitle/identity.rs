/*!
 * Persistent subtitle ids.
 *
 * The inventory file is the single source of truth for issued ids. Every
 * generation batch runs inside an `InventoryGuard`: an in-process mutex plus
 * an exclusive OS lock on the file, held while the inventory is reloaded,
 * extended and written back. Both are released when the guard drops.
 */

use fs2::FileExt;
use log::{debug, warn};
use parking_lot::{Mutex, MutexGuard};
use rand::Rng;
use std::collections::BTreeSet;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::app_config::InventoryConfig;
use crate::errors::InventoryError;

/// Collisions tolerated per requested id before giving up
const MAX_COLLISIONS_PER_ID: usize = 5;

/// Handle to a persistent id inventory file
#[derive(Debug)]
pub struct StidInventory {
    path: PathBuf,
    lock: Mutex<()>,
}

impl StidInventory {
    /// Open an inventory, creating an empty file if needed
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, InventoryError> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| InventoryError::Io {
                path: path.clone(),
                source,
            })?;
        }
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|source| InventoryError::Io {
                path: path.clone(),
                source,
            })?;
        Ok(Self {
            path,
            lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Acquire exclusive access and load the current ids
    pub fn lock(&self) -> Result<InventoryGuard<'_>, InventoryError> {
        let mutex_guard = self.lock.lock();
        let io_err = |source| InventoryError::Io {
            path: self.path.clone(),
            source,
        };

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.path)
            .map_err(io_err)?;
        FileExt::lock_exclusive(&file).map_err(io_err)?;

        let mut content = String::new();
        if let Err(e) = file.read_to_string(&mut content) {
            let _ = FileExt::unlock(&file);
            return Err(io_err(e));
        }
        let ids = content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect();

        Ok(InventoryGuard {
            _mutex_guard: mutex_guard,
            file,
            path: &self.path,
            ids,
        })
    }

    /// Snapshot of the issued ids
    pub fn ids(&self) -> Result<BTreeSet<String>, InventoryError> {
        Ok(self.lock()?.ids().clone())
    }
}

/// Exclusive access to an inventory; unlocks on drop
pub struct InventoryGuard<'a> {
    _mutex_guard: MutexGuard<'a, ()>,
    file: File,
    path: &'a Path,
    ids: BTreeSet<String>,
}

impl InventoryGuard<'_> {
    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn ids(&self) -> &BTreeSet<String> {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Add ids to the file, then put it back in sorted order.
    ///
    /// New ids are appended and synced first. The sorted rewrite has the same
    /// length as the file, so the file never shrinks even if it is cut short;
    /// an unsorted inventory loads fine and is sorted by the next append.
    pub fn append(&mut self, new_ids: &[String]) -> Result<(), InventoryError> {
        let mut tail = String::new();
        for id in new_ids {
            if self.ids.insert(id.clone()) {
                tail.push_str(id);
                tail.push('\n');
            }
        }

        let io_err = |source| InventoryError::Io {
            path: self.path.to_path_buf(),
            source,
        };
        let end = self.file.seek(SeekFrom::End(0)).map_err(io_err)?;
        if end > 0 && !ends_with_newline(&mut self.file, end).map_err(io_err)? {
            tail.insert(0, '\n');
        }
        self.file.seek(SeekFrom::End(0)).map_err(io_err)?;
        self.file.write_all(tail.as_bytes()).map_err(io_err)?;
        self.file.sync_all().map_err(io_err)?;

        let mut sorted = String::with_capacity(self.ids.len() * 8);
        for id in &self.ids {
            sorted.push_str(id);
            sorted.push('\n');
        }
        let written = self.file.metadata().map_err(io_err)?.len();
        if sorted.len() as u64 == written {
            self.file.seek(SeekFrom::Start(0)).map_err(io_err)?;
            self.file.write_all(sorted.as_bytes()).map_err(io_err)?;
            self.file.sync_all().map_err(io_err)?;
        } else {
            // Blank or padded lines; sorting would change the length
            debug!("Inventory {:?} left unsorted until it can be rewritten in place", self.path);
        }
        Ok(())
    }
}

fn ends_with_newline(file: &mut File, end: u64) -> std::io::Result<bool> {
    let mut last = [0u8; 1];
    file.seek(SeekFrom::Start(end - 1))?;
    file.read_exact(&mut last)?;
    Ok(last[0] == b'\n')
}

impl Drop for InventoryGuard<'_> {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            warn!("Failed to unlock inventory {:?}: {}", self.path, e);
        }
    }
}

/// Draws fresh persistent ids
#[derive(Debug, Clone)]
pub struct PersistentIdGenerator {
    length: usize,
    alphabet: Vec<char>,
}

impl PersistentIdGenerator {
    pub fn new(length: usize, alphabet: &str) -> Result<Self, InventoryError> {
        let mut chars: Vec<char> = alphabet.chars().collect();
        chars.sort_unstable();
        chars.dedup();
        if length == 0 {
            return Err(InventoryError::InvalidSettings("id length must be greater than 0".to_string()));
        }
        if chars.len() < 2 {
            return Err(InventoryError::InvalidSettings(format!(
                "alphabet {:?} needs at least two distinct characters",
                alphabet
            )));
        }
        Ok(Self {
            length,
            alphabet: chars,
        })
    }

    pub fn from_config(config: &InventoryConfig) -> Result<Self, InventoryError> {
        Self::new(config.id_length, &config.alphabet)
    }

    /// Generate `count` ids that are new to the inventory and to each other
    pub fn generate(&self, inventory: &StidInventory, count: usize) -> Result<Vec<String>, InventoryError> {
        self.generate_with_rng(inventory, count, &mut rand::rng())
    }

    /// Like `generate`, with an injected random source
    pub fn generate_with_rng<R: Rng>(
        &self,
        inventory: &StidInventory,
        count: usize,
        rng: &mut R,
    ) -> Result<Vec<String>, InventoryError> {
        if count == 0 {
            return Ok(Vec::new());
        }

        let mut guard = inventory.lock()?;
        let mut batch: BTreeSet<String> = BTreeSet::new();
        let mut ids = Vec::with_capacity(count);
        let mut collisions = 0;

        while ids.len() < count {
            let candidate = self.draw(rng);
            if guard.contains(&candidate) || batch.contains(&candidate) {
                collisions += 1;
                if collisions > MAX_COLLISIONS_PER_ID * count {
                    return Err(InventoryError::TooManyCollisions {
                        requested: count,
                        collisions,
                    });
                }
                continue;
            }
            batch.insert(candidate.clone());
            ids.push(candidate);
        }

        guard.append(&ids)?;
        debug!(
            "Generated {} persistent ids ({} collisions, inventory size {})",
            ids.len(),
            collisions,
            guard.len()
        );
        Ok(ids)
    }

    fn draw<R: Rng>(&self, rng: &mut R) -> String {
        (0..self.length)
            .map(|_| self.alphabet[rng.random_range(0..self.alphabet.len())])
            .collect()
    }
}
