//! Virtual overlay file resolver.
//!
//! Presents a single cached view across priority-ordered input roots and one
//! output root. Reads fall through output-side records to the first input
//! root holding the path; writes stay in memory until `flush_all`, and a
//! record only becomes dirty when its content actually changes. Later mods
//! observe earlier mods' writes through this state before anything touches
//! disk.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Component, Path, PathBuf};

use tracing::{debug, info};

use crate::error::{ForgeError, Result};
use crate::vfs::ledger;

/// A memoized input-side record. `real_path` is fixed at first resolution.
#[derive(Debug)]
struct InputFileRecord {
    real_path: Option<PathBuf>,
    content: Option<String>,
}

/// A memoized output-side record.
#[derive(Debug)]
struct OutputFileRecord {
    real_path: PathBuf,
    dirty: bool,
    pre_existing: bool,
    content: Option<String>,
}

/// Monotonic id counter, lazily loaded from the ledger record.
#[derive(Debug)]
struct LedgerState {
    text: String,
    next: u64,
    allocated: bool,
}

/// Overlay of N input roots and one output root.
pub struct OverlayResolver {
    input_roots: Vec<PathBuf>,
    output_root: PathBuf,
    inputs: BTreeMap<String, InputFileRecord>,
    outputs: BTreeMap<String, OutputFileRecord>,
    ledger_path: String,
    id_seed: u64,
    ledger: Option<LedgerState>,
    dry_run: bool,
}

impl OverlayResolver {
    /// Create a resolver over the given roots.
    pub fn new(
        input_roots: Vec<PathBuf>,
        output_root: PathBuf,
        ledger_path: impl Into<String>,
        id_seed: u64,
    ) -> Self {
        Self {
            input_roots,
            output_root,
            inputs: BTreeMap::new(),
            outputs: BTreeMap::new(),
            ledger_path: ledger_path.into(),
            id_seed,
            ledger: None,
            dry_run: false,
        }
    }

    /// Log intended writes during `flush_all` instead of performing them.
    pub fn set_dry_run(&mut self, dry_run: bool) {
        self.dry_run = dry_run;
    }

    /// Memoize the input-side record for `rel`: search the input roots in
    /// priority order, first match wins. No content is read yet.
    fn resolve_input(&mut self, rel: &str) {
        if self.inputs.contains_key(rel) {
            return;
        }
        let real_path = self
            .input_roots
            .iter()
            .map(|root| root.join(rel))
            .find(|candidate| candidate.is_file());
        self.inputs.insert(
            rel.to_string(),
            InputFileRecord {
                real_path,
                content: None,
            },
        );
    }

    /// Memoize the output-side record for `rel`, checking on-disk existence
    /// at first touch.
    fn resolve_output(&mut self, rel: &str) -> Result<&mut OutputFileRecord> {
        let real_path = self.output_real_path(rel)?;
        Ok(self
            .outputs
            .entry(rel.to_string())
            .or_insert_with(|| OutputFileRecord {
                pre_existing: real_path.is_file(),
                real_path,
                dirty: false,
                content: None,
            }))
    }

    /// Join `rel` against the output root, rejecting absolute paths and
    /// parent-directory traversal.
    fn output_real_path(&self, rel: &str) -> Result<PathBuf> {
        let rel_path = Path::new(rel);
        if rel_path.is_absolute() {
            return Err(ForgeError::PathEscape { path: rel.into() });
        }
        let mut real = self.output_root.clone();
        for component in rel_path.components() {
            match component {
                Component::Normal(part) => real.push(part),
                Component::CurDir => {}
                _ => return Err(ForgeError::PathEscape { path: rel.into() }),
            }
        }
        Ok(real)
    }

    /// Load a pre-existing output file's content, at most once per run.
    fn load_pre_existing(record: &mut OutputFileRecord, rel: &str) -> Result<()> {
        if record.content.is_none() && record.pre_existing {
            let text = fs::read_to_string(&record.real_path).map_err(|e| ForgeError::io(rel, e))?;
            record.content = Some(text);
        }
        Ok(())
    }

    /// Read `rel` through the overlay.
    ///
    /// An output record with tracked content wins, so a mod sees any prior
    /// mod's write in the same run before anything is flushed. Otherwise the
    /// input roots are consulted, reading and caching content lazily.
    /// Absence from all roots is `Ok(None)`; a failed read propagates with
    /// the path attached.
    pub fn read_auto(&mut self, rel: &str) -> Result<Option<String>> {
        if let Some(record) = self.outputs.get_mut(rel) {
            Self::load_pre_existing(record, rel)?;
            if let Some(content) = &record.content {
                return Ok(Some(content.clone()));
            }
            // Resolved but never written and not pre-existing: fall through.
        }

        self.resolve_input(rel);
        let Some(record) = self.inputs.get_mut(rel) else {
            return Ok(None);
        };
        let Some(real_path) = &record.real_path else {
            return Ok(None);
        };
        if record.content.is_none() {
            let text = fs::read_to_string(real_path).map_err(|e| ForgeError::io(rel, e))?;
            record.content = Some(text);
        }
        Ok(record.content.clone())
    }

    /// Track `content` for `rel` on the output side.
    ///
    /// The record becomes dirty only when the content differs from the
    /// currently tracked value (for a pre-existing output file touched for
    /// the first time, the on-disk content).
    pub fn write(&mut self, rel: &str, content: &str) -> Result<()> {
        let record = self.resolve_output(rel)?;
        Self::load_pre_existing(record, rel)?;
        if record.content.as_deref() != Some(content) {
            record.content = Some(content.to_string());
            record.dirty = true;
            debug!(path = rel, "overlay write marked dirty");
        }
        Ok(())
    }

    /// True when `rel` has a dirty output record.
    pub fn is_dirty(&self, rel: &str) -> bool {
        self.outputs.get(rel).is_some_and(|r| r.dirty)
    }

    /// True when the output side already holds content for `rel`, either
    /// tracked from a write this run or pre-existing on disk.
    pub fn has_output_content(&mut self, rel: &str) -> Result<bool> {
        let record = self.resolve_output(rel)?;
        Self::load_pre_existing(record, rel)?;
        Ok(record.content.is_some())
    }

    /// Write every dirty output record to disk, creating parent directories
    /// as needed. Returns the number of records flushed. Under dry-run the
    /// intended writes are logged and counted without touching disk.
    pub fn flush_all(&mut self) -> Result<usize> {
        let mut flushed = 0;
        for (rel, record) in self.outputs.iter_mut() {
            if !record.dirty {
                continue;
            }
            if !record.real_path.starts_with(&self.output_root) {
                return Err(ForgeError::PathEscape { path: rel.clone() });
            }
            if self.dry_run {
                info!(path = rel, "dry run: would write");
            } else {
                if let Some(parent) = record.real_path.parent() {
                    fs::create_dir_all(parent).map_err(|e| ForgeError::io(rel.as_str(), e))?;
                }
                let content = record.content.as_deref().unwrap_or_default();
                fs::write(&record.real_path, content).map_err(|e| ForgeError::io(rel.as_str(), e))?;
                debug!(path = rel, "flushed");
            }
            record.dirty = false;
            flushed += 1;
        }
        Ok(flushed)
    }

    /// Allocate the next sequential id, loading the ledger on first use.
    ///
    /// A ledger absent from every root starts the counter at the configured
    /// seed. Ledger text without a usable decimal run is a parse failure.
    pub fn allocate_id(&mut self) -> Result<u64> {
        if self.ledger.is_none() {
            let path = self.ledger_path.clone();
            let state = match self.read_auto(&path)? {
                Some(text) => {
                    let next = ledger::find_counter(&text).ok_or_else(|| ForgeError::Parse {
                        path: path.clone(),
                        detail: "ledger contains no usable decimal counter".to_string(),
                    })?;
                    LedgerState {
                        text,
                        next,
                        allocated: false,
                    }
                }
                None => LedgerState {
                    text: String::new(),
                    next: self.id_seed,
                    allocated: false,
                },
            };
            self.ledger = Some(state);
        }
        let state = self.ledger.as_mut().expect("ledger loaded");
        let id = state.next;
        state.next += 1;
        state.allocated = true;
        Ok(id)
    }

    /// Persist the advanced counter into the ledger record.
    ///
    /// Called once at run end, before `flush_all`. A counter that was never
    /// advanced is not written, so an untouched ledger never dirties the
    /// output tree.
    pub fn flush_id(&mut self) -> Result<()> {
        let Some(state) = self.ledger.take() else {
            return Ok(());
        };
        if state.allocated {
            let path = self.ledger_path.clone();
            let text = ledger::replace_counter(&state.text, state.next);
            self.write(&path, &text)?;
        }
        self.ledger = Some(state);
        Ok(())
    }
}
