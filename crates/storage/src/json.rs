// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! JSON file-based program store

use crate::store::{ProgramStore, StoreError};
use aq_core::{ExecutionState, Program, ProgramId};
use serde::{de::DeserializeOwned, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const PROGRAMS: &str = "programs";
const STATES: &str = "states";

/// One JSON document per program definition and per execution state
///
/// ```text
/// <base>/programs/<id>.json
/// <base>/states/<id>.json
/// ```
///
/// Writes go to a temporary file that is renamed over the target, so a
/// crash mid-write leaves the previous document intact.
#[derive(Clone, Debug)]
pub struct JsonProgramStore {
    base_path: PathBuf,
}

impl JsonProgramStore {
    /// Open a store at the given path
    pub fn open(base_path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let base_path = base_path.into();
        fs::create_dir_all(base_path.join(PROGRAMS))?;
        fs::create_dir_all(base_path.join(STATES))?;
        Ok(Self { base_path })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Ids that are not plain file names never reach the filesystem
    fn path_for(&self, kind: &str, id: &ProgramId) -> Result<PathBuf, StoreError> {
        if !id.is_valid() {
            return Err(StoreError::InvalidId(id.clone()));
        }
        Ok(self.base_path.join(kind).join(format!("{}.json", id)))
    }

    fn write<T: Serialize>(&self, kind: &str, id: &ProgramId, data: &T) -> Result<(), StoreError> {
        let path = self.path_for(kind, id)?;
        let tmp = path.with_extension("json.tmp");
        let json = serde_json::to_string_pretty(data)?;
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn read<T: DeserializeOwned>(
        &self,
        kind: &'static str,
        id: &ProgramId,
    ) -> Result<T, StoreError> {
        let path = self.path_for(kind, id)?;
        let json = match fs::read_to_string(&path) {
            Ok(json) => json,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound {
                    kind,
                    id: id.clone(),
                })
            }
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_str(&json)?)
    }

    fn remove(&self, kind: &str, id: &ProgramId) -> Result<(), StoreError> {
        match fs::remove_file(self.path_for(kind, id)?) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// All ids that have a state document
    fn list_states(&self) -> Result<Vec<ProgramId>, StoreError> {
        let mut ids = Vec::new();
        for entry in fs::read_dir(self.base_path.join(STATES))? {
            let path = entry?.path();
            if path.extension().map(|e| e == "json").unwrap_or(false) {
                if let Some(stem) = path.file_stem() {
                    ids.push(ProgramId::new(stem.to_string_lossy()));
                }
            }
        }
        ids.sort();
        Ok(ids)
    }
}

impl ProgramStore for JsonProgramStore {
    fn load(&self, id: &ProgramId) -> Result<ExecutionState, StoreError> {
        self.read(STATES, id)
    }

    fn save(&self, state: &mut ExecutionState) -> Result<(), StoreError> {
        let id = state.program_id.clone();
        match self.read::<ExecutionState>(STATES, &id) {
            Ok(stored) if stored.revision > state.revision => {
                return Err(StoreError::Conflict {
                    id,
                    stored: stored.revision,
                    expected: state.revision,
                });
            }
            Ok(_) => {}
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e),
        }

        let mut next = state.clone();
        next.revision += 1;
        self.write(STATES, &id, &next)?;
        state.revision = next.revision;
        tracing::trace!(program_id = %id, revision = state.revision, "state saved");
        Ok(())
    }

    fn delete(&self, id: &ProgramId) -> Result<(), StoreError> {
        self.remove(STATES, id)?;
        self.remove(PROGRAMS, id)
    }

    fn list_active(&self) -> Result<Vec<ProgramId>, StoreError> {
        let mut active = Vec::new();
        for id in self.list_states()? {
            match self.load(&id) {
                Ok(state) if !state.is_terminal() => active.push(id),
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(program_id = %id, error = %e, "skipping unreadable state");
                }
            }
        }
        Ok(active)
    }

    fn save_program(&self, program: &Program) -> Result<(), StoreError> {
        self.write(PROGRAMS, &program.id, program)
    }

    fn load_program(&self, id: &ProgramId) -> Result<Program, StoreError> {
        self.read(PROGRAMS, id)
    }
}

#[cfg(test)]
#[path = "json_tests.rs"]
mod tests;
