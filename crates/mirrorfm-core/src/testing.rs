//! In-memory remote store used by the unit tests
//!
//! Holds a flat map of absolute paths (directories with trailing `/`) and
//! applies mutations with the same merge-on-collision semantics as the
//! real backend. Every call is recorded as `"<action> <detail>"`.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use bytes::Bytes;
use tokio::sync::Notify;

use crate::domain::{path, FmError};
use crate::ports::{EntryDescriptor, IRemoteStore, ProgressFn, RenamePair};

#[derive(Default)]
struct MockState {
    /// path -> Some(size) for files, None for directories
    entries: BTreeMap<String, Option<u64>>,
    calls: Vec<String>,
    fail_next: Option<FmError>,
    upload_failures: HashMap<String, FmError>,
}

pub(crate) struct MockStore {
    state: Mutex<MockState>,
    hold: AtomicBool,
    release: Notify,
}

impl MockStore {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(MockState::default()),
            hold: AtomicBool::new(false),
            release: Notify::new(),
        }
    }

    fn state(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn dir(self, p: &str) -> Self {
        self.state().entries.insert(path::as_dir(p), None);
        self
    }

    pub(crate) fn file(self, p: &str, size: u64) -> Self {
        self.put_file(p, size);
        self
    }

    pub(crate) fn put_file(&self, p: &str, size: u64) {
        self.state().entries.insert(path::trim_dir(p), Some(size));
    }

    pub(crate) fn remove(&self, p: &str) {
        let mut state = self.state();
        remove_tree(&mut state.entries, &path::normalize(p));
    }

    pub(crate) fn exists(&self, p: &str) -> bool {
        self.state().entries.contains_key(&path::normalize(p))
    }

    pub(crate) fn size_of(&self, p: &str) -> Option<u64> {
        self.state().entries.get(&path::normalize(p)).copied().flatten()
    }

    /// Fails the next call of any kind with `err`
    pub(crate) fn fail_next(&self, err: FmError) {
        self.state().fail_next = Some(err);
    }

    /// Fails every upload to `p` with `err`
    pub(crate) fn fail_upload(&self, p: &str, err: FmError) {
        self.state().upload_failures.insert(path::normalize(p), err);
    }

    /// Makes detailed listings wait until [`release_listing`] is called
    pub(crate) fn hold_listings(&self) {
        self.hold.store(true, Ordering::SeqCst);
    }

    pub(crate) fn release_listing(&self) {
        self.release.notify_one();
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.state().calls.clone()
    }

    pub(crate) fn count_calls(&self, action: &str) -> usize {
        self.state()
            .calls
            .iter()
            .filter(|c| c.split(' ').next() == Some(action))
            .count()
    }

    fn begin(&self, call: String) -> Result<(), FmError> {
        let mut state = self.state();
        state.calls.push(call);
        match state.fail_next.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn relocate(&self, from: &str, to_dir: &str, keep_source: bool) {
        let mut state = self.state();
        let from = path::normalize(from);
        let is_dir = from.ends_with('/');
        let name = path::split(&from).full_name;
        let target = path::child_path(to_dir, &name, is_dir);
        relocate_tree(&mut state.entries, &from, &target, keep_source);
    }
}

fn remove_tree(entries: &mut BTreeMap<String, Option<u64>>, p: &str) {
    let dir_form = path::as_dir(p);
    let file_form = path::trim_dir(p);
    entries.retain(|k, _| *k != file_form && !k.starts_with(&dir_form));
}

fn relocate_tree(
    entries: &mut BTreeMap<String, Option<u64>>,
    from: &str,
    to: &str,
    keep_source: bool,
) {
    let moved: Vec<(String, Option<u64>)> = entries
        .iter()
        .filter(|(k, _)| k.as_str() == from || (from.ends_with('/') && k.starts_with(from)))
        .map(|(k, v)| (format!("{to}{}", &k[from.len()..]), *v))
        .collect();
    if !keep_source {
        remove_tree(entries, from);
    }
    for (k, v) in moved {
        entries.insert(k, v);
    }
}

#[async_trait::async_trait]
impl IRemoteStore for MockStore {
    async fn list_names(&self, p: &str) -> Result<Vec<String>, FmError> {
        let entries = self.list_detailed_inner(p, "list")?;
        Ok(entries
            .into_iter()
            .map(|e| if e.is_dir() { format!("{}/", e.name) } else { e.name })
            .collect())
    }

    async fn list_detailed(&self, p: &str) -> Result<Vec<EntryDescriptor>, FmError> {
        if self.hold.load(Ordering::SeqCst) {
            self.state().calls.push(format!("slist {p}"));
            self.release.notified().await;
            return self.list_children(p);
        }
        self.list_detailed_inner(p, "slist")
    }

    async fn stat(&self, p: &str) -> Result<EntryDescriptor, FmError> {
        self.begin(format!("stat {p}"))?;
        let state = self.state();
        let parts = path::split(p);
        if let Some(size) = state.entries.get(&path::trim_dir(p)).copied().flatten() {
            return Ok(EntryDescriptor::file(parts.full_name, size));
        }
        if state.entries.contains_key(&path::as_dir(p)) {
            return Ok(EntryDescriptor::dir(parts.full_name));
        }
        Err(FmError::NotFound(p.to_string()))
    }

    async fn delete(&self, paths: &[String]) -> Result<(), FmError> {
        self.begin(format!("delete {}", paths.join(",")))?;
        let mut state = self.state();
        for p in paths {
            remove_tree(&mut state.entries, p);
        }
        Ok(())
    }

    async fn mkdir(&self, paths: &[String], mode: Option<u32>) -> Result<(), FmError> {
        let mode = mode.map(|m| format!(" {m:o}")).unwrap_or_default();
        self.begin(format!("mkdir {}{mode}", paths.join(",")))?;
        let mut state = self.state();
        for p in paths {
            state.entries.insert(path::as_dir(p), None);
        }
        Ok(())
    }

    async fn touch(&self, paths: &[String]) -> Result<(), FmError> {
        self.begin(format!("touch {}", paths.join(",")))?;
        let mut state = self.state();
        for p in paths {
            state.entries.insert(path::trim_dir(p), Some(0));
        }
        Ok(())
    }

    async fn copy(&self, sources: &[String], destination: &str) -> Result<(), FmError> {
        self.begin(format!("copy {} -> {destination}", sources.join(",")))?;
        for source in sources {
            self.relocate(source, destination, true);
        }
        Ok(())
    }

    async fn move_to(
        &self,
        sources: &[String],
        destination: &str,
        deep: bool,
    ) -> Result<(), FmError> {
        let action = if deep { "fmove" } else { "move" };
        self.begin(format!("{action} {} -> {destination}", sources.join(",")))?;
        for source in sources {
            self.relocate(source, destination, false);
        }
        Ok(())
    }

    async fn rename(&self, pairs: &[RenamePair]) -> Result<(), FmError> {
        let detail: Vec<String> = pairs.iter().map(|p| format!("{}=>{}", p.from, p.to)).collect();
        self.begin(format!("rename {}", detail.join(",")))?;
        let mut state = self.state();
        for pair in pairs {
            let from = if state.entries.contains_key(&path::as_dir(&pair.from)) {
                path::as_dir(&pair.from)
            } else {
                path::trim_dir(&pair.from)
            };
            let to = if from.ends_with('/') {
                path::as_dir(&pair.to)
            } else {
                path::trim_dir(&pair.to)
            };
            relocate_tree(&mut state.entries, &from, &to, false);
        }
        Ok(())
    }

    async fn upload(
        &self,
        p: &str,
        data: Bytes,
        progress: Option<ProgressFn>,
    ) -> Result<(), FmError> {
        self.begin(format!("upload {p}"))?;
        if let Some(err) = self.state().upload_failures.get(&path::normalize(p)).cloned() {
            return Err(err);
        }
        let total = data.len() as u64;
        if let Some(progress) = progress {
            progress(total / 2, total);
            progress(total, total);
        }
        self.put_file(p, total);
        Ok(())
    }
}

impl MockStore {
    fn list_detailed_inner(&self, p: &str, action: &str) -> Result<Vec<EntryDescriptor>, FmError> {
        self.begin(format!("{action} {p}"))?;
        self.list_children(p)
    }

    fn list_children(&self, p: &str) -> Result<Vec<EntryDescriptor>, FmError> {
        let dir = path::as_dir(p);
        let state = self.state();
        if dir != "/" && !state.entries.contains_key(&dir) {
            return Err(FmError::NotFound(dir));
        }
        Ok(state
            .entries
            .iter()
            .filter(|(k, _)| k.as_str() != dir && path::split(k).dir == dir)
            .map(|(k, v)| {
                let name = path::split(k).full_name;
                match v {
                    Some(size) => EntryDescriptor::file(name, *size),
                    None => EntryDescriptor::dir(name),
                }
            })
            .collect())
    }
}
