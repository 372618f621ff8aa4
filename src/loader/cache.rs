use std::collections::HashMap;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

use arc_swap::ArcSwap;
use rayon::prelude::*;

use crate::audio::{SampleBuffer, SampleId};
use crate::error::LoadError;

use super::sample_loader::SampleSource;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SampleStatus {
    Unloaded,
    Loading,
    Loaded,
}

/// Read side of the cache used at trigger time. Must never block.
pub trait SampleLookup {
    fn loaded(&self, id: &SampleId) -> Option<Arc<SampleBuffer>>;
}

type LoadResult = Result<Arc<SampleBuffer>, LoadError>;

// One in-flight load. The caller that created it does the work, everyone
// else who asks for the same id parks on the condvar until it's done.
#[derive(Default)]
struct Pending {
    result: Mutex<Option<LoadResult>>,
    ready: Condvar,
}

impl Pending {
    fn finish(&self, result: LoadResult) {
        *self.result.lock().unwrap_or_else(PoisonError::into_inner) = Some(result);
        self.ready.notify_all();
    }

    fn wait(&self, id: &SampleId) -> LoadResult {
        let poisoned = || LoadError::Read {
            id: id.clone(),
            reason: "loader panicked".into(),
        };
        let mut slot = self.result.lock().map_err(|_| poisoned())?;
        loop {
            if let Some(result) = slot.as_ref() {
                return result.clone();
            }
            slot = self.ready.wait(slot).map_err(|_| poisoned())?;
        }
    }
}

pub struct SampleCache {
    source: Arc<dyn SampleSource>,
    // loaded buffers are published as a snapshot so trigger-time reads are lock free
    loaded: ArcSwap<HashMap<SampleId, Arc<SampleBuffer>>>,
    loading: Mutex<HashMap<SampleId, Arc<Pending>>>,
}

impl SampleCache {
    pub fn new(source: Arc<dyn SampleSource>) -> Self {
        Self {
            source,
            loaded: ArcSwap::from_pointee(HashMap::new()),
            loading: Mutex::new(HashMap::new()),
        }
    }

    pub fn get(&self, id: &SampleId) -> Option<Arc<SampleBuffer>> {
        self.loaded.load().get(id).cloned()
    }

    pub fn status(&self, id: &SampleId) -> SampleStatus {
        if self.loaded.load().contains_key(id) {
            return SampleStatus::Loaded;
        }
        if self.lock_loading().contains_key(id) {
            SampleStatus::Loading
        } else {
            SampleStatus::Unloaded
        }
    }

    /// Returns once `id` is decoded. Concurrent callers for the same id share
    /// one load; a failed load leaves the id unloaded so it can be retried.
    pub fn ensure_loaded(&self, id: &SampleId) -> Result<Arc<SampleBuffer>, LoadError> {
        if id.is_empty() {
            return Err(LoadError::EmptyId);
        }
        if let Some(buffer) = self.get(id) {
            return Ok(buffer);
        }

        let (pending, owner) = {
            let mut loading = self.lock_loading();
            // it may have finished between the fast path and taking the lock
            if let Some(buffer) = self.get(id) {
                return Ok(buffer);
            }
            match loading.get(id) {
                Some(pending) => (pending.clone(), false),
                None => {
                    let pending = Arc::new(Pending::default());
                    loading.insert(id.clone(), pending.clone());
                    (pending, true)
                }
            }
        };

        if !owner {
            log::debug!("waiting on in-flight load of {id}");
            return pending.wait(id);
        }

        // if the source panics, the guard still clears the entry and wakes waiters
        let guard = InFlight { cache: self, id, pending, settled: false };
        log::debug!("loading sample {id}");
        let result = self.source.load(id).map(Arc::new);
        match &result {
            Ok(buffer) => {
                self.loaded.rcu(|current| {
                    let mut next = HashMap::clone(current);
                    next.insert(id.clone(), buffer.clone());
                    next
                });
                log::info!("loaded sample {id} ({} frames)", buffer.len());
            }
            Err(e) => log::warn!("sample {id} failed to load: {e}"),
        }
        guard.settle(result.clone());
        result
    }

    /// Loads every distinct non-empty id in parallel and waits for all of them
    /// to settle. One failure doesn't stop the others from becoming usable.
    pub fn preload(&self, ids: &[SampleId]) -> Vec<(SampleId, Result<(), LoadError>)> {
        let mut unique: Vec<SampleId> = ids.iter().filter(|id| !id.is_empty()).cloned().collect();
        unique.sort();
        unique.dedup();
        if unique.is_empty() {
            return Vec::new();
        }

        let results: Vec<(SampleId, Result<(), LoadError>)> = unique
            .into_par_iter()
            .map(|id| {
                let result = self.ensure_loaded(&id).map(|_| ());
                (id, result)
            })
            .collect();

        let failed = results.iter().filter(|(_, r)| r.is_err()).count();
        if failed > 0 {
            log::warn!("preload finished with {failed} of {} samples unavailable", results.len());
        }
        results
    }

    /// Forgets every loaded sample. Loads still in flight finish normally.
    pub fn clear(&self) {
        self.loaded.store(Arc::new(HashMap::new()));
    }

    pub fn loaded_count(&self) -> usize {
        self.loaded.load().len()
    }

    // The map only ever sees whole inserts and removes, so a panic elsewhere
    // while it was held can't leave it half-updated.
    fn lock_loading(&self) -> MutexGuard<'_, HashMap<SampleId, Arc<Pending>>> {
        self.loading.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// The owner's claim on a pending load. Settling (or unwinding past it)
// removes the entry so the id can be retried, then releases every waiter.
struct InFlight<'a> {
    cache: &'a SampleCache,
    id: &'a SampleId,
    pending: Arc<Pending>,
    settled: bool,
}

impl InFlight<'_> {
    fn settle(mut self, result: LoadResult) {
        self.release(result);
    }

    fn release(&mut self, result: LoadResult) {
        self.settled = true;
        self.cache.lock_loading().remove(self.id);
        self.pending.finish(result);
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if !self.settled {
            log::error!("loader panicked on sample {}", self.id);
            let err = LoadError::Read {
                id: self.id.clone(),
                reason: "loader panicked".into(),
            };
            self.release(Err(err));
        }
    }
}

impl SampleLookup for SampleCache {
    fn loaded(&self, id: &SampleId) -> Option<Arc<SampleBuffer>> {
        self.get(id)
    }
}

impl SampleLookup for HashMap<SampleId, Arc<SampleBuffer>> {
    fn loaded(&self, id: &SampleId) -> Option<Arc<SampleBuffer>> {
        self.get(id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;

    use crate::audio::StereoFrame;

    // Counts loads, sleeps to widen the race window, fails for ids in `broken`
    #[derive(Default)]
    struct CountingSource {
        loads: AtomicUsize,
        broken: Mutex<HashSet<String>>,
    }

    impl CountingSource {
        fn break_id(&self, id: &str) {
            self.broken.lock().unwrap().insert(id.to_string());
        }

        fn fix_id(&self, id: &str) {
            self.broken.lock().unwrap().remove(id);
        }
    }

    impl SampleSource for CountingSource {
        fn load(&self, id: &SampleId) -> Result<SampleBuffer, LoadError> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(50));
            if self.broken.lock().unwrap().contains(id.as_str()) {
                return Err(LoadError::Decode {
                    id: id.clone(),
                    reason: "bad header".into(),
                });
            }
            Ok(SampleBuffer::from_frames(vec![StereoFrame::mono(0.5); 4]))
        }
    }

    fn cache() -> (Arc<CountingSource>, Arc<SampleCache>) {
        let source = Arc::new(CountingSource::default());
        let cache = Arc::new(SampleCache::new(source.clone()));
        (source, cache)
    }

    #[test]
    fn concurrent_requests_share_one_load() {
        let (source, cache) = cache();
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = cache.clone();
                thread::spawn(move || cache.ensure_loaded(&SampleId::from("kick.wav")).is_ok())
            })
            .collect();
        for h in handles {
            assert!(h.join().unwrap());
        }
        assert_eq!(source.loads.load(Ordering::SeqCst), 1);
        assert_eq!(cache.status(&SampleId::from("kick.wav")), SampleStatus::Loaded);
    }

    #[test]
    fn status_reports_loading_while_in_flight() {
        let (_, cache) = cache();
        let id = SampleId::from("snare.wav");
        assert_eq!(cache.status(&id), SampleStatus::Unloaded);
        let worker = {
            let cache = cache.clone();
            let id = id.clone();
            thread::spawn(move || cache.ensure_loaded(&id))
        };
        thread::sleep(Duration::from_millis(10));
        assert_eq!(cache.status(&id), SampleStatus::Loading);
        assert!(cache.get(&id).is_none());
        worker.join().unwrap().unwrap();
        assert!(cache.get(&id).is_some());
    }

    #[test]
    fn failed_load_can_be_retried() {
        let (source, cache) = cache();
        let id = SampleId::from("hat.wav");
        source.break_id("hat.wav");
        assert!(matches!(cache.ensure_loaded(&id), Err(LoadError::Decode { .. })));
        assert_eq!(cache.status(&id), SampleStatus::Unloaded);

        source.fix_id("hat.wav");
        assert!(cache.ensure_loaded(&id).is_ok());
        assert_eq!(source.loads.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn waiters_see_the_owners_failure() {
        let (source, cache) = cache();
        source.break_id("clap.wav");
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let cache = cache.clone();
                thread::spawn(move || cache.ensure_loaded(&SampleId::from("clap.wav")).is_err())
            })
            .collect();
        for h in handles {
            assert!(h.join().unwrap());
        }
        assert_eq!(cache.status(&SampleId::from("clap.wav")), SampleStatus::Unloaded);
    }

    #[test]
    fn preload_dedups_and_settles_partial_failure() {
        let (source, cache) = cache();
        source.break_id("bad.wav");
        let ids: Vec<SampleId> = ["kick.wav", "bad.wav", "kick.wav", "", "snare.wav"]
            .into_iter()
            .map(SampleId::from)
            .collect();
        let results = cache.preload(&ids);

        assert_eq!(results.len(), 3);
        assert_eq!(source.loads.load(Ordering::SeqCst), 3);
        for (id, result) in &results {
            assert_eq!(result.is_ok(), id.as_str() != "bad.wav", "{id}");
        }
        assert_eq!(cache.loaded_count(), 2);
    }

    #[test]
    fn empty_ids_are_rejected_without_loading() {
        let (source, cache) = cache();
        assert!(matches!(cache.ensure_loaded(&SampleId::from("")), Err(LoadError::EmptyId)));
        assert!(cache.preload(&[]).is_empty());
        assert_eq!(source.loads.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn clear_forgets_loaded_samples() {
        let (_, cache) = cache();
        cache.ensure_loaded(&SampleId::from("kick.wav")).unwrap();
        cache.clear();
        assert_eq!(cache.status(&SampleId::from("kick.wav")), SampleStatus::Unloaded);
    }

    // Panics on its first load, once `entered` has been signalled and the
    // test has had time to line up a waiter. Later loads succeed.
    struct PanicsFirst {
        loads: AtomicUsize,
        entered: Mutex<Option<std::sync::mpsc::Sender<()>>>,
    }

    impl SampleSource for PanicsFirst {
        fn load(&self, _: &SampleId) -> Result<SampleBuffer, LoadError> {
            if self.loads.fetch_add(1, Ordering::SeqCst) == 0 {
                if let Some(tx) = self.entered.lock().unwrap().take() {
                    tx.send(()).unwrap();
                }
                thread::sleep(Duration::from_millis(100));
                panic!("decoder blew up");
            }
            Ok(SampleBuffer::from_frames(vec![StereoFrame::mono(0.5); 4]))
        }
    }

    #[test]
    fn panicking_loader_leaves_the_id_retryable() {
        let (tx, rx) = std::sync::mpsc::channel();
        let source = Arc::new(PanicsFirst {
            loads: AtomicUsize::new(0),
            entered: Mutex::new(Some(tx)),
        });
        let cache = Arc::new(SampleCache::new(source.clone()));
        let id = SampleId::from("snare.wav");

        let owner = {
            let (cache, id) = (cache.clone(), id.clone());
            thread::spawn(move || cache.ensure_loaded(&id))
        };
        rx.recv().unwrap();
        let waiter = {
            let (cache, id) = (cache.clone(), id.clone());
            thread::spawn(move || cache.ensure_loaded(&id))
        };

        assert!(owner.join().is_err());
        // the waiter either saw the owner's failure or arrived late and loaded it
        let waited = waiter.join().unwrap();
        assert!(matches!(waited, Err(LoadError::Read { .. }) | Ok(_)));
        assert_ne!(cache.status(&id), SampleStatus::Loading);

        assert!(cache.ensure_loaded(&id).is_ok());
        assert_eq!(cache.status(&id), SampleStatus::Loaded);
    }

    #[test]
    fn panicking_loader_on_a_single_thread_unwinds_cleanly() {
        let source = Arc::new(PanicsFirst {
            loads: AtomicUsize::new(0),
            entered: Mutex::new(None),
        });
        let cache = SampleCache::new(source.clone());
        let id = SampleId::from("hat.wav");

        let first = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| cache.ensure_loaded(&id)));
        assert!(first.is_err());
        assert_eq!(cache.status(&id), SampleStatus::Unloaded);

        assert!(cache.ensure_loaded(&id).is_ok());
        assert_eq!(source.loads.load(Ordering::SeqCst), 2);
    }
}
