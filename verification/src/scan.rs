//! Lazy, paged iteration over the candidate registry.

use std::collections::VecDeque;
use std::sync::Arc;

use shield_store::{CandidateRegistry, StoreError};
use shield_types::{AssetId, Candidate};

/// Finite, non-restartable sequence of candidates in ascending id order.
///
/// Pages are fetched from the registry only when the previous one is used
/// up, so a consumer that stops at the first match never reads the rest of
/// the corpus. Registry reads are blocking and run on the blocking pool.
/// After a registry error the scan yields nothing more.
pub struct CandidateScan<R: ?Sized> {
    registry: Arc<R>,
    page_size: usize,
    cursor: Option<AssetId>,
    buffered: VecDeque<Candidate>,
    finished: bool,
}

impl<R: CandidateRegistry + Send + Sync + ?Sized + 'static> CandidateScan<R> {
    pub fn new(registry: Arc<R>, page_size: usize) -> Self {
        Self {
            registry,
            page_size: page_size.max(1),
            cursor: None,
            buffered: VecDeque::new(),
            finished: false,
        }
    }

    async fn fill(&mut self) -> Result<(), StoreError> {
        let registry = Arc::clone(&self.registry);
        let (cursor, limit) = (self.cursor, self.page_size);
        let page = tokio::task::spawn_blocking(move || registry.candidates_after(cursor, limit))
            .await
            .map_err(|e| StoreError::Backend(format!("registry read task failed: {e}")))??;
        if page.len() < self.page_size {
            self.finished = true;
        }
        if let Some(last) = page.last() {
            self.cursor = Some(last.id);
        }
        self.buffered.extend(page);
        Ok(())
    }

    /// The next candidate, or `None` once the registry is exhausted.
    pub async fn next_candidate(&mut self) -> Option<Result<Candidate, StoreError>> {
        if self.buffered.is_empty() && !self.finished {
            if let Err(e) = self.fill().await {
                self.finished = true;
                return Some(Err(e));
            }
        }
        self.buffered.pop_front().map(Ok)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    use shield_types::ContentRef;

    /// Registry over ids `1..=count`, counting page reads.
    struct Numbered {
        count: u64,
        reads: AtomicU32,
        fail_after: Option<u32>,
    }

    impl Numbered {
        fn new(count: u64) -> Self {
            Self { count, reads: AtomicU32::new(0), fail_after: None }
        }
    }

    fn candidate(id: u64) -> Candidate {
        let name = format!("{id}.png");
        Candidate {
            id: AssetId::new(id),
            content: ContentRef::join("uploads/images", &name).unwrap(),
            original: ContentRef::join("uploads/original", &name).unwrap(),
            mark_descriptor: ContentRef::join("uploads/meta", &name).unwrap(),
        }
    }

    impl CandidateRegistry for Numbered {
        fn candidates_after(
            &self,
            cursor: Option<AssetId>,
            limit: usize,
        ) -> Result<Vec<Candidate>, StoreError> {
            let reads = self.reads.fetch_add(1, Ordering::SeqCst);
            if self.fail_after.is_some_and(|n| reads >= n) {
                return Err(StoreError::Backend("registry offline".into()));
            }
            let start = cursor.map_or(1, |c| c.get() + 1);
            Ok((start..=self.count).take(limit).map(candidate).collect())
        }

        fn candidate_count(&self) -> Result<u64, StoreError> {
            Ok(self.count)
        }
    }

    async fn drain(scan: &mut CandidateScan<Numbered>, max: usize) -> Vec<Result<Candidate, StoreError>> {
        let mut items = Vec::new();
        while items.len() < max {
            match scan.next_candidate().await {
                Some(item) => items.push(item),
                None => break,
            }
        }
        items
    }

    #[tokio::test]
    async fn yields_every_candidate_in_order() {
        let registry = Arc::new(Numbered::new(7));
        let mut scan = CandidateScan::new(Arc::clone(&registry), 3);
        let ids: Vec<u64> = drain(&mut scan, usize::MAX)
            .await
            .into_iter()
            .map(|c| c.unwrap().id.get())
            .collect();
        assert_eq!(ids, (1..=7).collect::<Vec<_>>());
        assert_eq!(registry.reads.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn stopping_early_reads_only_needed_pages() {
        let registry = Arc::new(Numbered::new(100));
        let mut scan = CandidateScan::new(Arc::clone(&registry), 10);
        assert_eq!(drain(&mut scan, 4).await.len(), 4);
        assert_eq!(registry.reads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn empty_registry_yields_nothing() {
        let mut scan = CandidateScan::new(Arc::new(Numbered::new(0)), 8);
        assert!(scan.next_candidate().await.is_none());
    }

    #[tokio::test]
    async fn registry_error_ends_the_scan() {
        let mut registry = Numbered::new(10);
        registry.fail_after = Some(1);
        let mut scan = CandidateScan::new(Arc::new(registry), 4);
        let items = drain(&mut scan, usize::MAX).await;
        assert_eq!(items.len(), 5);
        assert!(items[..4].iter().all(|r| r.is_ok()));
        assert!(items[4].is_err());
    }
}
