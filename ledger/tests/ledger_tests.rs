//! Download ledger behaviour over the in-memory store and over LMDB.

use std::sync::Arc;

use proptest::prelude::*;
use shield_ledger::{DownloadLedger, DownloadOutcome, LedgerError};
use shield_nullables::{NullClock, NullStore};
use shield_store::{AccountStore, AssetStore, DownloadStore, ShieldStore};
use shield_store_lmdb::LmdbEnvironment;
use shield_types::{AssetId, ContentRef, NewAsset, Points, UserId};

const U1: UserId = UserId::new(1);
const U2: UserId = UserId::new(2);

fn publish<S: ShieldStore>(store: &S, owner: UserId, price: u64) -> AssetId {
    let n = store.asset_count().unwrap();
    let name = format!("image-{n}.png");
    store
        .insert_asset(NewAsset {
            content: ContentRef::join("uploads/images", &name).unwrap(),
            original: ContentRef::join("uploads/original", &name).unwrap(),
            mark_descriptor: Some(ContentRef::join("uploads/meta", &name).unwrap()),
            caption: String::new(),
            category: "nature".into(),
            price: Points::new(price),
            owner,
            created_at: shield_types::Timestamp::EPOCH,
        })
        .unwrap()
        .id
}

fn ledger<S: ShieldStore>(store: Arc<S>) -> DownloadLedger<S> {
    DownloadLedger::new(store, Arc::new(NullClock::default()))
}

fn balance<S: ShieldStore>(store: &S, user: UserId) -> u64 {
    store.get_balance(user).unwrap().get()
}

#[test]
fn charge_then_repeat() {
    let store = Arc::new(NullStore::with_balances(&[(1, 0), (2, 100)]));
    let a = publish(store.as_ref(), U1, 50);
    let ledger = ledger(store.clone());

    let grant = ledger.download(U2, a).unwrap();
    assert_eq!(grant.outcome, DownloadOutcome::Charged { price: Points::new(50) });
    assert_eq!(grant.content.as_str(), "uploads/images/image-0.png");
    assert_eq!(balance(store.as_ref(), U2), 50);
    assert_eq!(balance(store.as_ref(), U1), 50);
    assert_eq!(store.downloads_for_user(U2).unwrap().len(), 1);

    for _ in 0..3 {
        let grant = ledger.download(U2, a).unwrap();
        assert_eq!(grant.outcome, DownloadOutcome::AlreadyDownloaded);
        assert_eq!(grant.outcome.points_spent(), Points::ZERO);
    }
    assert_eq!(balance(store.as_ref(), U2), 50);
    assert_eq!(balance(store.as_ref(), U1), 50);
    assert_eq!(store.download_count().unwrap(), 1);
}

#[test]
fn owner_downloads_are_free_and_untracked() {
    let store = Arc::new(NullStore::with_balances(&[(1, 7)]));
    let a = publish(store.as_ref(), U1, 50);
    let ledger = ledger(store.clone());

    for _ in 0..5 {
        assert_eq!(ledger.download(U1, a).unwrap().outcome, DownloadOutcome::OwnerFreeAccess);
    }
    assert_eq!(balance(store.as_ref(), U1), 7);
    assert_eq!(store.download_count().unwrap(), 0);
}

#[test]
fn missing_asset_is_reported_first() {
    let store = Arc::new(NullStore::new());
    let err = ledger(store).download(U2, AssetId::new(9)).unwrap_err();
    assert!(matches!(err, LedgerError::AssetNotFound(id) if id == AssetId::new(9)));
}

#[test]
fn insufficient_balance_changes_nothing() {
    let store = Arc::new(NullStore::with_balances(&[(1, 0), (2, 49)]));
    let a = publish(store.as_ref(), U1, 50);
    let err = ledger(store.clone()).download(U2, a).unwrap_err();
    assert!(matches!(
        err,
        LedgerError::InsufficientBalance { needed, available }
            if needed == Points::new(50) && available == Points::new(49)
    ));
    assert_eq!(balance(store.as_ref(), U2), 49);
    assert_eq!(balance(store.as_ref(), U1), 0);
    assert_eq!(store.download_count().unwrap(), 0);
}

#[test]
fn missing_accounts_are_reported() {
    let store = Arc::new(NullStore::with_balances(&[(2, 100)]));
    let a = publish(store.as_ref(), U1, 10);
    let ledger = ledger(store.clone());

    let err = ledger.download(UserId::new(3), a).unwrap_err();
    assert!(matches!(err, LedgerError::AccountNotFound(u) if u == UserId::new(3)));

    let err = ledger.download(U2, a).unwrap_err();
    assert!(matches!(err, LedgerError::AccountNotFound(u) if u == U1));
    assert_eq!(balance(store.as_ref(), U2), 100);
}

#[test]
fn zero_price_is_recorded() {
    let store = Arc::new(NullStore::with_balances(&[(1, 0), (2, 0)]));
    let a = publish(store.as_ref(), U1, 0);
    let ledger = ledger(store.clone());
    assert_eq!(
        ledger.download(U2, a).unwrap().outcome,
        DownloadOutcome::Charged { price: Points::ZERO }
    );
    assert_eq!(store.download_count().unwrap(), 1);
}

#[test]
fn open_and_credit_accounts() {
    let store = Arc::new(NullStore::new());
    let ledger = ledger(store);
    assert!(matches!(
        ledger.credit(U2, Points::new(5)),
        Err(LedgerError::AccountNotFound(_))
    ));
    assert_eq!(ledger.open_account(U2).unwrap(), Points::ZERO);
    assert_eq!(ledger.credit(U2, Points::new(5)).unwrap(), Points::new(5));
    assert_eq!(ledger.open_account(U2).unwrap(), Points::new(5));
    assert_eq!(ledger.balance(U2).unwrap(), Points::new(5));
    assert_eq!(ledger.total_points().unwrap(), Points::new(5));
}

#[test]
fn concurrent_duplicates_on_lmdb_charge_once() {
    let dir = tempfile::tempdir().unwrap();
    let env = LmdbEnvironment::open(dir.path(), 8, 16 * 1024 * 1024).unwrap();
    env.put_balance(U1, Points::ZERO).unwrap();
    env.put_balance(U2, Points::new(100)).unwrap();
    let a = publish(&env, U1, 50);
    let ledger = Arc::new(ledger(Arc::new(env)));

    let outcomes: Vec<DownloadOutcome> = std::thread::scope(|s| {
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let ledger = Arc::clone(&ledger);
                s.spawn(move || ledger.download(U2, a).unwrap().outcome)
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let charged = outcomes
        .iter()
        .filter(|o| matches!(o, DownloadOutcome::Charged { .. }))
        .count();
    assert_eq!(charged, 1);
    assert_eq!(ledger.balance(U2).unwrap(), Points::new(50));
    assert_eq!(ledger.balance(U1).unwrap(), Points::new(50));
}

#[test]
fn concurrent_purchases_never_overdraw() {
    let dir = tempfile::tempdir().unwrap();
    let env = LmdbEnvironment::open(dir.path(), 8, 16 * 1024 * 1024).unwrap();
    env.put_balance(U1, Points::ZERO).unwrap();
    env.put_balance(U2, Points::new(100)).unwrap();
    let assets: Vec<AssetId> = (0..6).map(|_| publish(&env, U1, 30)).collect();
    let ledger = Arc::new(ledger(Arc::new(env)));

    let results: Vec<bool> = std::thread::scope(|s| {
        let handles: Vec<_> = assets
            .iter()
            .map(|&a| {
                let ledger = Arc::clone(&ledger);
                s.spawn(move || ledger.download(U2, a).is_ok())
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert_eq!(results.iter().filter(|ok| **ok).count(), 3);
    assert_eq!(ledger.balance(U2).unwrap(), Points::new(10));
    assert_eq!(ledger.total_points().unwrap(), Points::new(100));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// No sequence of downloads changes the total number of points.
    #[test]
    fn downloads_conserve_points(
        balances in prop::collection::vec(0u64..200, 4),
        prices in prop::collection::vec(0u64..80, 1..6),
        requests in prop::collection::vec((0usize..4, 0usize..6), 0..30),
    ) {
        let seed: Vec<(u64, u64)> = balances
            .iter()
            .enumerate()
            .map(|(i, b)| (i as u64 + 1, *b))
            .collect();
        let store = Arc::new(NullStore::with_balances(&seed));
        let assets: Vec<AssetId> = prices
            .iter()
            .enumerate()
            .map(|(i, p)| publish(store.as_ref(), UserId::new((i % 4) as u64 + 1), *p))
            .collect();
        let ledger = ledger(store.clone());
        let before = ledger.total_points().unwrap();

        for (user, asset) in requests {
            let Some(asset) = assets.get(asset) else { continue };
            let _ = ledger.download(UserId::new(user as u64 + 1), *asset);
            prop_assert_eq!(ledger.total_points().unwrap(), before);
        }
        prop_assert!(store.download_count().unwrap() <= (4 * assets.len()) as u64);
    }
}
