use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use jpaddr::provider::{LookupProvider, TownScope};
use jpaddr::records::{
    CityInfo, CityKey, ParcelInfo, PrefInfo, RsdtBlkInfo, RsdtBlkKey, RsdtDspInfo, TownInfo,
    TownKey,
};
use jpaddr::{
    CancelToken, GeocodeError, GeocoderConfig, InMemoryProvider, MatchLevel, Result, WorkerPool,
};

/// Demo data whose block lookup misbehaves for a few block numbers.
struct FaultyProvider {
    inner: InMemoryProvider,
    fail_startup: bool,
    slow: Duration,
}

impl FaultyProvider {
    fn new() -> Self {
        Self {
            inner: InMemoryProvider::demo(),
            fail_startup: false,
            slow: Duration::from_millis(500),
        }
    }
}

impl LookupProvider for FaultyProvider {
    fn prefectures(&self) -> Result<Vec<PrefInfo>> {
        if self.fail_startup {
            return Err(GeocodeError::Provider("database offline".into()));
        }
        self.inner.prefectures()
    }

    fn county_and_cities(&self) -> Result<Vec<CityInfo>> {
        self.inner.county_and_cities()
    }

    fn city_and_wards(&self) -> Result<Vec<CityInfo>> {
        self.inner.city_and_wards()
    }

    fn ward_and_oaza(&self) -> Result<Vec<TownInfo>> {
        self.inner.ward_and_oaza()
    }

    fn tokyo23_wards(&self) -> Result<Vec<CityInfo>> {
        self.inner.tokyo23_wards()
    }

    fn tokyo23_towns(&self) -> Result<Vec<TownInfo>> {
        self.inner.tokyo23_towns()
    }

    fn oaza_chomes(&self, scope: &TownScope) -> Result<Vec<TownInfo>> {
        self.inner.oaza_chomes(scope)
    }

    fn rsdt_blks(&self, town_key: TownKey, blk_num: Option<&str>) -> Result<Vec<RsdtBlkInfo>> {
        match blk_num {
            Some("500") => Err(GeocodeError::Provider("blk table locked".into())),
            Some("666") => panic!("corrupt block row"),
            Some("999") => {
                thread::sleep(self.slow);
                self.inner.rsdt_blks(town_key, blk_num)
            }
            _ => self.inner.rsdt_blks(town_key, blk_num),
        }
    }

    fn rsdt_dsps(&self, rsdtblk_key: RsdtBlkKey) -> Result<Vec<RsdtDspInfo>> {
        self.inner.rsdt_dsps(rsdtblk_key)
    }

    fn parcels(
        &self,
        city_key: CityKey,
        town_key: Option<TownKey>,
        prc_id: &str,
    ) -> Result<Vec<ParcelInfo>> {
        self.inner.parcels(city_key, town_key, prc_id)
    }
}

fn config(workers: usize) -> GeocoderConfig {
    let mut config = GeocoderConfig::default();
    config.base.workers = workers;
    config.base.ping_timeout_ms = 5000;
    config
}

fn pool(workers: usize) -> WorkerPool {
    WorkerPool::new(config(workers), Arc::new(FaultyProvider::new())).unwrap()
}

const INPUTS: [&str; 6] = [
    "東京都千代田区紀尾井町1-3",
    "福島市杉妻町2-16",
    "hello",
    "神奈川県中区本町1-1-1",
    "京都市中京区",
    "西多摩郡瑞穂町大字箱根ヶ崎2335",
];

#[test]
fn batch_results_follow_input_order() {
    let mut pool = pool(3);
    assert_eq!(pool.workers().len(), 3);
    let inputs: Vec<&str> = INPUTS.iter().cycle().take(30).copied().collect();
    let results = pool.run_batch(&inputs, &CancelToken::new());
    assert_eq!(results.len(), inputs.len());
    for (input, result) in inputs.iter().zip(&results) {
        let r = result.as_ref().unwrap();
        assert_eq!(r.input, *input);
    }
    assert_eq!(results[0].as_ref().unwrap().match_level, MatchLevel::ResidentialDetail);
    assert_eq!(results[2].as_ref().unwrap().match_level, MatchLevel::Unknown);
    assert_eq!(pool.ring().held(), 0);
    assert_eq!(pool.pending(), 0);
}

#[test]
fn oversized_payloads_travel_inline() {
    let mut config = config(2);
    config.base.slot_capacity = 8;
    let mut pool = WorkerPool::new(config, Arc::new(FaultyProvider::new())).unwrap();
    let results = pool.run_batch(INPUTS, &CancelToken::new());
    assert!(results.iter().all(|r| r.is_ok()));
    assert_eq!(results[1].as_ref().unwrap().match_level, MatchLevel::Parcel);
    assert_eq!(pool.ring().held(), 0);
}

#[test]
fn consecutive_batches_reuse_the_pool() {
    let mut pool = pool(2);
    let first = pool.run_batch(["東京都千代田区紀尾井町1-3"], &CancelToken::new());
    let second = pool.run_batch(["京都市中京区", "hello"], &CancelToken::new());
    assert_eq!(first.len(), 1);
    assert_eq!(second.len(), 2);
    assert_eq!(second[0].as_ref().unwrap().match_level, MatchLevel::Ward);
}

#[test]
fn provider_error_fails_only_its_task() {
    let mut pool = pool(1);
    let results = pool.run_batch(
        ["東京都千代田区紀尾井町500", "東京都千代田区紀尾井町1-3"],
        &CancelToken::new(),
    );
    assert!(matches!(results[0], Err(GeocodeError::Provider(_))));
    assert!(results[1].is_ok());
}

#[test]
fn panicking_task_is_reported_and_worker_survives() {
    let mut pool = pool(1);
    let results = pool.run_batch(
        ["東京都千代田区紀尾井町666", "東京都千代田区紀尾井町1-3"],
        &CancelToken::new(),
    );
    match &results[0] {
        Err(GeocodeError::WorkerPanicked(msg)) => assert!(msg.contains("corrupt block row")),
        other => panic!("unexpected result: {:?}", other),
    }
    assert_eq!(
        results[1].as_ref().unwrap().match_level,
        MatchLevel::ResidentialDetail
    );
    assert_eq!(pool.workers(), vec![0]);
}

#[test]
fn cancelled_before_start_submits_nothing() {
    let mut pool = pool(1);
    let cancel = CancelToken::new();
    cancel.cancel();
    let results = pool.run_batch(INPUTS, &cancel);
    assert_eq!(results.len(), INPUTS.len());
    assert!(results.iter().all(|r| matches!(r, Err(GeocodeError::Cancelled))));
    assert_eq!(pool.in_flight(), 0);
}

#[test]
fn cancel_abandons_in_flight_tasks() {
    let mut pool = pool(1);
    let cancel = CancelToken::new();
    let trigger = {
        let cancel = cancel.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(100));
            cancel.cancel();
        })
    };
    let results = pool.run_batch(
        ["東京都千代田区紀尾井町999", "東京都千代田区紀尾井町1-3"],
        &cancel,
    );
    trigger.join().unwrap();
    assert_eq!(results.len(), 2);
    assert!(results.iter().all(|r| matches!(r, Err(GeocodeError::Cancelled))));
    assert_eq!(pool.in_flight(), 0);
    assert_eq!(pool.ring().held(), 0);
}

#[test]
fn unresponsive_worker_is_replaced() {
    let mut pool = pool(1);
    pool.submit(1, "東京都千代田区紀尾井町999").unwrap();
    thread::sleep(Duration::from_millis(50));

    let dead = pool.health_check(Duration::from_millis(100));
    assert_eq!(dead, vec![0]);
    assert_eq!(pool.workers(), vec![1]);

    let (id, result) = pool.recv().unwrap();
    assert_eq!(id, 1);
    assert!(matches!(result, Err(GeocodeError::WorkerUnavailable(_))));
    assert!(pool.recv().is_none());
    assert_eq!(pool.ring().held(), 0);

    pool.submit(2, "京都市中京区").unwrap();
    let (id, result) = pool.recv().unwrap();
    assert_eq!(id, 2);
    assert_eq!(result.unwrap().match_level, MatchLevel::Ward);
    assert_eq!(pool.ring().held(), 0);
}

#[test]
fn hung_worker_holding_the_only_slot_is_reclaimed() {
    let mut config = config(1);
    config.base.semaphore_slots = 1;
    config.base.inflight_multiplier = 3;
    config.base.ping_timeout_ms = 200;
    let provider = FaultyProvider {
        slow: Duration::from_secs(3),
        ..FaultyProvider::new()
    };
    let mut pool = WorkerPool::new(config, Arc::new(provider)).unwrap();
    assert_eq!(pool.ring().slots(), 1);

    // Task 1 hangs the worker; task 2 then waits in the only slot.
    pool.submit(1, "東京都千代田区紀尾井町999").unwrap();
    thread::sleep(Duration::from_millis(50));
    pool.submit(2, "京都市中京区").unwrap();
    assert_eq!(pool.ring().held(), 1);

    // No free slot: the payload goes inline instead of blocking.
    let started = Instant::now();
    pool.submit(3, "京都市中京区").unwrap();
    assert!(started.elapsed() < Duration::from_secs(1));
    assert_eq!(pool.ring().held(), 1);

    // The in-flight bound is reached, so this submit runs a health check,
    // replaces the hung worker and frees its slot.
    pool.submit(4, "京都市中京区").unwrap();
    assert!(started.elapsed() < Duration::from_secs(2));
    assert_eq!(pool.workers(), vec![1]);

    let mut results = Vec::new();
    while let Some(done) = pool.recv() {
        results.push(done);
    }
    results.sort_by_key(|(id, _)| *id);
    let ids: Vec<u64> = results.iter().map(|(id, _)| *id).collect();
    assert_eq!(ids, vec![1, 2, 3, 4]);
    for (_, result) in &results[..3] {
        assert!(matches!(result, Err(GeocodeError::WorkerUnavailable(_))));
    }
    assert_eq!(results[3].1.as_ref().unwrap().match_level, MatchLevel::Ward);
    assert_eq!(pool.ring().held(), 0);
}

#[test]
fn batch_leaves_earlier_submissions_to_recv() {
    let mut pool = pool(2);
    pool.submit(0, "京都市中京区").unwrap();
    pool.submit(1000, "福島市杉妻町2-16").unwrap();

    let results = pool.run_batch(
        ["東京都千代田区紀尾井町1-3", "hello"],
        &CancelToken::new(),
    );
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].as_ref().unwrap().input, "東京都千代田区紀尾井町1-3");
    assert_eq!(results[1].as_ref().unwrap().input, "hello");

    assert_eq!(pool.pending(), 2);
    let mut rest = Vec::new();
    while let Some((id, result)) = pool.recv() {
        rest.push((id, result.unwrap().match_level));
    }
    rest.sort_by_key(|(id, _)| *id);
    assert_eq!(rest, vec![(0, MatchLevel::Ward), (1000, MatchLevel::Parcel)]);
}

#[test]
fn cancel_spares_earlier_submissions() {
    let mut pool = pool(1);
    pool.submit(1000, "京都市中京区").unwrap();
    let cancel = CancelToken::new();
    cancel.cancel();
    let results = pool.run_batch(["東京都千代田区紀尾井町1-3"], &cancel);
    assert!(matches!(results[0], Err(GeocodeError::Cancelled)));
    let (id, result) = pool.recv().unwrap();
    assert_eq!(id, 1000);
    assert!(result.is_ok());
}

#[test]
fn healthy_workers_answer_pings() {
    let mut pool = pool(2);
    assert!(pool.health_check(Duration::from_secs(2)).is_empty());
    assert_eq!(pool.workers(), vec![0, 1]);
}

#[test]
fn duplicate_task_id_is_rejected() {
    let mut pool = pool(1);
    pool.submit(7, "東京都千代田区紀尾井町999").unwrap();
    assert!(matches!(pool.submit(7, "京都市中京区"), Err(GeocodeError::Config(_))));
    let (id, result) = pool.recv().unwrap();
    assert_eq!(id, 7);
    assert!(result.is_ok());
}

#[test]
fn startup_failure_is_reported() {
    let provider = FaultyProvider {
        fail_startup: true,
        ..FaultyProvider::new()
    };
    match WorkerPool::new(config(2), Arc::new(provider)) {
        Err(GeocodeError::WorkerUnavailable(msg)) => assert!(msg.contains("database offline")),
        Err(e) => panic!("unexpected error: {}", e),
        Ok(_) => panic!("pool started without dictionaries"),
    }
}
