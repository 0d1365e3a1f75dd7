//! Concurrency tests for the click aggregator
//!
//! The single-writer actor must never lose an update, no matter how many
//! clients click at once.

use oiia::aggregator::{ClickAggregator, CounterStore};
use oiia::countries::CountryCode;

fn code(s: &str) -> CountryCode {
    s.parse().unwrap()
}

#[tokio::test]
async fn concurrent_clicks_for_one_country_are_all_counted() {
    let aggregator = ClickAggregator::spawn(CounterStore::new(), 10);

    let mut handles = vec![];
    for _ in 0..100 {
        let aggregator = aggregator.clone();
        handles.push(tokio::spawn(async move {
            aggregator.record_click(code("KR")).await
        }));
    }

    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let snapshot = aggregator.snapshot().await.unwrap();
    assert_eq!(snapshot.total_clicks, 100, "Should have exactly 100 clicks");
    assert_eq!(snapshot.entries[0].country, code("KR"));
    assert_eq!(snapshot.entries[0].clicks, 100);
}

#[tokio::test]
async fn concurrent_clicks_across_countries_keep_the_invariant() {
    let aggregator = ClickAggregator::spawn(CounterStore::new(), 10);

    let mut handles = vec![];
    for i in 0..120 {
        let aggregator = aggregator.clone();
        let country = match i % 3 {
            0 => code("KR"),
            1 => code("US"),
            _ => code("DE"),
        };
        handles.push(tokio::spawn(
            async move { aggregator.record_click(country).await },
        ));
    }

    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let snapshot = aggregator.snapshot().await.unwrap();
    assert_eq!(snapshot.total_clicks, 120);
    assert_eq!(snapshot.participating_countries, 3);

    let sum: u64 = snapshot.entries.iter().map(|e| e.clicks).sum();
    assert_eq!(sum, 120, "per-country counts must add up to the total");
    for entry in &snapshot.entries {
        assert_eq!(entry.clicks, 40);
    }
}

#[tokio::test]
async fn ranking_scenario_matches_click_order() {
    let aggregator = ClickAggregator::spawn(CounterStore::new(), 10);

    for _ in 0..3 {
        aggregator.record_click(code("KR")).await.unwrap();
    }
    aggregator.record_click(code("US")).await.unwrap();

    let snapshot = aggregator.snapshot().await.unwrap();
    assert_eq!(snapshot.total_clicks, 4);
    assert_eq!(snapshot.participating_countries, 2);
    assert_eq!(snapshot.entries[0].country, code("KR"));
    assert_eq!(snapshot.entries[0].clicks, 3);
    assert_eq!(snapshot.entries[1].country, code("US"));
    assert_eq!(snapshot.entries[1].clicks, 1);
}

#[tokio::test]
async fn ranking_is_non_increasing_with_deterministic_ties() {
    let aggregator = ClickAggregator::spawn(CounterStore::new(), 10);

    // US and DE tie at 2 clicks each; DE must sort first by code
    for country in ["KR", "KR", "KR", "US", "US", "DE", "DE"] {
        aggregator.record_click(code(country)).await.unwrap();
    }

    let snapshot = aggregator.snapshot().await.unwrap();
    let clicks: Vec<u64> = snapshot.entries.iter().map(|e| e.clicks).collect();
    let mut sorted = clicks.clone();
    sorted.sort_unstable_by(|a, b| b.cmp(a));
    assert_eq!(clicks, sorted, "entries must be non-increasing");

    assert_eq!(snapshot.entries[1].country, code("DE"));
    assert_eq!(snapshot.entries[2].country, code("US"));
}
