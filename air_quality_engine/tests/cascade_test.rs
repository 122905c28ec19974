mod common;
use common::{
    FailingProvider, HangingLocator, HangingProvider, HangingWeather, PanickingProvider,
    StaticProvider, clock, descriptor, paris,
};

use std::sync::{Arc, atomic::Ordering};
use std::time::Duration;

use air_data_ingestor::{ConcentrationUnit, Coordinate, Pollutant};
use air_quality_engine::{
    ReadingOrigin,
    cascade::{
        AttemptOutcome, CascadeResolver, Coverage, DispatchMode, ProviderClass, ProviderRegistry,
        RegionProfile, Resolution, estimator::ESTIMATOR_SOURCE,
    },
    confidence::ConfidenceBand,
};

fn chicago() -> Coordinate {
    Coordinate::new(41.88, -87.63).unwrap()
}

fn outcome_of(resolution: &Resolution, provider: &str) -> AttemptOutcome {
    resolution
        .attempts
        .iter()
        .find(|a| a.provider == provider)
        .map(|a| a.outcome.clone())
        .unwrap_or_else(|| panic!("no attempt recorded for {provider}"))
}

#[tokio::test]
async fn satellite_skipped_outside_its_box() {
    let sat = StaticProvider::new("sat", &[(Pollutant::No2, 40.0)]);
    let sat_calls = sat.calls();
    let registry = ProviderRegistry::new()
        .with(descriptor("sat", ProviderClass::Satellite, sat))
        .with(descriptor(
            "ground",
            ProviderClass::GroundNetwork,
            StaticProvider::new("ground", &[(Pollutant::Pm25, 12.0)]),
        ));
    let resolver = CascadeResolver::new(registry, clock());

    let resolution = resolver.resolve_detailed(Coordinate::new(10.0, 0.0).unwrap()).await;

    assert_eq!(outcome_of(&resolution, "sat"), AttemptOutcome::SkippedCoverage);
    assert_eq!(sat_calls.load(Ordering::SeqCst), 0);
    assert_eq!(outcome_of(&resolution, "ground"), AttemptOutcome::Contributed(1));
    assert_eq!(resolution.reading.sources_used.iter().collect::<Vec<_>>(), ["ground"]);
    assert_eq!(resolution.reading.origin, ReadingOrigin::Measured);
}

#[tokio::test]
async fn satellite_class_is_gated_without_explicit_coverage() {
    let sat = StaticProvider::new("sat", &[(Pollutant::No2, 40.0)]);
    let sat_calls = sat.calls();
    let wide = StaticProvider::new("wide", &[(Pollutant::O3, 70.0)]);
    let wide_calls = wide.calls();
    let registry = ProviderRegistry::new()
        .with(descriptor("sat", ProviderClass::Satellite, sat))
        .with(descriptor("wide", ProviderClass::Satellite, wide).with_coverage(Coverage::Global));
    let resolver = CascadeResolver::new(registry, clock());

    let resolution = resolver.resolve_detailed(Coordinate::new(10.0, 0.0).unwrap()).await;

    assert_eq!(outcome_of(&resolution, "sat"), AttemptOutcome::SkippedCoverage);
    assert_eq!(outcome_of(&resolution, "wide"), AttemptOutcome::SkippedCoverage);
    assert_eq!(sat_calls.load(Ordering::SeqCst) + wide_calls.load(Ordering::SeqCst), 0);
    assert_eq!(
        resolution.reading.sources_used.iter().collect::<Vec<_>>(),
        [ESTIMATOR_SOURCE]
    );
}

#[tokio::test]
async fn specialist_overrides_earlier_provider() {
    let registry = ProviderRegistry::new()
        .with(descriptor(
            "ground",
            ProviderClass::GroundNetwork,
            StaticProvider::new("ground", &[(Pollutant::Pm25, 12.0), (Pollutant::No2, 30.0)]),
        ))
        .with(
            descriptor(
                "sat",
                ProviderClass::Satellite,
                StaticProvider::new("sat", &[(Pollutant::No2, 40.0)]),
            )
            .with_specialty([Pollutant::No2]),
        );
    let resolver = CascadeResolver::new(registry, clock());

    let resolution = resolver.resolve_detailed(chicago()).await;
    let reading = &resolution.reading;

    assert_eq!(reading.pollutants.value(Pollutant::Pm25), Some(12.0));
    assert_eq!(reading.pollutants.value(Pollutant::No2), Some(40.0));
    assert_eq!(reading.pollutants.get(Pollutant::No2).unwrap().source, "sat");
    assert_eq!(outcome_of(&resolution, "ground"), AttemptOutcome::Contributed(1));
    assert_eq!(outcome_of(&resolution, "sat"), AttemptOutcome::Contributed(1));
    assert_eq!(reading.sources_used.iter().collect::<Vec<_>>(), ["ground", "sat"]);
    // specialty 40 + ground 30 + two key pollutants 20
    assert_eq!(reading.confidence.score, 90);
    assert_eq!(reading.confidence.band, ConfidenceBand::VeryHigh);
}

#[tokio::test]
async fn provider_with_nothing_left_is_superseded() {
    let registry = ProviderRegistry::new()
        .with(descriptor(
            "ground",
            ProviderClass::GroundNetwork,
            StaticProvider::new("ground", &[(Pollutant::Pm25, 12.0)]),
        ))
        .with(descriptor(
            "model",
            ProviderClass::Model,
            StaticProvider::new("model", &[(Pollutant::Pm25, 30.0)]),
        ));
    let resolver = CascadeResolver::new(registry, clock());

    let resolution = resolver.resolve_detailed(chicago()).await;

    assert_eq!(outcome_of(&resolution, "model"), AttemptOutcome::Superseded);
    assert_eq!(resolution.reading.sources_used.len(), 1);
    assert_eq!(resolution.reading.pollutants.value(Pollutant::Pm25), Some(12.0));
}

#[tokio::test]
async fn units_are_normalized_before_merging() {
    let registry = ProviderRegistry::new().with(descriptor(
        "ground",
        ProviderClass::GroundNetwork,
        StaticProvider::with_units(
            "ground",
            &[(Pollutant::Co, 1000.0, ConcentrationUnit::MicrogramsPerCubicMeter)],
        ),
    ));
    let resolver = CascadeResolver::new(registry, clock());

    let reading = resolver.resolve(chicago()).await;
    let co = reading.pollutants.get(Pollutant::Co).unwrap();
    assert_eq!(co.unit, ConcentrationUnit::MilligramsPerCubicMeter);
    assert!((co.value - 1.0).abs() < 1e-9);
}

#[tokio::test(start_paused = true)]
async fn hung_provider_times_out_without_blocking_others() {
    let registry = ProviderRegistry::new()
        .with(
            descriptor("stuck", ProviderClass::GroundNetwork, HangingProvider)
                .with_timeout(Duration::from_millis(200)),
        )
        .with(descriptor(
            "model",
            ProviderClass::Model,
            StaticProvider::new("model", &[(Pollutant::O3, 60.0)]),
        ));
    let resolver = CascadeResolver::new(registry, clock());

    let resolution = resolver.resolve_detailed(chicago()).await;

    assert_eq!(outcome_of(&resolution, "stuck"), AttemptOutcome::TimedOut);
    assert_eq!(outcome_of(&resolution, "model"), AttemptOutcome::Contributed(1));
    assert_eq!(resolution.reading.pollutants.value(Pollutant::O3), Some(60.0));
}

#[tokio::test(start_paused = true)]
async fn outer_deadline_keeps_partial_results() {
    let registry = ProviderRegistry::new()
        .with(descriptor(
            "ground",
            ProviderClass::GroundNetwork,
            StaticProvider::new("ground", &[(Pollutant::Pm25, 12.0)]),
        ))
        .with(descriptor(
            "slow-model",
            ProviderClass::Model,
            StaticProvider::new("slow-model", &[(Pollutant::No2, 30.0)])
                .delayed(Duration::from_secs(5)),
        ));
    let resolver =
        CascadeResolver::new(registry, clock()).with_outer_deadline(Duration::from_secs(1));

    let started = tokio::time::Instant::now();
    let resolution = resolver.resolve_detailed(chicago()).await;

    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(outcome_of(&resolution, "ground"), AttemptOutcome::Contributed(1));
    assert_eq!(outcome_of(&resolution, "slow-model"), AttemptOutcome::DeadlineExceeded);
    assert!(!resolution.reading.pollutants.contains(Pollutant::No2));
    assert_eq!(resolution.reading.origin, ReadingOrigin::Measured);
}

#[tokio::test(start_paused = true)]
async fn slow_lookups_do_not_outlive_the_outer_deadline() {
    let registry = ProviderRegistry::new().with(descriptor(
        "ground",
        ProviderClass::GroundNetwork,
        StaticProvider::new("ground", &[(Pollutant::Pm25, 12.0)]),
    ));
    let resolver = CascadeResolver::new(registry, clock())
        .with_outer_deadline(Duration::from_secs(1))
        .with_weather(Arc::new(HangingWeather), Duration::from_secs(30))
        .with_locator(Arc::new(HangingLocator), Duration::from_secs(30));

    let started = tokio::time::Instant::now();
    let resolution = resolver.resolve_detailed(chicago()).await;

    assert!(started.elapsed() <= Duration::from_secs(1));
    assert_eq!(outcome_of(&resolution, "ground"), AttemptOutcome::Contributed(1));
    assert!(resolution.reading.weather.is_none());
    assert_eq!(resolution.reading.location_name, "Location 41.880, -87.630");
}

#[tokio::test]
async fn panicking_adapter_is_contained() {
    for dispatch in [DispatchMode::Concurrent, DispatchMode::Sequential] {
        let registry = ProviderRegistry::new()
            .with(descriptor("broken", ProviderClass::GroundNetwork, PanickingProvider))
            .with(descriptor(
                "model",
                ProviderClass::Model,
                StaticProvider::new("model", &[(Pollutant::Pm25, 20.0)]),
            ));
        let resolver = CascadeResolver::new(registry, clock()).with_dispatch(dispatch);

        let resolution = resolver.resolve_detailed(chicago()).await;

        assert!(
            matches!(outcome_of(&resolution, "broken"), AttemptOutcome::Failed(_)),
            "{dispatch:?}"
        );
        assert_eq!(resolution.reading.pollutants.value(Pollutant::Pm25), Some(20.0));
    }
}

#[tokio::test]
async fn sequential_walk_only_asks_providers_with_something_to_add() {
    let model = StaticProvider::new("model", &[(Pollutant::Pm10, 30.0)]);
    let model_calls = model.calls();
    let sat = StaticProvider::new("sat", &[(Pollutant::So2, 8.0)]);
    let sat_calls = sat.calls();

    let registry = ProviderRegistry::new()
        .with(descriptor(
            "ground",
            ProviderClass::GroundNetwork,
            StaticProvider::new("ground", &[(Pollutant::Pm25, 12.0), (Pollutant::No2, 20.0)]),
        ))
        .with(descriptor("model", ProviderClass::Model, model))
        .with(descriptor("sat", ProviderClass::Satellite, sat).with_specialty([Pollutant::So2]));
    let resolver = CascadeResolver::new(registry, clock()).with_dispatch(DispatchMode::Sequential);

    let resolution = resolver.resolve_detailed(chicago()).await;

    assert_eq!(model_calls.load(Ordering::SeqCst), 0);
    assert_eq!(outcome_of(&resolution, "model"), AttemptOutcome::NotQueried);
    assert_eq!(sat_calls.load(Ordering::SeqCst), 1);
    assert_eq!(outcome_of(&resolution, "sat"), AttemptOutcome::Contributed(1));
    assert_eq!(resolution.reading.pollutants.len(), 3);
}

#[tokio::test]
async fn sequential_walk_moves_on_after_failure() {
    let registry = ProviderRegistry::new()
        .with(descriptor("ground", ProviderClass::GroundNetwork, FailingProvider))
        .with(descriptor(
            "model",
            ProviderClass::Model,
            StaticProvider::new("model", &[(Pollutant::Pm25, 9.0)]),
        ));
    let resolver = CascadeResolver::new(registry, clock()).with_dispatch(DispatchMode::Sequential);

    let resolution = resolver.resolve_detailed(chicago()).await;

    assert!(matches!(outcome_of(&resolution, "ground"), AttemptOutcome::Failed(_)));
    assert_eq!(resolution.reading.sources_used.iter().collect::<Vec<_>>(), ["model"]);
}

#[tokio::test(start_paused = true)]
async fn paris_falls_back_to_regional_estimate() {
    let sat = StaticProvider::new("sat", &[(Pollutant::No2, 40.0)]);
    let sat_calls = sat.calls();
    let registry = ProviderRegistry::new()
        .with(descriptor("sat", ProviderClass::Satellite, sat))
        .with(descriptor("ground", ProviderClass::GroundNetwork, FailingProvider))
        .with(
            descriptor("model", ProviderClass::Model, HangingProvider)
                .with_timeout(Duration::from_millis(500)),
        );
    let resolver = CascadeResolver::new(registry, clock());

    let resolution = resolver.resolve_detailed(paris()).await;
    let reading = &resolution.reading;

    assert_eq!(sat_calls.load(Ordering::SeqCst), 0);
    assert_eq!(outcome_of(&resolution, "sat"), AttemptOutcome::SkippedCoverage);
    assert!(matches!(outcome_of(&resolution, "ground"), AttemptOutcome::Failed(_)));
    assert_eq!(outcome_of(&resolution, "model"), AttemptOutcome::TimedOut);

    assert_eq!(reading.origin, ReadingOrigin::Estimated);
    assert_eq!(reading.region_profile, Some(RegionProfile::UrbanHighPollution));
    assert_eq!(reading.sources_used.iter().collect::<Vec<_>>(), [ESTIMATOR_SOURCE]);
    assert!(reading.pollutants.value(Pollutant::Pm25).unwrap() > 0.0);
    assert!(reading.aqi.value > 0);
    assert!(matches!(reading.confidence.band, ConfidenceBand::Low | ConfidenceBand::Medium));
    assert_eq!(reading.location_name, "Location 48.857, 2.352");
}

#[tokio::test]
async fn empty_registry_still_produces_a_reading() {
    let resolver = CascadeResolver::new(ProviderRegistry::new(), clock());
    let resolution = resolver.resolve_detailed(Coordinate::new(-30.0, -140.0).unwrap()).await;

    assert!(resolution.attempts.is_empty());
    assert_eq!(resolution.reading.origin, ReadingOrigin::Estimated);
    assert_eq!(resolution.reading.region_profile, Some(RegionProfile::RuralBackground));
    assert!(!resolution.reading.sources_used.is_empty());
}

#[tokio::test]
async fn registry_order_breaks_ties_between_peers() {
    let registry = ProviderRegistry::new()
        .with(descriptor(
            "first",
            ProviderClass::GroundNetwork,
            StaticProvider::new("first", &[(Pollutant::Pm25, 10.0)]),
        ))
        .with(descriptor(
            "second",
            ProviderClass::GroundNetwork,
            StaticProvider::new("second", &[(Pollutant::Pm25, 50.0)]),
        ));
    let resolver = CascadeResolver::new(registry, clock());

    let reading = resolver.resolve(chicago()).await;
    assert_eq!(reading.pollutants.value(Pollutant::Pm25), Some(10.0));
    assert_eq!(reading.pollutants.get(Pollutant::Pm25).unwrap().source, "first");
}
