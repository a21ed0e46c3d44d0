use crate::*;

fn play_to(episode: &mut Episode, index: usize) {
    while episode.replay().cursor() < index && !episode.is_graded() {
        episode.tick();
    }
}

#[test]
fn test_same_seed_same_bytes() {
    let first = generate_scenario(Some(12345), Timeframe::D1);
    let second = generate_scenario(Some(12345), Timeframe::D1);
    assert_eq!(
        serde_json::to_string(&first.candles).unwrap(),
        serde_json::to_string(&second.candles).unwrap()
    );
    assert_eq!(first.ground_truth, second.ground_truth);

    let pattern = PatternLibrary::resolve("turtle-soup");
    let a = pattern.generate_seeded(Timeframe::D1, &mut SeededStream::new(12345));
    let b = pattern.generate_seeded(Timeframe::D1, &mut SeededStream::new(12345));
    assert_eq!(a, b);
}

#[test]
fn test_perfect_exam_passes_with_full_marks() {
    let mut episode = Episode::generate(Some(12345), Timeframe::D1, &EngineConfig::default()).unwrap();
    let truth = episode.scenario().ground_truth.clone();
    assert_eq!(truth.direction, TradeSide::Short);

    episode.place_marker(MarkerKind::RangeHigh, truth.range_high).unwrap();
    episode.place_marker(MarkerKind::RangeLow, truth.range_low).unwrap();

    episode.play().unwrap();
    play_to(&mut episode, truth.sweep_index);
    episode.place_marker(MarkerKind::PurgeFlag, truth.purge_price).unwrap();
    play_to(&mut episode, truth.reclaim_index);
    episode
        .open_trade(truth.direction, Some(truth.purge_price))
        .unwrap();
    play_to(&mut episode, usize::MAX);

    let result = episode.result().unwrap();
    assert!(result.passed);
    assert_eq!(result.score, 100);
    assert!(episode.violations().is_empty());
    assert_eq!(episode.replay().state(), ReplayState::Complete);
}

#[test]
fn test_grading_twice_is_identical() {
    let mut episode = Episode::generate(Some(12345), Timeframe::D1, &EngineConfig::default()).unwrap();
    let truth = episode.scenario().ground_truth.clone();
    episode.place_marker(MarkerKind::RangeHigh, truth.range_high + 0.8).unwrap();
    episode.play().unwrap();
    play_to(&mut episode, truth.reclaim_index);
    episode.open_trade(TradeSide::Short, Some(truth.purge_price + 1.0)).unwrap();
    let submitted = episode.submit().unwrap();

    let state = episode.ledger_state();
    let regrade = || {
        grade_episode(
            episode.markers(),
            state.trade.as_ref(),
            &truth,
            state.balance,
            state.starting_balance,
        )
    };
    assert_eq!(regrade(), regrade());
    assert_eq!(regrade(), submitted);
}

#[test]
fn test_late_intents_end_up_in_feedback() {
    let mut episode = Episode::generate(Some(777), Timeframe::H1, &EngineConfig::default()).unwrap();
    episode.play().unwrap();
    play_to(&mut episode, usize::MAX);
    assert!(episode.is_graded());

    let err = episode.open_trade(TradeSide::Long, Some(90.0)).unwrap_err();
    assert_eq!(err, EpisodeError::AlreadyGraded);
    assert_eq!(episode.violations().len(), 1);
}

#[test]
fn test_second_entry_is_refused_and_first_trade_is_graded() {
    let mut episode = Episode::generate(Some(12345), Timeframe::D1, &EngineConfig::default()).unwrap();
    let truth = episode.scenario().ground_truth.clone();
    assert_eq!(truth.direction, TradeSide::Short);

    episode.play().unwrap();
    play_to(&mut episode, truth.reclaim_index);
    episode.open_trade(TradeSide::Long, Some(truth.range_low - 1.0)).unwrap();
    episode.tick();
    episode.close_trade().unwrap();

    let err = episode.open_trade(TradeSide::Short, Some(truth.purge_price)).unwrap_err();
    assert_eq!(err, EpisodeError::TradeAlreadyTaken);
    assert_eq!(episode.violations().len(), 1);

    let result = episode.submit().unwrap();
    assert_eq!(episode.ledger_state().trade.map(|t| t.side), Some(TradeSide::Long));
    assert_eq!(result.metrics.timing, 0);
    assert_eq!(result.metrics.risk_management, 0);
    assert!(!result.passed);
    assert!(result.feedback.iter().any(|f| f.contains("already been taken")));
}

#[test]
fn test_downside_sweep_exam_wants_a_long() {
    let config = ScenarioConfig {
        sweep: SweepSide::Below,
        ..ScenarioConfig::for_timeframe(Timeframe::M15)
    };
    let scenario = ScenarioBuilder::new(config).unwrap().build(4242);
    let truth = scenario.ground_truth.clone();
    let mut episode = Episode::new(scenario, &EngineConfig::default()).unwrap();

    episode.place_marker(MarkerKind::RangeHigh, truth.range_high).unwrap();
    episode.place_marker(MarkerKind::RangeLow, truth.range_low).unwrap();
    episode.play().unwrap();
    play_to(&mut episode, truth.reclaim_index);
    episode.open_trade(TradeSide::Long, Some(truth.purge_price - 0.25)).unwrap();
    let result = episode.submit().unwrap();

    assert_eq!(truth.direction, TradeSide::Long);
    assert!(result.passed);
    assert_eq!(result.score, 100);
}

#[test]
fn test_practice_feed_extends_replay() {
    let mut feed = PracticeFeed::new(Timeframe::M5);
    let history = feed.seed_history(50, 2000.0);
    let mut replay = ReplayController::new(history, 49).with_view_window(20);
    let last = replay.current_candle().cloned().unwrap();

    replay.append(feed.extend(&last, 10));
    replay.play().unwrap();
    for _ in 0..10 {
        replay.tick();
    }
    assert!(replay.is_complete());
    assert_eq!(replay.visible_window().len(), 20);
    let candles = replay.candles();
    assert!(candles.windows(2).all(|w| w[1].open == w[0].close));
}
