#[cfg(test)]
mod tests {
    use coinflip_engine::history::Column;
    use coinflip_engine::persist;
    use coinflip_engine::*;
    use std::str::FromStr;

    fn config(size: i64, start: i64, bet: i64) -> SimulationConfig {
        let mut config = SimulationConfig::default();
        config.population.size = size;
        config.population.start_wealth = start;
        config.exchange.bet = bet;
        config.seed = 7;
        config
    }

    // ========== Exchange Rules ==========

    #[test]
    fn test_single_exchange_four_people() {
        let mut sim = Simulation::new(&config(4, 100, 10)).unwrap();
        sim.advance(1).unwrap();

        let wealth = sim.population().wealth_stamp();
        assert_eq!(wealth.iter().sum::<i64>(), 400);
        assert_eq!(wealth.iter().filter(|w| **w == 100).count(), 2);
        assert_eq!(wealth.iter().filter(|w| **w == 110).count(), 1);
        assert_eq!(wealth.iter().filter(|w| **w == 90).count(), 1);
        assert_eq!(sim.ledger().len(), 1);
        assert!(sim.ledger().get(0).unwrap().is_settled());
    }

    #[test]
    fn test_sequential_draws_everyone_twice() {
        let mut cfg = config(100, 100, 1);
        cfg.exchange.selection = SelectionStrategy::Sequential;
        let mut sim = Simulation::new(&cfg).unwrap();
        sim.advance(100).unwrap();

        for person in sim.population().people() {
            assert_eq!(person.flips(), 2, "person {} drawn {} times", person.id(), person.flips());
        }
    }

    #[test]
    fn test_sequential_wraps_odd_population() {
        let mut cfg = config(5, 100, 1);
        cfg.exchange.selection = SelectionStrategy::Sequential;
        let mut sim = Simulation::new(&cfg).unwrap();
        sim.advance(5).unwrap();
        assert!(sim.population().people().iter().all(|p| p.flips() == 2));
        assert!(sim.ledger().iter().all(|e| e.winner != e.loser));
    }

    #[test]
    fn test_wealth_conserved_across_seeds_and_debt_policies() {
        for seed in 0..8 {
            for allow_debt in [false, true] {
                let mut cfg = config(25, 20, 7);
                cfg.seed = seed;
                cfg.exchange.allow_debt = allow_debt;
                let mut sim = Simulation::new(&cfg).unwrap();
                sim.advance(2_000).unwrap();
                assert_eq!(sim.population().total_wealth(), 500);
                if !allow_debt {
                    assert!(sim.population().people().iter().all(|p| p.wealth() >= 0));
                }
            }
        }
    }

    #[test]
    fn test_unknown_selection_strategy() {
        let err = SelectionStrategy::from_str("tournament").unwrap_err();
        assert!(matches!(err, FlipError::UnknownSelectionStrategy(ref s) if s == "tournament"));
    }

    // ========== History Cache ==========

    #[test]
    fn test_history_only_computes_new_rows() {
        let mut sim = Simulation::new(&config(10, 100, 5)).unwrap();
        sim.advance(10).unwrap();
        assert_eq!(sim.stats_table().unwrap().len(), 11);
        assert_eq!(sim.history().rows_computed(), 11);

        assert_eq!(sim.stats_table().unwrap().len(), 11);
        assert_eq!(sim.history().rows_computed(), 11);

        sim.advance(5).unwrap();
        let table = sim.stats_table().unwrap();
        assert_eq!(table.len(), 16);
        assert_eq!(sim.history().rows_computed(), 16);
        let counts: Vec<u64> = table.rows.iter().map(|r| r.exchange_count).collect();
        assert!(counts.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_bucket_shares_sum_to_hundred() {
        let mut sim = Simulation::new(&config(30, 50, 10)).unwrap();
        sim.advance(200).unwrap();
        let table = sim.stats_table().unwrap();
        for row in &table.rows {
            assert_eq!(row.stats.buckets.len(), 3);
            let sum: f64 = row.stats.buckets.values().sum();
            assert!((sum - 100.0).abs() < 1e-9, "row {} sums to {}", row.exchange_count, sum);
        }
        let series = table.column(Column::Bucket(0));
        assert_eq!(series.len(), table.len());
        assert_eq!(series[0].0, 0);
        assert!((series[0].1 - 100.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_bucket_selection_limits_columns() {
        let mut cfg = config(30, 50, 10);
        cfg.history.buckets = BucketSelection::only([0]);
        let mut sim = Simulation::new(&cfg).unwrap();
        sim.advance(3).unwrap();
        let table = sim.stats_table().unwrap();
        assert!(table.rows.iter().all(|r| r.stats.buckets.keys().eq([0usize].iter())));
        assert!(table.column(Column::Bucket(2)).is_empty());
    }

    // ========== Population Analytics ==========

    #[test]
    fn test_ten_bucket_ladder() {
        let mut pop = Population::new();
        for w in (1..=10).map(|i| i * 10) {
            pop.add(1, w).unwrap();
        }
        let ladder = pop.percentile_ladder(10);
        assert_eq!(ladder.len(), 10);
        let sum: f64 = ladder.iter().map(|b| b.share_percent).sum();
        assert!((sum - 100.0).abs() < 1e-9);
        assert!((ladder[0].share_percent - 100.0 / 550.0 * 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_root_has_no_parent_but_views_do() {
        let pop = Population::with_people(10, 10).unwrap();
        assert!(matches!(pop.stats_snapshot(), Err(FlipError::NoParent { size: 10 })));
        let top = pop.wealthiest(5, false).unwrap();
        let snapshot = top.stats_snapshot().unwrap();
        assert_eq!(snapshot.percent_of_parent_population, 50.0);
        assert_eq!(snapshot.percent_of_parent_wealth, 50.0);
    }

    // ========== Persistence ==========

    #[test]
    fn test_save_load_continues_same_stream() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sim.json");

        let mut original = Simulation::new(&config(20, 100, 10)).unwrap();
        original.advance(300).unwrap();
        original.save(&path).unwrap();

        let mut loaded = Simulation::load(&path).unwrap();
        assert_eq!(loaded.exchange_count(), 300);
        assert_eq!(loaded.settled_count(), original.settled_count());
        assert_eq!(loaded.population(), original.population());
        assert_eq!(loaded.descriptive_identifier(), original.descriptive_identifier());

        original.advance(300).unwrap();
        loaded.advance(300).unwrap();
        assert_eq!(loaded.population().wealth_stamp(), original.population().wealth_stamp());
        let key = |table: StatsTable| -> Vec<(u64, i64, i64, i64)> {
            table.rows.iter().map(|r| (r.exchange_count, r.stats.total, r.stats.max, r.stats.min)).collect()
        };
        assert_eq!(key(loaded.stats_table().unwrap()), key(original.stats_table().unwrap()));
    }

    #[test]
    fn test_save_writes_stats_table_beside_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sim.json");
        let mut sim = Simulation::new(&config(10, 100, 10)).unwrap();
        sim.advance(4).unwrap();
        sim.save(&path).unwrap();

        let text = std::fs::read_to_string(dir.path().join("sim_history.json")).unwrap();
        let table: StatsTable = serde_json::from_str(&text).unwrap();
        assert_eq!(table.len(), 5);
        assert_eq!(table.last().unwrap().exchange_count, 4);
        assert!(!persist::temp_path_for(&path).exists());
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.json");
        assert!(matches!(Simulation::load(&path), Err(FlipError::NotFound { .. })));
    }

    #[test]
    fn test_load_garbage_deletes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sim.json");
        std::fs::write(&path, b"{ not json").unwrap();

        let err = Simulation::load(&path).unwrap_err();
        assert!(matches!(err, FlipError::CorruptState { .. }));
        assert!(!path.exists());
    }

    #[test]
    fn test_load_tampered_wealth_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sim.json");
        let mut sim = Simulation::new(&config(4, 100, 10)).unwrap();
        sim.advance(10).unwrap();
        sim.save(&path).unwrap();

        let mut value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        let wealth = &mut value["population"]["people"][0]["wealth"];
        *wealth = serde_json::json!(wealth.as_i64().unwrap() + 1);
        std::fs::write(&path, serde_json::to_vec(&value).unwrap()).unwrap();

        match Simulation::load(&path) {
            Err(FlipError::CorruptState { reason, .. }) => assert!(reason.contains("conserved")),
            other => panic!("expected corrupt state, got {:?}", other.map(|s| s.exchange_count())),
        }
        assert!(!path.exists());
    }

    #[test]
    fn test_load_rejects_sequential_with_broke_is_out() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sim.json");
        let mut sim = Simulation::new(&config(4, 100, 10)).unwrap();
        sim.advance(2).unwrap();
        sim.save(&path).unwrap();

        let mut value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        value["params"]["selection"] = serde_json::json!("sequential");
        value["params"]["broke_is_out"] = serde_json::json!(true);
        std::fs::write(&path, serde_json::to_vec(&value).unwrap()).unwrap();

        match Simulation::load(&path) {
            Err(FlipError::CorruptState { reason, .. }) => assert!(reason.contains("broke_is_out")),
            other => panic!("expected corrupt state, got {:?}", other.map(|s| s.exchange_count())),
        }
        assert!(!path.exists());
    }
}
