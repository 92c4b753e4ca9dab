#[cfg(test)]
mod tests {
    use super::super::*;
    use credence_belief::Parallelism;
    use credence_common::{Aggregation, LikelihoodMode, ModelKind};

    const MINIMAL: &str = r#"
        [input]
        statements = "data/statements.json"
        curations = "data/curations.json"
    "#;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = Config::parse(MINIMAL).unwrap();
        assert_eq!(config.input.output_dir, PathBuf::from("./output"));
        assert_eq!(config.sampler, SamplerConfig::default());
        assert_eq!(config.design.budget, 100.0);
        assert_eq!(config.design.cost, MentionCost::Linear);
        assert!(config.readers.is_empty());
    }

    #[test]
    fn test_full_config() {
        let content = r#"
            [input]
            statements = "s.json"
            curations = "c.json"
            output_dir = "out"

            [sampler]
            n_walkers = 20
            seed = 42
            parallelism = { threaded = { num_threads = 4 } }

            [design]
            budget = 10.0
            max_mentions = 5
            cost = "log2"
            candidates = [1, 2, 5]

            [[readers]]
            name = "reach"
            sample_files = ["samples/reach_1.json"]
            aggregation = "pmid"
            allow_incomplete_correct = true
            model = { kind = "orig_belief", mode = "ev" }

            [[readers]]
            name = "sparser"
            curation_sources = ["bioexp_paper_sparser", "sparser_extra"]
        "#;
        let config = Config::parse(content).unwrap();
        assert_eq!(config.sampler.n_walkers, 20);
        assert_eq!(config.sampler.n_sample_steps, 100);
        assert_eq!(config.sampler.seed, Some(42));
        assert_eq!(config.sampler.parallelism, Parallelism::Threaded { num_threads: Some(4) });
        assert_eq!(config.design.cost, MentionCost::Log2);

        let reach = config.reader("reach").unwrap();
        assert_eq!(reach.curation_sources, vec!["bioexp_paper_reach".to_string()]);
        assert_eq!(reach.aggregation, Aggregation::Document);
        assert_eq!(reach.model.kind, ModelKind::RandomSystematic);
        assert_eq!(reach.model.mode, LikelihoodMode::Evidence);
        assert_eq!(config.reader("sparser").unwrap().curation_sources.len(), 2);
        assert!(config.reader("medscan").is_err());
    }

    #[test]
    fn test_sequential_parallelism() {
        let content = format!("{MINIMAL}\n[sampler]\nparallelism = \"none\"\n");
        let config = Config::parse(&content).unwrap();
        assert_eq!(config.sampler.parallelism, Parallelism::Sequential);
    }

    #[test]
    fn test_design_plan_from_config() {
        let design = DesignConfig {
            candidates: Some(vec![3]),
            ..Default::default()
        };
        let plan = design.to_plan(None);
        assert_eq!(plan.max_mentions, 10);
        assert_eq!(plan.candidates, Some(vec![3]));
        assert!(plan.mention_probabilities.is_none());
    }

    #[test]
    fn test_reader_files_are_loaded() {
        let dir = std::env::temp_dir().join(format!("credence_config_readers_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let profile = dir.join("trips.yaml");
        std::fs::write(&profile, "name: trips\naggregation: pmid\n").unwrap();
        let config_path = dir.join("credence.toml");
        std::fs::write(
            &config_path,
            format!(
                "[input]\nstatements = \"s.json\"\ncurations = \"c.json\"\nreader_files = [{:?}]\n\n\
                 [[readers]]\nname = \"reach\"\n",
                profile.display().to_string()
            ),
        )
        .unwrap();

        let config = Config::load(Some(&config_path)).unwrap();
        assert_eq!(config.readers.len(), 2);
        let trips = config.reader("trips").unwrap();
        assert_eq!(trips.aggregation, Aggregation::Document);
        assert_eq!(trips.curation_sources, vec!["bioexp_paper_trips".to_string()]);

        let mut duplicate = config.clone();
        assert!(duplicate.load_reader_files().is_err());
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_missing_file() {
        let err = Config::load(Some(Path::new("/nonexistent/credence.toml"))).unwrap_err();
        assert!(err.to_string().contains("Config file not found"));
    }
}
