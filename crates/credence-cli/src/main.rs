//! Credence — belief calibration for machine-read statements.
//! Entry point for the `credence` binary.

mod config;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use credence_belief::{
    build_model, compare_models, evaluate_proposal, fit, fit_and_score, fit_table, recommend_from_baseline,
};
use credence_common::{
    Curation, LikelihoodMode, MentionWeights, ModelKind, ModelSpec, ReaderProfile, Statement, StatementHash,
};
use credence_curation::{
    calibration_table, dataset_table, get_correctness_data, load_sample_hashes, restrict_to_source,
    sample_for_curation, AggregationPolicy, AggregationReport, CurationTally, DEFAULT_BELIEF_BINS,
};

#[derive(Parser)]
#[command(name = "credence", version, about = "Fit and plan belief models for machine-read statements")]
struct Cli {
    /// Path to credence.toml
    #[arg(long, global = true, env = "CREDENCE_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Aggregate curations into a correctness dataset
    Aggregate {
        #[arg(long)]
        reader: String,
    },
    /// Fit one belief model and report its MAP parameters
    Fit {
        #[arg(long)]
        reader: String,
        /// Model kind; the reader's configured model when absent
        #[arg(long)]
        model: Option<ModelKind>,
        #[arg(long)]
        mode: Option<LikelihoodMode>,
    },
    /// Fit every model variant and compare their maximum likelihoods
    Compare {
        #[arg(long)]
        reader: String,
    },
    /// Recommend the mention count to curate next
    Plan {
        #[arg(long)]
        reader: String,
        /// Also score an explicit curation batch, e.g. "1=50,10=50"
        /// (mention count = statements)
        #[arg(long, value_parser = parse_proposal)]
        proposal: Option<BTreeMap<u32, usize>>,
    },
    /// Tabulate curated correctness per belief bin
    Calibrate {
        #[arg(long)]
        reader: String,
    },
    /// Draw statements for a new curation round
    Sample {
        #[arg(long)]
        reader: String,
        /// Statements per evidence count
        #[arg(long, default_value_t = 10)]
        per_count: usize,
        #[arg(long, default_value_t = 1)]
        ev_min: u32,
        #[arg(long, default_value_t = 10)]
        ev_max: u32,
        #[arg(long)]
        seed: Option<u64>,
    },
}

/// Inputs shared by every subcommand.
struct Workspace {
    config: config::Config,
    statements: Vec<Statement>,
    curations: Vec<Curation>,
}

fn read_json<T: DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let content = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("parsing {}", path.display()))
}

impl Workspace {
    fn load(config: config::Config) -> anyhow::Result<Self> {
        let statements: Vec<Statement> = read_json(&config.input.statements)?;
        let curations: Vec<Curation> = read_json(&config.input.curations)?;
        info!("Loaded {} statements and {} curations", statements.len(), curations.len());
        std::fs::create_dir_all(&config.input.output_dir)?;
        Ok(Self {
            config,
            statements,
            curations,
        })
    }

    fn output(&self, name: &str) -> PathBuf {
        self.config.input.output_dir.join(name)
    }

    fn write_json<T: Serialize>(&self, name: &str, value: &T) -> anyhow::Result<PathBuf> {
        let path = self.output(name);
        std::fs::write(&path, serde_json::to_string_pretty(value)?)?;
        info!("Wrote {}", path.display());
        Ok(path)
    }

    /// The reader's sampled statements, one entry per draw. Without sample
    /// files, every statement the reader contributed evidence to.
    fn sampled_statements(&self, reader: &ReaderProfile) -> anyhow::Result<Vec<Statement>> {
        let source = reader.source_api();
        if reader.sample_files.is_empty() {
            warn!("Reader '{}' has no sample files, using all of its statements", reader.name);
            return Ok(self
                .statements
                .iter()
                .map(|s| s.restricted_to_source(source))
                .filter(|s| !s.evidence.is_empty())
                .collect());
        }
        let corpus: BTreeMap<StatementHash, Statement> =
            self.statements.iter().map(|s| (s.id, s.clone())).collect();
        let mut sampled = Vec::new();
        for file in &reader.sample_files {
            let hashes = load_sample_hashes(file)?;
            sampled.extend(restrict_to_source(&hashes, &corpus, source)?);
        }
        Ok(sampled)
    }

    fn aggregate(&self, reader: &ReaderProfile) -> anyhow::Result<AggregationReport> {
        let sampled = self.sampled_statements(reader)?;
        let mut tally = CurationTally::default();
        let report = get_correctness_data(
            &reader.curation_sources,
            &self.curations,
            &sampled,
            &AggregationPolicy::from(reader),
            &mut tally,
        )?;
        info!(
            "{}: {} curated evidences over {} mentions",
            reader.name,
            tally.curated_hashes.len(),
            tally.mentions
        );
        Ok(report)
    }

    fn mention_weights(&self, reader: &ReaderProfile) -> anyhow::Result<Option<MentionWeights>> {
        let Some(path) = reader.mention_distribution() else {
            return Ok(None);
        };
        let mut weights = MentionWeights::from_json_file(path)?;
        if !weights.validate() {
            warn!("Mention distribution {} does not sum to 1, renormalising", path.display());
            weights.normalise();
        }
        Ok(Some(weights))
    }
}

fn run_aggregate(ws: &Workspace, reader: &ReaderProfile) -> anyhow::Result<()> {
    let report = ws.aggregate(reader)?;
    for row in dataset_table(&report.dataset) {
        println!("{row}");
    }
    if !report.suspicious.is_empty() {
        warn!("{} suspicious curations", report.suspicious.len());
    }
    ws.write_json(&format!("{}_correctness.json", reader.name), &report.dataset)?;
    ws.write_json(&format!("{}_aggregation.json", reader.name), &report)?;
    Ok(())
}

fn run_fit(ws: &Workspace, reader: &ReaderProfile, spec: ModelSpec) -> anyhow::Result<()> {
    let data = ws.aggregate(reader)?.dataset;
    let weights = ws.mention_weights(reader)?;
    let result = fit_and_score(spec, &data, weights.as_ref(), &ws.config.sampler)?;
    let model = build_model(spec, None);

    println!("{spec}: mean acceptance {:.3}", result.mean_acceptance);
    for (name, value) in result.param_names.iter().zip(&result.map_params) {
        println!("  {name} = {value:.4}");
    }
    println!("  -log(max lkl) = {:.3}", result.error);
    if let Some(weighted) = result.weighted_error {
        println!("  -log(max lkl), weighted = {weighted:.3}");
    }
    println!("n\tcorrect\ttotal\tempirical\t±2se\tpredicted");
    for row in fit_table(model.as_ref(), &data, &result.map_params)? {
        println!(
            "{}\t{}\t{}\t{:.3}\t{:.3}\t{:.3}",
            row.num_mentions, row.num_correct, row.count, row.empirical_mean, row.two_stderr, row.predicted
        );
    }

    if let Some(samples) = &result.samples {
        let path = ws.output(&format!("{}_{}_samples.json", reader.name, spec.label()));
        samples.to_json_file(&path)?;
        info!("Wrote {}", path.display());
    }
    Ok(())
}

fn run_compare(ws: &Workspace, reader: &ReaderProfile) -> anyhow::Result<()> {
    let data = ws.aggregate(reader)?.dataset;
    let weights = ws.mention_weights(reader)?;
    let report = compare_models(&ModelSpec::all(), &data, weights.as_ref(), &ws.config.sampler);

    report.write_csv(std::io::stdout())?;
    for failure in &report.failures {
        warn!("{} did not complete: {}", failure.spec, failure.error);
    }
    if let Some(best) = report.best() {
        info!("Best model: {}", best.spec);
    }
    let path = ws.output(&format!("{}_comparison.csv", reader.name));
    report.write_csv(std::fs::File::create(&path)?)?;
    info!("Wrote {}", path.display());
    Ok(())
}

/// Parse `m=count` pairs separated by commas.
fn parse_proposal(s: &str) -> anyhow::Result<BTreeMap<u32, usize>> {
    let mut proposal = BTreeMap::new();
    for pair in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let (m, count) = pair
            .split_once('=')
            .ok_or_else(|| anyhow::anyhow!("expected <mentions>=<count>, got '{pair}'"))?;
        let m: u32 = m.trim().parse().with_context(|| format!("mention count in '{pair}'"))?;
        let count: usize = count.trim().parse().with_context(|| format!("statement count in '{pair}'"))?;
        if m == 0 {
            anyhow::bail!("mention counts start at 1, got '{pair}'");
        }
        if proposal.insert(m, count).is_some() {
            anyhow::bail!("mention count {m} is proposed twice");
        }
    }
    if proposal.is_empty() {
        anyhow::bail!("empty proposal");
    }
    Ok(proposal)
}

fn run_plan(ws: &Workspace, reader: &ReaderProfile, proposal: Option<&BTreeMap<u32, usize>>) -> anyhow::Result<()> {
    let data = ws.aggregate(reader)?.dataset;
    let weights = ws.mention_weights(reader)?;
    let model = build_model(reader.model, None);
    let plan = ws.config.design.to_plan(weights);
    let baseline = fit(model.as_ref(), &data, &ws.config.sampler)?;
    let rec = recommend_from_baseline(model.as_ref(), &data, &baseline, &plan, &ws.config.sampler)?;

    println!("baseline uncertainty {:.4E}", rec.baseline_uncertainty);
    for c in &rec.candidates {
        match c.reduction {
            Some(reduction) => println!("  {} mentions x {}: reduction {reduction:.4E}", c.num_mentions, c.count),
            None => println!("  {} mentions: not affordable", c.num_mentions),
        }
    }
    println!(
        "Curate {} statements with {} mentions (uncertainty {:.4E})",
        rec.count, rec.num_mentions, rec.uncertainty
    );
    ws.write_json(&format!("{}_plan.json", reader.name), &rec)?;

    if let Some(proposal) = proposal {
        let uncertainty = evaluate_proposal(model.as_ref(), &data, &baseline, proposal, &plan, &ws.config.sampler)?;
        let batch: Vec<String> = proposal.iter().map(|(m, n)| format!("{m}={n}")).collect();
        println!(
            "Proposal {}: uncertainty {uncertainty:.4E}, reduction {:.4E}",
            batch.join(","),
            rec.baseline_uncertainty - uncertainty
        );
    }
    Ok(())
}

fn run_calibrate(ws: &Workspace, reader: &ReaderProfile) -> anyhow::Result<()> {
    let report = ws.aggregate(reader)?;
    let bins = calibration_table(&ws.statements, &report.correctness, &DEFAULT_BELIEF_BINS)?;
    println!("belief\tcorrect\tincorrect\ttotal\tfraction");
    for bin in &bins {
        let fraction = bin
            .fraction_correct()
            .map(|f| format!("{f:.3}"))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "({}, {}]\t{}\t{}\t{}\t{fraction}",
            bin.lower, bin.upper, bin.correct, bin.incorrect, bin.total
        );
    }
    ws.write_json(&format!("{}_calibration.json", reader.name), &bins)?;
    Ok(())
}

fn run_sample(
    ws: &Workspace,
    reader: &ReaderProfile,
    per_count: usize,
    ev_min: u32,
    ev_max: u32,
    seed: Option<u64>,
) -> anyhow::Result<()> {
    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let sampled = sample_for_curation(&ws.statements, reader.source_api(), per_count, ev_min, ev_max, &mut rng);
    let hashes: Vec<StatementHash> = sampled.iter().map(|s| s.id).collect();
    println!("Sampled {} statements for {}", hashes.len(), reader.name);
    ws.write_json(&format!("{}_sample.json", reader.name), &hashes)?;
    Ok(())
}

fn main() -> anyhow::Result<()> {
    // Initialise structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("credence=debug,info")),
        )
        .init();

    let cli = Cli::parse();
    info!("Credence {}", env!("CARGO_PKG_VERSION"));

    let config = config::Config::load(cli.config.as_deref())?;
    info!(
        "Configuration loaded: {} readers, {} walkers",
        config.readers.len(),
        config.sampler.n_walkers
    );
    let ws = Workspace::load(config)?;

    match &cli.cmd {
        Cmd::Aggregate { reader } => run_aggregate(&ws, ws.config.reader(reader)?),
        Cmd::Fit { reader, model, mode } => {
            let profile = ws.config.reader(reader)?;
            let spec = ModelSpec::new(
                model.unwrap_or(profile.model.kind),
                mode.unwrap_or(profile.model.mode),
            );
            run_fit(&ws, profile, spec)
        }
        Cmd::Compare { reader } => run_compare(&ws, ws.config.reader(reader)?),
        Cmd::Plan { reader, proposal } => run_plan(&ws, ws.config.reader(reader)?, proposal.as_ref()),
        Cmd::Calibrate { reader } => run_calibrate(&ws, ws.config.reader(reader)?),
        Cmd::Sample {
            reader,
            per_count,
            ev_min,
            ev_max,
            seed,
        } => run_sample(&ws, ws.config.reader(reader)?, *per_count, *ev_min, *ev_max, *seed),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_proposal() {
        let proposal = parse_proposal("1=50, 10=50").unwrap();
        assert_eq!(proposal, BTreeMap::from([(1, 50), (10, 50)]));
        assert!(parse_proposal("1=50,1=20").is_err());
        assert!(parse_proposal("0=5").is_err());
        assert!(parse_proposal("3").is_err());
        assert!(parse_proposal("").is_err());
    }

    #[test]
    fn test_plan_accepts_proposal_flag() {
        let cli = Cli::try_parse_from(["credence", "plan", "--reader", "reach", "--proposal", "1=50,10=50"]).unwrap();
        match cli.cmd {
            Cmd::Plan { reader, proposal } => {
                assert_eq!(reader, "reach");
                assert_eq!(proposal, Some(BTreeMap::from([(1, 50), (10, 50)])));
            }
            _ => panic!("expected the plan subcommand"),
        }
    }
}
