use clap::{Parser, Subcommand};
use env_logger::Builder;
use log::{error, info, LevelFilter};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::process;

use sca::collocate::render_group;
use sca::{CollocateSpec, Condition, Corpus, Result, ScaConfig};

#[derive(Parser)]
#[command(author, version, about = "Collocation statistics over a tabular text corpus")]
struct Cli {
    /// INI configuration file; built-in defaults when omitted
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Write the log to this file instead of stderr
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    /// error, warn, info, debug, trace or none
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create a store from a CSV or TSV file
    Seed {
        /// Source file; `.tsv` is tab-delimited, anything else comma-delimited
        source: PathBuf,
        /// Store to create
        db: PathBuf,
        #[arg(long, default_value = "speech_id")]
        id_col: String,
        #[arg(long, default_value = "speech")]
        text_column: String,
    },
    /// Process collocate pairs, each given as "pattern1 pattern2"
    Add {
        /// Settings snapshot written at seed time
        settings: PathBuf,
        #[arg(required = true)]
        pairs: Vec<String>,
    },
    /// Count matching texts per group of categorical values
    Count {
        settings: PathBuf,
        /// "pattern1 pattern2 window"; texts matching any condition count
        #[arg(short, long = "condition", required = true, value_parser = parse_condition)]
        conditions: Vec<Condition>,
    },
    /// Write baseline and matching counts per subgroup
    Subgroups {
        settings: PathBuf,
        /// Output table; comma-delimited when it ends in .csv
        #[arg(short, long)]
        out: PathBuf,
        #[arg(short, long = "condition", required = true, value_parser = parse_condition)]
        conditions: Vec<Condition>,
    },
    /// Change the stopword list; stored windows and groups are cleared
    Stopwords {
        settings: PathBuf,
        #[arg(long, value_delimiter = ',')]
        add: Vec<String>,
        #[arg(long, value_delimiter = ',')]
        remove: Vec<String>,
        /// File with one stopword per line
        #[arg(long)]
        file: Option<PathBuf>,
    },
}

fn parse_condition(raw: &str) -> std::result::Result<Condition, String> {
    raw.parse::<Condition>().map_err(|e| e.to_string())
}

fn parse_pair(raw: &str) -> Result<CollocateSpec> {
    let parts: Vec<&str> = raw.split_whitespace().collect();
    match parts.as_slice() {
        [p1, p2] => Ok(CollocateSpec::from((*p1, *p2))),
        [p1, p2, window] => match window.parse::<u32>() {
            Ok(w) => Ok(CollocateSpec::from((*p1, *p2, w))),
            Err(_) => Err(sca::Error::input(format!("Invalid window in '{}'", raw))),
        },
        _ => Err(sca::Error::input(format!("Expected 'pattern1 pattern2', got '{}'", raw))),
    }
}

fn init_logging(cli: &Cli) -> Result<()> {
    let level = match cli.log_level.to_lowercase().as_str() {
        "error" => LevelFilter::Error,
        "warn" => LevelFilter::Warn,
        "info" => LevelFilter::Info,
        "debug" => LevelFilter::Debug,
        "trace" => LevelFilter::Trace,
        "none" => LevelFilter::Off,
        other => {
            eprintln!("Invalid log level '{}', defaulting to Info", other);
            LevelFilter::Info
        },
    };

    let mut builder = Builder::new();
    builder.filter(None, level);
    if let Some(path) = &cli.log_file {
        builder.target(env_logger::Target::Pipe(Box::new(File::create(path)?)));
    }
    builder.init();
    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<ScaConfig> {
    match path {
        Some(path) => {
            info!("Loading configuration from: {:?}", path);
            ScaConfig::from_ini(path)
        },
        None => Ok(ScaConfig::default()),
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Command::Seed { source, db, id_col, text_column } => {
            let corpus = Corpus::seed(&source, &db, &id_col, &text_column, config)?;
            println!(
                "Seeded {} records into {} (settings: {})",
                corpus.record_count()?,
                db.display(),
                corpus.settings_path().display()
            );
            corpus.close()
        },
        Command::Add { settings, pairs } => {
            let specs = pairs.iter().map(|p| parse_pair(p)).collect::<Result<Vec<_>>>()?;
            let mut corpus = Corpus::from_settings(&settings, config)?;
            let report = corpus.add_collocates(&specs)?;
            for pair in &report.added {
                println!("added\t{}\t{}", pair.pattern1, pair.pattern2);
            }
            println!(
                "{} added, {} already known, {} skipped",
                report.added.len(), report.skipped_known, report.skipped_invalid
            );
            corpus.close()
        },
        Command::Count { settings, conditions } => {
            let corpus = Corpus::from_settings(&settings, config)?;
            let counts = corpus.count_with_collocates(&conditions)?;
            let mut header = corpus.columns().to_vec();
            header.push("count".to_string());
            println!("{}", header.join("\t"));
            for row in counts {
                let mut fields = render_group(&row.group);
                fields.push(row.count.to_string());
                println!("{}", fields.join("\t"));
            }
            corpus.close()
        },
        Command::Subgroups { settings, out, conditions } => {
            let corpus = Corpus::from_settings(&settings, config)?;
            let rows = corpus.counts_by_subgroups(&conditions, &out)?;
            println!("Wrote {} subgroups to {}", rows.len(), out.display());
            corpus.close()
        },
        Command::Stopwords { settings, add, remove, file } => {
            let mut corpus = Corpus::from_settings(&settings, config)?;
            if !add.is_empty() {
                corpus.add_stopwords(&add)?;
            }
            if !remove.is_empty() {
                corpus.remove_stopwords(&remove)?;
            }
            if let Some(path) = file {
                let loaded = corpus.load_stopwords_file(&path)?;
                println!("Loaded {} stopwords from {}", loaded, path.display());
            }
            println!("{} stopwords in effect", corpus.stopwords().len());
            corpus.close()
        },
    }
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = init_logging(&cli) {
        eprintln!("Failed to initialise logging: {}", e);
        process::exit(1);
    }

    if let Err(e) = run(cli) {
        error!("{}", e);
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}
