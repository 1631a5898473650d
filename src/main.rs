use std::fs;
use std::io::{self, Read, Write};
use std::process;
use std::rc::Rc;

use async_trait::async_trait;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use pageguard::env::{self, EnvVar};
use pageguard::moderation::{
    AnalysisRequest, AnalysisService, AnalysisVerdict, Command, ConfigManager, HistorySink,
    HttpAnalysisService, JsonHistoryStore, LiveDocument, LocalHeuristicAnalyzer,
    MemoryHistoryStore, MemorySettingsStore, ModerationConfig, ModerationError,
    ModerationPipeline, ModerationResult,
};

#[derive(Parser)]
#[command(name = "pageguard", version, about = "In-page content moderation for saved HTML documents")]
struct Cli {
    /// Configuration file (TOML or JSON)
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan a document, filter objectionable content and write the result
    Moderate {
        /// HTML file to process, `-` reads stdin
        input: String,
        /// Page URL used for resolving image sources and history records
        #[arg(short, long, default_value = "about:blank")]
        url: String,
        /// Analysis service base URL
        #[arg(long)]
        api_url: Option<String>,
        /// Use local heuristics only
        #[arg(long)]
        offline: bool,
        /// Output file, stdout when omitted
        #[arg(short, long)]
        output: Option<String>,
        /// Persist filtered history to this JSON file
        #[arg(long)]
        history: Option<String>,
    },
    /// Classify a single piece of text and print the verdict as JSON
    CheckText {
        text: String,
        #[arg(long)]
        api_url: Option<String>,
        #[arg(long)]
        offline: bool,
    },
    /// Write an example configuration file
    InitConfig {
        #[arg(default_value = "pageguard.toml")]
        path: String,
    },
}

/// 离线模式：远程调用总是失败，由管道回退到本地分析
struct OfflineService;

#[async_trait(?Send)]
impl AnalysisService for OfflineService {
    async fn analyze(&self, _request: &AnalysisRequest) -> ModerationResult<AnalysisVerdict> {
        Err(ModerationError::NetworkError("离线模式".to_string()))
    }

    async fn health_check(&self) -> bool {
        false
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging();

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Error: failed to create runtime: {}", e);
            process::exit(1);
        }
    };

    let local = tokio::task::LocalSet::new();
    if let Err(e) = local.block_on(&runtime, run(cli)) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn init_logging() {
    let level = env::core::LogLevel::get().unwrap_or_else(|_| "info".to_string());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let no_color = env::core::NoColor::get().unwrap_or(false);

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(!no_color)
        .with_writer(io::stderr)
        .try_init();
}

fn load_config(path: Option<&str>) -> ModerationResult<ModerationConfig> {
    let manager = match path {
        Some(path) => ConfigManager::from_file(path)?,
        None => ConfigManager::new()?,
    };
    Ok(manager.into_config())
}

async fn run(cli: Cli) -> ModerationResult<()> {
    match cli.command {
        Commands::Moderate {
            input,
            url,
            api_url,
            offline,
            output,
            history,
        } => {
            let mut config = load_config(cli.config.as_deref())?;
            if let Some(api_url) = api_url {
                config.api_url = api_url.trim_end_matches('/').to_string();
            }
            config.enabled = true;
            moderate(&input, &url, config, offline, output, history).await
        }
        Commands::CheckText {
            text,
            api_url,
            offline,
        } => {
            let mut config = load_config(cli.config.as_deref())?;
            if let Some(api_url) = api_url {
                config.api_url = api_url.trim_end_matches('/').to_string();
            }
            check_text(&text, &config, offline).await
        }
        Commands::InitConfig { path } => {
            ConfigManager::generate_example_config(&path)?;
            eprintln!("Example configuration written to {}", path);
            Ok(())
        }
    }
}

async fn moderate(
    input: &str,
    page_url: &str,
    config: ModerationConfig,
    offline: bool,
    output: Option<String>,
    history_path: Option<String>,
) -> ModerationResult<()> {
    let data = read_input(input)?;
    let document = Rc::new(LiveDocument::from_bytes(&data, "utf-8", page_url)?);

    let service: Rc<dyn AnalysisService> = if offline {
        Rc::new(OfflineService)
    } else {
        Rc::new(HttpAnalysisService::new(&config)?)
    };

    let history_path = match history_path {
        Some(path) => Some(path),
        None => env::storage::HistoryPath::get_override().transpose()?,
    };
    let history: Rc<dyn HistorySink> = match history_path {
        Some(path) => Rc::new(JsonHistoryStore::new(path, config.history_limit)),
        None => Rc::new(MemoryHistoryStore::new(config.history_limit)),
    };

    let pipeline = ModerationPipeline::new(
        document.clone(),
        service,
        config,
        history,
        Rc::new(MemorySettingsStore::with_enabled(true)),
    );

    if offline {
        pipeline.handle_command(Command::BackendStatus { available: false });
    } else if !pipeline.check_backend().await {
        tracing::warn!("分析服务不可用，使用本地分析");
    }

    let stats = pipeline.run_to_idle().await;
    pipeline.shutdown();

    let html = document.serialize()?;
    match output {
        Some(path) => fs::write(&path, &html)?,
        None => io::stdout().write_all(&html)?,
    }

    eprintln!(
        "Filtered {} text block(s) and {} image(s)",
        stats.texts_filtered, stats.images_filtered
    );
    Ok(())
}

async fn check_text(text: &str, config: &ModerationConfig, offline: bool) -> ModerationResult<()> {
    let heuristics = LocalHeuristicAnalyzer::new();

    let verdict = if offline {
        heuristics.analyze_text(text)
    } else {
        let service = HttpAnalysisService::new(config)?;
        match service.analyze(&AnalysisRequest::text(text, "about:blank")).await {
            Ok(verdict) => verdict,
            Err(e) => {
                tracing::warn!("远程分析失败，使用本地分析: {}", e);
                heuristics.analyze_text(text)
            }
        }
    };

    println!("{}", serde_json::to_string_pretty(&verdict)?);
    Ok(())
}

fn read_input(input: &str) -> ModerationResult<Vec<u8>> {
    if input == "-" {
        let mut data = Vec::new();
        io::stdin().read_to_end(&mut data)?;
        Ok(data)
    } else {
        Ok(fs::read(input)?)
    }
}
