//! Kube Intent - Entry Point
//!
//! Translates natural-language requests into kubectl command lines and
//! optionally runs them. Without a subcommand it starts an interactive loop.

use clap::{Parser, Subcommand};
use kube_intent::command::{CommandExecutor, Vocabulary};
use kube_intent::core::error::Result;
use kube_intent::core::AgentConfig;
use kube_intent::llm::{DisabledFallback, FallbackAdapter, LlmClient, LlmFallback};
use kube_intent::pipeline::{CommandPipeline, CommandRequest};
use kube_intent::usage::{summarize, JsonlStore, NullSink, RecordSink, UsagePeriod, UsageSource};

use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::runtime::Runtime;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

type Pipeline = CommandPipeline<Box<dyn FallbackAdapter>>;

/// Natural language to kubectl
#[derive(Parser, Debug)]
#[command(name = "kube-intent")]
#[command(about = "Translate natural-language requests into kubectl commands")]
struct Args {
    /// Config file (defaults to ~/.aklp/config.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Session id attached to every record
    #[arg(long, global = true)]
    session: Option<Uuid>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the translated command as JSON
    Translate {
        #[arg(required = true)]
        text: Vec<String>,
    },
    /// Translate, then run the command
    Run {
        /// Execution timeout in seconds (overrides config)
        #[arg(long)]
        timeout: Option<u64>,

        #[arg(required = true)]
        text: Vec<String>,
    },
    /// Print aggregated token usage and cost
    Usage {
        /// today, month or all
        #[arg(long, default_value = "all")]
        period: UsagePeriod,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("kube_intent=info")),
        )
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();
    let mut config = AgentConfig::load(args.config.as_deref())?;
    if let Some(Command::Run {
        timeout: Some(secs),
        ..
    }) = &args.command
    {
        config.exec_timeout = std::time::Duration::from_secs(*secs);
        config.validate()?;
    }

    let store = open_store(&config);
    let rt = Runtime::new()?;

    match args.command {
        Some(Command::Usage { period }) => print_usage(&config, period),
        Some(Command::Translate { text }) => {
            let pipeline = build_pipeline(&config, record_sink(&store))?;
            let request = session_request(text.join(" "), args.session);
            let response = rt.block_on(pipeline.handle(&request));
            println!("{}", serde_json::to_string_pretty(&response)?);
            Ok(())
        }
        Some(Command::Run { text, .. }) => {
            let pipeline = build_pipeline(&config, record_sink(&store))?;
            let request = session_request(text.join(" "), args.session);
            let code = rt.block_on(translate_and_run(&pipeline, &request))?;
            std::process::exit(code);
        }
        None => {
            let pipeline = build_pipeline(&config, record_sink(&store))?;
            let session = args.session.unwrap_or_else(Uuid::new_v4);
            repl(&rt, &pipeline, &config, session)
        }
    }
}

fn open_store(config: &AgentConfig) -> Option<Arc<JsonlStore>> {
    match JsonlStore::open(&config.data_dir) {
        Ok(store) => Some(Arc::new(store)),
        Err(e) => {
            tracing::warn!(
                dir = %config.data_dir.display(),
                error = %e,
                "record store unavailable, outcomes will not be persisted"
            );
            None
        }
    }
}

fn record_sink(store: &Option<Arc<JsonlStore>>) -> Arc<dyn RecordSink> {
    match store {
        Some(store) => store.clone() as Arc<dyn RecordSink>,
        None => Arc::new(NullSink),
    }
}

fn build_pipeline(config: &AgentConfig, sink: Arc<dyn RecordSink>) -> Result<Pipeline> {
    let fallback: Box<dyn FallbackAdapter> = if config.api_key.is_some() {
        Box::new(LlmFallback::new(
            LlmClient::from_config(config)?,
            config.max_output_tokens,
            config.llm_timeout,
        ))
    } else {
        tracing::warn!("OPENAI_API_KEY not set - unmatched requests cannot be translated");
        Box::new(DisabledFallback)
    };

    let vocabulary = Vocabulary::load(config.vocabulary_path.as_deref())?;
    Ok(CommandPipeline::new(vocabulary, fallback)?
        .with_executor(CommandExecutor::new(config.exec_timeout))
        .with_sink(sink)
        .with_model(config.model.clone()))
}

fn session_request(text: String, session: Option<Uuid>) -> CommandRequest {
    let request = CommandRequest::new(text);
    match session {
        Some(id) => request.with_session(id),
        None => request,
    }
}

/// Returns the process exit code to report
async fn translate_and_run(pipeline: &Pipeline, request: &CommandRequest) -> Result<i32> {
    let response = pipeline.handle(request).await;
    let Some(command) = response.command.as_deref() else {
        eprintln!(
            "{}",
            response.error_message.as_deref().unwrap_or("translation failed")
        );
        return Ok(2);
    };

    eprintln!("$ {}", command);
    let result = pipeline
        .execute(command, &request.raw_command, request.session_id)
        .await?;
    if !result.stdout.is_empty() {
        println!("{}", result.stdout);
    }
    if !result.stderr.is_empty() {
        eprintln!("{}", result.stderr);
    }
    Ok(result.exit_code)
}

fn print_usage(config: &AgentConfig, period: UsagePeriod) -> Result<()> {
    let store = JsonlStore::open(&config.data_dir)?;
    let logs = store.usage_logs()?;
    let stats = summarize(&logs, period, chrono::Utc::now(), &config.pricing);
    println!("{}", serde_json::to_string_pretty(&stats)?);
    Ok(())
}

fn repl(rt: &Runtime, pipeline: &Pipeline, config: &AgentConfig, session: Uuid) -> Result<()> {
    println!("\n=== KUBE INTENT ===");
    println!("Type a request in Korean or English.");
    println!();
    println!("Commands:");
    println!("  <text>          - Translate to a kubectl command");
    println!("  !<text>         - Translate and run");
    println!("  usage           - Show token usage (all time)");
    println!("  quit / q        - Exit");
    println!();

    loop {
        print!("> ");
        io::stdout().flush()?;

        let mut input = String::new();
        if io::stdin().read_line(&mut input)? == 0 {
            break;
        }
        let input = input.trim();

        if input.is_empty() {
            continue;
        }

        if input == "quit" || input == "q" {
            break;
        }

        if input == "usage" {
            if let Err(e) = print_usage(config, UsagePeriod::All) {
                println!("Usage report failed: {}", e);
            }
            continue;
        }

        if let Some(text) = input.strip_prefix('!') {
            let request = CommandRequest::new(text.trim()).with_session(session);
            match rt.block_on(translate_and_run(pipeline, &request)) {
                Ok(code) => println!("(exit {})", code),
                Err(e) => println!("Execution failed: {}", e),
            }
            continue;
        }

        let request = CommandRequest::new(input).with_session(session);
        let response = rt.block_on(pipeline.handle(&request));
        match (&response.command, &response.error_message) {
            (Some(command), _) => {
                println!("  {}", command);
                if let Some(reason) = &response.reason {
                    println!("  - {}", reason);
                }
            }
            (None, Some(error)) => println!("  {}", error),
            (None, None) => println!("  (no result)"),
        }
    }

    println!("Goodbye!");
    Ok(())
}
