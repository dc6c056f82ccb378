use autonomais_rs::adk::agent::run_interruptible;
use autonomais_rs::adk::model::openai::OpenAIModel;
use autonomais_rs::adk::model::{Content, Model};
use autonomais_rs::autonomais::config::RunSettings;
use autonomais_rs::autonomais::workflow::checkpoint::{Checkpointer, SqliteCheckpointer};
use autonomais_rs::autonomais::workflow::graph::{final_text, RunConfig};
use autonomais_rs::autonomais::workflow::loader::WorkflowLoader;
use autonomais_rs::autonomais::workflow::registry::ToolRegistry;
use autonomais_rs::autonomais::workflow::runner::GraphRunner;
use clap::Parser;
use dotenv::dotenv;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio_util::sync::CancellationToken;

#[derive(Parser, Debug)]
#[command(author, version, about = "Run a graph workflow as a chat session", long_about = None)]
struct Args {
    /// Path to the workflow YAML file
    workflow: PathBuf,

    /// First message to send before reading stdin
    #[arg(short, long)]
    prompt: Option<String>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,

    /// Conversation thread id (defaults to a new one)
    #[arg(long)]
    thread: Option<String>,
}

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    dotenv().ok();
    let args = Args::parse();

    let mut logger = env_logger::Builder::from_default_env();
    if args.verbose {
        logger.filter_level(log::LevelFilter::Debug);
    }
    logger.init();

    let model: Arc<dyn Model> = Arc::new(OpenAIModel::from_env()?);
    let settings = RunSettings::from_env()?;

    let checkpointer: Option<Arc<dyn Checkpointer>> = match &settings.checkpoint_db {
        Some(path) => Some(Arc::new(SqliteCheckpointer::open(path)?)),
        None => None,
    };

    let registry = ToolRegistry::new();
    let nodes = WorkflowLoader::new(registry).load_workflow(&args.workflow).await?;
    let runner = GraphRunner::make(model, nodes, checkpointer.clone())?
        .with_max_steps(settings.max_steps);

    let thread_id = args
        .thread
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    log::info!("Session thread: {}", thread_id);

    let mut session = Session {
        runner,
        thread_id,
        max_steps: settings.max_steps,
        persistent: checkpointer.is_some(),
        history: vec![],
    };

    if let Some(prompt) = args.prompt {
        session.turn(prompt).await;
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        prompt_marker().await?;
        // Ctrl-C while idle ends the session
        let next = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = next else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "/quit" || line == "/exit" {
            break;
        }
        session.turn(line.to_string()).await;
    }

    Ok(())
}

struct Session {
    runner: GraphRunner,
    thread_id: String,
    max_steps: usize,
    /// Checkpoints carry the conversation, so only new messages are sent
    persistent: bool,
    history: Vec<Content>,
}

impl Session {
    async fn turn(&mut self, input: String) {
        let message = Content::user(input);
        let messages = if self.persistent {
            vec![message]
        } else {
            let mut messages = self.history.clone();
            messages.push(message);
            messages
        };

        let cancel = CancellationToken::new();
        let config = RunConfig::default()
            .with_thread(self.thread_id.clone())
            .with_cancel(cancel.clone())
            .with_max_steps(self.max_steps);
        let result = run_interruptible(
            &cancel,
            tokio::signal::ctrl_c(),
            self.runner.run(messages, &config),
        )
        .await;

        match result {
            Ok(state) => {
                println!("AI: {}", final_text(&state));
                if !self.persistent {
                    self.history = state.messages;
                }
            }
            Err(e) if e.is_cancelled() => println!("(cancelled)"),
            Err(e) => {
                log::error!("Run failed: {}", e);
                println!("Error: {}", e);
            }
        }
    }
}

async fn prompt_marker() -> std::io::Result<()> {
    let mut stdout = tokio::io::stdout();
    stdout.write_all(b"> ").await?;
    stdout.flush().await
}
