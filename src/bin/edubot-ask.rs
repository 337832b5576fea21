use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};

use edubot_gateway::{
    AppConfig, GenerationParameters, GenerationPipeline,
    config::{load_dotenv, parse_url},
    telemetry::init_tracing,
};

/// Send prompts through the EduBot generation pipeline.
#[derive(Debug, Parser)]
#[command(name = "edubot-ask", version)]
struct Cli {
    /// Prompt to send. Without it, prompts are read line by line from stdin.
    prompt: Option<String>,

    /// Try a running EduBot proxy first (e.g. http://localhost:5000/api/generate),
    /// falling over to the model endpoint if it cannot be reached.
    #[arg(long)]
    backend: Option<String>,

    /// Override the model endpoint URL.
    #[arg(long)]
    upstream: Option<String>,

    #[arg(long)]
    max_length: Option<u32>,

    #[arg(long)]
    temperature: Option<f64>,

    #[arg(long)]
    top_p: Option<f64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_dotenv();
    init_tracing();

    let cli = Cli::parse();
    let mut config = AppConfig::from_env()?;
    if let Some(raw) = cli.backend.as_deref() {
        config.backend_url = Some(parse_url("--backend", raw)?);
    }
    if let Some(raw) = cli.upstream.as_deref() {
        config.upstream_url = parse_url("--upstream", raw)?;
    }

    let pipeline = GenerationPipeline::from_config(&config)?;
    let parameters = GenerationParameters {
        max_length: cli.max_length,
        temperature: cli.temperature,
        top_p: cli.top_p,
    };

    if let Some(prompt) = cli.prompt {
        let result = pipeline.generate(&prompt, &parameters).await?;
        println!("{}", result.text());
        return Ok(());
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match pipeline.generate(&line, &parameters).await {
            Ok(result) => println!("{}", result.text()),
            Err(err) => eprintln!("{err}"),
        }
    }

    Ok(())
}
