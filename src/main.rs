use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;
use uuid::Uuid;

use survey_drafter::stages::subject_bindings;
use survey_drafter::{
    load_survey_input, write_document_json, write_document_xml, AnthropicClient, AnthropicConfig,
    DraftMetadata, PipelineConfig, PromptSet, RetryPolicy, SurveyPipeline, TemplateId,
};

#[derive(Parser)]
#[command(name = "survey-drafter")]
#[command(author, version, about = "Staged LLM pipeline for drafting survey papers", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Draft a survey paper from a subject and a reference list
    Draft {
        /// Input file (dataset JSON record or Subjects/References text)
        #[arg(short, long)]
        input: PathBuf,

        /// Output file for the drafted document (JSON)
        #[arg(short, long)]
        output: PathBuf,

        /// Also write the document in the <Literature> XML layout
        #[arg(long)]
        xml: Option<PathBuf>,

        /// YAML file overriding prompt templates
        #[arg(long)]
        prompts: Option<PathBuf>,

        /// Structural attempts per stage
        #[arg(long, default_value = "3")]
        max_attempts: u32,

        /// Gateway retries per stage
        #[arg(long, default_value = "3")]
        gateway_retries: u32,

        /// Maximum model calls in flight
        #[arg(long, default_value = "4")]
        concurrency: usize,

        /// Model name (overrides SURVEY_MODEL)
        #[arg(long)]
        model: Option<String>,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Load an input file and summarize it without calling the model
    Inspect {
        #[arg(short, long)]
        input: PathBuf,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Print a rendered prompt for debugging templates
    Render {
        #[arg(short, long)]
        input: PathBuf,

        #[arg(short, long, value_enum)]
        template: RenderTemplate,

        /// YAML file overriding prompt templates
        #[arg(long)]
        prompts: Option<PathBuf>,
    },
}

/// Templates renderable from the input alone
#[derive(Clone, Copy, ValueEnum)]
enum RenderTemplate {
    Title,
    Outline,
}

impl From<RenderTemplate> for TemplateId {
    fn from(t: RenderTemplate) -> Self {
        match t {
            RenderTemplate::Title => TemplateId::Title,
            RenderTemplate::Outline => TemplateId::Outline,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Draft {
            input,
            output,
            xml,
            prompts,
            max_attempts,
            gateway_retries,
            concurrency,
            model,
            verbose,
        } => {
            setup_logging(verbose);
            let retry = RetryPolicy {
                max_gateway_retries: gateway_retries,
                ..RetryPolicy::default()
            }
            .with_max_attempts(max_attempts);
            let config = PipelineConfig {
                retry,
                concurrency: concurrency.max(1),
                prompts: load_prompts(prompts.as_ref())?,
            };
            draft_survey(input, output, xml, config, model).await
        }
        Commands::Inspect { input, verbose } => {
            setup_logging(verbose);
            inspect_input(input)
        }
        Commands::Render {
            input,
            template,
            prompts,
        } => {
            setup_logging(false);
            render_prompt(input, template.into(), prompts)
        }
    }
}

fn setup_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber).ok();
}

fn load_prompts(path: Option<&PathBuf>) -> Result<PromptSet> {
    match path {
        Some(path) => {
            info!("Loading prompt templates from {:?}", path);
            PromptSet::from_yaml_file(path)
        }
        None => Ok(PromptSet::default()),
    }
}

async fn draft_survey(
    input: PathBuf,
    output: PathBuf,
    xml: Option<PathBuf>,
    config: PipelineConfig,
    model: Option<String>,
) -> Result<()> {
    let run_id = Uuid::new_v4().to_string();
    info!("Run {}", run_id);

    info!("Loading survey input from {:?}", input);
    let survey = load_survey_input(&input).context("Failed to load survey input")?;
    info!(
        "Subject {:?}, {} references",
        survey.subject,
        survey.corpus.size()
    );

    let mut anthropic = AnthropicConfig::from_env()?;
    if let Some(model) = model {
        anthropic.model = model;
    }
    let client = AnthropicClient::new(anthropic)?;
    let model_name = client.model().to_string();

    let corpus = Arc::new(survey.corpus);
    let pipeline = SurveyPipeline::new(Arc::new(client), Arc::clone(&corpus), config);
    let document = pipeline
        .run(&survey.subject)
        .await
        .context("Survey drafting failed")?;

    let metadata = DraftMetadata::for_document(&run_id, model_name, &document);
    write_document_json(&document, &metadata, &output)?;
    info!("Output written to {:?}", output);

    if let Some(xml_path) = xml {
        write_document_xml(&document, &corpus, &xml_path)?;
        info!("XML output written to {:?}", xml_path);
    }

    if document.abstract_failure.is_some() {
        warn!("Abstract was not drafted");
    }
    for section in document.incomplete_sections() {
        match &section.failure {
            Some(failure) => warn!(
                "Section {:?} incomplete: {} failed after {} attempt(s): {}",
                section.heading, failure.stage, failure.attempts, failure.reason
            ),
            None => warn!("Section {:?} incomplete", section.heading),
        }
    }

    info!(
        "Run {} complete: {}/{} sections drafted",
        run_id,
        metadata.sections_complete,
        metadata.sections_total
    );

    Ok(())
}

fn inspect_input(input: PathBuf) -> Result<()> {
    info!("Inspecting survey input from {:?}", input);
    let survey = load_survey_input(&input).context("Failed to load survey input")?;

    let with_abstracts = survey
        .corpus
        .iter()
        .filter(|r| r.abstract_text.is_some())
        .count();

    println!("Survey Input");
    println!("============");
    println!("Subject: {}", survey.subject);
    println!("References: {}", survey.corpus.size());
    println!("With abstracts: {}", with_abstracts);
    println!();

    for reference in survey.corpus.iter() {
        println!("[{}] {}", reference.id, reference.text);
    }

    Ok(())
}

fn render_prompt(input: PathBuf, template: TemplateId, prompts: Option<PathBuf>) -> Result<()> {
    let survey = load_survey_input(&input).context("Failed to load survey input")?;
    let prompts = load_prompts(prompts.as_ref())?;

    let rendered = prompts.render(template, &subject_bindings(&survey.subject, &survey.corpus))?;
    println!("{}", rendered);

    Ok(())
}
