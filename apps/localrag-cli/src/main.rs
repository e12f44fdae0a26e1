mod cli;

use std::path::Path;

use anyhow::{bail, Context};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::runtime::Runtime;
use tracing_subscriber::EnvFilter;

use localrag_core::config::{resolve_with_base, Config, Settings};
use localrag_core::corpus::load_directory;
use localrag_core::{Error, GenerationClient, Prompt};
use localrag_embed::EmbeddingBackend;
use localrag_generate::GenerationBackend;
use localrag_pipeline::eval::{parse_questions, run_eval};
use localrag_pipeline::{Pipeline, PipelineConfig};
use localrag_vector::IndexStore;

use cli::{Cli, Command};

/// Stand-in generator for commands that never generate.
struct NoGeneration;

impl GenerationClient for NoGeneration {
    fn generate(&self, _prompt: &Prompt) -> localrag_core::Result<String> {
        Err(Error::GenerationFailed("generation is not available during ingest".to_string()))
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let config = Config::load().context("loading configuration")?;
    let settings = config.settings()?;
    let base = std::env::current_dir()?;
    let rt = Runtime::new()?;
    let store_dir = resolve_with_base(&base, &settings.index.store_dir);
    let store = rt.block_on(IndexStore::open(&store_dir, &settings.index.table_prefix))?;

    match cli.command {
        Command::Ingest { dir } => {
            let dir = dir.unwrap_or_else(|| resolve_with_base(&base, &settings.corpus.dir));
            ingest(&rt, &store, &settings, &dir)
        }
        Command::Ask { question, json } => {
            let pipeline = serving_pipeline(&rt, &store, &settings)?;
            let result = pipeline.answer(&question)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                println!("{}", result.answer.trim());
                if !result.sources.is_empty() {
                    println!("\nSources:");
                    for (n, s) in result.sources.iter().enumerate() {
                        let title = s.title.as_deref().unwrap_or(&s.doc_id);
                        println!("  [{}] {} ({}, chars {}..{}, score {:.3})", n + 1, s.chunk_id, title, s.start, s.end, s.score);
                    }
                }
            }
            Ok(())
        }
        Command::Eval { file, log } => {
            let text = std::fs::read_to_string(&file).with_context(|| format!("reading {}", file.display()))?;
            let questions = parse_questions(&text);
            if questions.is_empty() {
                bail!("{} contains no questions", file.display());
            }
            let pipeline = serving_pipeline(&rt, &store, &settings)?;
            let report = run_eval(&pipeline, &questions);
            std::fs::write(&log, report.to_json_pretty()?).with_context(|| format!("writing {}", log.display()))?;
            println!(
                "{} questions, {} failed; avg retrieval {:.3}s, avg generation {:.3}s; log written to {}",
                report.queries.len(),
                report.failures,
                report.avg_retrieval_secs,
                report.avg_generation_secs,
                log.display()
            );
            Ok(())
        }
        Command::Status => {
            match rt.block_on(store.load_active())? {
                Some(index) => {
                    println!("active index: {}", index.version());
                    println!("entries:      {}", index.len());
                    println!("dimension:    {}", index.dim());
                    println!("embedder:     {}", index.embedder_id());
                }
                None => println!("no active index in {}; run `localrag ingest`", store_dir.display()),
            }
            Ok(())
        }
    }
}

fn ingest(rt: &Runtime, store: &IndexStore, settings: &Settings, dir: &Path) -> anyhow::Result<()> {
    let documents = load_directory(dir, &settings.corpus)?;
    if documents.is_empty() {
        bail!("no documents found in {}", dir.display());
    }
    let embedder = EmbeddingBackend::from_config(&settings.embedding)?;
    let pipeline = Pipeline::new(PipelineConfig::from(settings), embedder, NoGeneration)?;

    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} chunks ({percent}%)")?
            .progress_chars("#>-"),
    );
    let report = pipeline.build_index_with_progress(&documents, &pb)?;
    let table = rt.block_on(store.save(&pipeline.index()))?;

    println!(
        "indexed {} documents into {} chunks (dim {}); snapshot {} is active",
        report.documents, report.chunks, report.dimension, table
    );
    Ok(())
}

fn serving_pipeline(
    rt: &Runtime,
    store: &IndexStore,
    settings: &Settings,
) -> anyhow::Result<Pipeline<EmbeddingBackend, GenerationBackend>> {
    let embedder = EmbeddingBackend::from_config(&settings.embedding)?;
    let generator = GenerationBackend::from_config(&settings.generation)?;
    let pipeline = Pipeline::new(PipelineConfig::from(settings), embedder, generator)?;
    match rt.block_on(store.load_active())? {
        Some(index) => pipeline.install_index(index)?,
        None => tracing::warn!("no active index; every question will be answered out of scope"),
    }
    Ok(pipeline)
}
