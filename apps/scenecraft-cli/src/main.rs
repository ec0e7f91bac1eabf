use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use scenecraft_assets::{ConfigLoader, ObjectDatabase, Registry};
use scenecraft_common::Category;
use scenecraft_modifiers::{SceneUi, TextUi};
use scenecraft_render::{DebugTextRenderer, RenderView, Renderer};
use scenecraft_scene::Workspace;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "scenecraft-cli", about = "CLI tool for scenecraft projects")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print version and crate info
    Info,
    /// Load every config of a project and report failures
    Validate {
        /// Project file
        project: PathBuf,
    },
    /// Assemble a node with its pre-connects and print the scene
    Assemble {
        /// Project file
        project: PathBuf,
        /// Node to assemble; defaults to the project's central node
        node: Option<String>,
        /// Apply an input before printing, as `modifier=input`
        #[arg(short, long = "select", value_parser = parse_selection)]
        selections: Vec<(String, usize)>,
    },
}

fn parse_selection(s: &str) -> Result<(String, usize), String> {
    let (key, input) = s
        .split_once('=')
        .ok_or_else(|| format!("expected modifier=input, got '{s}'"))?;
    let input = input
        .parse()
        .map_err(|e| format!("invalid input '{input}': {e}"))?;
    Ok((key.to_owned(), input))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match cli.command {
        Commands::Info => {
            println!("scenecraft-cli v{}", env!("CARGO_PKG_VERSION"));
            println!("schema: {}", scenecraft_schema::crate_info());
            println!("render: {}", scenecraft_render::crate_info());
            println!("assets: {}", scenecraft_assets::crate_info());
            println!("scene: {}", scenecraft_scene::crate_info());
            println!("modifiers: {}", scenecraft_modifiers::crate_info());
        }
        Commands::Validate { project } => {
            let workspace = open(&project)?;
            let registry = &workspace.registry;
            let failures = validate(Category::TexturePacks, &workspace.texture_packs, registry).await
                + validate(Category::Materials, &workspace.materials, registry).await
                + validate(Category::Models, &workspace.models, registry).await
                + validate(Category::Modifiers, &workspace.modifiers, registry).await
                + validate(Category::Nodes, &workspace.nodes, registry).await;
            if failures > 0 {
                bail!("{failures} config(s) failed to load");
            }
            println!("All configs OK");
        }
        Commands::Assemble {
            project,
            node,
            selections,
        } => {
            let workspace = open(&project)?;
            let registry = &workspace.registry;
            let assembled = match &node {
                Some(key) => workspace.assemble(key).await?,
                None => workspace.assemble_central().await?,
            };
            let Some(mut graph) = assembled else {
                bail!(
                    "no node config for '{}'",
                    node.or(workspace.project.central_node.clone())
                        .unwrap_or_default()
                );
            };

            let host = TextUi::new();
            let mut ui = SceneUi::new(host.clone(), workspace.project.material_previews.clone());
            let events = graph.drain_events();
            ui.handle_events(events, &mut graph, registry).await;

            for (key, input) in selections {
                let Some(index) = ui.modifiers().position(|(_, m)| m.state().key == key) else {
                    bail!("no modifier '{key}' in the assembled scene");
                };
                ui.apply_input(index, input, &mut graph, registry)
                    .await
                    .with_context(|| format!("applying input {input} to '{key}'"))?;
            }

            for line in host.transcript() {
                println!("{line}");
            }
            println!(
                "Graph: nodes={}, connections={}",
                graph.node_count(),
                graph.connection_count()
            );
            print!(
                "{}",
                DebugTextRenderer::new().render(&graph.scene(), &RenderView::default())
            );
        }
    }

    Ok(())
}

fn open(project: &Path) -> anyhow::Result<Workspace> {
    Workspace::from_project_file(project)
        .with_context(|| format!("opening project {}", project.display()))
}

/// Load each key separately so every failure is reported.
async fn validate<L: ConfigLoader>(
    category: Category,
    database: &ObjectDatabase<L>,
    registry: &Registry,
) -> usize {
    let mut failures = 0;
    for key in database.keys() {
        match database.load(registry, &key).await {
            Ok(_) => tracing::debug!(%category, %key, "loaded"),
            Err(e) => {
                println!("{category}/{key}: {e}");
                failures += 1;
            }
        }
    }
    println!("{category}: {} config(s), {failures} failed", database.len());
    failures
}
