//! tola-head - resolve head entries from the command line.

mod cli;

use anyhow::{Context, Result, bail};
use clap::Parser;
use cli::{Cli, Commands, InputArgs};
use serde_json::Value;
use std::{fs, path::Path};
use tola_head::{
    ClientHead, EntryOptions, Head, HeadConfig, HeadInput, MemoryDom, TagKind, logger,
    plugins::{CanonicalPlugin, InferSeoMetaPlugin},
    render_ssr_head,
    ssr::writer::{into_string, new_writer, render_attrs, write_tag},
};

const DEFAULT_CONFIG: &str = "head.toml";

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logger::set_enabled(cli.verbose);
    let config = load_config(&cli)?;

    match &cli.command {
        Commands::Render { args, client, json } => {
            let head = load_head(args, config.clone())?;
            let ssr = render_ssr_head(&head).await?;
            if *json {
                println!("{}", serde_json::to_string_pretty(&ssr)?);
            } else {
                println!("<html {}>", ssr.html_attrs);
                println!("<head>\n{}\n</head>", ssr.head_tags);
                println!("<body {}>", ssr.body_attrs);
                println!("{}\n{}", ssr.body_tags_open, ssr.body_tags);
                println!("</body>\n</html>");
            }
            if *client {
                hydrate(&head, args, config).await?;
            }
        }
        Commands::Tags { args } => {
            let head = load_head(args, config)?;
            for tag in head.resolve_tags().await {
                let line = match tag.kind {
                    TagKind::HtmlAttrs | TagKind::BodyAttrs => {
                        format!("{} {}", tag.kind, render_attrs(&tag.props))
                    }
                    _ => {
                        let mut writer = new_writer();
                        write_tag(&mut writer, &tag)?;
                        into_string(writer)
                    }
                };
                println!("{:<28} {line}", tag.render_key());
            }
        }
    }
    Ok(())
}

/// Explicit `--config` must exist; the default file is optional.
fn load_config(cli: &Cli) -> Result<HeadConfig> {
    match &cli.config {
        Some(path) => Ok(HeadConfig::from_path(path)?),
        None if Path::new(DEFAULT_CONFIG).exists() => {
            Ok(HeadConfig::from_path(Path::new(DEFAULT_CONFIG))?)
        }
        None => Ok(HeadConfig::default()),
    }
}

fn read_entries(path: &Path) -> Result<Vec<Value>> {
    let content =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    let value: Value = serde_json::from_str(&content)
        .with_context(|| format!("{} is not valid JSON", path.display()))?;
    match value {
        Value::Array(entries) => Ok(entries),
        Value::Object(_) => Ok(vec![value]),
        _ => bail!("{} must hold an object or an array of objects", path.display()),
    }
}

fn install_plugins(head: &Head, args: &InputArgs) {
    if let Some(base_url) = &args.base_url {
        head.use_plugin(CanonicalPlugin::new(base_url));
    }
    if args.infer_seo {
        head.use_plugin(InferSeoMetaPlugin::default());
    }
}

fn push_entries(head: &Head, entries: Vec<Value>) {
    for entry in entries {
        head.push(HeadInput::from_json(entry), EntryOptions::default());
    }
}

fn load_head(args: &InputArgs, config: HeadConfig) -> Result<Head> {
    let entries = read_entries(&args.input)?;
    let head = Head::with_config(tola_head::RenderTarget::Server, config);
    install_plugins(&head, args);
    push_entries(&head, entries);
    Ok(head)
}

/// Replay the entries on a client head over the server document.
async fn hydrate(server: &Head, args: &InputArgs, config: HeadConfig) -> Result<()> {
    let dom = MemoryDom::from_server(&server.resolve().await, &config);
    let head = Head::with_config(tola_head::RenderTarget::Client, config);
    install_plugins(&head, args);
    let mut client = ClientHead::new(head, dom)?;
    push_entries(client.head(), read_entries(&args.input)?);

    let summary = client.render().await;
    eprintln!(
        "client: hydrated={} created={} adopted={} patched={} removed={} writes={}",
        summary.hydrated,
        summary.created,
        summary.adopted,
        summary.patched,
        summary.removed,
        client.dom().writes()
    );
    Ok(())
}
