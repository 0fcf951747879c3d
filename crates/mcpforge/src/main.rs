//! A minimal stdin/stdout host demonstrating the command surface described
//! in `spec.md` §6, wired over [`mcpforge::McpForge`]. This is not the
//! product the core ships as a library for — a real host is a GUI or a
//! scripting environment — but it is a faithful enough driver to exercise
//! every boundary end to end: `<server>:<tool> [args | help]`, `gemini
//! "<prompt>"`, `gemini-mcp "<prompt>"`, plus a handful of admin commands
//! for managing servers from a config file.

use std::io::{self, BufRead, Write};
use std::sync::Arc;

use anyhow::{Context, Result};
use mcpforge_command::{CommandSpec, parse_arguments};
use mcpforge_config::ConfigBlob;
use mcpforge_core::McpForgeError;
use mcpforge_llm::GeminiBackendFactory;
use tracing::{error, info};

use mcpforge::McpForge;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::from_default_env()).init();

    let config_path = ConfigBlob::default_path().context("resolving config path")?;
    let blob = ConfigBlob::load(&config_path).context("loading persisted config")?;
    info!(path = %config_path.display(), servers = blob.servers.len(), "loaded config");

    let app = Arc::new(McpForge::<GeminiBackendFactory>::new(blob.gemini.clone()));
    app.load_config(&blob).await;

    println!("mcpforge ready. Type `help` for the command surface, `quit` to exit.");
    repl(app).await
}

async fn repl(app: Arc<McpForge<GeminiBackendFactory>>) -> Result<()> {
    let stdin = io::stdin();
    loop {
        print!("> ");
        io::stdout().flush().ok();

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "quit" || line == "exit" {
            app.shutdown().await;
            break;
        }

        if let Err(e) = dispatch_line(&app, line).await {
            eprintln!("{e}");
        }
    }
    Ok(())
}

async fn dispatch_line(app: &Arc<McpForge<GeminiBackendFactory>>, line: &str) -> Result<()> {
    match line.split_once(' ') {
        Some(("connect", name)) => connect(app, name.trim()).await,
        Some(("disconnect", name)) => disconnect(app, name.trim()).await,
        Some(("resources", name)) => resources(app, name.trim()).await,
        Some(("prompts", name)) => prompts(app, name.trim()).await,
        None if line == "status" => status(app).await,
        None if line == "help" => {
            print_help();
            Ok(())
        },
        Some(("gemini-mcp", prompt)) => gemini_mcp(app, unquote_prompt(prompt)).await,
        Some(("gemini", prompt)) => gemini(app, unquote_prompt(prompt)).await,
        _ => command(app, line).await,
    }
}

fn print_help() {
    println!("connect <name>          connect a configured server");
    println!("disconnect <name>       disconnect a server");
    println!("status                  list every configured server's connection state");
    println!("resources <name>        list resources exposed by a connected server");
    println!("prompts <name>          list prompts exposed by a connected server");
    println!("<server>:<tool> [args]  invoke a tool; `help` as the argument shows its usage");
    println!("gemini \"<prompt>\"       a single LLM turn, no tool access");
    println!("gemini-mcp \"<prompt>\"   an LLM turn with MCP tool access across connected servers");
    println!("quit                    disconnect everything and exit");
}

async fn resources(app: &Arc<McpForge<GeminiBackendFactory>>, name: &str) -> Result<()> {
    let resources = app.registry.list_resources(name).await?;
    if resources.is_empty() {
        println!("{name} exposes no resources");
    }
    for resource in resources {
        println!("{}  {}", resource.uri, resource.description.unwrap_or_default());
    }
    Ok(())
}

async fn prompts(app: &Arc<McpForge<GeminiBackendFactory>>, name: &str) -> Result<()> {
    let prompts = app.registry.list_prompts(name).await?;
    if prompts.is_empty() {
        println!("{name} exposes no prompts");
    }
    for prompt in prompts {
        println!("{}  {}", prompt.name, prompt.description.unwrap_or_default());
    }
    Ok(())
}

fn unquote_prompt(raw: &str) -> &str {
    let trimmed = raw.trim();
    trimmed.strip_prefix('"').and_then(|s| s.strip_suffix('"')).unwrap_or(trimmed)
}

async fn connect(app: &Arc<McpForge<GeminiBackendFactory>>, name: &str) -> Result<()> {
    match app.registry.connect(name).await {
        Ok(()) => {
            println!("{name} connected");
            Ok(())
        },
        Err(e) => {
            error!(server = %name, error = %e, "connect failed");
            Err(e.into())
        },
    }
}

async fn disconnect(app: &Arc<McpForge<GeminiBackendFactory>>, name: &str) -> Result<()> {
    app.registry.disconnect(name).await?;
    println!("{name} disconnected");
    Ok(())
}

async fn status(app: &Arc<McpForge<GeminiBackendFactory>>) -> Result<()> {
    for status in app.registry.statuses().await {
        let state = if status.connected {
            "connected".to_string()
        } else if let Some(remaining) = status.cooldown_remaining_ms {
            format!("cooldown ({remaining}ms remaining)")
        } else {
            "disconnected".to_string()
        };
        println!("{:<20} {} ({} tools)", status.name, state, status.tools.len());
    }
    Ok(())
}

/// Parse `<server>:<tool> rest` and either print `help` or run the tool via
/// the same parser/validator/render pipeline the command surface uses
/// (§4.7), bypassing the `CommandHost`/`BackgroundExecutor` abstractions
/// since this demo host has no dispatcher tree of its own to rebuild.
async fn command(app: &Arc<McpForge<GeminiBackendFactory>>, line: &str) -> Result<()> {
    let Some((qualified, rest)) = line.split_once(' ').map(|(a, b)| (a, b)) else {
        anyhow::bail!("unrecognized command `{line}`; try `help`");
    };
    let Some((server, tool)) = qualified.split_once(':') else {
        anyhow::bail!("unrecognized command `{line}`; try `help`");
    };

    let descriptors = app.registry.tools_for(server).await;
    let Some(descriptor) = descriptors.iter().find(|t| t.name == tool) else {
        anyhow::bail!("no such tool `{qualified}` (server disconnected or tool unknown)");
    };
    let spec = CommandSpec::from_tool(descriptor);

    if rest.trim() == "help" {
        println!("{}", spec.help_text());
        return Ok(());
    }

    let arguments = match parse_arguments(rest, &spec.params) {
        Ok(args) => args,
        Err(McpForgeError::SchemaError(message)) => anyhow::bail!("Argument parsing failed: {message}"),
        Err(e) => return Err(e.into()),
    };
    let missing = mcpforge_command::missing_required(&arguments, &spec.required);
    if !missing.is_empty() {
        println!("Missing required parameters. Usage: {}", spec.usage());
        return Ok(());
    }

    match app.registry.call_tool(server, tool, arguments).await {
        Ok(outcome) => println!("{}", outcome.render_for_command()),
        Err(e) => println!("Tool Error: {e}"),
    }
    Ok(())
}

async fn gemini(app: &Arc<McpForge<GeminiBackendFactory>>, prompt: &str) -> Result<()> {
    if let Some(remaining) = app.check_cooldown("repl").await {
        println!("gemini is cooling down, try again in {}ms", remaining.as_millis());
        return Ok(());
    }
    let config = app.llm_config().await;
    println!("{}", app.exec_loop.simple(&config, prompt).await);
    Ok(())
}

async fn gemini_mcp(app: &Arc<McpForge<GeminiBackendFactory>>, prompt: &str) -> Result<()> {
    if let Some(remaining) = app.check_cooldown("repl").await {
        println!("gemini-mcp is cooling down, try again in {}ms", remaining.as_millis());
        return Ok(());
    }
    let config = app.llm_config().await;
    let result = app.exec_loop.with_tools(&config, prompt, &Default::default()).await;
    println!("{}", result.text);
    if !result.tool_calls.is_empty() {
        let summary: Vec<String> = result
            .tool_calls
            .iter()
            .map(|c| {
                if c.success {
                    format!("{}:{} ({}ms)", c.server, c.tool, c.duration_ms)
                } else {
                    format!("{}:{} ({}ms, failed)", c.server, c.tool, c.duration_ms)
                }
            })
            .collect();
        println!("[tools used: {}]", summary.join(", "));
    }
    Ok(())
}
