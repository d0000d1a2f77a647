use std::env;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use dashwall::compose::{ComposeOptions, Composer, Services};
use dashwall::config::{self, DashwallConfig};
use dashwall::live::static_page;
use dashwall::quotes::{HttpQuoteSource, QuoteSource};
use dashwall::render::RenderRegistry;
use dashwall::store::{DashboardStore, JsonFileStore};
use dashwall::{forms, logging, state, DashboardId, DashwallError, SchemaError, WidgetOptions};
use serde_json::json;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{err}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), DashwallError> {
    let mut args = env::args().skip(1);
    let Some(command) = args.next() else {
        print_help();
        return Ok(());
    };
    let rest: Vec<String> = args.collect();

    match command.as_str() {
        "-h" | "--help" => {
            print_help();
            Ok(())
        }
        "render" => cmd_render(rest),
        "serve" => cmd_serve(rest),
        "types" => {
            for widget_type in RenderRegistry::builtin().types() {
                println!("{widget_type}");
            }
            Ok(())
        }
        "schema" => {
            let Some(widget_type) = rest.first() else {
                print_help();
                return Ok(());
            };
            cmd_schema(widget_type)
        }
        other => Err(DashwallError::Usage(format!(
            "unknown command `{other}` (see `dashwall --help`)"
        ))),
    }
}

fn print_help() {
    println!(
        "dashwall\n\nUSAGE:\n  dashwall <COMMAND>\n\nCOMMANDS:\n  render <dashboard-id> [--config <path>] [--live]\n  serve [--config <path>]\n  types\n  schema <type>\n\n  -h, --help"
    );
}

fn consume_flag(args: &[String], flag: &str) -> (bool, Vec<String>) {
    let present = args.iter().any(|arg| arg == flag);
    let rest = args.iter().filter(|arg| *arg != flag).cloned().collect();
    (present, rest)
}

fn consume_value(args: &[String], flag: &str) -> Result<(Option<String>, Vec<String>), DashwallError> {
    let mut value = None;
    let mut rest = Vec::new();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        if arg == flag {
            let Some(next) = iter.next() else {
                return Err(DashwallError::Usage(format!("{flag} expects a value")));
            };
            value = Some(next.clone());
        } else {
            rest.push(arg.clone());
        }
    }
    Ok((value, rest))
}

struct Setup {
    config: DashwallConfig,
    config_dir: Option<PathBuf>,
}

fn setup(args: &[String]) -> Result<(Setup, Vec<String>), DashwallError> {
    let (config_path, rest) = consume_value(args, "--config")?;
    let config_path = config_path.map(PathBuf::from);
    let config = config::load(config_path.as_deref())?;
    logging::init(&config.logging);
    let config_dir = config_path
        .as_deref()
        .and_then(Path::parent)
        .map(Path::to_path_buf);
    Ok((Setup { config, config_dir }, rest))
}

fn runtime() -> Result<tokio::runtime::Runtime, DashwallError> {
    Ok(tokio::runtime::Builder::new_multi_thread().enable_all().build()?)
}

fn quote_source(config: &DashwallConfig) -> Result<Arc<dyn QuoteSource>, DashwallError> {
    Ok(Arc::new(HttpQuoteSource::new(&config.currency.endpoint, config.quote_timeout())?))
}

fn cmd_render(args: Vec<String>) -> Result<(), DashwallError> {
    let (live, args) = consume_flag(&args, "--live");
    let (setup, rest) = setup(&args)?;
    let Some(dashboard_id) = rest.first() else {
        return Err(DashwallError::Usage("render expects a dashboard id".to_string()));
    };
    let dashboard_id = DashboardId::new(dashboard_id.as_str());
    let store_path = setup.config.store_path(setup.config_dir.as_deref());
    let quotes = quote_source(&setup.config)?;

    runtime()?.block_on(async move {
        let store: Arc<dyn DashboardStore> = Arc::new(JsonFileStore::open(&store_path).await?);
        let (bridge, mut writer) = state::channel(store.clone());
        let services = Services::system(
            tokio::runtime::Handle::current(),
            quotes,
            setup.config.render_settings(),
        );
        let mut composer = Composer::new(RenderRegistry::builtin(), store, bridge, services);
        let options = if live {
            ComposeOptions::live()
        } else {
            ComposeOptions::static_markup()
        };
        let view = composer.compose_view(&dashboard_id, options).await?;
        composer.teardown();
        writer.flush().await;
        println!("{}", static_page(&view));
        Ok::<(), DashwallError>(())
    })
}

fn cmd_serve(args: Vec<String>) -> Result<(), DashwallError> {
    let (setup, _) = setup(&args)?;
    let store_path = setup.config.store_path(setup.config_dir.as_deref());
    let quotes = quote_source(&setup.config)?;
    runtime()?.block_on(async move {
        let store: Arc<dyn DashboardStore> = Arc::new(JsonFileStore::open(&store_path).await?);
        dashwall::live::serve(setup.config, store, quotes).await?;
        Ok::<(), DashwallError>(())
    })
}

fn cmd_schema(widget_type: &str) -> Result<(), DashwallError> {
    let defaults = WidgetOptions::defaults(widget_type)?;
    let form = forms::descriptor(widget_type)
        .ok_or_else(|| SchemaError::UnknownType(widget_type.to_string()))?;
    let output = json!({
        "type": widget_type,
        "defaults": defaults.to_value(),
        "form": form,
    });
    let text = serde_json::to_string_pretty(&output).map_err(|err| DashwallError::Io(std::io::Error::other(err)))?;
    println!("{text}");
    Ok(())
}
