use std::{path::PathBuf, time::Duration};

use clap::Parser;
use sharepane_client::{
    BackendConnection, InvokeError, ViewModel,
    cli::{UserCommand, parse_user_command, render_rows},
    connect,
    settings::{SavedSettings, load_settings, save_settings_to_path, settings_path},
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_stream::StreamExt;
use tracing::{error, info, warn};
use url::Url;

const DEFAULT_BACKEND_URL: &str = "ws://127.0.0.1:9300/ws";
const SWEEP_INTERVAL: Duration = Duration::from_millis(250);

#[derive(Parser, Debug)]
#[command(name = "sharepane")]
struct ClientArgs {
    /// Backend bridge WebSocket URL. Falls back to the settings file, then the built-in default.
    #[arg(long)]
    backend_url: Option<String>,

    #[arg(long)]
    settings: Option<PathBuf>,

    /// How long a dismissed row stays before it is removed.
    #[arg(long)]
    dismiss_delay_ms: Option<u64>,

    /// Print rows as JSON instead of plain text.
    #[arg(long, default_value_t = false)]
    json: bool,

    /// Write the effective backend URL and dismiss delay back to the settings file.
    #[arg(long, default_value_t = false)]
    save: bool,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = ClientArgs::parse();
    let path = args.settings.clone().unwrap_or_else(settings_path);
    let mut settings = load_settings(&path);

    let backend_url = args
        .backend_url
        .clone()
        .or_else(|| settings.backend_url.clone())
        .unwrap_or_else(|| DEFAULT_BACKEND_URL.to_owned());
    let url = match Url::parse(&backend_url) {
        Ok(url) => url,
        Err(err) => {
            error!(backend_url = %backend_url, "invalid backend url: {err}");
            std::process::exit(2);
        }
    };

    if let Some(delay_ms) = args.dismiss_delay_ms {
        settings.dismiss_delay_ms = Some(delay_ms);
    }

    if args.save {
        settings.backend_url = Some(backend_url.clone());
        if let Err(err) = save_settings_to_path(&path, &settings) {
            warn!(path = %path.display(), "failed to save settings: {err}");
        } else {
            info!(path = %path.display(), "settings saved");
        }
    }

    let connection = match connect(&url).await {
        Ok(connection) => connection,
        Err(err) => {
            error!("{err}");
            std::process::exit(1);
        }
    };

    run(connection, &settings, args.json).await;
}

async fn run(connection: BackendConnection, settings: &SavedSettings, json: bool) {
    let BackendConnection {
        invoker,
        mut events,
        ..
    } = connection;
    let mut view = ViewModel::new(settings.visibility_filter(), settings.merge_strategy());
    let dismiss_delay = settings.dismiss_delay();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut sweep = tokio::time::interval(SWEEP_INTERVAL);

    print_rows(&view, json);

    loop {
        tokio::select! {
            event = events.next() => {
                let Some(event) = event else {
                    info!("backend event stream ended");
                    break;
                };
                view.apply_event(event);
                print_rows(&view, json);
            }
            line = lines.next_line() => {
                let line = match line {
                    Ok(Some(line)) => line,
                    Ok(None) => break,
                    Err(err) => {
                        warn!("stdin read failed: {err}");
                        break;
                    }
                };
                if line.trim().is_empty() {
                    continue;
                }
                match parse_user_command(&line) {
                    Ok(UserCommand::Quit) => break,
                    Ok(command) => {
                        if let Err(err) = handle_command(&mut view, &invoker, command, json).await {
                            error!("command failed: {err}");
                            eprintln!("error: {err}");
                        }
                    }
                    Err(err) => eprintln!("{err}"),
                }
            }
            _ = sweep.tick() => {
                let removed = view.sweep_removals(std::time::Instant::now(), dismiss_delay);
                if !removed.is_empty() {
                    print_rows(&view, json);
                }
            }
        }
    }
}

async fn handle_command(
    view: &mut ViewModel,
    invoker: &sharepane_client::WsInvoker,
    command: UserCommand,
    json: bool,
) -> Result<(), InvokeError> {
    match command {
        UserCommand::Action { id, intent } => view.send_cmd(invoker, &id, intent).await?,
        UserCommand::Send { id } => {
            if !view.send_info(invoker, &id).await? {
                eprintln!("nothing to send to {id}");
            }
        }
        UserCommand::Stage(payload) => view.stage_payload(invoker, payload).await?,
        UserCommand::Clear => {
            view.clear_sending(invoker).await?;
            print_rows(view, json);
        }
        UserCommand::Dismiss { id } => view.schedule_removal(&id, std::time::Instant::now()),
        UserCommand::List => print_rows(view, json),
        UserCommand::Quit => {}
    }
    Ok(())
}

fn print_rows(view: &ViewModel, json: bool) {
    let rows = view.displayed_items();
    if json {
        match serde_json::to_string(&rows) {
            Ok(text) => println!("{text}"),
            Err(err) => warn!("failed to encode rows: {err}"),
        }
    } else {
        print!("{}", render_rows(&rows));
    }
}
