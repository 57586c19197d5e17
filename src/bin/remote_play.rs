use std::env;
use std::path::PathBuf;
use tracing::{error, info, warn};

use synctify::api::ApiClient;
use synctify::config::Config;
use synctify::playback::{PlayApi, PlayQueue, PlayRequest, PlayerError, WebPlayApi};
use synctify::session::SharedSession;

/// Start playback on a device through the remote play endpoint, using the
/// stored session. Useful for checking tokens and queue windows without a UI.
#[tokio::main]
async fn main() {
    let log_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt().with_env_filter(log_filter).init();

    let args: Vec<String> = env::args().collect();

    let mut device_id: Option<String> = None;
    let mut queue_file: Option<PathBuf> = None;
    let mut track: Option<String> = None;
    let mut index: Option<usize> = None;
    let mut refresh_first = false;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--device" | "--track" | "--queue" | "--index" => {
                if i + 1 >= args.len() {
                    error!("{} requires a value", args[i]);
                    print_usage(&args[0]);
                    std::process::exit(1);
                }
                let value = args[i + 1].clone();
                match args[i].as_str() {
                    "--device" => device_id = Some(value),
                    "--track" => track = Some(value),
                    "--queue" => queue_file = Some(PathBuf::from(value)),
                    _ => match value.parse() {
                        Ok(parsed) => index = Some(parsed),
                        Err(_) => {
                            error!("--index expects a non-negative number, got '{}'", value);
                            std::process::exit(1);
                        }
                    },
                }
                i += 2;
            }
            "--refresh" => {
                refresh_first = true;
                i += 1;
            }
            "--help" | "-h" => {
                print_usage(&args[0]);
                return;
            }
            _ => {
                error!("Unknown argument: {}", args[i]);
                print_usage(&args[0]);
                std::process::exit(1);
            }
        }
    }

    let Some(device_id) = device_id else {
        error!("--device is required");
        print_usage(&args[0]);
        std::process::exit(1);
    };

    let config = Config::load();
    let session_path = match config.session_path.clone() {
        Some(path) => path,
        None => match SharedSession::default_path() {
            Ok(path) => path,
            Err(e) => {
                error!("Cannot locate session file: {}", e);
                std::process::exit(1);
            }
        },
    };
    let session = match SharedSession::load_from(&session_path) {
        Ok(session) => session,
        Err(e) => {
            error!("Failed to load session {}: {}", session_path.display(), e);
            std::process::exit(1);
        }
    };

    if refresh_first {
        let api = ApiClient::new(config.api_base_url.clone(), session.clone());
        match api.refresh_token().await {
            Ok(_) => {
                if let Err(e) = session.save_to(&session_path) {
                    warn!("Refreshed token not saved: {}", e);
                }
            }
            Err(e) => {
                error!("Token refresh failed: {}", e);
                std::process::exit(1);
            }
        }
    }

    let request = match build_request(queue_file, track, index) {
        Ok(request) => request,
        Err(message) => {
            error!("{}", message);
            std::process::exit(1);
        }
    };

    let Some(token) = session.access_token() else {
        error!("{}", PlayerError::MissingToken);
        std::process::exit(1);
    };

    let play_api = WebPlayApi::new(config.web_api_url.clone());
    info!(
        "Playing {} track(s) on device {} (offset {:?})",
        request.uris.len(),
        device_id,
        request.offset.map(|offset| offset.position)
    );
    match play_api.play(&device_id, &token, &request).await {
        Ok(()) => info!("Playback started"),
        Err(e) => {
            error!("Play failed: {}", e);
            std::process::exit(1);
        }
    }
}

/// Windowed request for a queue file (one URI per line), or a single track
fn build_request(
    queue_file: Option<PathBuf>,
    track: Option<String>,
    index: Option<usize>,
) -> Result<PlayRequest, String> {
    let Some(path) = queue_file else {
        return track
            .map(PlayRequest::single)
            .ok_or_else(|| "Either --track or --queue is required".to_string());
    };

    let contents = std::fs::read_to_string(&path)
        .map_err(|e| format!("Failed to read queue {}: {}", path.display(), e))?;
    let uris: Vec<String> = contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect();

    let mut queue = PlayQueue::new();
    queue.replace(uris);
    let index = match (index, track) {
        (Some(index), _) => index,
        (None, Some(uri)) => queue
            .locate(&uri)
            .ok_or_else(|| format!("{} is not in the queue", uri))?,
        (None, None) => 0,
    };

    let window = queue
        .window(index)
        .ok_or_else(|| format!("Index {} is outside a queue of {}", index, queue.len()))?;
    info!(
        "Queue window {}..{} of {}",
        window.start,
        window.start + window.uris.len(),
        queue.len()
    );
    Ok(window.into_request())
}

fn print_usage(program: &str) {
    eprintln!("Usage:");
    eprintln!("  {} --device <id> --track <uri> [--refresh]", program);
    eprintln!(
        "  {} --device <id> --queue <file> [--index <n> | --track <uri>] [--refresh]",
        program
    );
    eprintln!();
    eprintln!("The session is read from SYNCTIFY_SESSION_PATH or the user config dir.");
}
