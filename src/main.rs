mod console;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use livetrack::config::{ConfigError, TrackerConfig};
use livetrack::events::{InboundEvent, LatLng, OutboundEvent, Role};
use livetrack::geo::{GeolocationSampler, LocationSample, SimulatedSource, WatchOptions};
use livetrack::map::{ExportDocument, ExportError, LiveMap, TracingSurface, write_export};
use livetrack::net::{ClientEvent, ConnectionManager, Identity, SendError, WsConnector};
use livetrack::state::{PresenceStore, ServerNotice};
use time::OffsetDateTime;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::console::{HELP, Input, parse_line};

#[derive(Debug, thiserror::Error)]
enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to read stdin: {0}")]
    Stdin(#[from] std::io::Error),
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum RoleArg {
    Admin,
    Supervisor,
    Worker,
}

impl From<RoleArg> for Role {
    fn from(role: RoleArg) -> Self {
        match role {
            RoleArg::Admin => Self::Admin,
            RoleArg::Supervisor => Self::Supervisor,
            RoleArg::Worker => Self::Worker,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "livetrack", about = "Live presence and location tracking client")]
struct Cli {
    /// Display name announced to other participants.
    #[arg(long, env = "LIVETRACK_NAME")]
    name: String,

    #[arg(long, env = "LIVETRACK_ROLE", value_enum, default_value = "worker")]
    role: RoleArg,

    /// Starting latitude of the simulated device.
    #[arg(long, env = "LIVETRACK_ORIGIN_LAT", default_value_t = 39.7392, allow_hyphen_values = true)]
    origin_lat: f64,

    /// Starting longitude of the simulated device.
    #[arg(long, env = "LIVETRACK_ORIGIN_LNG", default_value_t = -104.9903, allow_hyphen_values = true)]
    origin_lng: f64,

    /// Heading of the simulated device in degrees clockwise from north.
    #[arg(long, default_value_t = 90.0)]
    bearing: f64,

    /// Speed of the simulated device in meters per second.
    #[arg(long, default_value_t = 1.4)]
    speed: f64,

    /// Seconds between simulated fixes.
    #[arg(long, default_value_t = 5)]
    fix_interval_secs: u64,

    /// Directory `/export` writes into when none is given.
    #[arg(long, env = "LIVETRACK_EXPORT_DIR", default_value = ".")]
    export_dir: PathBuf,
}

struct App {
    manager: ConnectionManager,
    store: PresenceStore,
    map: LiveMap<TracingSurface>,
    identity: Identity,
    export_dir: PathBuf,
    last_reported: Option<i64>,
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = TrackerConfig::from_env()?;
    let map = LiveMap::new(&config.map, TracingSurface::new())?;

    let identity = Identity::new(cli.name.clone(), cli.role.into());
    let manager = ConnectionManager::new(
        config.connection.clone(),
        identity.clone(),
        Arc::new(WsConnector),
    );

    let source = Arc::new(SimulatedSource::new(
        LatLng::new(cli.origin_lat, cli.origin_lng),
        cli.bearing,
        cli.speed,
        Duration::from_secs(cli.fix_interval_secs),
    ));
    let mut sampler = GeolocationSampler::new(source);

    info!(server = %config.server_url, name = %identity.name, role = identity.role.as_str(), "starting");

    let mut app = App {
        manager,
        store: PresenceStore::with_trail_capacity(config.trail_capacity),
        map,
        identity,
        export_dir: cli.export_dir,
        last_reported: None,
    };
    let result = app.run(&mut sampler).await;

    sampler.stop();
    app.map.clear();
    if let Err(error) = app.manager.disconnect().await {
        warn!(%error, "disconnect failed");
    }
    app.manager.shutdown().await;
    result
}

impl App {
    async fn run(&mut self, sampler: &mut GeolocationSampler) -> Result<(), AppError> {
        let mut events = self.manager.subscribe();
        let mut fixes = sampler.start(WatchOptions::default());
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut stdin_open = true;
        let mut sampling = true;

        if let Err(error) = self.manager.connect() {
            warn!(%error, "connect failed");
        }
        println!("{HELP}");

        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    info!("interrupted");
                    return Ok(());
                }
                Some(event) = events.recv() => self.on_client_event(event),
                changed = fixes.changed(), if sampling => {
                    if changed.is_err() {
                        warn!("geolocation sampler stopped");
                        sampling = false;
                        continue;
                    }
                    let state = fixes.borrow_and_update().clone();
                    if let Some(error) = state.error {
                        warn!(kind = %error.kind, %error, "geolocation failed; position reporting paused");
                    }
                    if let Some(sample) = state.sample {
                        self.on_fix(&sample);
                    }
                }
                line = lines.next_line(), if stdin_open => {
                    let Some(line) = line? else {
                        stdin_open = false;
                        continue;
                    };
                    match parse_line(&line) {
                        Ok(Input::Quit) => return Ok(()),
                        Ok(input) => self.on_input(input).await,
                        Err(error) => println!("{error}"),
                    }
                }
            }
        }
    }

    fn on_client_event(&mut self, event: ClientEvent) {
        match &event {
            ClientEvent::Status { status, .. } => {
                info!(status = %status, badge = %self.manager.session().badge(), "connection status");
            }
            ClientEvent::Inbound {
                event: InboundEvent::NewMessage(message),
                ..
            } => {
                println!("[{}] {} ({})", message.user_name, message.message, message.id);
            }
            _ => {}
        }

        if self.store.apply(&event) {
            self.map.sync(self.store.roster());
        }
        match self.store.take_notice() {
            Some(ServerNotice::Shutdown(message)) => println!("server shutting down: {message}"),
            Some(ServerNotice::Error(message)) => println!("server error: {message}"),
            None => {}
        }
    }

    fn on_fix(&mut self, sample: &LocationSample) {
        if self.last_reported.is_some_and(|last| sample.timestamp <= last) {
            return;
        }
        self.last_reported = Some(sample.timestamp);
        self.map.record_sample(sample);
        if let Some(OutboundEvent::LocationUpdate(report)) = self.map.location_event(sample) {
            if let Err(error) = self.manager.send_location(report) {
                warn!(%error, "location not queued");
            }
        }
    }

    async fn on_input(&mut self, input: Input) {
        let sent = match input {
            Input::Empty | Input::Quit => Ok(()),
            Input::Help => {
                println!("{HELP}");
                Ok(())
            }
            Input::Chat(text) => self.manager.send_message(&text),
            Input::Typing => self.manager.notify_typing(),
            Input::React {
                message_id,
                emoji,
                action,
            } => self.manager.react(&message_id, &emoji, action),
            Input::Status(status) => self.manager.set_status(status),
            Input::Active(active) => self.manager.report_activity(active),
            Input::Select(user_id) => {
                if !self.map.select(&user_id, true) {
                    println!("no marker for {user_id}");
                }
                Ok(())
            }
            Input::Follow(enabled) => {
                self.map.set_auto_follow(enabled);
                Ok(())
            }
            Input::Record(true) => {
                self.map.start_recording();
                println!("recording route");
                Ok(())
            }
            Input::Record(false) => {
                self.map.stop_recording();
                println!("recorded {} points", self.map.recorded_route().len());
                Ok(())
            }
            Input::Export(dir) => {
                let dir = dir.unwrap_or_else(|| self.export_dir.clone());
                match self.export(&dir).await {
                    Ok(path) => println!("exported to {}", path.display()),
                    Err(error) => {
                        warn!(%error, "export failed");
                        println!("{error}");
                    }
                }
                Ok(())
            }
            Input::Users => {
                self.print_users();
                Ok(())
            }
            Input::Reconnect => self.manager.connect(),
        };
        if let Err(error) = sent {
            report_send_error(&error);
        }
    }

    async fn export(&self, dir: &Path) -> Result<PathBuf, ExportError> {
        let now = OffsetDateTime::now_utc();
        let document = ExportDocument::new(
            self.store.roster(),
            self.store.transcript(),
            self.map.recorded_route(),
            now,
        )?;
        write_export(dir, &document, now).await
    }

    fn print_users(&self) {
        let me = self
            .manager
            .session()
            .socket_id
            .unwrap_or_else(|| self.identity.session_id.clone());
        println!(
            "{} users, {}",
            self.store.roster().len(),
            self.manager.session().badge()
        );
        for user in self.store.roster().iter() {
            let at = user
                .location
                .map(|location| format!("{:.5}, {:.5}", location.latitude, location.longitude))
                .unwrap_or_else(|| "no fix".to_owned());
            println!(
                "  {} {} [{}] {} trail={}",
                user.id,
                user.name,
                user.status.as_str(),
                at,
                user.trail.len()
            );
        }
        if let Some(typing) = self.store.chat_view(&me).typing {
            println!("  {typing}");
        }
    }
}

fn report_send_error(error: &SendError) {
    match error {
        SendError::NotConnected => println!("offline; try again once connected"),
        other => println!("{other}"),
    }
}

