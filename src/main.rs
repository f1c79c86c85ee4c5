use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;
use clap::Parser;
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use storefront_notify::api::{HttpNotificationApi, NotificationApi, StaticToken, TokenProvider};
use storefront_notify::channel::LiveChannel;
use storefront_notify::config::{self, Config};
use storefront_notify::surface::{relative_time, BadgeStyle};
use storefront_notify::{NotificationHub, NotificationId};

mod cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = cli::Cli::parse();

    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| "storefront_notify=debug".into()),
    );
    let registry = tracing_subscriber::registry().with(filter);
    if args.json_logs {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    let cfg = config::load()?;
    let tokens: Arc<dyn TokenProvider> = Arc::new(StaticToken::new(cfg.token.clone()));
    let api = Arc::new(HttpNotificationApi::new(cfg.api_url.clone(), tokens.clone())?);

    let result = match args.command {
        Some(cli::Commands::Watch { user }) => run_watch(cfg, api, tokens, user).await,
        Some(cli::Commands::List { page, size }) => {
            let notifications = api.fetch_page(page, size).await?;
            let now = Utc::now().naive_utc();
            if notifications.is_empty() {
                println!("No notifications.");
            }
            for n in notifications {
                println!(
                    "{} {:<16} {:<12} {}: {}",
                    if n.is_read { " " } else { "*" },
                    n.id,
                    relative_time(n.created_at, now),
                    n.title,
                    n.message
                );
            }
            Ok(())
        }
        Some(cli::Commands::Unread) => {
            println!("{}", api.unread_count().await?);
            Ok(())
        }
        Some(cli::Commands::Read { id }) => {
            api.mark_read(&NotificationId::from(id.as_str())).await?;
            println!("Marked {} as read.", id);
            Ok(())
        }
        Some(cli::Commands::ReadAll) => {
            api.mark_all_read().await?;
            println!("All notifications marked as read.");
            Ok(())
        }
        None => run_watch(cfg, api, tokens, None).await,
    };

    if let Err(ref e) = result {
        eprintln!("Error: {:?}", e);
    }
    result
}

async fn run_watch(
    cfg: Config,
    api: Arc<HttpNotificationApi>,
    tokens: Arc<dyn TokenProvider>,
    user: Option<String>,
) -> anyhow::Result<()> {
    let user = user
        .or_else(|| cfg.user.clone())
        .context("no user key: pass --user or set STOREFRONT_USER")?;

    let channel = LiveChannel::new(cfg.channel_config(), tokens);
    let mut channel_state = channel.watch_state();
    let hub = NotificationHub::new(api, channel, cfg.poll_config());
    let mut arrivals = hub.store().arrivals();
    let mut bell = hub.bell(BadgeStyle::HEADER);

    hub.activate(&user).await;
    tracing::info!(user = %user, ws = %cfg.ws_url, "watching notifications, ctrl-c to stop");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            arrived = arrivals.recv() => match arrived {
                Ok(n) => tracing::info!(id = %n.id, kind = n.kind.as_str(), title = %n.title, "notification arrived"),
                Err(RecvError::Lagged(skipped)) => tracing::warn!(skipped, "arrival log lagging"),
                Err(RecvError::Closed) => break,
            },
            alive = bell.changed() => {
                if !alive {
                    break;
                }
                tracing::info!(
                    unread = bell.unread(),
                    badge = bell.label().as_deref().unwrap_or("-"),
                    "unread count changed"
                );
            }
            Ok(()) = channel_state.changed() => {
                let state = *channel_state.borrow_and_update();
                tracing::info!(?state, "live channel state");
            }
        }
    }

    hub.deactivate().await;
    tracing::info!("stopped");
    Ok(())
}
