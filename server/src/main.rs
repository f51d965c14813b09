use clap::Parser;
use log::{error, info};
use server::config::Args;
use server::dispatcher::Services;
use server::network::Server;
use server::notify::{MulticastNotifier, SubscriptionRegistry};
use server::persistence::Storage;
use server::ranking::RankingEngine;
use server::registry::{HotelRegistry, ReviewRegistry, UserRegistry};
use server::session::SessionRegistry;
use std::sync::Arc;
use tokio::sync::watch;

/// Main-method of the application.
/// Validates the configuration, loads the persisted registries, then runs
/// the protocol server and the ranking engine until interrupted.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();
    args.validate()?;

    // Load persisted state; the hotels snapshot is required.
    let storage = Arc::new(Storage::new(&args.data_dir));
    let hotels = storage.load_hotels()?;
    let users = storage.load_users()?;
    let reviews = storage.load_reviews()?;
    info!(
        "loaded {} hotels, {} users, {} reviews",
        hotels.len(),
        users.len(),
        reviews.len()
    );

    let services = Services {
        hotels: Arc::new(HotelRegistry::new(hotels)),
        users: Arc::new(UserRegistry::new(users)),
        reviews: Arc::new(ReviewRegistry::new(reviews)),
        sessions: Arc::new(SessionRegistry::new()),
        storage: Arc::clone(&storage),
    };
    let subscriptions = Arc::new(SubscriptionRegistry::new());
    let multicast = Arc::new(MulticastNotifier::new(args.multicast_group, args.multicast_port).await?);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Spawn the ranking engine thread of control.
    let engine = RankingEngine::new(
        args.ranking_period(),
        Arc::clone(&services.hotels),
        Arc::clone(&services.reviews),
        storage,
        multicast,
        subscriptions,
    )
    .await;
    let mut ranking_handle = tokio::spawn(engine.run(shutdown_rx.clone()));

    // Spawn the protocol server.
    let server = Server::bind(&args.bind_addr(), services).await?;
    let mut server_handle = tokio::spawn(server.run(shutdown_rx));

    // Handle shutdown gracefully.
    tokio::select! {
        result = &mut server_handle => {
            if let Err(e) = result {
                error!("server task panicked: {}", e);
            }
        }
        result = &mut ranking_handle => {
            if let Err(e) = result {
                error!("ranking task panicked: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("received ctrl-c, shutting down gracefully");
        }
    }

    let _ = shutdown_tx.send(true);
    Ok(())
}
