use std::time::Duration;

use actix_web::{dev::Server, middleware::Logger, web, App, HttpServer};
use log::*;
use reqwest::Client;
use vite_payment_engine::{
    events::{EventHandler, EventProducers},
    registries::{WaitingList, Whitelist},
    traits::PaymentGatewayDatabase,
    OrderFlowApi,
    SqliteDatabase,
};
use vite_rpc::{start_block_queue, HttpLedgerClient, Wallet};

use crate::{
    config::{GatewayOptions, ServerConfig},
    countdown_worker::start_countdown_worker,
    errors::ServerError,
    notifier::webhook_handler,
    reconciler::Reconciler,
    routes,
};

/// Wires the whole gateway together and runs it until shutdown.
///
/// Long-running pieces live on their own tasks: the settlement event handler, the reconciliation loop, the offer
/// countdown and the outbound transaction queue. The HTTP server runs on the calling task, and once it stops the
/// open offer countdowns are snapshotted so a restart can resume them.
pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, 25)
        .await
        .map_err(|e| ServerError::InitializeError(format!("Could not open the gateway database. {e}")))?;

    let waiting = WaitingList::new();
    match db.load_waiting_snapshot().await {
        Ok(entries) if !entries.is_empty() => {
            info!("🚀️ Restoring {} open payment offers from the last shutdown", entries.len());
            waiting.restore(entries);
        },
        Ok(_) => {},
        Err(e) => warn!("🚀️ Could not restore the offer snapshot: {e}. Starting with no open offers."),
    }

    let events = EventHandler::new(16, webhook_handler(Client::new()));
    let producers = EventProducers::default().with_settled_producer(events.subscribe());
    let api = OrderFlowApi::new(db.clone(), waiting.clone(), producers, config.pay_timeout_millis);

    let wallet = Wallet::from_parts(&config.wallet_address, &config.wallet_secret_key)
        .map_err(|e| ServerError::ConfigurationError(format!("The gateway wallet is unusable. {e}")))?;
    let ledger = HttpLedgerClient::new(&config.node_url)
        .map_err(|e| ServerError::InitializeError(format!("Could not create the ledger client. {e}")))?;
    let (queue, _queue_worker) = start_block_queue(ledger.clone(), wallet, 32);

    tokio::spawn(events.start_handler());
    let reconciler = Reconciler::new(api.clone(), ledger, queue, Whitelist::new(), &config.wallet_address);
    tokio::spawn(reconciler.run());
    let _countdown = start_countdown_worker(waiting.clone());

    let options = GatewayOptions::from_config(&config);
    let srv = create_server_instance(&config, api, options)?;
    srv.await?;

    // best effort; a failure here only costs the open offers their countdowns
    let snapshot = waiting.snapshot();
    info!("🚀️ Shutting down. Saving {} open payment offers.", snapshot.len());
    if let Err(e) = db.save_waiting_snapshot(&snapshot).await {
        warn!("🚀️ Could not save the offer snapshot: {e}");
    }
    Ok(())
}

pub fn create_server_instance(
    config: &ServerConfig,
    api: OrderFlowApi<SqliteDatabase>,
    options: GatewayOptions,
) -> Result<Server, ServerError> {
    let srv = HttpServer::new(move || {
        App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("vpg::access_log"))
            .app_data(web::Data::new(api.clone()))
            .app_data(web::Data::new(options.clone()))
            .service(routes::create_payment)
            .service(routes::get_payment_status)
            .default_service(web::route().to(routes::invalid_endpoint))
    })
    .keep_alive(Duration::from_secs(600))
    .bind((config.host.as_str(), config.port))?
    .run();
    Ok(srv)
}
