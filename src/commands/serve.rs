use std::net::SocketAddr;

use axum::{routing::get, Router};
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::{
    api::health_checks::ok,
    app::App,
    boot::BootError,
    config::Config,
    database::setup_database,
    environment::Environment,
    job_queue::JobQueue,
    jobs::{self, job_supervisor::{job_supervisor, verify_job_types_have_workers}},
    mailer::Mailer,
    router::router,
};

pub async fn handle_serve_command(environment: Environment, config: Config) -> Result<(), BootError> {
    // Configuration mistakes surface before anything starts listening
    let job_registry = jobs::registry();
    verify_job_types_have_workers(&config.jobs.workers, &job_registry)?;
    let job_schedule = jobs::schedule(&config.email_api)?;
    let mailer = Mailer::from_config(&config.email)?;

    tokio::fs::create_dir_all(&config.storage.upload_dir).await?;

    let port = config.server.port;

    // Answers liveness probes while migrations run
    let liveness_server_task = tokio::spawn(start_liveness_server(port));

    let migrated = async {
        let (db, migration_receiver) = setup_database(&config.database).await?;
        match migration_receiver.await {
            Ok(result) => result.map(|()| db),
            Err(_) => Err(sea_orm::DbErr::Custom(
                "Database setup channel closed unexpectedly".to_string(),
            )),
        }
    }
    .await;

    liveness_server_task.abort();
    let _ = liveness_server_task.await;

    let db = migrated.map_err(|e| {
        error!("❌ Database setup failed: {e}");
        e
    })?;
    info!("✅ Database is ready!");

    let app = App::new(config.clone(), environment, db, mailer, JobQueue::database());

    tokio::spawn(job_supervisor(app.clone(), job_registry, job_schedule));

    start_server(router(app), port).await
}

async fn start_liveness_server(port: u16) {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = match TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Liveness server could not bind {addr}: {e}");
            return;
        }
    };

    let migration_router = Router::new().route("/liveness", get(ok));
    if let Err(e) = axum::serve(listener, migration_router).await {
        error!("Liveness server stopped: {e}");
    }
}

async fn start_server(router: Router, port: u16) -> Result<(), BootError> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;

    info!("🌐 Server starting on http://{}", addr);
    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
