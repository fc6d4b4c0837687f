use std::sync::Arc;

use actix_cors::Cors;
use actix_web::http::header;
use actix_web::web::Data;
use actix_web::{App, HttpServer};
use dotenv::dotenv;
use chrono::Utc;
use tracing::{error, info};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use helpdesk::api::{self, docs::ApiDoc};
use helpdesk::auth::JwtUtils;
use helpdesk::configuration::Settings;
use helpdesk::db::init_db;
use helpdesk::migration::{Migrator, MigratorTrait};
use helpdesk::service::{FileStorage, LocalFileStorage, NotificationRules, SlaPolicies, TicketStore};
use helpdesk::telemetry::{get_subscriber, init_subscriber};
use helpdesk::util::SlackRelay;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    let settings = Settings::from_env()?;

    let subscriber = get_subscriber("helpdesk".into(), settings.log_filter.clone(), std::io::stdout);
    init_subscriber(subscriber)?;
    info!("starting helpdesk");

    let db = init_db(&settings.database_url).await?;
    Migrator::up(&db, None).await?;
    info!("migrations applied");

    if let Some(admin) = &settings.bootstrap_admin {
        api::auth::ensure_admin(&db, &settings.admin_recipient, &admin.email, admin.password.clone()).await?;
    }
    let admin_recipient = api::auth::resolve_admin_recipient(&db, &settings.admin_recipient).await?;

    let mut store = TicketStore::new(
        db.clone(),
        SlaPolicies::default(),
        NotificationRules::new(admin_recipient),
    );
    if let Some(url) = &settings.slack_webhook_url {
        store = store.with_relay(Arc::new(SlackRelay::new(url.clone())?));
    }

    let storage: Arc<dyn FileStorage> = Arc::new(LocalFileStorage::new(&settings.upload_dir));
    let storage = Data::from(storage);
    let db_data = Data::new(db);
    let store = Data::new(store);
    if let Some(every) = settings.sla_sweep_interval {
        let sweeper = store.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            loop {
                ticker.tick().await;
                match sweeper.record_sla_breaches(Utc::now()).await {
                    Ok(0) => {}
                    Ok(flagged) => info!(flagged, "sla sweep flagged tickets"),
                    Err(err) => error!(error = %err, "sla sweep failed"),
                }
            }
        });
    }
    let jwt = Data::new(JwtUtils::new(settings.jwt_secret.clone()));
    let openapi = ApiDoc::openapi();

    info!(host = %settings.host, port = settings.port, "listening");
    HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allowed_methods(vec!["GET", "POST", "PUT", "OPTIONS"])
            .allowed_headers(vec![header::CONTENT_TYPE, header::AUTHORIZATION])
            .max_age(3600);

        App::new()
            .wrap(cors)
            .app_data(db_data.clone())
            .app_data(store.clone())
            .app_data(jwt.clone())
            .app_data(storage.clone())
            .service(SwaggerUi::new("/swagger-ui/{_:.*}").url("/api-docs/openapi.json", openapi.clone()))
            .configure(api::routes)
    })
    .bind((settings.host.as_str(), settings.port))?
    .run()
    .await?;

    Ok(())
}
