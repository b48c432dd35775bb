use actix_web::{middleware::Logger, web, App, HttpServer};
use quiz_auth_server::{
    app_state::AppState,
    config::Config,
    middleware::{RequestIdMiddleware, SecurityHeaders},
    rate_limit::spawn_sweeper,
    routes,
};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenvy::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let config = Config::from_env().map_err(|e| {
        log::error!("{}", e);
        std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string())
    })?;
    let bind = (config.web_server_host.clone(), config.web_server_port);
    let sweep_interval = config.rate_limit_sweep_interval;

    let state = AppState::new(config)
        .await
        .map_err(|e| std::io::Error::other(e.to_string()))?;

    if let (Some(email), Some(password)) = (
        state.config.admin_email.clone(),
        state.config.admin_password.clone(),
    ) {
        if let Err(e) = state
            .auth_service
            .ensure_default_admin(&email, &password)
            .await
        {
            log::error!("Failed to seed default admin: {}", e);
        }
    }

    spawn_sweeper(state.rate_limit_store.clone(), sweep_interval);

    log::info!("Starting HTTP server on {}:{}", bind.0, bind.1);

    HttpServer::new(move || {
        let state = state.clone();
        App::new()
            .app_data(web::Data::new(state.clone()))
            .wrap(Logger::default())
            .wrap(RequestIdMiddleware)
            .wrap(SecurityHeaders::for_environment(state.config.environment))
            .configure(|cfg| routes::configure(cfg, &state))
    })
    .bind(bind)?
    .run()
    .await
}
