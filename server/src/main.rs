use actix_web::{middleware, App, HttpServer};
use anyhow::Result;
use log::{info, warn};
use structopt::StructOpt;

use digit_server::{routes, Opt};

#[actix_web::main]
async fn main() -> Result<()> {
    let opt = Opt::from_args();
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("actix_web=info,digit_server=info"),
    )
    .init();

    let settings = opt.settings();
    if !settings.model_path.is_file() {
        warn!(
            "Model {} is not a readable file yet; requests will fail until it is",
            settings.model_path.display()
        );
    }
    info!(
        "Serving model {} (reloaded per request), upload limit {} bytes",
        settings.model_path.display(),
        settings.max_upload_bytes
    );

    let endpoint = opt.endpoint();
    info!("Running server at {}", endpoint);
    HttpServer::new(move || {
        App::new()
            .wrap(middleware::Logger::default())
            .configure(routes::configure(settings.clone()))
    })
    .bind(&endpoint)?
    .run()
    .await?;
    Ok(())
}
