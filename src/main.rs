use actix_cors::Cors;
use actix_files::{Files, NamedFile};
use actix_web::{
    dev::{fn_service, ServiceRequest, ServiceResponse},
    get,
    middleware::Logger,
    post, web, App, HttpResponse, HttpServer,
};
use serde_json::json;
use std::path::Path;

mod balance;
mod config;
mod error;
mod schemas;
mod store;

use crate::{
    config::Config,
    error::ApiError,
    schemas::{Dish, PersonName, Selections},
    store::BillStore,
};

#[get("/dishes")]
async fn get_dishes(store: web::Data<BillStore>) -> HttpResponse {
    HttpResponse::Ok().json(store.dishes().await)
}

#[post("/dishes")]
async fn replace_dishes(
    store: web::Data<BillStore>,
    dishes: web::Json<Vec<Dish>>,
) -> Result<HttpResponse, ApiError> {
    let dishes = store.replace_dishes(dishes.into_inner()).await?;
    Ok(HttpResponse::Ok().json(json!({ "status": "success", "dishes": dishes })))
}

#[get("/people")]
async fn get_people(store: web::Data<BillStore>) -> HttpResponse {
    HttpResponse::Ok().json(store.people().await)
}

#[post("/people")]
async fn replace_people(
    store: web::Data<BillStore>,
    people: web::Json<Vec<PersonName>>,
) -> Result<HttpResponse, ApiError> {
    let people = store.replace_people(people.into_inner()).await?;
    Ok(HttpResponse::Ok().json(json!({ "status": "success", "people": people })))
}

#[get("/selections")]
async fn get_selections(store: web::Data<BillStore>) -> HttpResponse {
    HttpResponse::Ok().json(store.selections().await)
}

#[post("/selections")]
async fn replace_selections(
    store: web::Data<BillStore>,
    selections: web::Json<Selections>,
) -> Result<HttpResponse, ApiError> {
    let selections = store.replace_selections(selections.into_inner()).await?;
    Ok(HttpResponse::Ok().json(json!({ "status": "success", "selections": selections })))
}

#[post("/calculate")]
async fn calculate(
    store: web::Data<BillStore>,
    selections: web::Json<Selections>,
) -> Result<HttpResponse, ApiError> {
    let balance = store.calculate(selections.into_inner()).await?;
    Ok(HttpResponse::Ok().json(balance))
}

#[post("/reset")]
async fn reset(store: web::Data<BillStore>) -> Result<HttpResponse, ApiError> {
    store.reset().await?;
    Ok(HttpResponse::Ok().json(json!({
        "status": "success",
        "message": "All data has been reset",
    })))
}

fn api(cfg: &mut web::ServiceConfig) {
    let json_config = web::JsonConfig::default()
        .error_handler(|err, _req| ApiError::BadRequest(err.to_string()).into());
    cfg.app_data(json_config)
        .service(get_dishes)
        .service(replace_dishes)
        .service(get_people)
        .service(replace_people)
        .service(get_selections)
        .service(replace_selections)
        .service(calculate)
        .service(reset);
}

fn cors(config: &Config) -> Cors {
    let cors = Cors::default()
        .allowed_methods(vec!["GET", "POST", "OPTIONS"])
        .allow_any_header()
        .max_age(3600);
    if config.allows_any_origin() {
        return cors.allow_any_origin();
    }
    config
        .allowed_origins()
        .into_iter()
        .fold(cors, |cors, origin| cors.allowed_origin(origin))
}

/// Unmatched `/api` paths get the frontend's entry document like any other path.
async fn api_fallback(config: web::Data<Config>) -> actix_web::Result<NamedFile> {
    Ok(NamedFile::open_async(config.static_dir.join("index.html")).await?)
}

/// Serves the built frontend, answering unknown paths with its `index.html`.
fn frontend(static_dir: &Path) -> Files {
    let index = static_dir.join("index.html");
    Files::new("/", static_dir)
        .index_file("index.html")
        .default_handler(fn_service(move |req: ServiceRequest| {
            let index = index.clone();
            async move {
                let (req, _) = req.into_parts();
                let file = NamedFile::open_async(index).await?;
                let res = file.into_response(&req);
                Ok(ServiceResponse::new(req, res))
            }
        }))
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    let config = Config::from_env();
    let env = env_logger::Env::default().default_filter_or(config.log_filter());
    env_logger::Builder::from_env(env).init();

    let store = web::Data::new(BillStore::load(config.db_file.clone()));
    let state = store.snapshot().await;
    log::info!(
        "Using {}: {} dishes, {} people, {} selections",
        store.path().display(),
        state.dishes.len(),
        state.people.len(),
        state.selections.len()
    );
    log::info!("Listening on {}:{}", config.host, config.port);

    let bind = (config.host.clone(), config.port);
    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .app_data(store.clone())
            .app_data(web::Data::new(config.clone()))
            .service(
                web::scope("/api")
                    .wrap(cors(&config))
                    .configure(api)
                    .default_service(web::to(api_fallback)),
            )
            .service(frontend(&config.static_dir))
    })
    .bind(bind)?
    .run()
    .await
}
