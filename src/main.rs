mod config;
mod error;
mod models;
mod paypal;
mod scraper;
mod store;

use actix_web::middleware::Logger;
use actix_web::{App, HttpRequest, HttpResponse, HttpServer, Responder, get, post, web};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::config::Config;
use crate::error::ApiError;
use crate::models::{CartItem, Product};
use crate::paypal::PayPalClient;
use crate::scraper::Scraper;
use crate::store::CatalogStore;

struct AppState {
    config: Config,
    store: CatalogStore,
    scraper: Scraper,
    paypal: PayPalClient,
}

// -------------------------
// HTTP Handlers
// -------------------------

#[get("/")]
async fn index() -> impl Responder {
    HttpResponse::Ok().body(
        "Storefront online.\n\
         Catalog:\n  GET  /api/products\n\
         Import:\n  POST /api/import {\"url\":\"https://example.com/shoe\"}\n\
         Save:\n  POST /api/save {\"product\":{...}} (x-admin-secret header)\n\
         Checkout:\n  POST /api/create-paypal-order {\"items\":[{\"name\":...,\"price\":...,\"qty\":...}]}\n  POST /api/capture-paypal-order {\"orderID\":\"...\"}",
    )
}

#[get("/healthz")]
async fn healthz() -> impl Responder {
    HttpResponse::Ok().body("ok")
}

#[get("/api/products")]
async fn list_products(state: web::Data<AppState>) -> impl Responder {
    HttpResponse::Ok().json(state.store.list())
}

#[derive(Deserialize)]
struct ImportReq {
    #[serde(default)]
    url: String,
}

#[post("/api/import")]
async fn import_product(
    state: web::Data<AppState>,
    body: web::Json<ImportReq>,
) -> Result<HttpResponse, ApiError> {
    let ImportReq { url } = body.into_inner();
    if url.trim().is_empty() {
        return Err(ApiError::Validation("Missing url".into()));
    }
    let product = state.scraper.scrape(&url).await?;
    Ok(HttpResponse::Ok().json(json!({ "success": true, "product": product })))
}

#[derive(Deserialize)]
struct SaveReq {
    product: Product,
}

#[post("/api/save")]
async fn save_product(
    req: HttpRequest,
    state: web::Data<AppState>,
    body: web::Json<SaveReq>,
) -> Result<HttpResponse, ApiError> {
    let secret = req
        .headers()
        .get("x-admin-secret")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    if state.config.admin_secret.is_empty() || secret != state.config.admin_secret {
        return Err(ApiError::Auth);
    }

    let product = body.into_inner().product;
    if product.name.trim().is_empty() {
        return Err(ApiError::Validation("product is missing a name".into()));
    }
    if product.price < 0.0 {
        return Err(ApiError::Validation("product price cannot be negative".into()));
    }

    let saved = state.store.append(product)?;
    Ok(HttpResponse::Ok().json(json!({ "success": true, "product": saved })))
}

#[get("/config")]
async fn client_config(state: web::Data<AppState>) -> impl Responder {
    HttpResponse::Ok().json(json!({
        "paypalClientId": state.config.paypal_client_id,
        "paypalMode": state.config.paypal_mode,
    }))
}

#[derive(Deserialize)]
struct CreateOrderReq {
    #[serde(default)]
    items: Vec<CartItem>,
    currency: Option<String>,
}

#[post("/api/create-paypal-order")]
async fn create_paypal_order(
    state: web::Data<AppState>,
    body: web::Json<CreateOrderReq>,
) -> Result<HttpResponse, ApiError> {
    let CreateOrderReq { items, currency } = body.into_inner();
    let currency = currency.unwrap_or_else(|| "EUR".to_string()).to_uppercase();
    let result = state
        .paypal
        .create_order(&items, &currency)
        .await
        .map_err(|e| ApiError::Payment(format!("{e:#}")))?;
    let id = result.get("id").cloned().unwrap_or(Value::Null);
    Ok(HttpResponse::Ok().json(json!({ "id": id, "result": result })))
}

#[derive(Deserialize)]
struct CaptureOrderReq {
    #[serde(rename = "orderID")]
    order_id: Option<String>,
}

#[post("/api/capture-paypal-order")]
async fn capture_paypal_order(
    state: web::Data<AppState>,
    body: web::Json<CaptureOrderReq>,
) -> Result<HttpResponse, ApiError> {
    let order_id = body
        .into_inner()
        .order_id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ApiError::Validation("Missing orderID".into()))?;
    let result = state
        .paypal
        .capture_order(&order_id)
        .await
        .map_err(|e| ApiError::Payment(format!("{e:#}")))?;
    Ok(HttpResponse::Ok().json(json!({ "result": result })))
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    pretty_env_logger::formatted_timed_builder()
        .parse_filters(&std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()))
        .init();

    if std::path::Path::new(".env").exists() {
        if let Err(err) = envmnt::load_file(".env") {
            log::warn!("failed to load .env: {err}");
        }
    }

    let config = Config::from_env();
    let host = config.host.clone();
    let port = config.port;
    let state = web::Data::new(AppState {
        store: CatalogStore::open(&config.products_file),
        scraper: Scraper::new()?,
        paypal: PayPalClient::new(
            config.paypal_client_id.clone(),
            config.paypal_client_secret.clone(),
            &config.paypal_mode,
            reqwest::Client::new(),
        ),
        config,
    });

    log::info!("storefront listening on {host}:{port}");
    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .app_data(state.clone())
            .service(index)
            .service(healthz)
            .service(list_products)
            .service(import_product)
            .service(save_product)
            .service(client_config)
            .service(create_paypal_order)
            .service(capture_paypal_order)
    })
    .bind((host.as_str(), port))?
    .run()
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test;
    use tempfile::TempDir;

    fn test_state(dir: &TempDir, admin_secret: &str) -> web::Data<AppState> {
        let config = Config {
            host: "127.0.0.1".into(),
            port: 0,
            products_file: dir
                .path()
                .join("products.json")
                .to_string_lossy()
                .into_owned(),
            admin_secret: admin_secret.into(),
            paypal_client_id: "client-id".into(),
            paypal_client_secret: String::new(),
            paypal_mode: "sandbox".into(),
        };
        web::Data::new(AppState {
            store: CatalogStore::open(&config.products_file),
            scraper: Scraper::new().unwrap(),
            paypal: PayPalClient::new(
                config.paypal_client_id.clone(),
                config.paypal_client_secret.clone(),
                &config.paypal_mode,
                reqwest::Client::new(),
            ),
            config,
        })
    }

    fn save_body(name: &str) -> Value {
        json!({ "product": {
            "name": name,
            "price": 89.9,
            "image": "",
            "link": "https://example.com/shoe",
            "scrapedAt": "2026-01-01T00:00:00Z"
        }})
    }

    macro_rules! app {
        ($state:expr) => {
            test::init_service(
                App::new()
                    .app_data($state.clone())
                    .service(list_products)
                    .service(import_product)
                    .service(save_product)
                    .service(client_config),
            )
            .await
        };
    }

    #[actix_web::test]
    async fn save_without_secret_is_unauthorized() {
        let dir = TempDir::new().unwrap();
        let state = test_state(&dir, "s3cret");
        let app = app!(state);

        let req = test::TestRequest::post()
            .uri("/api/save")
            .set_json(save_body("Running Shoe"))
            .to_request();
        let rsp = test::call_service(&app, req).await;
        assert_eq!(rsp.status(), 401);

        assert!(state.store.list().is_empty());
        let file = std::fs::read_to_string(&state.config.products_file).unwrap();
        assert_eq!(file, "[]");
    }

    #[actix_web::test]
    async fn save_with_wrong_secret_is_unauthorized() {
        let dir = TempDir::new().unwrap();
        let state = test_state(&dir, "s3cret");
        let app = app!(state);

        let req = test::TestRequest::post()
            .uri("/api/save")
            .insert_header(("x-admin-secret", "nope"))
            .set_json(save_body("Running Shoe"))
            .to_request();
        let rsp = test::call_service(&app, req).await;
        assert_eq!(rsp.status(), 401);
        assert!(state.store.list().is_empty());
    }

    #[actix_web::test]
    async fn unset_server_secret_rejects_every_save() {
        let dir = TempDir::new().unwrap();
        let state = test_state(&dir, "");
        let app = app!(state);

        let req = test::TestRequest::post()
            .uri("/api/save")
            .insert_header(("x-admin-secret", ""))
            .set_json(save_body("Running Shoe"))
            .to_request();
        let rsp = test::call_service(&app, req).await;
        assert_eq!(rsp.status(), 401);
    }

    #[actix_web::test]
    async fn save_without_name_is_rejected_and_file_untouched() {
        let dir = TempDir::new().unwrap();
        let state = test_state(&dir, "s3cret");
        let app = app!(state);
        let before = std::fs::read_to_string(&state.config.products_file).unwrap();

        let req = test::TestRequest::post()
            .uri("/api/save")
            .insert_header(("x-admin-secret", "s3cret"))
            .set_json(save_body("   "))
            .to_request();
        let rsp = test::call_service(&app, req).await;
        assert_eq!(rsp.status(), 400);

        let after = std::fs::read_to_string(&state.config.products_file).unwrap();
        assert_eq!(before, after);
        assert!(state.store.list().is_empty());
    }

    #[actix_web::test]
    async fn negative_price_is_rejected() {
        let dir = TempDir::new().unwrap();
        let state = test_state(&dir, "s3cret");
        let app = app!(state);

        let req = test::TestRequest::post()
            .uri("/api/save")
            .insert_header(("x-admin-secret", "s3cret"))
            .set_json(json!({ "product": { "name": "Shoe", "price": -1.0 } }))
            .to_request();
        let rsp = test::call_service(&app, req).await;
        assert_eq!(rsp.status(), 400);
    }

    #[actix_web::test]
    async fn valid_save_prepends_and_persists() {
        let dir = TempDir::new().unwrap();
        let state = test_state(&dir, "s3cret");
        let app = app!(state);

        for name in ["first", "second"] {
            let req = test::TestRequest::post()
                .uri("/api/save")
                .insert_header(("x-admin-secret", "s3cret"))
                .set_json(save_body(name))
                .to_request();
            let rsp = test::call_service(&app, req).await;
            assert_eq!(rsp.status(), 200);
        }

        let products = state.store.list();
        assert_eq!(products.len(), 2);
        assert_eq!(products[0].name, "second");
        assert!(products[0].id.as_deref().unwrap().starts_with("p_"));
        assert!(products[0].created_at.is_some());

        let on_disk: Vec<Product> =
            serde_json::from_str(&std::fs::read_to_string(&state.config.products_file).unwrap())
                .unwrap();
        assert_eq!(on_disk, products);
    }

    #[actix_web::test]
    async fn save_responds_with_the_promoted_product() {
        let dir = TempDir::new().unwrap();
        let state = test_state(&dir, "s3cret");
        let app = app!(state);

        let req = test::TestRequest::post()
            .uri("/api/save")
            .insert_header(("x-admin-secret", "s3cret"))
            .set_json(save_body("Running Shoe"))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["product"]["name"], "Running Shoe");
        assert!(body["product"]["id"].as_str().unwrap().starts_with("p_"));
        assert!(body["product"]["createdAt"].is_string());
    }

    #[actix_web::test]
    async fn products_endpoint_lists_newest_first() {
        let dir = TempDir::new().unwrap();
        let state = test_state(&dir, "s3cret");
        let app = app!(state);

        for name in ["first", "second"] {
            let mut product = crate::scraper::extract_product(
                &format!("<html><head><title>{name}</title></head></html>"),
                "https://example.com/x",
            );
            product.price = 1.0;
            state.store.append(product).unwrap();
        }

        let req = test::TestRequest::get().uri("/api/products").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        let products = body.as_array().unwrap();
        assert_eq!(products.len(), 2);
        assert_eq!(products[0]["name"], "second");
        assert_eq!(products[1]["name"], "first");
    }

    #[actix_web::test]
    async fn import_without_url_is_rejected() {
        let dir = TempDir::new().unwrap();
        let state = test_state(&dir, "s3cret");
        let app = app!(state);

        let req = test::TestRequest::post()
            .uri("/api/import")
            .set_json(json!({ "url": "" }))
            .to_request();
        let rsp = test::call_service(&app, req).await;
        assert_eq!(rsp.status(), 400);

        let body: Value = test::read_body_json(rsp).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "Missing url");
    }

    #[actix_web::test]
    async fn config_reports_paypal_settings() {
        let dir = TempDir::new().unwrap();
        let state = test_state(&dir, "s3cret");
        let app = app!(state);

        let req = test::TestRequest::get().uri("/config").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["paypalClientId"], "client-id");
        assert_eq!(body["paypalMode"], "sandbox");
    }
}
