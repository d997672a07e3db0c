use actix_web::{
    post,
    web::{self, Data},
    HttpResponse, Responder,
};
use serde::Serialize;
use serde_json::json;

use crate::{
    auth::Authorized,
    db::{self, Insertable},
    errors::AppError,
    structs::{
        HardwareInsert, LocationInsert, RackInsert, RequestInsert, StockInsert, TerminalInsert,
        UserInsert,
    },
    validation::Validate,
    AppState,
};

/// Registers every write endpoint plus the JSON body settings they share.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(json_config())
        .service(create_user_handler)
        .service(create_location_handler)
        .service(create_hardware_handler)
        .service(create_terminal_handler)
        .service(create_rack_handler)
        .service(create_stocks_handler)
        .service(create_request_handler);
}

/// Malformed bodies (wrong types, unknown enum variants, nested
/// specification values) are reported like rule violations.
fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err, req| {
        log::warn!("Rejected body for {}: {}", req.path(), err);
        AppError::InvalidBody(err.to_string()).into()
    })
}

/// Validate, insert, answer `201 Created` with the stored row.
async fn create<T>(state: &AppState, record: T, entity: &str) -> Result<HttpResponse, AppError>
where
    T: Validate + Insertable,
    T::Stored: Serialize,
{
    let record = record.validate(&state.rules).map_err(|e| {
        log::warn!("Invalid {}: {}", entity, e);
        e
    })?;
    let stored = db::insert_one(&state.db_pool, &record).await.map_err(|e| {
        log::warn!("Failed to create {}: {}", entity, e);
        e
    })?;
    log::info!("{} created", entity);
    Ok(HttpResponse::Created().json(stored))
}

#[post("/user")]
pub async fn create_user_handler(
    _auth: Authorized,
    state: Data<AppState>,
    web::Json(user): web::Json<UserInsert>,
) -> Result<impl Responder, AppError> {
    create(&state, user, "User").await
}

#[post("/location")]
pub async fn create_location_handler(
    _auth: Authorized,
    state: Data<AppState>,
    web::Json(location): web::Json<LocationInsert>,
) -> Result<impl Responder, AppError> {
    create(&state, location, "Location").await
}

#[post("/hardware")]
pub async fn create_hardware_handler(
    _auth: Authorized,
    state: Data<AppState>,
    web::Json(hardware): web::Json<HardwareInsert>,
) -> Result<impl Responder, AppError> {
    create(&state, hardware, "Hardware").await
}

#[post("/terminal")]
pub async fn create_terminal_handler(
    _auth: Authorized,
    state: Data<AppState>,
    web::Json(terminal): web::Json<TerminalInsert>,
) -> Result<impl Responder, AppError> {
    create(&state, terminal, "Terminal").await
}

#[post("/rack")]
pub async fn create_rack_handler(
    _auth: Authorized,
    state: Data<AppState>,
    web::Json(rack): web::Json<RackInsert>,
) -> Result<impl Responder, AppError> {
    create(&state, rack, "Rack").await
}

#[post("/stocks")]
pub async fn create_stocks_handler(
    _auth: Authorized,
    state: Data<AppState>,
    web::Json(stocks): web::Json<Vec<StockInsert>>,
) -> Result<impl Responder, AppError> {
    let stocks = stocks.validate(&state.rules).map_err(|e| {
        log::warn!("Invalid stocks: {}", e);
        e
    })?;
    let stored = db::insert_many(&state.db_pool, &stocks).await.map_err(|e| {
        log::warn!("Failed to create stocks: {}", e);
        e
    })?;
    log::info!("{} stock row(s) created", stored.len());
    Ok(HttpResponse::Created().json(json!({ "detail": "OK" })))
}

#[post("/request")]
pub async fn create_request_handler(
    _auth: Authorized,
    state: Data<AppState>,
    web::Json(request): web::Json<RequestInsert>,
) -> Result<impl Responder, AppError> {
    let request = request.validate(&state.rules).map_err(|e| {
        log::warn!("Invalid request: {}", e);
        e
    })?;
    let stored = db::create_request(&state.db_pool, request)
        .await
        .map_err(|e| {
            log::warn!("Failed to create request: {}", e);
            e
        })?;
    Ok(HttpResponse::Created().json(stored))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{self, basic_auth, valid_auth, Seeded};
    use actix_web::{
        dev::{Service, ServiceResponse},
        http::{header, Method, StatusCode},
        test, App, Error,
    };
    use rstest::rstest;
    use serde_json::Value;
    use sqlx::SqlitePool;

    async fn app(
        pool: SqlitePool,
    ) -> impl Service<actix_http::Request, Response = ServiceResponse, Error = Error> {
        test::init_service(
            App::new()
                .app_data(Data::new(test_support::state(pool)))
                .configure(configure)
                .default_service(web::to(crate::default_handler)),
        )
        .await
    }

    async fn count_rows(pool: &SqlitePool, table: &str) -> i64 {
        sqlx::query_scalar(&format!("SELECT COUNT(*) FROM \"{table}\""))
            .fetch_one(pool)
            .await
            .expect("count rows")
    }

    fn post(uri: &str, body: Value) -> test::TestRequest {
        test::TestRequest::post()
            .uri(uri)
            .insert_header(valid_auth())
            .set_json(body)
    }

    #[rstest]
    #[actix_web::test]
    async fn location_is_created_with_assigned_fields() {
        let pool = test_support::memory_pool().await;
        let app = app(pool).await;

        let res = test::call_service(
            &app,
            post("/location", json!({ "name": "A1", "width": 5, "height": 3 })).to_request(),
        )
        .await;

        assert_eq!(res.status(), StatusCode::CREATED);
        let body: Value = test::read_body_json(res).await;
        assert_eq!(body["name"], "A1");
        assert_eq!(body["width"], 5);
        assert!(body["id"].as_i64().is_some());
        assert!(body["created"].as_str().is_some());
    }

    #[rstest]
    #[actix_web::test]
    async fn zero_width_location_is_rejected() {
        let pool = test_support::memory_pool().await;
        let app = app(pool.clone()).await;

        let res = test::call_service(
            &app,
            post("/location", json!({ "name": "A1", "width": 0, "height": 3 })).to_request(),
        )
        .await;

        assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body: Value = test::read_body_json(res).await;
        assert_eq!(body["detail"][0]["loc"], json!(["body", "width"]));
        assert_eq!(count_rows(&pool, "location").await, 0);
    }

    #[rstest]
    #[case::missing(None)]
    #[case::wrong_password(Some(basic_auth(test_support::USERNAME, "guess")))]
    #[case::wrong_username(Some(basic_auth("root", test_support::PASSWORD)))]
    #[actix_web::test]
    async fn bad_credentials_never_touch_the_store(#[case] authorization: Option<String>) {
        let pool = test_support::memory_pool().await;
        let app = app(pool.clone()).await;
        let mut req = test::TestRequest::post()
            .uri("/location")
            .set_json(json!({ "name": "A1", "width": 5, "height": 3 }));
        if let Some(value) = authorization {
            req = req.insert_header((header::AUTHORIZATION, value));
        }

        let res = test::call_service(&app, req.to_request()).await;

        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            res.headers().get(header::WWW_AUTHENTICATE).unwrap(),
            "Basic"
        );
        assert_eq!(count_rows(&pool, "location").await, 0);
    }

    #[rstest]
    #[actix_web::test]
    async fn bad_credentials_win_over_bad_bodies() {
        let pool = test_support::memory_pool().await;
        let app = app(pool).await;

        let res = test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/hardware")
                .set_json(json!({ "name": "X", "type": "FPGA" }))
                .to_request(),
        )
        .await;

        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }

    #[rstest]
    #[actix_web::test]
    async fn user_phone_is_stored_normalized() {
        let pool = test_support::memory_pool().await;
        let app = app(pool).await;

        let res = test::call_service(
            &app,
            post("/user", json!({ "email": "a@b.com", "phone": "+7 916 123 45 67" })).to_request(),
        )
        .await;

        assert_eq!(res.status(), StatusCode::CREATED);
        let body: Value = test::read_body_json(res).await;
        assert_eq!(body["phone"], "+79161234567");
        assert_eq!(body["type"], "user");
        assert_eq!(body["active"], true);
    }

    #[rstest]
    #[actix_web::test]
    async fn duplicate_email_is_a_database_error() {
        let pool = test_support::memory_pool().await;
        let app = app(pool.clone()).await;
        let user = json!({ "email": "a@b.com" });

        let first = test::call_service(&app, post("/user", user.clone()).to_request()).await;
        let second = test::call_service(&app, post("/user", user).to_request()).await;

        assert_eq!(first.status(), StatusCode::CREATED);
        assert_eq!(second.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(second).await;
        assert_eq!(body["detail"][0]["type"], "database_error");
        assert!(body["detail"][0]["msg"]
            .as_str()
            .unwrap()
            .starts_with("Error in statement: INSERT INTO \"user\""));
        assert_eq!(count_rows(&pool, "user").await, 1);
    }

    #[rstest]
    #[actix_web::test]
    async fn unknown_enum_variant_is_a_parse_error() {
        let pool = test_support::memory_pool().await;
        let app = app(pool).await;

        let res = test::call_service(
            &app,
            post("/hardware", json!({ "name": "X", "type": "FPGA" })).to_request(),
        )
        .await;

        assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body: Value = test::read_body_json(res).await;
        assert_eq!(body["detail"][0]["type"], "parse_error");
    }

    #[rstest]
    #[actix_web::test]
    async fn hardware_echoes_specifications() {
        let pool = test_support::memory_pool().await;
        let app = app(pool).await;
        let specifications = json!({ "les": 50000, "voltage": 3.3, "vendor": "Intel" });

        let res = test::call_service(
            &app,
            post(
                "/hardware",
                json!({ "name": "DE10-Lite", "type": "PLD", "specifications": specifications }),
            )
            .to_request(),
        )
        .await;

        assert_eq!(res.status(), StatusCode::CREATED);
        let body: Value = test::read_body_json(res).await;
        assert_eq!(body["specifications"], specifications);
        assert_eq!(body["description"], "");
    }

    #[rstest]
    #[actix_web::test]
    async fn terminal_and_rack_need_an_existing_location() {
        let pool = test_support::memory_pool().await;
        let seeded = test_support::seed(&pool).await;
        let app = app(pool).await;

        let terminal = test::call_service(
            &app,
            post("/terminal", json!({ "name": "T-1", "location": seeded.location, "x": 1, "y": 2 }))
                .to_request(),
        )
        .await;
        let orphan = test::call_service(
            &app,
            post("/rack", json!({ "location": 999, "width": 1, "height": 1, "x": 0, "y": 0 }))
                .to_request(),
        )
        .await;

        assert_eq!(terminal.status(), StatusCode::CREATED);
        let body: Value = test::read_body_json(terminal).await;
        assert_eq!(body["name"], "T-1");
        assert_eq!(orphan.status(), StatusCode::BAD_REQUEST);
    }

    #[rstest]
    #[actix_web::test]
    async fn stocks_are_acknowledged() {
        let pool = test_support::memory_pool().await;
        let seeded = test_support::seed(&pool).await;
        let app = app(pool.clone()).await;

        let res = test::call_service(
            &app,
            post(
                "/stocks",
                json!([
                    { "hardware": seeded.hardware, "rack": seeded.rack, "rack_position": 2, "count": 5 },
                    { "hardware": seeded.hardware, "rack": seeded.rack, "rack_position": 3, "count": 0 },
                ]),
            )
            .to_request(),
        )
        .await;

        assert_eq!(res.status(), StatusCode::CREATED);
        let body: Value = test::read_body_json(res).await;
        assert_eq!(body, json!({ "detail": "OK" }));
        assert_eq!(count_rows(&pool, "stock").await, 3);
    }

    #[rstest]
    #[actix_web::test]
    async fn stock_rack_position_above_nine_is_rejected() {
        let pool = test_support::memory_pool().await;
        let app = app(pool.clone()).await;

        let res = test::call_service(
            &app,
            post(
                "/stocks",
                json!([{ "hardware": 1, "rack": 1, "rack_position": 10, "count": 5 }]),
            )
            .to_request(),
        )
        .await;

        assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body: Value = test::read_body_json(res).await;
        assert_eq!(body["detail"][0]["loc"], json!(["body", "0", "rack_position"]));
        assert_eq!(count_rows(&pool, "stock").await, 0);
    }

    fn request_body(seeded: &Seeded, hardware: i64) -> Value {
        json!({
            "user": seeded.user,
            "location": seeded.location,
            "comment": "for the lab",
            "hardware": [{ "hardware": hardware, "count": 2 }],
        })
    }

    #[rstest]
    #[actix_web::test]
    async fn request_is_created_with_its_line_items() {
        let pool = test_support::memory_pool().await;
        let seeded = test_support::seed(&pool).await;
        let app = app(pool.clone()).await;

        let res = test::call_service(
            &app,
            post("/request", request_body(&seeded, seeded.hardware)).to_request(),
        )
        .await;

        assert_eq!(res.status(), StatusCode::CREATED);
        let body: Value = test::read_body_json(res).await;
        assert_eq!(body["status"], "new");
        assert_eq!(body["comment"], "for the lab");
        assert_eq!(body["user"], seeded.user);
        assert!(body.get("hardware").is_none());
        assert_eq!(count_rows(&pool, "request_hardware").await, 1);
    }

    #[rstest]
    #[actix_web::test]
    async fn request_for_unknown_hardware_leaves_nothing_behind() {
        let pool = test_support::memory_pool().await;
        let seeded = test_support::seed(&pool).await;
        let app = app(pool.clone()).await;

        let res = test::call_service(&app, post("/request", request_body(&seeded, 5)).to_request())
            .await;

        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(res).await;
        assert_eq!(body["detail"][0]["type"], "stock_error");
        assert_eq!(count_rows(&pool, "request").await, 0);
        assert_eq!(count_rows(&pool, "request_hardware").await, 0);
    }

    #[rstest]
    #[actix_web::test]
    async fn request_with_zero_count_is_rejected() {
        let pool = test_support::memory_pool().await;
        let seeded = test_support::seed(&pool).await;
        let app = app(pool.clone()).await;
        let mut body = request_body(&seeded, seeded.hardware);
        body["hardware"][0]["count"] = json!(0);

        let res = test::call_service(&app, post("/request", body).to_request()).await;

        assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body: Value = test::read_body_json(res).await;
        assert_eq!(
            body["detail"][0]["loc"],
            json!(["body", "hardware", "0", "count"])
        );
        assert_eq!(count_rows(&pool, "request").await, 0);
    }

    #[rstest]
    #[case(Method::GET, StatusCode::NOT_FOUND)]
    #[case(Method::DELETE, StatusCode::METHOD_NOT_ALLOWED)]
    #[actix_web::test]
    async fn unknown_routes(#[case] method: Method, #[case] expected: StatusCode) {
        let pool = test_support::memory_pool().await;
        let app = app(pool).await;

        let res = test::call_service(
            &app,
            test::TestRequest::default()
                .method(method)
                .uri("/nowhere")
                .to_request(),
        )
        .await;

        assert_eq!(res.status(), expected);
    }
}
