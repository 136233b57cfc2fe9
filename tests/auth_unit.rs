use actix_web::test::TestRequest;
use actix_web::{test, web, App, HttpResponse};
use chrono::{Duration, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};

use promptkat_payments::api::auth::{user_id_from_token, Claims, JwtMiddleware};

const SECRET: &str = "jwt-test-secret";

fn token(user_id: i32, secret: &str) -> String {
    let claims = Claims {
        sub: user_id,
        exp: (Utc::now() + Duration::hours(1)).timestamp() as usize,
    };
    encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes())).expect("encode")
}

async fn whoami(user_id: web::ReqData<i32>) -> HttpResponse {
    HttpResponse::Ok().body(user_id.into_inner().to_string())
}

#[::core::prelude::v1::test]
fn token_roundtrip_and_wrong_secret() {
    assert_eq!(user_id_from_token(&token(7, SECRET), SECRET), Some(7));
    assert_eq!(user_id_from_token(&token(7, "other"), SECRET), None);
    assert_eq!(user_id_from_token("garbage", SECRET), None);
}

#[actix_web::test]
async fn middleware_injects_user_id() {
    let app = test::init_service(
        App::new().service(
            web::scope("/api")
                .wrap(JwtMiddleware::new(SECRET))
                .route("/whoami", web::get().to(whoami)),
        ),
    )
    .await;

    let req = TestRequest::get()
        .uri("/api/whoami")
        .insert_header(("Authorization", format!("Bearer {}", token(42, SECRET))))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());
    assert_eq!(test::read_body(resp).await, "42");
}

#[actix_web::test]
async fn middleware_rejects_missing_and_invalid_tokens() {
    let app = test::init_service(
        App::new().service(
            web::scope("/api")
                .wrap(JwtMiddleware::new(SECRET))
                .route("/whoami", web::get().to(whoami)),
        ),
    )
    .await;

    let req = TestRequest::get().uri("/api/whoami").to_request();
    match test::try_call_service(&app, req).await {
        Ok(_) => panic!("request without header must be rejected"),
        Err(err) => assert_eq!(err.as_response_error().status_code(), 401),
    }

    let req = TestRequest::get()
        .uri("/api/whoami")
        .insert_header(("Authorization", format!("Bearer {}", token(42, "other"))))
        .to_request();
    match test::try_call_service(&app, req).await {
        Ok(_) => panic!("token signed with another secret must be rejected"),
        Err(err) => assert_eq!(err.as_response_error().status_code(), 401),
    }
}

#[actix_web::test]
async fn rejection_body_is_json_error() {
    let app = test::init_service(
        App::new().service(
            web::scope("/api")
                .wrap(JwtMiddleware::new(SECRET))
                .route("/whoami", web::get().to(whoami)),
        ),
    )
    .await;

    let req = TestRequest::get()
        .uri("/api/whoami")
        .insert_header(("Authorization", "Bearer not-a-jwt"))
        .to_request();
    let err = match test::try_call_service(&app, req).await {
        Ok(_) => panic!("garbage token must be rejected"),
        Err(err) => err,
    };

    let resp = err.error_response();
    assert_eq!(resp.status().as_u16(), 401);
    let bytes = actix_web::body::to_bytes(resp.into_body()).await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["error"], "Invalid token");
}
