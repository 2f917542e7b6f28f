use axum::{
    body::{Body, to_bytes},
    extract::{FromRequest, Request},
    http::{StatusCode, header},
    response::IntoResponse,
};
use foodgram_api::{
    dto::recipes::CreateRecipeRequest,
    error::AppError,
    extract::AppJson,
    response::TextAttachment,
    services::shopping_list_service::{SHOPPING_LIST_FILENAME, render_shopping_list},
};
use serde_json::Value;

fn json_request(body: &str) -> Request {
    Request::builder()
        .method("POST")
        .uri("/api/recipes")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .expect("request")
}

async fn extract(body: &str) -> Result<AppJson<CreateRecipeRequest>, AppError> {
    AppJson::<CreateRecipeRequest>::from_request(json_request(body), &()).await
}

async fn error_body(err: AppError) -> (StatusCode, Value) {
    let response = err.into_response();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body bytes");
    (status, serde_json::from_slice(&bytes).expect("json body"))
}

const TAG: &str = "3f2504e0-4f89-11d3-9a0c-0305e82c3301";
const FLOUR: &str = "9b2d7c1a-2f4e-4b7a-8d3c-1e5f6a7b8c9d";

#[tokio::test]
async fn well_formed_recipe_body_is_accepted() {
    let body = format!(
        r#"{{"tags":["{TAG}"],"ingredients":[{{"id":"{FLOUR}","amount":200}}],"name":"Bread","text":"Bake it.","cooking_time":40}}"#
    );
    let AppJson(payload) = extract(&body).await.expect("valid body");
    assert_eq!(payload.cooking_time, 40);
    assert_eq!(payload.ingredients[0].amount, 200);
}

#[tokio::test]
async fn missing_field_answers_400_with_field_errors() {
    let body = format!(
        r#"{{"tags":["{TAG}"],"ingredients":[{{"id":"{FLOUR}","amount":200}}],"name":"Bread","text":"Bake it."}}"#
    );
    let err = extract(&body).await.expect_err("cooking_time is missing");
    let (status, json) = error_body(err).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    let messages = json["data"]["fields"]["body"]
        .as_array()
        .expect("field errors");
    assert!(
        messages[0].as_str().unwrap_or_default().contains("cooking_time"),
        "{json}"
    );
    assert!(json["message"].is_string());
}

#[tokio::test]
async fn out_of_range_amount_answers_400() {
    for amount in ["\"lots\"", "4294967296", "1.5"] {
        let body = format!(
            r#"{{"tags":["{TAG}"],"ingredients":[{{"id":"{FLOUR}","amount":{amount}}}],"name":"Bread","text":"Bake it.","cooking_time":40}}"#
        );
        let err = extract(&body).await.expect_err("amount must be an i32");
        let (status, json) = error_body(err).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "amount {amount}");
        assert!(json["data"]["fields"]["body"].is_array(), "{json}");
    }
}

#[tokio::test]
async fn broken_json_and_wrong_content_type_answer_400() {
    let err = extract("{not json").await.expect_err("syntax error");
    let (status, json) = error_body(err).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["data"]["error"].is_string(), "{json}");

    let request = Request::builder()
        .method("POST")
        .uri("/api/recipes")
        .body(Body::from("{}"))
        .expect("request");
    let err = AppJson::<CreateRecipeRequest>::from_request(request, &())
        .await
        .expect_err("content type is missing");
    let (status, _) = error_body(err).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn shopping_list_download_is_a_utf8_text_attachment() {
    let body = render_shopping_list(&[]);
    let response = TextAttachment {
        filename: SHOPPING_LIST_FILENAME,
        body: body.clone(),
    }
    .into_response();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "text/plain; charset=utf-8"
    );
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=\"shopping_list.txt\""
    );

    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body bytes");
    assert_eq!(std::str::from_utf8(&bytes).expect("utf-8"), body);
}
