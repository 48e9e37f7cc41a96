use std::net::SocketAddr;

use axum::{routing::get, Router};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::state::AppState;
use crate::{auth, recipes, users};

pub fn build_app(state: AppState) -> Router {
    Router::new()
        .nest(
            "/api",
            Router::new()
                .merge(auth::router())
                .merge(recipes::router())
                .merge(users::router())
                .route("/health", get(|| async { "ok" })),
        )
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    let method = req.method().clone();
                    let uri = req.uri().clone();
                    tracing::info_span!(
                        "http_request",
                        %method,
                        uri = %uri,
                        status = tracing::field::Empty
                    )
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     _latency: std::time::Duration,
                     span: &tracing::Span| {
                        let status = res.status();
                        span.record("status", tracing::field::display(status));
                        if status.is_server_error() {
                            tracing::error!(%status, "response");
                        } else {
                            tracing::info!(%status, "response");
                        }
                    },
                ),
        )
}

pub async fn serve(app: Router, host: &str, port: u16) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{host}:{port}").parse()?;

    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::{to_bytes, Body},
        http::{header, Method, Request, StatusCode},
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    async fn call(
        app: &Router,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut req = Request::builder().method(method).uri(uri);
        if let Some(t) = token {
            req = req.header(header::AUTHORIZATION, format!("Bearer {t}"));
        }
        let req = match body {
            Some(b) => req
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(b.to_string()))
                .unwrap(),
            None => req.body(Body::empty()).unwrap(),
        };
        let res = app.clone().oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    /// Sends `data` as JSON plus one file field, the way the web client does.
    async fn call_multipart(
        app: &Router,
        method: Method,
        uri: &str,
        token: &str,
        data: Value,
        file_field: &str,
    ) -> (StatusCode, Value) {
        let boundary = "recipeshare-test";
        let body = format!(
            "--{boundary}\r\n\
             Content-Disposition: form-data; name=\"data\"\r\n\r\n\
             {data}\r\n\
             --{boundary}\r\n\
             Content-Disposition: form-data; name=\"{file_field}\"; filename=\"pic.png\"\r\n\
             Content-Type: image/png\r\n\r\n\
             png-bytes\r\n\
             --{boundary}--\r\n"
        );
        let req = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={boundary}"),
            )
            .body(Body::from(body))
            .unwrap();
        let res = app.clone().oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    async fn register(app: &Router, username: &str) -> String {
        let (status, body) = call(
            app,
            Method::POST,
            "/api/auth/register",
            None,
            Some(json!({
                "username": username,
                "email": format!("{username}@example.com"),
                "password": "hunter22",
                "firstName": "Test",
                "lastName": "Cook",
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["data"]["accessToken"].as_str().unwrap().to_string()
    }

    fn tart() -> Value {
        json!({
            "title": "Lemon Tart",
            "description": "Sharp and sweet",
            "prepTime": 20,
            "cookTime": 35,
            "servings": 8,
            "cuisine": "French",
            "category": "Dessert",
            "ingredients": [{ "name": "Lemon", "amount": "3" }],
            "instructions": [{ "description": "Zest" }, { "description": "Bake" }],
            "tags": ["citrus"]
        })
    }

    #[tokio::test]
    async fn health_is_ok() {
        let app = build_app(AppState::fake());
        let res = app
            .oneshot(Request::get("/api/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn recipe_lifecycle_over_http() {
        let app = build_app(AppState::fake());
        let chef = register(&app, "chef").await;
        let fan = register(&app, "fan").await;

        let (status, _) = call(&app, Method::POST, "/api/recipes", None, Some(tart())).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, body) = call(&app, Method::POST, "/api/recipes", Some(chef.as_str()), Some(tart())).await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        let id = body["data"]["id"].as_str().unwrap().to_string();
        assert_eq!(body["data"]["instructions"][1]["step"], 2);

        let (status, body) = call(&app, Method::GET, "/api/recipes?q=lemon", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total"], 1);
        assert_eq!(body["data"][0]["author"]["username"], "chef");

        let like_uri = format!("/api/recipes/{id}/like");
        let (_, body) = call(&app, Method::POST, &like_uri, Some(fan.as_str()), None).await;
        assert_eq!(body["data"], json!({ "liked": true, "likes": 1 }));

        let review_uri = format!("/api/recipes/{id}/reviews");
        let (status, body) = call(
            &app,
            Method::POST,
            &review_uri,
            Some(fan.as_str()),
            Some(json!({ "rating": 4, "comment": "Lovely" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["data"]["averageRating"], 4.0);
        assert_eq!(body["data"]["totalReviews"], 1);

        let (status, body) = call(
            &app,
            Method::POST,
            &review_uri,
            Some(fan.as_str()),
            Some(json!({ "rating": 4.5 })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);

        let recipe_uri = format!("/api/recipes/{id}");
        let (status, _) = call(
            &app,
            Method::PUT,
            &recipe_uri,
            Some(fan.as_str()),
            Some(json!({ "title": "Mine now" })),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) = call(&app, Method::DELETE, &recipe_uri, Some(chef.as_str()), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);

        let (status, body) = call(&app, Method::GET, &recipe_uri, None, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["message"], "Recipe not found");
    }

    #[tokio::test]
    async fn bad_query_values_are_rejected() {
        let app = build_app(AppState::fake());
        let (status, body) = call(&app, Method::GET, "/api/recipes?category=Pizza", None, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);

        let (status, _) = call(&app, Method::GET, "/api/recipes?limit=0", None, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = call(&app, Method::GET, "/api/recipes?category=", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["pages"], 0);

        let (status, body) = call(
            &app,
            Method::GET,
            "/api/recipes?page=9223372036854775807",
            None,
            None,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn malformed_ids_get_the_error_envelope() {
        let app = build_app(AppState::fake());
        let chef = register(&app, "chef").await;

        let (status, body) = call(&app, Method::GET, "/api/recipes/not-a-uuid", None, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert!(body["message"].is_string());

        let uri = format!("/api/recipes/{}/instructions/first", uuid::Uuid::new_v4());
        let (status, body) = call(&app, Method::DELETE, &uri, Some(chef.as_str()), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);

        let (status, body) =
            call(&app, Method::POST, "/api/users/nobody/follow", Some(chef.as_str()), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn oversized_times_are_rejected() {
        let app = build_app(AppState::fake());
        let chef = register(&app, "chef").await;
        let mut body = tart();
        body["prepTime"] = json!(2147483647);
        body["cookTime"] = json!(1);
        let (status, body) = call(&app, Method::POST, "/api/recipes", Some(chef.as_str()), Some(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn recipe_update_accepts_multipart_image_and_data() {
        let app = build_app(AppState::fake());
        let chef = register(&app, "chef").await;
        let (_, body) = call(&app, Method::POST, "/api/recipes", Some(chef.as_str()), Some(tart())).await;
        let id = body["data"]["id"].as_str().unwrap().to_string();

        let uri = format!("/api/recipes/{id}");
        let (status, body) = call_multipart(
            &app,
            Method::PUT,
            &uri,
            &chef,
            json!({ "title": "Lime Tart" }),
            "image",
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["data"]["title"], "Lime Tart");
        assert!(body["data"]["image"].as_str().unwrap().starts_with("recipes/"));

        let (status, _) = call(&app, Method::GET, &format!("{uri}/image"), None, None).await;
        assert_eq!(status, StatusCode::FOUND);
    }

    #[tokio::test]
    async fn account_profile_and_password_routes() {
        let app = build_app(AppState::fake());
        let chef = register(&app, "chef").await;

        let (status, body) = call_multipart(
            &app,
            Method::PUT,
            "/api/auth/profile",
            &chef,
            json!({ "firstName": "Julia", "bio": "Butter first" }),
            "avatar",
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["data"]["firstName"], "Julia");
        assert_eq!(body["data"]["bio"], "Butter first");
        let id = body["data"]["id"].as_str().unwrap().to_string();

        let (status, _) = call(&app, Method::GET, &format!("/api/users/{id}/avatar"), None, None).await;
        assert_eq!(status, StatusCode::FOUND);

        let (status, body) = call(
            &app,
            Method::PUT,
            "/api/auth/profile",
            Some(chef.as_str()),
            Some(json!({ "lastName": "Child" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["data"]["lastName"], "Child");

        let change = |current: &str| {
            json!({ "currentPassword": current, "newPassword": "new-secret" })
        };
        let (status, body) = call(
            &app,
            Method::POST,
            "/api/auth/change-password",
            Some(chef.as_str()),
            Some(change("wrong-one")),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["success"], false);

        let (status, body) = call(
            &app,
            Method::POST,
            "/api/auth/change-password",
            Some(chef.as_str()),
            Some(change("hunter22")),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{body}");

        let (status, _) = call(
            &app,
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({ "email": "chef@example.com", "password": "new-secret" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn top_chefs_and_public_favorites() {
        let app = build_app(AppState::fake());
        let chef = register(&app, "chef").await;
        let fan = register(&app, "fan").await;
        let (_, body) = call(&app, Method::POST, "/api/recipes", Some(chef.as_str()), Some(tart())).await;
        let public_id = body["data"]["id"].as_str().unwrap().to_string();
        let mut hidden = tart();
        hidden["isPublic"] = json!(false);
        let (_, body) = call(&app, Method::POST, "/api/recipes", Some(chef.as_str()), Some(hidden)).await;
        let private_id = body["data"]["id"].as_str().unwrap().to_string();

        for id in [&public_id, &private_id] {
            let uri = format!("/api/recipes/{id}/favorite");
            let (status, _) = call(&app, Method::POST, &uri, Some(chef.as_str()), None).await;
            assert_eq!(status, StatusCode::OK);
        }

        let (status, body) = call(&app, Method::GET, "/api/users/chef/favorites", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total"], 1);
        assert_eq!(body["data"][0]["id"], public_id.as_str());

        let (status, body) = call(&app, Method::GET, "/api/users/top-chefs", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"][0]["username"], "chef");
        assert_eq!(body["data"][0]["recipeCount"], 1);
        assert_eq!(body["data"].as_array().unwrap().len(), 1);

        let (_, body) = call(&app, Method::GET, "/api/users/favorites", Some(fan.as_str()), None).await;
        assert_eq!(body["total"], 0);
    }

    #[tokio::test]
    async fn profile_and_follow_routes() {
        let app = build_app(AppState::fake());
        let chef = register(&app, "chef").await;
        let fan = register(&app, "fan").await;

        let (_, body) = call(&app, Method::GET, "/api/auth/me", Some(chef.as_str()), None).await;
        let chef_id = body["data"]["id"].as_str().unwrap().to_string();
        assert!(body["data"].get("passwordHash").is_none());

        let follow_uri = format!("/api/users/{chef_id}/follow");
        let (status, body) = call(&app, Method::POST, &follow_uri, Some(fan.as_str()), None).await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["data"]["followers"], 1);

        let (status, _) = call(&app, Method::POST, &follow_uri, Some(chef.as_str()), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = call(&app, Method::GET, "/api/users/profile/chef", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["followersCount"], 1);
        assert_eq!(body["data"]["recipeCount"], 0);
        assert_eq!(body["data"]["user"]["username"], "chef");
        assert!(body["data"]["user"].get("email").is_none());
        assert!(body["data"]["user"].get("followers").is_none());

        let (status, body) = call(&app, Method::GET, "/api/users/my-recipes", Some(chef.as_str()), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total"], 0);
    }
}
