use std::net::SocketAddr;

use axum::{routing::get, Router};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::state::AppState;
use crate::{auth, ingredients, recipes, shopping_list, users};

pub fn build_app(state: AppState) -> Router {
    Router::new()
        .nest(
            "/api",
            Router::new()
                .merge(auth::router())
                .merge(users::router())
                .merge(ingredients::router())
                .merge(shopping_list::router())
                .merge(recipes::router())
                .route("/health", get(|| async { "ok" })),
        )
        .merge(recipes::links::redirect_routes())
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
                     latency: std::time::Duration,
                     span: &tracing::Span| {
                        let status = res.status();
                        span.record("status", tracing::field::display(status));
                        let latency_ms = latency.as_millis() as u64;
                        if status.is_server_error() {
                            tracing::error!(%status, latency_ms, "response");
                        } else {
                            tracing::info!(%status, latency_ms, "response");
                        }
                    },
                ),
        )
}

pub async fn serve(app: Router) -> anyhow::Result<()> {
    let addr: SocketAddr = format!(
        "{}:{}",
        std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
        std::env::var("APP_PORT").unwrap_or_else(|_| "8080".into())
    )
    .parse()?;

    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::{to_bytes, Body},
        extract::FromRef,
        http::{header, Method, Request, StatusCode},
        response::Response,
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;
    use uuid::Uuid;

    use super::*;
    use crate::{
        auth::jwt::JwtKeys,
        db::memory::MemoryStore,
        recipes::{
            links::encode_code,
            repo::RecipeRepo,
            repo_types::{IngredientAmount, NewRecipe, Recipe},
        },
        relations::repo::{RelationKind, RelationRepo},
    };

    fn bearer(state: &AppState, user_id: Uuid) -> String {
        let token = JwtKeys::from_ref(state).sign_access(user_id).unwrap();
        format!("Bearer {token}")
    }

    async fn send(
        state: &AppState,
        method: Method,
        uri: &str,
        auth: Option<Uuid>,
        body: Option<Value>,
    ) -> Response {
        let mut req = Request::builder().method(method).uri(uri);
        if let Some(user_id) = auth {
            req = req.header(header::AUTHORIZATION, bearer(state, user_id));
        }
        let req = match body {
            Some(json) => req
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => req.body(Body::empty()).unwrap(),
        };
        build_app(state.clone()).oneshot(req).await.unwrap()
    }

    async fn body_json(res: Response) -> Value {
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn body_text(res: Response) -> String {
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    async fn seed_recipe(store: &MemoryStore, author_id: Uuid, name: &str) -> Recipe {
        let salt = store.seed_ingredient("salt", "g");
        store
            .insert_recipe(NewRecipe {
                author_id,
                name: name.into(),
                text: "Cook it.".into(),
                image: format!("recipes/images/{name}.png"),
                cooking_time: 20,
                ingredients: vec![IngredientAmount {
                    ingredient_id: salt.id,
                    amount: 5,
                }],
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn health_is_ok() {
        let state = AppState::fake();
        let res = send(&state, Method::GET, "/api/health", None, None).await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(body_text(res).await, "ok");
    }

    #[tokio::test]
    async fn download_requires_token() {
        let state = AppState::fake();
        let res = send(
            &state,
            Method::GET,
            "/api/recipes/download_shopping_cart",
            None,
            None,
        )
        .await;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
        assert!(body_json(res).await["detail"].is_string());
    }

    #[tokio::test]
    async fn download_is_an_attachment() {
        let store = Arc::new(MemoryStore::default());
        let chef = store.seed_user("chef1");
        let recipe = seed_recipe(&store, chef.id, "Soup").await;
        store
            .add_relation(RelationKind::ShoppingCart, chef.id, recipe.id)
            .await
            .unwrap();
        let state = AppState::fake_with(store);

        let res = send(
            &state,
            Method::GET,
            "/api/recipes/download_shopping_cart",
            Some(chef.id),
            None,
        )
        .await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(
            res.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=\"shopping_list.txt\""
        );
        assert!(res.headers()[header::CONTENT_TYPE]
            .to_str()
            .unwrap()
            .starts_with("text/plain"));
        let text = body_text(res).await;
        assert!(text.contains("1. Salt (g) - 5"));
        assert!(text.contains("1. Soup (от: chef1)"));
    }

    #[tokio::test]
    async fn register_then_login() {
        let state = AppState::fake();
        let res = send(
            &state,
            Method::POST,
            "/api/users",
            None,
            Some(json!({
                "email": "Ada@Example.com",
                "username": "ada",
                "first_name": "Ada",
                "last_name": "Lovelace",
                "password": "password123"
            })),
        )
        .await;
        assert_eq!(res.status(), StatusCode::CREATED);
        let created = body_json(res).await;
        assert_eq!(created["email"], "ada@example.com");
        assert!(created.get("password").is_none());

        let res = send(
            &state,
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({ "email": "ada@example.com", "password": "password123" })),
        )
        .await;
        assert_eq!(res.status(), StatusCode::OK);
        let tokens = body_json(res).await;
        assert!(tokens["access_token"].is_string());
    }

    #[tokio::test]
    async fn validation_errors_are_keyed_by_field() {
        let state = AppState::fake();
        let res = send(&state, Method::POST, "/api/users", None, Some(json!({}))).await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        let body = body_json(res).await;
        assert!(body["email"].is_array());
        assert!(body["password"].is_array());
    }

    #[tokio::test]
    async fn wrongly_typed_body_is_a_field_error() {
        let store = Arc::new(MemoryStore::default());
        let chef = store.seed_user("chef");
        let salt = store.seed_ingredient("salt", "g");
        let state = AppState::fake_with(store);

        let res = send(
            &state,
            Method::POST,
            "/api/recipes",
            Some(chef.id),
            Some(json!({
                "ingredients": [{ "id": salt.id, "amount": 5 }],
                "image": "data:image/png;base64,iVBORw0KGgo=",
                "name": "Soup",
                "text": "Boil.",
                "cooking_time": "15",
            })),
        )
        .await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert_eq!(res.headers()[header::CONTENT_TYPE], "application/json");
        let body = body_json(res).await;
        assert!(body["cooking_time"][0]
            .as_str()
            .unwrap()
            .starts_with("invalid type: string \"15\""));

        let res = send(
            &state,
            Method::POST,
            "/api/recipes",
            Some(chef.id),
            Some(json!({ "ingredients": [{ "id": "salt", "amount": 5.5 }] })),
        )
        .await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert!(body_json(res).await["ingredients"].is_array());
    }

    #[tokio::test]
    async fn malformed_json_is_a_non_field_error() {
        let state = AppState::fake();
        let req = Request::post("/api/auth/login")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{\"email\": "))
            .unwrap();
        let res = build_app(state).oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert!(body_json(res).await["non_field_errors"].is_array());
    }

    #[tokio::test]
    async fn bad_query_values_are_validation_errors() {
        let state = AppState::fake();
        for uri in ["/api/recipes?author=abc", "/api/recipes?page=x"] {
            let res = send(&state, Method::GET, uri, None, None).await;
            assert_eq!(res.status(), StatusCode::BAD_REQUEST, "{uri}");
            assert!(body_json(res).await["non_field_errors"].is_array(), "{uri}");
        }
    }

    #[tokio::test]
    async fn unparsable_path_id_is_not_found() {
        let state = AppState::fake();
        let res = send(&state, Method::GET, "/api/recipes/not-a-uuid", None, None).await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
        assert!(body_json(res).await["detail"].is_string());
    }

    #[tokio::test]
    async fn ingredient_search_over_http() {
        let store = Arc::new(MemoryStore::default());
        store.seed_ingredient("Salt", "g");
        store.seed_ingredient("sugar", "g");
        let state = AppState::fake_with(store);

        let res = send(&state, Method::GET, "/api/ingredients?name=sa", None, None).await;
        assert_eq!(res.status(), StatusCode::OK);
        let body = body_json(res).await;
        assert_eq!(body.as_array().unwrap().len(), 1);
        assert_eq!(body[0]["name"], "Salt");
        assert_eq!(body[0]["measurement_unit"], "g");
    }

    #[tokio::test]
    async fn favorite_then_duplicate_then_remove() {
        let store = Arc::new(MemoryStore::default());
        let chef = store.seed_user("chef");
        let fan = store.seed_user("fan");
        let recipe = seed_recipe(&store, chef.id, "Soup").await;
        let state = AppState::fake_with(store);
        let uri = format!("/api/recipes/{}/favorite", recipe.id);

        let res = send(&state, Method::POST, &uri, Some(fan.id), None).await;
        assert_eq!(res.status(), StatusCode::CREATED);
        let short = body_json(res).await;
        assert_eq!(short["name"], "Soup");
        assert_eq!(short["cooking_time"], 20);

        let res = send(&state, Method::POST, &uri, Some(fan.id), None).await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert!(body_json(res).await["errors"].is_array());

        let res = send(&state, Method::DELETE, &uri, Some(fan.id), None).await;
        assert_eq!(res.status(), StatusCode::NO_CONTENT);
        let res = send(&state, Method::DELETE, &uri, Some(fan.id), None).await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn subscribe_returns_author_card() {
        let store = Arc::new(MemoryStore::default());
        let chef = store.seed_user("chef");
        let fan = store.seed_user("fan");
        seed_recipe(&store, chef.id, "Soup").await;
        seed_recipe(&store, chef.id, "Stew").await;
        let state = AppState::fake_with(store);

        let uri = format!("/api/users/{}/subscribe?recipes_limit=1", chef.id);
        let res = send(&state, Method::POST, &uri, Some(fan.id), None).await;
        assert_eq!(res.status(), StatusCode::CREATED);
        let card = body_json(res).await;
        assert_eq!(card["is_subscribed"], true);
        assert_eq!(card["recipes_count"], 2);
        assert_eq!(card["recipes"].as_array().unwrap().len(), 1);

        let res = send(
            &state,
            Method::GET,
            "/api/users/subscriptions",
            Some(fan.id),
            None,
        )
        .await;
        let page = body_json(res).await;
        assert_eq!(page["count"], 1);
        assert_eq!(page["results"][0]["username"], "chef");

        let uri = format!("/api/users/{}/subscribe", fan.id);
        let res = send(&state, Method::POST, &uri, Some(fan.id), None).await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn non_author_cannot_delete() {
        let store = Arc::new(MemoryStore::default());
        let chef = store.seed_user("chef");
        let stranger = store.seed_user("stranger");
        let recipe = seed_recipe(&store, chef.id, "Soup").await;
        let state = AppState::fake_with(store);
        let uri = format!("/api/recipes/{}", recipe.id);

        let res = send(&state, Method::DELETE, &uri, Some(stranger.id), None).await;
        assert_eq!(res.status(), StatusCode::FORBIDDEN);
        let res = send(&state, Method::DELETE, &uri, Some(chef.id), None).await;
        assert_eq!(res.status(), StatusCode::NO_CONTENT);
        let res = send(&state, Method::GET, &uri, None, None).await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn me_requires_token_and_bad_token_is_rejected_on_public_routes() {
        let store = Arc::new(MemoryStore::default());
        let ada = store.seed_user("ada");
        let state = AppState::fake_with(store);

        let res = send(&state, Method::GET, "/api/users/me", None, None).await;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
        let res = send(&state, Method::GET, "/api/users/me", Some(ada.id), None).await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(body_json(res).await["username"], "ada");

        let req = Request::builder()
            .uri("/api/recipes")
            .header(header::AUTHORIZATION, "Bearer garbage")
            .body(Body::empty())
            .unwrap();
        let res = build_app(state).oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn short_link_redirects_to_recipe() {
        let store = Arc::new(MemoryStore::default());
        let chef = store.seed_user("chef");
        let recipe = seed_recipe(&store, chef.id, "Soup").await;
        let state = AppState::fake_with(store);

        let uri = format!("/api/recipes/{}/get-link", recipe.id);
        let res = send(&state, Method::GET, &uri, None, None).await;
        assert_eq!(res.status(), StatusCode::OK);
        let link = body_json(res).await["short-link"]
            .as_str()
            .unwrap()
            .to_string();
        let code = encode_code(recipe.id);
        assert_eq!(link, format!("http://testserver/s/{code}"));

        let res = send(&state, Method::GET, &format!("/s/{code}"), None, None).await;
        assert_eq!(res.status(), StatusCode::FOUND);
        assert_eq!(
            res.headers()[header::LOCATION],
            format!("/recipes/{}", recipe.id).as_str()
        );

        let res = send(&state, Method::GET, "/s/garbage", None, None).await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }
}
