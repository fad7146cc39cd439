//! Basic API example
//!
//! This example demonstrates:
//! - Configuring entities with chained builder calls
//! - A primary entity guarding admin-only routes
//! - Route overrides and an extended route
//! - Listening for mutation events
//!
//! Try it:
//!   curl localhost:3000/api/comments
//!   curl -X POST -H 'Authorization: Bearer admin' -d '{"text":"hi"}' localhost:3000/api/comments

use anyhow::{Result, anyhow};
use axum::extract::Request;
use endpoints::prelude::*;
use tracing_subscriber::EnvFilter;

/// Stand-in verifier: a real app checks a signed token against the secret
fn verify(token: &str, _secret: &str) -> Result<Value> {
    match token {
        "admin" => Ok(json!({ "sub": "root", "admin": true })),
        "" => Err(anyhow!("empty token")),
        other => Ok(json!({ "sub": other, "admin": false })),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,endpoints=debug")),
        )
        .init();

    let mut builder = EndpointsBuilder::new();
    builder
        .configure_entity("comments", EntityOptions::default())?
        .configure_routes(
            RoutesConfig::new()
                .action(Action::CreateOne, RoutePatch::new().auth(AuthRequirement::Protected))
                .omit(Action::Save),
        )?
        .done()?;
    builder
        .configure_entity(
            "users",
            EntityOptions::primary()
                .is_admin(|principal| principal.claims["admin"] == true)
                .create_token(|claims| Ok(claims["sub"].as_str().unwrap_or_default().to_string())),
        )?
        .add_dependents(["comments"])?
        .extend_routes_with(
            "get",
            "/whoami",
            vec![],
            Handler::new(|req: Request| async move {
                let token = req
                    .headers()
                    .get("authorization")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or_default()
                    .to_string();
                Json(json!({ "authorization": token }))
            }),
        )?
        .done()?;

    let settings = match std::env::var("ENDPOINTS_SETTINGS") {
        Ok(path) => AppSettings::from_yaml_file(path)?,
        Err(_) => AppSettings::default(),
    };
    let options = CreateOptions::from(settings)
        .with_token_verifier(verify)
        .with_initialize_callback(|environment, _events| async move {
            tracing::info!(%environment, "initializing");
            Ok(())
        });

    let mut app = AxumApp::new();
    let events = builder.create(&mut app, Some("demo-secret"), options).await?;

    for route in app.routes() {
        println!("  {} {}", route.method, route.path);
    }

    let mut rx = events.subscribe();
    tokio::spawn(async move {
        while let Ok(envelope) = rx.recv().await {
            tracing::info!(event = envelope.event.event_kind(), "event received");
        }
    });

    app.listen("127.0.0.1:3000").await
}
