use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use leverslot::domain::{Address, Amount};
use leverslot::routing::{AggregatorRouteSource, RouteError, RouteRequest, RouteSource};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Clone)]
struct Upstream {
    hits: Arc<AtomicUsize>,
    /// Statuses returned before the first successful answer.
    failures: Arc<Vec<StatusCode>>,
}

async fn swap(
    Path(chain_id): Path<u64>,
    Query(params): Query<HashMap<String, String>>,
    State(upstream): State<Upstream>,
) -> Result<Json<Value>, StatusCode> {
    let hit = upstream.hits.fetch_add(1, Ordering::SeqCst);
    if let Some(status) = upstream.failures.get(hit) {
        return Err(*status);
    }
    assert_eq!(chain_id, 137);
    assert_eq!(params.get("amount").map(String::as_str), Some("30000000"));
    Ok(Json(json!({
        "toAmount": "29900000",
        "tx": { "data": "0xcafe" }
    })))
}

async fn serve(failures: Vec<StatusCode>) -> (String, Arc<AtomicUsize>) {
    let hits = Arc::new(AtomicUsize::new(0));
    let upstream = Upstream {
        hits: hits.clone(),
        failures: Arc::new(failures),
    };
    let app = Router::new()
        .route("/:chain_id/swap", get(swap))
        .with_state(upstream);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{}", addr), hits)
}

fn request(usdt: Address, usdc: Address) -> RouteRequest {
    RouteRequest {
        from_asset: usdt,
        to_asset: usdc,
        amount: Amount::from(30),
        from_address: Address::from_label("vault"),
        slippage_bps: 100,
    }
}

fn source(base_url: String) -> (AggregatorRouteSource, Address, Address) {
    let usdt = Address::from_label("usdt");
    let usdc = Address::from_label("usdc");
    let source = AggregatorRouteSource::new(base_url, 137)
        .with_decimals(usdt, 6)
        .with_decimals(usdc, 6);
    (source, usdt, usdc)
}

#[tokio::test]
async fn test_route_quotes_over_http() {
    let (url, hits) = serve(Vec::new()).await;
    let (source, usdt, usdc) = source(url);

    let route = source.route(&request(usdt, usdc)).await.unwrap();
    assert_eq!(route.quoted_out, Amount::from_str_canonical("29.9").unwrap());
    assert_eq!(route.instruction.amount_in, Amount::from(30));
    assert_eq!(
        route.instruction.min_amount_out,
        Amount::from_str_canonical("29.601").unwrap()
    );
    assert_eq!(route.instruction.payload, vec![0xca, 0xfe]);
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_client_error_is_not_retried() {
    let (url, hits) = serve(vec![StatusCode::BAD_REQUEST]).await;
    let (source, usdt, usdc) = source(url);

    let err = source.route(&request(usdt, usdc)).await.unwrap_err();
    assert!(
        matches!(err, RouteError::Http { status: 400, .. }),
        "unexpected error {:?}",
        err
    );
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_server_errors_and_rate_limits_are_retried() {
    let (url, hits) = serve(vec![
        StatusCode::INTERNAL_SERVER_ERROR,
        StatusCode::TOO_MANY_REQUESTS,
    ])
    .await;
    let (source, usdt, usdc) = source(url);

    let route = source.route(&request(usdt, usdc)).await.unwrap();
    assert_eq!(route.quoted_out, Amount::from_str_canonical("29.9").unwrap());
    assert_eq!(hits.load(Ordering::SeqCst), 3);
}
