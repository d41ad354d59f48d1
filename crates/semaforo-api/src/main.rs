//! 신호등 봇 API 서버.
//!
//! Axum 기반 REST/SSE 서버를 시작합니다.
//! 롱/숏 비율 스트림, 리스크 분석, 트레이드 관리 엔드포인트를 제공합니다.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{http::StatusCode, middleware, routing::get, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use semaforo_api::metrics::setup_metrics_recorder;
use semaforo_api::middleware::metrics_layer;
use semaforo_api::routes::create_api_router;
use semaforo_api::state::AppState;
use semaforo_core::{
    init_logging, load_sources, AppConfig, LogConfig, RatioSource, DEFAULT_CONFIG_PATH,
};
use semaforo_data::{RedisCache, TradeMemory};
use semaforo_exchange::{
    AccountRatioSource, BinanceFuturesClient, BinanceFuturesConfig, BinanceMarketData,
    FallbackRatioSource, OrderBookRatioSource,
};
use semaforo_risk::RiskModelConfig;

/// 바인딩 주소. `API_HOST`/`API_PORT` 환경변수가 설정 파일보다 우선합니다.
fn socket_addr(config: &AppConfig) -> Result<SocketAddr, std::net::AddrParseError> {
    let host = std::env::var("API_HOST").unwrap_or_else(|_| config.server.host.clone());
    let port = std::env::var("API_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(config.server.port);

    format!("{}:{}", host, port).parse()
}

/// Redis 연결. 실패하면 메모리 없이 동작합니다.
async fn connect_memory(config: &AppConfig) -> TradeMemory {
    let url = std::env::var("REDIS_URL")
        .ok()
        .or_else(|| config.redis.url.clone());

    let Some(url) = url else {
        warn!("REDIS_URL not set, trade memory disabled");
        return TradeMemory::disabled(config.memory.clone());
    };

    match RedisCache::connect(&url).await {
        Ok(cache) => {
            info!(addr = %cache.connection_info(), "Redis connected");
            TradeMemory::new(Some(cache), config.memory.clone())
        }
        Err(e) => {
            warn!(error = %e, "Redis connection failed, trade memory disabled");
            TradeMemory::disabled(config.memory.clone())
        }
    }
}

/// 비율 소스 구성. 호가창 폴백이 켜져 있으면 계정 비율 다음에 시도합니다.
fn ratio_source(client: &Arc<BinanceFuturesClient>, config: &AppConfig) -> Arc<dyn RatioSource> {
    let account: Arc<dyn RatioSource> = Arc::new(AccountRatioSource::new(Arc::clone(client)));
    if !config.exchange.orderbook_fallback {
        return account;
    }

    let orderbook: Arc<dyn RatioSource> = Arc::new(OrderBookRatioSource::new(Arc::clone(client)));
    Arc::new(FallbackRatioSource::new(vec![account, orderbook]))
}

/// CORS 레이어 설정.
///
/// `CORS_ORIGINS`가 설정되어 있으면 해당 origin만, 아니면 모든 origin을 허용합니다.
fn cors_layer() -> CorsLayer {
    let allow_origin = match std::env::var("CORS_ORIGINS") {
        Ok(origins) if !origins.is_empty() => {
            let origins: Vec<_> = origins
                .split(',')
                .filter_map(|s| s.trim().parse().ok())
                .collect();

            if origins.is_empty() {
                warn!("CORS_ORIGINS is set but contains no valid origins, allowing any");
                AllowOrigin::any()
            } else {
                info!("CORS configured with {} allowed origins", origins.len());
                AllowOrigin::list(origins)
            }
        }
        _ => {
            warn!("CORS_ORIGINS not set, allowing any origin (development mode)");
            AllowOrigin::any()
        }
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([
            axum::http::Method::GET,
            axum::http::Method::POST,
            axum::http::Method::OPTIONS,
        ])
        .allow_headers([
            axum::http::header::CONTENT_TYPE,
            axum::http::header::ACCEPT,
            axum::http::header::CACHE_CONTROL,
        ])
        .max_age(Duration::from_secs(3600))
}

/// /metrics 엔드포인트 핸들러.
async fn metrics_handler(
    axum::extract::State(handle): axum::extract::State<PrometheusHandle>,
) -> String {
    handle.render()
}

/// 전체 라우터 생성.
fn create_router(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(metrics_handle);

    Router::new()
        .merge(metrics_router)
        .merge(create_api_router().with_state(state))
        // 메트릭 미들웨어 (모든 요청에 적용)
        .layer(middleware::from_fn(metrics_layer))
        .layer(TraceLayer::new_for_http())
        // 응답 헤더까지의 타임아웃. SSE 본문 스트리밍에는 적용되지 않음
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(30),
        ))
        .layer(cors_layer())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // .env 파일 로드 (있는 경우)
    let _ = dotenvy::dotenv();

    let sources = load_sources(DEFAULT_CONFIG_PATH)?;
    let config = AppConfig::from_sources(&sources)?;
    let risk_model = RiskModelConfig::from_sources(&sources)?;
    init_logging(LogConfig::from_settings(&config.logging))?;

    info!("Starting Semaforo API server...");

    let metrics_handle = setup_metrics_recorder()?;
    info!("Prometheus metrics recorder initialized");

    let addr = socket_addr(&config).map_err(|e| {
        error!(
            host = %config.server.host,
            port = config.server.port,
            error = %e,
            "Invalid bind address. Check API_HOST and API_PORT"
        );
        e
    })?;

    let client = Arc::new(BinanceFuturesClient::new(
        BinanceFuturesConfig::from_settings(&config.exchange),
    )?);
    let source = ratio_source(&client, &config);
    let market = Arc::new(BinanceMarketData::new(Arc::clone(&client)));
    let memory = connect_memory(&config).await;

    info!(
        source = source.name(),
        exchange = %client.base_url(),
        has_memory = memory.is_enabled(),
        assets = ?config.trading.assets,
        "Service connections status"
    );

    let state = Arc::new(
        AppState::new(config, source, market, memory).with_risk_model(risk_model),
    );
    state.restore_from_memory().await;
    info!(version = %state.version, "Application state initialized");

    let app = create_router(Arc::clone(&state), metrics_handle);

    info!(%addr, "API server listening");
    info!("Metrics available at http://{}/metrics", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    // 시그널 수신 시 스트림 세션이 먼저 끝나야 graceful shutdown이 완료됨
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(state.shutdown.clone()))
        .await?;

    state.shutdown();
    info!("Server stopped gracefully");

    Ok(())
}

/// Graceful shutdown 시그널 대기.
///
/// Ctrl+C 또는 SIGTERM 시그널을 수신하면 종료 토큰을 취소합니다.
///
/// # Arguments
/// * `shutdown_token` - 스트림 세션에 종료를 전파할 CancellationToken
async fn shutdown_signal(shutdown_token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            warn!("Received Ctrl+C, initiating graceful shutdown...");
        }
        _ = terminate => {
            warn!("Received SIGTERM, initiating graceful shutdown...");
        }
    }

    shutdown_token.cancel();
    info!("Shutdown signal propagated to stream sessions");
}
