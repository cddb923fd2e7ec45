use axum::{Router, routing::get};
use customer_stats::features::{create_api_router, health::health_check};
use customer_stats::openapi::ApiDoc;
use customer_stats::request_id::{make_request_span, request_id_middleware};
use customer_stats::startup::init_app_state;
use customer_stats::state::AppState;
use customer_stats::{ShutdownManager, config::AppConfig};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

fn init_tracing(config: &AppConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| config.logging.filter_directive().into());

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if config.logging.format.eq_ignore_ascii_case("compact") {
        builder.compact().init();
    } else {
        builder.init();
    }
}

/// 业务路由挂载：前缀为空或 "/" 时直接 merge（axum 不允许 nest 到根路径）
fn mount_api(app: Router<AppState>, prefix: &str) -> Router<AppState> {
    let prefix = prefix.trim_end_matches('/');
    if prefix.is_empty() {
        app.merge(create_api_router())
    } else {
        app.nest(prefix, create_api_router())
    }
}

#[tokio::main]
async fn main() {
    // 配置需要先于日志加载（日志级别来自配置），此处失败只能直接打印
    if let Err(e) = AppConfig::init_global() {
        eprintln!("Config init failed: {e}");
        std::process::exit(1);
    }
    let config = AppConfig::global();
    init_tracing(config);

    // 创建优雅退出管理器
    let shutdown_manager = ShutdownManager::new();

    // 启动信号处理器
    if let Err(e) = shutdown_manager.start_signal_handler().await {
        tracing::error!("信号处理器启动失败: {}", e);
        std::process::exit(1);
    }

    let app_state = match init_app_state(config).await {
        Ok(state) => state,
        Err(e) => {
            tracing::error!("Startup failed: {}", e);
            std::process::exit(1);
        }
    };
    let pool = app_state.pool.clone();

    // Routes
    let mut app = Router::<AppState>::new().route("/health", get(health_check));
    app = mount_api(app, &config.api.prefix);
    let mut app = app
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .with_state(app_state);

    if let Some(timeout) = config.api.request_timeout() {
        app = app.layer(TimeoutLayer::new(timeout));
    }
    app = app.layer(TraceLayer::new_for_http().make_span_with(make_request_span));
    // request_id 放在最外层，保证 trace span 与错误响应都能拿到同一个 ID
    app = app.layer(axum::middleware::from_fn(request_id_middleware));

    let addr = config.server_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("Bind address failed {}: {}", addr, e);
            std::process::exit(1);
        });

    tracing::info!("Server: http://{}", addr);
    tracing::info!("Docs: http://{}/docs", addr);
    tracing::info!("Health: http://{}/health", addr);
    tracing::info!(
        "Stats API: http://{}{}/customer/stats",
        addr,
        config.api.prefix.trim_end_matches('/')
    );

    let shutdown_config = &config.shutdown;
    let shutdown_timeout = shutdown_config.timeout_duration();
    let signal_waiter = shutdown_manager.clone();

    // 运行服务器直到收到退出信号
    let graceful = axum::serve(listener, app).with_graceful_shutdown(async move {
        let reason = shutdown_manager.wait_for_shutdown().await;
        tracing::info!("接收到退出信号: {:?}，开始优雅关闭HTTP服务器...", reason);
    });
    let mut server = tokio::spawn(async move { graceful.await });

    let result = tokio::select! {
        res = &mut server => res,
        _ = signal_waiter.wait_for_shutdown() => {
            tracing::info!("优雅退出超时时间: {}秒", shutdown_config.timeout_secs);
            // 在途请求超过时限仍未完成时放弃等待
            let drained = tokio::time::timeout(shutdown_timeout, &mut server).await;
            match drained {
                Ok(res) => res,
                Err(_) => {
                    tracing::warn!("优雅退出超时，强制退出");
                    server.abort();
                    Ok(Ok(()))
                }
            }
        }
    };

    match result {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            tracing::error!("服务器运行错误: {}", e);
            std::process::exit(1);
        }
        Err(e) => {
            tracing::error!("服务器任务异常退出: {}", e);
            std::process::exit(1);
        }
    }

    pool.close().await;
    tracing::info!("服务器已优雅关闭");
}
