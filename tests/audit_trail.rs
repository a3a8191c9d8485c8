// Audit trail integration tests: what lands on disk after real traffic
#[cfg(test)]
mod tests {
    use std::{collections::HashSet, net::SocketAddr, path::Path, sync::Arc};

    use axum::{Json, Router, routing::get, routing::post};
    use chrono::NaiveDateTime;
    use serde_json::{Value, json};
    use tempfile::TempDir;
    use wiretap::{
        AuditFileLogger, Forwarder, UpstreamClientAdapter, config::ProxyConfig, router,
    };

    async fn spawn_upstream() -> SocketAddr {
        let app = Router::new()
            .route("/ok", get(|| async { Json(json!({"fine": true})) }))
            .route(
                "/echo",
                post(|body: String| async move { Json(json!({"got": body})) }),
            );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        addr
    }

    async fn spawn_proxy(target: &str) -> (SocketAddr, Arc<AuditFileLogger>, TempDir) {
        let logs = TempDir::new().unwrap();
        let config = ProxyConfig {
            target_url: target.to_string(),
            connect_timeout_secs: 2.0,
            read_timeout_secs: 5.0,
            host: "127.0.0.1".to_string(),
            port: 0,
        };

        let audit = Arc::new(AuditFileLogger::new(logs.path()).unwrap());
        let client = Arc::new(
            UpstreamClientAdapter::new(config.connect_timeout(), config.read_timeout()).unwrap(),
        );
        let forwarder = Arc::new(Forwarder::new(config, client, audit.clone()));
        let app = router(forwarder);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (addr, audit, logs)
    }

    /// Blank-line separated blocks of a log file, raw text per block.
    fn blocks_of(path: &Path) -> Vec<String> {
        std::fs::read_to_string(path)
            .unwrap_or_default()
            .split("\n\n")
            .filter(|block| !block.trim().is_empty())
            .map(str::to_owned)
            .collect()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn success_record_captures_the_full_exchange() {
        let upstream = spawn_upstream().await;
        let (proxy, audit, _logs) = spawn_proxy(&format!("http://{upstream}")).await;

        reqwest::Client::new()
            .post(format!("http://{proxy}/echo"))
            .header("x-marker", "alpha")
            .body("ping")
            .send()
            .await
            .unwrap();

        audit.flush().await;
        let blocks = blocks_of(audit.success_path());
        assert_eq!(blocks.len(), 1);

        // Pretty-printed, one field per line.
        assert!(blocks[0].contains("\n  \""));

        let record: Value = serde_json::from_str(&blocks[0]).unwrap();
        assert_eq!(record["path"], "echo");
        assert_eq!(record["method"], "POST");
        assert_eq!(record["headers"]["x-marker"], "alpha");
        assert_eq!(record["body"], "ping");
        assert_eq!(record["response_status"], 200);
        assert!(record["response_headers"].is_object());
        assert!(record["duration"].as_f64().unwrap() >= 0.0);

        let response_body: Value =
            serde_json::from_str(record["response_body"].as_str().unwrap()).unwrap();
        assert_eq!(response_body, json!({"got": "ping"}));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn empty_bodies_are_left_out_of_records() {
        let upstream = spawn_upstream().await;
        let (proxy, audit, _logs) = spawn_proxy(&format!("http://{upstream}")).await;

        reqwest::get(format!("http://{proxy}/ok")).await.unwrap();

        audit.flush().await;
        let blocks = blocks_of(audit.success_path());
        assert_eq!(blocks.len(), 1);

        let record: Value = serde_json::from_str(&blocks[0]).unwrap();
        assert!(record.get("body").is_none());
        // Headers were still captured even with no body.
        assert!(record["headers"]["host"].is_string());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn success_traffic_never_touches_the_error_file() {
        let upstream = spawn_upstream().await;
        let (proxy, audit, _logs) = spawn_proxy(&format!("http://{upstream}")).await;

        reqwest::get(format!("http://{proxy}/ok")).await.unwrap();

        audit.flush().await;
        assert!(audit.success_path().exists());
        assert!(!audit.error_path().exists());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn failures_land_in_the_error_file_with_a_timestamp_prefix() {
        let dead = {
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            drop(listener);
            format!("http://{addr}")
        };
        let (proxy, audit, _logs) = spawn_proxy(&dead).await;

        reqwest::get(format!("http://{proxy}/missing"))
            .await
            .unwrap();

        audit.flush().await;
        assert!(blocks_of(audit.success_path()).is_empty());

        let blocks = blocks_of(audit.error_path());
        assert_eq!(blocks.len(), 1);

        let (stamp_line, json_part) = blocks[0].split_once('\n').unwrap();
        let stamp = stamp_line.strip_suffix(':').unwrap();
        assert!(NaiveDateTime::parse_from_str(stamp, "%Y-%m-%d %H:%M:%S%.6f").is_ok());

        let record: Value = serde_json::from_str(json_part).unwrap();
        assert!(!record["error_message"].as_str().unwrap().is_empty());
        assert!(
            record["target_url"]
                .as_str()
                .unwrap()
                .ends_with("/missing")
        );
        assert_eq!(record["method"], "GET");
        // The timestamp lives in the prefix line, not inside the record.
        assert!(record.get("timestamp").is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn concurrent_requests_write_whole_blocks() {
        let upstream = spawn_upstream().await;
        let (proxy, audit, _logs) = spawn_proxy(&format!("http://{upstream}")).await;
        let client = reqwest::Client::new();

        let mut tasks = Vec::new();
        for i in 0..100 {
            let client = client.clone();
            let url = format!("http://{proxy}/echo");
            tasks.push(tokio::spawn(async move {
                client
                    .post(url)
                    .body(format!("task-{i}"))
                    .send()
                    .await
                    .unwrap()
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        audit.flush().await;
        let blocks = blocks_of(audit.success_path());
        assert_eq!(blocks.len(), 100);

        // Every block parses whole and every request body shows up once.
        let mut seen = HashSet::new();
        for block in &blocks {
            let record: Value = serde_json::from_str(block)
                .unwrap_or_else(|e| panic!("interleaved or torn record: {e}\n{block}"));
            seen.insert(record["body"].as_str().unwrap().to_string());
        }
        let expected: HashSet<String> = (0..100).map(|i| format!("task-{i}")).collect();
        assert_eq!(seen, expected);
    }
}
